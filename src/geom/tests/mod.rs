
mod test_extrusion_basic;

mod core;
mod diagnostics;
mod extrusion;
mod mesh;
mod primitives;
mod stl;

pub use core::{BBox, Point3, Tolerance, Vec3};
pub use diagnostics::GeomMeshDiagnostics;
pub use extrusion::{
    ExtrusionCaps, ExtrusionError, extrude_polygon, extrude_polygon_with_tolerance,
};
pub use mesh::GeomMesh;
pub use primitives::{DEFAULT_CYLINDER_SEGMENTS, box_mesh, cylinder_mesh, triangle_prism_mesh};
pub use stl::{StlError, parse_stl};

#[cfg(test)]
pub(crate) mod tests;

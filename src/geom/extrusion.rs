use super::diagnostics::GeomMeshDiagnostics;
use super::mesh::{GeomMesh, finalize_mesh};
use super::{Point3, Tolerance, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtrusionCaps {
    pub start: bool,
    pub end: bool,
}

impl ExtrusionCaps {
    pub const NONE: Self = Self { start: false, end: false };
    pub const BOTH: Self = Self { start: true, end: true };
}

#[derive(Debug, thiserror::Error)]
pub enum ExtrusionError {
    #[error("extrusion height must be finite and positive, got {0}")]
    InvalidHeight(f64),
    #[error("profile points must be finite")]
    NonFinitePoint,
    #[error("profile requires at least {min} unique points")]
    NotEnoughPoints { min: usize },
    #[error("profile is degenerate (zero area)")]
    ProfileDegenerate,
    #[error("profile must lie in a plane of constant Z")]
    ProfileNotPlanar,
    #[error("caps require a convex profile")]
    ProfileNotConvex,
}

/// Extrudes a closed profile lying in a plane of constant Z straight up by
/// `height`. The profile may be given in either winding; the result is
/// oriented outward. Caps are fan-triangulated, so capped profiles must be
/// convex.
pub fn extrude_polygon(
    profile: &[Point3],
    height: f64,
    caps: ExtrusionCaps,
) -> Result<(GeomMesh, GeomMeshDiagnostics), ExtrusionError> {
    extrude_polygon_with_tolerance(profile, height, caps, Tolerance::default_geom())
}

pub fn extrude_polygon_with_tolerance(
    profile: &[Point3],
    height: f64,
    caps: ExtrusionCaps,
    tol: Tolerance,
) -> Result<(GeomMesh, GeomMeshDiagnostics), ExtrusionError> {
    if !height.is_finite() || height <= 0.0 {
        return Err(ExtrusionError::InvalidHeight(height));
    }

    let mut points = clean_loop(profile, tol)?;
    let area = polygon_area_xy(&points);
    if area.abs() <= tol.eps {
        return Err(ExtrusionError::ProfileDegenerate);
    }
    if area < 0.0 {
        points.reverse();
    }
    if (caps.start || caps.end) && !is_convex_ccw(&points, tol) {
        return Err(ExtrusionError::ProfileNotConvex);
    }

    let n = points.len();
    let direction = Vec3::Z.mul_scalar(height);

    let mut vertices: Vec<Point3> = Vec::with_capacity(n * 2);
    vertices.extend_from_slice(&points);
    vertices.extend(points.iter().map(|p| p.add_vec(direction)));

    let mut indices: Vec<u32> = Vec::with_capacity(n * 6 + (n - 2) * 6);
    for i in 0..n {
        let i0 = i as u32;
        let i1 = ((i + 1) % n) as u32;
        let j0 = (n + i) as u32;
        let j1 = (n + (i + 1) % n) as u32;

        indices.extend_from_slice(&[i0, i1, j1]);
        indices.extend_from_slice(&[i0, j1, j0]);
    }

    for k in 1..(n - 1) as u32 {
        if caps.start {
            indices.extend_from_slice(&[0, k + 1, k]);
        }
        if caps.end {
            let top = n as u32;
            indices.extend_from_slice(&[top, top + k, top + k + 1]);
        }
    }

    Ok(finalize_mesh(vertices, indices, tol))
}

/// Drops repeated points (including a closing duplicate of the first point)
/// and checks the profile is a planar loop.
fn clean_loop(profile: &[Point3], tol: Tolerance) -> Result<Vec<Point3>, ExtrusionError> {
    if profile.iter().any(|p| !p.is_finite()) {
        return Err(ExtrusionError::NonFinitePoint);
    }

    let mut cleaned: Vec<Point3> = Vec::with_capacity(profile.len());
    for p in profile.iter().copied() {
        if cleaned.last().is_some_and(|last| tol.approx_eq_point3(*last, p)) {
            continue;
        }
        cleaned.push(p);
    }
    if cleaned.len() > 1
        && tol.approx_eq_point3(cleaned[0], cleaned[cleaned.len() - 1])
    {
        cleaned.pop();
    }

    if cleaned.len() < 3 {
        return Err(ExtrusionError::NotEnoughPoints { min: 3 });
    }

    let z = cleaned[0].z;
    if cleaned.iter().any(|p| !tol.approx_eq_f64(p.z, z)) {
        return Err(ExtrusionError::ProfileNotPlanar);
    }

    Ok(cleaned)
}

fn polygon_area_xy(points: &[Point3]) -> f64 {
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice * 0.5
}

fn is_convex_ccw(points: &[Point3], tol: Tolerance) -> bool {
    let n = points.len();
    (0..n).all(|i| {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        let turn = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        turn >= -tol.eps
    })
}

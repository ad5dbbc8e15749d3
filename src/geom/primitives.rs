//! Closed primitive solids used for plates and markers.
//!
//! Every primitive is centered on the origin in X/Y and rests on Z = 0, so a
//! caller positions it with a single translation.

use super::diagnostics::GeomMeshDiagnostics;
use super::extrusion::{ExtrusionCaps, ExtrusionError, extrude_polygon};
use super::mesh::GeomMesh;
use super::Point3;

/// Segment count used for marker cylinders.
pub const DEFAULT_CYLINDER_SEGMENTS: usize = 20;

/// Axis-aligned box of `width` (X) by `depth` (Y) by `height` (Z).
pub fn box_mesh(
    width: f64,
    depth: f64,
    height: f64,
) -> Result<(GeomMesh, GeomMeshDiagnostics), ExtrusionError> {
    let hx = width * 0.5;
    let hy = depth * 0.5;
    let profile = [
        Point3::new(-hx, -hy, 0.0),
        Point3::new(hx, -hy, 0.0),
        Point3::new(hx, hy, 0.0),
        Point3::new(-hx, hy, 0.0),
    ];
    extrude_polygon(&profile, height, ExtrusionCaps::BOTH)
}

/// Cylinder around the Z axis approximated by a regular `segments`-gon.
pub fn cylinder_mesh(
    radius: f64,
    height: f64,
    segments: usize,
) -> Result<(GeomMesh, GeomMeshDiagnostics), ExtrusionError> {
    let segments = segments.max(3);
    let profile: Vec<Point3> = (0..segments)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / segments as f64;
            Point3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
        })
        .collect();
    extrude_polygon(&profile, height, ExtrusionCaps::BOTH)
}

/// Equilateral triangular prism with side `side`, centroid on the Z axis and
/// one edge parallel to X.
pub fn triangle_prism_mesh(
    side: f64,
    height: f64,
) -> Result<(GeomMesh, GeomMeshDiagnostics), ExtrusionError> {
    let h = 3f64.sqrt() / 2.0 * side;
    let profile = [
        Point3::new(-side / 2.0, -h / 3.0, 0.0),
        Point3::new(side / 2.0, -h / 3.0, 0.0),
        Point3::new(0.0, 2.0 * h / 3.0, 0.0),
    ];
    extrude_polygon(&profile, height, ExtrusionCaps::BOTH)
}

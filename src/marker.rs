//! Marker solids raised on the plate at each sample.
//!
//! Every marker comes out centred in X/Y with its base on Z = 0, so the
//! preview builder positions it with a translation alone.

use crate::config::MarkerShape;
use crate::geom::{
    DEFAULT_CYLINDER_SEGMENTS, ExtrusionError, GeomMeshDiagnostics, box_mesh, cylinder_mesh,
    triangle_prism_mesh,
};
use crate::scene::{Fragment, FragmentKind, Material};

#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    #[error("marker size must be finite and positive, got {0}")]
    InvalidSize(f64),
    #[error("marker height must be finite and positive, got {0}")]
    InvalidHeight(f64),
    #[error("marker geometry failed: {0}")]
    Geometry(#[from] ExtrusionError),
}

/// Builds one marker of `shape` with footprint `size` (diameter or side) and
/// the given `height`.
pub fn make_marker(shape: MarkerShape, size: f64, height: f64) -> Result<Fragment, MarkerError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(MarkerError::InvalidSize(size));
    }
    if !height.is_finite() || height <= 0.0 {
        return Err(MarkerError::InvalidHeight(height));
    }

    let (mesh, diagnostics) = match shape {
        MarkerShape::Circle => cylinder_mesh(size * 0.5, height, DEFAULT_CYLINDER_SEGMENTS)?,
        MarkerShape::Square => box_mesh(size, size, height)?,
        MarkerShape::Triangle => triangle_prism_mesh(size, height)?,
    };
    log_if_unsound(shape, &diagnostics);

    Ok(Fragment::new(FragmentKind::Marker, mesh, Material::MARKER))
}

fn log_if_unsound(shape: MarkerShape, diagnostics: &GeomMeshDiagnostics) {
    if !diagnostics.is_valid_solid() {
        log::warn!("{shape:?} marker is not a closed solid: {diagnostics}");
    }
}

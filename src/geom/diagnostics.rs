//! Mesh diagnostics for generated and decoded solids.
//!
//! Diagnostics are collected whenever a mesh is finalized (markers, plate,
//! decoded STL artifacts) and are used for:
//!
//! - Validating that a marker is a closed solid (watertight, manifold)
//! - Deciding whether a delivered artifact is usable at all
//! - Logging a short summary line per fragment
//!
//! # Example
//!
//! ```ignore
//! use tactile_plate::geom::{box_mesh, GeomMeshDiagnostics};
//!
//! let (mesh, diagnostics) = box_mesh(3.0, 3.0, 0.8)?;
//! assert!(diagnostics.is_valid_solid());
//! log::debug!("marker {}", diagnostics.summary());
//! ```

use std::fmt;

/// Topology and repair statistics for one mesh.
///
/// - `open_edge_count`: edges with only one adjacent triangle (holes)
/// - `non_manifold_edge_count`: edges with more than two adjacent triangles
/// - `welded_vertex_count`: vertices merged during tolerance-based welding
/// - `degenerate_triangle_count`: zero-area triangles removed
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GeomMeshDiagnostics {
    /// Total number of vertices in the final mesh.
    pub vertex_count: usize,

    /// Total number of triangles in the final mesh.
    pub triangle_count: usize,

    /// Number of vertices merged during tolerance-based welding.
    ///
    /// Decoded STL triangle soups weld most of their corners; generated
    /// primitives should report zero here.
    pub welded_vertex_count: usize,

    /// Number of degenerate (zero-area) triangles removed.
    pub degenerate_triangle_count: usize,

    /// Number of open (boundary) edges in the mesh.
    pub open_edge_count: usize,

    /// Number of non-manifold edges in the mesh.
    pub non_manifold_edge_count: usize,

    /// Human-readable warnings about mesh issues and repairs performed.
    ///
    /// Examples:
    /// - "mesh orientation flipped (outward)"
    /// - "mesh has open edges"
    pub warnings: Vec<String>,
}

impl GeomMeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the mesh is watertight (no open edges).
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.open_edge_count == 0
    }

    /// Returns `true` if the mesh is manifold (no non-manifold edges).
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0
    }

    /// Watertight and manifold: the minimum for a printable solid.
    #[must_use]
    pub fn is_valid_solid(&self) -> bool {
        self.is_watertight() && self.is_manifold()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Sums counts and appends warnings. Used when fragments are aggregated
    /// into a snapshot.
    pub fn merge(&mut self, other: &GeomMeshDiagnostics) {
        self.vertex_count += other.vertex_count;
        self.triangle_count += other.triangle_count;
        self.welded_vertex_count += other.welded_vertex_count;
        self.degenerate_triangle_count += other.degenerate_triangle_count;
        self.open_edge_count += other.open_edge_count;
        self.non_manifold_edge_count += other.non_manifold_edge_count;
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Returns a short summary string suitable for logging.
    ///
    /// Format: `"V:{vertices} T:{triangles} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("V:{} T:{}", self.vertex_count, self.triangle_count)];

        if self.welded_vertex_count > 0 {
            parts.push(format!("welded:{}", self.welded_vertex_count));
        }
        if self.degenerate_triangle_count > 0 {
            parts.push(format!("degenerate:{}", self.degenerate_triangle_count));
        }
        if self.open_edge_count > 0 {
            parts.push(format!("open:{}", self.open_edge_count));
        }
        if self.non_manifold_edge_count > 0 {
            parts.push(format!("non-manifold:{}", self.non_manifold_edge_count));
        }

        parts.join(" ")
    }
}

impl fmt::Display for GeomMeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

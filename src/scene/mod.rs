//! Render passes and the stage that shows exactly one of them.
//!
//! A [`SceneSnapshot`] is assembled completely off-stage and then handed to
//! [`Stage::publish`], which swaps it in with one assignment and drops the
//! previous snapshot together with its buffers.

pub mod camera;

use serde::Serialize;

use crate::geom::{BBox, GeomMesh, GeomMeshDiagnostics, Vec3};

pub use camera::PerspectiveCamera;

// ─────────────────────────────────────────────────────────────────────────────
// Material
// ─────────────────────────────────────────────────────────────────────────────

/// Phong material description, colours as linear `[r, g, b]` in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Material {
    pub diffuse: [f64; 3],
    pub specular: [f64; 3],
    pub shininess: f64,
}

impl Material {
    pub const PLATE: Self = Self::from_hex(0xf5_f5_f5, 30.0);
    pub const MARKER: Self = Self::from_hex(0x1f_77_b4, 30.0);
    pub const ARTIFACT: Self = Self::from_hex(0x1f_77_b4, 40.0);

    #[must_use]
    pub const fn from_hex(rgb: u32, shininess: f64) -> Self {
        Self {
            diffuse: hex_to_rgb(rgb),
            specular: hex_to_rgb(0x11_11_11),
            shininess,
        }
    }

    /// Diffuse colour packed as `0xRRGGBB`.
    #[must_use]
    pub fn hex(self) -> u32 {
        self.diffuse
            .iter()
            .fold(0, |acc, channel| (acc << 8) | (channel * 255.0).round() as u32)
    }
}

const fn hex_to_rgb(rgb: u32) -> [f64; 3] {
    [
        ((rgb >> 16) & 0xff) as f64 / 255.0,
        ((rgb >> 8) & 0xff) as f64 / 255.0,
        (rgb & 0xff) as f64 / 255.0,
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Fragment
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Plate,
    Marker,
    Artifact,
}

/// One renderable solid: a mesh in local coordinates placed at `offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub mesh: GeomMesh,
    pub material: Material,
    pub offset: Vec3,
}

impl FragmentKind {
    /// Dihedral angle above which shading breaks into a hard edge. Delivered
    /// artifacts are shaded per facet.
    #[must_use]
    pub const fn crease_angle_deg(self) -> f64 {
        match self {
            Self::Plate | Self::Marker => 30.0,
            Self::Artifact => 0.0,
        }
    }
}

impl Fragment {
    /// Wraps `mesh` for rendering, computing normals for its kind.
    #[must_use]
    pub fn new(kind: FragmentKind, mesh: GeomMesh, material: Material) -> Self {
        Self {
            kind,
            mesh: mesh.with_crease_normals(kind.crease_angle_deg()),
            material,
            offset: Vec3::ZERO,
        }
    }

    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.offset = self.offset + offset;
        self
    }

    /// Bounds in scene coordinates.
    #[must_use]
    pub fn world_bbox(&self) -> Option<BBox> {
        let local = self.mesh.bbox()?;
        Some(BBox::new(
            local.min.add_vec(self.offset),
            local.max.add_vec(self.offset),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Counters collected while building a preview pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreviewStats {
    pub sampled: usize,
    pub non_finite: usize,
    pub markers: usize,
    pub skipped_functions: usize,
}

/// The complete set of fragments for one render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneSnapshot {
    fragments: Vec<Fragment>,
    pub stats: PreviewStats,
    pub diagnostics: GeomMeshDiagnostics,
}

impl SceneSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot made of one delivered artifact and nothing else.
    #[must_use]
    pub fn from_artifact(fragment: Fragment) -> Self {
        let mut snapshot = Self::new();
        snapshot.push(fragment);
        snapshot
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    #[must_use]
    pub fn count(&self, kind: FragmentKind) -> usize {
        self.fragments.iter().filter(|f| f.kind == kind).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Union of all fragment bounds.
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        self.fragments
            .iter()
            .filter_map(Fragment::world_bbox)
            .reduce(BBox::union)
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.fragments.iter().map(|f| f.mesh.triangle_count()).sum()
    }

    /// All fragments merged into one mesh in scene coordinates.
    #[must_use]
    pub fn merged_mesh(&self) -> GeomMesh {
        let mut merged = GeomMesh::default();
        merged.normals = Some(Vec::new());
        for fragment in &self.fragments {
            let mut mesh = fragment.mesh.clone();
            mesh.translate(fragment.offset);
            merged.append(&mesh);
        }
        merged
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage
// ─────────────────────────────────────────────────────────────────────────────

/// Sole owner of the visible snapshot and of the camera framing it.
#[derive(Debug, Default)]
pub struct Stage {
    current: Option<SceneSnapshot>,
    camera: PerspectiveCamera,
    generation: u64,
}

impl Stage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the visible snapshot and refits the camera to it. Returns the
    /// new generation number.
    pub fn publish(&mut self, snapshot: SceneSnapshot) -> u64 {
        let bbox = snapshot.bbox();
        // Previous snapshot is dropped here, never before the new one exists.
        let previous = self.current.replace(snapshot);
        drop(previous);
        if let Some(bbox) = bbox {
            self.camera.fit_to_bbox(bbox);
        }
        self.generation += 1;
        log::debug!("published scene generation {}", self.generation);
        self.generation
    }

    #[must_use]
    pub fn current(&self) -> Option<&SceneSnapshot> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn reset_view(&mut self) {
        self.camera.reset_view();
    }

    /// Bumped on every publish, so renderers can tell when to re-upload.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

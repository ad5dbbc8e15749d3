//! Perspective camera parameters handed to the renderer.

use serde::Serialize;

use crate::geom::{BBox, Point3, Vec3};

pub const DEFAULT_FOV_DEG: f64 = 45.0;
pub const DEFAULT_NEAR: f64 = 0.1;
pub const DEFAULT_FAR: f64 = 5000.0;
pub const HOME_POSITION: Point3 = Point3::new(300.0, 300.0, 300.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerspectiveCamera {
    pub fov_deg: f64,
    #[serde(serialize_with = "serialize_point")]
    pub position: Point3,
    /// Orbit target.
    #[serde(serialize_with = "serialize_point")]
    pub target: Point3,
    pub near: f64,
    pub far: f64,
}

impl PerspectiveCamera {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fov_deg: DEFAULT_FOV_DEG,
            position: HOME_POSITION,
            target: Point3::ORIGIN,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Frames `bbox` by keeping the current view direction and backing off to
    /// `0.5 * diagonal / tan(fov / 2)` from its centre.
    ///
    /// This treats the bounding sphere as if it had to fit the vertical field
    /// of view only, so wide plates on a narrow viewport may still be clipped
    /// at the sides. The fit is approximate, not tight. Empty or non-finite
    /// boxes leave the camera untouched.
    pub fn fit_to_bbox(&mut self, bbox: BBox) {
        let diagonal = bbox.diagonal();
        if !diagonal.is_finite() || diagonal <= 0.0 {
            log::debug!("camera fit skipped for degenerate bounds");
            return;
        }

        let center = bbox.center();
        let half_fov = self.fov_deg.to_radians() * 0.5;
        let distance = 0.5 * diagonal / half_fov.tan();
        let direction = self
            .position
            .sub_point(center)
            .normalized()
            .or_else(|| HOME_POSITION.to_vec3().normalized())
            .unwrap_or(Vec3::Z);

        self.position = center.add_vec(direction.mul_scalar(distance));
        self.target = center;
        self.near = diagonal / 100.0;
        self.far = diagonal * 100.0;
    }

    /// Back to the initial viewpoint looking at the plate origin.
    pub fn reset_view(&mut self) {
        self.position = HOME_POSITION;
        self.target = Point3::ORIGIN;
    }

    #[must_use]
    pub fn distance_to_target(&self) -> f64 {
        self.position.distance_to(self.target)
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize_point<S: serde::Serializer>(point: &Point3, serializer: S) -> Result<S::Ok, S::Error> {
    serde::Serialize::serialize(&point.to_array(), serializer)
}

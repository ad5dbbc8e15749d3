//! Data space to plate millimetres.
//!
//! Both operations are pure: the preview and the export service must place a
//! sample at the same spot for the same inputs.

use serde::Serialize;

use crate::config::{DEFAULT_FIXED_LIMITS, LayoutConfig};

/// Data-space limits per axis, `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisLimits {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl AxisLimits {
    #[must_use]
    pub const fn new(x: [f64; 2], y: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Symmetric limits derived from the plate size: one tick per `step_mm` of
/// plate, half of them on each side of zero.
#[must_use]
pub fn compute_axis_limits(plate_size_mm: [f64; 2], step_mm: f64, tick_step: f64) -> AxisLimits {
    let axis = |dimension: f64| {
        let divisions = (dimension / step_mm).floor().max(1.0);
        let mut range = (divisions / 2.0).floor() * tick_step;
        if !range.is_finite() || range <= 0.0 {
            range = (tick_step * 2.0).max(1.0);
        }
        [-range, range]
    };
    AxisLimits::new(axis(plate_size_mm[0]), axis(plate_size_mm[1]))
}

/// Limits for one preview pass: derived when `auto_limits` is set, otherwise
/// the configured ones with `[-5.5, 5.5]` for a missing axis.
#[must_use]
pub fn resolve_limits(layout: &LayoutConfig) -> AxisLimits {
    if layout.auto_limits {
        compute_axis_limits(layout.plate_size_mm(), layout.step_mm, layout.tick_step)
    } else {
        AxisLimits::new(
            layout.x_limits.unwrap_or(DEFAULT_FIXED_LIMITS),
            layout.y_limits.unwrap_or(DEFAULT_FIXED_LIMITS),
        )
    }
}

/// Maps a data point onto the plate, centred on the plate origin.
#[must_use]
pub fn map_to_plate(x: f64, y: f64, limits: &AxisLimits, plate_size_mm: [f64; 2]) -> (f64, f64) {
    (
        map_axis(x, limits.x, plate_size_mm[0]),
        map_axis(y, limits.y, plate_size_mm[1]),
    )
}

fn map_axis(value: f64, [lo, hi]: [f64; 2], dimension: f64) -> f64 {
    let span = hi - lo;
    let span = if span == 0.0 { 1.0 } else { span };
    ((value - lo) / span - 0.5) * dimension
}

/// Tick positions from `lo` to `hi` inclusive, `tick_step` apart.
#[must_use]
pub fn axis_ticks([lo, hi]: [f64; 2], tick_step: f64) -> Vec<f64> {
    if !(tick_step.is_finite() && tick_step > 0.0 && lo.is_finite() && hi.is_finite()) || hi < lo {
        return Vec::new();
    }
    // Half a step of slack so `hi` survives accumulated rounding.
    let count = ((hi - lo) / tick_step + 0.5).floor() as usize;
    (0..=count)
        .map(|i| lo + i as f64 * tick_step)
        .filter(|tick| *tick <= hi + tick_step * 1e-9)
        .collect()
}

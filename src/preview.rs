//! One preview pass: sample every function, place markers, return a snapshot.
//!
//! The builder never touches the stage. It returns a complete
//! [`SceneSnapshot`] and the caller publishes it, so a failed or partial pass
//! can never be seen.

use crate::config::{FunctionSpec, LayoutConfig, MAX_DENSITY, PreviewConfig, SampleSegment};
use crate::expression::{ExpressionCompiler, MevalCompiler};
use crate::geom::{Vec3, box_mesh};
use crate::layout::{AxisLimits, map_to_plate, resolve_limits};
use crate::marker::make_marker;
use crate::scene::{Fragment, FragmentKind, Material, SceneSnapshot};

/// `n` evenly spaced points over `[lo, hi]`, both ends included for `n >= 2`.
/// A single point sits on `lo`.
#[must_use]
pub fn sample_domain([lo, hi]: [f64; 2], n: usize) -> Vec<f64> {
    let divisor = n.saturating_sub(1).max(1) as f64;
    (0..n)
        .map(|k| lo + (k as f64 / divisor) * (hi - lo))
        .collect()
}

fn capped(density: u32) -> usize {
    if density > MAX_DENSITY {
        log::warn!("density {density} capped at {MAX_DENSITY}");
    }
    density.min(MAX_DENSITY) as usize
}

/// Per-segment sampling. A segment with density 1 contributes its midpoint.
#[must_use]
pub fn sample_segments(segments: &[SampleSegment]) -> Vec<f64> {
    segments
        .iter()
        .flat_map(|segment| {
            let [a, b] = segment.range;
            match capped(segment.density) {
                0 => Vec::new(),
                1 => vec![(a + b) * 0.5],
                n => sample_domain([a, b], n),
            }
        })
        .collect()
}

/// Domain points for one function: its segments when it has any, otherwise
/// `density` points across the x-limits. Densities above [`MAX_DENSITY`] are
/// capped.
#[must_use]
pub fn sample_points(function: &FunctionSpec, x_limits: [f64; 2]) -> Vec<f64> {
    if function.segments.is_empty() {
        sample_domain(x_limits, capped(function.density))
    } else {
        sample_segments(&function.segments)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewBuilder<C = MevalCompiler> {
    compiler: C,
}

impl PreviewBuilder<MevalCompiler> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            compiler: MevalCompiler,
        }
    }
}

impl<C: ExpressionCompiler> PreviewBuilder<C> {
    #[must_use]
    pub const fn with_compiler(compiler: C) -> Self {
        Self { compiler }
    }

    #[must_use]
    pub fn build_config(&self, config: &PreviewConfig) -> SceneSnapshot {
        self.build(&config.functions, &config.layout)
    }

    /// Builds the plate and every marker for `functions` on `layout`.
    ///
    /// Non-finite samples are dropped silently. A function whose marker cannot
    /// be built is skipped as a whole and the pass carries on.
    #[must_use]
    pub fn build(&self, functions: &[FunctionSpec], layout: &LayoutConfig) -> SceneSnapshot {
        let limits = resolve_limits(layout);
        let mut snapshot = SceneSnapshot::new();

        match box_mesh(
            layout.plate_width_mm,
            layout.plate_height_mm,
            layout.plate_thickness_mm,
        ) {
            Ok((mesh, diagnostics)) => {
                snapshot.diagnostics.merge(&diagnostics);
                snapshot.push(Fragment::new(FragmentKind::Plate, mesh, Material::PLATE));
            }
            Err(error) => log::warn!("plate skipped: {error}"),
        }

        for (index, function) in functions.iter().enumerate() {
            if function.density == 0 && function.segments.is_empty() {
                continue;
            }
            self.place_markers(index, function, layout, &limits, &mut snapshot);
        }

        log::info!(
            "preview built: {} markers, {} non-finite samples dropped, {} functions skipped",
            snapshot.stats.markers,
            snapshot.stats.non_finite,
            snapshot.stats.skipped_functions
        );
        snapshot
    }

    fn place_markers(
        &self,
        index: usize,
        function: &FunctionSpec,
        layout: &LayoutConfig,
        limits: &AxisLimits,
        snapshot: &mut SceneSnapshot,
    ) {
        let template = match make_marker(function.shape, function.size, layout.marker_height_mm) {
            Ok(marker) => marker,
            Err(error) => {
                log::warn!("function {index} (`{}`) skipped: {error}", function.expression);
                snapshot.stats.skipped_functions += 1;
                return;
            }
        };

        let compiled = self.compiler.compile(&function.expression);
        let plate = layout.plate_size_mm();

        for x in sample_points(function, limits.x) {
            snapshot.stats.sampled += 1;
            let y = compiled.eval(x);
            if !y.is_finite() {
                snapshot.stats.non_finite += 1;
                continue;
            }
            let (x_mm, y_mm) = map_to_plate(x, y, limits, plate);
            if !x_mm.is_finite() || !y_mm.is_finite() {
                snapshot.stats.non_finite += 1;
                continue;
            }
            // Marker base on the plate top; its centre ends at thickness + height / 2.
            let offset = Vec3::new(x_mm, y_mm, layout.plate_thickness_mm);
            snapshot.push(template.clone().translated(offset));
            snapshot.stats.markers += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{PreviewBuilder, sample_domain, sample_points, sample_segments};
    use crate::config::{FunctionSpec, LayoutConfig, MAX_DENSITY, MarkerShape, SampleSegment};
    use crate::scene::FragmentKind;

    #[test]
    fn sampling_is_even_and_inclusive() {
        assert_eq!(sample_domain([-1.0, 1.0], 5), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(sample_domain([-5.5, 5.5], 1), vec![-5.5]);
        assert!(sample_domain([-5.5, 5.5], 0).is_empty());

        let points = sample_domain([-5.5, 5.5], 20);
        assert_eq!(points.len(), 20);
        assert_eq!(points[0], -5.5);
        assert_relative_eq!(points[19], 5.5);
        let step = points[1] - points[0];
        for pair in points.windows(2) {
            assert_relative_eq!(pair[1] - pair[0], step, epsilon = 1e-12);
        }
    }

    #[test]
    fn huge_densities_are_capped() {
        let function = FunctionSpec::new("x", MarkerShape::Circle, 3.0, u32::MAX);
        assert_eq!(sample_points(&function, [-1.0, 1.0]).len(), MAX_DENSITY as usize);

        let segmented = function.with_segments(vec![SampleSegment {
            range: [0.0, 1.0],
            density: 4_000_000_000,
        }]);
        assert_eq!(sample_points(&segmented, [-1.0, 1.0]).len(), MAX_DENSITY as usize);
    }

    #[test]
    fn segments_use_midpoint_for_single_samples() {
        let segments = [
            SampleSegment {
                range: [0.0, 2.0],
                density: 1,
            },
            SampleSegment {
                range: [3.0, 4.0],
                density: 0,
            },
            SampleSegment {
                range: [-2.0, -1.0],
                density: 3,
            },
        ];
        assert_eq!(sample_segments(&segments), vec![1.0, -2.0, -1.5, -1.0]);
    }

    #[test]
    fn markers_sit_on_top_of_the_plate() {
        let layout = LayoutConfig::default();
        let functions = [FunctionSpec::new("0", MarkerShape::Square, 3.0, 1)];
        let snapshot = PreviewBuilder::new().build(&functions, &layout);

        assert_eq!(snapshot.count(FragmentKind::Marker), 1);
        let marker = &snapshot.fragments()[1];
        let bbox = marker.world_bbox().expect("marker bounds");
        let centre_z = (bbox.min.z + bbox.max.z) * 0.5;
        assert_relative_eq!(centre_z, layout.plate_thickness_mm + layout.marker_height_mm / 2.0);
        assert_relative_eq!(bbox.min.z, layout.plate_thickness_mm);
        // N = 1 samples the left limit.
        assert_relative_eq!(marker.offset.x, -layout.plate_width_mm / 2.0);
    }

    #[test]
    fn non_finite_values_produce_no_marker() {
        let layout = LayoutConfig {
            auto_limits: false,
            x_limits: Some([-1.0, 1.0]),
            ..LayoutConfig::default()
        };
        let functions = [FunctionSpec::new("1/x", MarkerShape::Circle, 3.0, 3)];
        let snapshot = PreviewBuilder::new().build(&functions, &layout);

        assert_eq!(snapshot.count(FragmentKind::Marker), 2);
        assert_eq!(snapshot.stats.sampled, 3);
        assert_eq!(snapshot.stats.non_finite, 1);
    }

    #[test]
    fn zero_density_and_broken_functions_emit_nothing() {
        let layout = LayoutConfig::default();
        let functions = [
            FunctionSpec::new("x", MarkerShape::Circle, 3.0, 0),
            FunctionSpec::new("x +* 2", MarkerShape::Circle, 3.0, 4),
            FunctionSpec::new("x", MarkerShape::Triangle, -1.0, 4),
            FunctionSpec::new("x", MarkerShape::Square, 2.0, 2),
        ];
        let snapshot = PreviewBuilder::new().build(&functions, &layout);

        assert_eq!(snapshot.count(FragmentKind::Plate), 1);
        assert_eq!(snapshot.count(FragmentKind::Marker), 2);
        assert_eq!(snapshot.stats.skipped_functions, 1);
        assert_eq!(snapshot.stats.non_finite, 4);
    }

    #[test]
    fn roots_of_negative_inputs_still_get_markers() {
        let functions = [FunctionSpec::new("sqrt(x)", MarkerShape::Circle, 3.0, 5)];
        let snapshot = PreviewBuilder::new().build(&functions, &LayoutConfig::default());

        assert_eq!(snapshot.count(FragmentKind::Marker), 5);
        assert_eq!(snapshot.stats.non_finite, 0);
        // Negative inputs keep the real part of `sqrt`, which is 0.
        let first = &snapshot.fragments()[1];
        assert_relative_eq!(first.offset.y, 0.0, epsilon = 1e-9);
    }
}

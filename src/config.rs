//! Editable configuration for one tactile plate.
//!
//! Everything the user can change in the form lives here. A pass of the
//! preview builder works on an immutable snapshot of these values.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PLATE_WIDTH_MM: f64 = 173.0;
pub const DEFAULT_PLATE_HEIGHT_MM: f64 = 113.0;
pub const DEFAULT_PLATE_THICKNESS_MM: f64 = 0.8;
pub const DEFAULT_MARKER_HEIGHT_MM: f64 = 0.8;
pub const DEFAULT_STEP_MM: f64 = 7.45;
pub const DEFAULT_TICK_STEP: f64 = 0.5;
pub const DEFAULT_FIXED_LIMITS: [f64; 2] = [-5.5, 5.5];
pub const DEFAULT_MARKER_SIZE_MM: f64 = 3.0;
pub const DEFAULT_DENSITY: u32 = 20;
/// Upper bound on samples per function or per segment.
pub const MAX_DENSITY: u32 = 10_000;
pub const DEFAULT_DPI: u32 = 96;
pub const DEFAULT_MM_PER_INCH: f64 = 23.455_555_5;
pub const DEFAULT_OUTPUT_FILENAME: &str = "grafica_export.stl";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{field}` must be a finite positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("function {index}: marker size must be a finite positive number, got {size}")]
    MarkerSize { index: usize, size: f64 },
    #[error("function {index}: density {density} exceeds the limit of {MAX_DENSITY}")]
    Density { index: usize, density: u32 },
    #[error("function {index}: segment [{start}, {end}] is not a finite range")]
    Segment { index: usize, start: f64, end: f64 },
    #[error("{axis}-limits [{lo}, {hi}] must be finite with lo < hi")]
    Limits { axis: char, lo: f64, hi: f64 },
}

/// Marker solid raised at each sample.
///
/// Deserializes from the long names as well as the plotting tags used by the
/// export service (`o`, `s`, `^`). Unknown tags fall back to a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum MarkerShape {
    #[default]
    Circle,
    Square,
    Triangle,
}

impl MarkerShape {
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "s" | "square" | "box" | "rect" => Self::Square,
            "^" | "tri" | "triangle" => Self::Triangle,
            "o" | "c" | "circle" => Self::Circle,
            other => {
                log::warn!("unknown marker shape `{other}`, using circle");
                Self::Circle
            }
        }
    }

    /// Tag understood by the export service's plotting backend.
    #[must_use]
    pub const fn export_tag(self) -> &'static str {
        match self {
            Self::Circle => "o",
            Self::Square => "s",
            Self::Triangle => "^",
        }
    }
}

impl From<String> for MarkerShape {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

/// A domain sub-range sampled with its own density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSegment {
    pub range: [f64; 2],
    pub density: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionSpec {
    pub expression: String,
    pub shape: MarkerShape,
    pub size: f64,
    pub density: u32,
    /// When non-empty, replaces `density` with per-segment sampling.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SampleSegment>,
}

impl FunctionSpec {
    #[must_use]
    pub fn new(expression: impl Into<String>, shape: MarkerShape, size: f64, density: u32) -> Self {
        Self {
            expression: expression.into(),
            shape,
            size,
            density,
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_segments(mut self, segments: Vec<SampleSegment>) -> Self {
        self.segments = segments;
        self
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(ConfigError::MarkerSize {
                index,
                size: self.size,
            });
        }
        let mut densities =
            std::iter::once(self.density).chain(self.segments.iter().map(|s| s.density));
        if let Some(density) = densities.find(|&d| d > MAX_DENSITY) {
            return Err(ConfigError::Density { index, density });
        }
        for segment in &self.segments {
            let [start, end] = segment.range;
            if !start.is_finite() || !end.is_finite() {
                return Err(ConfigError::Segment { index, start, end });
            }
        }
        Ok(())
    }
}

impl Default for FunctionSpec {
    fn default() -> Self {
        Self::new("x", MarkerShape::Circle, DEFAULT_MARKER_SIZE_MM, DEFAULT_DENSITY)
    }
}

/// Physical plate layout and how data coordinates map onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    #[serde(alias = "fig_w")]
    pub plate_width_mm: f64,
    #[serde(alias = "fig_h")]
    pub plate_height_mm: f64,
    pub plate_thickness_mm: f64,
    pub marker_height_mm: f64,
    pub step_mm: f64,
    pub tick_step: f64,
    pub auto_limits: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_limits: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_limits: Option<[f64; 2]>,
}

impl LayoutConfig {
    #[must_use]
    pub const fn plate_size_mm(&self) -> [f64; 2] {
        [self.plate_width_mm, self.plate_height_mm]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("plate_width_mm", self.plate_width_mm)?;
        positive("plate_height_mm", self.plate_height_mm)?;
        positive("plate_thickness_mm", self.plate_thickness_mm)?;
        positive("marker_height_mm", self.marker_height_mm)?;
        positive("step_mm", self.step_mm)?;
        positive("tick_step", self.tick_step)?;
        if !self.auto_limits {
            for (axis, limits) in [('x', self.x_limits), ('y', self.y_limits)] {
                if let Some([lo, hi]) = limits {
                    if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                        return Err(ConfigError::Limits { axis, lo, hi });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            plate_width_mm: DEFAULT_PLATE_WIDTH_MM,
            plate_height_mm: DEFAULT_PLATE_HEIGHT_MM,
            plate_thickness_mm: DEFAULT_PLATE_THICKNESS_MM,
            marker_height_mm: DEFAULT_MARKER_HEIGHT_MM,
            step_mm: DEFAULT_STEP_MM,
            tick_step: DEFAULT_TICK_STEP,
            auto_limits: true,
            x_limits: None,
            y_limits: None,
        }
    }
}

/// The whole editable configuration, including export-only settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub functions: Vec<FunctionSpec>,
    pub layout: LayoutConfig,
    /// Export resolution only.
    pub dpi: u32,
    /// Export only: the service omits the continuous curves.
    pub only_markers: bool,
    pub output_filename: String,
    pub mm_per_inch: f64,
    pub save_pdf: bool,
    pub live_preview: bool,
}

impl PreviewConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        for (index, function) in self.functions.iter().enumerate() {
            function.validate(index)?;
        }
        Ok(())
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            functions: vec![
                FunctionSpec::new("x", MarkerShape::Circle, 3.0, 20),
                FunctionSpec::new("x**2", MarkerShape::Square, 3.0, 7),
                FunctionSpec::new("x**3", MarkerShape::Triangle, 3.5, 6),
            ],
            layout: LayoutConfig::default(),
            dpi: DEFAULT_DPI,
            only_markers: true,
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            mm_per_inch: DEFAULT_MM_PER_INCH,
            save_pdf: false,
            live_preview: true,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, LayoutConfig, MAX_DENSITY, MarkerShape, PreviewConfig};

    #[test]
    fn marker_shape_accepts_plot_tags_and_names() {
        assert_eq!(MarkerShape::from_tag("o"), MarkerShape::Circle);
        assert_eq!(MarkerShape::from_tag("Square"), MarkerShape::Square);
        assert_eq!(MarkerShape::from_tag("rect"), MarkerShape::Square);
        assert_eq!(MarkerShape::from_tag("^"), MarkerShape::Triangle);
        assert_eq!(MarkerShape::from_tag("star"), MarkerShape::Circle);
        assert_eq!(MarkerShape::Triangle.export_tag(), "^");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = PreviewConfig::from_json(
            r#"{
                "functions": [{ "expression": "sin(x)", "shape": "^", "density": 5 }],
                "layout": { "fig_w": 200, "auto_limits": true }
            }"#,
        )
        .expect("valid config");

        assert_eq!(config.functions.len(), 1);
        assert_eq!(config.functions[0].shape, MarkerShape::Triangle);
        assert_eq!(config.functions[0].size, 3.0);
        assert_eq!(config.layout.plate_width_mm, 200.0);
        assert_eq!(config.layout.plate_height_mm, 113.0);
        assert_eq!(config.dpi, 96);
    }

    #[test]
    fn default_config_has_three_functions() {
        let config = PreviewConfig::default();
        assert_eq!(config.functions.len(), 3);
        assert_eq!(config.functions[1].expression, "x**2");
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn oversized_density_is_rejected() {
        let err = PreviewConfig::from_json(r#"{ "functions": [{ "density": 4000000000 }] }"#)
            .expect_err("density above the limit");
        assert!(matches!(
            err,
            ConfigError::Density {
                index: 0,
                density: 4_000_000_000
            }
        ));

        let err = PreviewConfig::from_json(
            r#"{ "functions": [{ "density": 5, "segments": [{ "range": [0, 1], "density": 20000 }] }] }"#,
        )
        .expect_err("segment density above the limit");
        assert!(matches!(err, ConfigError::Density { density: 20_000, .. }));

        let at_limit = format!(r#"{{ "functions": [{{ "density": {MAX_DENSITY} }}] }}"#);
        assert!(PreviewConfig::from_json(&at_limit).is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let err = PreviewConfig::from_json(r#"{ "layout": { "plate_thickness_mm": 0 } }"#)
            .expect_err("zero thickness");
        assert!(matches!(
            err,
            ConfigError::NotPositive {
                field: "plate_thickness_mm",
                ..
            }
        ));

        let err = PreviewConfig::from_json(r#"{ "functions": [{ "size": -1 }] }"#)
            .expect_err("negative size");
        assert!(matches!(err, ConfigError::MarkerSize { index: 0, .. }));

        let layout = LayoutConfig {
            auto_limits: false,
            x_limits: Some([2.0, 1.0]),
            ..LayoutConfig::default()
        };
        assert!(matches!(layout.validate(), Err(ConfigError::Limits { axis: 'x', .. })));

        assert!(matches!(PreviewConfig::from_json("{"), Err(ConfigError::Json(_))));
    }
}

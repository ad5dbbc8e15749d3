//! Server-side export: request payload, response handling, artifact loading.

pub mod retrieval;

use serde::{Deserialize, Serialize};

use crate::config::PreviewConfig;
use crate::layout::resolve_limits;

pub use retrieval::{
    ArtifactSource, ArtifactState, FetchError, LoadedArtifact, MalformedArtifact, RetryPolicy,
    Sleeper, load_with_retry, load_with_retry_observed, recenter_artifact,
};
#[cfg(not(target_arch = "wasm32"))]
pub use retrieval::{FileSource, ThreadSleeper};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportError {
    #[error("connection error: {0}")]
    Network(String),
    /// Structured error reported by the service, kept verbatim.
    #[error("{0}")]
    Service(String),
    #[error("unexpected response from export service: {0}")]
    Decode(String),
    #[error("artifact unavailable after {attempts} attempts: {last_error}")]
    ArtifactUnavailable { attempts: u32, last_error: String },
    #[error("invalid export request: {0}")]
    InvalidRequest(String),
}

impl ExportError {
    /// One line for the status bar.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self {
            Self::Service(message) => format!("Error: {message}"),
            Self::ArtifactUnavailable { .. } => {
                "Could not load the STL automatically. Download it manually.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Payload posted to the export service. Array fields are aligned per
/// function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub functions: Vec<String>,
    pub labels: Vec<String>,
    pub curve_styles: Vec<String>,
    pub curve_linewidths: Vec<f64>,
    pub marker_shapes: Vec<String>,
    pub marker_sizes: Vec<f64>,
    pub marker_segments: Vec<Vec<[f64; 2]>>,
    pub marker_densities: Vec<Vec<u32>>,
    pub fig_size_mm: [f64; 2],
    pub dpi: u32,
    pub auto_limits: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xlim: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ylim: Option<[f64; 2]>,
    pub step_mm: f64,
    pub tick_step: f64,
    pub plate_thickness_mm: f64,
    pub marker_height_mm: f64,
    pub output_filename: String,
    pub only_markers: bool,
    pub mm_per_inch: f64,
    pub save_pdf: bool,
}

impl ExportRequest {
    /// Snapshot of `config` in the service's format.
    ///
    /// Functions without explicit segments are sampled over the resolved
    /// x-limits with their density, which is what the preview shows.
    pub fn from_config(config: &PreviewConfig) -> Result<Self, ExportError> {
        if config.functions.is_empty() {
            return Err(ExportError::InvalidRequest("no functions provided".to_string()));
        }
        config
            .validate()
            .map_err(|error| ExportError::InvalidRequest(error.to_string()))?;

        let layout = &config.layout;
        let limits = resolve_limits(layout);
        let count = config.functions.len();

        let mut request = Self {
            functions: Vec::with_capacity(count),
            labels: Vec::with_capacity(count),
            curve_styles: vec!["-".to_string(); count],
            curve_linewidths: vec![1.0; count],
            marker_shapes: Vec::with_capacity(count),
            marker_sizes: Vec::with_capacity(count),
            marker_segments: Vec::with_capacity(count),
            marker_densities: Vec::with_capacity(count),
            fig_size_mm: layout.plate_size_mm(),
            dpi: config.dpi,
            auto_limits: layout.auto_limits,
            xlim: (!layout.auto_limits).then_some(limits.x),
            ylim: (!layout.auto_limits).then_some(limits.y),
            step_mm: layout.step_mm,
            tick_step: layout.tick_step,
            plate_thickness_mm: layout.plate_thickness_mm,
            marker_height_mm: layout.marker_height_mm,
            output_filename: config.output_filename.clone(),
            only_markers: config.only_markers,
            mm_per_inch: config.mm_per_inch,
            save_pdf: config.save_pdf,
        };

        for function in &config.functions {
            let expression = match function.expression.trim() {
                "" => "x".to_string(),
                trimmed => trimmed.to_string(),
            };
            request.labels.push(expression.clone());
            request.functions.push(expression);
            request.marker_shapes.push(function.shape.export_tag().to_string());
            request.marker_sizes.push(function.size);
            if function.segments.is_empty() {
                request.marker_segments.push(vec![limits.x]);
                request.marker_densities.push(vec![function.density]);
            } else {
                request
                    .marker_segments
                    .push(function.segments.iter().map(|s| s.range).collect());
                request
                    .marker_densities
                    .push(function.segments.iter().map(|s| s.density).collect());
            }
        }

        Ok(request)
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        serde_json::to_string(self).map_err(|error| ExportError::InvalidRequest(error.to_string()))
    }
}

/// What the service answers. `error` wins over everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportResponse {
    pub stl: Option<String>,
    pub preview_svg: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        serde_json::from_str(json).map_err(|error| ExportError::Decode(error.to_string()))
    }

    /// Turns a reported `error` into [`ExportError::Service`].
    pub fn into_result(self) -> Result<Self, ExportError> {
        match self.error {
            Some(message) => Err(ExportError::Service(message)),
            None => Ok(self),
        }
    }
}

/// The remote solid-export service.
#[allow(async_fn_in_trait)]
pub trait ExportService {
    async fn request(&self, request: &ExportRequest) -> Result<ExportResponse, ExportError>;
}

/// Result of a full export round trip.
#[derive(Debug)]
pub struct ExportOutcome {
    pub response: ExportResponse,
    /// `None` when the service returned no STL location.
    pub artifact: Option<LoadedArtifact>,
}

/// Requests an export and, when the service answers with an STL location,
/// loads it under `policy`, reporting each artifact state to `observe`. A
/// service error is returned as is, without any load attempt.
pub async fn export_and_load<E, A, S, F>(
    service: &E,
    source: &A,
    sleeper: &S,
    config: &PreviewConfig,
    policy: RetryPolicy,
    observe: F,
) -> Result<ExportOutcome, ExportError>
where
    E: ExportService,
    A: ArtifactSource,
    S: Sleeper,
    F: FnMut(&ArtifactState),
{
    let request = ExportRequest::from_config(config)?;
    log::info!("requesting export of {} functions", request.functions.len());
    let response = service.request(&request).await?.into_result()?;

    let artifact = match response.stl.as_deref() {
        Some(url) => Some(load_with_retry_observed(source, sleeper, url, policy, observe).await?),
        None => {
            log::warn!("export response carried no STL location");
            None
        }
    };
    Ok(ExportOutcome { response, artifact })
}

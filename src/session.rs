//! Editing session: configuration, live-update gating and the stage.
//!
//! This is the part of the viewer that does not depend on the browser. The
//! wasm facade feeds it timestamps and edits; the CLI and tests drive it
//! directly.

use std::time::Duration;

use crate::config::PreviewConfig;
use crate::export::{ArtifactState, ExportError, ExportOutcome, ExportResponse, LoadedArtifact};
use crate::expression::{ExpressionCompiler, MevalCompiler};
use crate::preview::PreviewBuilder;
use crate::scene::Stage;
use crate::scheduler::LiveUpdateScheduler;

pub const STATUS_UPDATED: &str = "3D view updated";
pub const STATUS_EXPORT_REQUESTED: &str = "Requesting export from server...";
pub const STATUS_EXPORT_STARTED: &str = "Export started on backend.";
pub const STATUS_LOADING_ARTIFACT: &str = "Loading STL...";
pub const STATUS_ARTIFACT_READY: &str = "STL loaded";

#[derive(Debug)]
pub struct Session<C = MevalCompiler> {
    config: PreviewConfig,
    builder: PreviewBuilder<C>,
    scheduler: LiveUpdateScheduler<PreviewConfig>,
    stage: Stage,
    status: String,
}

impl Session<MevalCompiler> {
    #[must_use]
    pub fn new(config: PreviewConfig) -> Self {
        Self::with_builder(config, PreviewBuilder::new())
    }
}

impl Default for Session<MevalCompiler> {
    fn default() -> Self {
        Self::new(PreviewConfig::default())
    }
}

impl<C: ExpressionCompiler> Session<C> {
    #[must_use]
    pub fn with_builder(config: PreviewConfig, builder: PreviewBuilder<C>) -> Self {
        Self {
            scheduler: LiveUpdateScheduler::new(config.live_preview),
            config,
            builder,
            stage: Stage::new(),
            status: String::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PreviewConfig {
        &self.config
    }

    #[must_use]
    pub const fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Records an edited configuration. The preview follows after the
    /// debounce window when live preview is on. Returns `true` if the edit
    /// switched live preview on and the preview was rebuilt right away.
    pub fn edit(&mut self, config: PreviewConfig, now: Duration) -> bool {
        let live = config.live_preview;
        self.config = config;
        let rebuilt = self.set_live_preview(live);
        if !rebuilt {
            self.scheduler.on_edit(now, self.config.clone());
        }
        rebuilt
    }

    /// Switches live preview. Turning it on rebuilds immediately.
    pub fn set_live_preview(&mut self, enabled: bool) -> bool {
        self.config.live_preview = enabled;
        match self.scheduler.set_enabled(enabled, self.config.clone()) {
            Some(latest) => {
                self.rebuild_with(&latest);
                true
            }
            None => false,
        }
    }

    /// Fires a due rebuild. Returns `true` if one ran.
    pub fn tick(&mut self, now: Duration) -> bool {
        match self.scheduler.poll(now) {
            Some(latest) => {
                self.rebuild_with(&latest);
                true
            }
            None => false,
        }
    }

    /// Rebuilds from the current configuration regardless of live preview.
    pub fn rebuild_now(&mut self) -> u64 {
        let config = self.config.clone();
        self.rebuild_with(&config)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Back to the initial configuration; the preview follows as for any edit.
    pub fn reset_defaults(&mut self, now: Duration) -> bool {
        self.status.clear();
        self.edit(PreviewConfig::default(), now)
    }

    /// Shows a delivered artifact in place of the preview.
    pub fn publish_artifact(&mut self, artifact: LoadedArtifact) -> u64 {
        let generation = self.stage.publish(artifact.into_snapshot());
        self.status = STATUS_ARTIFACT_READY.to_string();
        generation
    }

    pub fn report_export_error(&mut self, error: &ExportError) {
        log::warn!("export failed: {error}");
        self.status = error.status_message();
    }

    /// Status line while an export is in flight: records the request
    /// before the service call, then follows the artifact's progress.
    pub fn begin_export(&mut self) -> PreviewConfig {
        self.status = STATUS_EXPORT_REQUESTED.to_string();
        self.config.clone()
    }

    pub fn observe_artifact(&mut self, state: &ArtifactState) {
        let status = match state {
            ArtifactState::Requested => STATUS_EXPORT_STARTED,
            ArtifactState::Loading { .. } => STATUS_LOADING_ARTIFACT,
            ArtifactState::Ready { .. } | ArtifactState::Failed { .. } => return,
        };
        self.status = status.to_string();
    }

    /// Applies the result of an export round trip: a loaded artifact replaces
    /// the preview, an error goes to the status line.
    pub fn finish_export(
        &mut self,
        result: Result<ExportOutcome, ExportError>,
    ) -> Result<ExportResponse, ExportError> {
        match result {
            Ok(ExportOutcome { response, artifact }) => {
                match artifact {
                    Some(artifact) => {
                        self.publish_artifact(artifact);
                    }
                    None => self.status = STATUS_EXPORT_STARTED.to_string(),
                }
                Ok(response)
            }
            Err(error) => {
                self.report_export_error(&error);
                Err(error)
            }
        }
    }

    fn rebuild_with(&mut self, config: &PreviewConfig) -> u64 {
        let snapshot = self.builder.build_config(config);
        let generation = self.stage.publish(snapshot);
        self.status = STATUS_UPDATED.to_string();
        generation
    }
}

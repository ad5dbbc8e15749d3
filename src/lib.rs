#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod export;
pub mod expression;
pub mod geom;
pub mod layout;
pub mod marker;
pub mod preview;
pub mod scene;
pub mod scheduler;
pub mod session;

#[cfg(target_arch = "wasm32")]
pub mod web;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use config::PreviewConfig;
use scene::{FragmentKind, Material, PerspectiveCamera, PreviewStats, SceneSnapshot};
use serde::Serialize;
use session::Session;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    log::set_logger(&DEFAULT_LOGGER).expect("error initializing logger");
    log::set_max_level(LevelFilter::Debug);
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[derive(Debug, Serialize)]
struct SceneExport<'a> {
    generation: u64,
    fragments: Vec<FragmentExport<'a>>,
    stats: PreviewStats,
    camera: &'a PerspectiveCamera,
}

#[derive(Debug, Serialize)]
struct FragmentExport<'a> {
    kind: FragmentKind,
    /// Flat `[x0, y0, z0, x1, ...]` in fragment-local millimetres.
    positions: &'a [f64],
    indices: &'a [u32],
    #[serde(skip_serializing_if = "Option::is_none")]
    normals: Option<&'a [f64]>,
    offset: [f64; 3],
    material: Material,
    color: u32,
}

impl<'a> SceneExport<'a> {
    fn new(generation: u64, snapshot: Option<&'a SceneSnapshot>, camera: &'a PerspectiveCamera) -> Self {
        let fragments = snapshot
            .map(|snapshot| {
                snapshot
                    .fragments()
                    .iter()
                    .map(|fragment| FragmentExport {
                        kind: fragment.kind,
                        positions: fragment.mesh.positions_flat(),
                        indices: &fragment.mesh.indices,
                        normals: fragment.mesh.normals_flat(),
                        offset: fragment.offset.to_array(),
                        material: fragment.material,
                        color: fragment.material.hex(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            generation,
            fragments,
            stats: snapshot.map(|s| s.stats).unwrap_or_default(),
            camera,
        }
    }
}

/// Public entry point for the viewer page.
///
/// Timestamps are milliseconds from any fixed origin, typically
/// `performance.now()`; the page calls [`PreviewEngine::tick`] from its
/// render loop.
#[wasm_bindgen]
pub struct PreviewEngine {
    session: Rc<RefCell<Session>>,
}

#[wasm_bindgen]
impl PreviewEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PreviewEngine {
        let mut session = Session::default();
        session.rebuild_now();
        PreviewEngine {
            session: Rc::new(RefCell::new(session)),
        }
    }

    /// Replaces the configuration from JSON; the preview follows after the
    /// debounce window when live preview is on.
    #[wasm_bindgen]
    pub fn set_config(&mut self, json: &str, now_ms: f64) -> Result<bool, JsValue> {
        let config = PreviewConfig::from_json(json).map_err(to_js_error)?;
        Ok(self.session.borrow_mut().edit(config, millis(now_ms)))
    }

    #[wasm_bindgen]
    pub fn get_config(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.session.borrow().config()).map_err(to_js_error)
    }

    /// Toggles live preview; returns `true` when this rebuilt the preview.
    #[wasm_bindgen]
    pub fn set_live_preview(&mut self, enabled: bool) -> bool {
        self.session.borrow_mut().set_live_preview(enabled)
    }

    /// Runs a due debounced rebuild; returns `true` if one ran.
    #[wasm_bindgen]
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.session.borrow_mut().tick(millis(now_ms))
    }

    /// Preview button: rebuild now from the current configuration.
    #[wasm_bindgen]
    pub fn build_preview(&mut self) {
        self.session.borrow_mut().rebuild_now();
    }

    #[wasm_bindgen]
    pub fn reset_defaults(&mut self, now_ms: f64) -> bool {
        self.session.borrow_mut().reset_defaults(millis(now_ms))
    }

    #[wasm_bindgen]
    pub fn reset_view(&mut self) {
        self.session.borrow_mut().stage_mut().reset_view();
    }

    /// Bumped whenever a new snapshot is published.
    #[wasm_bindgen]
    pub fn generation(&self) -> u64 {
        self.session.borrow().stage().generation()
    }

    /// Render buffers, materials and camera of the visible snapshot.
    #[wasm_bindgen]
    pub fn get_scene(&self) -> Result<JsValue, JsValue> {
        let session = self.session.borrow();
        let stage = session.stage();
        let export = SceneExport::new(stage.generation(), stage.current(), stage.camera());
        serde_wasm_bindgen::to_value(&export).map_err(|err| JsError::new(&err.to_string()).into())
    }

    #[wasm_bindgen]
    pub fn get_camera(&self) -> Result<JsValue, JsValue> {
        let session = self.session.borrow();
        serde_wasm_bindgen::to_value(session.stage().camera())
            .map_err(|err| JsError::new(&err.to_string()).into())
    }

    #[wasm_bindgen]
    pub fn status(&self) -> String {
        self.session.borrow().status().to_string()
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl PreviewEngine {
    /// Requests an export at `endpoint` and shows the delivered STL once it
    /// loads. Resolves to the service response; rejects with the status
    /// message on failure.
    #[wasm_bindgen]
    pub fn export(&self, endpoint: String) -> js_sys::Promise {
        use export::{RetryPolicy, export_and_load};
        use web::{FetchExportService, FetchSource, TimeoutSleeper};

        let shared = Rc::clone(&self.session);
        wasm_bindgen_futures::future_to_promise(async move {
            let config = shared.borrow_mut().begin_export();
            let service = FetchExportService::new(endpoint);
            let result = export_and_load(
                &service,
                &FetchSource,
                &TimeoutSleeper,
                &config,
                RetryPolicy::EXPORT,
                |state| shared.borrow_mut().observe_artifact(state),
            )
            .await;

            let response = shared
                .borrow_mut()
                .finish_export(result)
                .map_err(|error| JsValue::from(JsError::new(&error.status_message())))?;
            serde_wasm_bindgen::to_value(&response).map_err(|err| JsError::new(&err.to_string()).into())
        })
    }
}

impl Default for PreviewEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PreviewEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session.borrow();
        f.debug_struct("PreviewEngine")
            .field("generation", &session.stage().generation())
            .field("status", &session.status())
            .finish()
    }
}

fn millis(now_ms: f64) -> Duration {
    if now_ms.is_finite() && now_ms > 0.0 {
        Duration::from_secs_f64(now_ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}

//! Browser implementations of the export seams: `fetch` for the service and
//! the artifact, `setTimeout` for retry waits.

use std::time::Duration;

use js_sys::{Promise, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response, Window};

use crate::export::{
    ArtifactSource, ExportError, ExportRequest, ExportResponse, ExportService, FetchError, Sleeper,
};

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))
}

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

async fn send(request: &Request) -> Result<Response, JsValue> {
    let value = JsFuture::from(window()?.fetch_with_request(request)).await?;
    value.dyn_into::<Response>()
}

/// POSTs the configuration as JSON to the export endpoint.
#[derive(Debug, Clone)]
pub struct FetchExportService {
    endpoint: String,
}

impl FetchExportService {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    async fn post(&self, body: &str) -> Result<(u16, String), JsValue> {
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_mode(RequestMode::SameOrigin);
        init.set_body(&JsValue::from_str(body));

        let request = Request::new_with_str_and_init(&self.endpoint, &init)?;
        request.headers().set("Content-Type", "application/json")?;

        let response = send(&request).await?;
        let text = JsFuture::from(response.text()?).await?;
        Ok((response.status(), text.as_string().unwrap_or_default()))
    }
}

impl ExportService for FetchExportService {
    async fn request(&self, request: &ExportRequest) -> Result<ExportResponse, ExportError> {
        let body = request.to_json()?;
        let (status, text) = self
            .post(&body)
            .await
            .map_err(|error| ExportError::Network(js_message(&error)))?;

        match ExportResponse::from_json(&text) {
            Ok(response) if (200..300).contains(&status) || response.error.is_some() => Ok(response),
            Ok(_) => Err(ExportError::Service(format!("HTTP {status}"))),
            Err(_) if !(200..300).contains(&status) => {
                Err(ExportError::Service(format!("HTTP {status}: {text}")))
            }
            Err(error) => Err(error),
        }
    }
}

/// Downloads artifacts with `fetch`, treating any non-2xx status as a failed
/// attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchSource;

impl ArtifactSource for FetchSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let network = |error: JsValue| FetchError::Network {
            url: url.to_string(),
            reason: js_message(&error),
        };

        let request = Request::new_with_str(url).map_err(network)?;
        let response = send(&request).await.map_err(network)?;
        if !response.ok() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        let buffer = JsFuture::from(response.array_buffer().map_err(network)?)
            .await
            .map_err(network)?;
        Ok(Uint8Array::new(&buffer).to_vec())
    }
}

/// Waits on a `setTimeout` promise.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeoutSleeper;

impl Sleeper for TimeoutSleeper {
    async fn sleep(&self, duration: Duration) {
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let promise = Promise::new(&mut |resolve, _reject| {
            let scheduled = window().and_then(|window| {
                window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
            });
            if scheduled.is_err() {
                // No timer available; resolve right away rather than hang.
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        if let Err(error) = JsFuture::from(promise).await {
            log::warn!("retry wait interrupted: {}", js_message(&error));
        }
    }
}

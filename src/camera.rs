//! Vendor camera HTTP API client.
//!
//! The camera exposes a JSON-RPC endpoint at `/sony/camera` on its own WiFi
//! network.  Every call POSTs `{"method", "params", "id", "version"}` and the
//! camera answers with either a `result` array or an `error` of the form
//! `[code, message]`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::RigConfig;
use crate::error::{Result, RigError};

const API_VERSION: &str = "1.0";
/// Storage ID the camera reports when the SD card is seated correctly.
const SD_CARD_ID: &str = "Memory Card 1";

/// Wire envelope of a camera API response.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    result: Option<Value>,
    error:  Option<Value>,
}

#[derive(Clone)]
pub struct CameraClient {
    http:     Client,
    endpoint: String,
    next_id:  Arc<AtomicU64>,
}

impl CameraClient {
    /// Build a client for the camera API at `endpoint` (`http://<ip>:<port>`).
    pub fn new(endpoint: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(RigError::Http)?;
        Ok(Self {
            http,
            endpoint,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn from_config(cfg: &RigConfig) -> Result<Self> {
        Self::new(cfg.camera_endpoint())
    }

    /// Liveview stream path the camera serves when `startLiveview` returns no
    /// usable URL.
    pub fn liveview_fallback_url(&self) -> String {
        format!("{}/liveview/liveviewstream", self.endpoint)
    }

    /// Issue one JSON-RPC call and return the `result` array.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "method":  method,
            "params":  params,
            "id":      id,
            "version": API_VERSION,
        });
        debug!("camera call {method} (id {id})");

        let resp = self
            .http
            .post(format!("{}/sony/camera", self.endpoint))
            .json(&body)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        let envelope: ApiEnvelope = resp.json().await?;

        if let Some(err) = envelope.error {
            let code = err.get(0).and_then(Value::as_i64).unwrap_or(-1);
            let message = err
                .get(1)
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            return Err(RigError::Camera { code, message });
        }
        envelope
            .result
            .ok_or_else(|| RigError::Protocol(format!("{method}: response has no result")))
    }

    // ── Read-only queries ─────────────────────────────────────────────────────

    /// Method names the camera currently accepts.
    pub async fn get_available_api_list(&self) -> Result<Vec<String>> {
        let result = self.call("getAvailableApiList", json!([])).await?;
        let names = result
            .get(0)
            .and_then(Value::as_array)
            .ok_or_else(|| RigError::Protocol("getAvailableApiList: no method array".into()))?;
        Ok(names
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect())
    }

    /// Storage ID of the first storage slot (e.g. `"Memory Card 1"`).
    pub async fn get_storage_information(&self) -> Result<String> {
        let result = self.call("getStorageInformation", json!([])).await?;
        result
            .get(0)
            .and_then(Value::as_array)
            .and_then(|slots| slots.first())
            .and_then(|slot| slot.get("storageID"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RigError::Protocol("getStorageInformation: no storageID".into()))
    }

    pub async fn get_flash_mode(&self) -> Result<String> {
        self.first_string("getFlashMode").await
    }

    pub async fn get_camera_function(&self) -> Result<String> {
        self.first_string("getCameraFunction").await
    }

    pub async fn get_postview_image_size(&self) -> Result<String> {
        self.first_string("getPostviewImageSize").await
    }

    /// Still quality setting, e.g. `"Fine"`.
    pub async fn get_still_quality(&self) -> Result<String> {
        let result = self.call("getStillQuality", json!([])).await?;
        result
            .get(0)
            .and_then(|v| v.get("stillQuality"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RigError::Protocol("getStillQuality: no stillQuality".into()))
    }

    /// Still image size, e.g. `"20M"`.
    pub async fn get_still_size(&self) -> Result<String> {
        let result = self.call("getStillSize", json!([])).await?;
        result
            .get(0)
            .and_then(|v| v.get("size"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RigError::Protocol("getStillSize: no size".into()))
    }

    // ── Mode changes ──────────────────────────────────────────────────────────

    pub async fn set_camera_function(&self, function: &str) -> Result<()> {
        self.call("setCameraFunction", json!([function])).await?;
        Ok(())
    }

    pub async fn set_postview_image_size(&self, size: &str) -> Result<()> {
        self.call("setPostviewImageSize", json!([size])).await?;
        Ok(())
    }

    // ── Capture / liveview ────────────────────────────────────────────────────

    /// Take a still picture.  Returns the postview URL of the shot.
    ///
    /// The camera nests the URL as `result[0][0]` and escapes slashes.
    pub async fn act_take_picture(&self) -> Result<String> {
        let result = self.call("actTakePicture", json!([])).await?;
        let url = result
            .get(0)
            .and_then(Value::as_array)
            .and_then(|urls| urls.first())
            .and_then(Value::as_str)
            .ok_or_else(|| RigError::Protocol("actTakePicture: no postview URL".into()))?;
        Ok(url.replace('\\', ""))
    }

    /// Start the liveview stream.  Returns the stream URL, falling back to the
    /// fixed liveview path when the camera's response carries none.
    pub async fn start_liveview(&self) -> Result<String> {
        let result = self.call("startLiveview", json!([])).await?;
        Ok(result
            .get(0)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.liveview_fallback_url()))
    }

    /// Helper for calls whose result is `[<string>]`.
    async fn first_string(&self, method: &str) -> Result<String> {
        let result = self.call(method, json!([])).await?;
        result
            .get(0)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RigError::Protocol(format!("{method}: no value")))
    }

    // ── Startup sequence ──────────────────────────────────────────────────────

    /// Put the camera into remote still shooting and log its state.
    ///
    /// An SD card mismatch is logged but does not abort: the operator may
    /// still want the live stream.
    pub async fn configure(&self) -> Result<()> {
        let apis = self.get_available_api_list().await?;

        if apis.iter().any(|a| a == "getStorageInformation") {
            match self.get_storage_information().await {
                Ok(id) if id == SD_CARD_ID => {
                    info!("SD card is inserted and operational: {id}");
                }
                Ok(id) => error!("SD card is not plugged or is misplaced: {id}"),
                Err(e) => error!("storage check failed: {e}"),
            }
        }

        match self.get_flash_mode().await {
            Ok(mode) => info!("flash mode: {mode}"),
            Err(e) => debug!("flash mode unavailable: {e}"),
        }

        self.set_camera_function("Remote Shooting").await?;
        let function = self.get_camera_function().await?;
        info!("camera function: {function}");

        self.set_postview_image_size("Original").await?;
        let postview = self.get_postview_image_size().await?;
        info!("postview image size: {postview}");

        match self.get_still_quality().await {
            Ok(q) => info!("still quality: {q}"),
            Err(e) => debug!("still quality unavailable: {e}"),
        }
        match self.get_still_size().await {
            Ok(s) => info!("still size: {s}"),
            Err(e) => debug!("still size unavailable: {e}"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_method(server: &MockServer, api: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path("/sony/camera"))
            .and(body_partial_json(json!({ "method": api })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn api_list_is_parsed() {
        let server = MockServer::start().await;
        mock_method(
            &server,
            "getAvailableApiList",
            json!({"result": [["getStorageInformation", "actTakePicture"]], "id": 1}),
        )
        .await;

        let client = CameraClient::new(server.uri()).unwrap();
        let apis = client.get_available_api_list().await.unwrap();
        assert_eq!(apis, vec!["getStorageInformation", "actTakePicture"]);
    }

    #[tokio::test]
    async fn error_response_maps_to_camera_error() {
        let server = MockServer::start().await;
        mock_method(
            &server,
            "actTakePicture",
            json!({"error": [1, "Not Available Now"], "id": 1}),
        )
        .await;

        let client = CameraClient::new(server.uri()).unwrap();
        match client.act_take_picture().await {
            Err(RigError::Camera { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "Not Available Now");
            }
            other => panic!("expected camera error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn take_picture_unescapes_postview_url() {
        let server = MockServer::start().await;
        mock_method(
            &server,
            "actTakePicture",
            json!({"result": [["http:\\/\\/10.0.0.1:8080\\/postview\\/DSC00042.JPG"]], "id": 2}),
        )
        .await;

        let client = CameraClient::new(server.uri()).unwrap();
        let url = client.act_take_picture().await.unwrap();
        assert_eq!(url, "http://10.0.0.1:8080/postview/DSC00042.JPG");
    }

    #[tokio::test]
    async fn storage_information_returns_first_slot_id() {
        let server = MockServer::start().await;
        mock_method(
            &server,
            "getStorageInformation",
            json!({"result": [[{"storageID": "Memory Card 1", "numberOfRecordableImages": 820}]], "id": 3}),
        )
        .await;

        let client = CameraClient::new(server.uri()).unwrap();
        assert_eq!(client.get_storage_information().await.unwrap(), "Memory Card 1");
    }

    #[tokio::test]
    async fn liveview_falls_back_when_response_is_empty() {
        let server = MockServer::start().await;
        mock_method(&server, "startLiveview", json!({"result": [], "id": 4})).await;

        let client = CameraClient::new(server.uri()).unwrap();
        let url = client.start_liveview().await.unwrap();
        assert_eq!(url, format!("{}/liveview/liveviewstream", server.uri()));
    }

    #[tokio::test]
    async fn missing_result_is_a_protocol_error() {
        let server = MockServer::start().await;
        mock_method(&server, "getFlashMode", json!({"id": 5})).await;

        let client = CameraClient::new(server.uri()).unwrap();
        assert!(matches!(
            client.get_flash_mode().await,
            Err(RigError::Protocol(_))
        ));
    }
}

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::models::{Dimensions, ModelFormat, ModelSpecification, RawModelData, Style};

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Transport fault: connection refused, DNS, reset, etc.
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),
    /// The backend answered, but not with a usable model.
    #[error("generation backend rejected the request: {0}")]
    Rejected(String),
    #[error("generation timed out after {0} ms")]
    Timeout(u64),
    #[error("generation cancelled")]
    Cancelled,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, spec: &ModelSpecification) -> Result<RawModelData, BackendError>;
}

/// Shorten base64 or other bulky strings for log lines.
pub fn preview(data: &str) -> String {
    if data.len() > 50 {
        let cut = data
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= 50)
            .last()
            .unwrap_or(0);
        format!("{}...[{} chars total]", &data[..cut], data.len())
    } else {
        data.to_string()
    }
}

/// HTTP adapter for the external model generation service.
pub struct HttpGenerationBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HttpGenerationBackend {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.api_key == DEMO_KEY
    }

    async fn perform_api_call(&self, spec: &ModelSpecification) -> Result<RawModelData, BackendError> {
        let url = format!("{}/generate", self.base_url);
        info!("🔗 Making request to: {}", url);

        let request_body = json!({
            "prompt": spec.prompt,
            "quality": spec.quality,
            "style": spec.style,
            "complexity": spec.complexity,
            "targetPolyCount": spec.target_poly_count,
            "timeoutMs": spec.timeout_ms,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ Backend error response: {}", preview(&error_body));
            return Err(BackendError::Rejected(format!(
                "status={} body={}",
                status,
                preview(&error_body)
            )));
        }

        let parsed: BackendResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Rejected(format!("parse error: {e}")))?;

        info!("🧊 Received {} model: {}", parsed.format, preview(&parsed.data));
        parsed.into_raw(spec)
    }

    /// Small glTF document standing in for a real model in demo mode.
    fn generate_placeholder_model(&self, spec: &ModelSpecification) -> RawModelData {
        let material = placeholder_material(spec.style);
        let document = json!({
            "asset": { "version": "2.0", "generator": "model_forge placeholder" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "placeholder", "mesh": 0 }],
            "meshes": [{ "name": "placeholder", "primitives": [{ "attributes": {}, "material": 0 }] }],
            "materials": [{ "name": material }],
            "extras": {
                "prompt": spec.prompt,
                "complexity": spec.complexity,
                "targetPolyCount": spec.target_poly_count,
            },
        });

        RawModelData {
            payload: Bytes::from(document.to_string()),
            format: ModelFormat::Gltf,
            poly_count: spec.target_poly_count,
            texture_count: 0,
            dimensions: Dimensions::default(),
            materials: BTreeSet::from([material.to_string()]),
        }
    }
}

fn placeholder_material(style: Style) -> &'static str {
    match style {
        Style::Realistic => "pbr-neutral",
        Style::Stylized => "toon",
        Style::Abstract => "iridescent",
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(&self, spec: &ModelSpecification) -> Result<RawModelData, BackendError> {
        if self.is_demo() {
            info!("Using demo mode - no real models generated");
            return Ok(self.generate_placeholder_model(spec));
        }

        info!(
            complexity = spec.complexity,
            target_poly_count = spec.target_poly_count,
            "Generating model with backend..."
        );
        self.perform_api_call(spec).await
    }
}

/// Enforces the per-call timeout and caller cancellation around a backend.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub async fn generate(
        &self,
        spec: &ModelSpecification,
        cancel: &CancellationToken,
    ) -> Result<RawModelData, BackendError> {
        let budget = Duration::from_millis(spec.timeout_ms);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackendError::Cancelled),
            result = tokio::time::timeout(budget, self.backend.generate(spec)) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Timeout(spec.timeout_ms)),
            },
        }
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct BackendResponse {
    format: String,
    data: String,
    #[serde(default)]
    metadata: BackendMetadata,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BackendMetadata {
    #[serde(default)]
    poly_count: Option<u32>,
    #[serde(default)]
    texture_count: Option<u32>,
    #[serde(default)]
    dimensions: Option<Dimensions>,
    #[serde(default)]
    materials: Vec<String>,
}

impl BackendResponse {
    /// Missing or zero metrics fall back to what was asked for.
    fn into_raw(self, spec: &ModelSpecification) -> Result<RawModelData, BackendError> {
        let format = ModelFormat::parse(&self.format)
            .ok_or_else(|| BackendError::Rejected(format!("unsupported format: {}", self.format)))?;

        let payload = base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|e| BackendError::Rejected(format!("invalid base64 payload: {e}")))?;
        if payload.is_empty() {
            return Err(BackendError::Rejected("empty model payload".into()));
        }

        let metadata = self.metadata;
        let dimensions = metadata
            .dimensions
            .filter(|d| d.width > 0.0 && d.height > 0.0 && d.depth > 0.0)
            .unwrap_or_default();
        let mut materials: BTreeSet<String> = metadata
            .materials
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if materials.is_empty() {
            materials.insert("default".to_string());
        }

        Ok(RawModelData {
            payload: Bytes::from(payload),
            format,
            poly_count: metadata
                .poly_count
                .filter(|n| *n > 0)
                .unwrap_or(spec.target_poly_count),
            texture_count: metadata.texture_count.unwrap_or(0),
            dimensions,
            materials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quality;
    use crate::testing::{ScriptedBackend, Step};
    use pretty_assertions::assert_eq;

    fn spec(timeout_ms: u64) -> ModelSpecification {
        ModelSpecification {
            prompt: "a chair".into(),
            quality: Quality::Low,
            style: Style::Realistic,
            complexity: 40,
            target_poly_count: 1000,
            timeout_ms,
        }
    }

    fn response(value: serde_json::Value) -> BackendResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_backend_response_and_keeps_reported_format() {
        let raw = response(json!({
            "format": "gltf",
            "data": "aGVsbG8=",
            "metadata": {
                "polyCount": 4200,
                "textureCount": 2,
                "dimensions": { "width": 2.0, "height": 1.0, "depth": 0.5 },
                "materials": ["wood", "metal", "wood"]
            }
        }))
        .into_raw(&spec(1000))
        .unwrap();

        assert_eq!(raw.format, ModelFormat::Gltf);
        assert_eq!(&raw.payload[..], b"hello");
        assert_eq!(raw.poly_count, 4200);
        assert_eq!(raw.texture_count, 2);
        assert_eq!(raw.dimensions.width, 2.0);
        assert_eq!(raw.materials.len(), 2);
    }

    #[test]
    fn missing_metrics_fall_back_to_spec() {
        let raw = response(json!({ "format": "glb", "data": "aGVsbG8=" }))
            .into_raw(&spec(1000))
            .unwrap();

        assert_eq!(raw.poly_count, 1000);
        assert_eq!(raw.texture_count, 0);
        assert_eq!(raw.dimensions, Dimensions::default());
        assert_eq!(raw.materials, BTreeSet::from(["default".to_string()]));
    }

    #[test]
    fn unusable_responses_are_rejections() {
        let unknown = response(json!({ "format": "obj", "data": "aGVsbG8=" })).into_raw(&spec(1000));
        let garbled = response(json!({ "format": "glb", "data": "%%%" })).into_raw(&spec(1000));
        let empty = response(json!({ "format": "glb", "data": "" })).into_raw(&spec(1000));

        assert!(matches!(unknown, Err(BackendError::Rejected(_))));
        assert!(matches!(garbled, Err(BackendError::Rejected(_))));
        assert!(matches!(empty, Err(BackendError::Rejected(_))));
    }

    #[tokio::test]
    async fn demo_mode_returns_placeholder() {
        let backend = HttpGenerationBackend::new(DEMO_KEY.into(), "http://unused".into());
        let raw = backend.generate(&spec(1000)).await.unwrap();

        assert_eq!(raw.format, ModelFormat::Gltf);
        assert_eq!(raw.poly_count, 1000);
        assert!(raw.materials.contains("pbr-neutral"));
        let doc: serde_json::Value = serde_json::from_slice(&raw.payload).unwrap();
        assert_eq!(doc["asset"]["version"], "2.0");
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        // port 9 (discard) on localhost is closed in test environments
        let backend = HttpGenerationBackend::new("key".into(), "http://127.0.0.1:9".into());
        let result = backend.generate(&spec(1000)).await;

        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let backend = Arc::new(ScriptedBackend::new(vec![Step::Hang]));
        let client = GenerationClient::new(backend);

        let result = client.generate(&spec(20), &CancellationToken::new()).await;

        assert_eq!(result.unwrap_err(), BackendError::Timeout(20));
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_timeout() {
        let backend = Arc::new(ScriptedBackend::new(vec![Step::Hang]));
        let client = GenerationClient::new(backend);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.generate(&spec(60_000), &cancel).await;

        assert_eq!(result.unwrap_err(), BackendError::Cancelled);
    }

    #[test]
    fn preview_truncates_long_strings() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(120);
        assert_eq!(preview(&long), format!("{}...[120 chars total]", "x".repeat(50)));
    }
}

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use validator::{Validate, ValidationError};

use crate::error::ValidationFailure;
use crate::fingerprint::fingerprint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Realistic,
    Stylized,
    Abstract,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realistic => "realistic",
            Self::Stylized => "stylized",
            Self::Abstract => "abstract",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "realistic" => Some(Self::Realistic),
            "stylized" => Some(Self::Stylized),
            "abstract" => Some(Self::Abstract),
            _ => None,
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Inbound request ---

fn default_quality() -> String {
    Quality::Medium.as_str().to_string()
}

fn default_style() -> String {
    Style::Realistic.as_str().to_string()
}

fn validate_quality(value: &str) -> Result<(), ValidationError> {
    match Quality::parse(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("quality")
            .with_message(Cow::Borrowed("Quality must be one of: low, medium, high"))),
    }
}

fn validate_style(value: &str) -> Result<(), ValidationError> {
    match Style::parse(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("style")
            .with_message(Cow::Borrowed("Style must be one of: realistic, stylized, abstract"))),
    }
}

/// Request body as it arrives on the wire, before sanitisation and validation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateRequestBody {
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Prompt must be between 1 and 5000 characters"
    ))]
    pub prompt: String,
    #[serde(default = "default_quality")]
    #[validate(custom(function = "validate_quality"))]
    pub quality: String,
    #[serde(default = "default_style")]
    #[validate(custom(function = "validate_style"))]
    pub style: String,
}

impl GenerateRequestBody {
    /// Sanitise and validate into an immutable [`GenerationRequest`].
    pub fn into_request(self) -> Result<GenerationRequest, ValidationFailure> {
        let body = Self {
            prompt: sanitize_prompt(&self.prompt),
            ..self
        };
        body.validate()?;

        // validate() has already checked both enums, the fallbacks are unreachable
        let quality = Quality::parse(&body.quality)
            .ok_or_else(|| ValidationFailure::single("quality", "Invalid quality"))?;
        let style = Style::parse(&body.style)
            .ok_or_else(|| ValidationFailure::single("style", "Invalid style"))?;

        Ok(GenerationRequest {
            prompt: body.prompt,
            quality,
            style,
        })
    }
}

/// Drop control characters other than newlines and tabs, then trim.
pub fn sanitize_prompt(prompt: &str) -> String {
    let kept: String = prompt
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    kept.trim().to_string()
}

/// A validated generation request. Only [`GenerateRequestBody::into_request`] builds one
/// from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    quality: Quality,
    style: Style,
}

impl GenerationRequest {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.prompt, self.quality, self.style)
    }
}

// --- Generation specification & backend output ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpecification {
    pub prompt: String,
    pub quality: Quality,
    pub style: Style,
    pub complexity: u32,
    pub target_poly_count: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Glb,
    Gltf,
}

impl ModelFormat {
    /// Accepts bare format tags and the matching MIME types.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "glb" | "model/gltf-binary" => Some(Self::Glb),
            "gltf" | "model/gltf+json" => Some(Self::Gltf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            depth: 1.0,
        }
    }
}

/// Geometry returned by the generation backend. Consumed by the post-processor, never stored.
#[derive(Debug, Clone)]
pub struct RawModelData {
    pub payload: Bytes,
    pub format: ModelFormat,
    pub poly_count: u32,
    pub texture_count: u32,
    pub dimensions: Dimensions,
    pub materials: BTreeSet<String>,
}

// --- Artifact ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub poly_count: u32,
    pub texture_count: u32,
    pub dimensions: Dimensions,
    pub file_size_bytes: u64,
    pub generation_time_ms: u64,
    pub materials: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnimationKind {
    Rotation,
    Translation,
    Scale,
    Material,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrollAnimation {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AnimationKind,
    /// Present for rotation and translation, absent otherwise.
    pub axis: Option<Axis>,
    pub duration_ms: u64,
    pub easing: Easing,
    pub intensity: f64,
    pub description: String,
}

/// What the cache holds per fingerprint. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedArtifact {
    pub model_id: String,
    pub encoded_data: String,
    pub format: ModelFormat,
    pub metadata: ModelMetadata,
    pub animations: Vec<ScrollAnimation>,
}

// --- Outbound response ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelData {
    pub format: ModelFormat,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimationSet {
    pub suggestions: Vec<ScrollAnimation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub model_id: String,
    pub model_data: ModelData,
    pub metadata: ModelMetadata,
    pub animations: AnimationSet,
}

impl From<CachedArtifact> for GenerateResponse {
    fn from(artifact: CachedArtifact) -> Self {
        Self {
            model_id: artifact.model_id,
            model_data: ModelData {
                format: artifact.format,
                data: artifact.encoded_data,
            },
            metadata: artifact.metadata,
            animations: AnimationSet {
                suggestions: artifact.animations,
            },
        }
    }
}

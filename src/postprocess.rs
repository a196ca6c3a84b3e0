use std::time::Duration;

use base64::Engine;

use crate::models::{
    AnimationKind, Axis, Easing, ModelFormat, ModelMetadata, RawModelData, ScrollAnimation,
};
use crate::planner::contains_any;

const ROTATION_HINTS: &[&str] = &["spin", "rotate", "turn", "circular"];
const MOVEMENT_HINTS: &[&str] = &["fly", "float", "move", "drift"];
const SCALE_HINTS: &[&str] = &["grow", "shrink", "expand", "pulse"];

/// Dense models read well turning in place.
const ROTATION_POLY_THRESHOLD: u32 = 3000;
/// Sparse models get a subtle pulse instead.
const SCALE_POLY_THRESHOLD: u32 = 2000;

#[derive(Debug, Clone)]
pub struct ProcessedModel {
    pub encoded_data: String,
    pub format: ModelFormat,
    pub metadata: ModelMetadata,
    pub animations: Vec<ScrollAnimation>,
}

/// `generation_time` covers the whole generation phase, retries included.
pub fn process(raw: RawModelData, prompt: &str, generation_time: Duration) -> ProcessedModel {
    let encoded_data = base64::engine::general_purpose::STANDARD.encode(&raw.payload);
    let metadata = ModelMetadata {
        poly_count: raw.poly_count.max(1),
        texture_count: raw.texture_count,
        dimensions: raw.dimensions,
        file_size_bytes: raw.payload.len() as u64,
        generation_time_ms: (generation_time.as_millis() as u64).max(1),
        materials: raw.materials,
    };
    let animations = suggest_animations(prompt, &metadata);

    ProcessedModel {
        encoded_data,
        format: raw.format,
        metadata,
        animations,
    }
}

/// Rotation, translation and scale in that order, each when its rule fires.
/// Falls back to a single slow rotation so the list is never empty.
pub fn suggest_animations(prompt: &str, metadata: &ModelMetadata) -> Vec<ScrollAnimation> {
    let lowered = prompt.to_lowercase();
    let mut suggestions = Vec::new();

    if contains_any(&lowered, ROTATION_HINTS) || metadata.poly_count > ROTATION_POLY_THRESHOLD {
        suggestions.push(ScrollAnimation {
            name: "Spin".into(),
            kind: AnimationKind::Rotation,
            axis: Some(Axis::Y),
            duration_ms: 8000,
            easing: Easing::Linear,
            intensity: 1.0,
            description: "Full turn around the vertical axis as the page scrolls".into(),
        });
    }

    if contains_any(&lowered, MOVEMENT_HINTS) {
        suggestions.push(ScrollAnimation {
            name: "Drift".into(),
            kind: AnimationKind::Translation,
            axis: Some(Axis::Z),
            duration_ms: 6000,
            easing: Easing::EaseInOut,
            intensity: 0.5,
            description: "Glides toward the viewer while scrolling".into(),
        });
    }

    if contains_any(&lowered, SCALE_HINTS) || metadata.poly_count < SCALE_POLY_THRESHOLD {
        suggestions.push(ScrollAnimation {
            name: "Pulse".into(),
            kind: AnimationKind::Scale,
            axis: None,
            duration_ms: 4000,
            easing: Easing::EaseOut,
            intensity: 0.2,
            description: "Gently grows into view".into(),
        });
    }

    if suggestions.is_empty() {
        suggestions.push(ScrollAnimation {
            name: "Showcase".into(),
            kind: AnimationKind::Rotation,
            axis: Some(Axis::Y),
            duration_ms: 10_000,
            easing: Easing::Linear,
            intensity: 0.8,
            description: "Slow turntable rotation to show every side".into(),
        });
    }

    suggestions
}

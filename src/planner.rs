use crate::models::{ModelSpecification, Quality, Style};

pub const BASE_COMPLEXITY: i32 = 50;
pub const MIN_COMPLEXITY: u32 = 10;
pub const MAX_COMPLEXITY: u32 = 100;

/// The backend only sees the first 500 characters of a prompt.
pub const MAX_SPEC_PROMPT_CHARS: usize = 500;

const DETAIL_KEYWORDS: &[&str] = &["detailed", "complex", "intricate", "elaborate", "refined"];
const SIMPLE_KEYWORDS: &[&str] = &["simple", "basic", "minimal", "clean", "smooth"];

const KEYWORD_WEIGHT: i32 = 20;
const LENGTH_WEIGHT: i32 = 10;
const LONG_PROMPT_WORDS: usize = 50;
const SHORT_PROMPT_WORDS: usize = 10;

pub fn plan(prompt: &str, quality: Quality, style: Style) -> ModelSpecification {
    let (target_poly_count, timeout_ms) = budget(quality);
    ModelSpecification {
        prompt: prompt.chars().take(MAX_SPEC_PROMPT_CHARS).collect(),
        quality,
        style,
        complexity: complexity_score(prompt),
        target_poly_count,
        timeout_ms,
    }
}

/// Keyword and length driven complexity, clamped to `[10, 100]`.
pub fn complexity_score(prompt: &str) -> u32 {
    let lowered = prompt.to_lowercase();
    let mut score = BASE_COMPLEXITY;

    if contains_any(&lowered, DETAIL_KEYWORDS) {
        score += KEYWORD_WEIGHT;
    }
    if contains_any(&lowered, SIMPLE_KEYWORDS) {
        score -= KEYWORD_WEIGHT;
    }

    let words = prompt.split_whitespace().count();
    if words > LONG_PROMPT_WORDS {
        score += LENGTH_WEIGHT;
    } else if words < SHORT_PROMPT_WORDS {
        score -= LENGTH_WEIGHT;
    }

    score.clamp(MIN_COMPLEXITY as i32, MAX_COMPLEXITY as i32) as u32
}

/// `(target_poly_count, timeout_ms)` per quality tier.
pub fn budget(quality: Quality) -> (u32, u64) {
    match quality {
        Quality::Low => (1_000, 15_000),
        Quality::Medium => (5_000, 25_000),
        Quality::High => (10_000, 30_000),
    }
}

pub(crate) fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

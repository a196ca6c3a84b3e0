//! Bounded retry with progressive simplification. No backoff between attempts.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::backend::{BackendError, GenerationClient};
use crate::error::GenerationError;
use crate::models::{ModelSpecification, RawModelData};

pub const DEFAULT_MAX_RETRIES: u32 = 2;

const COMPLEXITY_STEP: u32 = 20;
const MIN_COMPLEXITY: u32 = 10;
const MIN_POLY_COUNT: u32 = 100;

/// Shrink a specification for the next attempt. Never grows either value.
pub fn degrade(spec: ModelSpecification) -> ModelSpecification {
    ModelSpecification {
        complexity: spec
            .complexity
            .saturating_sub(COMPLEXITY_STEP)
            .max(MIN_COMPLEXITY)
            .min(spec.complexity),
        target_poly_count: (spec.target_poly_count / 2)
            .max(MIN_POLY_COUNT)
            .min(spec.target_poly_count),
        ..spec
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub raw: RawModelData,
    /// Total attempts made, including the successful one.
    pub attempts: u32,
    /// The specification the successful attempt used.
    pub spec: ModelSpecification,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    max_retries: u32,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryController {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Attempt until success, exhaustion or cancellation.
    pub async fn run(
        &self,
        client: &GenerationClient,
        spec: ModelSpecification,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome, GenerationError> {
        let mut spec = spec;
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            let attempt = failures + 1;

            match client.generate(&spec, cancel).await {
                Ok(raw) => {
                    info!(attempt, complexity = spec.complexity, "✅ Generation attempt succeeded");
                    return Ok(RetryOutcome {
                        raw,
                        attempts: attempt,
                        spec,
                    });
                }
                Err(BackendError::Cancelled) => {
                    info!(attempt, "Generation cancelled by caller");
                    return Err(GenerationError::Cancelled);
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.max_retries {
                        error!(attempts = failures, error = %e, "❌ Generation exhausted");
                        return Err(GenerationError::Exhausted {
                            attempts: failures,
                            last_error: e,
                        });
                    }
                    warn!(attempt, error = %e, "Generation attempt failed, simplifying and retrying");
                    spec = degrade(spec);
                }
            }
        }
    }
}

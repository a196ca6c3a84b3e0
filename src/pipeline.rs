use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::GenerationClient;
use crate::cache::ArtifactCache;
use crate::error::GenerationError;
use crate::models::{CachedArtifact, GenerationRequest};
use crate::planner::plan;
use crate::postprocess::process;
use crate::retry::RetryController;

type FlightTable = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct Orchestrator {
    cache: ArtifactCache,
    client: GenerationClient,
    retry: RetryController,
    in_flight: FlightTable,
}

/// Membership in the per-fingerprint lock table. The entry is removed when
/// the last member leaves.
struct Flight<'a> {
    table: &'a FlightTable,
    model_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        let last = Arc::strong_count(&self.lock) <= 2;
        if last
            && table
                .get(&self.model_id)
                .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock))
        {
            table.remove(&self.model_id);
        }
    }
}

impl Orchestrator {
    pub fn new(cache: ArtifactCache, client: GenerationClient, retry: RetryController) -> Self {
        Self {
            cache,
            client,
            retry,
            in_flight: Mutex::default(),
        }
    }

    /// Return the artifact for `request`, generating it on a cache miss.
    ///
    /// Concurrent calls for the same fingerprint share one generation: later
    /// callers wait for the first and then read its result from the cache.
    pub async fn generate_model(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<CachedArtifact, GenerationError> {
        let model_id = request.fingerprint();

        if let Some(hit) = self.cache.get(&model_id).await {
            info!(%model_id, "🎯 Cache hit");
            return Ok(hit);
        }

        let flight = self.join_flight(&model_id);
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            permit = flight.lock.lock() => permit,
        };

        if let Some(hit) = self.cache.get(&model_id).await {
            info!(%model_id, "🎯 Cache filled by a concurrent request");
            return Ok(hit);
        }

        let spec = plan(request.prompt(), request.quality(), request.style());
        info!(
            %model_id,
            complexity = spec.complexity,
            target_poly_count = spec.target_poly_count,
            timeout_ms = spec.timeout_ms,
            "🚀 Generating model"
        );

        let started = Instant::now();
        let outcome = self.retry.run(&self.client, spec, cancel).await?;
        let processed = process(outcome.raw, request.prompt(), started.elapsed());

        let artifact = CachedArtifact {
            model_id: model_id.clone(),
            encoded_data: processed.encoded_data,
            format: processed.format,
            metadata: processed.metadata,
            animations: processed.animations,
        };

        self.cache.put(&model_id, &artifact).await;
        info!(
            %model_id,
            attempts = outcome.attempts,
            poly_count = artifact.metadata.poly_count,
            generation_time_ms = artifact.metadata.generation_time_ms,
            suggestions = artifact.animations.len(),
            "✅ Model generated"
        );
        Ok(artifact)
    }

    pub async fn cached(&self, model_id: &str) -> Option<CachedArtifact> {
        self.cache.get(model_id).await
    }

    pub async fn invalidate(&self, model_id: &str) -> bool {
        self.cache.invalidate(model_id).await
    }

    fn join_flight(&self, model_id: &str) -> Flight<'_> {
        let lock = self
            .in_flight
            .lock()
            .entry(model_id.to_string())
            .or_default()
            .clone();
        debug!(%model_id, waiters = Arc::strong_count(&lock) - 1, "Joined generation flight");
        Flight {
            table: &self.in_flight,
            model_id: model_id.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn flights(&self) -> usize {
        self.in_flight.lock().len()
    }
}

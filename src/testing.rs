//! Test doubles shared by the unit tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::backend::{BackendError, GenerationBackend};
use crate::cache::{InMemoryStore, KeyValueStore, StoreError};
use crate::models::{
    CachedArtifact, Dimensions, ModelFormat, ModelMetadata, ModelSpecification, RawModelData,
};

#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail(BackendError),
    /// Never answers within any sane timeout.
    Hang,
    /// Answers successfully after the given number of milliseconds.
    Delay(u64),
}

/// Backend that plays `steps` in order and repeats the last one.
pub struct ScriptedBackend {
    steps: Vec<Step>,
    calls: AtomicUsize,
    specs: Mutex<Vec<ModelSpecification>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
            specs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn specs(&self) -> Vec<ModelSpecification> {
        self.specs.lock().clone()
    }
}

pub fn raw_model(spec: &ModelSpecification) -> RawModelData {
    RawModelData {
        payload: Bytes::from_static(b"glTF-binary-payload"),
        format: ModelFormat::Glb,
        poly_count: spec.target_poly_count,
        texture_count: 1,
        dimensions: Dimensions {
            width: 1.5,
            height: 2.0,
            depth: 0.5,
        },
        materials: BTreeSet::from(["clay".to_string()]),
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, spec: &ModelSpecification) -> Result<RawModelData, BackendError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.specs.lock().push(spec.clone());
        let step = self
            .steps
            .get(index)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or(Step::Succeed);

        match step {
            Step::Succeed => Ok(raw_model(spec)),
            Step::Fail(e) => Err(e),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::Unavailable("hung".into()))
            }
            Step::Delay(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(raw_model(spec))
            }
        }
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn put(&self, _key: &str, _value: Bytes, _ttl_secs: u64) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// In-memory store that counts writes.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    puts: AtomicUsize,
}

impl CountingStore {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes, ttl_secs: u64) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }
}

pub fn sample_artifact(model_id: &str) -> CachedArtifact {
    CachedArtifact {
        model_id: model_id.to_string(),
        encoded_data: "Z2xURg==".into(),
        format: ModelFormat::Glb,
        metadata: ModelMetadata {
            poly_count: 1200,
            texture_count: 0,
            dimensions: Dimensions::default(),
            file_size_bytes: 4,
            generation_time_ms: 42,
            materials: BTreeSet::from(["default".to_string()]),
        },
        animations: Vec::new(),
    }
}

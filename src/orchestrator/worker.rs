// ABOUTME: Worker trait, the invocation interface, and a typed factory for building workers.
// ABOUTME: WorkerPool resolves identities to live workers; WorkerFactory maps kind tags to constructors.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The Worker trait that all worker adapters implement.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Worker identifier, matching its registry identity.
    fn id(&self) -> &str;

    /// Answer a (sub-)query.
    async fn execute(&self, query: &str) -> Result<String, String>;
}

/// Invocation interface consumed by the dispatcher. The dispatcher applies
/// the timeout; implementations only resolve and call.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, identity: &str, sub_query: &str) -> Result<String, InvokeFailure>;
}

/// Why an invocation produced no output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeFailure {
    NotFound,
    Failed(String),
}

// =============================================================================
// Worker Factory
// =============================================================================

/// Startup description of a worker to construct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub identity: String,
    /// Factory discriminant, e.g. "http" or "echo".
    pub kind: String,
    #[serde(default)]
    pub settings: serde_json::Value,
}

type Constructor = Box<dyn Fn(&WorkerSpec) -> Result<Arc<dyn Worker>, String> + Send + Sync>;

/// Map from kind tag to constructor.
#[derive(Default)]
pub struct WorkerFactory {
    constructors: HashMap<String, Constructor>,
}

impl WorkerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_kind<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn(&WorkerSpec) -> Result<Arc<dyn Worker>, String> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Box::new(constructor));
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn build(&self, spec: &WorkerSpec) -> Result<Arc<dyn Worker>, String> {
        let constructor = self
            .constructors
            .get(&spec.kind)
            .ok_or_else(|| format!("Unknown worker kind: {}", spec.kind))?;
        constructor(spec)
    }
}

// =============================================================================
// Worker Pool
// =============================================================================

/// Live workers keyed by identity.
#[derive(Default)]
pub struct WorkerPool {
    workers: RwLock<HashMap<String, Arc<dyn Worker>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, worker: Arc<dyn Worker>) {
        let id = worker.id().to_string();
        self.workers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), worker);
        log::debug!("[WorkerPool] Added worker {}", id);
    }

    /// Build a worker through the factory and add it under the spec identity.
    pub fn spawn(&self, factory: &WorkerFactory, spec: &WorkerSpec) -> Result<(), String> {
        let worker = factory.build(spec)?;
        if worker.id() != spec.identity {
            return Err(format!(
                "Factory for kind {} built worker {} but spec names {}",
                spec.kind,
                worker.id(),
                spec.identity
            ));
        }
        self.insert(worker);
        Ok(())
    }

    pub fn remove(&self, identity: &str) -> bool {
        self.workers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(identity)
            .is_some()
    }

    pub fn get(&self, identity: &str) -> Option<Arc<dyn Worker>> {
        self.workers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .cloned()
    }
}

#[async_trait]
impl Invoker for WorkerPool {
    async fn invoke(&self, identity: &str, sub_query: &str) -> Result<String, InvokeFailure> {
        // Clone the Arc out so the lock is not held across the await.
        let worker = self.get(identity).ok_or(InvokeFailure::NotFound)?;
        worker.execute(sub_query).await.map_err(InvokeFailure::Failed)
    }
}

// ABOUTME: Deterministic test doubles for the oracle and workers.
// ABOUTME: Call-counting oracle stub and scripted workers with delays and failures.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::error::OracleError;
use super::oracle::Oracle;
use super::types::{ArbitrationRequest, ArbitrationResponse, DecompositionRequest, SelectionMode};
use super::worker::Worker;

/// Oracle stub with scripted answers and call counters.
pub struct StubOracle {
    selection: Result<Vec<i64>, OracleError>,
    decomposition: Result<HashMap<String, String>, OracleError>,
    arbitrate_calls: AtomicUsize,
    decompose_calls: AtomicUsize,
    last_mode: Mutex<Option<SelectionMode>>,
    last_decomposition: Mutex<Option<DecompositionRequest>>,
}

impl StubOracle {
    pub fn selecting(indices: Vec<i64>) -> Self {
        Self {
            selection: Ok(indices),
            decomposition: Ok(HashMap::new()),
            arbitrate_calls: AtomicUsize::new(0),
            decompose_calls: AtomicUsize::new(0),
            last_mode: Mutex::new(None),
            last_decomposition: Mutex::new(None),
        }
    }

    /// Every call fails with `Unavailable`.
    pub fn failing() -> Self {
        let mut stub = Self::selecting(vec![]);
        stub.selection = Err(OracleError::Unavailable("stub oracle offline".into()));
        stub.decomposition = Err(OracleError::Unavailable("stub oracle offline".into()));
        stub
    }

    pub fn with_sub_queries(mut self, pairs: &[(&str, &str)]) -> Self {
        self.decomposition = Ok(pairs
            .iter()
            .map(|(id, q)| (id.to_string(), q.to_string()))
            .collect());
        self
    }

    pub fn with_failing_decomposition(mut self) -> Self {
        self.decomposition = Err(OracleError::Malformed("stub decomposition garbage".into()));
        self
    }

    pub fn arbitrate_calls(&self) -> usize {
        self.arbitrate_calls.load(Ordering::SeqCst)
    }

    pub fn decompose_calls(&self) -> usize {
        self.decompose_calls.load(Ordering::SeqCst)
    }

    pub fn last_mode(&self) -> Option<SelectionMode> {
        *self.last_mode.lock().unwrap()
    }

    pub fn last_decomposition(&self) -> Option<DecompositionRequest> {
        self.last_decomposition.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for StubOracle {
    async fn arbitrate(
        &self,
        request: &ArbitrationRequest,
    ) -> Result<ArbitrationResponse, OracleError> {
        self.arbitrate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_mode.lock().unwrap() = Some(request.mode);
        self.selection.clone().map(|indices| ArbitrationResponse {
            indices,
            rationale: "stub rationale".to_string(),
        })
    }

    async fn decompose(
        &self,
        request: &DecompositionRequest,
    ) -> Result<HashMap<String, String>, OracleError> {
        self.decompose_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_decomposition.lock().unwrap() = Some(request.clone());
        self.decomposition.clone()
    }
}

/// Worker that answers after a fixed delay, echoing its input or failing.
pub struct StubWorker {
    id: String,
    delay: Duration,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl StubWorker {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            delay: Duration::ZERO,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for StubWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, query: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(message.clone()),
            None => Ok(format!("{} handled: {}", self.id, query)),
        }
    }
}

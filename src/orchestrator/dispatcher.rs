// ABOUTME: Concurrent dispatcher that invokes each selected worker with its sub-query.
// ABOUTME: One task per worker with an independent timeout; results keep selection order.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::error::InvocationError;
use super::types::InvocationResult;
use super::worker::{InvokeFailure, Invoker};

/// Default per-invocation timeout, roughly one LLM round trip.
pub const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Fans out worker invocations and collects exactly one result per worker.
pub struct Dispatcher {
    invoker: Arc<dyn Invoker>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self {
            invoker,
            timeout: DEFAULT_INVOCATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke every `(identity, sub_query)` pair concurrently.
    ///
    /// The returned vector is indexed by position in `assignments`, not by
    /// completion order. A slow or failing worker never cancels the others.
    pub async fn dispatch(&self, assignments: &[(String, String)]) -> Vec<InvocationResult> {
        let mut handles = Vec::with_capacity(assignments.len());

        for (identity, sub_query) in assignments {
            let invoker = self.invoker.clone();
            let timeout = self.timeout;
            let identity = identity.clone();
            let sub_query = sub_query.clone();

            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let outcome =
                    tokio::time::timeout(timeout, invoker.invoke(&identity, &sub_query)).await;
                let elapsed = started.elapsed();

                let error = match outcome {
                    Ok(Ok(output)) => {
                        return InvocationResult::succeeded(identity, sub_query, output, elapsed);
                    }
                    Ok(Err(InvokeFailure::NotFound)) => InvocationError::NotFound,
                    Ok(Err(InvokeFailure::Failed(message))) => InvocationError::Failed(message),
                    Err(_) => InvocationError::Timeout(timeout),
                };
                log::error!("[Dispatcher] Worker {} failed: {}", identity, error);
                InvocationResult::failed(identity, sub_query, error.to_string(), elapsed)
            });

            handles.push(handle);
        }

        log::info!("[Dispatcher] Dispatched {} worker(s)", handles.len());

        let mut results = Vec::with_capacity(handles.len());
        for (handle, (identity, sub_query)) in handles.into_iter().zip(assignments) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    log::error!("[Dispatcher] Worker task for {} panicked: {}", identity, e);
                    results.push(InvocationResult::failed(
                        identity.clone(),
                        sub_query.clone(),
                        InvocationError::Panicked.to_string(),
                        Duration::ZERO,
                    ));
                }
            }
        }

        results
    }
}

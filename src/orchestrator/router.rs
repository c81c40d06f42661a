// ABOUTME: Router facade running the full pipeline: stage 1, arbitration, decomposition, dispatch.
// ABOUTME: Records every invocation and aggregates results into a single response.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::aggregator::{self, NO_AGENTS_MESSAGE};
use super::arbiter::{Arbitration, SemanticArbiter};
use super::decomposer::QueryDecomposer;
use super::dispatcher::Dispatcher;
use super::error::RouterError;
use super::filter::Stage1Filter;
use super::oracle::{GatewayOracle, Oracle};
use super::registry::Registry;
use super::tracking::{ChannelRecorder, InvocationRecorder, NoopRecorder};
use super::types::{
    ArbitrationCandidate, ArbitrationStatus, Candidate, InvocationResult, RoutingDecision,
    SelectionMode, WorkerDescriptor,
};
use super::worker::Invoker;
use crate::config::{ConfigError, RouterConfig};

/// Everything produced while handling one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandledQuery {
    pub decision: RoutingDecision,
    /// One entry per selected worker, in selection order.
    pub results: Vec<InvocationResult>,
    pub response: String,
}

/// Entry point for routing queries to registered workers.
pub struct Router {
    registry: Arc<Registry>,
    filter: Stage1Filter,
    arbiter: SemanticArbiter,
    decomposer: QueryDecomposer,
    dispatcher: Dispatcher,
    recorder: Arc<dyn InvocationRecorder>,
    fallback_on_arbitration_error: bool,
}

impl Router {
    pub fn new(
        registry: Arc<Registry>,
        oracle: Arc<dyn Oracle>,
        invoker: Arc<dyn Invoker>,
        config: &RouterConfig,
    ) -> Self {
        let mut filter = Stage1Filter::new(config.min_score, config.max_candidates);
        if let Some(tags) = &config.candidate_tags {
            filter = filter.with_tags(tags.clone());
        }

        Self {
            registry,
            filter,
            arbiter: SemanticArbiter::new(oracle.clone())
                .with_skip_threshold(config.arbitration_skip_threshold)
                .with_mode(config.selection_mode),
            decomposer: QueryDecomposer::new(oracle),
            dispatcher: Dispatcher::new(invoker).with_timeout(config.invocation_timeout()),
            recorder: Arc::new(NoopRecorder),
            fallback_on_arbitration_error: config.fallback_on_arbitration_error,
        }
    }

    /// Build a router whose oracle is the configured chat completions endpoint.
    pub fn from_config(
        registry: Arc<Registry>,
        invoker: Arc<dyn Invoker>,
        config: &RouterConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let oracle_config = config
            .oracle
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("oracle is not configured".to_string()))?;
        let oracle = Arc::new(GatewayOracle::new(oracle_config));
        Ok(Self::new(registry, oracle, invoker, config))
    }

    /// Like `from_config`, with a `ChannelRecorder` of `tracking_buffer`
    /// slots installed. The caller drains the returned receiver.
    pub fn from_config_with_tracking(
        registry: Arc<Registry>,
        invoker: Arc<dyn Invoker>,
        config: &RouterConfig,
    ) -> Result<(Self, mpsc::Receiver<InvocationResult>), ConfigError> {
        let router = Self::from_config(registry, invoker, config)?;
        let (recorder, rx) = ChannelRecorder::new(config.tracking_buffer);
        Ok((router.with_recorder(Arc::new(recorder)), rx))
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn InvocationRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Selected worker identities for a query, in selection order.
    pub async fn route(&self, query: &str) -> Result<Vec<String>, RouterError> {
        self.route_with_mode(query, self.arbiter.mode()).await
    }

    /// `route` with the selection mode chosen for this request.
    pub async fn route_with_mode(
        &self,
        query: &str,
        mode: SelectionMode,
    ) -> Result<Vec<String>, RouterError> {
        Ok(self.explain_routing_with_mode(query, mode).await?.selected)
    }

    /// Run stage 1, arbitration and decomposition without invoking anyone.
    pub async fn explain_routing(&self, query: &str) -> Result<RoutingDecision, RouterError> {
        self.explain_routing_with_mode(query, self.arbiter.mode()).await
    }

    pub async fn explain_routing_with_mode(
        &self,
        query: &str,
        mode: SelectionMode,
    ) -> Result<RoutingDecision, RouterError> {
        let request_id = Uuid::new_v4().to_string();
        let candidates = self.filter.candidates(&self.registry, query);

        log::info!(
            "[Router] Request {}: {} stage-1 candidate(s)",
            request_id,
            candidates.len()
        );

        if candidates.is_empty() {
            return Ok(RoutingDecision {
                request_id,
                query: query.to_string(),
                stage1_candidates: candidates,
                selected: Vec::new(),
                sub_queries: HashMap::new(),
                arbitration: ArbitrationStatus::NotNeeded,
            });
        }

        let (selected, arbitration) = self.arbitrate(query, &candidates, mode).await?;

        let workers: Vec<WorkerDescriptor> = selected
            .iter()
            .map(|identity| WorkerDescriptor {
                identity: identity.clone(),
                description: self.registry.description(identity).unwrap_or_default(),
            })
            .collect();
        let sub_queries = self.decomposer.decompose(query, &workers).await;

        log::info!(
            "[Router] Request {}: selected {:?} ({:?})",
            request_id,
            selected,
            arbitration
        );

        Ok(RoutingDecision {
            request_id,
            query: query.to_string(),
            stage1_candidates: candidates,
            selected,
            sub_queries,
            arbitration,
        })
    }

    async fn arbitrate(
        &self,
        query: &str,
        candidates: &[Candidate],
        mode: SelectionMode,
    ) -> Result<(Vec<String>, ArbitrationStatus), RouterError> {
        let stage1: Vec<String> = candidates.iter().map(|c| c.identity.clone()).collect();
        let presented: Vec<ArbitrationCandidate> = candidates
            .iter()
            .map(|c| ArbitrationCandidate {
                identity: c.identity.clone(),
                description: self.registry.description(&c.identity).unwrap_or_default(),
                score: c.score,
            })
            .collect();

        match self
            .arbiter
            .arbitrate_with_mode(query, &presented, mode)
            .await
        {
            Ok(Arbitration::Skipped(identities)) => Ok((identities, ArbitrationStatus::Skipped)),
            Ok(Arbitration::Selected {
                identities,
                rationale,
            }) => Ok((identities, ArbitrationStatus::Selected { rationale })),
            Ok(Arbitration::NoConfidentSelection) => {
                log::warn!("[Router] No confident selection, using stage-1 candidates");
                Ok((stage1, ArbitrationStatus::NoConfidentSelection))
            }
            Err(e) if self.fallback_on_arbitration_error => {
                log::warn!("[Router] {}; falling back to stage-1 candidates", e);
                Ok((
                    stage1,
                    ArbitrationStatus::FellBack {
                        reason: e.to_string(),
                    },
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Handling
    // =========================================================================

    /// Route, invoke and aggregate, returning only the response text.
    pub async fn handle(&self, query: &str) -> Result<String, RouterError> {
        Ok(self.handle_detailed(query).await?.response)
    }

    /// `handle` with the selection mode chosen for this request.
    pub async fn handle_with_mode(
        &self,
        query: &str,
        mode: SelectionMode,
    ) -> Result<String, RouterError> {
        Ok(self.handle_detailed_with_mode(query, mode).await?.response)
    }

    /// Route, invoke and aggregate, keeping the decision and per-worker results.
    pub async fn handle_detailed(&self, query: &str) -> Result<HandledQuery, RouterError> {
        self.handle_detailed_with_mode(query, self.arbiter.mode()).await
    }

    pub async fn handle_detailed_with_mode(
        &self,
        query: &str,
        mode: SelectionMode,
    ) -> Result<HandledQuery, RouterError> {
        let decision = self.explain_routing_with_mode(query, mode).await?;

        if decision.selected.is_empty() {
            log::info!(
                "[Router] Request {}: no workers matched",
                decision.request_id
            );
            return Ok(HandledQuery {
                decision,
                results: Vec::new(),
                response: NO_AGENTS_MESSAGE.to_string(),
            });
        }

        let results = self.dispatcher.dispatch(&decision.assignments()).await;
        for result in &results {
            self.recorder.record(result);
        }

        let failed = results.iter().filter(|r| !r.success).count();
        log::info!(
            "[Router] Request {}: {} worker(s) finished, {} failed",
            decision.request_id,
            results.len(),
            failed
        );

        let response = aggregator::aggregate(&results);
        Ok(HandledQuery {
            decision,
            results,
            response,
        })
    }
}

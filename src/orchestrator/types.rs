// ABOUTME: Core types for the orchestrator: registry entries, candidates, and routing decisions.
// ABOUTME: Defines the data structures that flow between filter, arbiter, decomposer, and dispatcher.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::capability::Capability;

/// A worker entry owned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredWorker {
    pub identity: String,
    pub capability: Capability,
    pub enabled: bool,
    pub tags: BTreeSet<String>,
    pub description: String,
    pub registered_at: jiff::Timestamp,
}

/// A stage-1 match: worker identity and its score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub identity: String,
    pub score: f64,
}

impl Candidate {
    pub fn new(identity: impl Into<String>, score: f64) -> Self {
        Self {
            identity: identity.into(),
            score,
        }
    }
}

/// Whether arbitration should return every matching worker or only the best.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    MultiSelect,
    SingleBest,
}

/// How the final selection was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArbitrationStatus {
    /// No stage-1 candidates, nothing to arbitrate.
    NotNeeded,
    /// Candidate count at or below the skip threshold.
    Skipped,
    /// The oracle picked the selection.
    Selected { rationale: String },
    /// The oracle returned no usable indices; stage-1 list used.
    NoConfidentSelection,
    /// The oracle failed; stage-1 list used.
    FellBack { reason: String },
}

/// Result of a single routing pass. Lives for one request only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub request_id: String,
    pub query: String,
    pub stage1_candidates: Vec<Candidate>,
    /// Worker identities in selection order.
    pub selected: Vec<String>,
    pub sub_queries: HashMap<String, String>,
    pub arbitration: ArbitrationStatus,
}

impl RoutingDecision {
    /// Sub-query for a selected worker, falling back to the original query.
    pub fn sub_query_for(&self, identity: &str) -> &str {
        self.sub_queries
            .get(identity)
            .map(String::as_str)
            .unwrap_or(&self.query)
    }

    /// `(identity, sub_query)` pairs in selection order.
    pub fn assignments(&self) -> Vec<(String, String)> {
        self.selected
            .iter()
            .map(|id| (id.clone(), self.sub_query_for(id).to_string()))
            .collect()
    }
}

/// Outcome of one worker invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub identity: String,
    pub sub_query: String,
    pub output: Option<String>,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

impl InvocationResult {
    pub fn succeeded(
        identity: impl Into<String>,
        sub_query: impl Into<String>,
        output: String,
        duration: Duration,
    ) -> Self {
        Self {
            identity: identity.into(),
            sub_query: sub_query.into(),
            output: Some(output),
            success: true,
            duration,
            error: None,
        }
    }

    pub fn failed(
        identity: impl Into<String>,
        sub_query: impl Into<String>,
        error: String,
        duration: Duration,
    ) -> Self {
        Self {
            identity: identity.into(),
            sub_query: sub_query.into(),
            output: None,
            success: false,
            duration,
            error: Some(error),
        }
    }
}

// =============================================================================
// Oracle Request/Response Shapes
// =============================================================================

/// A candidate as presented to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationCandidate {
    pub identity: String,
    pub description: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationRequest {
    pub query: String,
    pub candidates: Vec<ArbitrationCandidate>,
    pub mode: SelectionMode,
}

/// Raw oracle answer. Indices may be out of range; the arbiter filters them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArbitrationResponse {
    pub indices: Vec<i64>,
    #[serde(default)]
    pub rationale: String,
}

/// A selected worker as presented to the oracle for decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub identity: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionRequest {
    pub query: String,
    pub workers: Vec<WorkerDescriptor>,
}

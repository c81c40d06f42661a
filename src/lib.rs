// ABOUTME: Core library for capability-based agent routing.
// ABOUTME: Exposes the orchestrator pipeline, configuration, and command wrappers.

pub mod commands {
    pub mod registry;
    pub mod routing;
}

pub mod config;
pub mod orchestrator;

pub use config::{ConfigError, OracleConfig, RouterConfig};
pub use orchestrator::aggregator::{NO_AGENTS_MESSAGE, aggregate};
pub use orchestrator::arbiter::{Arbitration, SemanticArbiter};
pub use orchestrator::capability::{Capability, ScoringStrategy, WeightedSubstring, WorkerMetadata};
pub use orchestrator::decomposer::QueryDecomposer;
pub use orchestrator::dispatcher::Dispatcher;
pub use orchestrator::error::{
    ArbitrationError, DecompositionError, InvocationError, OracleError, RouterError,
    ValidationError,
};
pub use orchestrator::filter::Stage1Filter;
pub use orchestrator::oracle::{GatewayOracle, Oracle};
pub use orchestrator::registry::Registry;
pub use orchestrator::router::{HandledQuery, Router};
pub use orchestrator::tracking::{
    ChannelRecorder, InvocationRecorder, MemoryRecorder, NoopRecorder,
};
pub use orchestrator::types::{
    ArbitrationStatus, Candidate, InvocationResult, RegisteredWorker, RoutingDecision,
    SelectionMode,
};
pub use orchestrator::worker::{
    InvokeFailure, Invoker, Worker, WorkerFactory, WorkerPool, WorkerSpec,
};

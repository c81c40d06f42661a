// ABOUTME: Orchestrator module for capability-based routing between workers.
// ABOUTME: Contains the registry, stage-1 filter, arbiter, decomposer, dispatcher, and router.

pub mod aggregator;
pub mod arbiter;
pub mod capability;
pub mod decomposer;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod oracle;
pub mod registry;
pub mod router;
pub mod tracking;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

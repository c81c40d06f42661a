// ABOUTME: Command wrappers for registry administration (register, remove, toggle, list).
// ABOUTME: Thin layer that takes serde request types and delegates to orchestrator::registry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::orchestrator::capability::{Capability, WorkerMetadata};
use crate::orchestrator::registry::Registry;

/// Register or replace a worker. Exactly one of `capability` or `metadata`
/// must be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterWorkerRequest {
    pub identity: String,
    pub capability: Option<Capability>,
    pub metadata: Option<WorkerMetadata>,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListWorkersRequest {
    pub enabled_only: bool,
    pub tags: Vec<String>,
}

/// One row of `list_workers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub identity: String,
    pub enabled: bool,
    pub description: String,
    pub tags: Vec<String>,
    pub priority: i32,
    pub requires_auth: bool,
}

pub fn register_worker(registry: &Registry, request: RegisterWorkerRequest) -> Result<(), String> {
    match (request.capability, request.metadata) {
        (Some(capability), None) => registry
            .register_with_description(
                &request.identity,
                capability,
                &request.tags,
                request.description,
            )
            .map_err(|e| e.to_string()),
        (None, Some(mut metadata)) => {
            metadata.tags.extend(request.tags);
            if request.description.is_some() {
                metadata.description = request.description;
            }
            registry
                .register_from_metadata(&request.identity, &metadata)
                .map_err(|e| e.to_string())
        }
        (Some(_), Some(_)) => Err("Provide either capability or metadata, not both".to_string()),
        (None, None) => Err("Either capability or metadata is required".to_string()),
    }
}

pub fn unregister_worker(registry: &Registry, identity: String) -> Result<(), String> {
    if registry.unregister(&identity) {
        Ok(())
    } else {
        Err(format!("Worker not found: {}", identity))
    }
}

pub fn enable_worker(registry: &Registry, identity: String) -> Result<(), String> {
    if registry.enable(&identity) {
        Ok(())
    } else {
        Err(format!("Worker not found: {}", identity))
    }
}

pub fn disable_worker(registry: &Registry, identity: String) -> Result<(), String> {
    if registry.disable(&identity) {
        Ok(())
    } else {
        Err(format!("Worker not found: {}", identity))
    }
}

pub fn update_worker_capability(
    registry: &Registry,
    identity: String,
    capability: Capability,
) -> Result<(), String> {
    match registry.update_capability(&identity, capability) {
        Ok(true) => Ok(()),
        Ok(false) => Err(format!("Worker not found: {}", identity)),
        Err(e) => Err(e.to_string()),
    }
}

/// Summaries of registered workers, sorted by identity.
pub fn list_workers(
    registry: &Registry,
    request: ListWorkersRequest,
) -> Result<Vec<WorkerSummary>, String> {
    let tags: BTreeSet<String> = request
        .tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let summaries = registry
        .list(request.enabled_only, Some(&tags))
        .into_iter()
        .filter_map(|identity| registry.get(&identity))
        .map(|worker| WorkerSummary {
            identity: worker.identity,
            enabled: worker.enabled,
            description: worker.description,
            tags: worker.tags.into_iter().collect(),
            priority: worker.capability.priority,
            requires_auth: worker.capability.requires_auth,
        })
        .collect();

    Ok(summaries)
}

// ABOUTME: Command wrappers for routing queries through the router.
// ABOUTME: Thin layer that delegates to orchestrator::router and stringifies errors.

use crate::orchestrator::router::{HandledQuery, Router};
use crate::orchestrator::types::RoutingDecision;

/// Send a query through the full pipeline and return the aggregated response.
pub async fn handle_query(router: &Router, query: String) -> Result<String, String> {
    router.handle(&query).await.map_err(|e| e.to_string())
}

/// Like `handle_query`, but keeps the routing decision and per-worker results.
pub async fn handle_query_detailed(router: &Router, query: String) -> Result<HandledQuery, String> {
    router.handle_detailed(&query).await.map_err(|e| e.to_string())
}

pub async fn route_query(router: &Router, query: String) -> Result<Vec<String>, String> {
    router.route(&query).await.map_err(|e| e.to_string())
}

/// Diagnostics: show how a query would be routed without invoking workers.
pub async fn explain_routing(router: &Router, query: String) -> Result<RoutingDecision, String> {
    router.explain_routing(&query).await.map_err(|e| e.to_string())
}

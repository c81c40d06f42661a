// ABOUTME: Query decomposer that splits a multi-worker request into per-worker sub-queries.
// ABOUTME: Any worker the oracle leaves out receives the full original query.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::DecompositionError;
use super::oracle::Oracle;
use super::types::{DecompositionRequest, WorkerDescriptor};

/// Splits a query between the selected workers.
pub struct QueryDecomposer {
    oracle: Arc<dyn Oracle>,
}

impl QueryDecomposer {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Produce one sub-query per selected worker.
    ///
    /// - One worker: the original query, no oracle call.
    /// - Several: the oracle's mapping, with every missing or blank entry
    ///   replaced by the original query. Entries for unselected identities
    ///   are ignored.
    /// - Oracle failure: every worker gets the original query.
    pub async fn decompose(
        &self,
        query: &str,
        selected: &[WorkerDescriptor],
    ) -> HashMap<String, String> {
        match selected {
            [] => HashMap::new(),
            [only] => HashMap::from([(only.identity.clone(), query.to_string())]),
            _ => match self.try_decompose(query, selected).await {
                Ok(mapping) => fill_missing(query, selected, mapping),
                Err(e) => {
                    log::warn!(
                        "[Decomposer] {}; sending the full query to {} worker(s)",
                        e,
                        selected.len()
                    );
                    fill_missing(query, selected, HashMap::new())
                }
            },
        }
    }

    async fn try_decompose(
        &self,
        query: &str,
        selected: &[WorkerDescriptor],
    ) -> Result<HashMap<String, String>, DecompositionError> {
        let request = DecompositionRequest {
            query: query.to_string(),
            workers: selected.to_vec(),
        };
        Ok(self.oracle.decompose(&request).await?)
    }
}

fn fill_missing(
    query: &str,
    selected: &[WorkerDescriptor],
    mut mapping: HashMap<String, String>,
) -> HashMap<String, String> {
    selected
        .iter()
        .map(|worker| {
            let sub_query = match mapping.remove(&worker.identity) {
                Some(text) if !text.trim().is_empty() => text.trim().to_string(),
                _ => {
                    log::debug!(
                        "[Decomposer] No sub-query for {}, using the original query",
                        worker.identity
                    );
                    query.to_string()
                }
            };
            (worker.identity.clone(), sub_query)
        })
        .collect()
}

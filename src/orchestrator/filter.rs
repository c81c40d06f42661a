// ABOUTME: Stage-1 filter producing a ranked candidate list from the registry.
// ABOUTME: Thin policy layer over Registry::discover (score floor, cap, tag scope).

use std::collections::BTreeSet;

use super::registry::Registry;
use super::types::Candidate;

/// Fast deterministic candidate selection.
#[derive(Debug, Clone, Default)]
pub struct Stage1Filter {
    pub min_score: f64,
    pub max_candidates: Option<usize>,
    pub tags: Option<BTreeSet<String>>,
}

impl Stage1Filter {
    pub fn new(min_score: f64, max_candidates: Option<usize>) -> Self {
        Self {
            min_score,
            max_candidates,
            tags: None,
        }
    }

    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Rank enabled workers for a query, best first.
    pub fn candidates(&self, registry: &Registry, query: &str) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = registry
            .discover(query, self.min_score, self.max_candidates, self.tags.as_ref())
            .into_iter()
            .map(|(identity, score)| Candidate { identity, score })
            .collect();

        log::debug!(
            "[Stage1] {} candidate(s): {:?}",
            candidates.len(),
            candidates
                .iter()
                .map(|c| format!("{}={:.2}", c.identity, c.score))
                .collect::<Vec<_>>()
        );

        candidates
    }
}

// ABOUTME: Stage-2 semantic arbiter that asks the oracle which candidates are really needed.
// ABOUTME: Skips the oracle for small candidate sets and filters out-of-range answers.

use std::collections::HashSet;
use std::sync::Arc;

use super::error::ArbitrationError;
use super::oracle::Oracle;
use super::types::{ArbitrationCandidate, ArbitrationRequest, SelectionMode};

/// Candidate counts at or below this skip arbitration.
pub const DEFAULT_SKIP_THRESHOLD: usize = 2;

/// What the arbiter decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Arbitration {
    /// Too few candidates to arbitrate; the input list stands.
    Skipped(Vec<String>),
    /// The oracle selected these identities, in the order it returned them.
    Selected {
        identities: Vec<String>,
        rationale: String,
    },
    /// The oracle returned nothing usable. Callers fall back to stage 1.
    NoConfidentSelection,
}

/// Picks the true subset of stage-1 candidates.
pub struct SemanticArbiter {
    oracle: Arc<dyn Oracle>,
    skip_threshold: usize,
    mode: SelectionMode,
}

impl SemanticArbiter {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
            mode: SelectionMode::default(),
        }
    }

    pub fn with_skip_threshold(mut self, threshold: usize) -> Self {
        self.skip_threshold = threshold;
        self
    }

    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Mode used when the caller does not pick one.
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Arbitrate over candidates (already ranked best-first) in the default mode.
    pub async fn arbitrate(
        &self,
        query: &str,
        candidates: &[ArbitrationCandidate],
    ) -> Result<Arbitration, ArbitrationError> {
        self.arbitrate_with_mode(query, candidates, self.mode).await
    }

    /// Arbitrate with an explicit selection mode for this call only.
    pub async fn arbitrate_with_mode(
        &self,
        query: &str,
        candidates: &[ArbitrationCandidate],
        mode: SelectionMode,
    ) -> Result<Arbitration, ArbitrationError> {
        if candidates.len() <= self.skip_threshold {
            log::debug!(
                "[Arbiter] {} candidate(s) <= threshold {}, skipping oracle",
                candidates.len(),
                self.skip_threshold
            );
            return Ok(Arbitration::Skipped(
                candidates.iter().map(|c| c.identity.clone()).collect(),
            ));
        }

        let request = ArbitrationRequest {
            query: query.to_string(),
            candidates: candidates.to_vec(),
            mode,
        };

        let response = self.oracle.arbitrate(&request).await.map_err(|e| {
            log::warn!("[Arbiter] Oracle failed: {}", e);
            ArbitrationError::from(e)
        })?;

        let indices = valid_indices(&response.indices, candidates.len(), mode);
        if indices.is_empty() {
            log::info!(
                "[Arbiter] Oracle returned no usable selection ({} raw indices)",
                response.indices.len()
            );
            return Ok(Arbitration::NoConfidentSelection);
        }

        let identities: Vec<String> = indices
            .into_iter()
            .map(|i| candidates[i].identity.clone())
            .collect();

        log::info!(
            "[Arbiter] Selected {:?} from {} candidates",
            identities,
            candidates.len()
        );
        log::debug!("[Arbiter] Rationale: {}", response.rationale);

        Ok(Arbitration::Selected {
            identities,
            rationale: response.rationale,
        })
    }
}

/// Drop out-of-range and duplicate indices, keeping oracle order. Single-best
/// mode keeps only the first survivor.
fn valid_indices(raw: &[i64], len: usize, mode: SelectionMode) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut indices: Vec<usize> = raw
        .iter()
        .filter_map(|&i| usize::try_from(i).ok())
        .filter(|&i| i < len)
        .filter(|&i| seen.insert(i))
        .collect();

    if mode == SelectionMode::SingleBest {
        indices.truncate(1);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::error::OracleError;
    use crate::orchestrator::testing::StubOracle;

    fn make_candidates(ids: &[&str]) -> Vec<ArbitrationCandidate> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| ArbitrationCandidate {
                identity: id.to_string(),
                description: format!("{} worker", id),
                score: 1.0 - i as f64 * 0.1,
            })
            .collect()
    }

    // =========================================================================
    // Skip Rule
    // =========================================================================

    #[tokio::test]
    async fn skips_oracle_at_threshold_boundary() {
        let oracle = Arc::new(StubOracle::selecting(vec![0]));
        let arbiter = SemanticArbiter::new(oracle.clone());

        let result = arbiter
            .arbitrate("q", &make_candidates(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(
            result,
            Arbitration::Skipped(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(oracle.arbitrate_calls(), 0);
    }

    #[tokio::test]
    async fn skips_oracle_for_single_and_empty() {
        let oracle = Arc::new(StubOracle::selecting(vec![0]));
        let arbiter = SemanticArbiter::new(oracle.clone());

        arbiter.arbitrate("q", &make_candidates(&["a"])).await.unwrap();
        arbiter.arbitrate("q", &[]).await.unwrap();
        assert_eq!(oracle.arbitrate_calls(), 0);
    }

    #[tokio::test]
    async fn consults_oracle_above_threshold() {
        let oracle = Arc::new(StubOracle::selecting(vec![2, 0]));
        let arbiter = SemanticArbiter::new(oracle.clone());

        let result = arbiter
            .arbitrate("q", &make_candidates(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(oracle.arbitrate_calls(), 1);
        match result {
            Arbitration::Selected { identities, .. } => {
                assert_eq!(identities, vec!["c", "a"]);
            }
            other => panic!("Expected Selected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn custom_threshold_changes_skip_boundary() {
        let oracle = Arc::new(StubOracle::selecting(vec![0]));
        let arbiter = SemanticArbiter::new(oracle.clone()).with_skip_threshold(0);

        arbiter.arbitrate("q", &make_candidates(&["a"])).await.unwrap();
        assert_eq!(oracle.arbitrate_calls(), 1);
    }

    // =========================================================================
    // Index Filtering
    // =========================================================================

    #[tokio::test]
    async fn drops_out_of_range_indices() {
        let oracle = Arc::new(StubOracle::selecting(vec![-1, 5, 1, 1]));
        let arbiter = SemanticArbiter::new(oracle);

        let result = arbiter
            .arbitrate("q", &make_candidates(&["a", "b", "c"]))
            .await
            .unwrap();
        match result {
            Arbitration::Selected { identities, .. } => assert_eq!(identities, vec!["b"]),
            other => panic!("Expected Selected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_or_all_invalid_selection_is_not_confident() {
        let arbiter = SemanticArbiter::new(Arc::new(StubOracle::selecting(vec![])));
        let result = arbiter
            .arbitrate("q", &make_candidates(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(result, Arbitration::NoConfidentSelection);

        let arbiter = SemanticArbiter::new(Arc::new(StubOracle::selecting(vec![9, -2])));
        let result = arbiter
            .arbitrate("q", &make_candidates(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(result, Arbitration::NoConfidentSelection);
    }

    #[tokio::test]
    async fn single_best_keeps_first_valid_index() {
        let oracle = Arc::new(StubOracle::selecting(vec![7, 2, 0]));
        let arbiter = SemanticArbiter::new(oracle.clone()).with_mode(SelectionMode::SingleBest);

        let result = arbiter
            .arbitrate("q", &make_candidates(&["a", "b", "c"]))
            .await
            .unwrap();
        match result {
            Arbitration::Selected { identities, .. } => assert_eq!(identities, vec!["c"]),
            other => panic!("Expected Selected, got {:?}", other),
        }
        assert_eq!(oracle.last_mode(), Some(SelectionMode::SingleBest));
    }

    #[tokio::test]
    async fn per_call_mode_overrides_default() {
        let oracle = Arc::new(StubOracle::selecting(vec![2, 0]));
        let arbiter = SemanticArbiter::new(oracle.clone());
        assert_eq!(arbiter.mode(), SelectionMode::MultiSelect);

        let result = arbiter
            .arbitrate_with_mode(
                "q",
                &make_candidates(&["a", "b", "c"]),
                SelectionMode::SingleBest,
            )
            .await
            .unwrap();
        match result {
            Arbitration::Selected { identities, .. } => assert_eq!(identities, vec!["c"]),
            other => panic!("Expected Selected, got {:?}", other),
        }
        assert_eq!(oracle.last_mode(), Some(SelectionMode::SingleBest));

        // The default is untouched by the override.
        arbiter
            .arbitrate("q", &make_candidates(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(oracle.last_mode(), Some(SelectionMode::MultiSelect));
    }

    // =========================================================================
    // Failure
    // =========================================================================

    #[tokio::test]
    async fn oracle_failure_becomes_arbitration_error() {
        let arbiter = SemanticArbiter::new(Arc::new(StubOracle::failing()));
        let err = arbiter
            .arbitrate("q", &make_candidates(&["a", "b", "c"]))
            .await
            .unwrap_err();
        assert!(matches!(err.0, OracleError::Unavailable(_)));
    }

    #[test]
    fn valid_indices_preserves_oracle_order() {
        assert_eq!(
            valid_indices(&[3, 0, 2], 4, SelectionMode::MultiSelect),
            vec![3, 0, 2]
        );
    }
}

// ABOUTME: Capability registry mapping worker identities to capabilities and enablement.
// ABOUTME: Thread-safe CRUD plus discover(), the ranked stage-1 scan over enabled workers.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::capability::{Capability, ScoringStrategy, WeightedSubstring, WorkerMetadata};
use super::error::ValidationError;
use super::types::RegisteredWorker;

/// Registry entry plus its registration sequence number, used as the
/// tie-break when two workers score and rank identically.
struct Entry {
    seq: u64,
    worker: RegisteredWorker,
}

struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Registry of routable workers.
///
/// Every mutation happens under a single write guard, so concurrent readers
/// never observe a partially applied registration.
pub struct Registry {
    inner: RwLock<Inner>,
    scorer: Arc<dyn ScoringStrategy>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_scorer(Arc::new(WeightedSubstring))
    }

    /// Create a registry that scores with a custom strategy.
    pub fn with_scorer(scorer: Arc<dyn ScoringStrategy>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            scorer,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert or replace a worker. The description is derived from the capability.
    pub fn register(
        &self,
        identity: &str,
        capability: Capability,
        tags: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<(), ValidationError> {
        self.register_with_description(identity, capability, tags, None)
    }

    /// Insert or replace a worker with an explicit description.
    ///
    /// Surrounding whitespace in the identity is ignored here and in every
    /// lookup.
    ///
    /// Re-registering an identity discards the old capability entirely but
    /// keeps its original registration position, so repeating a registration
    /// with identical data changes nothing observable.
    pub fn register_with_description(
        &self,
        identity: &str,
        capability: Capability,
        tags: impl IntoIterator<Item = impl AsRef<str>>,
        description: Option<String>,
    ) -> Result<(), ValidationError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(ValidationError::EmptyIdentity);
        }

        let capability = capability.normalized()?;
        let tags: BTreeSet<String> = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| capability.describe());

        let worker = RegisteredWorker {
            identity: identity.to_string(),
            capability,
            enabled: true,
            tags,
            description,
            registered_at: jiff::Timestamp::now(),
        };

        let mut inner = self.write();
        let seq = match inner.entries.get(identity) {
            Some(existing) => existing.seq,
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                seq
            }
        };
        let replaced = inner
            .entries
            .insert(identity.to_string(), Entry { seq, worker })
            .is_some();
        drop(inner);

        if replaced {
            log::info!("[Registry] Replaced worker {}", identity);
        } else {
            log::info!("[Registry] Registered worker {}", identity);
        }
        Ok(())
    }

    /// Register a worker whose capability is extracted from its metadata.
    pub fn register_from_metadata(
        &self,
        identity: &str,
        metadata: &WorkerMetadata,
    ) -> Result<(), ValidationError> {
        if metadata.priority < 0 {
            return Err(ValidationError::NegativePriority(metadata.priority));
        }
        let capability = Capability::from_metadata(metadata);
        self.register_with_description(
            identity,
            capability,
            &metadata.tags,
            metadata.description.clone(),
        )
    }

    /// Remove a worker. Returns false if it was not registered.
    pub fn unregister(&self, identity: &str) -> bool {
        let identity = identity.trim();
        let removed = self.write().entries.remove(identity).is_some();
        if removed {
            log::info!("[Registry] Unregistered worker {}", identity);
        }
        removed
    }

    pub fn enable(&self, identity: &str) -> bool {
        self.set_enabled(identity, true)
    }

    pub fn disable(&self, identity: &str) -> bool {
        self.set_enabled(identity, false)
    }

    fn set_enabled(&self, identity: &str, enabled: bool) -> bool {
        let identity = identity.trim();
        let mut inner = self.write();
        match inner.entries.get_mut(identity) {
            Some(entry) => {
                entry.worker.enabled = enabled;
                log::debug!("[Registry] Worker {} enabled={}", identity, enabled);
                true
            }
            None => false,
        }
    }

    /// Replace the capability of an existing worker. Returns `Ok(false)` if
    /// the worker is unknown. Tags, enablement, and an explicit description
    /// are preserved; a derived description is refreshed.
    pub fn update_capability(
        &self,
        identity: &str,
        capability: Capability,
    ) -> Result<bool, ValidationError> {
        let capability = capability.normalized()?;
        let identity = identity.trim();

        let mut inner = self.write();
        let Some(entry) = inner.entries.get_mut(identity) else {
            return Ok(false);
        };

        if entry.worker.description == entry.worker.capability.describe() {
            entry.worker.description = capability.describe();
        }
        entry.worker.capability = capability;
        log::info!("[Registry] Updated capability for worker {}", identity);
        Ok(true)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get(&self, identity: &str) -> Option<RegisteredWorker> {
        self.read()
            .entries
            .get(identity.trim())
            .map(|entry| entry.worker.clone())
    }

    pub fn capabilities(&self, identity: &str) -> Option<Capability> {
        self.read()
            .entries
            .get(identity.trim())
            .map(|entry| entry.worker.capability.clone())
    }

    pub fn description(&self, identity: &str) -> Option<String> {
        self.read()
            .entries
            .get(identity.trim())
            .map(|entry| entry.worker.description.clone())
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Worker identities, sorted lexicographically.
    ///
    /// A tag filter keeps workers sharing at least one of the given tags;
    /// `None` or an empty set disables tag filtering.
    pub fn list(&self, enabled_only: bool, tags: Option<&BTreeSet<String>>) -> Vec<String> {
        let inner = self.read();
        let mut ids: Vec<String> = inner
            .entries
            .values()
            .filter(|entry| passes_filter(&entry.worker, enabled_only, tags))
            .map(|entry| entry.worker.identity.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Score every enabled worker against the query and return the ranked matches.
    ///
    /// Scores below `min_score` are dropped, and a zero score is never a
    /// match. Results are sorted by descending `(score, priority)`; equal
    /// keys keep registration order. `max_count` of `None` means unlimited.
    pub fn discover(
        &self,
        query: &str,
        min_score: f64,
        max_count: Option<usize>,
        tags: Option<&BTreeSet<String>>,
    ) -> Vec<(String, f64)> {
        let query_lower = query.to_lowercase();

        let mut scored: Vec<(u64, i32, String, f64)> = {
            let inner = self.read();
            inner
                .entries
                .values()
                .filter(|entry| passes_filter(&entry.worker, true, tags))
                .filter_map(|entry| {
                    let score = self.scorer.score(&entry.worker.capability, &query_lower);
                    // A non-finite score from a custom scorer counts as no match.
                    let score = if score.is_finite() {
                        score.clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    if score <= 0.0 || score < min_score {
                        return None;
                    }
                    Some((
                        entry.seq,
                        entry.worker.capability.priority,
                        entry.worker.identity.clone(),
                        score,
                    ))
                })
                .collect()
        };

        // Registration order first, then a stable sort on the ranking keys.
        scored.sort_by_key(|(seq, ..)| *seq);
        scored.sort_by(|a, b| {
            b.3.partial_cmp(&a.3)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.cmp(&a.1))
        });

        if let Some(max) = max_count {
            scored.truncate(max);
        }

        log::debug!(
            "[Registry] discover matched {} worker(s) for query",
            scored.len()
        );

        scored
            .into_iter()
            .map(|(_, _, identity, score)| (identity, score))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn passes_filter(
    worker: &RegisteredWorker,
    enabled_only: bool,
    tags: Option<&BTreeSet<String>>,
) -> bool {
    if enabled_only && !worker.enabled {
        return false;
    }
    match tags {
        Some(wanted) if !wanted.is_empty() => wanted
            .iter()
            .any(|tag| worker.tags.contains(&tag.to_lowercase())),
        _ => true,
    }
}

// ABOUTME: Capability model describing what a worker can handle, plus stage-1 scoring.
// ABOUTME: Scores queries by weighted substring matches across four capability dimensions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

// =============================================================================
// Scoring Weights
// =============================================================================

const DOMAIN_WEIGHT: f64 = 0.4;
const ENTITY_WEIGHT: f64 = 0.3;
const KEYWORD_WEIGHT: f64 = 0.2;
const OPERATION_WEIGHT: f64 = 0.1;

// =============================================================================
// Capability
// =============================================================================

/// Structured declaration of what a worker understands.
///
/// Terms are lower-cased and trimmed when added through the builder methods
/// or when the capability is inserted into the registry. Empty dimensions are
/// valid and contribute nothing to the score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capability {
    pub domains: BTreeSet<String>,
    pub operations: BTreeSet<String>,
    pub entities: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
    pub examples: Vec<String>,
    pub requires_auth: bool,
    pub priority: i32,
}

impl Capability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domains<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.domains.extend(normalize_terms(terms));
        self
    }

    pub fn with_operations<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.operations.extend(normalize_terms(terms));
        self
    }

    pub fn with_entities<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.entities.extend(normalize_terms(terms));
        self
    }

    pub fn with_keywords<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords.extend(normalize_terms(terms));
        self
    }

    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.examples
            .extend(examples.into_iter().map(|e| e.as_ref().to_string()));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// True when all four scored dimensions are empty.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
            && self.operations.is_empty()
            && self.entities.is_empty()
            && self.keywords.is_empty()
    }

    /// Score a query against this capability using the default weighted
    /// substring strategy. Result is in `[0, 1]`.
    pub fn score(&self, query: &str) -> f64 {
        WeightedSubstring.score(self, &query.to_lowercase())
    }

    /// Validate and case-normalize every term. Called by the registry before
    /// an entry is written, so a failure leaves the registry untouched.
    pub fn normalized(self) -> Result<Self, ValidationError> {
        if self.priority < 0 {
            return Err(ValidationError::NegativePriority(self.priority));
        }

        Ok(Self {
            domains: normalize_dimension(self.domains, "domains")?,
            operations: normalize_dimension(self.operations, "operations")?,
            entities: normalize_dimension(self.entities, "entities")?,
            keywords: normalize_dimension(self.keywords, "keywords")?,
            examples: self.examples,
            requires_auth: self.requires_auth,
            priority: self.priority,
        })
    }

    /// One-line human readable summary, used as the worker description
    /// handed to the oracle when none was registered explicitly.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        for (label, terms) in [
            ("domains", &self.domains),
            ("operations", &self.operations),
            ("entities", &self.entities),
            ("keywords", &self.keywords),
        ] {
            if !terms.is_empty() {
                let joined: Vec<&str> = terms.iter().map(String::as_str).collect();
                parts.push(format!("{}: {}", label, joined.join(", ")));
            }
        }

        if parts.is_empty() {
            "no declared capabilities".to_string()
        } else {
            parts.join("; ")
        }
    }

    /// Build a capability from free-form registration metadata.
    ///
    /// Declared dimensions are taken as-is. When no domains are declared the
    /// tags stand in for them, and the display name contributes keywords.
    pub fn from_metadata(metadata: &WorkerMetadata) -> Self {
        let domains: Vec<&String> = if metadata.domains.is_empty() {
            metadata.tags.iter().collect()
        } else {
            metadata.domains.iter().collect()
        };

        let name_words = metadata
            .name
            .as_deref()
            .unwrap_or("")
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
            .map(str::to_string)
            .collect::<Vec<_>>();

        Capability::new()
            .with_domains(domains)
            .with_operations(&metadata.operations)
            .with_entities(&metadata.entities)
            .with_keywords(metadata.keywords.iter().chain(name_words.iter()))
            .with_examples(&metadata.examples)
            .with_requires_auth(metadata.requires_auth)
            .with_priority(metadata.priority)
    }
}

/// Free-form metadata a worker publishes about itself at registration time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub domains: Vec<String>,
    pub operations: Vec<String>,
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
    pub examples: Vec<String>,
    pub requires_auth: bool,
    pub priority: i32,
}

fn normalize_terms<I, S>(terms: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
}

fn normalize_dimension(
    terms: BTreeSet<String>,
    dimension: &'static str,
) -> Result<BTreeSet<String>, ValidationError> {
    let mut normalized = BTreeSet::new();
    for term in terms {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Err(ValidationError::BlankTerm { dimension });
        }
        normalized.insert(term);
    }
    Ok(normalized)
}

// =============================================================================
// Scoring Strategy
// =============================================================================

/// Pluggable stage-1 scoring. Implementations receive an already lower-cased
/// query and must return a value in `[0, 1]`.
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, capability: &Capability, query_lower: &str) -> f64;
}

/// Weighted substring matching over domains, entities, keywords, and
/// operations (0.4 / 0.3 / 0.2 / 0.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSubstring;

impl ScoringStrategy for WeightedSubstring {
    fn score(&self, capability: &Capability, query_lower: &str) -> f64 {
        let total = dimension_score(&capability.domains, query_lower, DOMAIN_WEIGHT)
            + dimension_score(&capability.entities, query_lower, ENTITY_WEIGHT)
            + dimension_score(&capability.keywords, query_lower, KEYWORD_WEIGHT)
            + dimension_score(&capability.operations, query_lower, OPERATION_WEIGHT);

        total.min(1.0)
    }
}

/// Fraction of terms found in the query, scaled by weight and clamped to it.
fn dimension_score(terms: &BTreeSet<String>, query_lower: &str, weight: f64) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let found = terms
        .iter()
        .filter(|term| !term.is_empty() && query_lower.contains(&term.to_lowercase()))
        .count();

    (weight * found as f64 / terms.len() as f64).min(weight)
}

//! Linear nearest-neighbor matching with a fixed acceptance threshold.

use crate::{Embedding, Error, Result};
use indexmap::IndexMap;
use tracing::debug;

/// Distance cutoff used when none is configured.
///
/// Tuned empirically against the deployed model; it is not the model's
/// native recommended threshold.
pub const DEFAULT_THRESHOLD: f32 = 9.5;

/// Key → embedding, in insertion order.
pub type EmbeddingMap = IndexMap<String, Embedding>;

/// Result of a nearest-neighbor scan.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The nearest stored embedding is strictly closer than the threshold.
    Matched { key: String, distance: f32 },
    /// Nothing close enough. `distance` is the nearest candidate's distance,
    /// or infinity when nothing is stored.
    NoMatch { distance: f32 },
}

impl MatchOutcome {
    pub fn distance(&self) -> f32 {
        match self {
            MatchOutcome::Matched { distance, .. } | MatchOutcome::NoMatch { distance } => *distance,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Matcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Scan every stored embedding and report the nearest one.
    ///
    /// Ties keep the earlier entry. A stored embedding whose dimension differs
    /// from the query is an error.
    pub fn find(&self, query: &Embedding, embeddings: &EmbeddingMap) -> Result<MatchOutcome> {
        let mut best: Option<&str> = None;
        let mut best_distance = f32::INFINITY;

        for (key, stored) in embeddings {
            let distance = query.l2_distance(stored).ok_or_else(|| Error::InvalidDimension {
                expected: query.dim(),
                actual: stored.dim(),
            })?;
            debug!("Comparing with {}: distance={}", key, distance);
            if distance < best_distance {
                best_distance = distance;
                best = Some(key.as_str());
            }
        }

        match best {
            Some(key) if best_distance < self.threshold => Ok(MatchOutcome::Matched {
                key: key.to_string(),
                distance: best_distance,
            }),
            _ => Ok(MatchOutcome::NoMatch {
                distance: best_distance,
            }),
        }
    }
}

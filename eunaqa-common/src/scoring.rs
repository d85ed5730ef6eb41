//! Confidence scoring for exam-question variations
//!
//! Pure functions mapping AI diagnostic output to a normalized [0,1]
//! confidence value. No side effects; deterministic and idempotent.

use std::collections::HashMap;

/// Bucket boundary below which a score counts as low confidence
pub const LOW_THRESHOLD: f64 = 0.34;

/// Bucket boundary at or above which a score counts as high confidence
pub const HIGH_THRESHOLD: f64 = 0.67;

/// Derive confidence from a raw per-criterion scorecard.
///
/// Each criterion score is in [0,3] where 0 is best. Confidence is driven
/// by the worst-scoring criterion, not the average: a single severe defect
/// caps confidence regardless of the other criteria.
///
/// Returns `max(0, 1 - max(scores)/3)`; an empty scorecard yields 0.0.
pub fn score_from_scorecard(scorecard: &HashMap<String, f64>) -> f64 {
    let worst = scorecard
        .values()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    if !worst.is_finite() {
        return 0.0;
    }

    (1.0 - worst / 3.0).max(0.0)
}

/// Derive the inherited confidence a corrected variation receives from its
/// parent's last diagnosis.
///
/// A correction is assumed to have fixed the flagged defect, so confidence
/// improves by a fixed schedule rather than being recomputed from scratch:
///
/// | severity | confidence |
/// |----------|------------|
/// | 0        | 1.00       |
/// | 1        | 0.85       |
/// | 2        | 0.75       |
/// | 3        | 0.60       |
/// | other    | 0.70       |
///
/// Total over all inputs: unmapped or missing severity yields 0.70, not an
/// error.
pub fn score_from_severity(severity_global: Option<i64>) -> f64 {
    match severity_global {
        Some(0) => 1.0,
        Some(1) => 0.85,
        Some(2) => 0.75,
        Some(3) => 0.60,
        _ => 0.70,
    }
}

/// Confidence classification used by reporting and the control panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBucket {
    /// No score recorded yet
    Unscored,
    /// Score below [`LOW_THRESHOLD`]
    Low,
    /// Score in [[`LOW_THRESHOLD`], [`HIGH_THRESHOLD`])
    Medium,
    /// Score at or above [`HIGH_THRESHOLD`]
    High,
}

impl ConfidenceBucket {
    /// Classify an optional score into exactly one bucket
    pub fn classify(score: Option<f64>) -> Self {
        match score {
            None => ConfidenceBucket::Unscored,
            Some(s) if s < LOW_THRESHOLD => ConfidenceBucket::Low,
            Some(s) if s < HIGH_THRESHOLD => ConfidenceBucket::Medium,
            Some(_) => ConfidenceBucket::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBucket::Unscored => "unscored",
            ConfidenceBucket::Low => "low",
            ConfidenceBucket::Medium => "medium",
            ConfidenceBucket::High => "high",
        }
    }
}

/// Bucket counts over a set of variations
///
/// The four buckets partition the set exactly: every score falls in one
/// bucket and the counts sum to the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Distribution {
    pub unscored: u64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

impl Distribution {
    /// Tally a collection of optional scores
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut dist = Distribution::default();
        for score in scores {
            match ConfidenceBucket::classify(score) {
                ConfidenceBucket::Unscored => dist.unscored += 1,
                ConfidenceBucket::Low => dist.low += 1,
                ConfidenceBucket::Medium => dist.medium += 1,
                ConfidenceBucket::High => dist.high += 1,
            }
        }
        dist
    }

    pub fn total(&self) -> u64 {
        self.unscored + self.low + self.medium + self.high
    }
}

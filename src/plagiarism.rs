//! Submission-time plagiarism verdicts and the grading gate.
//!
//! A new submission is scored against every prior submission of the same
//! assignment. Pairs at or above the reporting threshold become match
//! records; the verdict is flagged when the best match exceeds the blocking
//! threshold. Verdicts are one-directional: earlier submissions are never
//! re-scored when a later one matches them.

use crate::config::{BLOCKING_THRESHOLD, PARALLEL_SCORING_MIN_PRIORS, REPORTING_THRESHOLD};
use crate::nl::normalize;
use crate::similarity::tokens_similarity;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
    pub reporting_threshold: f64,
    pub blocking_threshold: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reporting_threshold: REPORTING_THRESHOLD,
            blocking_threshold: BLOCKING_THRESHOLD,
        }
    }
}

impl PolicyConfig {
    pub fn is_reportable(&self, score: f64) -> bool {
        score >= self.reporting_threshold
    }

    pub fn is_blocking(&self, score: f64) -> bool {
        score > self.blocking_threshold
    }
}

/// Another student's submission, with its text already extracted.
#[derive(Clone, Debug)]
pub struct PriorSubmission {
    pub student_id: String,
    pub extracted_text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchRecord {
    pub student_id: String,
    pub score: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct PlagiarismVerdict {
    pub score: f64,
    pub matched_with: Vec<MatchRecord>,
    pub flagged: bool,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Plagiarism detected. Resolve before grading.")]
    PlagiarismFlagged { score: f64 },
}

/// Folds pairwise scores into a verdict.
///
/// Scores below the reporting threshold are dropped; the verdict score is the
/// best remaining one (0 when nothing was reported).
pub fn aggregate<I>(scored: I, policy: &PolicyConfig) -> PlagiarismVerdict
where
    I: IntoIterator<Item = MatchRecord>,
{
    let (score, matched_with) = scored
        .into_iter()
        .filter(|m| policy.is_reportable(m.score))
        .fold((0.0_f64, Vec::new()), |(best, mut matches), m| {
            let best = best.max(m.score);
            matches.push(m);
            (best, matches)
        });

    PlagiarismVerdict {
        score,
        matched_with,
        flagged: policy.is_blocking(score),
    }
}

/// Scores `current_text` against every prior and builds the verdict.
///
/// Empty text on either side is skipped, never scored: a submission without
/// extractable text can neither be flagged nor cause a match.
pub fn assess(current_text: &str, priors: &[PriorSubmission], policy: &PolicyConfig) -> PlagiarismVerdict {
    if current_text.is_empty() {
        return PlagiarismVerdict::default();
    }

    let current_tokens = normalize(current_text);
    let score_one = |prior: &PriorSubmission| -> Option<MatchRecord> {
        if prior.extracted_text.is_empty() {
            return None;
        }
        let score = tokens_similarity(&current_tokens, &normalize(&prior.extracted_text));
        debug!("Pairwise score against {}: {:.2}", prior.student_id, score);
        Some(MatchRecord {
            student_id: prior.student_id.clone(),
            score,
        })
    };

    // Collect keeps prior order under rayon too
    let scored: Vec<MatchRecord> = if priors.len() >= PARALLEL_SCORING_MIN_PRIORS {
        priors.par_iter().filter_map(score_one).collect()
    } else {
        priors.iter().filter_map(score_one).collect()
    };

    aggregate(scored, policy)
}

pub fn ensure_gradable(verdict: &PlagiarismVerdict) -> Result<(), PolicyError> {
    if verdict.flagged {
        return Err(PolicyError::PlagiarismFlagged { score: verdict.score });
    }
    Ok(())
}

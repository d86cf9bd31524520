/// Tuning configuration for the plagiarism engine

// Verdict thresholds (percent similarity)
// A pair is reported at or above REPORTING_THRESHOLD.
// A submission is blocked from grading strictly above BLOCKING_THRESHOLD.
pub const REPORTING_THRESHOLD: f64 = 30.0;
pub const BLOCKING_THRESHOLD: f64 = 40.0;

// Scores are percentages rounded to this many decimals
pub const SCORE_DECIMALS: i32 = 2;

// Below this many priors the scorer runs sequentially, rayon above
pub const PARALLEL_SCORING_MIN_PRIORS: usize = 8;

// Extraction
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const MAX_DOCUMENT_BYTES: usize = 25 * 1024 * 1024;

// Length of extracted-text previews written to the log
pub const TEXT_PREVIEW_CHARS: usize = 100;

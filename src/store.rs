use crate::config::TEXT_PREVIEW_CHARS;
use crate::plagiarism::{
    assess, ensure_gradable, PlagiarismVerdict, PolicyConfig, PolicyError, PriorSubmission,
};
use crate::structures::{is_late, Submission};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Submission not found")]
    NotFound,

    #[error("Assignment already graded. Cannot resubmit.")]
    AlreadyGraded,

    #[error(transparent)]
    Blocked(#[from] PolicyError),
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub assignment_id: String,
    pub student_id: String,
    pub file: String,
    pub file_type: Option<String>,
    pub extracted_text: String,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Created(Submission),
    Resubmitted(Submission),
}

impl SubmitOutcome {
    pub fn submission(&self) -> &Submission {
        match self {
            SubmitOutcome::Created(s) | SubmitOutcome::Resubmitted(s) => s,
        }
    }

    pub fn into_submission(self) -> Submission {
        match self {
            SubmitOutcome::Created(s) | SubmitOutcome::Resubmitted(s) => s,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreStats {
    pub total_submissions: usize,
    pub assignments: usize,
    pub flagged: usize,
    pub graded: usize,
}

/// In-memory submission repository.
///
/// Cloning shares the underlying maps.
#[derive(Clone)]
pub struct SubmissionStore {
    submissions: Arc<DashMap<String, Submission>>,
    // (assignment_id, student_id) -> submission id
    by_student: Arc<DashMap<(String, String), String>>,
    policy: PolicyConfig,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::with_policy(PolicyConfig::default())
    }

    pub fn with_policy(policy: PolicyConfig) -> Self {
        Self {
            submissions: Arc::new(DashMap::new()),
            by_student: Arc::new(DashMap::new()),
            policy,
        }
    }

    pub fn from_state(submissions: DashMap<String, Submission>, policy: PolicyConfig) -> Self {
        let by_student = DashMap::new();
        for entry in submissions.iter() {
            let s = entry.value();
            by_student.insert((s.assignment_id.clone(), s.student_id.clone()), s.id.clone());
        }

        Self {
            submissions: Arc::new(submissions),
            by_student: Arc::new(by_student),
            policy,
        }
    }

    // Expose internal state for persistence
    pub fn get_submissions(&self) -> &Arc<DashMap<String, Submission>> {
        &self.submissions
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Texts of every other student's submission for `assignment_id`.
    fn priors_for(&self, assignment_id: &str, student_id: &str) -> Vec<PriorSubmission> {
        self.submissions
            .iter()
            .filter(|e| e.assignment_id == assignment_id && e.student_id != student_id)
            .map(|e| PriorSubmission {
                student_id: e.student_id.clone(),
                extracted_text: e.extracted_text.clone(),
            })
            .collect()
    }

    /// Records a submission or resubmission and computes its verdict.
    ///
    /// Only the new submission's verdict is written; the priors it was
    /// compared with keep theirs.
    pub fn submit(&self, req: SubmitRequest) -> Result<SubmitOutcome, SubmissionError> {
        if req.assignment_id.trim().is_empty() || req.student_id.trim().is_empty() {
            return Err(SubmissionError::InvalidInput(
                "Assignment ID and student ID required".to_string(),
            ));
        }
        if req.file.trim().is_empty() {
            return Err(SubmissionError::InvalidInput(
                "Assignment ID and submission content required".to_string(),
            ));
        }

        let key = (req.assignment_id.clone(), req.student_id.clone());

        // The entry guard serializes submits for one (assignment, student)
        // until the record is written. Lock order is by_student, then submissions.
        match self.by_student.entry(key) {
            Entry::Occupied(mut entry) => {
                let id = entry.get().clone();
                if self.submissions.get(&id).map(|s| s.is_graded()).unwrap_or(false) {
                    return Err(SubmissionError::AlreadyGraded);
                }

                let verdict = self.assess_request(&req);

                if let Some(mut existing) = self.submissions.get_mut(&id) {
                    // A grade may have landed while the verdict was computed
                    if existing.is_graded() {
                        return Err(SubmissionError::AlreadyGraded);
                    }

                    let now = Utc::now();
                    existing.file = req.file;
                    existing.file_type = req.file_type.or(existing.file_type.take());
                    if !req.extracted_text.is_empty() {
                        existing.extracted_text = req.extracted_text;
                    }
                    existing.resubmitted = true;
                    existing.submitted_at = now;
                    existing.is_late = is_late(now, req.deadline);
                    existing.plagiarism = verdict;
                    existing.touch();

                    return Ok(SubmitOutcome::Resubmitted(existing.clone()));
                }

                // Index pointed at a vanished record; replace it
                let submission = self.create(req, verdict);
                entry.insert(submission.id.clone());
                Ok(SubmitOutcome::Created(submission))
            }
            Entry::Vacant(entry) => {
                let verdict = self.assess_request(&req);
                let submission = self.create(req, verdict);
                entry.insert(submission.id.clone());
                Ok(SubmitOutcome::Created(submission))
            }
        }
    }

    fn assess_request(&self, req: &SubmitRequest) -> PlagiarismVerdict {
        let priors = self.priors_for(&req.assignment_id, &req.student_id);
        let verdict = assess(&req.extracted_text, &priors, &self.policy);

        info!(
            "Verdict for student {} on assignment {}: score {:.2}, {} matches, flagged={} (text: {} chars, {:?})",
            req.student_id,
            req.assignment_id,
            verdict.score,
            verdict.matched_with.len(),
            verdict.flagged,
            req.extracted_text.len(),
            preview(&req.extracted_text),
        );
        verdict
    }

    fn create(&self, req: SubmitRequest, verdict: PlagiarismVerdict) -> Submission {
        let submission = Submission::new(
            req.assignment_id,
            req.student_id,
            req.file,
            req.file_type,
            req.extracted_text,
            verdict,
            req.deadline,
        );
        self.submissions.insert(submission.id.clone(), submission.clone());
        submission
    }

    /// Grades a submission unless its verdict blocks grading.
    pub fn grade(
        &self,
        submission_id: &str,
        marks: f64,
        feedback: Option<String>,
    ) -> Result<Submission, SubmissionError> {
        let mut submission = self
            .submissions
            .get_mut(submission_id)
            .ok_or(SubmissionError::NotFound)?;

        ensure_gradable(&submission.plagiarism)?;

        submission.marks = Some(marks);
        submission.feedback = feedback;
        submission.resubmitted = false;
        submission.touch();

        info!("Graded submission {} with {}", submission_id, marks);
        Ok(submission.clone())
    }

    pub fn get(&self, submission_id: &str) -> Option<Submission> {
        self.submissions.get(submission_id).map(|s| s.clone())
    }

    pub fn find_for_student(&self, assignment_id: &str, student_id: &str) -> Option<Submission> {
        let key = (assignment_id.to_string(), student_id.to_string());
        let id = self.by_student.get(&key).map(|e| e.value().clone())?;
        self.get(&id)
    }

    /// All submissions for an assignment, oldest first.
    pub fn list_for_assignment(&self, assignment_id: &str) -> Vec<Submission> {
        let mut list: Vec<Submission> = self
            .submissions
            .iter()
            .filter(|e| e.assignment_id == assignment_id)
            .map(|e| e.value().clone())
            .collect();
        list.sort_unstable_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn get_stats(&self) -> StoreStats {
        let mut assignments = std::collections::HashSet::new();
        let mut flagged = 0;
        let mut graded = 0;
        for entry in self.submissions.iter() {
            assignments.insert(entry.assignment_id.clone());
            if entry.plagiarism.flagged {
                flagged += 1;
            }
            if entry.is_graded() {
                graded += 1;
            }
        }

        StoreStats {
            total_submissions: self.submissions.len(),
            assignments: assignments.len(),
            flagged,
            graded,
        }
    }
}

impl Default for SubmissionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn preview(text: &str) -> String {
    text.chars().take(TEXT_PREVIEW_CHARS).collect()
}

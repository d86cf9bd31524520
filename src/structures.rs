use crate::plagiarism::PlagiarismVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub file: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub plagiarism: PlagiarismVerdict,
    #[serde(default)]
    pub marks: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub resubmitted: bool,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub is_late: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(
        assignment_id: String,
        student_id: String,
        file: String,
        file_type: Option<String>,
        extracted_text: String,
        plagiarism: PlagiarismVerdict,
        deadline: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            assignment_id,
            student_id,
            file,
            file_type,
            extracted_text,
            plagiarism,
            marks: None,
            feedback: None,
            resubmitted: false,
            submitted_at: now,
            is_late: is_late(now, deadline),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_graded(&self) -> bool {
        self.marks.is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

pub fn is_late(submitted_at: DateTime<Utc>, deadline: Option<DateTime<Utc>>) -> bool {
    deadline.map(|d| submitted_at > d).unwrap_or(false)
}

/// API representation of a submission: the extracted text stays server side.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub file: String,
    pub file_type: Option<String>,
    pub has_text: bool,
    pub plagiarism: PlagiarismVerdict,
    pub marks: Option<f64>,
    pub feedback: Option<String>,
    pub resubmitted: bool,
    pub submitted_at: DateTime<Utc>,
    pub is_late: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Submission> for SubmissionView {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id.clone(),
            assignment_id: s.assignment_id.clone(),
            student_id: s.student_id.clone(),
            file: s.file.clone(),
            file_type: s.file_type.clone(),
            has_text: !s.extracted_text.is_empty(),
            plagiarism: s.plagiarism.clone(),
            marks: s.marks,
            feedback: s.feedback.clone(),
            resubmitted: s.resubmitted,
            submitted_at: s.submitted_at,
            is_late: s.is_late,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Instructor-facing listing entry: everything except the extracted text.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSummary {
    pub id: String,
    pub student_id: String,
    pub file: String,
    pub plagiarism: PlagiarismVerdict,
    pub marks: Option<f64>,
    pub submitted_at: DateTime<Utc>,
    pub is_late: bool,
}

impl From<&Submission> for SubmissionSummary {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id.clone(),
            student_id: s.student_id.clone(),
            file: s.file.clone(),
            plagiarism: s.plagiarism.clone(),
            marks: s.marks,
            submitted_at: s.submitted_at,
            is_late: s.is_late,
        }
    }
}

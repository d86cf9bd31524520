use chrono::{Duration, Utc};
use plagiarism_engine::plagiarism::{PolicyConfig, PolicyError};
use plagiarism_engine::store::*;
use std::sync::{Arc, Barrier};
use std::thread;

const ORIGINAL: &str = "Plate tectonics explains earthquakes volcanoes mountain building \
    through lithospheric plates moving over the asthenosphere";
const UNRELATED: &str = "Shakespeare sonnets explore love mortality beauty using iambic pentameter";

fn request(assignment: &str, student: &str, text: &str) -> SubmitRequest {
    SubmitRequest {
        assignment_id: assignment.to_string(),
        student_id: student.to_string(),
        file: format!("https://files.example/{}/{}.pdf", assignment, student),
        file_type: Some("application/pdf".to_string()),
        extracted_text: text.to_string(),
        deadline: None,
    }
}

#[test]
fn test_first_submission_unflagged() {
    let store = SubmissionStore::new();
    let outcome = store.submit(request("hw1", "alice", ORIGINAL)).unwrap();

    assert!(matches!(outcome, SubmitOutcome::Created(_)));
    let s = outcome.submission();
    assert_eq!(s.plagiarism.score, 0.0);
    assert!(s.plagiarism.matched_with.is_empty());
    assert!(!s.plagiarism.flagged);
    assert!(!s.resubmitted);
}

#[test]
fn test_copy_is_flagged_but_source_is_not() {
    let store = SubmissionStore::new();
    let alice = store.submit(request("hw1", "alice", ORIGINAL)).unwrap().into_submission();
    let bob = store.submit(request("hw1", "bob", ORIGINAL)).unwrap().into_submission();

    assert_eq!(bob.plagiarism.score, 100.0);
    assert!(bob.plagiarism.flagged);
    assert_eq!(bob.plagiarism.matched_with.len(), 1);
    assert_eq!(bob.plagiarism.matched_with[0].student_id, "alice");

    // Earlier submissions are not re-scored
    let alice_now = store.get(&alice.id).unwrap();
    assert!(!alice_now.plagiarism.flagged);
    assert!(alice_now.plagiarism.matched_with.is_empty());
}

#[test]
fn test_other_assignments_are_not_compared() {
    let store = SubmissionStore::new();
    store.submit(request("hw1", "alice", ORIGINAL)).unwrap();
    let bob = store.submit(request("hw2", "bob", ORIGINAL)).unwrap().into_submission();
    assert!(!bob.plagiarism.flagged);
    assert!(bob.plagiarism.matched_with.is_empty());
}

#[test]
fn test_empty_text_is_never_flagged() {
    let store = SubmissionStore::new();
    store.submit(request("hw1", "alice", ORIGINAL)).unwrap();
    let blank = store.submit(request("hw1", "bob", "")).unwrap().into_submission();
    assert!(!blank.plagiarism.flagged);

    // And it is never a source either
    let carol = store.submit(request("hw1", "carol", UNRELATED)).unwrap().into_submission();
    assert!(carol.plagiarism.matched_with.is_empty());
}

#[test]
fn test_resubmission_recomputes_verdict() {
    let store = SubmissionStore::new();
    store.submit(request("hw1", "alice", ORIGINAL)).unwrap();
    let first = store.submit(request("hw1", "bob", ORIGINAL)).unwrap().into_submission();
    assert!(first.plagiarism.flagged);

    let outcome = store.submit(request("hw1", "bob", UNRELATED)).unwrap();
    assert!(matches!(outcome, SubmitOutcome::Resubmitted(_)));
    let second = outcome.into_submission();

    assert_eq!(second.id, first.id);
    assert!(second.resubmitted);
    assert!(!second.plagiarism.flagged);
    assert!(second.plagiarism.matched_with.is_empty());
    assert_eq!(second.extracted_text, UNRELATED);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_resubmission_never_compares_against_self() {
    let store = SubmissionStore::new();
    store.submit(request("hw1", "alice", ORIGINAL)).unwrap();
    let again = store.submit(request("hw1", "alice", ORIGINAL)).unwrap().into_submission();
    assert!(!again.plagiarism.flagged);
    assert!(again.plagiarism.matched_with.is_empty());
}

#[test]
fn test_resubmission_with_empty_text_keeps_previous_text() {
    let store = SubmissionStore::new();
    store.submit(request("hw1", "alice", ORIGINAL)).unwrap();
    let bob = store.submit(request("hw1", "bob", UNRELATED)).unwrap().into_submission();

    let again = store.submit(request("hw1", "bob", "")).unwrap().into_submission();
    assert_eq!(again.id, bob.id);
    assert_eq!(again.extracted_text, UNRELATED);
    assert_eq!(again.plagiarism.score, 0.0);
}

#[test]
fn test_grading_blocked_when_flagged() {
    let store = SubmissionStore::new();
    store.submit(request("hw1", "alice", ORIGINAL)).unwrap();
    let bob = store.submit(request("hw1", "bob", ORIGINAL)).unwrap().into_submission();

    let err = store.grade(&bob.id, 90.0, None).unwrap_err();
    assert!(matches!(
        err,
        SubmissionError::Blocked(PolicyError::PlagiarismFlagged { .. })
    ));
    assert_eq!(err.to_string(), "Plagiarism detected. Resolve before grading.");
    assert_eq!(store.get(&bob.id).unwrap().marks, None);
}

#[test]
fn test_grading_and_graded_resubmission() {
    let store = SubmissionStore::new();
    let alice = store.submit(request("hw1", "alice", ORIGINAL)).unwrap().into_submission();

    let graded = store.grade(&alice.id, 88.5, Some("Solid".to_string())).unwrap();
    assert_eq!(graded.marks, Some(88.5));
    assert_eq!(graded.feedback.as_deref(), Some("Solid"));
    assert!(!graded.resubmitted);

    let err = store.submit(request("hw1", "alice", UNRELATED)).unwrap_err();
    assert!(matches!(err, SubmissionError::AlreadyGraded));

    assert!(matches!(store.grade("missing", 1.0, None), Err(SubmissionError::NotFound)));
}

#[test]
fn test_invalid_input() {
    let store = SubmissionStore::new();
    let mut req = request("hw1", "alice", ORIGINAL);
    req.file = "  ".to_string();
    assert!(matches!(store.submit(req), Err(SubmissionError::InvalidInput(_))));
    assert!(matches!(
        store.submit(request("", "alice", ORIGINAL)),
        Err(SubmissionError::InvalidInput(_))
    ));
    assert!(store.is_empty());
}

#[test]
fn test_late_flag() {
    let store = SubmissionStore::new();
    let mut late = request("hw1", "alice", ORIGINAL);
    late.deadline = Some(Utc::now() - Duration::hours(1));
    assert!(store.submit(late).unwrap().submission().is_late);

    let mut on_time = request("hw1", "bob", UNRELATED);
    on_time.deadline = Some(Utc::now() + Duration::hours(1));
    assert!(!store.submit(on_time).unwrap().submission().is_late);
}

#[test]
fn test_custom_policy_is_applied() {
    let store = SubmissionStore::with_policy(PolicyConfig {
        reporting_threshold: 30.0,
        blocking_threshold: 100.0,
    });
    store.submit(request("hw1", "alice", ORIGINAL)).unwrap();
    let bob = store.submit(request("hw1", "bob", ORIGINAL)).unwrap().into_submission();
    assert_eq!(bob.plagiarism.score, 100.0);
    assert!(!bob.plagiarism.flagged);
}

#[test]
fn test_listing_and_stats() {
    let store = SubmissionStore::new();
    store.submit(request("hw1", "alice", ORIGINAL)).unwrap();
    store.submit(request("hw1", "bob", ORIGINAL)).unwrap();
    store.submit(request("hw2", "carol", UNRELATED)).unwrap();

    let hw1 = store.list_for_assignment("hw1");
    assert_eq!(hw1.len(), 2);
    assert!(hw1[0].submitted_at <= hw1[1].submitted_at);

    assert_eq!(store.find_for_student("hw1", "bob").unwrap().student_id, "bob");
    assert!(store.find_for_student("hw2", "bob").is_none());

    let stats = store.get_stats();
    assert_eq!(stats.total_submissions, 3);
    assert_eq!(stats.assignments, 2);
    assert_eq!(stats.flagged, 1);
    assert_eq!(stats.graded, 0);
}

#[test]
fn test_concurrent_first_submissions_create_one_record() {
    const THREADS: usize = 8;

    for round in 0..200 {
        let store = SubmissionStore::new();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.submit(request("hw1", "alice", ORIGINAL)).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<SubmitOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let created = outcomes
            .iter()
            .filter(|o| matches!(o, SubmitOutcome::Created(_)))
            .count();

        assert_eq!(created, 1, "round {}", round);
        assert_eq!(store.len(), 1, "round {}", round);
        assert_eq!(store.list_for_assignment("hw1").len(), 1, "round {}", round);

        let id = &store.find_for_student("hw1", "alice").unwrap().id;
        assert!(outcomes.iter().all(|o| &o.submission().id == id));
    }
}

#[test]
fn test_resubmit_racing_grade_never_reopens_graded_record() {
    const RESUBMITTERS: usize = 7;

    for round in 0..200 {
        let store = SubmissionStore::new();
        let alice = store.submit(request("hw1", "alice", ORIGINAL)).unwrap().into_submission();
        let barrier = Arc::new(Barrier::new(RESUBMITTERS + 1));

        let grader = {
            let store = store.clone();
            let barrier = barrier.clone();
            let id = alice.id.clone();
            thread::spawn(move || {
                barrier.wait();
                store.grade(&id, 75.0, None).unwrap()
            })
        };

        let resubmitters: Vec<_> = (0..RESUBMITTERS)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.submit(request("hw1", "alice", UNRELATED))
                })
            })
            .collect();

        grader.join().unwrap();
        for handle in resubmitters {
            match handle.join().unwrap() {
                Ok(outcome) => assert!(matches!(outcome, SubmitOutcome::Resubmitted(_))),
                Err(e) => assert!(matches!(e, SubmissionError::AlreadyGraded), "round {}", round),
            }
        }

        let last = store.get(&alice.id).unwrap();
        assert_eq!(last.marks, Some(75.0), "round {}", round);
        assert!(!last.resubmitted, "round {}", round);
        assert_eq!(store.len(), 1);

        // Once graded, every later resubmit is refused
        assert!(matches!(
            store.submit(request("hw1", "alice", UNRELATED)),
            Err(SubmissionError::AlreadyGraded)
        ));
    }
}

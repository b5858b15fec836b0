use std::sync::Arc;

use chrono::{Duration as TimeDelta, Utc};

use super::common::*;
use crate::registration::{
    transition_allowed, GrantError, GrantPurpose, GrantRequest, NotificationKind,
    RegistrationRepository, RegistrationServiceError, RegistrationStatus, RepositoryError,
};

#[test]
fn submit_records_a_pending_registration_with_answer_rows() {
    let h = harness();

    let registration = h.service.submit(submission()).expect("submission accepted");

    assert_eq!(registration.status, RegistrationStatus::PendingApproval);
    assert!(!registration.auto_approved);
    assert_eq!(registration.assessment_runs, 0);

    // One row per value-bearing requirement; gate requirements get none.
    assert_eq!(registration.answers.len(), 4);
    let sail = registration
        .answers
        .iter()
        .find(|answer| answer.requirement_id == "req-sail")
        .expect("skill row present");
    // The skill row carries the profile self-description verbatim.
    assert_eq!(sail.value, "Five seasons as trimmer on coastal deliveries");
    assert_eq!(sail.score, None);

    let passport = registration
        .answers
        .iter()
        .find(|answer| answer.requirement_id == "req-pass")
        .expect("passport row present");
    assert_eq!(passport.value, PASSPORT_DOC);
}

#[test]
fn submit_rejects_a_second_registration_for_the_same_pair() {
    let h = harness();
    h.service.submit(submission()).expect("first accepted");

    match h.service.submit(submission()) {
        Err(RegistrationServiceError::Repository(RepositoryError::Conflict)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn submit_rejects_unknown_legs_and_crew() {
    let h = harness();

    let mut unknown_leg = submission();
    unknown_leg.leg_id = "leg-nowhere".to_string();
    assert!(matches!(
        h.service.submit(unknown_leg),
        Err(RegistrationServiceError::Directory(_))
    ));

    let mut unknown_crew = submission();
    unknown_crew.crew_id = "crew-nobody".to_string();
    assert!(matches!(
        h.service.submit(unknown_crew),
        Err(RegistrationServiceError::Directory(_))
    ));
}

#[test]
fn assess_auto_approves_and_notifies_the_crew_member() {
    let h = harness();
    identity_grant(&h.grants, 3600);
    let registration = h.service.submit(submission()).expect("accepted");

    let outcome = h
        .service
        .assess(&registration.registration_id, None)
        .expect("assessment runs");
    assert!(outcome.auto_approved());

    let stored = h
        .repository
        .fetch(&registration.registration_id)
        .expect("fetch")
        .expect("stored");
    assert_eq!(stored.status, RegistrationStatus::Approved);
    assert!(stored.auto_approved);
    assert!(stored.assessed_at.is_some());
    assert_eq!(stored.assessment_runs, 1);
    assert!(stored.aggregate_score.is_some());

    let sent = h.notifications.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, CREW);
    assert_eq!(sent[0].kind, NotificationKind::RegistrationAutoApproved);
}

#[test]
fn manual_review_notifies_both_crew_and_owner() {
    // No grant exists, so the passport stage halts to manual review.
    let h = harness();
    let registration = h.service.submit(submission()).expect("accepted");

    let outcome = h
        .service
        .assess(&registration.registration_id, None)
        .expect("assessment runs");
    assert!(!outcome.auto_approved());

    let stored = h
        .repository
        .fetch(&registration.registration_id)
        .expect("fetch")
        .expect("stored");
    assert_eq!(stored.status, RegistrationStatus::PendingApproval);
    assert!(!stored.auto_approved);
    assert!(stored.reasoning.contains("manual review required"));

    let sent = h.notifications.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].user_id, CREW);
    assert_eq!(sent[0].kind, NotificationKind::RegistrationPendingReview);
    assert_eq!(sent[1].user_id, OWNER);
    assert_eq!(sent[1].kind, NotificationKind::ReviewRequired);
}

#[test]
fn second_assessment_is_rejected_and_leaves_terminal_fields_unchanged() {
    let h = harness();
    identity_grant(&h.grants, 3600);
    let registration = h.service.submit(submission()).expect("accepted");
    h.service
        .assess(&registration.registration_id, None)
        .expect("first run");

    let before = h
        .repository
        .fetch(&registration.registration_id)
        .expect("fetch")
        .expect("stored");

    match h.service.assess(&registration.registration_id, None) {
        Err(RegistrationServiceError::Repository(RepositoryError::AlreadyAssessed)) => {}
        other => panic!("expected already-assessed rejection, got {other:?}"),
    }

    let after = h
        .repository
        .fetch(&registration.registration_id)
        .expect("fetch")
        .expect("stored");
    assert_eq!(before, after);
}

#[test]
fn directory_failure_releases_the_claim_for_a_later_run() {
    let h = harness();
    identity_grant(&h.grants, 3600);
    let registration = h.service.submit(submission()).expect("accepted");

    // Pull the leg out of the read model between submission and assessment.
    h.requirements.remove(LEG);
    assert!(matches!(
        h.service.assess(&registration.registration_id, None),
        Err(RegistrationServiceError::Directory(_))
    ));

    // The registration is untouched and a later run can still claim it.
    let stored = h
        .repository
        .fetch(&registration.registration_id)
        .expect("fetch")
        .expect("stored");
    assert_eq!(stored.assessment_runs, 0);
    assert!(stored.assessed_at.is_none());

    h.requirements.put(leg_requirements());
    let outcome = h
        .service
        .assess(&registration.registration_id, None)
        .expect("retry succeeds");
    assert!(outcome.auto_approved());
}

#[test]
fn status_view_reports_pending_assessment_before_the_first_run() {
    let h = harness();
    let registration = h.service.submit(submission()).expect("accepted");

    let view = h
        .service
        .get(&registration.registration_id)
        .expect("status available");
    assert_eq!(view.status, "pending_approval");
    assert_eq!(view.reasoning, "pending assessment");
    assert_eq!(view.aggregate_score, None);
}

#[test]
fn create_grant_requires_document_ownership() {
    let h = harness();
    let request = GrantRequest {
        document_id: PASSPORT_DOC.to_string(),
        grantee_id: OWNER.to_string(),
        purpose: GrantPurpose::IdentityVerification,
        expires_at: Utc::now() + TimeDelta::days(7),
        max_views: Some(3),
    };

    match h.service.create_grant("owner-imposter", request.clone()) {
        Err(RegistrationServiceError::Grant(GrantError::NotOwner)) => {}
        other => panic!("expected not-owner rejection, got {other:?}"),
    }

    let grant = h.service.create_grant(CREW, request).expect("owner creates");
    assert_eq!(grant.owner_id, CREW);
    assert_eq!(grant.grantee_id, OWNER);
}

#[test]
fn create_grant_rejects_unknown_documents() {
    let h = harness();
    let request = GrantRequest {
        document_id: "doc-missing".to_string(),
        grantee_id: OWNER.to_string(),
        purpose: GrantPurpose::IdentityVerification,
        expires_at: Utc::now() + TimeDelta::days(7),
        max_views: None,
    };
    assert!(matches!(
        h.service.create_grant(CREW, request),
        Err(RegistrationServiceError::UnknownDocument)
    ));
}

#[test]
fn review_queue_lists_only_assessed_pending_registrations() {
    let h = harness();
    let registration = h.service.submit(submission()).expect("accepted");

    // Not yet assessed: nothing for a human to look at.
    assert!(h.service.review_queue(10).expect("queue readable").is_empty());

    // No grant exists, so assessment parks the registration for review.
    h.service
        .assess(&registration.registration_id, None)
        .expect("assessment runs");

    let queue = h.service.review_queue(10).expect("queue readable");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].registration_id, registration.registration_id);
    assert_eq!(queue[0].status, "pending_approval");
    assert!(!queue[0].auto_approved);
}

#[test]
fn review_queue_excludes_auto_approved_registrations() {
    let h = harness();
    identity_grant(&h.grants, 3600);
    let registration = h.service.submit(submission()).expect("accepted");
    h.service
        .assess(&registration.registration_id, None)
        .expect("assessment runs");

    assert!(h.service.review_queue(10).expect("queue readable").is_empty());
}

#[test]
fn store_rejects_backward_status_transitions() {
    let h = harness();
    let registration = h.service.submit(submission()).expect("accepted");

    let mut cancelled = h
        .repository
        .fetch(&registration.registration_id)
        .expect("fetch")
        .expect("stored");
    cancelled.status = RegistrationStatus::Cancelled;
    h.repository
        .complete_assessment(cancelled)
        .expect("forward transition accepted");

    let mut revived = h
        .repository
        .fetch(&registration.registration_id)
        .expect("fetch")
        .expect("stored");
    revived.status = RegistrationStatus::PendingApproval;
    match h.repository.complete_assessment(revived) {
        Err(RepositoryError::InvalidTransition { from, to }) => {
            assert_eq!(from, "cancelled");
            assert_eq!(to, "pending_approval");
        }
        other => panic!("expected invalid-transition rejection, got {other:?}"),
    }

    let stored = h
        .repository
        .fetch(&registration.registration_id)
        .expect("fetch")
        .expect("stored");
    assert_eq!(stored.status, RegistrationStatus::Cancelled);
}

#[test]
fn terminal_statuses_accept_no_further_transitions() {
    use RegistrationStatus::{Approved, Cancelled, NotApproved, PendingApproval};

    for terminal in [NotApproved, Cancelled] {
        for to in [PendingApproval, Approved, NotApproved, Cancelled] {
            assert!(!transition_allowed(terminal, to));
        }
    }
    assert!(transition_allowed(PendingApproval, Approved));
    assert!(transition_allowed(Approved, Cancelled));
    assert!(!transition_allowed(Approved, PendingApproval));
}

#[test]
fn open_from_match_is_idempotent_per_pair() {
    let h = harness();

    let first = h.service.open_from_match(CREW, LEG).expect("opened");
    let second = h.service.open_from_match(CREW, LEG).expect("reused");
    assert_eq!(first.registration_id, second.registration_id);

    let pair = h
        .repository
        .find_pair(LEG, CREW)
        .expect("lookup")
        .expect("exists");
    assert_eq!(pair.registration_id, first.registration_id);
}

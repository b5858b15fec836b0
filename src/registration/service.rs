use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::ai::AiScoringClient;

use super::domain::{
    FacialCapture, LegRequirements, Registration, RegistrationAnswer, RegistrationId,
    RegistrationStatus, RegistrationSubmission, RequirementKind,
};
use super::grants::{
    AccessLog, CreateGrant, DocumentAccessGrant, DocumentStore, DocumentStoreError, GrantError,
    GrantId, GrantPurpose, GrantStore,
};
use super::pipeline::{AssessmentInput, AssessmentOutcome, RegistrationAssessmentPipeline};
use super::repository::{
    DirectoryError, Notification, NotificationDispatcher, NotificationError, NotificationKind,
    ProfileDirectory, RegistrationRepository, RegistrationStatusView, RepositoryError,
    RequirementStore,
};

/// Service facade composing the repository, the external read models, and
/// the assessment pipeline.
pub struct RegistrationService<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    requirements: Arc<dyn RequirementStore>,
    profiles: Arc<dyn ProfileDirectory>,
    grants: Arc<dyn GrantStore>,
    access_log: Arc<dyn AccessLog>,
    documents: Arc<dyn DocumentStore>,
    ai: Arc<AiScoringClient>,
}

static REGISTRATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_registration_id() -> RegistrationId {
    let id = REGISTRATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RegistrationId(format!("reg-{id:06}"))
}

/// Owner request to create a document access grant.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub document_id: String,
    pub grantee_id: String,
    pub purpose: GrantPurpose,
    pub expires_at: chrono::DateTime<Utc>,
    pub max_views: Option<u32>,
}

impl<R, N> RegistrationService<R, N>
where
    R: RegistrationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<R>,
        notifications: Arc<N>,
        requirements: Arc<dyn RequirementStore>,
        profiles: Arc<dyn ProfileDirectory>,
        grants: Arc<dyn GrantStore>,
        access_log: Arc<dyn AccessLog>,
        documents: Arc<dyn DocumentStore>,
        ai: Arc<AiScoringClient>,
    ) -> Self {
        Self {
            repository,
            notifications,
            requirements,
            profiles,
            grants,
            access_log,
            documents,
            ai,
        }
    }

    /// Record a new registration and return it. Synchronous: assessment is
    /// triggered separately so the submitting request returns immediately.
    pub fn submit(
        &self,
        submission: RegistrationSubmission,
    ) -> Result<Registration, RegistrationServiceError> {
        let requirements = self.requirements.requirements_for(&submission.leg_id)?;
        let profile = self.profiles.snapshot(&submission.crew_id)?;

        if self
            .repository
            .find_pair(&submission.leg_id, &submission.crew_id)?
            .is_some()
        {
            return Err(RepositoryError::Conflict.into());
        }

        let answers = build_answers(&requirements, &submission, &profile.skill_statements);

        let registration = Registration {
            registration_id: next_registration_id(),
            leg_id: submission.leg_id,
            crew_id: submission.crew_id,
            status: RegistrationStatus::PendingApproval,
            auto_approved: false,
            aggregate_score: None,
            reasoning: String::new(),
            answers,
            created_at: Utc::now(),
            assessed_at: None,
            assessment_runs: 0,
        };

        let stored = self.repository.insert(registration)?;
        Ok(stored)
    }

    /// Run the assessment pipeline for one registration. Invoked
    /// asynchronously after submission; the claim enforces a single
    /// assessment run in flight and rejects re-entry once terminal fields
    /// are written.
    pub fn assess(
        &self,
        registration_id: &RegistrationId,
        facial_capture: Option<FacialCapture>,
    ) -> Result<AssessmentOutcome, RegistrationServiceError> {
        let mut registration = self.repository.claim_for_assessment(registration_id)?;

        let requirements = match self.requirements.requirements_for(&registration.leg_id) {
            Ok(requirements) => requirements,
            Err(err) => {
                // Release the claim untouched so a later run can retry.
                let _ = self.repository.complete_assessment(registration);
                return Err(err.into());
            }
        };
        let profile = match self.profiles.snapshot(&registration.crew_id) {
            Ok(profile) => profile,
            Err(err) => {
                let _ = self.repository.complete_assessment(registration);
                return Err(err.into());
            }
        };

        let pipeline = RegistrationAssessmentPipeline::new(
            self.grants.as_ref(),
            self.access_log.as_ref(),
            self.documents.as_ref(),
            self.ai.as_ref(),
        );
        let now = Utc::now();
        let outcome = pipeline.run(AssessmentInput {
            requirements: &requirements,
            profile: &profile,
            answers: &registration.answers,
            facial_capture: facial_capture.as_ref(),
            now,
        });

        if outcome.auto_approved() {
            registration.status = RegistrationStatus::Approved;
            registration.auto_approved = true;
        }
        registration.aggregate_score = outcome.aggregate_score;
        registration.reasoning = outcome.reasoning.clone();
        registration.answers = outcome.scored_answers.clone();
        registration.assessed_at = Some(now);
        registration.assessment_runs += 1;

        self.repository.complete_assessment(registration.clone())?;
        info!(
            registration = registration.registration_id.0,
            auto_approved = registration.auto_approved,
            "assessment complete"
        );

        self.dispatch_outcome(&registration, &requirements)?;
        Ok(outcome)
    }

    /// Fetch a registration's exposed status.
    pub fn get(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<RegistrationStatusView, RegistrationServiceError> {
        let registration = self
            .repository
            .fetch(registration_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(RegistrationStatusView::from_registration(&registration))
    }

    /// Registrations waiting on a human decision, oldest first. Backed by
    /// the repository's pending list: assessed but not auto-approved.
    pub fn review_queue(
        &self,
        limit: usize,
    ) -> Result<Vec<RegistrationStatusView>, RegistrationServiceError> {
        let pending = self.repository.pending(limit)?;
        Ok(pending
            .iter()
            .map(RegistrationStatusView::from_registration)
            .collect())
    }

    /// Owner-only grant creation. The caller must be the document owner;
    /// the server never creates a grant on an owner's behalf.
    pub fn create_grant(
        &self,
        caller_id: &str,
        request: GrantRequest,
    ) -> Result<DocumentAccessGrant, RegistrationServiceError> {
        let owner = self
            .documents
            .owner_of(&request.document_id)?
            .ok_or(RegistrationServiceError::UnknownDocument)?;
        if owner != caller_id {
            return Err(GrantError::NotOwner.into());
        }

        let grant = self.grants.create(
            CreateGrant {
                document_id: request.document_id,
                owner_id: owner,
                grantee_id: request.grantee_id,
                purpose: request.purpose,
                expires_at: request.expires_at,
                max_views: request.max_views,
            },
            Utc::now(),
        )?;
        Ok(grant)
    }

    /// Owner-only grant revocation.
    pub fn revoke_grant(
        &self,
        caller_id: &str,
        grant_id: &GrantId,
    ) -> Result<(), RegistrationServiceError> {
        self.grants.revoke(grant_id, caller_id)?;
        Ok(())
    }

    /// Open a registration from a mutual match acceptance. Idempotent: an
    /// existing registration for the pair is returned unchanged, so
    /// repeated accepts never create duplicates.
    pub fn open_from_match(
        &self,
        crew_id: &str,
        leg_id: &str,
    ) -> Result<Registration, RegistrationServiceError> {
        if let Some(existing) = self.repository.find_pair(leg_id, crew_id)? {
            return Ok(existing);
        }

        self.submit(RegistrationSubmission {
            leg_id: leg_id.to_string(),
            crew_id: crew_id.to_string(),
            answers: Vec::new(),
            passport_document_id: None,
            facial_capture: None,
        })
    }

    fn dispatch_outcome(
        &self,
        registration: &Registration,
        requirements: &LegRequirements,
    ) -> Result<(), RegistrationServiceError> {
        let mut details = BTreeMap::new();
        details.insert(
            "registration_id".to_string(),
            registration.registration_id.0.clone(),
        );
        details.insert("status".to_string(), registration.status.label().to_string());
        details.insert("reasoning".to_string(), registration.reasoning.clone());

        let crew_kind = if registration.auto_approved {
            NotificationKind::RegistrationAutoApproved
        } else {
            NotificationKind::RegistrationPendingReview
        };
        self.notifications.notify(Notification {
            user_id: registration.crew_id.clone(),
            kind: crew_kind,
            details: details.clone(),
        })?;

        if !registration.auto_approved {
            self.notifications.notify(Notification {
                user_id: requirements.owner_id.clone(),
                kind: NotificationKind::ReviewRequired,
                details,
            })?;
        }
        Ok(())
    }
}

/// Build one answer row per value-bearing requirement. Skill rows carry
/// the candidate's own self-description for the area (a submitted override
/// wins over the profile statement); question rows carry the literal
/// answer; the passport row carries the referenced document id. Gate
/// requirements hold no user value and get no row.
fn build_answers(
    requirements: &LegRequirements,
    submission: &RegistrationSubmission,
    skill_statements: &BTreeMap<String, String>,
) -> Vec<RegistrationAnswer> {
    let submitted = |requirement_id: &str| -> Option<&str> {
        submission
            .answers
            .iter()
            .find(|answer| answer.requirement_id == requirement_id)
            .map(|answer| answer.value.as_str())
            .filter(|value| !value.trim().is_empty())
    };

    let mut answers = Vec::new();
    for requirement in &requirements.requirements {
        match &requirement.kind {
            RequirementKind::Skill { area, .. } => {
                let value = submitted(&requirement.requirement_id)
                    .map(str::to_string)
                    .or_else(|| skill_statements.get(area).cloned())
                    .unwrap_or_default();
                answers.push(RegistrationAnswer::unscored(
                    requirement.requirement_id.clone(),
                    value,
                ));
            }
            RequirementKind::Question { .. } => {
                let value = submitted(&requirement.requirement_id).unwrap_or_default();
                answers.push(RegistrationAnswer::unscored(
                    requirement.requirement_id.clone(),
                    value,
                ));
            }
            RequirementKind::Passport { .. } => {
                let value = submission.passport_document_id.clone().unwrap_or_default();
                answers.push(RegistrationAnswer::unscored(
                    requirement.requirement_id.clone(),
                    value,
                ));
            }
            RequirementKind::RiskLevel(_) | RequirementKind::ExperienceLevel(_) => {}
        }
    }
    answers
}

/// Error raised by the registration service.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Grant(#[from] GrantError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Document(#[from] DocumentStoreError),
    #[error("document not found")]
    UnknownDocument,
}

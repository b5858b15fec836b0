use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    CrewProfileSnapshot, LegRequirements, Registration, RegistrationId, RegistrationStatus,
};

/// Storage abstraction for registrations. `claim_for_assessment` enforces
/// the single-writer invariant: exactly one assessment run may hold a
/// registration's terminal fields at a time, and a claim on an
/// already-assessed registration fails without touching them.
pub trait RegistrationRepository: Send + Sync {
    fn insert(&self, registration: Registration) -> Result<Registration, RepositoryError>;
    fn claim_for_assessment(&self, id: &RegistrationId) -> Result<Registration, RepositoryError>;
    fn complete_assessment(&self, registration: Registration) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RegistrationId) -> Result<Option<Registration>, RepositoryError>;
    fn find_pair(
        &self,
        leg_id: &str,
        crew_id: &str,
    ) -> Result<Option<Registration>, RepositoryError>;
    fn pending(&self, limit: usize) -> Result<Vec<Registration>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("a registration already exists for this crew member and leg")]
    Conflict,
    #[error("registration not found")]
    NotFound,
    #[error("registration has already been assessed")]
    AlreadyAssessed,
    #[error("an assessment run is already in flight for this registration")]
    AssessmentInFlight,
    #[error("status may not move from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// External read model for a leg's configured requirements.
pub trait RequirementStore: Send + Sync {
    fn requirements_for(&self, leg_id: &str) -> Result<LegRequirements, DirectoryError>;
}

/// External read model for crew profiles. Snapshots are taken once per
/// pipeline run.
pub trait ProfileDirectory: Send + Sync {
    fn snapshot(&self, crew_id: &str) -> Result<CrewProfileSnapshot, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unknown leg")]
    UnknownLeg,
    #[error("unknown crew member")]
    UnknownCrew,
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification kinds emitted by the assessment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    RegistrationAutoApproved,
    RegistrationPendingReview,
    ReviewRequired,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::RegistrationAutoApproved => "registration_auto_approved",
            NotificationKind::RegistrationPendingReview => "registration_pending_review",
            NotificationKind::ReviewRequired => "review_required",
        }
    }
}

/// Notification payload handed to the external dispatch transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub details: BTreeMap<String, String>,
}

/// Trait describing the outbound notification transport.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Sanitized status snapshot exposed through the API.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatusView {
    pub registration_id: RegistrationId,
    pub status: &'static str,
    pub auto_approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_score: Option<f32>,
    pub reasoning: String,
}

impl RegistrationStatusView {
    pub fn from_registration(registration: &Registration) -> Self {
        let reasoning = if registration.reasoning.is_empty() {
            "pending assessment".to_string()
        } else {
            registration.reasoning.clone()
        };
        Self {
            registration_id: registration.registration_id.clone(),
            status: registration.status.label(),
            auto_approved: registration.auto_approved,
            aggregate_score: registration.aggregate_score,
            reasoning,
        }
    }
}

/// Forward-only status rule, enforced by stores whenever a record's status
/// is rewritten. Terminal statuses accept no further transitions.
pub fn transition_allowed(from: RegistrationStatus, to: RegistrationStatus) -> bool {
    use RegistrationStatus::{Approved, Cancelled, NotApproved, PendingApproval};
    if from.is_terminal() {
        return false;
    }
    match (from, to) {
        (PendingApproval, Approved | NotApproved | Cancelled) => true,
        (Approved, Cancelled) => true,
        _ => false,
    }
}

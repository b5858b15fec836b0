//! Registration eligibility and auto-approval assessment.
//!
//! A submission walks deterministic gates first (free to evaluate), then
//! AI-backed passport and skill/question checks, and is auto-approved only
//! when every configured step clears its threshold. Every other path
//! resolves to pending manual review; only humans deny.

pub mod domain;
pub mod gates;
pub mod grants;
pub mod passport;
pub mod pipeline;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AvailabilityWindow, CrewProfileSnapshot, ExperienceLevel, FacialCapture, LegRequirements,
    PassportPolicy, Registration, RegistrationAnswer, RegistrationId, RegistrationStatus,
    RegistrationSubmission, RequirementKind, RiskLevel, SubmittedAnswer, VoyageRequirement,
};
pub use grants::{
    AccessLog, AccessLogEntry, AccessOutcome, CreateGrant, DocumentAccessGrant,
    DocumentGrantValidator, DocumentStore, DocumentStoreError, GrantError, GrantId, GrantPurpose,
    GrantStore, MAX_GRANT_LIFETIME_DAYS,
};
pub use pipeline::{
    AssessmentDecision, AssessmentInput, AssessmentOutcome, AssessmentStage,
    RegistrationAssessmentPipeline, StageResult,
};
pub use repository::{
    transition_allowed, DirectoryError, Notification, NotificationDispatcher, NotificationError,
    NotificationKind, ProfileDirectory, RegistrationRepository, RegistrationStatusView,
    RepositoryError, RequirementStore,
};
pub use router::registration_router;
pub use service::{GrantRequest, RegistrationService, RegistrationServiceError};

//! Crew-controlled, purpose-bound, time-limited document access grants.
//!
//! A grant is created only by the document owner and revocable only by the
//! owner. Every validation, successful or not, lands in an append-only
//! access log. The check-and-increment on `view_count` is a single atomic
//! store operation so concurrent readers cannot overrun `max_views`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for document access grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantId(pub String);

/// Purposes a grant can be bound to. A grant for one purpose is unusable
/// for any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantPurpose {
    IdentityVerification,
    QualificationReview,
    MedicalClearance,
}

impl GrantPurpose {
    pub const fn label(self) -> &'static str {
        match self {
            GrantPurpose::IdentityVerification => "identity_verification",
            GrantPurpose::QualificationReview => "qualification_review",
            GrantPurpose::MedicalClearance => "medical_clearance",
        }
    }
}

/// Longest lifetime an owner may give a grant at creation.
pub const MAX_GRANT_LIFETIME_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAccessGrant {
    pub grant_id: GrantId,
    pub document_id: String,
    pub owner_id: String,
    pub grantee_id: String,
    pub purpose: GrantPurpose,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_views: Option<u32>,
    pub view_count: u32,
    pub is_revoked: bool,
}

impl DocumentAccessGrant {
    /// The usability invariant, checked in order: not revoked, not expired,
    /// views remaining, purpose matches. A grant one second past expiry is
    /// already unusable.
    pub fn usable_for(&self, purpose: GrantPurpose, now: DateTime<Utc>) -> Result<(), GrantError> {
        if self.is_revoked {
            return Err(GrantError::Revoked);
        }
        if self.expires_at <= now {
            return Err(GrantError::Expired);
        }
        if let Some(max_views) = self.max_views {
            if self.view_count >= max_views {
                return Err(GrantError::ViewsExhausted);
            }
        }
        if self.purpose != purpose {
            return Err(GrantError::PurposeMismatch);
        }
        Ok(())
    }
}

/// Grant failures. Missing and Expired are surfaced distinctly from
/// scoring failures so callers and reviewers can tell a security
/// precondition from a quality judgment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
    #[error("no access grant exists for this document and grantee")]
    Missing,
    #[error("access grant has expired")]
    Expired,
    #[error("access grant was revoked by its owner")]
    Revoked,
    #[error("access grant view allowance is exhausted")]
    ViewsExhausted,
    #[error("access grant covers a different purpose")]
    PurposeMismatch,
    #[error("only the document owner may manage grants for it")]
    NotOwner,
    #[error("grant expiry may not exceed 30 days from creation")]
    ExpiryTooFar,
    #[error("grant expiry must be in the future")]
    ExpiryInPast,
    #[error("grant not found")]
    NotFound,
    #[error("grant store unavailable: {0}")]
    Unavailable(String),
}

/// Owner command to create a grant. The server never synthesizes one of
/// these on an owner's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGrant {
    pub document_id: String,
    pub owner_id: String,
    pub grantee_id: String,
    pub purpose: GrantPurpose,
    pub expires_at: DateTime<Utc>,
    pub max_views: Option<u32>,
}

impl CreateGrant {
    /// Lifetime bounds checked at creation time.
    pub fn validate_lifetime(&self, now: DateTime<Utc>) -> Result<(), GrantError> {
        if self.expires_at <= now {
            return Err(GrantError::ExpiryInPast);
        }
        if self.expires_at > now + Duration::days(MAX_GRANT_LIFETIME_DAYS) {
            return Err(GrantError::ExpiryTooFar);
        }
        Ok(())
    }
}

/// Storage abstraction for grants. `validate_and_consume` must be
/// linearizable per grant: the usability check and the `view_count`
/// increment happen as one atomic operation.
pub trait GrantStore: Send + Sync {
    fn create(
        &self,
        command: CreateGrant,
        now: DateTime<Utc>,
    ) -> Result<DocumentAccessGrant, GrantError>;
    fn revoke(&self, grant_id: &GrantId, caller_id: &str) -> Result<(), GrantError>;
    fn validate_and_consume(
        &self,
        document_id: &str,
        grantee_id: &str,
        purpose: GrantPurpose,
        now: DateTime<Utc>,
    ) -> Result<DocumentAccessGrant, GrantError>;
}

/// Whether a validation attempt was allowed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccessOutcome {
    Granted,
    Denied { reason: String },
}

/// One row in the append-only access log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub document_id: String,
    pub grantee_id: String,
    pub purpose: GrantPurpose,
    pub outcome: AccessOutcome,
    pub at: DateTime<Utc>,
}

/// Append-only audit sink. No caller is given update or delete capability.
pub trait AccessLog: Send + Sync {
    fn record(&self, entry: AccessLogEntry);
}

/// External document storage, consumed at its interface only.
pub trait DocumentStore: Send + Sync {
    fn owner_of(&self, document_id: &str) -> Result<Option<String>, DocumentStoreError>;
    /// Fetch content through an already-validated grant.
    fn fetch(
        &self,
        document_id: &str,
        grant: &DocumentAccessGrant,
    ) -> Result<Vec<u8>, DocumentStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentStoreError {
    #[error("document not found")]
    NotFound,
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Validator every reader goes through before a document fetch. Wraps the
/// store's atomic check with the audit write.
pub struct DocumentGrantValidator<'a> {
    store: &'a dyn GrantStore,
    log: &'a dyn AccessLog,
}

impl<'a> DocumentGrantValidator<'a> {
    pub fn new(store: &'a dyn GrantStore, log: &'a dyn AccessLog) -> Self {
        Self { store, log }
    }

    pub fn validate(
        &self,
        document_id: &str,
        grantee_id: &str,
        purpose: GrantPurpose,
        now: DateTime<Utc>,
    ) -> Result<DocumentAccessGrant, GrantError> {
        let result = self
            .store
            .validate_and_consume(document_id, grantee_id, purpose, now);

        let outcome = match &result {
            Ok(_) => AccessOutcome::Granted,
            Err(err) => AccessOutcome::Denied {
                reason: err.to_string(),
            },
        };
        self.log.record(AccessLogEntry {
            document_id: document_id.to_string(),
            grantee_id: grantee_id.to_string(),
            purpose,
            outcome,
            at: now,
        });

        result
    }
}

//! Passport assessment: grant validation, document fetch, and AI checks
//! for expiry, holder-name consistency, and (optionally) facial match.

use chrono::{DateTime, Utc};

use crate::ai::{AiScoringClient, ScoreRequest};

use super::domain::{CrewProfileSnapshot, FacialCapture};
use super::grants::{
    DocumentGrantValidator, DocumentStore, GrantError, GrantPurpose,
};

/// Successful passport check with the combined confidence that cleared the
/// configured bar.
#[derive(Debug, Clone, PartialEq)]
pub struct PassportCheck {
    pub confidence: f32,
    pub rationale: String,
}

/// Reasons the passport stage halts the pipeline. Every variant resolves
/// to manual review, never a crash.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PassportFailure {
    #[error("passport access grant check failed: {0}")]
    Grant(GrantError),
    #[error("passport document could not be fetched: {0}")]
    Document(String),
    #[error("passport validation provider unavailable: {0}")]
    Provider(String),
    #[error("photo validation is required but no facial capture accompanied the submission")]
    MissingFacialCapture,
    #[error("passport confidence {confidence:.1} below required {required:.1}: {rationale}")]
    BelowThreshold {
        confidence: f32,
        required: f32,
        rationale: String,
    },
}

/// Orchestrates the passport requirement end to end.
pub struct PassportAssessor<'a> {
    grants: DocumentGrantValidator<'a>,
    documents: &'a dyn DocumentStore,
    ai: &'a AiScoringClient,
}

impl<'a> PassportAssessor<'a> {
    pub fn new(
        grants: DocumentGrantValidator<'a>,
        documents: &'a dyn DocumentStore,
        ai: &'a AiScoringClient,
    ) -> Self {
        Self {
            grants,
            documents,
            ai,
        }
    }

    /// Run the passport check for one candidate. The facial capture, when
    /// present, is read here and nowhere else; callers drop it after the
    /// run.
    pub fn assess(
        &self,
        profile: &CrewProfileSnapshot,
        document_id: &str,
        requires_photo_validation: bool,
        pass_confidence: f32,
        facial_capture: Option<&FacialCapture>,
        now: DateTime<Utc>,
    ) -> Result<PassportCheck, PassportFailure> {
        let grant = self
            .grants
            .validate(
                document_id,
                &profile.crew_id,
                GrantPurpose::IdentityVerification,
                now,
            )
            .map_err(PassportFailure::Grant)?;

        let content = self
            .documents
            .fetch(document_id, &grant)
            .map_err(|err| PassportFailure::Document(err.to_string()))?;

        let document_check = self
            .ai
            .score(&document_request(profile, &content, now))
            .map_err(|err| PassportFailure::Provider(err.to_string()))?;

        let mut confidence = document_check.score;
        let mut rationale = document_check.rationale;

        if requires_photo_validation {
            let capture = facial_capture.ok_or(PassportFailure::MissingFacialCapture)?;
            let photo_check = self
                .ai
                .score(&photo_request(&content, capture))
                .map_err(|err| PassportFailure::Provider(err.to_string()))?;

            // A weak link anywhere voids the whole check.
            confidence = confidence.min(photo_check.score);
            rationale = format!("{rationale}; facial match: {}", photo_check.rationale);
        }

        if confidence < pass_confidence {
            return Err(PassportFailure::BelowThreshold {
                confidence,
                required: pass_confidence,
                rationale,
            });
        }

        Ok(PassportCheck {
            confidence,
            rationale,
        })
    }
}

fn document_request(
    profile: &CrewProfileSnapshot,
    content: &[u8],
    now: DateTime<Utc>,
) -> ScoreRequest {
    ScoreRequest {
        subject: format!("passport:{}", profile.crew_id),
        rubric: format!(
            "Confirm the attached passport is unexpired as of {} and that the holder \
             name is consistent with the profile name '{}'. Score 0-10 confidence.",
            now.date_naive(),
            profile.display_name
        ),
        input: String::from_utf8_lossy(content).into_owned(),
        attachments: vec![content.to_vec()],
    }
}

fn photo_request(content: &[u8], capture: &FacialCapture) -> ScoreRequest {
    ScoreRequest {
        subject: "passport:facial-match".to_string(),
        rubric: "Compare the passport portrait with the freshly captured facial image \
                 and score 0-10 confidence that they show the same person."
            .to_string(),
        input: String::new(),
        attachments: vec![content.to_vec(), capture.0.clone()],
    }
}

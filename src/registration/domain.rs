use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for crew registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(pub String);

/// Sea-area risk bands a voyage leg can require and a crew member can
/// declare comfort with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Inland,
    Coastal,
    Offshore,
    Ocean,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Inland => "inland",
            RiskLevel::Coastal => "coastal",
            RiskLevel::Offshore => "offshore",
            RiskLevel::Ocean => "ocean",
        }
    }
}

/// Ordinal experience ladder, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Deckhand,
    Competent,
    Skipper,
    Master,
}

impl ExperienceLevel {
    pub const fn ordinal(self) -> u8 {
        match self {
            ExperienceLevel::Deckhand => 1,
            ExperienceLevel::Competent => 2,
            ExperienceLevel::Skipper => 3,
            ExperienceLevel::Master => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ExperienceLevel::Deckhand => "deckhand",
            ExperienceLevel::Competent => "competent crew",
            ExperienceLevel::Skipper => "skipper",
            ExperienceLevel::Master => "master",
        }
    }
}

/// Closed set of requirement kinds a voyage owner can configure. New kinds
/// are a compile-time decision; the pipeline matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequirementKind {
    RiskLevel(RiskLevel),
    ExperienceLevel(ExperienceLevel),
    Skill {
        area: String,
        weight: u8,
        criteria: String,
    },
    Passport {
        requires_photo_validation: bool,
        pass_confidence: f32,
    },
    Question {
        prompt: String,
        criteria: String,
    },
}

/// One configured requirement on a voyage leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoyageRequirement {
    pub requirement_id: String,
    pub kind: RequirementKind,
}

/// The full requirement set read for one leg, plus the aggregate passing
/// bar applied to the combined weighted skill score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegRequirements {
    pub leg_id: String,
    pub owner_id: String,
    pub passing_score: f32,
    pub requirements: Vec<VoyageRequirement>,
}

impl LegRequirements {
    pub fn required_risk(&self) -> Option<RiskLevel> {
        self.requirements.iter().find_map(|req| match req.kind {
            RequirementKind::RiskLevel(level) => Some(level),
            _ => None,
        })
    }

    pub fn required_experience(&self) -> Option<ExperienceLevel> {
        self.requirements.iter().find_map(|req| match req.kind {
            RequirementKind::ExperienceLevel(level) => Some(level),
            _ => None,
        })
    }

    pub fn passport(&self) -> Option<PassportPolicy> {
        self.requirements.iter().find_map(|req| match req.kind {
            RequirementKind::Passport {
                requires_photo_validation,
                pass_confidence,
            } => Some(PassportPolicy {
                requirement_id: req.requirement_id.clone(),
                requires_photo_validation,
                pass_confidence,
            }),
            _ => None,
        })
    }

    pub fn has_scored_requirements(&self) -> bool {
        self.requirements.iter().any(|req| {
            matches!(
                req.kind,
                RequirementKind::Skill { .. } | RequirementKind::Question { .. }
            )
        })
    }
}

/// Passport check parameters extracted from a configured passport
/// requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct PassportPolicy {
    pub requirement_id: String,
    pub requires_photo_validation: bool,
    pub pass_confidence: f32,
}

/// Date window a crew member has declared themselves available for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub from: NaiveDate,
    pub until: NaiveDate,
}

/// Explicit profile snapshot handed to each pipeline invocation. The
/// pipeline is a pure function of its inputs and reads no ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewProfileSnapshot {
    pub crew_id: String,
    pub display_name: String,
    pub risk_comfort: BTreeSet<RiskLevel>,
    pub experience: ExperienceLevel,
    /// Free-text self-descriptions keyed by skill area, verbatim as the
    /// crew member wrote them.
    pub skill_statements: BTreeMap<String, String>,
    pub availability: Option<AvailabilityWindow>,
    pub cruising_regions: BTreeSet<String>,
    pub ai_processing_consent: bool,
}

/// One answer per value-bearing requirement per registration. The value is
/// always the literal user-supplied text; only the assessment pipeline
/// writes the score and reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationAnswer {
    pub requirement_id: String,
    pub value: String,
    pub score: Option<f32>,
    pub reasoning: Option<String>,
}

impl RegistrationAnswer {
    pub fn unscored(requirement_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            requirement_id: requirement_id.into(),
            value: value.into(),
            score: None,
            reasoning: None,
        }
    }
}

/// Registration lifecycle. Transitions only move forward; the assessment
/// pipeline may only move PendingApproval to Approved. NotApproved is
/// reserved for an explicit human action outside this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    PendingApproval,
    Approved,
    NotApproved,
    Cancelled,
}

impl RegistrationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStatus::PendingApproval => "pending_approval",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::NotApproved => "not_approved",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            RegistrationStatus::NotApproved | RegistrationStatus::Cancelled
        )
    }
}

/// Aggregate root for one candidate/leg pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub registration_id: RegistrationId,
    pub leg_id: String,
    pub crew_id: String,
    pub status: RegistrationStatus,
    pub auto_approved: bool,
    pub aggregate_score: Option<f32>,
    pub reasoning: String,
    pub answers: Vec<RegistrationAnswer>,
    pub created_at: DateTime<Utc>,
    pub assessed_at: Option<DateTime<Utc>>,
    /// Counts pipeline runs so a re-assessment after a requirement change
    /// is a tracked new run rather than a silent overwrite.
    pub assessment_runs: u32,
}

/// Freshly captured facial image accompanying a submission when the leg
/// requires photo validation. Used only in flight and never persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacialCapture(pub Vec<u8>);

impl fmt::Debug for FacialCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FacialCapture({} bytes)", self.0.len())
    }
}

/// Answer as submitted by the crew member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub requirement_id: String,
    pub value: String,
}

/// Inbound registration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationSubmission {
    pub leg_id: String,
    pub crew_id: String,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub passport_document_id: Option<String>,
    #[serde(default)]
    pub facial_capture: Option<FacialCapture>,
}

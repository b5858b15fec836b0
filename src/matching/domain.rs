use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::registration::{ExperienceLevel, RiskLevel};

/// Response state of one side of a proposed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPartyStatus {
    Pending,
    Accepted,
    Skipped,
    Declined,
}

impl MatchPartyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MatchPartyStatus::Pending => "pending",
            MatchPartyStatus::Accepted => "accepted",
            MatchPartyStatus::Skipped => "skipped",
            MatchPartyStatus::Declined => "declined",
        }
    }
}

/// Which side of the pairing is responding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchParty {
    Crew,
    Owner,
}

/// A proposed crew/leg pairing produced by one batch run. The
/// `(crew_id, leg_id)` pair is unique across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewLegMatch {
    pub crew_id: String,
    pub leg_id: String,
    pub match_score: u8,
    pub crew_status: MatchPartyStatus,
    pub owner_status: MatchPartyStatus,
    pub expires_at: DateTime<Utc>,
    pub batch_id: String,
}

impl CrewLegMatch {
    pub fn mutually_accepted(&self) -> bool {
        self.crew_status == MatchPartyStatus::Accepted
            && self.owner_status == MatchPartyStatus::Accepted
    }

    pub fn declined_by_either(&self) -> bool {
        self.crew_status == MatchPartyStatus::Declined
            || self.owner_status == MatchPartyStatus::Declined
    }
}

/// Published leg with open crew capacity, as the matching job reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegListing {
    pub leg_id: String,
    pub owner_id: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub region: String,
    pub open_berths: u8,
    pub required_risk: RiskLevel,
    pub min_experience: ExperienceLevel,
    pub desired_skills: BTreeSet<String>,
}

/// Summary of one batch run, for the scheduler and for metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchBatchSummary {
    pub batch_id: String,
    pub as_of: DateTime<Utc>,
    pub legs_scanned: usize,
    pub candidates_ranked: usize,
    pub ai_calls_used: u32,
    pub matches_written: usize,
}

use chrono::{DateTime, Utc};

use crate::registration::{CrewProfileSnapshot, DirectoryError};

use super::domain::{CrewLegMatch, LegListing, MatchParty, MatchPartyStatus};

/// Storage abstraction for proposed matches. Uniqueness of the
/// `(crew_id, leg_id)` pair is the repository's invariant and is what
/// makes the batch job idempotent.
pub trait MatchRepository: Send + Sync {
    /// Insert a proposed match. Returns `false` (without overwriting) when
    /// the pair already exists.
    fn propose(&self, candidate: CrewLegMatch) -> Result<bool, MatchRepositoryError>;
    fn fetch(&self, crew_id: &str, leg_id: &str)
        -> Result<Option<CrewLegMatch>, MatchRepositoryError>;
    /// Record one party's response and return the updated row.
    fn record_response(
        &self,
        crew_id: &str,
        leg_id: &str,
        party: MatchParty,
        response: MatchPartyStatus,
    ) -> Result<CrewLegMatch, MatchRepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MatchRepositoryError {
    #[error("match not found")]
    NotFound,
    #[error("match repository unavailable: {0}")]
    Unavailable(String),
}

/// Read model over published legs with open crew capacity.
pub trait LegDirectory: Send + Sync {
    fn open_legs(&self, as_of: DateTime<Utc>) -> Result<Vec<LegListing>, DirectoryError>;
}

/// Read model over crew profiles eligible for proactive matching.
pub trait CandidateDirectory: Send + Sync {
    fn candidates(&self) -> Result<Vec<CrewProfileSnapshot>, DirectoryError>;
}

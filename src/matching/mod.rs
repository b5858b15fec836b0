//! Proactive matching: a scheduled batch job that pairs crew with open
//! voyage legs, and the response flow that turns a mutual accept into a
//! registration.

pub mod domain;
pub mod job;
pub mod repository;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{CrewLegMatch, LegListing, MatchBatchSummary, MatchParty, MatchPartyStatus};
pub use job::{CompositeWeights, MatchingError, MatchingPolicy, ProactiveMatchingJob};
pub use repository::{CandidateDirectory, LegDirectory, MatchRepository, MatchRepositoryError};
pub use service::{MatchResponseError, MatchResponseOutcome, MatchResponseService};

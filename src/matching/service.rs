use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::registration::{
    NotificationDispatcher, Registration, RegistrationRepository, RegistrationService,
    RegistrationServiceError,
};

use super::domain::{CrewLegMatch, MatchParty, MatchPartyStatus};
use super::repository::{MatchRepository, MatchRepositoryError};

/// Outcome of recording one party's response to a proposed match.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResponseOutcome {
    /// Response stored; the other side has not accepted (yet).
    Recorded(CrewLegMatch),
    /// Both sides have accepted; the registration for the pair (created
    /// now, or earlier by a previous accept) is returned.
    RegistrationOpened(CrewLegMatch, Registration),
}

#[derive(Debug, thiserror::Error)]
pub enum MatchResponseError {
    #[error(transparent)]
    Repository(#[from] MatchRepositoryError),
    #[error(transparent)]
    Registration(#[from] RegistrationServiceError),
    #[error("match proposal has expired")]
    Expired,
}

/// Handles crew/owner responses to proposed matches. A mutual accept is
/// the only trigger that opens a registration automatically, and it opens
/// exactly one per pair no matter how often accept is repeated.
pub struct MatchResponseService<M, R, N> {
    matches: Arc<M>,
    registrations: Arc<RegistrationService<R, N>>,
}

impl<M, R, N> MatchResponseService<M, R, N>
where
    M: MatchRepository + 'static,
    R: RegistrationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(matches: Arc<M>, registrations: Arc<RegistrationService<R, N>>) -> Self {
        Self {
            matches,
            registrations,
        }
    }

    pub fn respond(
        &self,
        crew_id: &str,
        leg_id: &str,
        party: MatchParty,
        response: MatchPartyStatus,
        now: DateTime<Utc>,
    ) -> Result<MatchResponseOutcome, MatchResponseError> {
        let existing = self
            .matches
            .fetch(crew_id, leg_id)?
            .ok_or(MatchRepositoryError::NotFound)?;
        if existing.expires_at <= now {
            return Err(MatchResponseError::Expired);
        }

        let updated = self
            .matches
            .record_response(crew_id, leg_id, party, response)?;

        if updated.mutually_accepted() {
            let registration = self.registrations.open_from_match(crew_id, leg_id)?;
            info!(
                crew = crew_id,
                leg = leg_id,
                registration = registration.registration_id.0,
                "mutual match acceptance opened registration"
            );
            return Ok(MatchResponseOutcome::RegistrationOpened(
                updated,
                registration,
            ));
        }
        Ok(MatchResponseOutcome::Recorded(updated))
    }
}

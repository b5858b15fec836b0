//! In-memory implementations of the storage and collaborator traits.
//!
//! These back the server binary and the integration tests. Every store
//! keeps its state behind a single mutex, which is what makes the grant
//! check-and-increment and the assessment claim linearizable.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ai::{ProviderError, ScoreRequest, ScoreResponse, ScoringProvider};
use crate::matching::{
    CandidateDirectory, CrewLegMatch, LegDirectory, LegListing, MatchParty, MatchPartyStatus,
    MatchRepository, MatchRepositoryError,
};
use crate::registration::{
    transition_allowed, AccessLog, AccessLogEntry, CreateGrant, CrewProfileSnapshot,
    DirectoryError, DocumentAccessGrant, DocumentStore, DocumentStoreError, GrantError, GrantId,
    GrantPurpose, GrantStore, LegRequirements, Notification, NotificationDispatcher,
    NotificationError, ProfileDirectory, Registration, RegistrationId, RegistrationRepository,
    RegistrationStatus, RepositoryError, RequirementStore,
};

#[derive(Default)]
struct RegistrationState {
    records: HashMap<RegistrationId, Registration>,
    in_flight: HashSet<RegistrationId>,
}

/// Registration storage with the single-writer claim implemented under
/// one lock.
#[derive(Default)]
pub struct MemoryRegistrationRepository {
    state: Mutex<RegistrationState>,
}

impl RegistrationRepository for MemoryRegistrationRepository {
    fn insert(&self, registration: Registration) -> Result<Registration, RepositoryError> {
        let mut state = self.state.lock().expect("registration mutex poisoned");
        let duplicate = state.records.values().any(|existing| {
            existing.leg_id == registration.leg_id && existing.crew_id == registration.crew_id
        });
        if duplicate || state.records.contains_key(&registration.registration_id) {
            return Err(RepositoryError::Conflict);
        }
        state
            .records
            .insert(registration.registration_id.clone(), registration.clone());
        Ok(registration)
    }

    fn claim_for_assessment(&self, id: &RegistrationId) -> Result<Registration, RepositoryError> {
        let mut state = self.state.lock().expect("registration mutex poisoned");
        let registration = state.records.get(id).ok_or(RepositoryError::NotFound)?;
        if registration.assessed_at.is_some()
            || registration.status != RegistrationStatus::PendingApproval
        {
            return Err(RepositoryError::AlreadyAssessed);
        }
        let registration = registration.clone();
        if !state.in_flight.insert(id.clone()) {
            return Err(RepositoryError::AssessmentInFlight);
        }
        Ok(registration)
    }

    fn complete_assessment(&self, registration: Registration) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("registration mutex poisoned");
        let id = registration.registration_id.clone();
        let previous = state.records.get(&id).map(|existing| existing.status);
        if let Some(from) = previous {
            if from != registration.status && !transition_allowed(from, registration.status) {
                state.in_flight.remove(&id);
                return Err(RepositoryError::InvalidTransition {
                    from: from.label(),
                    to: registration.status.label(),
                });
            }
        }
        state.records.insert(id.clone(), registration);
        state.in_flight.remove(&id);
        Ok(())
    }

    fn fetch(&self, id: &RegistrationId) -> Result<Option<Registration>, RepositoryError> {
        let state = self.state.lock().expect("registration mutex poisoned");
        Ok(state.records.get(id).cloned())
    }

    fn find_pair(
        &self,
        leg_id: &str,
        crew_id: &str,
    ) -> Result<Option<Registration>, RepositoryError> {
        let state = self.state.lock().expect("registration mutex poisoned");
        Ok(state
            .records
            .values()
            .find(|registration| registration.leg_id == leg_id && registration.crew_id == crew_id)
            .cloned())
    }

    fn pending(&self, limit: usize) -> Result<Vec<Registration>, RepositoryError> {
        let state = self.state.lock().expect("registration mutex poisoned");
        let mut pending: Vec<Registration> = state
            .records
            .values()
            .filter(|registration| {
                registration.status == RegistrationStatus::PendingApproval
                    && registration.assessed_at.is_some()
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.truncate(limit);
        Ok(pending)
    }
}

/// Grant storage. The single mutex makes validate-and-consume one atomic
/// operation per store.
#[derive(Default)]
pub struct MemoryGrantStore {
    grants: Mutex<HashMap<GrantId, DocumentAccessGrant>>,
    sequence: AtomicU64,
}

impl GrantStore for MemoryGrantStore {
    fn create(
        &self,
        command: CreateGrant,
        now: DateTime<Utc>,
    ) -> Result<DocumentAccessGrant, GrantError> {
        command.validate_lifetime(now)?;
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let grant = DocumentAccessGrant {
            grant_id: GrantId(format!("grant-{id:06}")),
            document_id: command.document_id,
            owner_id: command.owner_id,
            grantee_id: command.grantee_id,
            purpose: command.purpose,
            created_at: now,
            expires_at: command.expires_at,
            max_views: command.max_views,
            view_count: 0,
            is_revoked: false,
        };
        let mut grants = self.grants.lock().expect("grant mutex poisoned");
        grants.insert(grant.grant_id.clone(), grant.clone());
        Ok(grant)
    }

    fn revoke(&self, grant_id: &GrantId, caller_id: &str) -> Result<(), GrantError> {
        let mut grants = self.grants.lock().expect("grant mutex poisoned");
        let grant = grants.get_mut(grant_id).ok_or(GrantError::NotFound)?;
        if grant.owner_id != caller_id {
            return Err(GrantError::NotOwner);
        }
        grant.is_revoked = true;
        Ok(())
    }

    fn validate_and_consume(
        &self,
        document_id: &str,
        grantee_id: &str,
        purpose: GrantPurpose,
        now: DateTime<Utc>,
    ) -> Result<DocumentAccessGrant, GrantError> {
        let mut grants = self.grants.lock().expect("grant mutex poisoned");
        let mut last_error = GrantError::Missing;
        let mut usable_id = None;
        for grant in grants.values() {
            if grant.document_id != document_id || grant.grantee_id != grantee_id {
                continue;
            }
            match grant.usable_for(purpose, now) {
                Ok(()) => {
                    usable_id = Some(grant.grant_id.clone());
                    break;
                }
                Err(err) => last_error = err,
            }
        }
        let Some(grant_id) = usable_id else {
            return Err(last_error);
        };
        let grant = grants
            .get_mut(&grant_id)
            .ok_or(GrantError::Unavailable("grant vanished".to_string()))?;
        grant.view_count += 1;
        Ok(grant.clone())
    }
}

/// Append-only access log. The public surface offers insertion and a read
/// snapshot; nothing can rewrite history.
#[derive(Default)]
pub struct MemoryAccessLog {
    entries: Mutex<Vec<AccessLogEntry>>,
}

impl MemoryAccessLog {
    pub fn entries(&self) -> Vec<AccessLogEntry> {
        self.entries.lock().expect("access log mutex poisoned").clone()
    }
}

impl AccessLog for MemoryAccessLog {
    fn record(&self, entry: AccessLogEntry) {
        self.entries
            .lock()
            .expect("access log mutex poisoned")
            .push(entry);
    }
}

/// Document bytes keyed by id, with their owner.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryDocumentStore {
    pub fn put(&self, document_id: impl Into<String>, owner_id: impl Into<String>, content: Vec<u8>) {
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .insert(document_id.into(), (owner_id.into(), content));
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn owner_of(&self, document_id: &str) -> Result<Option<String>, DocumentStoreError> {
        let documents = self.documents.lock().expect("document mutex poisoned");
        Ok(documents.get(document_id).map(|(owner, _)| owner.clone()))
    }

    fn fetch(
        &self,
        document_id: &str,
        _grant: &DocumentAccessGrant,
    ) -> Result<Vec<u8>, DocumentStoreError> {
        let documents = self.documents.lock().expect("document mutex poisoned");
        documents
            .get(document_id)
            .map(|(_, content)| content.clone())
            .ok_or(DocumentStoreError::NotFound)
    }
}

/// Captures dispatched notifications for assertions and demos.
#[derive(Default)]
pub struct MemoryNotificationDispatcher {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotificationDispatcher {
    pub fn sent(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationDispatcher for MemoryNotificationDispatcher {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Requirement read model keyed by leg.
#[derive(Default)]
pub struct MemoryRequirementStore {
    legs: Mutex<HashMap<String, LegRequirements>>,
}

impl MemoryRequirementStore {
    pub fn put(&self, requirements: LegRequirements) {
        self.legs
            .lock()
            .expect("requirement mutex poisoned")
            .insert(requirements.leg_id.clone(), requirements);
    }

    pub fn remove(&self, leg_id: &str) {
        self.legs
            .lock()
            .expect("requirement mutex poisoned")
            .remove(leg_id);
    }
}

impl RequirementStore for MemoryRequirementStore {
    fn requirements_for(&self, leg_id: &str) -> Result<LegRequirements, DirectoryError> {
        let legs = self.legs.lock().expect("requirement mutex poisoned");
        legs.get(leg_id).cloned().ok_or(DirectoryError::UnknownLeg)
    }
}

/// Profile read model; also serves as the matching candidate directory.
#[derive(Default)]
pub struct MemoryProfileDirectory {
    profiles: Mutex<HashMap<String, CrewProfileSnapshot>>,
}

impl MemoryProfileDirectory {
    pub fn put(&self, profile: CrewProfileSnapshot) {
        self.profiles
            .lock()
            .expect("profile mutex poisoned")
            .insert(profile.crew_id.clone(), profile);
    }
}

impl ProfileDirectory for MemoryProfileDirectory {
    fn snapshot(&self, crew_id: &str) -> Result<CrewProfileSnapshot, DirectoryError> {
        let profiles = self.profiles.lock().expect("profile mutex poisoned");
        profiles
            .get(crew_id)
            .cloned()
            .ok_or(DirectoryError::UnknownCrew)
    }
}

impl CandidateDirectory for MemoryProfileDirectory {
    fn candidates(&self) -> Result<Vec<CrewProfileSnapshot>, DirectoryError> {
        let profiles = self.profiles.lock().expect("profile mutex poisoned");
        let mut all: Vec<CrewProfileSnapshot> = profiles.values().cloned().collect();
        all.sort_by(|a, b| a.crew_id.cmp(&b.crew_id));
        Ok(all)
    }
}

/// Published-leg read model for the matching job.
#[derive(Default)]
pub struct MemoryLegDirectory {
    legs: Mutex<Vec<LegListing>>,
}

impl MemoryLegDirectory {
    pub fn put(&self, leg: LegListing) {
        self.legs.lock().expect("leg mutex poisoned").push(leg);
    }
}

impl LegDirectory for MemoryLegDirectory {
    fn open_legs(&self, _as_of: DateTime<Utc>) -> Result<Vec<LegListing>, DirectoryError> {
        let legs = self.legs.lock().expect("leg mutex poisoned");
        Ok(legs
            .iter()
            .filter(|leg| leg.open_berths > 0)
            .cloned()
            .collect())
    }
}

/// Match rows keyed by the unique `(crew_id, leg_id)` pair.
#[derive(Default)]
pub struct MemoryMatchRepository {
    rows: Mutex<HashMap<(String, String), CrewLegMatch>>,
}

impl MemoryMatchRepository {
    pub fn all(&self) -> Vec<CrewLegMatch> {
        let rows = self.rows.lock().expect("match mutex poisoned");
        rows.values().cloned().collect()
    }
}

impl MatchRepository for MemoryMatchRepository {
    fn propose(&self, candidate: CrewLegMatch) -> Result<bool, MatchRepositoryError> {
        let mut rows = self.rows.lock().expect("match mutex poisoned");
        let key = (candidate.crew_id.clone(), candidate.leg_id.clone());
        if rows.contains_key(&key) {
            return Ok(false);
        }
        rows.insert(key, candidate);
        Ok(true)
    }

    fn fetch(
        &self,
        crew_id: &str,
        leg_id: &str,
    ) -> Result<Option<CrewLegMatch>, MatchRepositoryError> {
        let rows = self.rows.lock().expect("match mutex poisoned");
        Ok(rows
            .get(&(crew_id.to_string(), leg_id.to_string()))
            .cloned())
    }

    fn record_response(
        &self,
        crew_id: &str,
        leg_id: &str,
        party: MatchParty,
        response: MatchPartyStatus,
    ) -> Result<CrewLegMatch, MatchRepositoryError> {
        let mut rows = self.rows.lock().expect("match mutex poisoned");
        let row = rows
            .get_mut(&(crew_id.to_string(), leg_id.to_string()))
            .ok_or(MatchRepositoryError::NotFound)?;
        match party {
            MatchParty::Crew => row.crew_status = response,
            MatchParty::Owner => row.owner_status = response,
        }
        Ok(row.clone())
    }
}

/// Provider returning a fixed response, for demos and tests.
pub struct StaticScoreProvider {
    name: String,
    score: f32,
    rationale: String,
}

impl StaticScoreProvider {
    pub fn new(name: impl Into<String>, score: f32, rationale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score,
            rationale: rationale.into(),
        }
    }
}

impl ScoringProvider for StaticScoreProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(
        &self,
        _request: &ScoreRequest,
        _timeout: Duration,
    ) -> Result<ScoreResponse, ProviderError> {
        Ok(ScoreResponse {
            score: self.score,
            rationale: self.rationale.clone(),
        })
    }
}

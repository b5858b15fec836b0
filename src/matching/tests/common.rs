use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::ai::{
    AiCallBudget, AiScoringClient, ProviderError, ProviderPolicy, ScoreRequest, ScoreResponse,
    ScoringProvider,
};
use crate::infra::{
    MemoryAccessLog, MemoryDocumentStore, MemoryGrantStore, MemoryLegDirectory,
    MemoryMatchRepository, MemoryNotificationDispatcher, MemoryProfileDirectory,
    MemoryRegistrationRepository, MemoryRequirementStore,
};
use crate::matching::{LegListing, MatchingPolicy, ProactiveMatchingJob};
use crate::registration::{
    AvailabilityWindow, CrewProfileSnapshot, ExperienceLevel, LegRequirements, RegistrationService,
    RiskLevel,
};

pub(super) const LEG: &str = "leg-aegean-01";
pub(super) const OWNER: &str = "owner-1";

/// Fixed-score provider with a call counter.
pub(super) struct CountingProvider {
    scores: HashMap<String, f32>,
    default_score: f32,
    calls: AtomicU32,
}

impl CountingProvider {
    pub(super) fn new(default_score: f32) -> Self {
        Self {
            scores: HashMap::new(),
            default_score,
            calls: AtomicU32::new(0),
        }
    }

    pub(super) fn with_score(mut self, subject_prefix: &str, score: f32) -> Self {
        self.scores.insert(subject_prefix.to_string(), score);
        self
    }

    pub(super) fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ScoringProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    fn score(
        &self,
        request: &ScoreRequest,
        _timeout: Duration,
    ) -> Result<ScoreResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let score = self
            .scores
            .iter()
            .find(|(prefix, _)| request.subject.starts_with(prefix.as_str()))
            .map(|(_, score)| *score)
            .unwrap_or(self.default_score);
        Ok(ScoreResponse {
            score,
            rationale: format!("scored {}", request.subject),
        })
    }
}

pub(super) fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).single().expect("valid timestamp")
}

pub(super) fn leg() -> LegListing {
    LegListing {
        leg_id: LEG.to_string(),
        owner_id: OWNER.to_string(),
        starts_on: NaiveDate::from_ymd_opt(2026, 7, 4).expect("valid date"),
        ends_on: NaiveDate::from_ymd_opt(2026, 7, 18).expect("valid date"),
        region: "aegean".to_string(),
        open_berths: 2,
        required_risk: RiskLevel::Coastal,
        min_experience: ExperienceLevel::Competent,
        desired_skills: BTreeSet::from(["sail trim".to_string()]),
    }
}

pub(super) fn crew(crew_id: &str) -> CrewProfileSnapshot {
    let mut skills = BTreeMap::new();
    skills.insert(
        "sail trim".to_string(),
        "Five seasons as trimmer on coastal deliveries".to_string(),
    );
    CrewProfileSnapshot {
        crew_id: crew_id.to_string(),
        display_name: crew_id.to_string(),
        risk_comfort: BTreeSet::from([RiskLevel::Inland, RiskLevel::Coastal, RiskLevel::Offshore]),
        experience: ExperienceLevel::Skipper,
        skill_statements: skills,
        availability: Some(AvailabilityWindow {
            from: NaiveDate::from_ymd_opt(2026, 6, 1).expect("valid date"),
            until: NaiveDate::from_ymd_opt(2026, 9, 30).expect("valid date"),
        }),
        cruising_regions: BTreeSet::from(["aegean".to_string()]),
        ai_processing_consent: true,
    }
}

pub(super) struct Harness {
    pub(super) job:
        ProactiveMatchingJob<MemoryMatchRepository, MemoryRegistrationRepository>,
    pub(super) legs: Arc<MemoryLegDirectory>,
    pub(super) profiles: Arc<MemoryProfileDirectory>,
    pub(super) matches: Arc<MemoryMatchRepository>,
    pub(super) registrations: Arc<MemoryRegistrationRepository>,
    pub(super) registration_service:
        Arc<RegistrationService<MemoryRegistrationRepository, MemoryNotificationDispatcher>>,
    pub(super) provider: Arc<CountingProvider>,
}

pub(super) fn harness(provider: CountingProvider, budget_cap: u32) -> Harness {
    let legs = Arc::new(MemoryLegDirectory::default());
    let profiles = Arc::new(MemoryProfileDirectory::default());
    let matches = Arc::new(MemoryMatchRepository::default());
    let registrations = Arc::new(MemoryRegistrationRepository::default());
    let requirements = Arc::new(MemoryRequirementStore::default());
    let provider = Arc::new(provider);

    let ai = Arc::new(AiScoringClient::new(
        vec![provider.clone() as Arc<dyn ScoringProvider>],
        ProviderPolicy {
            timeout: Duration::from_secs(1),
            attempts_per_provider: 1,
        },
        Arc::new(AiCallBudget::new(budget_cap)),
    ));

    // A minimal requirement set so registrations opened from mutual accepts
    // resolve against a real leg.
    requirements.put(LegRequirements {
        leg_id: LEG.to_string(),
        owner_id: OWNER.to_string(),
        passing_score: 6.0,
        requirements: Vec::new(),
    });

    let registration_service = Arc::new(RegistrationService::new(
        registrations.clone(),
        Arc::new(MemoryNotificationDispatcher::default()),
        requirements.clone(),
        profiles.clone(),
        Arc::new(MemoryGrantStore::default()),
        Arc::new(MemoryAccessLog::default()),
        Arc::new(MemoryDocumentStore::default()),
        ai.clone(),
    ));

    let job = ProactiveMatchingJob::new(
        legs.clone(),
        profiles.clone(),
        matches.clone(),
        registrations.clone(),
        ai,
        MatchingPolicy::default(),
    );

    Harness {
        job,
        legs,
        profiles,
        matches,
        registrations,
        registration_service,
        provider,
    }
}

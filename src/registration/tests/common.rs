use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as TimeDelta, NaiveDate, Utc};

use crate::ai::{
    AiCallBudget, AiScoringClient, ProviderError, ProviderPolicy, ScoreRequest, ScoreResponse,
    ScoringProvider,
};
use crate::infra::{
    MemoryAccessLog, MemoryDocumentStore, MemoryGrantStore, MemoryNotificationDispatcher,
    MemoryProfileDirectory, MemoryRegistrationRepository, MemoryRequirementStore,
};
use crate::registration::{
    AvailabilityWindow, CreateGrant, CrewProfileSnapshot, DocumentAccessGrant, ExperienceLevel,
    GrantPurpose, GrantStore, LegRequirements, RegistrationService, RegistrationSubmission,
    RequirementKind, RiskLevel, SubmittedAnswer, VoyageRequirement,
};

pub(super) const LEG: &str = "leg-01";
pub(super) const OWNER: &str = "owner-1";
pub(super) const CREW: &str = "crew-ada";
pub(super) const PASSPORT_DOC: &str = "doc-ada-passport";

/// Provider answering from a subject-prefix table, with a call counter so
/// tests can assert which stages reached the AI at all.
pub(super) struct MappedProvider {
    scores: HashMap<String, f32>,
    default_score: f32,
    calls: AtomicU32,
}

impl MappedProvider {
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

impl ScoringProvider for MappedProvider {
    fn name(&self) -> &str {
        "mapped"
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

/// Provider that always fails at the transport level.
pub(super) struct FailingProvider;

impl ScoringProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn score(
        &self,
        _request: &ScoreRequest,
        _timeout: Duration,
    ) -> Result<ScoreResponse, ProviderError> {
        Err(ProviderError::Transport("connection refused".to_string()))
    }
}

pub(super) fn client_with(provider: Arc<dyn ScoringProvider>, budget_cap: u32) -> Arc<AiScoringClient> {
    Arc::new(AiScoringClient::new(
        vec![provider],
        ProviderPolicy {
            timeout: Duration::from_secs(1),
            attempts_per_provider: 1,
        },
        Arc::new(AiCallBudget::new(budget_cap)),
    ))
}

pub(super) fn leg_requirements() -> LegRequirements {
    LegRequirements {
        leg_id: LEG.to_string(),
        owner_id: OWNER.to_string(),
        passing_score: 6.0,
        requirements: vec![
            VoyageRequirement {
                requirement_id: "req-risk".to_string(),
                kind: RequirementKind::RiskLevel(RiskLevel::Coastal),
            },
            VoyageRequirement {
                requirement_id: "req-exp".to_string(),
                kind: RequirementKind::ExperienceLevel(ExperienceLevel::Competent),
            },
            VoyageRequirement {
                requirement_id: "req-sail".to_string(),
                kind: RequirementKind::Skill {
                    area: "sail trim".to_string(),
                    weight: 10,
                    criteria: "Can trim sails shorthanded in a stiff breeze".to_string(),
                },
            },
            VoyageRequirement {
                requirement_id: "req-nav".to_string(),
                kind: RequirementKind::Skill {
                    area: "navigation".to_string(),
                    weight: 5,
                    criteria: "Can plan and hold a coastal passage".to_string(),
                },
            },
            VoyageRequirement {
                requirement_id: "req-why".to_string(),
                kind: RequirementKind::Question {
                    prompt: "Why this leg?".to_string(),
                    criteria: "Shows realistic expectations".to_string(),
                },
            },
            VoyageRequirement {
                requirement_id: "req-pass".to_string(),
                kind: RequirementKind::Passport {
                    requires_photo_validation: false,
                    pass_confidence: 7.0,
                },
            },
        ],
    }
}

pub(super) fn profile() -> CrewProfileSnapshot {
    let mut skills = BTreeMap::new();
    skills.insert(
        "sail trim".to_string(),
        "Five seasons as trimmer on coastal deliveries".to_string(),
    );
    skills.insert(
        "navigation".to_string(),
        "Plotted and sailed a dozen coastal passages".to_string(),
    );
    CrewProfileSnapshot {
        crew_id: CREW.to_string(),
        display_name: "Ada".to_string(),
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

pub(super) fn submission() -> RegistrationSubmission {
    RegistrationSubmission {
        leg_id: LEG.to_string(),
        crew_id: CREW.to_string(),
        answers: vec![SubmittedAnswer {
            requirement_id: "req-why".to_string(),
            value: "I want coastal miles toward my ticket and can commit the full window"
                .to_string(),
        }],
        passport_document_id: Some(PASSPORT_DOC.to_string()),
        facial_capture: None,
    }
}

pub(super) struct Harness {
    pub(super) service:
        Arc<RegistrationService<MemoryRegistrationRepository, MemoryNotificationDispatcher>>,
    pub(super) repository: Arc<MemoryRegistrationRepository>,
    pub(super) notifications: Arc<MemoryNotificationDispatcher>,
    pub(super) grants: Arc<MemoryGrantStore>,
    pub(super) access_log: Arc<MemoryAccessLog>,
    pub(super) documents: Arc<MemoryDocumentStore>,
    pub(super) requirements: Arc<MemoryRequirementStore>,
    pub(super) profiles: Arc<MemoryProfileDirectory>,
    pub(super) provider: Arc<MappedProvider>,
    pub(super) ai: Arc<AiScoringClient>,
}

pub(super) fn harness() -> Harness {
    harness_with_provider(Arc::new(MappedProvider::new(8.0)), 100)
}

pub(super) fn harness_with_provider(provider: Arc<MappedProvider>, budget_cap: u32) -> Harness {
    let repository = Arc::new(MemoryRegistrationRepository::default());
    let notifications = Arc::new(MemoryNotificationDispatcher::default());
    let grants = Arc::new(MemoryGrantStore::default());
    let access_log = Arc::new(MemoryAccessLog::default());
    let documents = Arc::new(MemoryDocumentStore::default());
    let requirements = Arc::new(MemoryRequirementStore::default());
    let profiles = Arc::new(MemoryProfileDirectory::default());

    requirements.put(leg_requirements());
    profiles.put(profile());
    documents.put(PASSPORT_DOC, CREW, b"passport scan bytes".to_vec());

    let ai = Arc::new(AiScoringClient::new(
        vec![provider.clone() as Arc<dyn ScoringProvider>],
        ProviderPolicy {
            timeout: Duration::from_secs(1),
            attempts_per_provider: 1,
        },
        Arc::new(AiCallBudget::new(budget_cap)),
    ));

    let service = Arc::new(RegistrationService::new(
        repository.clone(),
        notifications.clone(),
        requirements.clone(),
        profiles.clone(),
        grants.clone(),
        access_log.clone(),
        documents.clone(),
        ai.clone(),
    ));

    Harness {
        service,
        repository,
        notifications,
        grants,
        access_log,
        documents,
        requirements,
        profiles,
        provider,
        ai,
    }
}

/// Create a usable identity-verification grant for the standard passport
/// document, expiring the given number of seconds from now.
pub(super) fn identity_grant(grants: &MemoryGrantStore, expires_in_secs: i64) -> DocumentAccessGrant {
    let now = Utc::now();
    grants
        .create(
            CreateGrant {
                document_id: PASSPORT_DOC.to_string(),
                owner_id: CREW.to_string(),
                grantee_id: CREW.to_string(),
                purpose: GrantPurpose::IdentityVerification,
                expires_at: now + TimeDelta::seconds(expires_in_secs),
                max_views: Some(10),
            },
            now,
        )
        .expect("grant creation succeeds")
}

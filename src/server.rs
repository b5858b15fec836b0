use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::{NaiveDate, Utc};
use tracing::info;

use crew_match::ai::{AiCallBudget, AiScoringClient, ProviderPolicy, ScoringProvider};
use crew_match::config::AppConfig;
use crew_match::error::AppError;
use crew_match::infra::{
    MemoryAccessLog, MemoryDocumentStore, MemoryGrantStore, MemoryLegDirectory,
    MemoryMatchRepository, MemoryNotificationDispatcher, MemoryProfileDirectory,
    MemoryRegistrationRepository, MemoryRequirementStore, StaticScoreProvider,
};
use crew_match::matching::{LegListing, MatchingPolicy, ProactiveMatchingJob};
use crew_match::registration::{
    registration_router, AvailabilityWindow, CrewProfileSnapshot, ExperienceLevel, LegRequirements,
    RegistrationService, RequirementKind, RiskLevel, VoyageRequirement,
};
use crew_match::telemetry;

use crate::cli::{MatchBatchArgs, ServeArgs};
use crate::routes::{with_service_routes, AppState, MatchingJob};

type Registrations =
    RegistrationService<MemoryRegistrationRepository, MemoryNotificationDispatcher>;

struct Services {
    registrations: Arc<Registrations>,
    matching: Arc<MatchingJob>,
}

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services = bootstrap(&config);

    let app = with_service_routes(
        registration_router(services.registrations.clone()),
        services.matching.clone(),
    )
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "crew match service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) async fn run_match_batch(mut args: MatchBatchArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(workers) = args.workers.take() {
        config.matching.worker_limit = workers;
    }

    telemetry::init(&config.telemetry)?;

    let as_of = args.as_of.take().unwrap_or_else(Utc::now);
    let services = bootstrap(&config);
    let summary = services.matching.run(as_of).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.batch_id.clone())
    );
    Ok(())
}

fn bootstrap(config: &AppConfig) -> Services {
    let repository = Arc::new(MemoryRegistrationRepository::default());
    let notifications = Arc::new(MemoryNotificationDispatcher::default());
    let requirements = Arc::new(MemoryRequirementStore::default());
    let profiles = Arc::new(MemoryProfileDirectory::default());
    let grants = Arc::new(MemoryGrantStore::default());
    let access_log = Arc::new(MemoryAccessLog::default());
    let documents = Arc::new(MemoryDocumentStore::default());
    let legs = Arc::new(MemoryLegDirectory::default());
    let matches = Arc::new(MemoryMatchRepository::default());

    seed(&requirements, &profiles, &documents, &legs);

    let budget = Arc::new(AiCallBudget::new(config.scoring.ai_daily_budget));
    let providers: Vec<Arc<dyn ScoringProvider>> = vec![Arc::new(StaticScoreProvider::new(
        "review-model",
        7.5,
        "meets the stated criteria",
    ))];
    let ai = Arc::new(AiScoringClient::new(
        providers,
        ProviderPolicy {
            timeout: config.scoring.provider_timeout,
            ..ProviderPolicy::default()
        },
        budget,
    ));

    let registrations = Arc::new(RegistrationService::new(
        repository.clone(),
        notifications,
        requirements,
        profiles.clone(),
        grants,
        access_log,
        documents,
        ai.clone(),
    ));

    let matching = Arc::new(ProactiveMatchingJob::new(
        legs,
        profiles,
        matches,
        repository,
        ai,
        MatchingPolicy {
            worker_limit: config.matching.worker_limit,
            ..MatchingPolicy::default()
        },
    ));

    Services {
        registrations,
        matching,
    }
}

/// Demo data so a fresh instance answers requests out of the box. A real
/// deployment replaces the in-memory stores with persistent ones.
fn seed(
    requirements: &MemoryRequirementStore,
    profiles: &MemoryProfileDirectory,
    documents: &MemoryDocumentStore,
    legs: &MemoryLegDirectory,
) {
    requirements.put(LegRequirements {
        leg_id: "leg-aegean-01".to_string(),
        owner_id: "owner-001".to_string(),
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
                requirement_id: "req-sailing".to_string(),
                kind: RequirementKind::Skill {
                    area: "sail trim".to_string(),
                    weight: 8,
                    criteria: "Can trim sails shorthanded in 20+ knots".to_string(),
                },
            },
            VoyageRequirement {
                requirement_id: "req-motivation".to_string(),
                kind: RequirementKind::Question {
                    prompt: "Why do you want to join this leg?".to_string(),
                    criteria: "Shows genuine interest and realistic expectations".to_string(),
                },
            },
        ],
    });

    let mut skills = BTreeMap::new();
    skills.insert(
        "sail trim".to_string(),
        "Five seasons racing dinghies and two Aegean deliveries as trimmer".to_string(),
    );
    profiles.put(CrewProfileSnapshot {
        crew_id: "crew-ada".to_string(),
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
    });

    documents.put("doc-ada-passport", "crew-ada", b"demo passport scan".to_vec());

    legs.put(LegListing {
        leg_id: "leg-aegean-01".to_string(),
        owner_id: "owner-001".to_string(),
        starts_on: NaiveDate::from_ymd_opt(2026, 7, 4).expect("valid date"),
        ends_on: NaiveDate::from_ymd_opt(2026, 7, 18).expect("valid date"),
        region: "aegean".to_string(),
        open_berths: 2,
        required_risk: RiskLevel::Coastal,
        min_experience: ExperienceLevel::Competent,
        desired_skills: BTreeSet::from(["sail trim".to_string()]),
    });
}

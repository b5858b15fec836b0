//! Scheduled batch job surfacing crew/leg pairings before either party
//! searches.
//!
//! Per leg: a deterministic pre-filter bounds the candidate set, a
//! weighted composite ranks it, and only the top slice is sent to the AI
//! client for refinement. Legs are processed in bounded parallel chunks,
//! each worker owning one leg's candidate set; the shared daily budget
//! caps total AI spend across the run.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use tracing::{info, warn};

use crate::ai::{AiScoringClient, ScoreRequest, ScoringError};
use crate::registration::{
    gates, CrewProfileSnapshot, RegistrationRepository, RepositoryError,
};
use crate::registration::DirectoryError;

use super::domain::{CrewLegMatch, LegListing, MatchBatchSummary, MatchPartyStatus};
use super::repository::{CandidateDirectory, LegDirectory, MatchRepository, MatchRepositoryError};

/// Weights of the composite ranking signals.
#[derive(Debug, Clone)]
pub struct CompositeWeights {
    pub skills: f32,
    pub experience: f32,
    pub risk: f32,
    pub dates: f32,
    pub location: f32,
}

impl CompositeWeights {
    fn total(&self) -> f32 {
        self.skills + self.experience + self.risk + self.dates + self.location
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            skills: 0.35,
            experience: 0.15,
            risk: 0.15,
            dates: 0.20,
            location: 0.15,
        }
    }
}

/// Caps bounding one batch run.
#[derive(Debug, Clone)]
pub struct MatchingPolicy {
    /// Deterministic pre-filter cap per leg.
    pub prefilter_cap: usize,
    /// How many ranked candidates per leg get AI refinement.
    pub refine_cap: usize,
    /// Minimum blended score a match must reach to be persisted.
    pub persist_floor: u8,
    /// Parallel leg workers.
    pub worker_limit: usize,
    pub weights: CompositeWeights,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            prefilter_cap: 50,
            refine_cap: 20,
            persist_floor: 60,
            worker_limit: 4,
            weights: CompositeWeights::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Matches(#[from] MatchRepositoryError),
    #[error(transparent)]
    Registrations(#[from] RepositoryError),
    #[error("matching worker failed: {0}")]
    Worker(String),
}

struct LegOutcome {
    ranked: usize,
    written: usize,
}

pub struct ProactiveMatchingJob<M, R> {
    legs: Arc<dyn LegDirectory>,
    candidates: Arc<dyn CandidateDirectory>,
    matches: Arc<M>,
    registrations: Arc<R>,
    ai: Arc<AiScoringClient>,
    policy: MatchingPolicy,
}

impl<M, R> Clone for ProactiveMatchingJob<M, R> {
    fn clone(&self) -> Self {
        Self {
            legs: self.legs.clone(),
            candidates: self.candidates.clone(),
            matches: self.matches.clone(),
            registrations: self.registrations.clone(),
            ai: self.ai.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<M, R> ProactiveMatchingJob<M, R>
where
    M: MatchRepository + 'static,
    R: RegistrationRepository + 'static,
{
    pub fn new(
        legs: Arc<dyn LegDirectory>,
        candidates: Arc<dyn CandidateDirectory>,
        matches: Arc<M>,
        registrations: Arc<R>,
        ai: Arc<AiScoringClient>,
        policy: MatchingPolicy,
    ) -> Self {
        Self {
            legs,
            candidates,
            matches,
            registrations,
            ai,
            policy,
        }
    }

    /// Run one batch. Legs are handed to blocking workers in chunks of
    /// `worker_limit`; each worker owns one leg's candidate set so no two
    /// workers contend on the same rows.
    pub async fn run(&self, as_of: DateTime<Utc>) -> Result<MatchBatchSummary, MatchingError> {
        let batch_id = format!("batch-{}", as_of.format("%Y%m%d%H%M%S"));
        let legs = self.legs.open_legs(as_of)?;
        let candidates = Arc::new(self.candidates.candidates()?);
        let budget_before = self.ai.budget().remaining();

        let mut summary = MatchBatchSummary {
            batch_id: batch_id.clone(),
            as_of,
            legs_scanned: legs.len(),
            candidates_ranked: 0,
            ai_calls_used: 0,
            matches_written: 0,
        };

        for chunk in legs.chunks(self.policy.worker_limit.max(1)) {
            let mut handles = Vec::with_capacity(chunk.len());
            for leg in chunk {
                let job = self.clone();
                let leg = leg.clone();
                let candidates = candidates.clone();
                let batch_id = batch_id.clone();
                handles.push(tokio::task::spawn_blocking(move || {
                    job.process_leg(&leg, &candidates, &batch_id, as_of)
                }));
            }
            for handle in handles {
                let outcome = handle
                    .await
                    .map_err(|err| MatchingError::Worker(err.to_string()))??;
                summary.candidates_ranked += outcome.ranked;
                summary.matches_written += outcome.written;
            }
        }

        summary.ai_calls_used = budget_before.saturating_sub(self.ai.budget().remaining());
        info!(
            batch = summary.batch_id,
            legs = summary.legs_scanned,
            ranked = summary.candidates_ranked,
            written = summary.matches_written,
            ai_calls = summary.ai_calls_used,
            "matching batch complete"
        );
        Ok(summary)
    }

    fn process_leg(
        &self,
        leg: &LegListing,
        candidates: &[CrewProfileSnapshot],
        batch_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<LegOutcome, MatchingError> {
        let mut outcome = LegOutcome {
            ranked: 0,
            written: 0,
        };
        if leg.open_berths == 0 || leg.starts_on.and_time(NaiveTime::MIN).and_utc() <= as_of {
            return Ok(outcome);
        }

        let mut eligible: Vec<&CrewProfileSnapshot> = Vec::new();
        for profile in candidates {
            if !profile.ai_processing_consent {
                continue;
            }
            if !gates::risk_gate(profile, leg.required_risk).passed {
                continue;
            }
            if !gates::experience_gate(profile, leg.min_experience).passed {
                continue;
            }
            if self
                .registrations
                .find_pair(&leg.leg_id, &profile.crew_id)?
                .is_some()
            {
                continue;
            }
            // Pair uniqueness: an existing proposal (declined or not) is
            // never re-raised.
            if self.matches.fetch(&profile.crew_id, &leg.leg_id)?.is_some() {
                continue;
            }
            eligible.push(profile);
            if eligible.len() >= self.policy.prefilter_cap {
                break;
            }
        }

        let mut ranked: Vec<(f32, &CrewProfileSnapshot)> = eligible
            .into_iter()
            .map(|profile| (composite_score(profile, leg, &self.policy.weights), profile))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(self.policy.refine_cap);
        outcome.ranked = ranked.len();

        for (composite, profile) in ranked {
            match self.ai.score(&refine_request(profile, leg)) {
                Ok(response) => {
                    // Blend the deterministic composite with the AI view,
                    // both on a 0..=100 scale.
                    let blended = (composite + response.score * 10.0) / 2.0;
                    let match_score = blended.round().clamp(0.0, 100.0) as u8;
                    if match_score < self.policy.persist_floor {
                        continue;
                    }
                    let inserted = self.matches.propose(CrewLegMatch {
                        crew_id: profile.crew_id.clone(),
                        leg_id: leg.leg_id.clone(),
                        match_score,
                        crew_status: MatchPartyStatus::Pending,
                        owner_status: MatchPartyStatus::Pending,
                        expires_at: leg.starts_on.and_time(NaiveTime::MIN).and_utc(),
                        batch_id: batch_id.to_string(),
                    })?;
                    if inserted {
                        outcome.written += 1;
                    }
                }
                Err(ScoringError::BudgetExhausted) => {
                    // Unrefined candidates are left for the next run
                    // rather than persisted on deterministic scores alone.
                    warn!(leg = leg.leg_id, "AI budget exhausted; skipping remaining candidates");
                    break;
                }
                Err(ScoringError::ProvidersExhausted { last }) => {
                    warn!(leg = leg.leg_id, crew = profile.crew_id, %last, "refinement unavailable; skipping candidate");
                }
            }
        }

        Ok(outcome)
    }
}

/// Deterministic composite over skills overlap, experience fit, risk fit,
/// date overlap, and location affinity, scaled to 0..=100.
pub(crate) fn composite_score(
    profile: &CrewProfileSnapshot,
    leg: &LegListing,
    weights: &CompositeWeights,
) -> f32 {
    let skills = if leg.desired_skills.is_empty() {
        1.0
    } else {
        let hits = leg
            .desired_skills
            .iter()
            .filter(|skill| profile.skill_statements.contains_key(*skill))
            .count();
        hits as f32 / leg.desired_skills.len() as f32
    };

    let margin = f32::from(
        profile
            .experience
            .ordinal()
            .saturating_sub(leg.min_experience.ordinal()),
    );
    let experience = 0.5 + 0.5 * (margin / 3.0).min(1.0);

    let risk = if profile.risk_comfort.contains(&leg.required_risk) {
        1.0
    } else {
        0.0
    };

    let dates = match profile.availability {
        Some(window) => {
            let start = window.from.max(leg.starts_on);
            let end = window.until.min(leg.ends_on);
            if end < start {
                0.0
            } else {
                let overlap = (end - start).num_days() + 1;
                let span = ((leg.ends_on - leg.starts_on).num_days() + 1).max(1);
                (overlap as f32 / span as f32).clamp(0.0, 1.0)
            }
        }
        // Unknown availability neither helps nor sinks a candidate.
        None => 0.5,
    };

    let location = if profile.cruising_regions.contains(&leg.region) {
        1.0
    } else {
        0.25
    };

    let weighted = weights.skills * skills
        + weights.experience * experience
        + weights.risk * risk
        + weights.dates * dates
        + weights.location * location;
    100.0 * weighted / weights.total()
}

fn refine_request(profile: &CrewProfileSnapshot, leg: &LegListing) -> ScoreRequest {
    let statements: Vec<String> = profile
        .skill_statements
        .iter()
        .map(|(area, statement)| format!("{area}: {statement}"))
        .collect();
    ScoreRequest::text(
        format!("match:{}:{}", profile.crew_id, leg.leg_id),
        format!(
            "Score 0-10 how well this crew member suits a {} leg in {} from {} to {} \
             wanting skills [{}]. Judge only the material provided.",
            leg.required_risk.label(),
            leg.region,
            leg.starts_on,
            leg.ends_on,
            leg.desired_skills
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ),
        statements.join("\n"),
    )
}

//! Stateless adapter over external language-model scoring providers.
//!
//! Providers are tried in priority order under one shared timeout-and-retry
//! policy. Every call is gated by a global daily budget so batch work cannot
//! run away on cost. Exhausting the budget or the provider list is an
//! ordinary degraded outcome for callers (manual review), never a crash.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One scoring request. The rubric is always owner-authored or
/// platform-defined text; the input is literal user-supplied material.
/// Binary evidence (document bytes, a facial capture) rides along as
/// attachments so providers choose their own encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub subject: String,
    pub rubric: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Vec<u8>>,
}

impl ScoreRequest {
    pub fn text(subject: impl Into<String>, rubric: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            rubric: rubric.into(),
            input: input.into(),
            attachments: Vec::new(),
        }
    }
}

/// The fixed structured contract every provider must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub score: f32,
    pub rationale: String,
}

impl ScoreResponse {
    pub fn in_range(&self) -> bool {
        self.score.is_finite() && (0.0..=10.0).contains(&self.score)
    }
}

/// Failures local to a single provider attempt.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider transport failure: {0}")]
    Transport(String),
    #[error("provider returned a malformed scoring payload: {0}")]
    Malformed(String),
}

/// Parse a raw provider payload into the structured contract. Anything that
/// does not carry a numeric `score` in 0..=10 and a string `rationale` is
/// malformed; it must never be read as a zero score.
pub fn parse_score_payload(raw: &str) -> Result<ScoreResponse, ProviderError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| ProviderError::Malformed(err.to_string()))?;
    let score = value
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| ProviderError::Malformed("missing numeric 'score' field".to_string()))?
        as f32;
    let rationale = value
        .get("rationale")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Malformed("missing string 'rationale' field".to_string()))?
        .to_string();

    let response = ScoreResponse { score, rationale };
    if !response.in_range() {
        return Err(ProviderError::Malformed(format!(
            "score {score} outside the 0..=10 contract"
        )));
    }
    Ok(response)
}

/// A single language-model vendor adapter.
pub trait ScoringProvider: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, request: &ScoreRequest, timeout: Duration)
        -> Result<ScoreResponse, ProviderError>;
}

/// Shared timeout-and-retry policy applied uniformly across the provider
/// chain rather than per vendor.
#[derive(Debug, Clone)]
pub struct ProviderPolicy {
    pub timeout: Duration,
    pub attempts_per_provider: u8,
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            attempts_per_provider: 2,
        }
    }
}

/// Global counter capping AI calls per day across both cores.
#[derive(Debug)]
pub struct AiCallBudget {
    remaining: AtomicU32,
}

impl AiCallBudget {
    pub fn new(daily_cap: u32) -> Self {
        Self {
            remaining: AtomicU32::new(daily_cap),
        }
    }

    /// Take one call from the budget; `false` when nothing is left.
    pub fn try_consume(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            })
            .is_ok()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }
}

/// Failure of a whole scoring call after fallback. Callers degrade to
/// manual review on either variant.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("all scoring providers failed; last error: {last}")]
    ProvidersExhausted { last: String },
    #[error("daily AI call budget exhausted")]
    BudgetExhausted,
}

/// Client walking the priority-ordered provider list.
pub struct AiScoringClient {
    providers: Vec<Arc<dyn ScoringProvider>>,
    policy: ProviderPolicy,
    budget: Arc<AiCallBudget>,
}

impl AiScoringClient {
    pub fn new(
        providers: Vec<Arc<dyn ScoringProvider>>,
        policy: ProviderPolicy,
        budget: Arc<AiCallBudget>,
    ) -> Self {
        Self {
            providers,
            policy,
            budget,
        }
    }

    pub fn budget(&self) -> &AiCallBudget {
        &self.budget
    }

    pub fn score(&self, request: &ScoreRequest) -> Result<ScoreResponse, ScoringError> {
        if !self.budget.try_consume() {
            return Err(ScoringError::BudgetExhausted);
        }

        let mut last = "no scoring providers configured".to_string();
        for provider in &self.providers {
            for attempt in 1..=self.policy.attempts_per_provider.max(1) {
                match provider.score(request, self.policy.timeout) {
                    Ok(response) if response.in_range() => return Ok(response),
                    Ok(response) => {
                        last = format!(
                            "provider '{}' returned out-of-range score {}",
                            provider.name(),
                            response.score
                        );
                        warn!(provider = provider.name(), score = response.score, "discarding out-of-range score");
                    }
                    Err(err) => {
                        last = format!("provider '{}': {err}", provider.name());
                        warn!(provider = provider.name(), attempt, %err, "scoring attempt failed");
                    }
                }
            }
        }

        Err(ScoringError::ProvidersExhausted { last })
    }
}

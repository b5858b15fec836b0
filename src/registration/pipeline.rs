//! The per-registration assessment state machine.
//!
//! Stages run in strict order; each is a potential terminal stop. Every
//! stop resolves to PendingApproval with the failing stage and reason
//! recorded. The pipeline is a pure function of the requirement set, the
//! answers, and the profile snapshot passed in; it reads no ambient state
//! and it never moves a registration to NotApproved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::AiScoringClient;

use super::domain::{CrewProfileSnapshot, FacialCapture, LegRequirements, RegistrationAnswer};
use super::gates;
use super::grants::{AccessLog, DocumentGrantValidator, DocumentStore, GrantStore};
use super::passport::PassportAssessor;
use super::scoring::SkillAndQuestionAssessor;

/// Stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentStage {
    Submitted,
    RiskGate,
    ExperienceGate,
    PassportGate,
    SkillScoring,
    Decision,
}

impl AssessmentStage {
    pub const fn label(self) -> &'static str {
        match self {
            AssessmentStage::Submitted => "submitted",
            AssessmentStage::RiskGate => "risk_gate",
            AssessmentStage::ExperienceGate => "experience_gate",
            AssessmentStage::PassportGate => "passport_gate",
            AssessmentStage::SkillScoring => "skill_scoring",
            AssessmentStage::Decision => "decision",
        }
    }
}

/// One audit row per stage the pipeline reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: AssessmentStage,
    pub passed: bool,
    pub detail: String,
}

/// Terminal decision of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssessmentDecision {
    AutoApproved,
    ManualReview {
        stage: AssessmentStage,
        reasons: Vec<String>,
    },
}

/// Everything a run produces: the decision, the stage trail, the answers
/// with scores written in, and a human-readable summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    pub decision: AssessmentDecision,
    pub trail: Vec<StageResult>,
    pub scored_answers: Vec<RegistrationAnswer>,
    pub aggregate_score: Option<f32>,
    pub reasoning: String,
}

impl AssessmentOutcome {
    pub fn auto_approved(&self) -> bool {
        matches!(self.decision, AssessmentDecision::AutoApproved)
    }
}

/// Explicit inputs for one run; a snapshot, never a live read.
pub struct AssessmentInput<'a> {
    pub requirements: &'a LegRequirements,
    pub profile: &'a CrewProfileSnapshot,
    pub answers: &'a [RegistrationAnswer],
    pub facial_capture: Option<&'a FacialCapture>,
    pub now: DateTime<Utc>,
}

pub struct RegistrationAssessmentPipeline<'a> {
    grants: &'a dyn GrantStore,
    access_log: &'a dyn AccessLog,
    documents: &'a dyn DocumentStore,
    ai: &'a AiScoringClient,
}

impl<'a> RegistrationAssessmentPipeline<'a> {
    pub fn new(
        grants: &'a dyn GrantStore,
        access_log: &'a dyn AccessLog,
        documents: &'a dyn DocumentStore,
        ai: &'a AiScoringClient,
    ) -> Self {
        Self {
            grants,
            access_log,
            documents,
            ai,
        }
    }

    pub fn run(&self, input: AssessmentInput<'_>) -> AssessmentOutcome {
        let mut trail = vec![StageResult {
            stage: AssessmentStage::Submitted,
            passed: true,
            detail: format!(
                "registration for leg {} by {}",
                input.requirements.leg_id, input.profile.crew_id
            ),
        }];
        let mut scored_answers = input.answers.to_vec();

        // Risk gate.
        if let Some(required) = input.requirements.required_risk() {
            let check = gates::risk_gate(input.profile, required);
            trail.push(StageResult {
                stage: AssessmentStage::RiskGate,
                passed: check.passed,
                detail: check.reason.clone(),
            });
            if !check.passed {
                return halt(AssessmentStage::RiskGate, vec![check.reason], trail, scored_answers, None);
            }
        } else {
            trail.push(stage_skipped(AssessmentStage::RiskGate));
        }

        // Experience gate.
        if let Some(required) = input.requirements.required_experience() {
            let check = gates::experience_gate(input.profile, required);
            trail.push(StageResult {
                stage: AssessmentStage::ExperienceGate,
                passed: check.passed,
                detail: check.reason.clone(),
            });
            if !check.passed {
                return halt(
                    AssessmentStage::ExperienceGate,
                    vec![check.reason],
                    trail,
                    scored_answers,
                    None,
                );
            }
        } else {
            trail.push(stage_skipped(AssessmentStage::ExperienceGate));
        }

        // Consent guard: no AI-bearing stage may run without an explicit
        // consent flag on the snapshot.
        let passport_policy = input.requirements.passport();
        let needs_ai = passport_policy.is_some() || input.requirements.has_scored_requirements();
        if needs_ai && !input.profile.ai_processing_consent {
            let stage = if passport_policy.is_some() {
                AssessmentStage::PassportGate
            } else {
                AssessmentStage::SkillScoring
            };
            return halt(
                stage,
                vec!["AI-processing consent is not present; automated scoring skipped".to_string()],
                trail,
                scored_answers,
                None,
            );
        }

        // Passport gate.
        if let Some(policy) = passport_policy {
            let Some(document_id) = scored_answers
                .iter()
                .find(|answer| answer.requirement_id == policy.requirement_id)
                .map(|answer| answer.value.clone())
                .filter(|value| !value.trim().is_empty())
            else {
                let reason = "no passport document referenced by the submission".to_string();
                trail.push(StageResult {
                    stage: AssessmentStage::PassportGate,
                    passed: false,
                    detail: reason.clone(),
                });
                return halt(AssessmentStage::PassportGate, vec![reason], trail, scored_answers, None);
            };

            let assessor = PassportAssessor::new(
                DocumentGrantValidator::new(self.grants, self.access_log),
                self.documents,
                self.ai,
            );
            match assessor.assess(
                input.profile,
                &document_id,
                policy.requires_photo_validation,
                policy.pass_confidence,
                input.facial_capture,
                input.now,
            ) {
                Ok(check) => {
                    trail.push(StageResult {
                        stage: AssessmentStage::PassportGate,
                        passed: true,
                        detail: format!(
                            "passport confidence {:.1} meets {:.1}",
                            check.confidence, policy.pass_confidence
                        ),
                    });
                    write_score(
                        &mut scored_answers,
                        &policy.requirement_id,
                        check.confidence,
                        check.rationale,
                    );
                }
                Err(failure) => {
                    let reason = failure.to_string();
                    trail.push(StageResult {
                        stage: AssessmentStage::PassportGate,
                        passed: false,
                        detail: reason.clone(),
                    });
                    return halt(AssessmentStage::PassportGate, vec![reason], trail, scored_answers, None);
                }
            }
        } else {
            trail.push(stage_skipped(AssessmentStage::PassportGate));
        }

        // Skill and question scoring.
        let mut aggregate_score = None;
        if input.requirements.has_scored_requirements() {
            let assessor = SkillAndQuestionAssessor::new(self.ai);
            match assessor.assess(&input.requirements.requirements, &scored_answers) {
                Ok(report) => {
                    for skill in &report.skill_scores {
                        write_score(
                            &mut scored_answers,
                            &skill.requirement_id,
                            skill.score,
                            skill.rationale.clone(),
                        );
                    }
                    for question in &report.question_scores {
                        write_score(
                            &mut scored_answers,
                            &question.requirement_id,
                            question.score,
                            question.rationale.clone(),
                        );
                    }
                    aggregate_score = report.aggregate;

                    if report.passes(input.requirements.passing_score) {
                        trail.push(StageResult {
                            stage: AssessmentStage::SkillScoring,
                            passed: true,
                            detail: match report.aggregate {
                                Some(aggregate) => format!(
                                    "weighted aggregate {:.2} meets passing score {:.1}",
                                    aggregate, input.requirements.passing_score
                                ),
                                None => "no weighted skill requirements configured".to_string(),
                            },
                        });
                    } else {
                        let mut reasons = report.faults.clone();
                        if let Some(aggregate) = report.aggregate {
                            if aggregate < input.requirements.passing_score {
                                reasons.push(format!(
                                    "weighted aggregate {:.2} below passing score {:.1}",
                                    aggregate, input.requirements.passing_score
                                ));
                            }
                        }
                        trail.push(StageResult {
                            stage: AssessmentStage::SkillScoring,
                            passed: false,
                            detail: reasons.join("; "),
                        });
                        return halt(
                            AssessmentStage::SkillScoring,
                            reasons,
                            trail,
                            scored_answers,
                            report.aggregate,
                        );
                    }
                }
                Err(unavailable) => {
                    let reason = unavailable.to_string();
                    trail.push(StageResult {
                        stage: AssessmentStage::SkillScoring,
                        passed: false,
                        detail: reason.clone(),
                    });
                    return halt(AssessmentStage::SkillScoring, vec![reason], trail, scored_answers, None);
                }
            }
        } else {
            trail.push(stage_skipped(AssessmentStage::SkillScoring));
        }

        // Decision: every configured stage passed.
        let reasoning = match aggregate_score {
            Some(aggregate) => format!(
                "auto-approved: every configured gate passed and weighted aggregate {:.2} met the passing score",
                aggregate
            ),
            None => "auto-approved: every configured gate passed".to_string(),
        };
        trail.push(StageResult {
            stage: AssessmentStage::Decision,
            passed: true,
            detail: reasoning.clone(),
        });

        AssessmentOutcome {
            decision: AssessmentDecision::AutoApproved,
            trail,
            scored_answers,
            aggregate_score,
            reasoning,
        }
    }
}

fn stage_skipped(stage: AssessmentStage) -> StageResult {
    StageResult {
        stage,
        passed: true,
        detail: "not configured for this leg".to_string(),
    }
}

fn write_score(
    answers: &mut [RegistrationAnswer],
    requirement_id: &str,
    score: f32,
    reasoning: String,
) {
    if let Some(answer) = answers
        .iter_mut()
        .find(|answer| answer.requirement_id == requirement_id)
    {
        answer.score = Some(score);
        answer.reasoning = Some(reasoning);
    }
}

fn halt(
    stage: AssessmentStage,
    reasons: Vec<String>,
    mut trail: Vec<StageResult>,
    scored_answers: Vec<RegistrationAnswer>,
    aggregate_score: Option<f32>,
) -> AssessmentOutcome {
    let reasoning = format!(
        "manual review required at {}: {}",
        stage.label(),
        reasons.join("; ")
    );
    trail.push(StageResult {
        stage: AssessmentStage::Decision,
        passed: false,
        detail: reasoning.clone(),
    });
    AssessmentOutcome {
        decision: AssessmentDecision::ManualReview { stage, reasons },
        trail,
        scored_answers,
        aggregate_score,
        reasoning,
    }
}

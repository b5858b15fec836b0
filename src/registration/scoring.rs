//! AI-backed scoring of weighted skill requirements and free-text question
//! answers, aggregated against the leg's passing bar.

use serde::{Deserialize, Serialize};

use crate::ai::{AiScoringClient, ScoreRequest};

use super::domain::{RegistrationAnswer, RequirementKind, VoyageRequirement};

/// Scored skill requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillScore {
    pub requirement_id: String,
    pub area: String,
    pub weight: u8,
    pub score: f32,
    pub rationale: String,
}

/// Scored question answer. Advisory: appended to the reasoning but not
/// weighted into the aggregate unless the owner's skill rubric references
/// the answer itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub requirement_id: String,
    pub score: f32,
    pub rationale: String,
}

/// Full output of the skill/question pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringReport {
    pub skill_scores: Vec<SkillScore>,
    pub question_scores: Vec<QuestionScore>,
    /// Weighted aggregate over skill requirements; None when the leg
    /// configures no skills.
    pub aggregate: Option<f32>,
    /// Per-requirement configuration faults. Any fault forces manual
    /// review without crashing the rest of the pass.
    pub faults: Vec<String>,
}

impl ScoringReport {
    pub fn passes(&self, passing_score: f32) -> bool {
        self.faults.is_empty()
            && match self.aggregate {
                Some(aggregate) => aggregate >= passing_score,
                // No skill requirements configured: nothing to hold the
                // registration below the bar.
                None => true,
            }
    }
}

/// Provider exhaustion mid-pass. Degrades the whole stage to manual
/// review; partial scores are discarded rather than mixed with guesses.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("scoring provider unavailable: {0}")]
pub struct ScoringUnavailable(pub String);

pub struct SkillAndQuestionAssessor<'a> {
    ai: &'a AiScoringClient,
}

impl<'a> SkillAndQuestionAssessor<'a> {
    pub fn new(ai: &'a AiScoringClient) -> Self {
        Self { ai }
    }

    /// Score every skill and question requirement. Skill input is the
    /// candidate's literal self-description (captured on the answer row at
    /// submission); question input is the literal answer text. Nothing is
    /// ever invented on the candidate's behalf.
    pub fn assess(
        &self,
        requirements: &[VoyageRequirement],
        answers: &[RegistrationAnswer],
    ) -> Result<ScoringReport, ScoringUnavailable> {
        let mut report = ScoringReport {
            skill_scores: Vec::new(),
            question_scores: Vec::new(),
            aggregate: None,
            faults: Vec::new(),
        };

        for requirement in requirements {
            match &requirement.kind {
                RequirementKind::Skill {
                    area,
                    weight,
                    criteria,
                } => {
                    if criteria.trim().is_empty() {
                        report.faults.push(format!(
                            "skill requirement '{area}' has no grading rubric configured"
                        ));
                        continue;
                    }
                    let Some(statement) = answer_value(answers, &requirement.requirement_id) else {
                        report.faults.push(format!(
                            "no self-description available for skill area '{area}'"
                        ));
                        continue;
                    };

                    let response = self
                        .ai
                        .score(&ScoreRequest::text(
                            format!("skill:{area}"),
                            criteria.clone(),
                            statement,
                        ))
                        .map_err(|err| ScoringUnavailable(err.to_string()))?;

                    report.skill_scores.push(SkillScore {
                        requirement_id: requirement.requirement_id.clone(),
                        area: area.clone(),
                        weight: *weight,
                        score: response.score,
                        rationale: response.rationale,
                    });
                }
                RequirementKind::Question { prompt, criteria } => {
                    if criteria.trim().is_empty() {
                        report.faults.push(format!(
                            "question '{prompt}' has no grading rubric configured"
                        ));
                        continue;
                    }
                    let Some(answer) = answer_value(answers, &requirement.requirement_id) else {
                        report
                            .faults
                            .push(format!("question '{prompt}' was not answered"));
                        continue;
                    };

                    let response = self
                        .ai
                        .score(&ScoreRequest::text(
                            format!("question:{}", requirement.requirement_id),
                            format!("Question: {prompt}\nGrading rubric: {criteria}"),
                            answer,
                        ))
                        .map_err(|err| ScoringUnavailable(err.to_string()))?;

                    report.question_scores.push(QuestionScore {
                        requirement_id: requirement.requirement_id.clone(),
                        score: response.score,
                        rationale: response.rationale,
                    });
                }
                RequirementKind::RiskLevel(_)
                | RequirementKind::ExperienceLevel(_)
                | RequirementKind::Passport { .. } => {}
            }
        }

        report.aggregate = weighted_aggregate(&report.skill_scores, &mut report.faults);
        Ok(report)
    }
}

fn answer_value<'a>(answers: &'a [RegistrationAnswer], requirement_id: &str) -> Option<&'a str> {
    answers
        .iter()
        .find(|answer| answer.requirement_id == requirement_id)
        .map(|answer| answer.value.as_str())
        .filter(|value| !value.trim().is_empty())
}

/// Aggregate = sum(weight x score) / sum(weight) across skill requirements
/// only.
fn weighted_aggregate(skill_scores: &[SkillScore], faults: &mut Vec<String>) -> Option<f32> {
    if skill_scores.is_empty() {
        return None;
    }
    let total_weight: u32 = skill_scores.iter().map(|skill| u32::from(skill.weight)).sum();
    if total_weight == 0 {
        faults.push("skill requirements carry zero total weight".to_string());
        return None;
    }
    let weighted: f32 = skill_scores
        .iter()
        .map(|skill| f32::from(skill.weight) * skill.score)
        .sum();
    Some(weighted / total_weight as f32)
}

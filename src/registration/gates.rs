//! Deterministic pre-AI gates. These are free to evaluate, so they run
//! before any provider call and reject every technically-ineligible
//! registration without incurring scoring cost.

use serde::{Deserialize, Serialize};

use super::domain::{CrewProfileSnapshot, ExperienceLevel, RiskLevel};

/// Outcome of one deterministic gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCheck {
    pub passed: bool,
    pub reason: String,
}

/// Risk gate: the candidate's declared comfort set must contain the
/// required level. Containment, not equality, so broader comfort always
/// passes.
pub fn risk_gate(profile: &CrewProfileSnapshot, required: RiskLevel) -> GateCheck {
    if profile.risk_comfort.contains(&required) {
        GateCheck {
            passed: true,
            reason: format!("declared comfort covers {} sailing", required.label()),
        }
    } else {
        GateCheck {
            passed: false,
            reason: format!(
                "leg requires {} sailing, which is outside the declared comfort set",
                required.label()
            ),
        }
    }
}

/// Experience gate: candidate ordinal must meet or exceed the required
/// ordinal.
pub fn experience_gate(profile: &CrewProfileSnapshot, required: ExperienceLevel) -> GateCheck {
    if profile.experience.ordinal() >= required.ordinal() {
        GateCheck {
            passed: true,
            reason: format!(
                "{} meets the required {} level",
                profile.experience.label(),
                required.label()
            ),
        }
    } else {
        GateCheck {
            passed: false,
            reason: format!(
                "leg requires at least {} experience, candidate is {}",
                required.label(),
                profile.experience.label()
            ),
        }
    }
}

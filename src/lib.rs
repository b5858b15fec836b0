//! Crew registration eligibility assessment and proactive voyage matching.
//!
//! The crate has two cores that share scoring primitives, consent gating, and
//! audit rules: the registration assessment pipeline, which walks a
//! registration through deterministic gates and AI-scored checks to decide
//! whether it can be auto-approved, and the proactive matching job, which
//! discovers crew/leg pairings on a schedule before either party searches.

pub mod ai;
pub mod config;
pub mod error;
pub mod infra;
pub mod matching;
pub mod registration;
pub mod telemetry;

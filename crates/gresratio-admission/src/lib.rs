//! gresratio-admission: CPU/GPU ratio admission decisions
//!
//! This crate turns a loaded policy and a job request into a decision:
//! - Ratio and bounds evaluation of a card rule
//! - Policy loading with optional change-based caching
//! - The admission facade that orders the checks

pub mod admission;
pub mod cache;
pub mod evaluator;

pub use admission::{decide, Admission};
pub use cache::PolicyCache;
pub use evaluator::{DefaultRuleEvaluator, ResolvedCard, RuleEvaluator, Violation};

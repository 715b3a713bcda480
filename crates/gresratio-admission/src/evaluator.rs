//! CPU/GPU ratio and bounds evaluation for a matched card rule

use gresratio_core::{
    CardLimits, CardRule, Decision, DecisionReason, Enforcement, PolicySet, RATIO_EPSILON,
};
use std::fmt;

/// Hint prepended to rejections when the request did not name a card
pub const DEFAULTED_CARD_HINT: &str =
    "No GPU specified, please specify which GPU when submitting jobs (ex. V100).";

/// The card a request resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCard<'a> {
    /// Card name used for lookup
    pub name: &'a str,
    /// True when the request named no card and the default was used
    pub defaulted: bool,
}

/// Strategy for checking a request against a card rule
pub trait RuleEvaluator: Send + Sync {
    /// Decide whether `cpu_count` CPUs are acceptable for `gpu_count` GPUs
    fn evaluate(
        &self,
        policy: &PolicySet,
        rule: &CardRule,
        card: ResolvedCard<'_>,
        cpu_count: u32,
        gpu_count: u32,
    ) -> Decision;
}

/// A failed check
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Ratio style: CPUs per GPU differs from the required value
    RatioMismatch { observed: f64, required: f64 },
    /// Bounds style: fewer CPUs than `min * gpus`
    BelowMin {
        card: String,
        cpus: u32,
        gpus: u32,
        min: u32,
    },
    /// Bounds style: more CPUs than `max * gpus`
    AboveMax {
        card: String,
        cpus: u32,
        gpus: u32,
        max: u32,
    },
    /// Bounds style: weighted CPUs per GPU below the required ratio
    WeightedRatioTooLow {
        card: String,
        observed: f64,
        required: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::RatioMismatch { observed, required } => write!(
                f,
                "Error: CPU/GPU ratio {:.6} is less than or more than required ratio {:.6}.",
                observed, required
            ),
            Violation::BelowMin {
                card,
                cpus,
                gpus,
                min,
            } => write!(
                f,
                "CPU count {} for {} x {} is lower than min {} per card ({} required).",
                cpus,
                gpus,
                card,
                min,
                u64::from(*min) * u64::from(*gpus)
            ),
            Violation::AboveMax {
                card,
                cpus,
                gpus,
                max,
            } => write!(
                f,
                "CPU count {} for {} x {} is higher than max {} per card ({} allowed).",
                cpus,
                gpus,
                card,
                max,
                u64::from(*max) * u64::from(*gpus)
            ),
            Violation::WeightedRatioTooLow {
                card,
                observed,
                required,
            } => write!(
                f,
                "Weighted CPU/GPU ratio {:.2} for {} is lower than required ratio {:.2}.",
                observed, card, required
            ),
        }
    }
}

/// Ratio style: accepted only when CPUs per GPU equals the requirement.
///
/// A ratio above the requirement is rejected just like one below it.
pub fn check_ratio(required: f64, cpu_count: u32, gpu_count: u32) -> Result<f64, Violation> {
    let observed = f64::from(cpu_count) / f64::from(gpu_count);
    if (observed - required).abs() < RATIO_EPSILON {
        Ok(observed)
    } else {
        Err(Violation::RatioMismatch { observed, required })
    }
}

/// Bounds style: every enabled check must pass; the first failure is returned
pub fn check_bounds(
    enforcement: &Enforcement,
    card: &str,
    min: u32,
    max: u32,
    weight: f64,
    cpu_count: u32,
    gpu_count: u32,
) -> Result<(), Violation> {
    let cpus = u64::from(cpu_count);
    let gpus = u64::from(gpu_count);

    if enforcement.enforce_min && cpus < u64::from(min) * gpus {
        return Err(Violation::BelowMin {
            card: card.to_string(),
            cpus: cpu_count,
            gpus: gpu_count,
            min,
        });
    }

    if enforcement.enforce_max && cpus > u64::from(max) * gpus {
        return Err(Violation::AboveMax {
            card: card.to_string(),
            cpus: cpu_count,
            gpus: gpu_count,
            max,
        });
    }

    if enforcement.enforce_ratio {
        let observed = f64::from(cpu_count) / (f64::from(gpu_count) * weight);
        if observed < enforcement.required_ratio {
            return Err(Violation::WeightedRatioTooLow {
                card: card.to_string(),
                observed,
                required: enforcement.required_ratio,
            });
        }
    }

    Ok(())
}

/// Default evaluator
pub struct DefaultRuleEvaluator;

impl RuleEvaluator for DefaultRuleEvaluator {
    fn evaluate(
        &self,
        policy: &PolicySet,
        rule: &CardRule,
        card: ResolvedCard<'_>,
        cpu_count: u32,
        gpu_count: u32,
    ) -> Decision {
        let checked = match &rule.limits {
            CardLimits::Ratio { required_ratio } => {
                check_ratio(*required_ratio, cpu_count, gpu_count).map(|observed| {
                    format!(
                        "CPU/GPU ratio {:.6} matches required ratio {:.6}.",
                        observed, required_ratio
                    )
                })
            }
            CardLimits::Bounds {
                min_cpus_per_gpu,
                max_cpus_per_gpu,
                weight,
            } => check_bounds(
                &policy.enforcement,
                &rule.name,
                *min_cpus_per_gpu,
                *max_cpus_per_gpu,
                *weight,
                cpu_count,
                gpu_count,
            )
            .map(|()| {
                format!(
                    "CPU count {} for {} x {} is within policy.",
                    cpu_count, gpu_count, rule.name
                )
            }),
        };

        let decision = match checked {
            Ok(message) => Decision::accept(DecisionReason::Evaluated, message),
            Err(violation) if card.defaulted => Decision::reject(
                DecisionReason::Evaluated,
                format!("{} {}", DEFAULTED_CARD_HINT, violation),
            ),
            Err(violation) => Decision::reject(DecisionReason::Evaluated, violation.to_string()),
        };

        decision.with_card(card.name)
    }
}

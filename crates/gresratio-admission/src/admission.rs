//! Admission facade: one accept/reject decision per request

use gresratio_core::{
    parse_descriptor, AdmissionConfig, AdmissionRequest, Decision, DecisionReason,
    GresRatioResult, PolicySet, ReloadMode,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::PolicyCache;
use crate::evaluator::{DefaultRuleEvaluator, ResolvedCard, RuleEvaluator};

/// Evaluates admission requests against the policy file.
///
/// Safe to share between threads; each call observes a policy at least as
/// fresh as the file's last successful parse.
pub struct Admission {
    /// Policy source
    cache: PolicyCache,
    /// Rule evaluation strategy
    evaluator: Arc<dyn RuleEvaluator>,
}

impl Admission {
    /// Create a new admission facade for a policy file
    pub fn new(policy_path: impl Into<PathBuf>, reload: ReloadMode) -> Self {
        let cache = PolicyCache::new(policy_path, reload);

        info!(
            path = %cache.path().display(),
            reload = ?reload,
            "Admission policy configured"
        );

        Self {
            cache,
            evaluator: Arc::new(DefaultRuleEvaluator),
        }
    }

    /// Create from host settings
    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(config.policy_path.clone(), config.reload)
    }

    /// Replace the rule evaluation strategy
    pub fn with_evaluator(mut self, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Policy file location
    pub fn policy_path(&self) -> &Path {
        self.cache.path()
    }

    /// The current policy
    pub fn policy(&self) -> GresRatioResult<Arc<PolicySet>> {
        Ok(self.cache.load()?)
    }

    /// Evaluate one request.
    ///
    /// Fails only when the policy cannot be loaded; everything else
    /// resolves to a [`Decision`].
    pub fn evaluate(
        &self,
        partition: Option<&str>,
        gres: Option<&str>,
        cpu_count: u32,
    ) -> GresRatioResult<Decision> {
        self.check(&AdmissionRequest::submit(partition, gres, cpu_count))
    }

    /// Evaluate a prepared request
    pub fn check(&self, request: &AdmissionRequest) -> GresRatioResult<Decision> {
        let policy = self.policy()?;
        Ok(decide(&policy, self.evaluator.as_ref(), request))
    }
}

/// Decide a request against an already loaded policy
pub fn decide(
    policy: &PolicySet,
    evaluator: &dyn RuleEvaluator,
    request: &AdmissionRequest,
) -> Decision {
    if !policy.enabled {
        info!("GRES ratio policy disabled");
        return Decision::accept(DecisionReason::Disabled, "GRES ratio policy disabled.");
    }

    let partition = match request.partition() {
        Some(partition) => partition,
        None => {
            info!("Missed partition info");
            return Decision::accept(DecisionReason::NotApplicable, "No partition given.");
        }
    };

    if !policy.monitors(partition) {
        debug!(partition = partition, "Partition not monitored");
        return Decision::accept(
            DecisionReason::NotApplicable,
            format!("Partition {} is not subject to the GRES ratio policy.", partition),
        );
    }

    let gres = match request.gres() {
        Some(gres) => gres,
        None => {
            info!(partition = partition, "Missed GRES on partition");
            return Decision::reject(
                DecisionReason::MissingGres,
                format!(
                    "Partition {} requires a GPU request (ex. --gres=gpu:{}:1).",
                    partition, policy.default_card
                ),
            );
        }
    };

    let descriptor = match parse_descriptor(gres) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            info!(partition = partition, gres = gres, error = %e, "Invalid GRES");
            return Decision::reject(DecisionReason::InvalidDescriptor, format!("Error: {}.", e));
        }
    };

    let card = ResolvedCard {
        name: descriptor.card_or(&policy.default_card),
        defaulted: descriptor.card_name.is_none(),
    };
    if card.defaulted {
        info!(card = card.name, "User did not specify gpu, assuming default gpu");
    }

    let rule = match policy.find_card(card.name) {
        Some(rule) => rule,
        None => {
            info!(card = card.name, "Config does not contain values for card");
            return Decision::accept(
                DecisionReason::CardUnknown,
                format!("No policy configured for card {}.", card.name),
            )
            .with_card(card.name);
        }
    };

    let decision = evaluator.evaluate(
        policy,
        rule,
        card,
        request.cpu_count,
        descriptor.gpu_count,
    );

    debug!(
        card = card.name,
        cpus = request.cpu_count,
        gpus = descriptor.gpu_count,
        outcome = %decision.outcome,
        "Evaluated GRES ratio"
    );

    decision
}

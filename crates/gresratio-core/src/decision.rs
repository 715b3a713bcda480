//! Admission decisions

use serde::Serialize;

/// Accept or reject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Accept,
    Reject,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Accept => write!(f, "Accepted"),
            Outcome::Reject => write!(f, "Refused"),
        }
    }
}

/// Why the evaluation ended where it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    /// The policy switch is off
    Disabled,
    /// The request is not for the monitored partition
    NotApplicable,
    /// The monitored partition requires a GRES and none was given
    MissingGres,
    /// The GRES string could not be parsed
    InvalidDescriptor,
    /// No rule exists for the requested card
    CardUnknown,
    /// The card rule was checked
    Evaluated,
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionReason::Disabled => write!(f, "disabled"),
            DecisionReason::NotApplicable => write!(f, "not-applicable"),
            DecisionReason::MissingGres => write!(f, "missing-gres"),
            DecisionReason::InvalidDescriptor => write!(f, "invalid-descriptor"),
            DecisionReason::CardUnknown => write!(f, "card-unknown"),
            DecisionReason::Evaluated => write!(f, "evaluated"),
        }
    }
}

/// Result of evaluating one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub outcome: Outcome,
    pub reason: DecisionReason,
    /// Human readable explanation; may be empty on accept
    pub message: String,
    /// Card actually evaluated, which may be the default card
    pub matched_card: Option<String>,
}

impl Decision {
    pub fn accept(reason: DecisionReason, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Accept,
            reason,
            message: message.into(),
            matched_card: None,
        }
    }

    pub fn reject(reason: DecisionReason, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Reject,
            reason,
            message: message.into(),
            matched_card: None,
        }
    }

    pub fn with_card(mut self, card: impl Into<String>) -> Self {
        self.matched_card = Some(card.into());
        self
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == Outcome::Accept
    }
}

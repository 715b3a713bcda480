//! Policy model: the validated snapshot of a ratio configuration file

use serde::Serialize;

/// Maximum length in bytes of any bounded text field (card names, partition)
pub const MAX_FIELD_LEN: usize = 255;

/// Card assumed when neither the file nor the request names one
pub const DEFAULT_CARD: &str = "V100";

/// Partition monitored when the file does not name one
pub const DEFAULT_PARTITION: &str = "es1";

/// Minimum weighted CPUs per GPU for the bounds style `enforce_ratio` check
pub const DEFAULT_WEIGHTED_RATIO: f64 = 2.0;

/// Tolerance for the ratio style equality check
pub const RATIO_EPSILON: f64 = 1e-6;

/// The two styles a card rule can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `card.NAME = ratio` lines
    Ratio,
    /// `NAME = {min = .., max = .., weight = ..}` records under `[gresratio.cards]`
    Bounds,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Ratio => write!(f, "ratio"),
            Dialect::Bounds => write!(f, "bounds"),
        }
    }
}

/// Which bounds style checks are switched on
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Enforcement {
    /// Reject when CPUs fall below `min_cpus_per_gpu * gpus`
    pub enforce_min: bool,
    /// Reject when CPUs exceed `max_cpus_per_gpu * gpus`
    pub enforce_max: bool,
    /// Reject when `cpus / (gpus * weight)` falls below `required_ratio`
    pub enforce_ratio: bool,
    /// Threshold for the weighted ratio check
    pub required_ratio: f64,
}

impl Default for Enforcement {
    fn default() -> Self {
        Self {
            enforce_min: false,
            enforce_max: false,
            enforce_ratio: false,
            required_ratio: DEFAULT_WEIGHTED_RATIO,
        }
    }
}

/// Limits for one accelerator type, normalized from either file style
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum CardLimits {
    /// CPUs per GPU must equal `required_ratio`
    Ratio { required_ratio: f64 },
    /// CPUs per GPU must fall within `[min, max]`, optionally weighted
    Bounds {
        min_cpus_per_gpu: u32,
        max_cpus_per_gpu: u32,
        weight: f64,
    },
}

impl CardLimits {
    pub fn dialect(&self) -> Dialect {
        match self {
            CardLimits::Ratio { .. } => Dialect::Ratio,
            CardLimits::Bounds { .. } => Dialect::Bounds,
        }
    }
}

/// Policy for one accelerator type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRule {
    /// Card name as written in the file; matched case-insensitively
    pub name: String,
    /// The limits applied to requests for this card
    #[serde(flatten)]
    pub limits: CardLimits,
}

impl CardRule {
    /// Create a ratio style rule
    pub fn ratio(name: impl Into<String>, required_ratio: f64) -> Self {
        Self {
            name: name.into(),
            limits: CardLimits::Ratio { required_ratio },
        }
    }

    /// Create a bounds style rule
    pub fn bounds(name: impl Into<String>, min: u32, max: u32, weight: f64) -> Self {
        Self {
            name: name.into(),
            limits: CardLimits::Bounds {
                min_cpus_per_gpu: min,
                max_cpus_per_gpu: max,
                weight,
            },
        }
    }
}

/// Card rules keyed by case-insensitive name, in file order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CardTable {
    rules: Vec<CardRule>,
}

impl CardTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule. A rule with the same name (ignoring case) is replaced in
    /// place and returned, so the last definition wins.
    pub fn insert(&mut self, rule: CardRule) -> Option<CardRule> {
        match self
            .rules
            .iter_mut()
            .find(|r| r.name.eq_ignore_ascii_case(&rule.name))
        {
            Some(slot) => Some(std::mem::replace(slot, rule)),
            None => {
                self.rules.push(rule);
                None
            }
        }
    }

    /// Look up a rule by name, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&CardRule> {
        self.rules.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardRule> {
        self.rules.iter()
    }
}

impl FromIterator<CardRule> for CardTable {
    fn from_iter<I: IntoIterator<Item = CardRule>>(iter: I) -> Self {
        let mut table = CardTable::new();
        for rule in iter {
            table.insert(rule);
        }
        table
    }
}

/// Validated configuration snapshot. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySet {
    /// When false every request is accepted without further checks
    pub enabled: bool,
    /// Card assumed for requests that do not name one
    pub default_card: String,
    /// The only partition this policy applies to
    pub monitored_partition: String,
    /// Bounds style checks (ignored by ratio style rules)
    pub enforcement: Enforcement,
    /// Per-card rules
    pub cards: CardTable,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            enabled: true,
            default_card: DEFAULT_CARD.to_string(),
            monitored_partition: DEFAULT_PARTITION.to_string(),
            enforcement: Enforcement::default(),
            cards: CardTable::new(),
        }
    }
}

impl PolicySet {
    /// Whether requests on `partition` fall under this policy
    pub fn monitors(&self, partition: &str) -> bool {
        self.monitored_partition == partition
    }

    /// Look up the rule for a card
    pub fn find_card(&self, name: &str) -> Option<&CardRule> {
        self.cards.get(name)
    }

    /// Style of the card rules, if there are any
    pub fn dialect(&self) -> Option<Dialect> {
        self.cards.iter().next().map(|r| r.limits.dialect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PolicySet::default();
        assert!(policy.enabled);
        assert_eq!(policy.default_card, "V100");
        assert_eq!(policy.monitored_partition, "es1");
        assert!(policy.cards.is_empty());
        assert!(policy.dialect().is_none());
    }

    #[test]
    fn test_card_lookup_ignores_case() {
        let cards: CardTable = vec![CardRule::ratio("V100", 2.0), CardRule::ratio("A40", 16.0)]
            .into_iter()
            .collect();

        assert_eq!(cards.get("v100").map(|r| r.name.as_str()), Some("V100"));
        assert_eq!(cards.get("a40").map(|r| r.name.as_str()), Some("A40"));
        assert!(cards.get("H100").is_none());
    }

    #[test]
    fn test_duplicate_card_last_wins_in_place() {
        let mut cards = CardTable::new();
        cards.insert(CardRule::ratio("V100", 2.0));
        cards.insert(CardRule::ratio("A40", 16.0));
        let previous = cards.insert(CardRule::ratio("v100", 4.0));

        assert_eq!(previous, Some(CardRule::ratio("V100", 2.0)));
        assert_eq!(cards.len(), 2);

        let names: Vec<&str> = cards.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["v100", "A40"]);
        assert_eq!(
            cards.get("V100").map(|r| &r.limits),
            Some(&CardLimits::Ratio { required_ratio: 4.0 })
        );
    }

    #[test]
    fn test_dialect_follows_rules() {
        let mut policy = PolicySet::default();
        policy.cards.insert(CardRule::bounds("A40", 2, 8, 1.0));
        assert_eq!(policy.dialect(), Some(Dialect::Bounds));
        assert_eq!(Dialect::Bounds.to_string(), "bounds");
    }

    #[test]
    fn test_monitors_exact_partition() {
        let policy = PolicySet::default();
        assert!(policy.monitors("es1"));
        assert!(!policy.monitors("ES1"));
        assert!(!policy.monitors("lr6"));
    }
}

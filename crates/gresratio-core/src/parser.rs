//! Policy file parser
//!
//! Two styles are accepted:
//!
//! ```text
//! enable_gres_ratio_plugin = true
//! default_card = V100
//! partition = es1
//! card.V100 = 2.0
//! ```
//!
//! and the sectioned form:
//!
//! ```text
//! [gresratio]
//! enforce_min: True
//! enforce_max: True
//! default_card: A40
//! partition: es1
//!
//! [gresratio.cards]
//! A40 = {min = 2, max = 8, weight = "1"}
//! ```
//!
//! Malformed lines are logged and skipped. Only a file with a
//! `[gresratio.cards]` section but no `[gresratio]` section fails as a whole.
//! Other headers are ignored.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use tracing::{debug, warn};

use crate::error::{ConfigError, ParseWarning, ParseWarningKind};
use crate::policy::{CardRule, Dialect, PolicySet, MAX_FIELD_LEN};

/// Key of the global on/off switch
pub const SWITCH_KEY: &str = "enable_gres_ratio_plugin";
/// Header of the settings section
pub const SETTINGS_HEADER: &str = "[gresratio]";
/// Header of the card records section
pub const CARDS_HEADER: &str = "[gresratio.cards]";

const CARD_PREFIX: &str = "card.";
const DEFAULT_CARD_KEY: &str = "default_card";
const PARTITION_KEY: &str = "partition";

/// A parsed policy together with the lines that were skipped
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPolicy {
    pub policy: PolicySet,
    pub warnings: Vec<ParseWarning>,
}

/// Parse policy text into a [`PolicySet`]. Skipped lines are logged.
pub fn parse_policy(text: &str) -> Result<PolicySet, ConfigError> {
    parse_policy_report(text).map(|parsed| parsed.policy)
}

/// Parse policy text, keeping the warnings for skipped lines
pub fn parse_policy_report(text: &str) -> Result<ParsedPolicy, ConfigError> {
    let mut parser = PolicyParser::new();

    for (index, raw) in text.lines().enumerate() {
        if parser.feed(index + 1, raw).is_break() {
            break;
        }
    }

    parser.finish()
}

/// Where the scanner currently is in a sectioned file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    InSettings,
    InCards,
}

struct PolicyParser {
    policy: PolicySet,
    section: Section,
    saw_cards: bool,
    saw_settings: bool,
    warnings: Vec<ParseWarning>,
}

impl PolicyParser {
    fn new() -> Self {
        Self {
            policy: PolicySet::default(),
            section: Section::Preamble,
            saw_cards: false,
            saw_settings: false,
            warnings: Vec::new(),
        }
    }

    fn feed(&mut self, line_number: usize, raw: &str) -> ControlFlow<()> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return ControlFlow::Continue(());
        }

        if line.starts_with('[') {
            self.enter_section(line);
            return ControlFlow::Continue(());
        }

        let result = match self.section {
            Section::Preamble => self.preamble_line(line),
            Section::InSettings => self.settings_line(line),
            Section::InCards => self.card_record(line),
        };

        match result {
            Ok(flow) => flow,
            Err(kind) => {
                warn!(line = line_number, error = %kind, "Skipping malformed policy line");
                self.warnings.push(ParseWarning {
                    line_number,
                    line: line.to_string(),
                    kind,
                });
                // A switch line that fails to parse still disables the policy
                if self.policy.enabled {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            }
        }
    }

    fn finish(self) -> Result<ParsedPolicy, ConfigError> {
        if self.policy.enabled && self.saw_cards && !self.saw_settings {
            return Err(ConfigError::MissingSection(SETTINGS_HEADER));
        }

        debug!(
            enabled = self.policy.enabled,
            default_card = %self.policy.default_card,
            partition = %self.policy.monitored_partition,
            cards = self.policy.cards.len(),
            warnings = self.warnings.len(),
            "Parsed policy"
        );

        Ok(ParsedPolicy {
            policy: self.policy,
            warnings: self.warnings,
        })
    }

    fn enter_section(&mut self, header: &str) {
        self.section = match header {
            SETTINGS_HEADER => {
                self.saw_settings = true;
                Section::InSettings
            }
            CARDS_HEADER => {
                self.saw_cards = true;
                Section::InCards
            }
            _ => Section::Preamble,
        };
    }

    /// `key = value` lines outside any section
    fn preamble_line(&mut self, line: &str) -> Result<ControlFlow<()>, ParseWarningKind> {
        if line.starts_with(SWITCH_KEY) {
            let value = value_after_equals(line).unwrap_or_default();
            return self.apply_switch(SWITCH_KEY, value);
        }

        if line.starts_with(DEFAULT_CARD_KEY) {
            let value =
                value_after_equals(line).ok_or(ParseWarningKind::MissingValue(DEFAULT_CARD_KEY))?;
            self.policy.default_card = bounded(DEFAULT_CARD_KEY, value)?;
        } else if line.starts_with(PARTITION_KEY) {
            let value =
                value_after_equals(line).ok_or(ParseWarningKind::MissingValue(PARTITION_KEY))?;
            self.policy.monitored_partition = bounded(PARTITION_KEY, value)?;
        } else if line.starts_with(CARD_PREFIX) {
            self.ratio_card(line)?;
        } else {
            debug!(line = line, "Ignoring unrecognized policy line");
        }

        Ok(ControlFlow::Continue(()))
    }

    /// `card.NAME = ratio`
    fn ratio_card(&mut self, line: &str) -> Result<(), ParseWarningKind> {
        if self.policy.dialect() == Some(Dialect::Bounds) {
            return Err(ParseWarningKind::MixedDialect);
        }

        let raw_value =
            value_after_equals(line).ok_or(ParseWarningKind::MissingValue("card ratio"))?;
        let name = card_name(line).ok_or(ParseWarningKind::MissingCardName)?;
        let name = bounded("card name", name)?;
        let ratio = positive("card ratio", raw_value)?;

        self.insert_card(CardRule::ratio(name, ratio));
        Ok(())
    }

    /// `key: value` lines inside `[gresratio]`. Ratio style `card.` lines are
    /// accepted here too.
    fn settings_line(&mut self, line: &str) -> Result<ControlFlow<()>, ParseWarningKind> {
        if line.starts_with(CARD_PREFIX) {
            self.ratio_card(line)?;
            return Ok(ControlFlow::Continue(()));
        }

        let (key, value) = split_setting(line)
            .ok_or_else(|| ParseWarningKind::UnknownSetting(line.to_string()))?;

        match key {
            SWITCH_KEY => return self.apply_switch(SWITCH_KEY, value),
            "enforce_ratio" => self.policy.enforcement.enforce_ratio = boolean(key, value)?,
            "enforce_min" => self.policy.enforcement.enforce_min = boolean(key, value)?,
            "enforce_max" => self.policy.enforcement.enforce_max = boolean(key, value)?,
            "ratio" => self.policy.enforcement.required_ratio = positive("ratio", value)?,
            DEFAULT_CARD_KEY => {
                if value.is_empty() {
                    return Err(ParseWarningKind::MissingValue(DEFAULT_CARD_KEY));
                }
                self.policy.default_card = bounded(DEFAULT_CARD_KEY, value)?;
            }
            PARTITION_KEY => {
                if value.is_empty() {
                    return Err(ParseWarningKind::MissingValue(PARTITION_KEY));
                }
                self.policy.monitored_partition = bounded(PARTITION_KEY, value)?;
            }
            other => return Err(ParseWarningKind::UnknownSetting(other.to_string())),
        }

        Ok(ControlFlow::Continue(()))
    }

    /// `NAME = {min = N, max = M, weight = W}` lines inside `[gresratio.cards]`
    fn card_record(&mut self, line: &str) -> Result<ControlFlow<()>, ParseWarningKind> {
        if self.policy.dialect() == Some(Dialect::Ratio) {
            return Err(ParseWarningKind::MixedDialect);
        }

        let records: BTreeMap<String, CardRecord> = toml::from_str(line)
            .map_err(|e| ParseWarningKind::MalformedCard(e.message().to_string()))?;

        for (name, record) in records {
            let name = bounded("card name", &name)?;
            let weight = match record.weight {
                Weight::Number(w) => w,
                Weight::Text(text) => {
                    text.trim()
                        .parse::<f64>()
                        .map_err(|_| ParseWarningKind::InvalidNumber {
                            field: "weight",
                            value: text.clone(),
                        })?
                }
            };
            if !(weight.is_finite() && weight > 0.0) {
                return Err(ParseWarningKind::NonPositive {
                    field: "weight",
                    value: weight,
                });
            }
            if record.min > record.max {
                return Err(ParseWarningKind::MinExceedsMax {
                    min: record.min,
                    max: record.max,
                });
            }

            self.insert_card(CardRule::bounds(name, record.min, record.max, weight));
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Anything but `true` switches the policy off and stops the scan
    fn apply_switch(
        &mut self,
        key: &str,
        value: &str,
    ) -> Result<ControlFlow<()>, ParseWarningKind> {
        if value.eq_ignore_ascii_case("true") {
            self.policy.enabled = true;
            return Ok(ControlFlow::Continue(()));
        }

        self.policy.enabled = false;
        if value.eq_ignore_ascii_case("false") {
            Ok(ControlFlow::Break(()))
        } else {
            Err(ParseWarningKind::InvalidBoolean {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
    }

    fn insert_card(&mut self, rule: CardRule) {
        let name = rule.name.clone();
        if let Some(previous) = self.policy.cards.insert(rule) {
            warn!(
                card = %name,
                previous = %previous.name,
                "Duplicate card definition, last one wins"
            );
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CardRecord {
    min: u32,
    max: u32,
    weight: Weight,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Weight {
    Number(f64),
    Text(String),
}

/// The `[A-Za-z0-9.]+` token following the first `=` and optional blanks
fn value_after_equals(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once('=')?;
    let rest = rest.trim_start_matches([' ', '\t']);
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.'))
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

/// The `[A-Za-z0-9]+` name following `card.`
fn card_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(CARD_PREFIX)?;
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

/// Split a settings line at the first `:` or `=`. The value is its first
/// whitespace separated word with surrounding quotes removed.
fn split_setting(line: &str) -> Option<(&str, &str)> {
    let at = line.find([':', '='])?;
    let key = line[..at].trim();
    let value = line[at + 1..].split_whitespace().next().unwrap_or_default();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((key, value))
}

fn bounded(field: &'static str, value: &str) -> Result<String, ParseWarningKind> {
    if value.len() > MAX_FIELD_LEN {
        return Err(ParseWarningKind::TooLong {
            field,
            max: MAX_FIELD_LEN,
        });
    }
    Ok(value.to_string())
}

fn boolean(key: &str, value: &str) -> Result<bool, ParseWarningKind> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ParseWarningKind::InvalidBoolean {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn positive(field: &'static str, value: &str) -> Result<f64, ParseWarningKind> {
    let number: f64 = value.parse().map_err(|_| ParseWarningKind::InvalidNumber {
        field,
        value: value.to_string(),
    })?;
    if !(number.is_finite() && number > 0.0) {
        return Err(ParseWarningKind::NonPositive {
            field,
            value: number,
        });
    }
    Ok(number)
}

//! CLI commands implementation

use anyhow::{Context, Result};
use gresratio_admission::Admission;
use gresratio_core::{
    load_policy, parse_descriptor, AdmissionRequest, CardLimits, Decision, Dialect, Outcome,
    ParsedPolicy,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;

/// Policy plus skipped lines, as printed by `show --json`
#[derive(Debug, Serialize)]
struct PolicyReport<'a> {
    path: &'a Path,
    #[serde(flatten)]
    policy: &'a gresratio_core::PolicySet,
    warnings: Vec<String>,
}

/// Check a request and report the decision
pub fn check(admission: &Admission, request: &AdmissionRequest, json: bool) -> Result<ExitCode> {
    let decision = admission
        .check(request)
        .with_context(|| format!("loading policy from {}", admission.policy_path().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print!("{}", render_request(request));
        print!("{}", render_decision(&decision));
    }

    Ok(ExitCode::from(exit_status(&decision)))
}

/// Show the parsed policy and any skipped lines
pub fn show(path: &Path, json: bool) -> Result<ExitCode> {
    let parsed = load_policy(path)?;

    if json {
        let report = PolicyReport {
            path,
            policy: &parsed.policy,
            warnings: parsed.warnings.iter().map(ToString::to_string).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_policy(path, &parsed));
    }

    Ok(ExitCode::SUCCESS)
}

/// Parse a GRES request and print its parts
pub fn parse_gres(gres: &str) -> Result<ExitCode> {
    match parse_descriptor(gres) {
        Ok(descriptor) => {
            println!("Descriptor: {}", descriptor);
            println!(
                "  Card: {}",
                descriptor.card_name.as_deref().unwrap_or("(default)")
            );
            println!("  GPUs: {}", descriptor.gpu_count);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Invalid GRES '{}': {}", gres, e);
            Ok(ExitCode::from(1))
        }
    }
}

fn exit_status(decision: &Decision) -> u8 {
    match decision.outcome {
        Outcome::Accept => 0,
        Outcome::Reject => 1,
    }
}

fn render_request(request: &AdmissionRequest) -> String {
    format!(
        "partition: {}\ngres: {}\nncpu: {}\n",
        request.partition().unwrap_or("(none)"),
        request.gres().unwrap_or("(none)"),
        request.cpu_count
    )
}

fn render_decision(decision: &Decision) -> String {
    let mut out = format!("Result: {} ({})\n", decision.outcome, decision.reason);
    if let Some(card) = &decision.matched_card {
        let _ = writeln!(out, "  Card: {}", card);
    }
    if !decision.message.is_empty() {
        let _ = writeln!(out, "  {}", decision.message);
    }
    out
}

fn render_policy(path: &Path, parsed: &ParsedPolicy) -> String {
    let policy = &parsed.policy;
    let mut out = String::new();

    let _ = writeln!(out, "Policy: {}", path.display());
    let _ = writeln!(out, "  Enabled: {}", policy.enabled);
    let _ = writeln!(out, "  Partition: {}", policy.monitored_partition);
    let _ = writeln!(out, "  Default card: {}", policy.default_card);

    if policy.dialect() == Some(Dialect::Bounds) {
        let enforcement = &policy.enforcement;
        let _ = writeln!(
            out,
            "  Enforce: min={} max={} ratio={} (required {})",
            enforcement.enforce_min,
            enforcement.enforce_max,
            enforcement.enforce_ratio,
            enforcement.required_ratio
        );
    }

    if policy.cards.is_empty() {
        let _ = writeln!(out, "\nNo cards configured");
    } else {
        let _ = writeln!(out, "\n{:<16} {:<8} LIMITS", "CARD", "STYLE");
        for rule in policy.cards.iter() {
            let limits = match &rule.limits {
                CardLimits::Ratio { required_ratio } => format!("{} CPUs/GPU", required_ratio),
                CardLimits::Bounds {
                    min_cpus_per_gpu,
                    max_cpus_per_gpu,
                    weight,
                } => format!(
                    "{}-{} CPUs/GPU, weight {}",
                    min_cpus_per_gpu, max_cpus_per_gpu, weight
                ),
            };
            let _ = writeln!(
                out,
                "{:<16} {:<8} {}",
                rule.name,
                rule.limits.dialect().to_string(),
                limits
            );
        }
    }

    if !parsed.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &parsed.warnings {
            let _ = writeln!(out, "  {}", warning);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gresratio_core::{parse_policy_report, DecisionReason};

    #[test]
    fn test_exit_status() {
        let accept = Decision::accept(DecisionReason::Disabled, "");
        let reject = Decision::reject(DecisionReason::MissingGres, "no gres");

        assert_eq!(exit_status(&accept), 0);
        assert_eq!(exit_status(&reject), 1);
    }

    #[test]
    fn test_render_decision() {
        let decision =
            Decision::reject(DecisionReason::Evaluated, "Bad ratio").with_card("V100");
        let text = render_decision(&decision);

        assert!(text.starts_with("Result: Refused (evaluated)"));
        assert!(text.contains("Card: V100"));
        assert!(text.contains("Bad ratio"));
    }

    #[test]
    fn test_render_request_without_gres() {
        let request = AdmissionRequest::submit(Some("es1"), None, 4);
        let text = render_request(&request);

        assert!(text.contains("partition: es1"));
        assert!(text.contains("gres: (none)"));
        assert!(text.contains("ncpu: 4"));
    }

    #[test]
    fn test_render_policy_lists_cards_and_warnings() {
        let parsed = parse_policy_report("card.V100 = 2\ncard.A40 = -1\n").unwrap();
        let text = render_policy(Path::new("policy.toml"), &parsed);

        assert!(text.contains("Policy: policy.toml"));
        assert!(text.contains("V100"));
        assert!(text.contains("2 CPUs/GPU"));
        assert!(text.contains("Warnings:"));
        assert!(text.contains("line 2:"));
    }

    #[test]
    fn test_render_bounds_policy() {
        let parsed = parse_policy_report(
            "[gresratio]\nenforce_min: True\n\n[gresratio.cards]\nA40 = {min = 2, max = 8, weight = \"1\"}\n",
        )
        .unwrap();
        let text = render_policy(Path::new("policy.toml"), &parsed);

        assert!(text.contains("Enforce: min=true max=false ratio=false"));
        assert!(text.contains("2-8 CPUs/GPU, weight 1"));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_commands_against_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job_submit_ratio_config.toml");
        std::fs::write(&path, "card.V100 = 2\n").unwrap();

        let admission = Admission::new(&path, gresratio_core::ReloadMode::Always);
        let request = AdmissionRequest::submit(Some("es1"), Some("gpu:V100:2"), 4);
        assert!(check(&admission, &request, true).is_ok());
        assert!(show(&path, false).is_ok());
    }

    #[test]
    fn test_missing_policy_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let admission = Admission::new(&path, gresratio_core::ReloadMode::Always);
        let request = AdmissionRequest::submit(Some("es1"), Some("gpu:1"), 2);
        let err = check(&admission, &request, false).unwrap_err();
        assert!(format!("{:#}", err).contains("absent.toml"));
        assert!(show(&path, true).is_err());
    }
}

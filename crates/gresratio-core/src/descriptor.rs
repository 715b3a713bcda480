//! GRES descriptor parsing (`gpu:<name>:<count>` / `gpu:<count>`)

use serde::Serialize;
use std::str::FromStr;

use crate::error::DescriptorError;
use crate::policy::MAX_FIELD_LEN;

const GPU_PREFIX: &str = "gpu:";

/// A parsed GPU resource request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestDescriptor {
    /// Card named in the request; `None` means the policy's default card
    pub card_name: Option<String>,
    /// Requested GPUs, always at least one
    pub gpu_count: u32,
}

impl RequestDescriptor {
    /// The card to evaluate, falling back to `default_card`
    pub fn card_or<'a>(&'a self, default_card: &'a str) -> &'a str {
        self.card_name.as_deref().unwrap_or(default_card)
    }
}

impl std::fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.card_name {
            Some(name) => write!(f, "gpu:{}:{}", name, self.gpu_count),
            None => write!(f, "gpu:{}", self.gpu_count),
        }
    }
}

impl FromStr for RequestDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_descriptor(s)
    }
}

/// Parse a GRES string.
///
/// The named form is tried before the bare count, so `gpu:V100:2` is never
/// read as a bare count of `V100:2`. A count below one is an error rather
/// than being clamped.
pub fn parse_descriptor(s: &str) -> Result<RequestDescriptor, DescriptorError> {
    let descriptor = s.trim();
    let unrecognized = || DescriptorError::Unrecognized(descriptor.to_string());

    let rest = descriptor.strip_prefix(GPU_PREFIX).ok_or_else(unrecognized)?;

    if let Some((name, count)) = rest.split_once(':') {
        if name.is_empty() {
            return Err(unrecognized());
        }
        let gpu_count = parse_count(descriptor, count)?;
        if name.len() > MAX_FIELD_LEN {
            return Err(DescriptorError::NameTooLong {
                descriptor: descriptor.to_string(),
                max: MAX_FIELD_LEN,
            });
        }
        return Ok(RequestDescriptor {
            card_name: Some(name.to_string()),
            gpu_count,
        });
    }

    Ok(RequestDescriptor {
        card_name: None,
        gpu_count: parse_count(descriptor, rest)?,
    })
}

fn parse_count(descriptor: &str, raw: &str) -> Result<u32, DescriptorError> {
    if raw.starts_with('+') {
        return Err(DescriptorError::Unrecognized(descriptor.to_string()));
    }
    let count: i64 = raw
        .parse()
        .map_err(|_| DescriptorError::Unrecognized(descriptor.to_string()))?;

    if count < 1 {
        return Err(DescriptorError::NonPositiveCount {
            descriptor: descriptor.to_string(),
            count,
        });
    }

    u32::try_from(count).map_err(|_| DescriptorError::Unrecognized(descriptor.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_card() {
        let parsed = parse_descriptor("gpu:V100:2").unwrap();
        assert_eq!(parsed.card_name.as_deref(), Some("V100"));
        assert_eq!(parsed.gpu_count, 2);
    }

    #[test]
    fn test_bare_count() {
        let parsed = parse_descriptor("gpu:4").unwrap();
        assert_eq!(parsed.card_name, None);
        assert_eq!(parsed.gpu_count, 4);
        assert_eq!(parsed.card_or("V100"), "V100");
    }

    #[test]
    fn test_named_form_takes_precedence() {
        // A numeric card name must not be mistaken for a bare count
        let parsed = parse_descriptor("gpu:2080ti:3").unwrap();
        assert_eq!(parsed.card_name.as_deref(), Some("2080ti"));
        assert_eq!(parsed.gpu_count, 3);

        let parsed = parse_descriptor("gpu:8:1").unwrap();
        assert_eq!(parsed.card_name.as_deref(), Some("8"));
        assert_eq!(parsed.gpu_count, 1);
    }

    #[test]
    fn test_rejects_malformed() {
        for input in ["gpu:", "cpu:4", "", "gpu", "gpu:V100", "gpu::2", "gpu:V100:", "gpu:V100:x", "gpu:a:b:2", "gpu:2x", "gpu:+4", "gpu:V100:+2"] {
            assert!(
                matches!(parse_descriptor(input), Err(DescriptorError::Unrecognized(_))),
                "expected {:?} to be unrecognized",
                input
            );
        }
    }

    #[test]
    fn test_rejects_non_positive_count() {
        assert_eq!(
            parse_descriptor("gpu:0"),
            Err(DescriptorError::NonPositiveCount {
                descriptor: "gpu:0".to_string(),
                count: 0
            })
        );
        assert!(matches!(
            parse_descriptor("gpu:V100:-1"),
            Err(DescriptorError::NonPositiveCount { count: -1, .. })
        ));
    }

    #[test]
    fn test_rejects_overlong_name() {
        let input = format!("gpu:{}:1", "A".repeat(MAX_FIELD_LEN + 1));
        assert!(matches!(
            parse_descriptor(&input),
            Err(DescriptorError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_trims_and_displays() {
        let parsed: RequestDescriptor = " gpu:A40:1\n".parse().unwrap();
        assert_eq!(parsed.to_string(), "gpu:A40:1");
        assert_eq!(parse_descriptor("gpu:4").unwrap().to_string(), "gpu:4");
    }
}

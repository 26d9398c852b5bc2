//! Schema validation.
//!
//! Checks a resource configuration (`serde_json::Value`) against a [`Schema`]
//! before any API call is made: presence of required attributes, attribute
//! types, nested blocks being objects and the HCP input rules attached to each
//! attribute as [`Validator`]s.
//!
//! # Example
//!
//! ```
//! use hcp_provider::schema::{Attribute, Schema, Validator};
//! use hcp_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("hvn_id", Attribute::required_string().with_validator(Validator::Slug))
//!     .with_attribute(
//!         "cidr_block",
//!         Attribute::optional_string().with_validator(Validator::PrivateCidr),
//!     );
//!
//! let valid = json!({"hvn_id": "main-hvn", "cidr_block": "172.25.16.0/20"});
//! assert!(validate(&schema, &valid).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"hvn_id": "main-hvn", "cidr_block": "8.8.8.0/24"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("cidr_block".to_string()));
//! ```

use std::net::Ipv4Addr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::schema::{Attribute, AttributeType, Block, Diagnostic, Schema, Validator};

const SLUG_PATTERN: &str = r"^[-\da-zA-Z]{3,36}$";

/// Validate a JSON value against a schema.
///
/// An empty list means the value is valid. Computed-only attributes are
/// skipped since the provider sets them.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], but as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether `value` passes [`validate`].
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

impl Validator {
    /// Check a string value. Returns a description of the problem, if any.
    pub fn check(&self, value: &str) -> Option<String> {
        match self {
            Validator::Slug => check_slug(value),
            Validator::PrivateCidr => check_private_cidr(value),
            Validator::OneOf(allowed) => {
                if allowed.iter().any(|a| a == value) {
                    None
                } else {
                    Some(format!(
                        "must be one of [{}], got {:?}",
                        allowed.join(", "),
                        value
                    ))
                }
            },
            Validator::Duration => parse_timeout(value).err().map(|e| e.to_string()),
        }
    }
}

fn slug_pattern() -> Result<&'static Regex, &'static regex::Error> {
    static SLUG: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(SLUG_PATTERN)).as_ref()
}

fn check_slug(value: &str) -> Option<String> {
    match slug_pattern() {
        Ok(re) if re.is_match(value) => None,
        Ok(_) => Some(format!(
            "{:?} must be 3-36 characters of letters, numbers and hyphens",
            value
        )),
        Err(e) => Some(format!("slug pattern failed to compile: {}", e)),
    }
}

const PRIVATE_RANGES: [(Ipv4Addr, u8); 3] = [
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
];

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn check_private_cidr(value: &str) -> Option<String> {
    let Some((addr, prefix)) = value.split_once('/') else {
        return Some(format!("{:?} is not a valid IPv4 CIDR", value));
    };
    let (Ok(addr), Ok(prefix)) = (addr.parse::<Ipv4Addr>(), prefix.parse::<u8>()) else {
        return Some(format!("{:?} is not a valid IPv4 CIDR", value));
    };
    if prefix > 32 {
        return Some(format!("{:?} has an invalid prefix length", value));
    }

    let bits = u32::from(addr);
    if bits & !mask(prefix) != 0 {
        return Some(format!(
            "{:?} has host bits set; use the network address",
            value
        ));
    }

    let inside = PRIVATE_RANGES.iter().any(|(base, range_prefix)| {
        prefix >= *range_prefix && bits & mask(*range_prefix) == u32::from(*base)
    });
    if inside {
        None
    } else {
        Some(format!(
            "{:?} must be within 10.0.0.0/8, 172.16.0.0/12 or 192.168.0.0/16",
            value
        ))
    }
}

/// Error returned by [`parse_timeout`].
#[derive(Debug, thiserror::Error)]
pub enum DurationError {
    /// Not a duration, or too large to represent.
    #[error("invalid duration {input:?}: {source}; expected a value like 45s, 10m or 1h30m")]
    Invalid {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        #[source]
        source: humantime::DurationError,
    },
    /// A zero duration would expire before the first poll.
    #[error("duration {0:?} must be greater than zero")]
    Zero(String),
}

/// Parse a timeout such as `45s`, `10m`, `1h30m` or `1h 30m`.
///
/// Values too large to represent are rejected rather than wrapped.
pub fn parse_timeout(input: &str) -> Result<Duration, DurationError> {
    let timeout = humantime::parse_duration(input).map_err(|source| DurationError::Invalid {
        input: input.to_string(),
        source,
    })?;
    if timeout.is_zero() {
        return Err(DurationError::Zero(input.to_string()));
    }
    Ok(timeout)
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)));
            diagnostics.push(if path.is_empty() {
                diag
            } else {
                diag.with_attribute(path)
            });
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested) in &block.blocks {
        if let Some(v) = obj.get(name) {
            validate_block(nested, v, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            if validate_attribute_type(&attr.attr_type, v, path, diagnostics) {
                if let Some(s) = v.as_str() {
                    for validator in &attr.validators {
                        if let Some(problem) = validator.check(s) {
                            diagnostics.push(
                                Diagnostic::error(format!("Invalid value for '{}'", path))
                                    .with_detail(problem)
                                    .with_attribute(path),
                            );
                        }
                    }
                }
            }
        },
    }
}

/// Returns whether the value had the right type.
fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let (ok, expected) = match attr_type {
        AttributeType::String => (value.is_string(), "string"),
        AttributeType::Int64 => (value.is_u64(), "non-negative integer"),
    };
    if !ok {
        diagnostics.push(
            Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                .with_detail(format!("Expected {}, got {}", expected, value_type_name(value)))
                .with_attribute(path),
        );
    }
    ok
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("hvn_id", Attribute::required_string());

        assert!(validate(&schema, &json!({"hvn_id": "main-hvn"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("hvn_id".to_string()));

        assert_eq!(validate(&schema, &json!({"hvn_id": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"hvn_id": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("self_link", Attribute::computed_string());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"self_link": 123})).is_empty());
    }

    #[test]
    fn test_slug() {
        for ok in ["abc", "main-hvn", "HVN-01", "a".repeat(36).as_str()] {
            assert_eq!(Validator::Slug.check(ok), None, "{}", ok);
        }
        for bad in ["ab", "has_underscore", "has space", "", "a".repeat(37).as_str()] {
            assert!(Validator::Slug.check(bad).is_some(), "{}", bad);
        }
    }

    #[test]
    fn test_private_cidr() {
        for ok in ["10.0.0.0/8", "172.25.16.0/20", "192.168.0.0/24", "10.10.0.0/16"] {
            assert_eq!(Validator::PrivateCidr.check(ok), None, "{}", ok);
        }
        assert!(Validator::PrivateCidr.check("8.8.8.0/24").unwrap().contains("must be within"));
        assert!(Validator::PrivateCidr.check("172.32.0.0/16").is_some());
        assert!(Validator::PrivateCidr.check("10.0.0.0/7").is_some());
        assert!(Validator::PrivateCidr.check("10.0.0.1/16").unwrap().contains("host bits"));
        assert!(Validator::PrivateCidr.check("10.0.0.0/33").is_some());
        assert!(Validator::PrivateCidr.check("10.0.0.0").is_some());
        assert!(Validator::PrivateCidr.check("not-a-cidr/8").is_some());
    }

    #[test]
    fn test_one_of() {
        let validator = Validator::one_of(&["aws", "azure"]);
        assert_eq!(validator.check("aws"), None);
        assert!(validator.check("gcp").unwrap().contains("aws, azure"));
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_timeout("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_timeout("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_timeout("1h 30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_timeout("250ms").unwrap(), Duration::from_millis(250));
        for bad in ["", "10", "m10", "10x", "soon"] {
            assert!(
                matches!(parse_timeout(bad), Err(DurationError::Invalid { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_timeout_rejects_zero() {
        assert!(matches!(parse_timeout("0s"), Err(DurationError::Zero(_))));
        assert!(matches!(parse_timeout("0m 0s"), Err(DurationError::Zero(_))));
    }

    #[test]
    fn test_parse_timeout_rejects_overflow() {
        // Unit multiplication overflows u64 seconds.
        assert!(parse_timeout("5124095576030432h").is_err());
        // Each part fits, the sum does not.
        assert!(parse_timeout("18446744073709551615s1s").is_err());
        assert!(parse_timeout("99999999999999999999999s").is_err());

        assert!(Validator::Duration.check("5124095576030432h").is_some());
        assert!(Validator::Duration.check("18446744073709551615s1s").is_some());
    }

    #[test]
    fn test_validators_run_only_on_well_typed_values() {
        let schema = Schema::v0().with_attribute(
            "hvn_id",
            Attribute::required_string().with_validator(Validator::Slug),
        );

        let diagnostics = validate(&schema, &json!({"hvn_id": "x"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid value"));

        let diagnostics = validate(&schema, &json!({"hvn_id": 7}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_int64_type() {
        let schema = Schema::v0().with_attribute("poll_interval_secs", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"poll_interval_secs": 10})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        for bad in [json!(-1), json!("10"), json!(1.5)] {
            let diagnostics = validate(&schema, &json!({ "poll_interval_secs": bad }));
            assert_eq!(diagnostics.len(), 1, "{}", bad);
            assert!(diagnostics[0].summary.contains("Invalid type"));
        }
    }

    #[test]
    fn test_timeouts_block() {
        let schema = Schema::v0().with_timeouts(&["create", "delete"]);

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"timeouts": {"create": "10m"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"timeouts": {"delete": "soon"}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("timeouts.delete".to_string()));

        for extreme in ["0s", "5124095576030432h", "18446744073709551615s1s"] {
            let diagnostics = validate(&schema, &json!({"timeouts": {"create": extreme}}));
            assert_eq!(diagnostics.len(), 1, "{}", extreme);
            assert_eq!(diagnostics[0].attribute, Some("timeouts.create".to_string()));
        }
    }

    #[test]
    fn test_nested_block_must_be_object() {
        let schema = Schema::v0().with_timeouts(&["create"]);

        assert!(validate(&schema, &json!({"timeouts": null})).is_empty());

        let diagnostics = validate(&schema, &json!({"timeouts": ["10m"]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert_eq!(diagnostics[0].attribute, Some("timeouts".to_string()));
    }

    #[test]
    fn test_root_not_object() {
        let schema = Schema::v0().with_attribute("hvn_id", Attribute::required_string());
        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert!(!is_valid(&schema, &json!({})));
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }
}

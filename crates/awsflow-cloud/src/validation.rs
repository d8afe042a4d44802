//! Schema-declared validators and config validation
//!
//! Everything here runs before any network call. Failures come back as
//! diagnostics carrying the attribute path.

use crate::diagnostics::Diagnostics;
use crate::schema::{Block, BlockValidator, Schema, parse_duration};
use crate::value::State;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static ACCOUNT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("account id pattern"));
static PARTITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^aws(-[a-z]+)*$").expect("partition pattern"));
static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$").expect("region pattern"));

#[derive(Debug, Clone)]
pub enum Validator {
    /// String length (in characters) within `min..=max`
    StringLenBetween(usize, usize),
    /// String matches the pattern; the message is reported otherwise
    RegexMatches(Regex, String),
    StringInSlice(Vec<String>),
    /// The string itself compiles as a regular expression
    IsValidRegex,
    ValidArn,
    ValidAccountId,
    ListSizeAtLeast(usize),
    /// A duration string such as `30m` or `1h30m`
    Duration,
    /// Applies the inner validator to every list element
    Each(Box<Validator>),
    /// Passes when any inner validator passes
    Any(Vec<Validator>),
    /// Passes when every inner validator passes
    All(Vec<Validator>),
}

impl Validator {
    /// Builds a [`Validator::RegexMatches`]; the pattern is a compile-time constant
    pub fn regex_matches(pattern: &str, message: &str) -> Self {
        let regex = Regex::new(pattern).expect("static validator pattern");
        Validator::RegexMatches(regex, message.to_string())
    }

    pub fn one_of(values: &[&str]) -> Self {
        Validator::StringInSlice(values.iter().map(|v| v.to_string()).collect())
    }

    /// Checks a non-null value
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            Validator::StringLenBetween(min, max) => {
                let s = expect_str(value)?;
                let len = s.chars().count();
                if len < *min || len > *max {
                    return Err(format!(
                        "expected length to be in the range ({} - {}), got {}",
                        min, max, len
                    ));
                }
                Ok(())
            }
            Validator::RegexMatches(regex, message) => {
                let s = expect_str(value)?;
                if regex.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("invalid value {:?}: {}", s, message))
                }
            }
            Validator::StringInSlice(values) => {
                let s = expect_str(value)?;
                if values.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(format!("expected to be one of {:?}, got {}", values, s))
                }
            }
            Validator::IsValidRegex => {
                let s = expect_str(value)?;
                Regex::new(s)
                    .map(|_| ())
                    .map_err(|e| format!("{:?} is not a valid regular expression: {}", s, e))
            }
            Validator::ValidArn => validate_arn(expect_str(value)?),
            Validator::ValidAccountId => {
                let s = expect_str(value)?;
                if ACCOUNT_ID.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("{:?} doesn't look like AWS Account ID (exactly 12 digits)", s))
                }
            }
            Validator::ListSizeAtLeast(min) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| "expected a list".to_string())?;
                if items.len() < *min {
                    return Err(format!(
                        "list must contain at least {} elements, got {}",
                        min,
                        items.len()
                    ));
                }
                Ok(())
            }
            Validator::Duration => parse_duration(expect_str(value)?)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Validator::Each(inner) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| "expected a list".to_string())?;
                items.iter().try_for_each(|item| inner.validate(item))
            }
            Validator::Any(validators) => {
                let mut failures = Vec::new();
                for validator in validators {
                    match validator.validate(value) {
                        Ok(()) => return Ok(()),
                        Err(e) => failures.push(e),
                    }
                }
                Err(failures.join("; "))
            }
            Validator::All(validators) => {
                for validator in validators {
                    validator.validate(value)?;
                }
                Ok(())
            }
        }
    }
}

fn expect_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {}", value))
}

/// `arn:partition:service:region:account-id:resource`
fn validate_arn(s: &str) -> Result<(), String> {
    let parts: Vec<&str> = s.splitn(6, ':').collect();
    if parts.len() != 6 || parts[0] != "arn" {
        return Err(format!("{:?} is an invalid ARN", s));
    }
    let (partition, service, region, account, resource) =
        (parts[1], parts[2], parts[3], parts[4], parts[5]);

    if !PARTITION.is_match(partition) {
        return Err(format!("{:?} is an invalid ARN: invalid partition value", s));
    }
    if service.is_empty() {
        return Err(format!("{:?} is an invalid ARN: missing service", s));
    }
    if !region.is_empty() && !REGION.is_match(region) {
        return Err(format!("{:?} is an invalid ARN: invalid region value", s));
    }
    if !account.is_empty() && account != "aws" && !ACCOUNT_ID.is_match(account) {
        return Err(format!("{:?} is an invalid ARN: invalid account ID value", s));
    }
    if resource.is_empty() {
        return Err(format!("{:?} is an invalid ARN: missing resource", s));
    }
    Ok(())
}

/// Validates a config record against `schema`
pub fn validate_config(schema: &Schema, config: &State) -> Diagnostics {
    let mut diags = Diagnostics::new();
    validate_block(&schema.block, config, "", &mut diags);
    diags
}

fn validate_block(block: &Block, config: &State, prefix: &str, diags: &mut Diagnostics) {
    let path = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };

    for key in config.keys() {
        if !block.attributes.contains_key(key) && !block.blocks.contains_key(key) {
            diags.error(
                Some(&path(key)),
                "Unsupported argument",
                format!("An argument named {:?} is not expected here", key),
            );
        }
    }

    for (name, attribute) in &block.attributes {
        let attr_path = path(name);
        let value = config.get(name).unwrap_or(&Value::Null);

        if value.is_null() {
            if attribute.required {
                diags.error(
                    Some(&attr_path),
                    "Missing required argument",
                    format!("The argument {:?} is required, but no definition was found", name),
                );
            }
            continue;
        }

        if attribute.is_computed_only() {
            diags.error(
                Some(&attr_path),
                "Invalid configuration",
                format!("{:?} is computed and cannot be set in configuration", name),
            );
            continue;
        }

        if !attribute.kind.accepts(value) {
            diags.error(
                Some(&attr_path),
                "Incorrect attribute value type",
                format!("expected {}", attribute.kind),
            );
            continue;
        }

        for validator in &attribute.validators {
            if let Err(detail) = validator.validate(value) {
                diags.error(Some(&attr_path), "Invalid attribute value", detail);
            }
        }
    }

    for (name, nested) in &block.blocks {
        let block_path = path(name);
        let Some(value) = config.get(name).filter(|v| !v.is_null()) else {
            continue;
        };

        let Some(nested_config) = value.as_object() else {
            diags.error(Some(&block_path), "Invalid block", "expected a single block");
            continue;
        };

        if nested.is_computed_only() && !nested_config.is_empty() {
            diags.error(
                Some(&block_path),
                "Invalid configuration",
                format!("block {:?} is computed and cannot be set in configuration", name),
            );
            continue;
        }

        for validator in &nested.validators {
            match validator {
                BlockValidator::ConflictsWith(other) => {
                    if config.get(other).is_some_and(|v| !v.is_null()) {
                        diags.error(
                            Some(&block_path),
                            "Invalid attribute combination",
                            format!("{:?} cannot be specified when {:?} is specified", name, other),
                        );
                    }
                }
            }
        }

        validate_block(nested, nested_config, &block_path, diags);
    }
}

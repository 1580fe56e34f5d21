//! Field validation from schema rules.
//!
//! Rules use the comma-separated syntax of go-playground/validator tags, e.g. `required,min=4,max=20`.

use crate::value::{parse_timestamp, Row, Value};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Failures per field. Empty means the input is valid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. The first failure reported for a field is kept.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, message) in other.0 {
            self.insert(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when empty, so batches compose with `?`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} {}", field, message)?;
        }
        Ok(())
    }
}

/// Checks values against named rules.
pub trait Validator: Send + Sync {
    /// Check one value against one rule string. The error describes the failure without the field name.
    fn validate_one(&self, value: &Value, rule: &str) -> Result<(), String>;

    /// Check every field with a rule; fields absent from `values` are checked as null.
    fn validate_batch(&self, values: &Row, rules: &BTreeMap<String, String>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (field, rule) in rules {
            let value = values.get(field).unwrap_or(&Value::Null);
            if let Err(message) = self.validate_one(value, rule) {
                errors.insert(field.clone(), message);
            }
        }
        errors
    }
}

/// Accepts everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate_one(&self, _value: &Value, _rule: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Built-in rule set.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleValidator;

impl Validator for RuleValidator {
    fn validate_one(&self, value: &Value, rule: &str) -> Result<(), String> {
        let rules = rule.split(',').map(str::trim).filter(|r| !r.is_empty());
        for r in rules {
            let (name, param) = match r.split_once('=') {
                Some((n, p)) => (n, Some(p)),
                None => (r, None),
            };
            match name {
                "required" => {
                    if is_empty(value) {
                        return Err("is required".to_string());
                    }
                }
                "omitempty" => {
                    if is_empty(value) {
                        return Ok(());
                    }
                }
                _ if value.is_null() => {}
                _ => check(name, param, value)?,
            }
        }
        Ok(())
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Text(s) => s.is_empty(),
        _ => false,
    }
}

fn check(name: &str, param: Option<&str>, v: &Value) -> Result<(), String> {
    match name {
        "min" | "max" | "len" | "gt" | "gte" | "lt" | "lte" => {
            let bound = number_param(name, param)?;
            let (measured, unit) = measure(v).ok_or_else(|| format!("can not be compared with {}", name))?;
            let ok = match name {
                "min" | "gte" => measured >= bound,
                "max" | "lte" => measured <= bound,
                "len" => measured == bound,
                "gt" => measured > bound,
                _ => measured < bound,
            };
            if ok {
                Ok(())
            } else {
                Err(format!("must {} {}{}", comparison(name), bound, unit))
            }
        }
        "positive" => match numeric(v) {
            Some(n) if n > 0.0 => Ok(()),
            _ => Err("must be a positive number".to_string()),
        },
        "numeric" => numeric(v).map(|_| ()).ok_or_else(|| "must be numeric".to_string()),
        "uuid" => text(v)
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(|_| ())
            .ok_or_else(|| "must be a valid UUID".to_string()),
        "uuid4" => text(v)
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .filter(|u| u.get_version_num() == 4)
            .map(|_| ())
            .ok_or_else(|| "must be a valid version 4 UUID".to_string()),
        "email" => match text(v) {
            Some(s) if email_regex().map(|re| re.is_match(s)).unwrap_or(false) => Ok(()),
            _ => Err("must be a valid email".to_string()),
        },
        "datetime" | "rfc3339" => match v {
            Value::Timestamp(_) => Ok(()),
            Value::Text(s) if parse_timestamp(s).is_some() => Ok(()),
            _ => Err("must be a valid datetime".to_string()),
        },
        "alphanum" => match text(v) {
            Some(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()) => Ok(()),
            _ => Err("must contain only letters and digits".to_string()),
        },
        "oneof" => {
            let allowed: Vec<&str> = param.unwrap_or_default().split_whitespace().collect();
            let actual = v.canonical_text().unwrap_or_default();
            if allowed.contains(&actual.as_str()) {
                Ok(())
            } else {
                Err(format!("must be one of [{}]", allowed.join(" ")))
            }
        }
        "boolean" => match v {
            Value::Bool(_) => Ok(()),
            Value::Text(s) if parse_bool_text(s) => Ok(()),
            _ => Err("must be a boolean".to_string()),
        },
        other => Err(format!("has unknown validation rule '{}'", other)),
    }
}

fn number_param(name: &str, param: Option<&str>) -> Result<f64, String> {
    param
        .and_then(|p| p.trim().parse::<f64>().ok())
        .ok_or_else(|| format!("has invalid parameter for rule '{}'", name))
}

/// Character count for text, the value itself for numbers.
fn measure(v: &Value) -> Option<(f64, &'static str)> {
    match v {
        Value::Text(s) => Some((s.chars().count() as f64, " characters")),
        Value::Int(_) | Value::Float(_) => v.as_f64().map(|n| (n, "")),
        _ => None,
    }
}

fn comparison(name: &str) -> &'static str {
    match name {
        "min" | "gte" => "be at least",
        "max" | "lte" => "be at most",
        "len" => "have length",
        "gt" => "be greater than",
        _ => "be less than",
    }
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => v.as_f64(),
    }
}

fn text(v: &Value) -> Option<&str> {
    v.as_str()
}

fn parse_bool_text(s: &str) -> bool {
    matches!(
        s,
        "1" | "t" | "T" | "TRUE" | "true" | "True" | "0" | "f" | "F" | "FALSE" | "false" | "False"
    )
}

fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(v: impl Into<Value>, rule: &str) -> bool {
        RuleValidator.validate_one(&v.into(), rule).is_ok()
    }

    #[test]
    fn required_rejects_null_and_empty_text() {
        assert!(RuleValidator.validate_one(&Value::Null, "required").is_err());
        assert!(!ok("", "required"));
        assert!(ok("x", "required"));
        assert!(ok(0i64, "required"));
    }

    #[test]
    fn other_rules_pass_on_null() {
        assert!(RuleValidator.validate_one(&Value::Null, "min=4,uuid4,email").is_ok());
    }

    #[test]
    fn omitempty_skips_remaining_rules() {
        assert!(ok("", "omitempty,email"));
        assert!(!ok("nope", "omitempty,email"));
    }

    #[test]
    fn length_rules_count_characters() {
        assert!(!ok("Jo", "required,min=4,max=20"));
        assert!(ok("Fulano", "required,min=4,max=20"));
        assert!(ok("ção!", "len=4"));
        assert_eq!(
            RuleValidator.validate_one(&Value::from("Jo"), "min=4"),
            Err("must be at least 4 characters".to_string())
        );
    }

    #[test]
    fn numeric_bounds_use_the_value() {
        assert!(ok(5i64, "gt=4,lte=5"));
        assert!(!ok(4i64, "gt=4"));
        assert!(ok(2.5f64, "min=2,max=3"));
        assert!(!ok(true, "min=1"));
    }

    #[test]
    fn positive_and_numeric_parse_text() {
        assert!(ok("3", "positive"));
        assert!(!ok("-3", "positive"));
        assert!(!ok(0i64, "positive"));
        assert!(ok("1.5e3", "numeric"));
        assert!(!ok("abc", "numeric"));
    }

    #[test]
    fn format_rules() {
        let v4 = uuid::Uuid::new_v4().to_string();
        assert!(ok(v4.as_str(), "uuid4"));
        assert!(ok(v4.as_str(), "uuid"));
        assert!(!ok("a8a2c38f-4b8e-11ee-be56-0242ac120002", "uuid4"));
        assert!(ok("a8a2c38f-4b8e-11ee-be56-0242ac120002", "uuid"));
        assert!(!ok(7i64, "uuid"));
        assert!(ok("fulano@example.com", "email"));
        assert!(!ok("fulano@", "email"));
        assert!(ok("2023-01-02T03:04:05Z", "datetime"));
        assert!(!ok("tomorrow", "rfc3339"));
        assert!(ok("abc123", "alphanum"));
        assert!(!ok("abc-123", "alphanum"));
        assert!(ok("red", "oneof=red green"));
        assert!(ok(2i64, "oneof=1 2 3"));
        assert!(!ok("blue", "oneof=red green"));
        assert!(ok("T", "boolean"));
        assert!(ok(false, "boolean"));
        assert!(!ok("yes", "boolean"));
    }

    #[test]
    fn unknown_rule_is_a_failure_naming_it() {
        let err = RuleValidator.validate_one(&Value::from("x"), "iban").unwrap_err();
        assert!(err.contains("iban"));
        assert!(RuleValidator.validate_one(&Value::from("x"), "min=abc").is_err());
    }

    #[test]
    fn batch_aggregates_and_treats_absent_as_null() {
        let mut rules = BTreeMap::new();
        rules.insert("first_name".to_string(), "required,min=4".to_string());
        rules.insert("email".to_string(), "required,email".to_string());
        rules.insert("phone".to_string(), "numeric".to_string());
        let mut row = Row::new();
        row.insert("first_name".into(), Value::from("Jo"));
        let errors = RuleValidator.validate_batch(&row, &rules);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("email"), Some("is required"));
        assert_eq!(errors.to_string(), "email is required; first_name must be at least 4 characters");
        assert!(NoopValidator.validate_batch(&row, &rules).is_empty());
    }

    #[test]
    fn first_error_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.insert("a", "first");
        errors.insert("a", "second");
        let mut other = ValidationErrors::new();
        other.insert("b", "x");
        errors.merge(other);
        assert_eq!(errors.get("a"), Some("first"));
        assert_eq!(errors.len(), 2);
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}

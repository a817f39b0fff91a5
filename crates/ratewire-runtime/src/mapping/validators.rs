//! Field validators
//!
//! Validators run on written values and only ever produce warnings.

use super::{FieldWarning, WarningCode};
use crate::expression::builtins::parse_date;
use chrono::NaiveDate;
use ratewire_core::ast::ValidatorSpec;
use ratewire_core::Value;
use regex::Regex;
use std::sync::OnceLock;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

/// Run every validator against a written value.
///
/// A null value is only checked by `required`; the other validators skip it.
pub fn validate_field(field: &str, value: &Value, validators: &[ValidatorSpec]) -> Vec<FieldWarning> {
    validators
        .iter()
        .filter_map(|spec| check(spec, value).map(|(code, message)| FieldWarning::new(field, code, message)))
        .collect()
}

fn check(spec: &ValidatorSpec, value: &Value) -> Option<(WarningCode, String)> {
    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    };
    if let ValidatorSpec::Required = spec {
        return empty.then(|| (WarningCode::ValueRequired, "value is required".to_string()));
    }
    if value.is_null() {
        return None;
    }

    let text = value.to_display_string();
    match spec {
        ValidatorSpec::Required => None,
        ValidatorSpec::Min(min) => match value.to_number() {
            None => Some(not_numeric(&text)),
            Some(n) if n < *min => Some((WarningCode::MinValue, format!("{} is below {}", text, Value::Number(*min)))),
            Some(_) => None,
        },
        ValidatorSpec::Max(max) => match value.to_number() {
            None => Some(not_numeric(&text)),
            Some(n) if n > *max => Some((WarningCode::MaxValue, format!("{} is above {}", text, Value::Number(*max)))),
            Some(_) => None,
        },
        ValidatorSpec::MinLength(min) => {
            let len = length(value);
            (len < *min).then(|| (WarningCode::MinLength, format!("length {} is below {}", len, min)))
        }
        ValidatorSpec::MaxLength(max) => {
            let len = length(value);
            (len > *max).then(|| (WarningCode::MaxLength, format!("length {} is above {}", len, max)))
        }
        ValidatorSpec::Pattern(pattern) => match Regex::new(pattern) {
            Err(e) => Some((WarningCode::InvalidPattern, format!("invalid pattern '{}': {}", pattern, e))),
            Ok(re) if !re.is_match(&text) => Some((
                WarningCode::PatternMismatch,
                format!("'{}' does not match '{}'", text, pattern),
            )),
            Ok(_) => None,
        },
        ValidatorSpec::Email => match email_regex() {
            Some(re) if re.is_match(&text) => None,
            _ => Some((WarningCode::InvalidEmail, format!("'{}' is not an email address", text))),
        },
        ValidatorSpec::Date(format) => {
            let parsed = match format {
                Some(format) => NaiveDate::parse_from_str(&text, format).is_ok(),
                None => parse_date(&text).is_some(),
            };
            (!parsed).then(|| (WarningCode::InvalidDate, format!("'{}' is not a valid date", text)))
        }
        ValidatorSpec::Numeric => value.to_number().is_none().then(|| not_numeric(&text)),
        ValidatorSpec::OneOf(allowed) => (!allowed.iter().any(|a| a == &text)).then(|| {
            (
                WarningCode::NotAllowed,
                format!("'{}' is not one of {}", text, allowed.join(", ")),
            )
        }),
        ValidatorSpec::Unknown(raw) => Some((
            WarningCode::UnknownValidator,
            format!("unknown validator '{}'", raw),
        )),
    }
}

fn not_numeric(text: &str) -> (WarningCode, String) {
    (WarningCode::NotNumeric, format!("'{}' is not numeric", text))
}

fn length(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => other.to_display_string().chars().count(),
    }
}

//! `format` transformation: dates, currency, numbers, phone numbers and
//! `{placeholder}` templates

use crate::expression::builtins::{parse_date, round_to};
use chrono::{NaiveDate, NaiveDateTime};
use ratewire_core::ast::FormatKind;
use ratewire_core::path::lookup;
use ratewire_core::Value;
use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

const DEFAULT_DATE_PATTERN: &str = "%Y-%m-%d";
const FALLBACK_DATE_PATTERNS: &[&str] = &["%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Parameters of a `format` transformation
#[derive(Debug, Clone, Copy)]
pub struct FormatSpec<'a> {
    pub kind: FormatKind,
    pub pattern: Option<&'a str>,
    pub input_pattern: Option<&'a str>,
    pub decimals: Option<u32>,
    pub currency_symbol: Option<&'a str>,
}

/// Format `value`; `source` feeds `{path}` placeholders of custom templates
pub fn format_value(spec: &FormatSpec<'_>, value: &Value, source: &Value) -> Result<Value, String> {
    match spec.kind {
        FormatKind::Date => format_date(spec, value),
        FormatKind::Currency => {
            let amount = number(value)?;
            let decimals = spec.decimals.unwrap_or(2);
            let symbol = spec.currency_symbol.unwrap_or("$");
            Ok(Value::String(currency(amount, decimals, symbol)))
        }
        FormatKind::Number => {
            let n = number(value)?;
            Ok(Value::Number(match spec.decimals {
                Some(decimals) => round_to(n, decimals),
                None => n,
            }))
        }
        FormatKind::Phone => phone(&value.to_display_string(), spec.pattern).map(Value::String),
        FormatKind::Custom => {
            let template = spec
                .pattern
                .ok_or_else(|| "custom format needs a pattern".to_string())?;
            template_fill(template, value, source).map(Value::String)
        }
    }
}

fn number(value: &Value) -> Result<f64, String> {
    value
        .to_number()
        .ok_or_else(|| format!("'{}' is not a number", value))
}

fn format_date(spec: &FormatSpec<'_>, value: &Value) -> Result<Value, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("date input must be a string, got {}", value.type_name()))?;
    let date = parse_input_date(text, spec.input_pattern)
        .ok_or_else(|| format!("cannot parse '{}' as a date", text))?;

    let pattern = spec.pattern.unwrap_or(DEFAULT_DATE_PATTERN);
    let mut out = String::new();
    write!(out, "{}", date.format(pattern))
        .map_err(|_| format!("invalid date pattern '{}'", pattern))?;
    Ok(Value::String(out))
}

fn parse_input_date(text: &str, input_pattern: Option<&str>) -> Option<NaiveDate> {
    let text = text.trim();
    if let Some(pattern) = input_pattern {
        return NaiveDate::parse_from_str(text, pattern)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(text, pattern).ok().map(|dt| dt.date()));
    }
    parse_date(text).or_else(|| {
        FALLBACK_DATE_PATTERNS
            .iter()
            .find_map(|p| NaiveDate::parse_from_str(text, p).ok())
    })
}

fn currency(amount: f64, decimals: u32, symbol: &str) -> String {
    let rounded = round_to(amount.abs(), decimals);
    let fixed = format!("{:.*}", decimals as usize, rounded);
    let (whole, fraction) = match fixed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && rounded != 0.0 { "-" } else { "" };
    match fraction {
        Some(fraction) => format!("{}{}{}.{}", sign, symbol, grouped, fraction),
        None => format!("{}{}{}", sign, symbol, grouped),
    }
}

fn phone(text: &str, pattern: Option<&str>) -> Result<String, String> {
    let digits: Vec<char> = text.chars().filter(|c| c.is_ascii_digit()).collect();

    if let Some(pattern) = pattern {
        let slots = pattern.chars().filter(|c| *c == '#').count();
        if slots != digits.len() {
            return Err(format!(
                "phone '{}' has {} digits, pattern '{}' needs {}",
                text,
                digits.len(),
                pattern,
                slots
            ));
        }
        let mut digits = digits.into_iter();
        return Ok(pattern
            .chars()
            .map(|c| if c == '#' { digits.next().unwrap_or('#') } else { c })
            .collect());
    }

    let s: String = digits.iter().collect();
    match s.len() {
        10 => Ok(format!("({}) {}-{}", &s[..3], &s[3..6], &s[6..])),
        11 if s.starts_with('1') => Ok(format!("+1 ({}) {}-{}", &s[1..4], &s[4..7], &s[7..])),
        n => Err(format!("phone '{}' has {} digits", text, n)),
    }
}

fn placeholder() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\s*([^{}]+?)\s*\}").ok())
        .as_ref()
}

/// Fill `{value}` with the field value and `{some.path}` from the source
fn template_fill(template: &str, value: &Value, source: &Value) -> Result<String, String> {
    let re = placeholder().ok_or_else(|| "template engine unavailable".to_string())?;
    let filled = re.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        if name == "value" {
            value.to_display_string()
        } else {
            lookup(source, name)
                .map(Value::to_display_string)
                .unwrap_or_default()
        }
    });
    Ok(filled.into_owned())
}

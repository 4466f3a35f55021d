pub mod drive;
pub mod enrollment;
pub mod student;
pub mod user;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

// Documents arrive from spreadsheets and older clients where numeric fields are
// sometimes strings and vice versa. These helpers accept either shape.

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string_or_number(deserializer)?.unwrap_or_default())
}

pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

pub(crate) fn opt_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => Ok(parse_leading_f64(&s)),
        other => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

/// For partial updates: an absent field stays `None`, while an explicit `null` (or a
/// blank string) becomes `Some(None)` and clears the stored value.
pub(crate) fn nullable_number<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    opt_number_or_string(deserializer).map(Some)
}

/// Counts such as backlogs: the leading integer of a string, a truncated float, or 0
/// when neither parses. Negative values clamp to 0.
pub(crate) fn opt_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_leading_int(&s),
        Value::Bool(b) => Some(i64::from(b)),
        other => return Err(de::Error::custom(format!("expected a count, got {other}"))),
    };
    Ok(Some(
        raw.map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
            .unwrap_or(0),
    ))
}

pub(crate) fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_count(deserializer)?.unwrap_or_default())
}

/// Accepts an array of strings/numbers, a comma separated string, or null.
pub(crate) fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string_list(deserializer)?.unwrap_or_default())
}

pub(crate) fn opt_string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => split_list(&s),
        Value::Number(n) => vec![n.to_string()],
        other => {
            return Err(de::Error::custom(format!(
                "expected a list of strings, got {other}"
            )))
        }
    };
    Ok(Some(items))
}

/// Free-text profile fields: lists are joined so the stored value stays a string.
pub(crate) fn opt_text_or_list<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Array(items) => Ok(Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        )),
        other => Ok(Some(other.to_string())),
    }
}

pub(crate) fn text_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_text_or_list(deserializer)?.unwrap_or_default())
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the leading decimal number of a string ("8.5/10" -> 8.5).
/// Returns `None` when the string does not start with a number.
pub fn parse_leading_f64(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    s[..end].parse().ok()
}

/// Parses the leading integer of a string ("4th" -> 4).
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

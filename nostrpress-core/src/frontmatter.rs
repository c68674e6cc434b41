//! Front-matter parsing and serialization.
//!
//! Two dialects are understood: YAML between `---` lines and TOML between
//! `+++` lines. A file with neither is [`Format::Plain`] and has empty
//! metadata. Metadata is always surfaced as a JSON-shaped [`Metadata`] map so
//! callers never care which dialect a document uses.
//!
//! TOML datetimes become strings on read, and the key path of each one is
//! recorded in [`Parsed::datetimes`]. On write those paths, plus the top-level
//! keys in [`TOML_DATE_KEYS`], are emitted as TOML datetimes again whenever the
//! string still parses as one, so `updated = 2024-01-02T08:00:00Z` survives a
//! round-trip unquoted.

use serde_json::Value;

use crate::error::FrontMatterError;
use crate::types::{DatetimePaths, Format, Metadata};

const YAML_DELIM: &str = "---";
const TOML_DELIM: &str = "+++";

/// Top-level keys emitted as TOML datetimes when their value parses as one,
/// even if they were not datetimes when read.
pub const TOML_DATE_KEYS: [&str; 4] = ["date", "lastmod", "publishDate", "expiryDate"];

/// Parsed form of a raw document.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub metadata: Metadata,
    pub body: String,
    pub format: Format,
    /// TOML only: where the datetimes were.
    pub datetimes: DatetimePaths,
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// Split `raw` into metadata, body and dialect.
///
/// Line endings are normalized to `\n` and a leading BOM is dropped. The body
/// is everything after the closing delimiter line, untouched.
pub fn parse_document(raw: &str) -> Result<Parsed, FrontMatterError> {
    let normalized = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    let (delimiter, format) = match first_line(&normalized) {
        YAML_DELIM => (YAML_DELIM, Format::Yaml),
        TOML_DELIM => (TOML_DELIM, Format::Toml),
        _ => {
            return Ok(Parsed {
                metadata: Metadata::new(),
                body: normalized,
                format: Format::Plain,
                datetimes: DatetimePaths::new(),
            })
        }
    };

    let (front, body) = split_block(&normalized, delimiter)?;
    let (metadata, datetimes) = match format {
        Format::Yaml => (parse_yaml(front)?, DatetimePaths::new()),
        Format::Toml => parse_toml(front)?,
        Format::Plain => (Metadata::new(), DatetimePaths::new()),
    };

    Ok(Parsed {
        metadata,
        body: body.to_owned(),
        format,
        datetimes,
    })
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("").trim_end()
}

/// Returns `(front matter text, body)` for a document whose first line is `delimiter`.
fn split_block<'a>(
    s: &'a str,
    delimiter: &'static str,
) -> Result<(&'a str, &'a str), FrontMatterError> {
    let after_open = s.find('\n').map(|i| i + 1).unwrap_or(s.len());
    let rest = &s[after_open..];

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == delimiter {
            let front = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((front, body));
        }
        offset += line.len();
    }
    Err(FrontMatterError::Unterminated { delimiter })
}

fn parse_yaml(front: &str) -> Result<Metadata, FrontMatterError> {
    if front.trim().is_empty() {
        return Ok(Metadata::new());
    }
    match serde_yaml::from_str::<Value>(front)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Metadata::new()),
        _ => Err(FrontMatterError::NotAMapping),
    }
}

fn parse_toml(front: &str) -> Result<(Metadata, DatetimePaths), FrontMatterError> {
    let table: toml::Table = toml::from_str(front)?;
    let mut datetimes = DatetimePaths::new();
    let mut path = Vec::new();
    let metadata = table
        .into_iter()
        .map(|(k, v)| {
            let value = nested_to_json(&mut path, k.clone(), v, &mut datetimes);
            (k, value)
        })
        .collect();
    Ok((metadata, datetimes))
}

fn nested_to_json(
    path: &mut Vec<String>,
    segment: String,
    value: toml::Value,
    datetimes: &mut DatetimePaths,
) -> Value {
    path.push(segment);
    let json = toml_to_json(value, path, datetimes);
    path.pop();
    json
}

fn toml_to_json(value: toml::Value, path: &mut Vec<String>, datetimes: &mut DatetimePaths) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => {
            datetimes.insert(path.clone());
            Value::String(dt.to_string())
        }
        toml::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| nested_to_json(path, i.to_string(), v, datetimes))
                .collect(),
        ),
        toml::Value::Table(t) => Value::Object(
            t.into_iter()
                .map(|(k, v)| {
                    let value = nested_to_json(path, k.clone(), v, datetimes);
                    (k, value)
                })
                .collect(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Serialize
// ---------------------------------------------------------------------------

/// Render `metadata` + `body` in `format`.
///
/// A [`Format::Plain`] document that has gained metadata is written with YAML
/// front matter; with empty metadata it is written back as the bare body.
/// `datetimes` only matters for TOML.
pub fn serialize_document(
    metadata: &Metadata,
    body: &str,
    format: Format,
    datetimes: &DatetimePaths,
) -> Result<String, FrontMatterError> {
    match format {
        Format::Toml => {
            let table = json_to_toml_table(metadata, datetimes);
            let front = toml::to_string(&table)?;
            Ok(wrap(TOML_DELIM, &front, body))
        }
        Format::Plain if metadata.is_empty() => Ok(body.to_owned()),
        Format::Yaml | Format::Plain => {
            let front = if metadata.is_empty() {
                String::new()
            } else {
                serde_yaml::to_string(metadata)?
            };
            Ok(wrap(YAML_DELIM, &front, body))
        }
    }
}

/// The dialect a document is written back in once it carries metadata.
pub fn effective_format(metadata: &Metadata, format: Format) -> Format {
    match format {
        Format::Plain if !metadata.is_empty() => Format::Yaml,
        other => other,
    }
}

fn wrap(delimiter: &str, front: &str, body: &str) -> String {
    let mut out = String::with_capacity(front.len() + body.len() + 8);
    out.push_str(delimiter);
    out.push('\n');
    out.push_str(front);
    if !front.is_empty() && !front.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(delimiter);
    out.push('\n');
    out.push_str(body);
    out
}

fn json_to_toml_table(metadata: &Metadata, datetimes: &DatetimePaths) -> toml::Table {
    let mut path = Vec::new();
    metadata
        .iter()
        .filter_map(|(k, v)| {
            nested_to_toml(&mut path, k.clone(), v, datetimes).map(|tv| (k.clone(), tv))
        })
        .collect()
}

fn nested_to_toml(
    path: &mut Vec<String>,
    segment: String,
    value: &Value,
    datetimes: &DatetimePaths,
) -> Option<toml::Value> {
    path.push(segment);
    let converted = json_to_toml(value, path, datetimes);
    path.pop();
    converted
}

fn datetime_at(path: &[String], s: &str, datetimes: &DatetimePaths) -> Option<toml::Value> {
    let known_date_key = matches!(path, [key] if TOML_DATE_KEYS.contains(&key.as_str()));
    if !known_date_key && !datetimes.contains(path) {
        return None;
    }
    s.parse::<toml::value::Datetime>()
        .ok()
        .map(toml::Value::Datetime)
}

/// TOML has no null; null entries are dropped.
fn json_to_toml(v: &Value, path: &mut Vec<String>, datetimes: &DatetimePaths) -> Option<toml::Value> {
    Some(match v {
        Value::Null => return None,
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => toml::Value::Integer(i),
            None => toml::Value::Float(n.as_f64()?),
        },
        Value::String(s) => {
            datetime_at(path, s, datetimes).unwrap_or_else(|| toml::Value::String(s.clone()))
        }
        Value::Array(items) => toml::Value::Array(
            items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| nested_to_toml(path, i.to_string(), v, datetimes))
                .collect(),
        ),
        Value::Object(map) => toml::Value::Table(
            map.iter()
                .filter_map(|(k, v)| {
                    nested_to_toml(path, k.clone(), v, datetimes).map(|tv| (k.clone(), tv))
                })
                .collect(),
        ),
    })
}

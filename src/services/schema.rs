//! Card field schema
//!
//! One static table names every writable card field and the kind of value it
//! holds. `sanitize_card` walks raw JSON through that table: known fields are
//! coerced and clamped, unknown fields are dropped, and the result is a typed
//! `CardInput`.
//!
//! Coercion is lenient. Numbers may arrive as strings, flags accept the usual
//! on/off spellings, and list fields accept a newline-separated string. Only a
//! status that names no known state is rejected.

use once_cell::sync::Lazy;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use super::presenter::{
    extract_numeric, sanitize_count, sanitize_percentage, sanitize_rating, sanitize_score,
};
use crate::models::{CardInput, CardStatus};

/// How a field's raw value is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single-line text, trimmed, control characters removed
    Text { max_len: usize },
    /// Multi-line text, line breaks kept
    LongText,
    /// Lowercase URL slug
    Slug,
    /// `http(s)://` or root-relative URL; anything else becomes empty
    Url,
    /// `#rgb`, `#rrggbb` or `#rrggbbaa`; anything else becomes empty
    Color,
    /// 0 to 5
    Rating,
    /// 0 to 5
    Score,
    /// 0 to 100
    Percentage,
    /// Non-negative integer
    Count,
    Flag,
    StringList,
    /// List of `{title, description, icon}`
    DetailList,
    /// List of `{question, answer}`
    FaqList,
    Status,
    /// Term slugs of one taxonomy
    TermList,
}

/// A writable card field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// External (camelCase) name
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

const SHORT: FieldKind = FieldKind::Text { max_len: 255 };

/// Every writable card field
pub const CARD_FIELDS: &[FieldSpec] = &[
    field("title", FieldKind::Text { max_len: 200 }),
    field("slug", FieldKind::Slug),
    field("excerpt", FieldKind::LongText),
    field("content", FieldKind::LongText),
    field("status", FieldKind::Status),
    field("imageUrl", FieldKind::Url),
    field("thumbnailUrl", FieldKind::Url),
    field("rating", FieldKind::Rating),
    field("reviewCount", FieldKind::Count),
    field("annualFee", SHORT),
    field("joiningFee", SHORT),
    field("welcomeBonus", SHORT),
    field("welcomeBonusPoints", FieldKind::Count),
    field("welcomeBonusType", SHORT),
    field("cashbackRate", SHORT),
    field("creditLimit", SHORT),
    field("interestRate", SHORT),
    field("processingTime", SHORT),
    field("minIncome", SHORT),
    field("minAge", SHORT),
    field("maxAge", SHORT),
    field("applyLink", FieldKind::Url),
    field("themeColor", FieldKind::Color),
    field("gradient", SHORT),
    field("rewardRate", FieldKind::Percentage),
    field("rewardType", SHORT),
    field("rewardConversionRate", SHORT),
    field("rewardScore", FieldKind::Score),
    field("feesScore", FieldKind::Score),
    field("benefitsScore", FieldKind::Score),
    field("supportScore", FieldKind::Score),
    field("overallScore", FieldKind::Score),
    field("pros", FieldKind::StringList),
    field("cons", FieldKind::StringList),
    field("bestFor", FieldKind::StringList),
    field("documents", FieldKind::StringList),
    field("features", FieldKind::DetailList),
    field("rewards", FieldKind::DetailList),
    field("fees", FieldKind::DetailList),
    field("eligibility", FieldKind::DetailList),
    field("customFaqs", FieldKind::FaqList),
    field("featured", FieldKind::Flag),
    field("trending", FieldKind::Flag),
    field("banks", FieldKind::TermList),
    field("networks", FieldKind::TermList),
    field("categories", FieldKind::TermList),
];

/// Lookup by camelCase and snake_case name
static FIELD_INDEX: Lazy<HashMap<String, &'static FieldSpec>> = Lazy::new(|| {
    let mut index = HashMap::with_capacity(CARD_FIELDS.len() * 2);
    for spec in CARD_FIELDS {
        index.insert(spec.name.to_string(), spec);
        index.insert(to_snake_case(spec.name), spec);
    }
    index
});

/// Errors from card sanitization
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaError {
    #[error("Card data must be a JSON object")]
    NotAnObject,

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Look up a writable field by external or snake_case name
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELD_INDEX.get(name).copied()
}

/// Canonical (camelCase) name of a known field
pub fn canonical_name(name: &str) -> Option<&'static str> {
    field_spec(name).map(|spec| spec.name)
}

/// Sanitize raw card JSON into a `CardInput`.
///
/// Absent fields keep `CardInput`'s defaults; `null` resets a field to its
/// default. An absent `overallScore` stays `None`.
pub fn sanitize_card(raw: &Value) -> Result<CardInput, SchemaError> {
    let object = raw.as_object().ok_or(SchemaError::NotAnObject)?;

    let mut clean = Map::new();
    for (key, value) in object {
        let Some(spec) = field_spec(key) else {
            tracing::debug!("Dropping unknown card field: {}", key);
            continue;
        };
        if value.is_null() {
            continue;
        }
        clean.insert(spec.name.to_string(), coerce(spec, value)?);
    }

    serde_json::from_value(Value::Object(clean)).map_err(|e| SchemaError::InvalidValue {
        field: "card",
        message: e.to_string(),
    })
}

/// Parse a tri-state flag spelling
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Lowercase slug: alphanumerics kept, every other run becomes one hyphen
pub fn generate_slug(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

fn coerce(spec: &FieldSpec, value: &Value) -> Result<Value, SchemaError> {
    let coerced = match spec.kind {
        FieldKind::Text { max_len } => Value::String(clean_line(&as_text(value), max_len)),
        FieldKind::LongText => Value::String(clean_block(&as_text(value))),
        FieldKind::Slug => Value::String(generate_slug(&as_text(value))),
        FieldKind::Url => Value::String(clean_url(&as_text(value))),
        FieldKind::Color => Value::String(clean_color(&as_text(value))),
        FieldKind::Rating => float(sanitize_rating(as_f64(value))),
        FieldKind::Score => float(sanitize_score(as_f64(value))),
        FieldKind::Percentage => float(sanitize_percentage(as_f64(value))),
        FieldKind::Count => Value::from(sanitize_count(as_i64(value))),
        FieldKind::Flag => Value::Bool(as_bool(value)),
        FieldKind::StringList => Value::from(
            as_items(value)
                .iter()
                .map(|item| clean_line(&as_text(item), 500))
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>(),
        ),
        FieldKind::DetailList => Value::Array(
            as_items(value)
                .iter()
                .filter_map(detail_item)
                .collect(),
        ),
        FieldKind::FaqList => Value::Array(as_items(value).iter().filter_map(faq_item).collect()),
        FieldKind::Status => {
            let raw = as_text(value);
            let status = CardStatus::from_str(raw.trim()).ok_or_else(|| SchemaError::InvalidValue {
                field: spec.name,
                message: format!("unknown status '{}'", raw),
            })?;
            Value::String(status.as_str().to_string())
        }
        FieldKind::TermList => {
            let mut slugs: Vec<String> = Vec::new();
            for item in as_items(value) {
                for token in as_text(&item).split(',') {
                    let slug = generate_slug(token);
                    if !slug.is_empty() && !slugs.contains(&slug) {
                        slugs.push(slug);
                    }
                }
            }
            Value::from(slugs)
        }
    };
    Ok(coerced)
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::from(0.0), Value::Number)
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

fn as_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => extract_numeric(s),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => parse_flag(s).unwrap_or(false),
        _ => false,
    }
}

/// Array items, or the lines of a string
fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => s
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Value::String(line.to_string()))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn detail_item(value: &Value) -> Option<Value> {
    let (title, description, icon) = match value {
        Value::Object(obj) => (
            obj.get("title").map(as_text).unwrap_or_default(),
            obj.get("description").map(as_text).unwrap_or_default(),
            obj.get("icon").map(as_text).unwrap_or_default(),
        ),
        other => (as_text(other), String::new(), String::new()),
    };
    let title = clean_line(&title, 255);
    let description = clean_block(&description);
    if title.is_empty() && description.is_empty() {
        return None;
    }
    Some(serde_json::json!({
        "title": title,
        "description": description,
        "icon": clean_line(&icon, 100),
    }))
}

fn faq_item(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    let question = clean_line(&obj.get("question").map(as_text).unwrap_or_default(), 500);
    if question.is_empty() {
        return None;
    }
    let answer = clean_block(&obj.get("answer").map(as_text).unwrap_or_default());
    Some(serde_json::json!({ "question": question, "answer": answer }))
}

fn clean_line(raw: &str, max_len: usize) -> String {
    let line: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    line.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_len)
        .collect()
}

fn clean_block(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

fn clean_url(raw: &str) -> String {
    let url = raw.trim();
    let lower = url.to_lowercase();
    let allowed = lower.starts_with("https://")
        || lower.starts_with("http://")
        || (url.starts_with('/') && !url.starts_with("//"));
    if allowed && !url.chars().any(char::is_whitespace) {
        url.to_string()
    } else {
        String::new()
    }
}

fn clean_color(raw: &str) -> String {
    let color = raw.trim();
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        color.to_lowercase()
    } else {
        String::new()
    }
}

fn to_snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            snake.push('_');
            snake.push(c.to_ascii_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}

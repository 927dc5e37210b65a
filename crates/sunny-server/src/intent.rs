//! Quote intent detection for chat messages
//!
//! A message about solar panels that also asks for a price or a booking is
//! answered from the pricing table instead of the language model. The panel
//! count and city come from the request body when present, else from the
//! message text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PANEL_COUNT_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)panel\s*count\s*[:=]\s*(\d+)").expect("panel count regex should be valid")
});

static PANEL_COUNT_INLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*panels?\b").expect("panel regex should be valid")
});

static CITY_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:city|address)\s*[:=]\s*([a-zA-Z .'-]+)")
        .expect("city label regex should be valid")
});

static CITY_AFTER_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bin\s+([a-zA-Z.'-]+(?:\s+[a-zA-Z.'-]+)*)")
        .expect("city regex should be valid")
});

static LEADING_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([+-]?\d+)").expect("integer regex should be valid"));

static TRAILING_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,]+$").expect("separator regex should be valid"));

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should be valid"));

/// Body fields checked, in order, for a city
const CITY_FIELDS: [&str; 3] = ["city", "address", "location"];

/// What a chat message is asking about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Intent {
    pub solar: bool,
    pub pricing: bool,
    pub booking: bool,
}

impl Intent {
    pub fn detect(message: &str) -> Self {
        let lower = message.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        Self {
            solar: any(&["solar", "panel"]),
            pricing: any(&["price", "quote", "cost", "estimate", "how much"]),
            booking: any(&["book", "schedule", "appointment"]),
        }
    }

    /// Solar work plus either a price or a booking question
    pub fn wants_quote(&self) -> bool {
        self.solar && (self.pricing || self.booking)
    }
}

/// Panel count from `body.panelCount` when the field exists, else from the
/// message (`panel count: 12`, then `12 panels`).
///
/// Only the leading integer of the body value counts, so `"12 panels"` is 12
/// and `5.5` is 5. The result may be zero or negative; pricing rejects those.
pub fn panel_count(message: &str, body: &Value) -> Option<i64> {
    if let Some(raw) = body.get("panelCount") {
        return match raw {
            Value::Number(n) => leading_integer(&n.to_string()),
            Value::String(s) => leading_integer(s),
            _ => None,
        };
    }

    PANEL_COUNT_LABELED
        .captures(message)
        .or_else(|| PANEL_COUNT_INLINE.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|digits| digits.as_str().parse().unwrap_or(i64::MAX))
}

/// City from the first non-empty of `body.city`, `body.address` and
/// `body.location`, else from the message (`city: X`, then `in X`).
pub fn city(message: &str, body: &Value) -> Option<String> {
    let from_body = CITY_FIELDS
        .iter()
        .filter_map(|field| body.get(*field))
        .find(|value| is_truthy(value))
        .and_then(Value::as_str)
        .and_then(sanitize_city);
    if from_body.is_some() {
        return from_body;
    }

    CITY_LABELED
        .captures(message)
        .or_else(|| CITY_AFTER_IN.captures(message))
        .and_then(|caps| caps.get(1))
        .and_then(|city| sanitize_city(city.as_str()))
}

fn leading_integer(raw: &str) -> Option<i64> {
    let digits = LEADING_INTEGER.captures(raw)?.get(1)?.as_str();
    Some(digits.parse().unwrap_or(if digits.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn sanitize_city(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let without_tail = TRAILING_SEPARATORS.replace(trimmed, "");
    Some(WHITESPACE_RUN.replace_all(&without_tail, " ").into_owned())
}

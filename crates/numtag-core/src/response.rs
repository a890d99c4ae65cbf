//! Parsing model responses and checking them against what was sent.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::TokenRecord;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response is JSON but not an object")]
    NotAnObject,
}

/// One labeled value as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticResult {
    pub raw_value: String,
    /// Number or string, as the model sent it.
    pub formatted_value: Value,
    pub semantic_label: String,
    pub semantic_category: String,
    pub unit: Option<String>,
    pub llm_confidence: f64,
}

impl SemanticResult {
    /// Read one entry of the model's result list.
    ///
    /// Returns `None` if `raw_value` is missing. Other fields degrade to
    /// defaults; confidence is clamped into `[0, 1]`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let raw_value = scalar_string(entry.get("raw_value")?)?;
        let text = |key: &str| entry.get(key).and_then(scalar_string);
        let llm_confidence = entry
            .get("llm_confidence")
            .and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.0);

        Some(Self {
            raw_value,
            formatted_value: entry.get("formatted_value").cloned().unwrap_or(Value::Null),
            semantic_label: text("semantic_label").unwrap_or_else(|| "other".into()),
            semantic_category: text("semantic_category").unwrap_or_else(|| "OTHER".into()),
            unit: text("unit").filter(|u| !u.is_empty()),
            llm_confidence,
        })
    }

    /// `formatted_value` rendered as text, if it is a string or number.
    pub fn formatted_string(&self) -> Option<String> {
        scalar_string(&self.formatted_value)
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A model response that parsed as a JSON object.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub object: Map<String, Value>,
    pub results: Vec<SemanticResult>,
}

/// Parse a model response.
///
/// Markdown code fences around the JSON are tolerated. The result list is read
/// from `classification`, falling back to `results`; entries that cannot be
/// read are skipped with a warning. A response that is not a JSON object is a
/// [`ParseError`].
pub fn parse_labeler_response(raw: &str) -> Result<ParsedResponse, ParseError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))?;
    let Value::Object(object) = value else {
        return Err(ParseError::NotAnObject);
    };

    let entries = object
        .get("classification")
        .or_else(|| object.get("results"))
        .and_then(Value::as_array);

    let mut results = Vec::new();
    for entry in entries.into_iter().flatten() {
        match SemanticResult::from_value(entry) {
            Some(result) => results.push(result),
            None => tracing::warn!(entry = %entry, "skipping unreadable result entry"),
        }
    }

    Ok(ParsedResponse { object, results })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Which sent values the model echoed back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Distinct values sent.
    pub expected: usize,
    /// Results returned.
    pub returned: usize,
    /// Sent values with no matching result, in send order.
    pub missing: Vec<String>,
}

impl Reconciliation {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Digits and decimal points only, e.g. `"$1,000.50"` → `"1000.50"`.
fn numeric_core(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

/// Numeric cores compared by value, so `"5000"` and `"5000.0"` agree.
fn same_number(a: &str, b: &str) -> bool {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

pub fn reconcile(sent: &[TokenRecord], results: &[SemanticResult]) -> Reconciliation {
    let mut returned: HashSet<String> = HashSet::new();
    for result in results {
        returned.insert(result.raw_value.clone());
        if let Some(formatted) = result.formatted_string() {
            returned.insert(formatted);
        }
    }
    let returned_cores: Vec<String> = returned
        .iter()
        .map(|v| numeric_core(v))
        .filter(|c| !c.is_empty())
        .collect();

    let mut seen = BTreeSet::new();
    let mut missing = Vec::new();
    for record in sent {
        if !seen.insert(record.value.as_str()) {
            continue;
        }
        if returned.contains(&record.value) {
            continue;
        }
        let core = numeric_core(&record.value);
        let echoed = !core.is_empty()
            && (returned.contains(&core)
                || returned_cores.iter().any(|c| c == &core || same_number(c, &core)));
        if !echoed {
            missing.push(record.value.clone());
        }
    }

    Reconciliation {
        expected: seen.len(),
        returned: results.len(),
        missing,
    }
}

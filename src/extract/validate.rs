//! LLM response validation and normalization
//!
//! The extraction prompt demands a single JSON object with `Event_Type`,
//! `State`, `LGA` and `Severity`. Real model output is messier: fenced
//! code blocks, prose around the object, arrays of candidates, mixed key
//! casing. This module tolerates all of that, then enforces the schema.
//! A response that survives becomes a [`ParsedEvent`]; one that does not
//! is a terminal ValidationFailure for the article (no retry).

use crate::error::{PipelineError, Result};
use crate::types::{Article, EventType, GeoPoint, ParsedEvent, Severity};
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Matches a ``` fence with an optional language tag, capturing the body.
fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    FENCE.get_or_init(|| Regex::new(r"```[a-zA-Z]*\s*([\s\S]*?)```").expect("fence regex is valid"))
}

/// The four required fields plus optional extras, post-coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub event_type: EventType,
    pub state: String,
    pub lga: String,
    pub severity: Severity,
    pub fatalities: u32,
    pub conflict_actor: Option<String>,
    pub confidence_score: Option<f64>,
    pub location: Option<GeoPoint>,
}

/// Pull the first JSON object out of a raw model response.
///
/// Handles: bare objects, ```json fences, arrays (first element wins),
/// and objects embedded in surrounding prose.
fn extract_json_object(response: &str) -> Result<Value> {
    let trimmed = response.trim();

    // Direct parse first: covers bare objects and bare arrays.
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return first_object(value);
    }

    // Fenced block: ```json ... ``` or plain ``` ... ```
    if let Some(inner) = fenced_body(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            return first_object(value);
        }
    }

    // Last resort: first balanced {...} span in the text.
    if let Some(span) = balanced_object_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return first_object(value);
        }
    }

    Err(PipelineError::ValidationFailure(
        "response contains no parseable JSON object".to_string(),
    ))
}

fn first_object(value: Value) -> Result<Value> {
    match value {
        Value::Object(_) => Ok(value),
        Value::Array(items) => items
            .into_iter()
            .find(|v| v.is_object())
            .ok_or_else(|| {
                PipelineError::ValidationFailure("array response holds no object".to_string())
            }),
        other => Err(PipelineError::ValidationFailure(format!(
            "expected JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn fenced_body(text: &str) -> Option<&str> {
    fence_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn balanced_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Case-insensitive field lookup: `Event_Type`, `event_type`, `EVENT_TYPE`
/// all resolve.
fn field<'a>(obj: &'a Value, name: &str) -> Option<&'a Value> {
    let map = obj.as_object()?;
    if let Some(v) = map.get(name) {
        return Some(v);
    }
    let lower = name.to_lowercase();
    map.iter()
        .find(|(k, _)| k.to_lowercase() == lower)
        .map(|(_, v)| v)
}

fn field_str(obj: &Value, name: &str) -> Option<String> {
    field(obj, name).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Validate the response and coerce it into the extracted field set.
pub fn validate_response(response: &str) -> Result<ExtractedFields> {
    let obj = extract_json_object(response)?;

    let event_type_raw = field_str(&obj, "Event_Type").ok_or_else(|| {
        PipelineError::ValidationFailure("missing required field Event_Type".to_string())
    })?;
    let state = field_str(&obj, "State")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            PipelineError::ValidationFailure("missing required field State".to_string())
        })?;
    let lga = field_str(&obj, "LGA")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let severity_raw = field_str(&obj, "Severity").ok_or_else(|| {
        PipelineError::ValidationFailure("missing required field Severity".to_string())
    })?;

    let fatalities = field(&obj, "Fatalities")
        .and_then(Value::as_f64)
        .map(|f| if f < 0.0 { 0 } else { f as u32 })
        .unwrap_or(0);

    let confidence_score = field(&obj, "Confidence_Score")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 100.0));

    let location = match (
        field(&obj, "Longitude").and_then(Value::as_f64),
        field(&obj, "Latitude").and_then(Value::as_f64),
    ) {
        (Some(lon), Some(lat)) => Some(GeoPoint::new(lon, lat)),
        _ => None,
    };

    Ok(ExtractedFields {
        event_type: EventType::parse_lenient(&event_type_raw),
        state,
        lga,
        severity: Severity::parse_lenient(&severity_raw),
        fatalities,
        conflict_actor: field_str(&obj, "Conflict_Actor").filter(|s| !s.trim().is_empty()),
        confidence_score,
        location,
    })
}

/// Build the immutable event record from a validated response.
pub fn validated_event_from_response(article: &Article, response: &str) -> Result<ParsedEvent> {
    let fields = validate_response(response)?;
    Ok(ParsedEvent {
        id: uuid::Uuid::new_v4().to_string(),
        article_id: article.id.clone(),
        event_type: fields.event_type,
        state: fields.state,
        lga: fields.lga,
        severity: fields.severity,
        fatalities: fields.fatalities,
        conflict_actor: fields.conflict_actor,
        parsed_at: Utc::now(),
        confidence_score: fields.confidence_score,
        location: fields.location,
        title: article.title.clone(),
        summary: article.content.chars().take(280).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_object() {
        let fields = validate_response(
            r#"{"Event_Type": "Attack", "State": "Lagos", "LGA": "Ikeja", "Severity": "medium"}"#,
        )
        .unwrap();
        assert_eq!(fields.event_type, EventType::Attack);
        assert_eq!(fields.state, "Lagos");
        assert_eq!(fields.lga, "Ikeja");
        assert_eq!(fields.severity, Severity::Medium);
    }

    #[test]
    fn test_fenced_response() {
        let response = "Here is the extraction:\n```json\n{\"Event_Type\": \"clash\", \"State\": \"Benue\", \"LGA\": \"Guma\", \"Severity\": \"critical\"}\n```\nDone.";
        let fields = validate_response(response).unwrap();
        assert_eq!(fields.event_type, EventType::Clash);
        assert_eq!(fields.severity, Severity::Critical);
    }

    #[test]
    fn test_array_takes_first_element() {
        let response = r#"[{"Event_Type": "banditry", "State": "Zamfara", "LGA": "Anka", "Severity": "high"}, {"Event_Type": "protest", "State": "Kano", "LGA": "Dala", "Severity": "low"}]"#;
        let fields = validate_response(response).unwrap();
        assert_eq!(fields.event_type, EventType::Banditry);
        assert_eq!(fields.state, "Zamfara");
    }

    #[test]
    fn test_lowercase_keys_accepted() {
        let fields = validate_response(
            r#"{"event_type": "kidnapping", "state": "Kaduna", "lga": "Chikun", "severity": "high"}"#,
        )
        .unwrap();
        assert_eq!(fields.event_type, EventType::Kidnapping);
    }

    #[test]
    fn test_unknown_enum_values_are_coerced() {
        let fields = validate_response(
            r#"{"Event_Type": "skirmish", "State": "Plateau", "LGA": "Jos North", "Severity": "apocalyptic"}"#,
        )
        .unwrap();
        assert_eq!(fields.event_type, EventType::Other);
        assert_eq!(fields.severity, Severity::Medium);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let err =
            validate_response(r#"{"State": "Lagos", "LGA": "Ikeja", "Severity": "low"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailure(_)));
    }

    #[test]
    fn test_non_json_fails() {
        let err = validate_response("I could not determine the event type.").unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailure(_)));
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let response = r#"The extracted event is {"Event_Type": "terrorism", "State": "Borno", "LGA": "Maiduguri", "Severity": "critical"} based on the article."#;
        let fields = validate_response(response).unwrap();
        assert_eq!(fields.event_type, EventType::Terrorism);
    }

    #[test]
    fn test_optional_fields() {
        let fields = validate_response(
            r#"{"Event_Type": "attack", "State": "Sokoto", "LGA": "Illela", "Severity": "high",
                "Fatalities": 12, "Conflict_Actor": "Lakurawa", "Confidence_Score": 87.5,
                "Longitude": 5.3, "Latitude": 13.7}"#,
        )
        .unwrap();
        assert_eq!(fields.fatalities, 12);
        assert_eq!(fields.conflict_actor.as_deref(), Some("Lakurawa"));
        assert_eq!(fields.confidence_score, Some(87.5));
        assert!(fields.location.is_some());
    }

    #[test]
    fn test_negative_fatalities_clamped_to_zero() {
        let fields = validate_response(
            r#"{"Event_Type": "attack", "State": "Yobe", "LGA": "Damaturu", "Severity": "low", "Fatalities": -3}"#,
        )
        .unwrap();
        assert_eq!(fields.fatalities, 0);
    }
}

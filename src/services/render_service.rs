use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};
use std::fmt;
use validator::ValidateEmail;

use crate::models::form::{FieldType, FormField, IdentityAttribute};
use crate::services::identity_service::IdentityProfile;
use crate::services::schema_service::SchemaService;

/// Shown for answers that are absent or empty.
pub const EMPTY_MARKER: &str = "—";

pub type FormAnswers = Map<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerViolation {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct AnswerErrors(Vec<AnswerViolation>);

impl AnswerErrors {
    pub fn violations(&self) -> &[AnswerViolation] {
        &self.0
    }
}

impl fmt::Display for AnswerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerLookup<'a> {
    Found(&'a JsonValue),
    Missing,
}

impl<'a> AnswerLookup<'a> {
    pub fn value(&self) -> Option<&'a JsonValue> {
        match self {
            AnswerLookup::Found(v) => Some(v),
            AnswerLookup::Missing => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedField {
    #[serde(flatten)]
    pub field: FormField,
    pub initial_value: JsonValue,
}

pub struct RenderService;

impl RenderService {
    /// Produces the fillable view of a schema: fields in display order with their
    /// initial values taken from the identity profile or the configured default.
    pub fn render(fields: &[FormField], identity: Option<&IdentityProfile>) -> Vec<RenderedField> {
        SchemaService::sorted(fields)
            .into_iter()
            .map(|field| {
                let autofilled = match (field.autofill, field.autofill_attribute, identity) {
                    (true, Some(attribute), Some(profile)) => profile
                        .attribute(attribute)
                        .map(|v| JsonValue::String(v.to_string())),
                    _ => None,
                };
                let initial_value = autofilled
                    .or_else(|| default_value(&field))
                    .unwrap_or(JsonValue::Null);
                RenderedField {
                    field,
                    initial_value,
                }
            })
            .collect()
    }

    /// Candidate keys in lookup precedence: id, name, `field_<id>`, label.
    pub fn candidate_keys(field: &FormField) -> Vec<String> {
        let mut keys = Vec::with_capacity(4);
        if let Some(id) = field.id {
            keys.push(id.to_string());
        }
        keys.push(field.name.clone());
        if let Some(id) = field.id {
            keys.push(format!("field_{}", id));
        }
        keys.push(field.label.clone());
        keys
    }

    pub fn lookup_answer<'a>(field: &FormField, answers: &'a FormAnswers) -> AnswerLookup<'a> {
        Self::candidate_keys(field)
            .iter()
            .find_map(|key| answers.get(key))
            .map(AnswerLookup::Found)
            .unwrap_or(AnswerLookup::Missing)
    }

    /// Checks submitted answers against the schema and returns them keyed by field id.
    pub fn validate_answers(
        fields: &[FormField],
        answers: &FormAnswers,
    ) -> Result<FormAnswers, AnswerErrors> {
        let mut canonical = Map::new();
        let mut violations = Vec::new();

        for field in SchemaService::sorted(fields) {
            let key = field.answer_key().unwrap_or_else(|| field.name.clone());
            let raw = Self::lookup_answer(&field, answers).value();

            if raw.map_or(true, is_empty) {
                if field.required {
                    violations.push(AnswerViolation {
                        field: field.name.clone(),
                        message: "This field is required".into(),
                    });
                }
                continue;
            }

            let raw = raw.unwrap_or(&JsonValue::Null);
            match coerce(&field, raw) {
                Ok(value) => {
                    canonical.insert(key, value);
                }
                Err(message) => violations.push(AnswerViolation {
                    field: field.name.clone(),
                    message,
                }),
            }
        }

        if violations.is_empty() {
            Ok(canonical)
        } else {
            Err(AnswerErrors(violations))
        }
    }

    /// Text shown for an answer in read-only views.
    pub fn display_value(field: &FormField, value: Option<&JsonValue>) -> String {
        let value = match value {
            Some(v) if !is_blank(v) => v,
            _ => return EMPTY_MARKER.to_string(),
        };

        match field.field_type {
            FieldType::Checkbox => {
                if truthy(value) {
                    field
                        .checkbox_label_true
                        .clone()
                        .unwrap_or_else(|| "Ja".to_string())
                } else {
                    field
                        .checkbox_label_false
                        .clone()
                        .unwrap_or_else(|| "Nein".to_string())
                }
            }
            FieldType::Date => {
                let raw = as_plain_string(value);
                parse_date(&raw)
                    .map(|d| d.format("%d.%m.%Y").to_string())
                    .unwrap_or(raw)
            }
            FieldType::Select => {
                let raw = as_plain_string(value);
                field
                    .options
                    .iter()
                    .find(|o| o.matches(&raw))
                    .map(|o| o.label().to_string())
                    .unwrap_or(raw)
            }
            FieldType::FileUpload => match value {
                JsonValue::Array(items) => items
                    .iter()
                    .map(file_name_of)
                    .collect::<Vec<_>>()
                    .join(", "),
                other => file_name_of(other),
            },
            _ => as_plain_string(value),
        }
    }

    /// Re-keys a legacy answer map by field id. Entries that match no field are kept
    /// under an `unmapped:` prefix.
    pub fn canonicalize_legacy(fields: &[FormField], answers: &FormAnswers) -> FormAnswers {
        let mut canonical = Map::new();
        let mut consumed = Vec::new();

        for field in fields {
            let Some(key) = field.answer_key() else {
                continue;
            };
            if let Some(found) = Self::candidate_keys(field)
                .into_iter()
                .find(|k| answers.contains_key(k))
            {
                if let Some(value) = answers.get(&found) {
                    canonical.insert(key, value.clone());
                }
                consumed.push(found);
            }
        }

        for (key, value) in answers {
            if !consumed.contains(key) {
                canonical.insert(format!("unmapped:{}", key), value.clone());
            }
        }
        canonical
    }

    /// Maps a legacy autofill flag to an explicit attribute when the field name
    /// names exactly one known attribute.
    pub fn infer_legacy_autofill(field: &FormField) -> Option<IdentityAttribute> {
        if !field.autofill || field.autofill_attribute.is_some() {
            return field.autofill_attribute;
        }
        let lower = field.name.to_lowercase();
        let attribute = match (lower.contains("email"), lower.contains("name")) {
            (true, false) => IdentityAttribute::Email,
            (false, true) => IdentityAttribute::Name,
            _ => return None,
        };
        attribute.accepts(field.field_type).then_some(attribute)
    }
}

fn default_value(field: &FormField) -> Option<JsonValue> {
    let raw = field.default_value.as_deref().filter(|d| !d.is_empty())?;
    match field.field_type {
        FieldType::Checkbox => Some(JsonValue::Bool(parse_bool(raw).unwrap_or(false))),
        FieldType::Number => raw.trim().parse::<f64>().ok().map(number_value),
        _ => Some(JsonValue::String(raw.to_string())),
    }
}

fn coerce(field: &FormField, raw: &JsonValue) -> Result<JsonValue, String> {
    match field.field_type {
        FieldType::Checkbox => match raw {
            JsonValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            JsonValue::String(s) => parse_bool(s)
                .map(JsonValue::Bool)
                .ok_or_else(|| "Expected a yes/no value".to_string()),
            JsonValue::Number(n) => Ok(JsonValue::Bool(n.as_f64() != Some(0.0))),
            _ => Err("Expected a yes/no value".into()),
        },
        FieldType::Number => {
            let number = match raw {
                JsonValue::Number(n) => n.as_f64(),
                JsonValue::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
                _ => None,
            }
            .filter(|n| n.is_finite())
            .ok_or_else(|| "Expected a number".to_string())?;
            if let Some(min) = field.min_value {
                if number < min {
                    return Err(format!("Must be at least {}", min));
                }
            }
            if let Some(max) = field.max_value {
                if number > max {
                    return Err(format!("Must be at most {}", max));
                }
            }
            Ok(number_value(number))
        }
        FieldType::Text | FieldType::Textarea | FieldType::Email => {
            let text = match raw {
                JsonValue::String(s) => s.trim().to_string(),
                JsonValue::Number(n) => n.to_string(),
                _ => return Err("Expected text".into()),
            };
            let length = text.chars().count() as u32;
            if let Some(min) = field.min_length {
                if length < min {
                    return Err(format!("Must be at least {} characters", min));
                }
            }
            if let Some(max) = field.max_length {
                if length > max {
                    return Err(format!("Must be at most {} characters", max));
                }
            }
            if let Some(pattern) = field.pattern.as_deref().filter(|p| !p.is_empty()) {
                let anchored = Regex::new(&format!("^(?:{})$", pattern))
                    .map_err(|e| format!("Invalid pattern: {}", e))?;
                if !anchored.is_match(&text) {
                    return Err("Does not match the required format".into());
                }
            }
            if field.field_type == FieldType::Email && !text.validate_email() {
                return Err("Expected an email address".into());
            }
            Ok(JsonValue::String(text))
        }
        FieldType::Date => {
            let text = as_plain_string(raw);
            parse_date(&text)
                .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
                .ok_or_else(|| "Expected a date (YYYY-MM-DD)".to_string())
        }
        FieldType::Select => {
            let text = as_plain_string(raw);
            field
                .options
                .iter()
                .find(|o| o.matches(&text))
                .map(|o| JsonValue::String(o.value().to_string()))
                .ok_or_else(|| format!("'{}' is not one of the options", text))
        }
        FieldType::FileUpload => match raw {
            JsonValue::String(_) => Ok(raw.clone()),
            JsonValue::Array(items) if items.iter().all(is_file_reference) => Ok(raw.clone()),
            JsonValue::Object(_) if is_file_reference(raw) => Ok(raw.clone()),
            _ => Err("Expected a file reference".into()),
        },
    }
}

fn is_empty(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        _ => false,
    }
}

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => parse_bool(s).unwrap_or(!s.is_empty()),
        JsonValue::Number(n) => n.as_f64() != Some(0.0),
        JsonValue::Null => false,
        _ => true,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "ja" | "1" => Some(true),
        "false" | "off" | "no" | "nein" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw.trim()).ok().map(|dt| dt.date_naive()))
}

fn number_value(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        JsonValue::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn as_plain_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_file_reference(value: &JsonValue) -> bool {
    match value {
        JsonValue::String(_) => true,
        JsonValue::Object(map) => map.get("filename").map_or(false, JsonValue::is_string),
        _ => false,
    }
}

fn file_name_of(value: &JsonValue) -> String {
    match value {
        JsonValue::Object(map) => map
            .get("filename")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => as_plain_string(other),
    }
}

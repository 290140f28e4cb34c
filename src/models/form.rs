use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Row of the `forms` table. `fields` holds the live schema.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Form {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: String,
    pub fields: Json<Vec<FormField>>,
    pub field_seq: i32,
    pub version: i32,
    pub created_by: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Form {
    pub fn status(&self) -> FormStatus {
        self.status.parse().unwrap_or(FormStatus::Draft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormStatus {
    Draft,
    Published,
    Archived,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Draft => "DRAFT",
            FormStatus::Published => "PUBLISHED",
            FormStatus::Archived => "ARCHIVED",
        }
    }

    /// DRAFT -> PUBLISHED -> ARCHIVED. Archived forms stay archived.
    pub fn can_transition_to(&self, next: FormStatus) -> bool {
        matches!(
            (self, next),
            (FormStatus::Draft, FormStatus::Published) | (FormStatus::Published, FormStatus::Archived)
        )
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self, FormStatus::Archived)
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(FormStatus::Draft),
            "PUBLISHED" => Ok(FormStatus::Published),
            "ARCHIVED" => Ok(FormStatus::Archived),
            other => Err(format!("unknown form status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    Email,
    Number,
    Date,
    Select,
    Textarea,
    Checkbox,
    FileUpload,
}

/// Identity attributes a field may be prefilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityAttribute {
    Email,
    GivenName,
    FamilyName,
    Name,
}

impl IdentityAttribute {
    pub fn accepts(&self, field_type: FieldType) -> bool {
        match self {
            IdentityAttribute::Email => matches!(field_type, FieldType::Email | FieldType::Text),
            IdentityAttribute::GivenName | IdentityAttribute::FamilyName | IdentityAttribute::Name => {
                matches!(field_type, FieldType::Text)
            }
        }
    }
}

/// Select options are stored either as plain strings or as value/label pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectOption {
    Plain(String),
    Labeled { value: String, label: String },
}

impl SelectOption {
    pub fn value(&self) -> &str {
        match self {
            SelectOption::Plain(v) => v,
            SelectOption::Labeled { value, .. } => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SelectOption::Plain(v) => v,
            SelectOption::Labeled { label, .. } => label,
        }
    }

    pub fn matches(&self, raw: &str) -> bool {
        self.value() == raw || self.label() == raw
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    #[serde(default)]
    pub id: Option<i32>,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub autofill: bool,
    #[serde(default)]
    pub autofill_attribute: Option<IdentityAttribute>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
    pub display_order: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub checkbox_label_true: Option<String>,
    #[serde(default)]
    pub checkbox_label_false: Option<String>,
    #[serde(default)]
    pub allowed_file_types: Option<Vec<String>>,
    #[serde(default)]
    pub max_file_size_mb: Option<u32>,
}

impl FormField {
    /// Bare field with every optional setting left empty.
    pub fn new(name: &str, field_type: FieldType, label: &str, display_order: i32) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            field_type,
            label: label.to_string(),
            placeholder: None,
            default_value: None,
            required: false,
            autofill: false,
            autofill_attribute: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            pattern: None,
            display_order,
            options: Vec::new(),
            checkbox_label_true: None,
            checkbox_label_false: None,
            allowed_file_types: None,
            max_file_size_mb: None,
        }
    }

    /// Canonical answer key.
    pub fn answer_key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}

/// Frozen copy of a form stored with every application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    pub form_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub version: i32,
    pub fields: Vec<FormField>,
}

impl From<&Form> for FormSnapshot {
    fn from(form: &Form) -> Self {
        Self {
            form_id: form.id,
            title: form.title.clone(),
            description: form.description.clone(),
            category: form.category.clone(),
            version: form.version,
            fields: form.fields.0.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_status_transitions_only_move_forward() {
        assert!(FormStatus::Draft.can_transition_to(FormStatus::Published));
        assert!(FormStatus::Published.can_transition_to(FormStatus::Archived));
        assert!(!FormStatus::Draft.can_transition_to(FormStatus::Archived));
        assert!(!FormStatus::Archived.can_transition_to(FormStatus::Draft));
        assert!(!FormStatus::Archived.can_transition_to(FormStatus::Published));
        assert!(!FormStatus::Published.can_transition_to(FormStatus::Published));
    }

    #[test]
    fn field_deserializes_with_defaults() {
        let field: FormField = serde_json::from_value(json!({
            "name": "amount",
            "type": "NUMBER",
            "label": "Betrag",
            "display_order": 3
        }))
        .unwrap();

        assert_eq!(field.field_type, FieldType::Number);
        assert!(!field.required);
        assert!(field.id.is_none());
        assert!(field.options.is_empty());
    }

    #[test]
    fn select_options_accept_both_shapes() {
        let options: Vec<SelectOption> =
            serde_json::from_value(json!(["A", {"value": "b", "label": "Bravo"}])).unwrap();
        assert_eq!(options[0].label(), "A");
        assert_eq!(options[1].value(), "b");
        assert!(options[1].matches("Bravo"));
    }

    #[test]
    fn email_attribute_is_not_accepted_by_number_fields() {
        assert!(IdentityAttribute::Email.accepts(FieldType::Email));
        assert!(!IdentityAttribute::Email.accepts(FieldType::Number));
        assert!(!IdentityAttribute::Name.accepts(FieldType::Email));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::form::{Form, FormField};
use crate::services::form_service::FormList;
use crate::services::render_service::RenderedField;
use crate::services::schema_service::{Direction, SchemaService};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveFormPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub fields: Vec<FormField>,
    /// Autosave slot of the form builder, discarded once the form is saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub draft_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveFieldPayload {
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FormListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: String,
    pub version: i32,
    pub fields: Vec<FormField>,
    pub published_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormListResponse {
    pub items: Vec<FormResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Catalog entry for applicants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedFormSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub version: i32,
    pub field_count: usize,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedFormResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub version: i32,
    pub fields: Vec<RenderedField>,
}

impl From<Form> for FormResponse {
    fn from(value: Form) -> Self {
        let fields = SchemaService::sorted(&value.fields.0);
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            category: value.category,
            status: value.status,
            version: value.version,
            fields,
            published_at: value.published_at,
            archived_at: value.archived_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Form> for PublishedFormSummary {
    fn from(value: Form) -> Self {
        Self {
            id: value.id,
            field_count: value.fields.0.len(),
            title: value.title,
            description: value.description,
            category: value.category,
            version: value.version,
            published_at: value.published_at,
        }
    }
}

impl From<FormList> for FormListResponse {
    fn from(value: FormList) -> Self {
        Self {
            items: value.items.into_iter().map(Into::into).collect(),
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: value.total_pages,
        }
    }
}

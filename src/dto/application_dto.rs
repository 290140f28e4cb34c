use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::application::{Application, ApplicationStatus};
use crate::models::form::FieldType;
use crate::services::application_service::ApplicationList;
use crate::services::render_service::FormAnswers;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitApplicationPayload {
    pub form_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub answers: FormAnswers,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct UpdateApplicationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<FormAnswers>,
}

/// Body of `PATCH /api/review/applications/:id/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectPayload {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplicationListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<ApplicationStatus>,
    pub applicant_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub id: Uuid,
    pub form_id: Option<Uuid>,
    pub title: String,
    pub amount: Option<Decimal>,
    pub applicant_id: Uuid,
    pub applicant_name: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationListResponse {
    pub items: Vec<ApplicationSummary>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// One row of the read-only form view of an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormViewRow {
    pub field_id: Option<i32>,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: JsonValue,
    pub display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub form_view: Vec<FormViewRow>,
}

impl From<Application> for ApplicationSummary {
    fn from(value: Application) -> Self {
        Self {
            id: value.id,
            form_id: value.form_id,
            title: value.title,
            amount: value.amount,
            applicant_id: value.applicant_id,
            applicant_name: value.applicant_name,
            status: value.status,
            submitted_at: value.submitted_at,
            reviewed_at: value.reviewed_at,
            rejection_reason: value.rejection_reason,
        }
    }
}

impl From<ApplicationList> for ApplicationListResponse {
    fn from(value: ApplicationList) -> Self {
        Self {
            items: value.items.into_iter().map(Into::into).collect(),
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: value.total_pages,
        }
    }
}

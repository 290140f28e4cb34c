use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Autosaved form-builder state, one slot per owner and draft key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormDraft {
    pub owner_id: Uuid,
    pub draft_key: String,
    pub form_id: Option<Uuid>,
    pub version: i32,
    pub payload: JsonValue,
    pub saved_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveDraftPayload {
    /// Version the caller last saw; `0` creates the slot.
    #[serde(default)]
    pub expected_version: i32,
    #[serde(default)]
    pub form_id: Option<Uuid>,
    pub payload: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSaved {
    pub draft_key: String,
    pub version: i32,
    pub saved_at: DateTime<Utc>,
}

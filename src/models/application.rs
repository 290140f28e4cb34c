use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::form::FormSnapshot;

/// A submitted Förderantrag.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub form_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub applicant_id: Uuid,
    pub applicant_name: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub form_snapshot: Json<FormSnapshot>,
    pub answers: Json<Map<String, JsonValue>>,
    pub answers_canonical: bool,
}

impl Application {
    pub fn status(&self) -> Result<ApplicationStatus> {
        self.status
            .parse()
            .map_err(|e: String| Error::Internal(format!("application {}: {}", self.id, e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Submitted,
    InReview,
    Approved,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::InReview,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::InReview => "IN_REVIEW",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Submitted, InReview)
                | (Submitted, Withdrawn)
                | (InReview, Approved)
                | (InReview, Rejected)
                | (InReview, Withdrawn)
        )
    }

    pub fn is_terminal(&self) -> bool {
        ApplicationStatus::ALL
            .iter()
            .all(|next| !self.can_transition_to(*next))
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUBMITTED" => Ok(ApplicationStatus::Submitted),
            "IN_REVIEW" => Ok(ApplicationStatus::InReview),
            "APPROVED" => Ok(ApplicationStatus::Approved),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            "WITHDRAWN" => Ok(ApplicationStatus::Withdrawn),
            other => Err(format!("unknown application status: {}", other)),
        }
    }
}

/// A validated status update. The reason is kept exactly when the target is REJECTED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    status: ApplicationStatus,
    reason: Option<String>,
}

impl StatusChange {
    pub fn new(status: ApplicationStatus, reason: Option<&str>) -> Result<Self> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        match (status, reason) {
            (ApplicationStatus::Rejected, None) => Err(Error::BadRequest(
                "A rejection reason is required when rejecting an application".into(),
            )),
            (ApplicationStatus::Rejected, Some(r)) => Ok(Self {
                status,
                reason: Some(r.to_string()),
            }),
            _ => Ok(Self {
                status,
                reason: None,
            }),
        }
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn check_from(&self, current: ApplicationStatus) -> Result<()> {
        if current.can_transition_to(self.status) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: current.to_string(),
                to: self.status.to_string(),
            })
        }
    }
}

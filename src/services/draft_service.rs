use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::draft::FormDraft;

/// Autosave slots of the form builder, one per owner and key, with optimistic
/// concurrency on `version`.
#[derive(Clone)]
pub struct DraftService {
    pool: PgPool,
}

impl DraftService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Writes the slot when `expected_version` matches the stored version (`0` for a
    /// new slot). A mismatch means another tab or device saved first.
    pub async fn save(
        &self,
        owner: Uuid,
        key: &str,
        expected_version: i32,
        form_id: Option<Uuid>,
        payload: JsonValue,
    ) -> Result<FormDraft> {
        let key = normalize_key(key)?;

        let saved = if expected_version == 0 {
            sqlx::query_as::<_, FormDraft>(
                r#"
                INSERT INTO form_drafts (owner_id, draft_key, form_id, version, payload)
                VALUES ($1, $2, $3, 1, $4)
                ON CONFLICT (owner_id, draft_key) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(owner)
            .bind(key)
            .bind(form_id)
            .bind(&payload)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, FormDraft>(
                r#"
                UPDATE form_drafts
                SET version = version + 1, form_id = $4, payload = $5, saved_at = NOW()
                WHERE owner_id = $1 AND draft_key = $2 AND version = $3
                RETURNING *
                "#,
            )
            .bind(owner)
            .bind(key)
            .bind(expected_version)
            .bind(form_id)
            .bind(&payload)
            .fetch_optional(&self.pool)
            .await?
        };

        match saved {
            Some(draft) => Ok(draft),
            None => {
                let current = self.find(owner, key).await?.map_or(0, |d| d.version);
                tracing::warn!(draft_key = key, expected_version, current, "draft save conflict");
                Err(Error::Conflict(format!(
                    "Draft '{}' is at version {}, not {}",
                    key, current, expected_version
                )))
            }
        }
    }

    pub async fn find(&self, owner: Uuid, key: &str) -> Result<Option<FormDraft>> {
        let key = normalize_key(key)?;
        let draft = sqlx::query_as::<_, FormDraft>(
            "SELECT * FROM form_drafts WHERE owner_id = $1 AND draft_key = $2",
        )
        .bind(owner)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(draft)
    }

    pub async fn get(&self, owner: Uuid, key: &str) -> Result<FormDraft> {
        self.find(owner, key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Draft '{}' not found", key.trim())))
    }

    pub async fn list(&self, owner: Uuid) -> Result<Vec<FormDraft>> {
        let drafts = sqlx::query_as::<_, FormDraft>(
            "SELECT * FROM form_drafts WHERE owner_id = $1 ORDER BY saved_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(drafts)
    }

    /// Newest draft that does not belong to a persisted form; only these are offered for
    /// restore when the builder opens empty.
    pub async fn latest_for_new_form(&self, owner: Uuid) -> Result<Option<FormDraft>> {
        let draft = sqlx::query_as::<_, FormDraft>(
            r#"
            SELECT * FROM form_drafts
            WHERE owner_id = $1 AND form_id IS NULL
            ORDER BY saved_at DESC
            LIMIT 1
            "#,
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(draft)
    }

    pub async fn delete(&self, owner: Uuid, key: &str) -> Result<()> {
        let key = normalize_key(key)?;
        sqlx::query("DELETE FROM form_drafts WHERE owner_id = $1 AND draft_key = $2")
            .bind(owner)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn purge_older_than(&self, days: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(days.max(1));
        let res = sqlx::query("DELETE FROM form_drafts WHERE saved_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

/// Draft keys are compared trimmed and must be 1 to 100 characters.
pub fn normalize_key(raw: &str) -> Result<&str> {
    let key = raw.trim();
    if key.is_empty() || key.chars().count() > 100 {
        return Err(Error::BadRequest("Draft key must be 1 to 100 characters".into()));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn keys_are_trimmed_on_every_path() {
        assert_eq!(assert_ok!(normalize_key(" new-form ")), "new-form");
        assert_eq!(assert_ok!(normalize_key("new-form")), "new-form");
    }

    #[test]
    fn blank_and_overlong_keys_are_refused() {
        assert_err!(normalize_key("   "));
        assert_err!(normalize_key(&"k".repeat(101)));
        assert_ok!(normalize_key(&"ä".repeat(100)));
    }
}

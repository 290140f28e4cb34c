use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::message::{CreateMessage, Message};

pub const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Clone)]
pub struct MessageService {
    pool: PgPool,
}

impl MessageService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, msg: CreateMessage) -> Result<Message> {
        let body = msg.body.trim();
        if body.is_empty() {
            return Err(Error::BadRequest("Message must not be empty".into()));
        }
        if body.chars().count() > MAX_MESSAGE_CHARS {
            return Err(Error::BadRequest(format!(
                "Message must not exceed {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (application_id, sender_id, sender_name, body)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(msg.application_id)
        .bind(msg.sender_id)
        .bind(&msg.sender_name)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    pub async fn get_by_application(&self, application_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE application_id = $1
            ORDER BY sent_at ASC, id ASC
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Senders may retract their own messages; privileged callers any message.
    pub async fn delete(
        &self,
        application_id: Uuid,
        message_id: Uuid,
        caller: Uuid,
        privileged: bool,
    ) -> Result<()> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE id = $1 AND application_id = $2",
        )
        .bind(message_id)
        .bind(application_id)
        .fetch_one(&self.pool)
        .await?;

        if !privileged && message.sender_id != caller {
            return Err(Error::Forbidden("Only the sender can delete this message".into()));
        }

        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

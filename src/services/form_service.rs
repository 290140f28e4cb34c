use std::collections::HashSet;

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::form_dto::{FormListQuery, SaveFormPayload};
use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::form::{Form, FormField, FormStatus};
use crate::services::schema_service::{Direction, SchemaService};
use crate::services::user_service::UserService;
use crate::utils::pagination::{page_window, PageWindow};

#[derive(Clone)]
pub struct FormService {
    pool: PgPool,
    user_service: UserService,
}

pub struct FormList {
    pub items: Vec<Form>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl FormService {
    pub fn new(pool: PgPool, user_service: UserService) -> Self {
        Self { pool, user_service }
    }

    /// The schema is checked before the author is looked up.
    pub async fn create(&self, auth: &AuthUser, payload: SaveFormPayload) -> Result<Form> {
        SchemaService::validate(&payload.fields)?;
        let author = self.user_service.resolve(auth).await?.id;

        let mut fields = payload.fields;
        for field in fields.iter_mut() {
            field.id = None;
        }
        let field_seq = SchemaService::assign_field_ids(&mut fields, 1);

        let mut tx = self.pool.begin().await?;
        let form = sqlx::query_as::<_, Form>(
            r#"
            INSERT INTO forms (title, description, category, status, fields, field_seq, created_by)
            VALUES ($1, $2, $3, 'DRAFT', $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(payload.title.trim())
        .bind(payload.description.unwrap_or_default())
        .bind(payload.category.unwrap_or_default())
        .bind(Json(&fields))
        .bind(field_seq)
        .bind(author)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(key) = payload.draft_key.as_deref() {
            discard_draft(&mut tx, author, key).await?;
        }
        tx.commit().await?;

        tracing::info!(form_id = %form.id, fields = fields.len(), "form created");
        Ok(form)
    }

    /// Replaces title, description, category and fields of a form that is not archived.
    pub async fn update(&self, id: Uuid, auth: &AuthUser, payload: SaveFormPayload) -> Result<Form> {
        SchemaService::validate(&payload.fields)?;
        let author = self.user_service.resolve(auth).await?.id;

        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Form>("SELECT * FROM forms WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !current.status().is_editable() {
            return Err(Error::Conflict(format!(
                "Form {} is {} and can no longer be edited",
                id,
                current.status()
            )));
        }

        let mut fields = payload.fields;
        keep_known_ids(&mut fields, &current.fields.0);
        let field_seq = SchemaService::assign_field_ids(&mut fields, current.field_seq);

        let form = sqlx::query_as::<_, Form>(
            r#"
            UPDATE forms
            SET title = $2,
                description = $3,
                category = $4,
                fields = $5,
                field_seq = $6,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(payload.title.trim())
        .bind(payload.description.unwrap_or_default())
        .bind(payload.category.unwrap_or_default())
        .bind(Json(&fields))
        .bind(field_seq)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(key) = payload.draft_key.as_deref() {
            discard_draft(&mut tx, author, key).await?;
        }
        tx.commit().await?;

        tracing::info!(form_id = %id, version = form.version, "form updated");
        Ok(form)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Form> {
        let form = sqlx::query_as::<_, Form>("SELECT * FROM forms WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(form)
    }

    pub async fn get_published(&self, id: Uuid) -> Result<Form> {
        let form = self.get_by_id(id).await?;
        if form.status() != FormStatus::Published {
            return Err(Error::NotFound(format!("Form {} is not published", id)));
        }
        Ok(form)
    }

    pub async fn list(&self, query: FormListQuery) -> Result<FormList> {
        let PageWindow {
            page,
            per_page,
            offset,
        } = page_window(query.page, query.per_page)?;

        let mut filters = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            let status: FormStatus = status.parse().map_err(Error::BadRequest)?;
            filters.push(format!("status = ${}", args.len() + 1));
            args.push(status.as_str().to_string());
        }
        if let Some(category) = query.category.filter(|c| !c.is_empty()) {
            filters.push(format!("category = ${}", args.len() + 1));
            args.push(category);
        }
        if let Some(search) = query.search.filter(|s| !s.is_empty()) {
            let first = args.len() + 1;
            let second = first + 1;
            filters.push(format!(
                "(title ILIKE ${} OR description ILIKE ${})",
                first, second
            ));
            args.push(format!("%{}%", search));
            args.push(format!("%{}%", search));
        }

        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let items_query = format!(
            "SELECT * FROM forms {} ORDER BY COALESCE(updated_at, created_at) DESC LIMIT ${} OFFSET ${}",
            where_clause,
            args.len() + 1,
            args.len() + 2
        );
        let total_query = format!("SELECT COUNT(*) FROM forms {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, Form>(&items_query);
        for value in &args {
            items_statement = items_statement.bind(value);
        }
        items_statement = items_statement.bind(per_page).bind(offset);
        let items = items_statement.fetch_all(&self.pool).await?;

        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_query);
        for value in &args {
            total_statement = total_statement.bind(value);
        }
        let total = total_statement.fetch_one(&self.pool).await?;

        let total_pages = ((total as f64) / (per_page as f64)).ceil() as i64;

        Ok(FormList {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn list_published(&self) -> Result<Vec<Form>> {
        let items = sqlx::query_as::<_, Form>(
            r#"
            SELECT * FROM forms
            WHERE status = 'PUBLISHED'
            ORDER BY category ASC, title ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn publish(&self, id: Uuid) -> Result<Form> {
        self.transition(id, FormStatus::Published).await
    }

    pub async fn archive(&self, id: Uuid) -> Result<Form> {
        self.transition(id, FormStatus::Archived).await
    }

    async fn transition(&self, id: Uuid, next: FormStatus) -> Result<Form> {
        let current = self.get_by_id(id).await?;
        let from = current.status();
        if !from.can_transition_to(next) {
            tracing::warn!(form_id = %id, from = %from, to = %next, "form transition refused");
            return Err(Error::InvalidTransition {
                from: from.to_string(),
                to: next.to_string(),
            });
        }
        if next == FormStatus::Published && current.fields.0.is_empty() {
            return Err(Error::BadRequest("A form without fields cannot be published".into()));
        }

        let form = sqlx::query_as::<_, Form>(
            r#"
            UPDATE forms
            SET status = $3,
                published_at = CASE WHEN $3 = 'PUBLISHED' THEN NOW() ELSE published_at END,
                archived_at = CASE WHEN $3 = 'ARCHIVED' THEN NOW() ELSE archived_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Conflict(format!("Form {} changed concurrently", id)))?;

        tracing::info!(form_id = %id, from = %from, to = %next, "form status changed");
        Ok(form)
    }

    pub async fn move_field(&self, id: Uuid, field_id: i32, direction: Direction) -> Result<Form> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Form>("SELECT * FROM forms WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !current.status().is_editable() {
            return Err(Error::Conflict(format!("Form {} can no longer be edited", id)));
        }

        let fields = SchemaService::move_field(&current.fields.0, field_id, direction)?;
        let form = sqlx::query_as::<_, Form>(
            r#"
            UPDATE forms
            SET fields = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(&fields))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(form)
    }

    /// Forms that already received applications stay; their applications keep the snapshot.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let res = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Form {} not found", id)));
        }
        tracing::info!(form_id = %id, "form deleted");
        Ok(())
    }
}

/// Ids the client sends must belong to the stored schema and appear once; anything
/// else is treated as a new field.
fn keep_known_ids(fields: &mut [FormField], stored: &[FormField]) {
    let known: HashSet<i32> = stored.iter().filter_map(|f| f.id).collect();
    let mut seen = HashSet::new();
    for field in fields.iter_mut() {
        if let Some(id) = field.id {
            if !known.contains(&id) || !seen.insert(id) {
                field.id = None;
            }
        }
    }
}

async fn discard_draft(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    owner: Uuid,
    key: &str,
) -> Result<()> {
    sqlx::query("DELETE FROM form_drafts WHERE owner_id = $1 AND draft_key = $2")
        .bind(owner)
        .bind(key.trim())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::form::FieldType;

    #[test]
    fn foreign_and_repeated_ids_are_dropped() {
        let mut stored = FormField::new("a", FieldType::Text, "A", 1);
        stored.id = Some(1);

        let mut kept = stored.clone();
        let mut repeated = FormField::new("b", FieldType::Text, "B", 2);
        repeated.id = Some(1);
        let mut foreign = FormField::new("c", FieldType::Text, "C", 3);
        foreign.id = Some(99);
        let mut fields = vec![kept.clone(), repeated, foreign];

        keep_known_ids(&mut fields, &[stored]);
        kept.id = Some(1);
        assert_eq!(fields[0], kept);
        assert_eq!(fields[1].id, None);
        assert_eq!(fields[2].id, None);
    }
}

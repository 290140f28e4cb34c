use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::application_dto::{
    ApplicationDetail, ApplicationListQuery, FormViewRow, SubmitApplicationPayload,
    UpdateApplicationPayload,
};
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus, StatusChange};
use crate::models::form::{FormSnapshot, FormStatus};
use crate::models::user::User;
use crate::services::audit_service::AuditService;
use crate::services::document_service::DocumentService;
use crate::services::form_service::FormService;
use crate::services::render_service::RenderService;
use crate::services::schema_service::SchemaService;
use crate::utils::pagination::{page_window, PageWindow};

#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
    form_service: FormService,
    document_service: DocumentService,
    audit_service: AuditService,
}

pub struct ApplicationList {
    pub items: Vec<Application>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Typed bind values of the reviewer list filter.
enum FilterArg {
    Text(String),
    Id(Uuid),
    Time(chrono::DateTime<Utc>),
}

impl ApplicationService {
    pub fn new(
        pool: PgPool,
        form_service: FormService,
        document_service: DocumentService,
        audit_service: AuditService,
    ) -> Self {
        Self {
            pool,
            form_service,
            document_service,
            audit_service,
        }
    }

    pub async fn submit(&self, applicant: &User, payload: SubmitApplicationPayload) -> Result<Application> {
        check_amount(payload.amount)?;
        let form = self.form_service.get_by_id(payload.form_id).await?;
        if form.status() != FormStatus::Published {
            return Err(Error::BadRequest(format!(
                "Form {} is not open for applications",
                form.id
            )));
        }

        let snapshot = FormSnapshot::from(&form);
        let answers = RenderService::validate_answers(&snapshot.fields, &payload.answers)?;

        let application = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (
                form_id, title, description, amount, applicant_id, applicant_name,
                status, form_snapshot, answers, answers_canonical
            ) VALUES ($1, $2, $3, $4, $5, $6, 'SUBMITTED', $7, $8, TRUE)
            RETURNING *
            "#,
        )
        .bind(form.id)
        .bind(payload.title.trim())
        .bind(payload.description)
        .bind(payload.amount)
        .bind(applicant.id)
        .bind(&applicant.name)
        .bind(Json(&snapshot))
        .bind(Json(&answers))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            application_id = %application.id,
            form_id = %form.id,
            form_version = snapshot.version,
            "application submitted"
        );
        Ok(application)
    }

    /// Owner edit while the application is still SUBMITTED. Answers are checked against
    /// the snapshot the application was filed with.
    pub async fn update(
        &self,
        applicant: &User,
        id: Uuid,
        payload: UpdateApplicationPayload,
    ) -> Result<Application> {
        check_amount(payload.amount)?;
        let current = self.get_by_id(id).await?;
        ensure_owner(&current, applicant)?;
        if current.status()? != ApplicationStatus::Submitted {
            return Err(Error::Conflict(format!(
                "Application {} is {} and can no longer be edited",
                id, current.status
            )));
        }

        let answers = match payload.answers {
            Some(answers) => {
                RenderService::validate_answers(&current.form_snapshot.0.fields, &answers)?
            }
            None => current.answers.0.clone(),
        };

        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                amount = COALESCE($4, amount),
                answers = $5,
                answers_canonical = TRUE,
                edited_at = NOW()
            WHERE id = $1 AND status = 'SUBMITTED'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(payload.title.as_deref().map(str::trim))
        .bind(payload.description)
        .bind(payload.amount)
        .bind(Json(&answers))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Conflict(format!("Application {} changed concurrently", id)))?;

        Ok(application)
    }

    pub async fn withdraw(&self, applicant: &User, id: Uuid) -> Result<Application> {
        let current = self.get_by_id(id).await?;
        ensure_owner(&current, applicant)?;
        let change = StatusChange::new(ApplicationStatus::Withdrawn, None)?;
        self.apply_status(current, &change, applicant.id, "application.withdraw")
            .await
    }

    /// Owners may delete while SUBMITTED or WITHDRAWN; privileged callers always.
    pub async fn delete(&self, caller: &User, privileged: bool, id: Uuid) -> Result<()> {
        let current = self.get_by_id(id).await?;
        if !privileged {
            ensure_owner(&current, caller)?;
            let status = current.status()?;
            if !matches!(status, ApplicationStatus::Submitted | ApplicationStatus::Withdrawn) {
                return Err(Error::Conflict(format!(
                    "Application {} is {} and cannot be deleted",
                    id, status
                )));
            }
        }

        sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.document_service.remove_application_files(id).await;
        self.audit_service
            .record(Some(caller.id), "application.delete", "application", id, None)
            .await;
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Application> {
        let application =
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(application)
    }

    /// Loads an application the caller may see: the owner or a privileged user.
    pub async fn get_visible(&self, caller: &User, privileged: bool, id: Uuid) -> Result<Application> {
        let application = self.get_by_id(id).await?;
        if !privileged {
            ensure_owner(&application, caller)?;
        }
        Ok(application)
    }

    pub async fn detail(&self, caller: &User, privileged: bool, id: Uuid) -> Result<ApplicationDetail> {
        let application = self.get_visible(caller, privileged, id).await?;
        let form_view = form_view(&application);
        Ok(ApplicationDetail {
            application,
            form_view,
        })
    }

    pub async fn list_mine(&self, applicant: &User) -> Result<Vec<Application>> {
        let items = sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE applicant_id = $1
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(applicant.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Reviewer list. Every given filter must match; `from` and `to` are inclusive days.
    pub async fn list(&self, query: ApplicationListQuery) -> Result<ApplicationList> {
        let PageWindow {
            page,
            per_page,
            offset,
        } = page_window(query.page, query.per_page)?;

        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(Error::BadRequest("`from` must not be after `to`".into()));
            }
        }

        let mut filters = Vec::new();
        let mut args: Vec<FilterArg> = Vec::new();

        if let Some(status) = query.status {
            filters.push(format!("status = ${}", args.len() + 1));
            args.push(FilterArg::Text(status.as_str().to_string()));
        }
        if let Some(applicant_id) = query.applicant_id {
            filters.push(format!("applicant_id = ${}", args.len() + 1));
            args.push(FilterArg::Id(applicant_id));
        }
        if let Some(from) = query.from {
            filters.push(format!("submitted_at >= ${}", args.len() + 1));
            args.push(FilterArg::Time(start_of_day(from)));
        }
        if let Some(to) = query.to {
            filters.push(format!("submitted_at < ${}", args.len() + 1));
            args.push(FilterArg::Time(end_of_range(to)?));
        }

        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let items_query = format!(
            "SELECT * FROM applications {} ORDER BY submitted_at DESC LIMIT ${} OFFSET ${}",
            where_clause,
            args.len() + 1,
            args.len() + 2
        );
        let total_query = format!("SELECT COUNT(*) FROM applications {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, Application>(&items_query);
        for value in &args {
            items_statement = match value {
                FilterArg::Text(v) => items_statement.bind(v),
                FilterArg::Id(v) => items_statement.bind(v),
                FilterArg::Time(v) => items_statement.bind(v),
            };
        }
        items_statement = items_statement.bind(per_page).bind(offset);
        let items = items_statement.fetch_all(&self.pool).await?;

        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_query);
        for value in &args {
            total_statement = match value {
                FilterArg::Text(v) => total_statement.bind(v),
                FilterArg::Id(v) => total_statement.bind(v),
                FilterArg::Time(v) => total_statement.bind(v),
            };
        }
        let total = total_statement.fetch_one(&self.pool).await?;

        let total_pages = ((total as f64) / (per_page as f64)).ceil() as i64;

        Ok(ApplicationList {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn update_status(
        &self,
        reviewer: &User,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Application> {
        let current = self.get_by_id(id).await?;
        self.apply_status(current, change, reviewer.id, "application.status")
            .await
    }

    async fn apply_status(
        &self,
        current: Application,
        change: &StatusChange,
        actor: Uuid,
        action: &str,
    ) -> Result<Application> {
        let from = current.status()?;
        if let Err(err) = change.check_from(from) {
            tracing::warn!(application_id = %current.id, from = %from, to = %change.status(), "status change refused");
            return Err(err);
        }

        let reviewed = !matches!(change.status(), ApplicationStatus::Withdrawn);
        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = $3,
                rejection_reason = $4,
                reviewer_id = CASE WHEN $5 THEN $6 ELSE reviewer_id END,
                reviewed_at = CASE WHEN $5 THEN NOW() ELSE reviewed_at END
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(from.as_str())
        .bind(change.status().as_str())
        .bind(change.reason())
        .bind(reviewed)
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Conflict(format!("Application {} changed concurrently", current.id)))?;

        self.audit_service
            .record(
                Some(actor),
                action,
                "application",
                application.id,
                Some(json!({
                    "from": from.as_str(),
                    "to": change.status().as_str(),
                    "reason": change.reason(),
                })),
            )
            .await;
        tracing::info!(application_id = %application.id, from = %from, to = %change.status(), "application status changed");
        Ok(application)
    }

    /// Re-keys answer maps stored before answers were keyed by field id.
    /// Also turns legacy unmapped autofill flags of the snapshot into explicit mappings.
    pub async fn migrate_legacy_answers(&self) -> Result<u64> {
        let pending = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE answers_canonical = FALSE",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut migrated = 0;
        for application in pending {
            let mut snapshot = application.form_snapshot.0.clone();
            let next_id = snapshot
                .fields
                .iter()
                .filter_map(|f| f.id)
                .max()
                .map_or(1, |max| max + 1);
            SchemaService::assign_field_ids(&mut snapshot.fields, next_id);
            for field in snapshot.fields.iter_mut() {
                if field.autofill && field.autofill_attribute.is_none() {
                    field.autofill_attribute = RenderService::infer_legacy_autofill(field);
                    field.autofill = field.autofill_attribute.is_some();
                }
            }
            let answers = RenderService::canonicalize_legacy(&snapshot.fields, &application.answers.0);

            sqlx::query(
                r#"
                UPDATE applications
                SET form_snapshot = $2, answers = $3, answers_canonical = TRUE
                WHERE id = $1
                "#,
            )
            .bind(application.id)
            .bind(Json(&snapshot))
            .bind(Json(&answers))
            .execute(&self.pool)
            .await?;
            migrated += 1;
        }

        if migrated > 0 {
            tracing::info!(migrated, "legacy answer maps re-keyed by field id");
        }
        Ok(migrated)
    }
}

fn ensure_owner(application: &Application, caller: &User) -> Result<()> {
    if application.applicant_id == caller.id {
        Ok(())
    } else {
        Err(Error::Forbidden("Not your application".into()))
    }
}

fn check_amount(amount: Option<Decimal>) -> Result<()> {
    match amount {
        Some(a) if a.is_sign_negative() => Err(Error::BadRequest("Amount must not be negative".into())),
        _ => Ok(()),
    }
}

fn start_of_day(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// Exclusive upper bound of an inclusive `to` day.
fn end_of_range(to: NaiveDate) -> Result<chrono::DateTime<Utc>> {
    to.succ_opt()
        .map(start_of_day)
        .ok_or_else(|| Error::BadRequest(format!("`to` date {} is out of range", to)))
}

/// Read-only rows of the snapshot schema, in display order.
pub fn form_view(application: &Application) -> Vec<FormViewRow> {
    SchemaService::sorted(&application.form_snapshot.0.fields)
        .into_iter()
        .map(|field| {
            let value = RenderService::lookup_answer(&field, &application.answers.0).value();
            FormViewRow {
                field_id: field.id,
                display: RenderService::display_value(&field, value),
                value: value.cloned().unwrap_or(JsonValue::Null),
                name: field.name,
                label: field.label,
                field_type: field.field_type,
            }
        })
        .collect()
}

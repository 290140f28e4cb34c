use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::application_dto::{
        ApplicationListQuery, ApplicationListResponse, RejectPayload, StatusUpdatePayload,
    },
    error::Result,
    middleware::auth::AuthUser,
    models::application::{Application, ApplicationStatus, StatusChange},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/review/applications",
    params(
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Items per page"),
        ("status" = Option<String>, Query, description = "Application status"),
        ("applicant_id" = Option<Uuid>, Query, description = "Applicant"),
        ("from" = Option<String>, Query, description = "Submitted on or after (YYYY-MM-DD)"),
        ("to" = Option<String>, Query, description = "Submitted on or before (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Applications matching every filter", body = Json<ApplicationListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<AppState>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<impl IntoResponse> {
    let result = state.application_service.list(query).await?;
    Ok(Json(ApplicationListResponse::from(result)))
}

#[utoipa::path(
    patch,
    path = "/api/review/applications/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = StatusUpdatePayload,
    responses(
        (status = 200, description = "Status changed", body = Json<Application>),
        (status = 400, description = "Rejection without reason"),
        (status = 409, description = "Transition not allowed")
    )
)]
#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdatePayload>,
) -> Result<impl IntoResponse> {
    let change = StatusChange::new(payload.status, payload.reason.as_deref())?;
    apply(&state, &auth, id, change).await
}

#[utoipa::path(
    post,
    path = "/api/review/applications/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Application approved", body = Json<Application>),
        (status = 409, description = "Application is not IN_REVIEW")
    )
)]
#[axum::debug_handler]
pub async fn approve(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let change = StatusChange::new(ApplicationStatus::Approved, None)?;
    apply(&state, &auth, id, change).await
}

#[utoipa::path(
    post,
    path = "/api/review/applications/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Application rejected", body = Json<Application>),
        (status = 400, description = "Missing reason"),
        (status = 409, description = "Application is not IN_REVIEW")
    )
)]
#[axum::debug_handler]
pub async fn reject(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<impl IntoResponse> {
    let change = StatusChange::new(ApplicationStatus::Rejected, Some(&payload.reason))?;
    apply(&state, &auth, id, change).await
}

async fn apply(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    change: StatusChange,
) -> Result<Json<Application>> {
    let reviewer = state.user_service.resolve(auth).await?;
    let application = state
        .application_service
        .update_status(&reviewer, id, &change)
        .await?;
    Ok(Json(application))
}

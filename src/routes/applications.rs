use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::application_dto::{
        ApplicationDetail, ApplicationSummary, SubmitApplicationPayload, UpdateApplicationPayload,
    },
    error::Result,
    middleware::auth::AuthUser,
    models::application::Application,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = SubmitApplicationPayload,
    responses(
        (status = 201, description = "Application submitted", body = Json<Application>),
        (status = 400, description = "Invalid answers or form not open")
    )
)]
#[axum::debug_handler]
pub async fn submit_application(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<SubmitApplicationPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let applicant = state.user_service.resolve(&auth).await?;
    let application = state.application_service.submit(&applicant, payload).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

#[utoipa::path(
    get,
    path = "/api/applications/my",
    responses(
        (status = 200, description = "Applications of the caller", body = [ApplicationSummary])
    )
)]
#[axum::debug_handler]
pub async fn my_applications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let applicant = state.user_service.resolve(&auth).await?;
    let items = state.application_service.list_mine(&applicant).await?;
    let items: Vec<ApplicationSummary> = items.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Application with its form view", body = Json<ApplicationDetail>),
        (status = 403, description = "Not the applicant"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let caller = state.user_service.resolve(&auth).await?;
    let detail = state
        .application_service
        .detail(&caller, auth.privileged, id)
        .await?;
    Ok(Json(detail))
}

#[utoipa::path(
    put,
    path = "/api/applications/{id}",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = UpdateApplicationPayload,
    responses(
        (status = 200, description = "Application updated", body = Json<Application>),
        (status = 400, description = "Invalid answers"),
        (status = 409, description = "Application is no longer editable")
    )
)]
#[axum::debug_handler]
pub async fn update_application(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApplicationPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let applicant = state.user_service.resolve(&auth).await?;
    let application = state
        .application_service
        .update(&applicant, id, payload)
        .await?;
    Ok(Json(application))
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/withdraw",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Application withdrawn", body = Json<Application>),
        (status = 409, description = "Application can no longer be withdrawn")
    )
)]
#[axum::debug_handler]
pub async fn withdraw_application(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let applicant = state.user_service.resolve(&auth).await?;
    let application = state.application_service.withdraw(&applicant, id).await?;
    Ok(Json(application))
}

#[utoipa::path(
    delete,
    path = "/api/applications/{id}",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 204, description = "Application deleted"),
        (status = 403, description = "Not the applicant"),
        (status = 409, description = "Application is under review or decided")
    )
)]
#[axum::debug_handler]
pub async fn delete_application(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let caller = state.user_service.resolve(&auth).await?;
    state
        .application_service
        .delete(&caller, auth.privileged, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

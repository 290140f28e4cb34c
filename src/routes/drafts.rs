use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::draft_dto::{DraftSaved, SaveDraftPayload},
    error::Result,
    middleware::auth::AuthUser,
    models::draft::FormDraft,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/drafts",
    responses(
        (status = 200, description = "Drafts of the caller, newest first", body = [FormDraft])
    )
)]
#[axum::debug_handler]
pub async fn list_drafts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let owner = state.user_service.resolve(&auth).await?;
    let drafts = state.draft_service.list(owner.id).await?;
    Ok(Json(drafts))
}

#[utoipa::path(
    get,
    path = "/api/drafts/latest",
    responses(
        (status = 200, description = "Newest draft of a form that was never saved", body = Json<FormDraft>),
        (status = 204, description = "Nothing to restore")
    )
)]
#[axum::debug_handler]
pub async fn latest_draft(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<axum::response::Response> {
    let owner = state.user_service.resolve(&auth).await?;
    Ok(match state.draft_service.latest_for_new_form(owner.id).await? {
        Some(draft) => Json(draft).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

#[utoipa::path(
    get,
    path = "/api/drafts/{key}",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 200, description = "Draft", body = Json<FormDraft>),
        (status = 404, description = "No draft under this key")
    )
)]
#[axum::debug_handler]
pub async fn get_draft(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let owner = state.user_service.resolve(&auth).await?;
    let draft = state.draft_service.get(owner.id, &key).await?;
    Ok(Json(draft))
}

#[utoipa::path(
    put,
    path = "/api/drafts/{key}",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    request_body = SaveDraftPayload,
    responses(
        (status = 200, description = "Draft saved", body = Json<DraftSaved>),
        (status = 409, description = "Draft was saved elsewhere in the meantime")
    )
)]
#[axum::debug_handler]
pub async fn save_draft(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(key): Path<String>,
    Json(payload): Json<SaveDraftPayload>,
) -> Result<impl IntoResponse> {
    let owner = state.user_service.resolve(&auth).await?;
    let draft = state
        .draft_service
        .save(
            owner.id,
            &key,
            payload.expected_version,
            payload.form_id,
            payload.payload,
        )
        .await?;
    Ok(Json(DraftSaved {
        draft_key: draft.draft_key,
        version: draft.version,
        saved_at: draft.saved_at,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/drafts/{key}",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 204, description = "Draft discarded")
    )
)]
#[axum::debug_handler]
pub async fn delete_draft(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let owner = state.user_service.resolve(&auth).await?;
    state.draft_service.delete(owner.id, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

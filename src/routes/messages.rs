use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::communication_dto::SendMessagePayload,
    error::Result,
    middleware::auth::AuthUser,
    models::message::{CreateMessage, Message},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/applications/{id}/messages",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Messages, oldest first", body = [Message]),
        (status = 403, description = "Not the applicant")
    )
)]
#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let caller = state.user_service.resolve(&auth).await?;
    state
        .application_service
        .get_visible(&caller, auth.privileged, id)
        .await?;
    let messages = state.message_service.get_by_application(id).await?;
    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/messages",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = SendMessagePayload,
    responses(
        (status = 201, description = "Message sent", body = Json<Message>),
        (status = 400, description = "Empty or oversized message")
    )
)]
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let sender = state.user_service.resolve(&auth).await?;
    state
        .application_service
        .get_visible(&sender, auth.privileged, id)
        .await?;
    let message = state
        .message_service
        .create(CreateMessage {
            application_id: id,
            sender_id: sender.id,
            sender_name: sender.name,
            body: payload.body,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    delete,
    path = "/api/applications/{id}/messages/{message_id}",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("message_id" = Uuid, Path, description = "Message ID")
    ),
    responses(
        (status = 204, description = "Message deleted"),
        (status = 403, description = "Not the sender"),
        (status = 404, description = "Message not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let caller = state.user_service.resolve(&auth).await?;
    state
        .application_service
        .get_visible(&caller, auth.privileged, id)
        .await?;
    state
        .message_service
        .delete(id, message_id, caller.id, auth.privileged)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

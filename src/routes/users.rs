use axum::{
    extract::State,
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::user_dto::{MeResponse, UserResponse},
    error::Result,
    middleware::auth::AuthUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Signed-in user", body = Json<MeResponse>),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let profile = state
        .identity_service
        .profile(&auth.claims, &auth.token)
        .await?;
    let user = state.user_service.upsert(&auth, &profile).await?;
    Ok(Json(MeResponse {
        id: user.id,
        subject: user.subject,
        name: user.name,
        email: user.email,
        role: user.role,
        privileged: auth.privileged,
        profile,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Known users", body = [UserResponse]),
        (status = 403, description = "Caller is not a reviewer")
    )
)]
#[axum::debug_handler]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.user_service.list().await?;
    let items: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

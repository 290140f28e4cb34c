use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::form_dto::{FormResponse, PublishedFormSummary},
    error::Result,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/public/forms",
    responses(
        (status = 200, description = "Published forms", body = [PublishedFormSummary])
    )
)]
#[axum::debug_handler]
pub async fn list_published_forms(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let forms = state.form_service.list_published().await?;
    let items: Vec<PublishedFormSummary> = forms.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/public/forms/{id}",
    params(
        ("id" = Uuid, Path, description = "Form ID")
    ),
    responses(
        (status = 200, description = "Published form", body = Json<FormResponse>),
        (status = 404, description = "Form not found or not published")
    )
)]
#[axum::debug_handler]
pub async fn get_published_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let form = state.form_service.get_published(id).await?;
    Ok(Json(FormResponse::from(form)))
}

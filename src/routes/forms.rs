use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::form_dto::{
        FormListQuery, FormListResponse, FormResponse, MoveFieldPayload, PublishedFormSummary,
        RenderedFormResponse, SaveFormPayload,
    },
    error::Result,
    middleware::auth::AuthUser,
    services::render_service::RenderService,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/forms",
    request_body = SaveFormPayload,
    responses(
        (status = 201, description = "Form created as DRAFT", body = Json<FormResponse>),
        (status = 400, description = "Invalid form schema")
    )
)]
#[axum::debug_handler]
pub async fn create_form(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<SaveFormPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let form = state.form_service.create(&auth, payload).await?;
    Ok((StatusCode::CREATED, Json(FormResponse::from(form))))
}

#[utoipa::path(
    put,
    path = "/api/forms/{id}",
    params(
        ("id" = Uuid, Path, description = "Form ID")
    ),
    request_body = SaveFormPayload,
    responses(
        (status = 200, description = "Form saved", body = Json<FormResponse>),
        (status = 400, description = "Invalid form schema"),
        (status = 404, description = "Form not found"),
        (status = 409, description = "Form is archived")
    )
)]
#[axum::debug_handler]
pub async fn update_form(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaveFormPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let form = state.form_service.update(id, &auth, payload).await?;
    Ok(Json(FormResponse::from(form)))
}

#[utoipa::path(
    get,
    path = "/api/forms",
    params(
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Items per page"),
        ("status" = Option<String>, Query, description = "DRAFT, PUBLISHED or ARCHIVED"),
        ("category" = Option<String>, Query, description = "Exact category"),
        ("search" = Option<String>, Query, description = "Search in title and description")
    ),
    responses(
        (status = 200, description = "Forms", body = Json<FormListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_forms(
    State(state): State<AppState>,
    Query(query): Query<FormListQuery>,
) -> Result<impl IntoResponse> {
    let result = state.form_service.list(query).await?;
    Ok(Json(FormListResponse::from(result)))
}

#[utoipa::path(
    get,
    path = "/api/forms/{id}",
    params(
        ("id" = Uuid, Path, description = "Form ID")
    ),
    responses(
        (status = 200, description = "Form found", body = Json<FormResponse>),
        (status = 404, description = "Form not found")
    )
)]
#[axum::debug_handler]
pub async fn get_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let form = state.form_service.get_by_id(id).await?;
    Ok(Json(FormResponse::from(form)))
}

#[utoipa::path(
    delete,
    path = "/api/forms/{id}",
    params(
        ("id" = Uuid, Path, description = "Form ID")
    ),
    responses(
        (status = 204, description = "Form deleted"),
        (status = 404, description = "Form not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.form_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/forms/{id}/publish",
    params(
        ("id" = Uuid, Path, description = "Form ID")
    ),
    responses(
        (status = 200, description = "Form published", body = Json<FormResponse>),
        (status = 409, description = "Form is not a DRAFT")
    )
)]
#[axum::debug_handler]
pub async fn publish_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let form = state.form_service.publish(id).await?;
    Ok(Json(FormResponse::from(form)))
}

#[utoipa::path(
    post,
    path = "/api/forms/{id}/archive",
    params(
        ("id" = Uuid, Path, description = "Form ID")
    ),
    responses(
        (status = 200, description = "Form archived", body = Json<FormResponse>),
        (status = 409, description = "Form is not PUBLISHED")
    )
)]
#[axum::debug_handler]
pub async fn archive_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let form = state.form_service.archive(id).await?;
    Ok(Json(FormResponse::from(form)))
}

#[utoipa::path(
    post,
    path = "/api/forms/{id}/fields/{field_id}/move",
    params(
        ("id" = Uuid, Path, description = "Form ID"),
        ("field_id" = i32, Path, description = "Field ID")
    ),
    request_body = MoveFieldPayload,
    responses(
        (status = 200, description = "Field moved", body = Json<FormResponse>),
        (status = 400, description = "Field is already first or last"),
        (status = 404, description = "Form or field not found")
    )
)]
#[axum::debug_handler]
pub async fn move_field(
    State(state): State<AppState>,
    Path((id, field_id)): Path<(Uuid, i32)>,
    Json(payload): Json<MoveFieldPayload>,
) -> Result<impl IntoResponse> {
    let form = state
        .form_service
        .move_field(id, field_id, payload.direction)
        .await?;
    Ok(Json(FormResponse::from(form)))
}

#[utoipa::path(
    get,
    path = "/api/forms/published",
    responses(
        (status = 200, description = "Forms open for applications", body = [PublishedFormSummary])
    )
)]
#[axum::debug_handler]
pub async fn list_open_forms(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let forms = state.form_service.list_published().await?;
    let items: Vec<PublishedFormSummary> = forms.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/forms/{id}/render",
    params(
        ("id" = Uuid, Path, description = "Form ID")
    ),
    responses(
        (status = 200, description = "Fillable form with initial values", body = Json<RenderedFormResponse>),
        (status = 404, description = "Form not found or not published")
    )
)]
#[axum::debug_handler]
pub async fn render_form(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let form = state.form_service.get_published(id).await?;
    let profile = state
        .identity_service
        .profile(&auth.claims, &auth.token)
        .await?;
    let fields = RenderService::render(&form.fields.0, Some(&profile));
    Ok(Json(RenderedFormResponse {
        id: form.id,
        title: form.title,
        description: form.description,
        category: form.category,
        version: form.version,
        fields,
    }))
}

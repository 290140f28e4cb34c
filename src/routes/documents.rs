use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use bytes::{Bytes, BytesMut};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    middleware::auth::AuthUser,
    models::document::Document,
    utils::content_disposition,
    AppState,
};

/// Reads the `file` part, refusing it as soon as it grows past `cap` bytes.
async fn read_file_part(multipart: &mut Multipart, cap: u64) -> Result<(String, Bytes)> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::BadRequest("The file part has no filename".into()))?;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            if (buffer.len() + chunk.len()) as u64 > cap {
                tracing::warn!(filename = %filename, cap, "upload exceeds size limit");
                return Err(Error::PayloadTooLarge(format!(
                    "Files may not exceed {} MB",
                    cap / (1024 * 1024)
                )));
            }
            buffer.extend_from_slice(&chunk);
        }
        return Ok((filename, buffer.freeze()));
    }
    Err(Error::BadRequest("Missing multipart field `file`".into()))
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/documents",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 201, description = "Document stored", body = Json<Document>),
        (status = 400, description = "File type not allowed"),
        (status = 413, description = "File too large")
    )
)]
#[axum::debug_handler]
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (filename, data) = read_file_part(&mut multipart, state.config.max_upload_bytes()).await?;

    let uploader = state.user_service.resolve(&auth).await?;
    state
        .application_service
        .get_visible(&uploader, auth.privileged, id)
        .await?;
    let document = state
        .document_service
        .store(id, &uploader, &filename, data)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}/documents",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Documents of the application", body = [Document])
    )
)]
#[axum::debug_handler]
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let caller = state.user_service.resolve(&auth).await?;
    state
        .application_service
        .get_visible(&caller, auth.privileged, id)
        .await?;
    let documents = state.document_service.list(id).await?;
    Ok(Json(documents))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}/documents/{document_id}/download",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("document_id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 404, description = "Document not found")
    )
)]
#[axum::debug_handler]
pub async fn download_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let caller = state.user_service.resolve(&auth).await?;
    state
        .application_service
        .get_visible(&caller, auth.privileged, id)
        .await?;
    let document = state.document_service.get(id, document_id).await?;
    let file = state.document_service.open(&document).await?;

    let headers = [
        (header::CONTENT_TYPE, document.content_type.clone()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition::attachment(&document.filename),
        ),
        (header::CONTENT_LENGTH, document.size_bytes.to_string()),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}

#[utoipa::path(
    delete,
    path = "/api/applications/{id}/documents/{document_id}",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("document_id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 403, description = "Not the uploader")
    )
)]
#[axum::debug_handler]
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let caller = state.user_service.resolve(&auth).await?;
    state
        .application_service
        .get_visible(&caller, auth.privileged, id)
        .await?;
    state
        .document_service
        .delete(id, document_id, caller.id, auth.privileged)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

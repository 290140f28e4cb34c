use std::path::{Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::fs;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::document::Document;
use crate::models::user::User;

pub const ALLOWED_EXTENSIONS: [&str; 11] = [
    "pdf", "doc", "docx", "odt", "txt", "rtf", "xlsx", "jpg", "jpeg", "png", "webp",
];

#[derive(Clone)]
pub struct DocumentService {
    pool: PgPool,
    uploads_dir: PathBuf,
}

impl DocumentService {
    pub fn new(pool: PgPool, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Checks the file, writes it to `<uploads>/<application>/<uuid>.<ext>` and records it.
    pub async fn store(
        &self,
        application_id: Uuid,
        uploader: &User,
        filename: &str,
        data: Bytes,
    ) -> Result<Document> {
        let filename = sanitize_filename(filename);
        let ext = allowed_extension(&filename)?;
        check_content(&ext, &data)?;

        let dir = self.application_dir(application_id);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        fs::write(&path, &data).await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "failed to write document");
            Error::Internal(format!("Failed to save file: {}", e))
        })?;

        let checksum = hex::encode(Sha256::digest(&data));
        let inserted = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (
                application_id, filename, content_type, size_bytes, sha256,
                storage_path, uploaded_by, uploader_name
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(application_id)
        .bind(&filename)
        .bind(content_type_for(&ext))
        .bind(data.len() as i64)
        .bind(&checksum)
        .bind(path.to_string_lossy().as_ref())
        .bind(uploader.id)
        .bind(&uploader.name)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(document) => {
                tracing::info!(document_id = %document.id, %application_id, size = data.len(), "document stored");
                Ok(document)
            }
            Err(e) => {
                remove_quietly(&path).await;
                Err(e.into())
            }
        }
    }

    pub async fn list(&self, application_id: Uuid) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(
            r#"
            SELECT * FROM documents
            WHERE application_id = $1
            ORDER BY uploaded_at ASC
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    pub async fn get(&self, application_id: Uuid, document_id: Uuid) -> Result<Document> {
        let document = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE id = $1 AND application_id = $2",
        )
        .bind(document_id)
        .bind(application_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(document)
    }

    pub async fn open(&self, document: &Document) -> Result<fs::File> {
        fs::File::open(&document.storage_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::error!(document_id = %document.id, "stored file is missing");
                Error::NotFound(format!("File of document {} is missing", document.id))
            } else {
                Error::Io(e)
            }
        })
    }

    /// Uploaders may delete their own documents; privileged callers any document.
    pub async fn delete(
        &self,
        application_id: Uuid,
        document_id: Uuid,
        caller: Uuid,
        privileged: bool,
    ) -> Result<()> {
        let document = self.get(application_id, document_id).await?;
        if !privileged && document.uploaded_by != caller {
            return Err(Error::Forbidden("Only the uploader can delete this document".into()));
        }

        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        remove_quietly(Path::new(&document.storage_path)).await;
        Ok(())
    }

    pub fn application_dir(&self, application_id: Uuid) -> PathBuf {
        self.uploads_dir.join(application_id.to_string())
    }

    /// Drops the storage directory of an application whose rows are already gone.
    pub async fn remove_application_files(&self, application_id: Uuid) {
        let dir = self.application_dir(application_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::info!(%application_id, "removed stored documents"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %dir.display(), "failed to remove stored documents")
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, path = %path.display(), "failed to remove stored file");
        }
    }
}

/// Last path segment without control characters.
pub fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = name.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn allowed_extension(filename: &str) -> Result<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else if ext.is_empty() {
        Err(Error::BadRequest("Files without an extension are not allowed".into()))
    } else {
        Err(Error::BadRequest(format!("File type .{} is not allowed", ext)))
    }
}

fn check_content(ext: &str, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::BadRequest("File is empty".into()));
    }
    if ext == "pdf" && !data.starts_with(b"%PDF") {
        return Err(Error::BadRequest("Invalid PDF file content".into()));
    }
    if (ext == "jpg" || ext == "jpeg") && !data.starts_with(&[0xFF, 0xD8]) {
        return Err(Error::BadRequest("Invalid JPEG file content".into()));
    }
    if ext == "png" && !data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Err(Error::BadRequest("Invalid PNG file content".into()));
    }
    Ok(())
}

pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "odt" => "application/vnd.oasis.opendocument.text",
        "txt" => "text/plain; charset=utf-8",
        "rtf" => "application/rtf",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

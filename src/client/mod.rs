//! Typed client for the portal API, carrying the checks the browser apps run
//! before they talk to the server.

mod token;

pub use token::{RefreshTokenProvider, StaticTokenProvider, TokenProvider};

use bytes::Bytes;
use reqwest::{header, multipart, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::dto::application_dto::{
    ApplicationDetail, ApplicationListQuery, ApplicationListResponse, ApplicationSummary,
    StatusUpdatePayload, SubmitApplicationPayload, UpdateApplicationPayload,
};
use crate::dto::communication_dto::SendMessagePayload;
use crate::dto::form_dto::{FormListQuery, FormListResponse, FormResponse, PublishedFormSummary, SaveFormPayload};
use crate::dto::user_dto::MeResponse;
use crate::models::application::{Application, ApplicationStatus, StatusChange};
use crate::models::document::Document;
use crate::models::message::Message;
use crate::services::schema_service::SchemaService;
use crate::utils::content_disposition;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not obtain an access token: {0}")]
    Token(String),

    #[error("request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub struct PortalClient<T: TokenProvider> {
    http: reqwest::Client,
    base_url: String,
    tokens: T,
    max_upload_bytes: u64,
}

impl<T: TokenProvider> PortalClient<T> {
    pub fn new(base_url: impl Into<String>, tokens: T) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    async fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token))
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, "api call failed");
        Err(ClientError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn json<R: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<R> {
        Ok(self.send(builder).await?.json::<R>().await?)
    }

    async fn empty(&self, builder: RequestBuilder) -> ClientResult<()> {
        self.send(builder).await?;
        Ok(())
    }

    pub async fn me(&self) -> ClientResult<MeResponse> {
        self.json(self.request(Method::GET, "/api/users/me").await?).await
    }

    pub async fn list_forms(&self, query: &FormListQuery) -> ClientResult<FormListResponse> {
        let builder = self.request(Method::GET, "/api/forms").await?.query(query);
        self.json(builder).await
    }

    pub async fn published_forms(&self) -> ClientResult<Vec<PublishedFormSummary>> {
        self.json(self.request(Method::GET, "/api/forms/published").await?)
            .await
    }

    pub async fn get_form(&self, id: Uuid) -> ClientResult<FormResponse> {
        self.json(self.request(Method::GET, &format!("/api/forms/{}", id)).await?)
            .await
    }

    /// Creates the form, or saves it when `id` is given. The schema is checked locally first.
    pub async fn save_form(&self, id: Option<Uuid>, form: &SaveFormPayload) -> ClientResult<FormResponse> {
        SchemaService::validate(&form.fields).map_err(|e| ClientError::Validation(e.to_string()))?;
        let builder = match id {
            Some(id) => self.request(Method::PUT, &format!("/api/forms/{}", id)).await?,
            None => self.request(Method::POST, "/api/forms").await?,
        };
        self.json(builder.json(form)).await
    }

    pub async fn publish_form(&self, id: Uuid) -> ClientResult<FormResponse> {
        let path = format!("/api/forms/{}/publish", id);
        self.json(self.request(Method::POST, &path).await?).await
    }

    pub async fn archive_form(&self, id: Uuid) -> ClientResult<FormResponse> {
        let path = format!("/api/forms/{}/archive", id);
        self.json(self.request(Method::POST, &path).await?).await
    }

    pub async fn delete_form(&self, id: Uuid) -> ClientResult<()> {
        let path = format!("/api/forms/{}", id);
        self.empty(self.request(Method::DELETE, &path).await?).await
    }

    pub async fn submit_application(&self, payload: &SubmitApplicationPayload) -> ClientResult<Application> {
        let builder = self.request(Method::POST, "/api/applications").await?;
        self.json(builder.json(payload)).await
    }

    pub async fn update_application(
        &self,
        id: Uuid,
        payload: &UpdateApplicationPayload,
    ) -> ClientResult<Application> {
        let builder = self
            .request(Method::PUT, &format!("/api/applications/{}", id))
            .await?;
        self.json(builder.json(payload)).await
    }

    pub async fn my_applications(&self) -> ClientResult<Vec<ApplicationSummary>> {
        self.json(self.request(Method::GET, "/api/applications/my").await?)
            .await
    }

    pub async fn list_applications(&self, query: &ApplicationListQuery) -> ClientResult<ApplicationListResponse> {
        let builder = self
            .request(Method::GET, "/api/review/applications")
            .await?
            .query(query);
        self.json(builder).await
    }

    pub async fn application(&self, id: Uuid) -> ClientResult<ApplicationDetail> {
        let path = format!("/api/applications/{}", id);
        self.json(self.request(Method::GET, &path).await?).await
    }

    /// Sends a status change. A rejection without a reason never leaves the client.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        reason: Option<&str>,
    ) -> ClientResult<Application> {
        let change = StatusChange::new(status, reason).map_err(|e| ClientError::Validation(e.to_string()))?;
        let payload = StatusUpdatePayload {
            status: change.status(),
            reason: change.reason().map(str::to_string),
        };
        let builder = self
            .request(Method::PATCH, &format!("/api/review/applications/{}/status", id))
            .await?;
        self.json(builder.json(&payload)).await
    }

    pub async fn withdraw_application(&self, id: Uuid) -> ClientResult<Application> {
        let path = format!("/api/applications/{}/withdraw", id);
        self.json(self.request(Method::POST, &path).await?).await
    }

    pub async fn messages(&self, application_id: Uuid) -> ClientResult<Vec<Message>> {
        let path = format!("/api/applications/{}/messages", application_id);
        self.json(self.request(Method::GET, &path).await?).await
    }

    pub async fn send_message(&self, application_id: Uuid, body: &str) -> ClientResult<Message> {
        if body.trim().is_empty() {
            return Err(ClientError::Validation("Message must not be empty".into()));
        }
        let payload = SendMessagePayload {
            body: body.to_string(),
        };
        let path = format!("/api/applications/{}/messages", application_id);
        self.json(self.request(Method::POST, &path).await?.json(&payload))
            .await
    }

    pub async fn delete_message(&self, application_id: Uuid, message_id: Uuid) -> ClientResult<()> {
        let path = format!("/api/applications/{}/messages/{}", application_id, message_id);
        self.empty(self.request(Method::DELETE, &path).await?).await
    }

    pub async fn documents(&self, application_id: Uuid) -> ClientResult<Vec<Document>> {
        let path = format!("/api/applications/{}/documents", application_id);
        self.json(self.request(Method::GET, &path).await?).await
    }

    /// Uploads one file. Files above the size cap are refused without a request.
    pub async fn upload_document(
        &self,
        application_id: Uuid,
        filename: &str,
        data: Vec<u8>,
    ) -> ClientResult<Document> {
        if data.len() as u64 > self.max_upload_bytes {
            return Err(ClientError::Validation(format!(
                "{} exceeds the upload limit of {} MB",
                filename,
                self.max_upload_bytes / (1024 * 1024)
            )));
        }
        let part = multipart::Part::bytes(data).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);
        let path = format!("/api/applications/{}/documents", application_id);
        self.json(self.request(Method::POST, &path).await?.multipart(form))
            .await
    }

    pub async fn download_document(
        &self,
        application_id: Uuid,
        document_id: Uuid,
    ) -> ClientResult<DownloadedFile> {
        let path = format!(
            "/api/applications/{}/documents/{}/download",
            application_id, document_id
        );
        let response = self.send(self.request(Method::GET, &path).await?).await?;

        let filename = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(content_disposition::filename_from_header)
            .unwrap_or_else(|| "download".to_string());
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        Ok(DownloadedFile {
            filename,
            content_type,
            bytes,
        })
    }

    pub async fn delete_document(&self, application_id: Uuid, document_id: Uuid) -> ClientResult<()> {
        let path = format!("/api/applications/{}/documents/{}", application_id, document_id);
        self.empty(self.request(Method::DELETE, &path).await?).await
    }
}

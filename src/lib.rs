pub mod client;
pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    application_service::ApplicationService, audit_service::AuditService,
    document_service::DocumentService, draft_service::DraftService, form_service::FormService,
    identity_service::IdentityService, message_service::MessageService,
    user_service::UserService,
};
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub user_service: UserService,
    pub identity_service: IdentityService,
    pub form_service: FormService,
    pub application_service: ApplicationService,
    pub message_service: MessageService,
    pub document_service: DocumentService,
    pub draft_service: DraftService,
    pub audit_service: AuditService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to the default HTTP client");
                Client::new()
            });

        let audit_service = AuditService::new(pool.clone());
        let user_service = UserService::new(pool.clone());
        let form_service = FormService::new(pool.clone(), user_service.clone());
        let document_service = DocumentService::new(pool.clone(), config.uploads_dir.clone());
        let application_service = ApplicationService::new(
            pool.clone(),
            form_service.clone(),
            document_service.clone(),
            audit_service.clone(),
        );
        let identity_service =
            IdentityService::new(config.identity_userinfo_url.clone(), http_client);

        Self {
            user_service,
            message_service: MessageService::new(pool.clone()),
            document_service,
            draft_service: DraftService::new(pool.clone()),
            identity_service,
            form_service,
            application_service,
            audit_service,
            pool,
            config,
        }
    }
}

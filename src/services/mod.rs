pub mod application_service;
pub mod audit_service;
pub mod document_service;
pub mod draft_service;
pub mod form_service;
pub mod identity_service;
pub mod message_service;
pub mod render_service;
pub mod schema_service;
pub mod user_service;

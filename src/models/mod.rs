pub mod application;
pub mod audit_log;
pub mod document;
pub mod draft;
pub mod form;
pub mod message;
pub mod user;

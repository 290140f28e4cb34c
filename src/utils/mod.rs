pub mod content_disposition;
pub mod pagination;

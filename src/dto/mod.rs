pub mod application_dto;
pub mod communication_dto;
pub mod draft_dto;
pub mod form_dto;
pub mod user_dto;

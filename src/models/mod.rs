pub mod approval;
pub mod envelope;
pub mod form_json;
pub mod identity;
pub mod message;

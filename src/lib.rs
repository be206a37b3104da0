//! Feishu OpenAPI client for approval workflows and bot notifications.
//!
//! `FeishuClient::connect` authenticates once; the approval, directory and
//! message clients borrow that session.

pub mod approval;
pub mod auth;
pub mod client;
pub mod config;
pub mod directory;
pub mod errors;
pub mod models;
pub mod notification;
pub mod transport;
pub mod workflow;

pub use client::FeishuClient;
pub use errors::{FeishuError, TransportError, TransportErrorKind};
pub use models::approval::{ApprovalInstance, ApprovalRequest, FormField, InstanceStatus, OperationOutcome};
pub use models::identity::UserIdentity;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A person as known to the company and to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Company account, the local part of the bound e-mail address.
    pub account: String,
    pub open_id: String,
    /// Tenant-scoped id used by the approval API.
    pub user_id: String,
}

impl UserIdentity {
    pub fn new(account: impl Into<String>, open_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            open_id: open_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Contact profile returned by the user batch endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub en_name: String,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub employee_no: Option<String>,
    #[serde(default)]
    pub open_id: String,
    #[serde(default)]
    pub union_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

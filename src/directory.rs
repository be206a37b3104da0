use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::client::FeishuClient;
use crate::errors::{FeishuError, TransportError, TransportErrorKind};
use crate::models::envelope::Envelope;
use crate::models::identity::{UserIdentity, UserProfile};
use crate::transport::Payload;

pub const BATCH_GET_ID_PATH: &str = "/open-apis/user/v1/batch_get_id";
pub const USER_BATCH_GET_PATH: &str = "/open-apis/contact/v1/user/batch_get";
pub const DEPARTMENT_INFO_PATH: &str = "/open-apis/contact/v1/department/info/get";

#[derive(Debug, Deserialize)]
struct EmailUser {
    #[serde(default)]
    open_id: String,
    user_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct BatchGetIdData {
    email_users: Option<HashMap<String, Vec<EmailUser>>>,
}

#[derive(Debug, Default, Deserialize)]
struct UserInfosData {
    #[serde(default)]
    user_infos: Vec<UserProfile>,
}

/// Maps company accounts to platform identities.
pub struct DirectoryLookup<'a> {
    client: &'a FeishuClient,
}

impl<'a> DirectoryLookup<'a> {
    pub(crate) fn new(client: &'a FeishuClient) -> Self {
        Self { client }
    }

    /// Resolve with the configured e-mail suffix.
    pub async fn resolve(&self, account: &str) -> Result<UserIdentity, FeishuError> {
        self.resolve_by_account(account, &self.client.config().email_suffix).await
    }

    /// Look the account up through the batch endpoint with a single entry.
    /// Fails with `NotFound` when the e-mail is not bound to a platform user.
    pub async fn resolve_by_account(&self, account: &str, domain_suffix: &str) -> Result<UserIdentity, FeishuError> {
        let email = format!("{}{}", account, domain_suffix);

        let result = self.lookup_email(account, &email).await;
        if let Err(e) = &result {
            error!(account, email = %email, error = %e, "feishu user id lookup failed");
        }
        result
    }

    async fn lookup_email(&self, account: &str, email: &str) -> Result<UserIdentity, FeishuError> {
        let data = self
            .fetch_data(BATCH_GET_ID_PATH, Payload::query([("emails", email)]))
            .await?;

        // An unbound address comes back without `email_users` at all.
        let data: BatchGetIdData = self.decode(BATCH_GET_ID_PATH, &data)?;
        let user = data
            .email_users
            .and_then(|mut users| users.remove(email))
            .and_then(|matches| matches.into_iter().next())
            .ok_or_else(|| FeishuError::NotFound(format!("{} is not bound to a feishu account", email)))?;

        Ok(UserIdentity::new(account, user.open_id, user.user_id))
    }

    /// Contact profile for one open id.
    pub async fn user_info(&self, open_id: &str) -> Result<UserProfile, FeishuError> {
        let result = self.fetch_profile(open_id).await;
        if let Err(e) = &result {
            error!(open_id, error = %e, "feishu user info lookup failed");
        }
        result
    }

    async fn fetch_profile(&self, open_id: &str) -> Result<UserProfile, FeishuError> {
        let data = self
            .fetch_data(USER_BATCH_GET_PATH, Payload::query([("open_ids", open_id)]))
            .await?;
        let data: UserInfosData = self.decode(USER_BATCH_GET_PATH, &data)?;
        data.user_infos
            .into_iter()
            .next()
            .ok_or_else(|| FeishuError::NotFound(format!("no profile for {}", open_id)))
    }

    /// Raw department record.
    pub async fn department_info(&self, open_department_id: &str) -> Result<Value, FeishuError> {
        let result = self
            .fetch_data(
                DEPARTMENT_INFO_PATH,
                Payload::query([("open_department_id", open_department_id)]),
            )
            .await;
        if let Err(e) = &result {
            error!(open_department_id, error = %e, "feishu department lookup failed");
        }
        result
    }

    /// Absent `data` decodes to the empty shape; anything else must match.
    fn decode<T: DeserializeOwned + Default>(&self, path: &str, data: &Value) -> Result<T, FeishuError> {
        if data.is_null() {
            return Ok(T::default());
        }
        T::deserialize(data).map_err(|e| {
            let url = self.client.config().open_endpoint(path);
            error!(url = %url, error = %e, "feishu directory data has an unexpected shape");
            TransportError::new(TransportErrorKind::Parse, url, e).into()
        })
    }

    /// GET an open endpoint and unwrap a successful envelope's `data`.
    async fn fetch_data(&self, path: &str, query: Payload) -> Result<Value, FeishuError> {
        let url = self.client.config().open_endpoint(path);
        let resp = self.client.get(&url, query).await?;
        let envelope = Envelope::parse(&url, &resp.body)?;
        if !envelope.is_success() {
            return Err(FeishuError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        Ok(envelope.data)
    }
}

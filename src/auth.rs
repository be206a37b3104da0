//! App-level credential acquisition.
//!
//! The credential is fetched once per client and reused for the client's
//! lifetime. There is no background renewal; `FeishuClient::refresh_credential`
//! is the only way to replace it.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use zeroize::Zeroize;

use crate::config::Config;
use crate::errors::FeishuError;
use crate::transport::{HttpTransport, Payload};

pub const TOKEN_PATH: &str = "/open-apis/auth/v3/app_access_token/internal/";

/// Bearer token bound to the app it was issued for.
pub struct Credential {
    app_id: String,
    token: String,
}

impl Credential {
    pub fn new(app_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            token: token.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn issued_for(&self, app_id: &str) -> bool {
        self.app_id == app_id
    }

    /// Header set attached to every request made with this credential.
    pub fn headers(&self) -> Result<HeaderMap, FeishuError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| FeishuError::Auth("access token contains invalid header characters".to_string()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("app_id", &self.app_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    app_access_token: Option<String>,
}

pub struct TokenProvider<'a> {
    transport: &'a HttpTransport,
    config: &'a Config,
}

impl<'a> TokenProvider<'a> {
    pub fn new(transport: &'a HttpTransport, config: &'a Config) -> Self {
        Self { transport, config }
    }

    pub async fn credential(&self) -> Result<Credential, FeishuError> {
        let url = self.config.open_endpoint(TOKEN_PATH);
        let app_id = self.config.app_id.as_str();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let payload = Payload::Json(json!({
            "app_id": app_id,
            "app_secret": self.config.app_secret,
        }));

        let resp = self
            .transport
            .execute(Method::POST, &url, &headers, &payload)
            .await
            .map_err(|e| {
                error!(app_id, error = %e, "feishu token endpoint unreachable");
                FeishuError::Auth(format!("token endpoint unreachable: {}", e))
            })?;

        let parsed: TokenResponse = TokenResponse::deserialize(&resp.body).map_err(|e| {
            error!(app_id, error = %e, "feishu token response malformed");
            FeishuError::Auth(format!("malformed token response: {}", e))
        })?;

        if parsed.code != 0 {
            error!(app_id, code = parsed.code, msg = %parsed.msg, "feishu refused token request");
            return Err(FeishuError::Auth(format!(
                "token request refused with code {}: {}",
                parsed.code, parsed.msg
            )));
        }

        match parsed.app_access_token {
            Some(token) if !token.is_empty() => {
                info!(app_id, "obtained feishu app access token");
                Ok(Credential::new(app_id, token))
            }
            _ => {
                error!(app_id, "feishu token response has no app_access_token");
                Err(FeishuError::Auth("response has no app_access_token".to_string()))
            }
        }
    }
}

use reqwest::header::HeaderMap;
use reqwest::Method;
use tracing::{error, info};

use crate::approval::ApprovalClient;
use crate::auth::{Credential, TokenProvider};
use crate::config::Config;
use crate::directory::DirectoryLookup;
use crate::errors::{FeishuError, TransportError};
use crate::notification::MessageClient;
use crate::transport::{ApiResponse, HttpTransport, Payload};

/// Authenticated session against the Feishu OpenAPI.
///
/// The credential is read-only once the client exists, so one client can
/// serve concurrent callers without locking.
#[derive(Debug)]
pub struct FeishuClient {
    config: Config,
    transport: HttpTransport,
    credential: Credential,
    headers: HeaderMap,
}

impl FeishuClient {
    /// Build the transport and fetch a credential. Fails with `Auth` when
    /// no credential can be obtained.
    pub async fn connect(config: Config) -> Result<Self, FeishuError> {
        let transport = HttpTransport::new(config.retry.clone())?;
        let credential = TokenProvider::new(&transport, &config).credential().await?;
        Self::assemble(config, transport, credential)
    }

    /// Build a client around a credential obtained elsewhere.
    pub fn with_credential(config: Config, credential: Credential) -> Result<Self, FeishuError> {
        let transport = HttpTransport::new(config.retry.clone())?;
        Self::assemble(config, transport, credential)
    }

    fn assemble(config: Config, transport: HttpTransport, credential: Credential) -> Result<Self, FeishuError> {
        if !credential.issued_for(&config.app_id) {
            error!(
                app_id = %config.app_id,
                credential_app_id = %credential.app_id(),
                "credential belongs to a different app"
            );
            return Err(FeishuError::Auth(format!(
                "credential was issued for app {}, not {}",
                credential.app_id(),
                config.app_id
            )));
        }

        let headers = credential.headers()?;
        Ok(Self {
            config,
            transport,
            credential,
            headers,
        })
    }

    /// Replace the credential with a freshly issued one.
    pub async fn refresh_credential(&mut self) -> Result<(), FeishuError> {
        let credential = TokenProvider::new(&self.transport, &self.config).credential().await?;
        self.headers = credential.headers()?;
        self.credential = credential;
        info!(app_id = %self.config.app_id, "feishu credential refreshed");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn approvals(&self) -> ApprovalClient<'_> {
        ApprovalClient::new(self)
    }

    pub fn directory(&self) -> DirectoryLookup<'_> {
        DirectoryLookup::new(self)
    }

    pub fn messages(&self) -> MessageClient<'_> {
        MessageClient::new(self)
    }

    pub(crate) async fn post(&self, url: &str, body: serde_json::Value) -> Result<ApiResponse, TransportError> {
        self.transport
            .execute(Method::POST, url, &self.headers, &Payload::Json(body))
            .await
    }

    pub(crate) async fn get(&self, url: &str, query: Payload) -> Result<ApiResponse, TransportError> {
        self.transport.execute(Method::GET, url, &self.headers, &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TOKEN_PATH;
    use serde_json::json;
    use std::io;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory sink for a test-local tracing subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_foreign_credential_is_rejected() {
        let config = Config::for_host("http://localhost", "cli_ours", "s");
        let err = FeishuClient::with_credential(config, Credential::new("cli_theirs", "t")).unwrap_err();
        assert!(matches!(err, FeishuError::Auth(_)));
    }

    #[test]
    fn test_matching_credential_is_accepted() {
        let config = Config::for_host("http://localhost", "cli_ours", "s");
        let client = FeishuClient::with_credential(config, Credential::new("cli_ours", "t")).unwrap();
        assert_eq!(client.credential().app_id(), "cli_ours");
    }

    #[tokio::test]
    async fn test_refresh_replaces_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 0, "app_access_token": "t-first"})),
            )
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 0, "app_access_token": "t-second"})),
            )
            .mount(&mock_server)
            .await;

        let config = Config::for_host(&mock_server.uri(), "cli_test", "secret");
        let mut client = FeishuClient::connect(config).await.unwrap();
        assert_eq!(client.headers["authorization"], "Bearer t-first");

        client.refresh_credential().await.unwrap();
        assert_eq!(client.headers["authorization"], "Bearer t-second");
    }

    #[tokio::test]
    async fn test_connect_never_logs_the_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "ok", "app_access_token": "t-SUPERSECRET", "expire": 7200
            })))
            .mount(&mock_server)
            .await;

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);

        let config = Config::for_host(&mock_server.uri(), "cli_test", "app-secret-value");
        let client = FeishuClient::connect(config).await.unwrap();
        drop(guard);

        let captured = logs.contents();
        assert!(captured.contains("feishu response"), "nothing captured: {}", captured);
        assert!(captured.contains("7200"));
        assert!(!captured.contains("t-SUPERSECRET"), "token leaked: {}", captured);
        assert!(!captured.contains("app-secret-value"), "secret leaked: {}", captured);
        assert!(!format!("{:?}", client).contains("t-SUPERSECRET"));
    }
}

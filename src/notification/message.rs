use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::client::FeishuClient;
use crate::errors::FeishuError;
use crate::models::envelope::Envelope;
use crate::models::message::MessageContent;

pub const SEND_PATH: &str = "/open-apis/message/v4/send/";
pub const BATCH_SEND_PATH: &str = "/open-apis/message/v4/batch_send/";

/// Recipients per batch call; the platform caps a batch below 200.
pub const BATCH_LIMIT: usize = 199;

/// Direct and broadcast bot messages.
pub struct MessageClient<'a> {
    client: &'a FeishuClient,
}

impl<'a> MessageClient<'a> {
    pub(crate) fn new(client: &'a FeishuClient) -> Self {
        Self { client }
    }

    /// Message one person by company account. The account must be bound to
    /// an e-mail under the configured suffix.
    pub async fn send_to_account(&self, account: &str, content: &MessageContent) -> Result<(), FeishuError> {
        let email = format!("{}{}", account, self.client.config().email_suffix);
        let mut body = Map::new();
        body.insert("email".into(), json!(email));
        content.write_into(&mut body);

        let result = self.send(SEND_PATH, Value::Object(body)).await;
        match &result {
            Ok(()) => info!(account, "feishu message sent"),
            Err(e) => error!(account, email = %email, error = %e, "feishu message send failed"),
        }
        result
    }

    /// Message many people by open id, in chunks of `BATCH_LIMIT`.
    /// Stops at the first refused chunk.
    pub async fn send_batch(&self, open_ids: &[String], content: &MessageContent) -> Result<(), FeishuError> {
        let total = open_ids.len();
        let mut delivered = 0;

        for chunk in open_ids.chunks(BATCH_LIMIT) {
            let mut body = Map::new();
            body.insert("open_ids".into(), json!(chunk));
            content.write_into(&mut body);

            if let Err(e) = self.send(BATCH_SEND_PATH, Value::Object(body)).await {
                error!(
                    total,
                    delivered,
                    chunk_size = chunk.len(),
                    error = %e,
                    "feishu batch message send failed"
                );
                return Err(FeishuError::Message(format!(
                    "delivered to {} of {} recipients, {} not sent: {}",
                    delivered,
                    total,
                    total - delivered,
                    e
                )));
            }
            delivered += chunk.len();
        }

        info!(total, "feishu batch message sent");
        Ok(())
    }

    async fn send(&self, path: &str, body: Value) -> Result<(), FeishuError> {
        let url = self.client.config().open_endpoint(path);
        let resp = self.client.post(&url, body).await?;
        let envelope = Envelope::parse(&url, &resp.body)?;
        if !envelope.is_success() {
            return Err(FeishuError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use crate::config::Config;
    use crate::transport::RetryConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> FeishuClient {
        let mut config = Config::for_host(uri, "cli_test", "secret");
        config.retry = RetryConfig {
            max_attempts: 3,
            timeout_ms: 500,
            backoff_ms: 10,
        };
        FeishuClient::with_credential(config, Credential::new("cli_test", "t-123")).unwrap()
    }

    #[tokio::test]
    async fn test_send_text_to_account() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEND_PATH))
            .and(body_partial_json(json!({
                "email": "alice@company.com",
                "msg_type": "text",
                "content": {"text": "your release was approved"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "data": {"message_id": "om_1"}})))
            .expect(1)
            .mount(&mock_server)
            .await;

        client(&mock_server.uri())
            .messages()
            .send_to_account("alice", &MessageContent::text("your release was approved"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_refused_is_api_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 10002, "msg": "bot not in chat"})))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server.uri())
            .messages()
            .send_to_account("alice", &MessageContent::Card(json!({"elements": []})))
            .await
            .unwrap_err();
        assert!(matches!(err, FeishuError::Api { code: 10002, .. }));
    }

    #[tokio::test]
    async fn test_batch_is_chunked() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BATCH_SEND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
            .expect(3)
            .mount(&mock_server)
            .await;

        let open_ids: Vec<String> = (0..450).map(|i| format!("ou_{}", i)).collect();
        client(&mock_server.uri())
            .messages()
            .send_batch(&open_ids, &MessageContent::text("maintenance tonight"))
            .await
            .unwrap();

        let received = mock_server.received_requests().await.unwrap();
        let sizes: Vec<usize> = received
            .iter()
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                body["open_ids"].as_array().unwrap().len()
            })
            .collect();
        assert_eq!(sizes, vec![199, 199, 52]);
    }

    #[tokio::test]
    async fn test_batch_failure_reports_progress() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BATCH_SEND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path(BATCH_SEND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 99991400, "msg": "rate limited"})))
            .mount(&mock_server)
            .await;

        let open_ids: Vec<String> = (0..300).map(|i| format!("ou_{}", i)).collect();
        let err = client(&mock_server.uri())
            .messages()
            .send_batch(&open_ids, &MessageContent::text("hi"))
            .await
            .unwrap_err();

        match err {
            FeishuError::Message(msg) => {
                assert!(msg.starts_with("delivered to 199 of 300 recipients, 101 not sent"), "{}", msg)
            }
            other => panic!("expected message error, got {:?}", other),
        }
    }
}

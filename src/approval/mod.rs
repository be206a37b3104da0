//! Approval instance operations: create, cancel, approve, reject, query.

pub mod reconcile;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::client::FeishuClient;
use crate::errors::FeishuError;
use crate::models::approval::{ApprovalInstance, ApprovalRequest, InstanceStatus, OperationOutcome, TaskDecision};
use crate::models::envelope::Envelope;
use reconcile::{reconcile, InstanceSource, RemoteFailure, Transition};

pub const CREATE_PATH: &str = "/approval/openapi/v2/instance/create";
pub const CANCEL_PATH: &str = "/approval/openapi/v2/instance/cancel";
pub const GET_PATH: &str = "/approval/openapi/v2/instance/get";
pub const APPROVE_PATH: &str = "/approval/openapi/v2/instance/approve";
pub const REJECT_PATH: &str = "/approval/openapi/v2/instance/reject";

#[derive(Debug, Deserialize)]
struct Created {
    instance_code: String,
}

pub struct ApprovalClient<'a> {
    client: &'a FeishuClient,
}

impl<'a> ApprovalClient<'a> {
    pub(crate) fn new(client: &'a FeishuClient) -> Self {
        Self { client }
    }

    /// Start a new instance and return its instance code.
    pub async fn create(&self, request: &ApprovalRequest) -> Result<String, FeishuError> {
        let result = self.submit(request).await;
        if let Err(e) = &result {
            error!(
                approval_code = %request.approval_code,
                applicant = %request.applicant.user_id,
                approver = ?request.approver.as_ref().map(|o| o.approver.user_id.as_str()),
                form = ?request.form,
                error = %e,
                "feishu approval create failed"
            );
        }
        result
    }

    async fn submit(&self, request: &ApprovalRequest) -> Result<String, FeishuError> {
        let url = self.client.config().approval_endpoint(CREATE_PATH);
        let body = request.to_body()?;

        let resp = self.client.post(&url, body).await?;
        let envelope = Envelope::parse(&url, &resp.body)?;
        if !envelope.is_success() {
            return Err(FeishuError::Approval(format!(
                "create failed with code {}: {}",
                envelope.code, envelope.msg
            )));
        }

        let created: Created = envelope.data_as(&url)?;
        info!(
            approval_code = %request.approval_code,
            instance_code = %created.instance_code,
            "approval instance created"
        );
        Ok(created.instance_code)
    }

    /// Withdraw an instance on behalf of its applicant.
    pub async fn cancel(&self, approval_code: &str, instance_code: &str, applicant_id: &str) -> OperationOutcome {
        let body = json!({
            "approval_code": approval_code,
            "instance_code": instance_code,
            "user_id": applicant_id,
        });
        self.act(CANCEL_PATH, body, instance_code, Transition::Cancel).await
    }

    pub async fn approve(&self, decision: &TaskDecision) -> OperationOutcome {
        self.act(APPROVE_PATH, decision.to_body(), &decision.instance_code, Transition::Approve)
            .await
    }

    pub async fn reject(&self, decision: &TaskDecision) -> OperationOutcome {
        self.act(REJECT_PATH, decision.to_body(), &decision.instance_code, Transition::Reject)
            .await
    }

    /// Fetch the full instance snapshot.
    pub async fn query(&self, instance_code: &str) -> Result<ApprovalInstance, FeishuError> {
        let result = self.fetch(instance_code).await;
        if let Err(e) = &result {
            error!(instance_code, error = %e, "feishu approval query failed");
        }
        result
    }

    async fn fetch(&self, instance_code: &str) -> Result<ApprovalInstance, FeishuError> {
        let url = self.client.config().approval_endpoint(GET_PATH);
        let resp = self
            .client
            .post(&url, json!({ "instance_code": instance_code }))
            .await?;

        let envelope = Envelope::parse(&url, &resp.body)?;
        if !envelope.is_success() {
            return Err(FeishuError::Approval(format!(
                "query failed with code {}: {}",
                envelope.code, envelope.msg
            )));
        }
        Ok(envelope.data_as(&url)?)
    }

    /// Send an instance operation; non-zero codes go through reconciliation.
    async fn act(&self, path: &str, body: Value, instance_code: &str, transition: Transition) -> OperationOutcome {
        let url = self.client.config().approval_endpoint(path);
        let verb = transition.verb();

        let outcome = match self.send(&url, body.clone()).await {
            Err(e) => OperationOutcome::Failure(format!("{} failed: {}", verb, e)),
            Ok(envelope) if envelope.is_success() => OperationOutcome::Success,
            Ok(envelope) => {
                warn!(
                    instance_code,
                    operation = verb,
                    code = envelope.code,
                    msg = %envelope.msg,
                    "instance operation refused, reconciling"
                );
                let failure = RemoteFailure {
                    code: envelope.code,
                    msg: envelope.msg,
                };
                reconcile(self, &failure, instance_code, transition).await
            }
        };

        match &outcome {
            OperationOutcome::Failure(reason) => error!(
                instance_code,
                operation = verb,
                payload = %body,
                reason = %reason,
                "feishu approval operation failed"
            ),
            OperationOutcome::AlreadyInTargetState => info!(
                instance_code,
                operation = verb,
                "instance already in target state"
            ),
            OperationOutcome::Success => info!(instance_code, operation = verb, "instance operation applied"),
        }
        outcome
    }

    async fn send(&self, url: &str, body: Value) -> Result<Envelope, FeishuError> {
        let resp = self.client.post(url, body).await?;
        Ok(Envelope::parse(url, &resp.body)?)
    }
}

#[async_trait]
impl InstanceSource for ApprovalClient<'_> {
    async fn current_status(&self, instance_code: &str) -> Result<InstanceStatus, FeishuError> {
        self.query(instance_code).await.map(|instance| instance.status)
    }
}

//! Account-level approval flows built on the directory and approval clients.
//!
//! Callers deal in company accounts and workflow names; the templates and
//! approver nodes come from configuration.

use tracing::error;

use crate::client::FeishuClient;
use crate::errors::FeishuError;
use crate::models::approval::{ApprovalRequest, FormField, OperationOutcome};

impl FeishuClient {
    /// Open an instance of `workflow` for `applicant`. When `approver` is
    /// given, the workflow must name the node that takes it.
    pub async fn submit(
        &self,
        workflow: &str,
        applicant: &str,
        form: Vec<FormField>,
        approver: Option<&str>,
    ) -> Result<String, FeishuError> {
        let template = self.config().workflow(workflow)?;
        let directory = self.directory();
        let applicant_id = directory.resolve(applicant).await?;

        let mut request = ApprovalRequest::new(template.approval_code.clone(), applicant_id, form);

        if let Some(account) = approver {
            let Some(node_id) = template.approver_node_id.clone() else {
                error!(workflow, applicant, approver = account, "workflow has no approver node");
                return Err(FeishuError::Approval(format!(
                    "workflow '{}' does not accept a designated approver",
                    workflow
                )));
            };
            let approver_id = directory.resolve(account).await?;
            request = request.with_approver(node_id, approver_id);
        }

        self.approvals().create(&request).await
    }

    /// Cancel an instance of `workflow` on behalf of `applicant`.
    pub async fn withdraw(
        &self,
        workflow: &str,
        instance_code: &str,
        applicant: &str,
    ) -> Result<OperationOutcome, FeishuError> {
        let template = self.config().workflow(workflow)?;
        let applicant_id = self.directory().resolve(applicant).await?;

        Ok(self
            .approvals()
            .cancel(&template.approval_code, instance_code, &applicant_id.user_id)
            .await)
    }

    /// First comment recorded on the instance, or an empty string.
    pub async fn approval_content(&self, instance_code: &str) -> Result<String, FeishuError> {
        let instance = self.approvals().query(instance_code).await?;
        Ok(instance.first_comment().to_string())
    }

    /// Decision comment left at `stage`, or an empty string.
    pub async fn stage_comment(&self, instance_code: &str, stage: &str) -> Result<String, FeishuError> {
        let instance = self.approvals().query(instance_code).await?;
        Ok(instance.stage_comment(stage).to_string())
    }
}

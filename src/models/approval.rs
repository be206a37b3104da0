use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::FeishuError;
use crate::models::form_json::to_form_string;
use crate::models::identity::UserIdentity;

/// Key the approval templates use for the default manager-escalation node.
pub const MANAGER_NODE_SENTINEL: &str = "manager_node_id";

/// Node names of the review stages, as configured on the approval templates.
pub const MANAGER_STAGE: &str = "领导审批";
pub const OPERATIONS_STAGE: &str = "运维审批";

// ── Submission ───────────────────────────────────────────────

/// One entry of an approval form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

impl FormField {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn input(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(id, "input", value.into())
    }

    pub fn textarea(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(id, "textarea", value.into())
    }

    /// `start` and `end` are RFC 3339 timestamps; `interval_days` is the
    /// duration the form displays.
    pub fn date_interval(
        id: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        interval_days: f64,
    ) -> Self {
        Self::new(
            id,
            "dateInterval",
            json!({
                "start": start.into(),
                "end": end.into(),
                "interval": interval_days,
            }),
        )
    }
}

/// Designated approver for one node of the template.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproverOverride {
    pub node_id: String,
    pub approver: UserIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    pub approval_code: String,
    pub applicant: UserIdentity,
    pub form: Vec<FormField>,
    pub approver: Option<ApproverOverride>,
}

impl ApprovalRequest {
    pub fn new(approval_code: impl Into<String>, applicant: UserIdentity, form: Vec<FormField>) -> Self {
        Self {
            approval_code: approval_code.into(),
            applicant,
            form,
            approver: None,
        }
    }

    pub fn with_approver(mut self, node_id: impl Into<String>, approver: UserIdentity) -> Self {
        self.approver = Some(ApproverOverride {
            node_id: node_id.into(),
            approver,
        });
        self
    }

    /// Body for the create endpoint. The form travels as a JSON string
    /// inside the JSON body; the platform rejects a nested array.
    pub fn to_body(&self) -> Result<Value, FeishuError> {
        let form = to_form_string(&self.form)
            .map_err(|e| FeishuError::Approval(format!("cannot encode approval form: {}", e)))?;

        let mut body = Map::new();
        body.insert("approval_code".into(), json!(self.approval_code));
        body.insert("user_id".into(), json!(self.applicant.user_id));
        body.insert("form".into(), Value::String(form));

        if let Some(over) = &self.approver {
            if over.node_id.is_empty() || over.approver.user_id.is_empty() {
                return Err(FeishuError::Approval(
                    "approver override needs both a node id and an approver id".to_string(),
                ));
            }
            let approvers = json!([over.approver.user_id]);
            let mut nodes = Map::new();
            nodes.insert(over.node_id.clone(), approvers.clone());
            nodes.insert(MANAGER_NODE_SENTINEL.to_string(), approvers);
            body.insert("node_approver_user_id_list".into(), Value::Object(nodes));
        }

        Ok(Value::Object(body))
    }
}

/// Approver action on one task of an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDecision {
    pub approval_code: String,
    pub instance_code: String,
    pub user_id: String,
    pub task_id: String,
    pub comment: Option<String>,
}

impl TaskDecision {
    pub(crate) fn to_body(&self) -> Value {
        let mut body = json!({
            "approval_code": self.approval_code,
            "instance_code": self.instance_code,
            "user_id": self.user_id,
            "task_id": self.task_id,
        });
        if let Some(comment) = &self.comment {
            body["comment"] = json!(comment);
        }
        body
    }
}

// ── Remote State ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Pending,
    Approved,
    Rejected,
    Canceled,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Canceled | Self::Deleted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Canceled => "CANCELED",
            Self::Deleted => "DELETED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Wording used in user-facing failure reasons.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Canceled => "canceled",
            Self::Deleted => "deleted",
            Self::Unknown => "in an unknown state",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Transferred,
    Done,
    #[serde(other)]
    Other,
}

impl TaskStatus {
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Snapshot of one approval instance. The platform owns the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalInstance {
    #[serde(default)]
    pub approval_code: String,
    #[serde(default)]
    pub approval_name: String,
    #[serde(default)]
    pub instance_code: String,
    #[serde(default)]
    pub user_id: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub form: Value,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub task_list: Vec<TaskNode>,
}

impl ApprovalInstance {
    /// First comment on record, whatever task it belongs to.
    pub fn first_comment(&self) -> &str {
        self.timeline
            .iter()
            .find_map(|event| event.comment.as_deref())
            .unwrap_or("")
    }

    /// Decision comment of the first decided task on the node named `node_name`.
    pub fn stage_comment(&self, node_name: &str) -> &str {
        let Some(task) = self.decided_task(node_name) else {
            return "";
        };

        self.timeline
            .iter()
            .filter(|event| event.task_id.as_deref() == Some(task.id.as_str()))
            .find_map(|event| event.comment.as_deref())
            .unwrap_or("")
    }

    pub fn decided_task(&self, node_name: &str) -> Option<&TaskNode> {
        self.task_list
            .iter()
            .find(|task| task.node_name == node_name && task.status.is_decided())
    }

    /// Decode the form the instance was created with. The platform returns
    /// it double-encoded; an already-decoded array is accepted too.
    pub fn form_fields(&self) -> Result<Vec<FormField>, serde_json::Error> {
        match &self.form {
            Value::Null => Ok(Vec::new()),
            Value::String(raw) if raw.is_empty() => Ok(Vec::new()),
            Value::String(raw) => serde_json::from_str(raw),
            other => Vec::<FormField>::deserialize(other),
        }
    }
}

// ── Outcome ──────────────────────────────────────────────────

/// Result of an operation that acts on an existing instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum OperationOutcome {
    Success,
    /// The instance was already where the operation wanted it.
    AlreadyInTargetState,
    Failure(String),
}

impl OperationOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, OperationOutcome::Failure(_))
    }

    pub fn into_result(self) -> Result<OperationOutcome, FeishuError> {
        match self {
            OperationOutcome::Failure(reason) => Err(FeishuError::Approval(reason)),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserIdentity {
        UserIdentity::new("alice", "ou_alice", "a7eb3abe")
    }

    fn bob() -> UserIdentity {
        UserIdentity::new("bob", "ou_bob", "b0b0b0b0")
    }

    #[test]
    fn test_form_is_encoded_as_string() {
        let req = ApprovalRequest::new(
            "APPROVAL-1",
            alice(),
            vec![
                FormField::input("env", "prod"),
                FormField::textarea("apply_reason", "scale out"),
            ],
        );
        let body = req.to_body().unwrap();

        let form = body["form"].as_str().expect("form must be a string");
        assert_eq!(
            form,
            r#"[{"id": "env", "type": "input", "value": "prod"}, {"id": "apply_reason", "type": "textarea", "value": "scale out"}]"#
        );
        assert_eq!(body["user_id"], "a7eb3abe");
        assert!(body.get("node_approver_user_id_list").is_none());
    }

    #[test]
    fn test_form_string_escapes_non_ascii_values() {
        let req = ApprovalRequest::new("APPROVAL-1", alice(), vec![FormField::input("env", "领导")]);
        let body = req.to_body().unwrap();
        assert_eq!(
            body["form"],
            r#"[{"id": "env", "type": "input", "value": "\u9886\u5bfc"}]"#
        );
    }

    #[test]
    fn test_date_interval_keeps_field_order() {
        let req = ApprovalRequest::new(
            "APPROVAL-1",
            alice(),
            vec![FormField::date_interval(
                "timerange",
                "2026-10-14T10:00:00+08:00",
                "2026-10-14T14:00:00+08:00",
                4.0,
            )],
        );
        let body = req.to_body().unwrap();
        assert_eq!(
            body["form"],
            r#"[{"id": "timerange", "type": "dateInterval", "value": {"start": "2026-10-14T10:00:00+08:00", "end": "2026-10-14T14:00:00+08:00", "interval": 4.0}}]"#
        );
    }

    #[test]
    fn test_approver_override_maps_node_and_manager_sentinel() {
        let req = ApprovalRequest::new("APPROVAL-1", alice(), vec![]).with_approver("node-ops", bob());
        let body = req.to_body().unwrap();

        let nodes = body["node_approver_user_id_list"].as_object().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes["node-ops"], json!(["b0b0b0b0"]));
        assert_eq!(nodes[MANAGER_NODE_SENTINEL], json!(["b0b0b0b0"]));
    }

    #[test]
    fn test_incomplete_override_is_rejected() {
        let req = ApprovalRequest::new("APPROVAL-1", alice(), vec![]).with_approver("", bob());
        assert!(matches!(req.to_body(), Err(FeishuError::Approval(_))));
    }

    #[test]
    fn test_date_interval_field() {
        let field = FormField::date_interval("window", "2026-10-14T10:00:00+08:00", "2026-10-14T14:00:00+08:00", 4.0);
        assert_eq!(field.kind, "dateInterval");
        assert_eq!(field.value["interval"], 4.0);
    }

    #[test]
    fn test_decision_body_omits_missing_comment() {
        let decision = TaskDecision {
            approval_code: "A".into(),
            instance_code: "I".into(),
            user_id: "u".into(),
            task_id: "t".into(),
            comment: None,
        };
        assert!(decision.to_body().get("comment").is_none());
    }

    fn reviewed_instance() -> ApprovalInstance {
        serde_json::from_value(json!({
            "instance_code": "IC123",
            "status": "APPROVED",
            "form": "[{\"id\":\"env\",\"type\":\"input\",\"value\":\"prod\"}]",
            "task_list": [
                {"id": "t-lead", "node_name": MANAGER_STAGE, "status": "APPROVED"},
                {"id": "t-ops", "node_name": OPERATIONS_STAGE, "status": "REJECTED"}
            ],
            "timeline": [
                {"type": "START"},
                {"type": "PASS", "task_id": "t-lead", "comment": "fine by me"},
                {"type": "REJECT", "task_id": "t-ops", "comment": "freeze window"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_first_comment() {
        assert_eq!(reviewed_instance().first_comment(), "fine by me");
    }

    #[test]
    fn test_stage_comments() {
        let instance = reviewed_instance();
        assert_eq!(instance.stage_comment(MANAGER_STAGE), "fine by me");
        assert_eq!(instance.stage_comment(OPERATIONS_STAGE), "freeze window");
        assert_eq!(instance.stage_comment("security review"), "");
    }

    #[test]
    fn test_stage_comment_ignores_undecided_tasks() {
        let instance: ApprovalInstance = serde_json::from_value(json!({
            "status": "PENDING",
            "task_list": [{"id": "t1", "node_name": MANAGER_STAGE, "status": "PENDING"}],
            "timeline": [{"type": "CC", "comment": "looking"}, {"task_id": "", "comment": "orphan"}]
        }))
        .unwrap();
        assert_eq!(instance.stage_comment(MANAGER_STAGE), "");
        assert_eq!(instance.first_comment(), "looking");
    }

    #[test]
    fn test_minimal_snapshot_and_unknown_status() {
        let instance: ApprovalInstance = serde_json::from_value(json!({"status": "APPROVED"})).unwrap();
        assert_eq!(instance.status, InstanceStatus::Approved);
        assert_eq!(instance.first_comment(), "");
        assert!(instance.form_fields().unwrap().is_empty());

        let odd: ApprovalInstance = serde_json::from_value(json!({"status": "REVERTED"})).unwrap();
        assert_eq!(odd.status, InstanceStatus::Unknown);
        assert!(!odd.status.is_terminal());
    }

    #[test]
    fn test_form_fields_decodes_double_encoding() {
        let fields = reviewed_instance().form_fields().unwrap();
        assert_eq!(fields, vec![FormField::input("env", "prod")]);
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(OperationOutcome::AlreadyInTargetState.into_result().is_ok());
        let err = OperationOutcome::Failure("already approved, cannot cancel".into())
            .into_result()
            .unwrap_err();
        assert_eq!(err.to_string(), "approval error: already approved, cannot cancel");
    }
}

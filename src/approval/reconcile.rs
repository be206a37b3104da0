//! Disambiguation of failed instance operations.
//!
//! The platform answers 65001 both for genuine internal errors and for
//! operations on an instance that already reached a terminal state. The only
//! way to tell them apart is to read the instance back and compare its status
//! with what the operation meant to achieve.

use async_trait::async_trait;
use tracing::{error, info};

use crate::errors::FeishuError;
use crate::models::approval::{InstanceStatus, OperationOutcome};

/// Generic internal-error code that needs a read-back to interpret.
pub const AMBIGUOUS_INTERNAL_ERROR: i64 = 65001;

/// Operation applied to an existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Cancel,
    Approve,
    Reject,
}

impl Transition {
    /// Status the instance holds once the operation took effect.
    pub fn target(&self) -> InstanceStatus {
        match self {
            Transition::Cancel => InstanceStatus::Canceled,
            Transition::Approve => InstanceStatus::Approved,
            Transition::Reject => InstanceStatus::Rejected,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Transition::Cancel => "cancel",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
        }
    }
}

/// Non-zero envelope returned by an instance operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub code: i64,
    pub msg: String,
}

/// Authoritative source of instance status.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn current_status(&self, instance_code: &str) -> Result<InstanceStatus, FeishuError>;
}

/// Turn a failed operation into a definitive outcome.
///
/// Only `AMBIGUOUS_INTERNAL_ERROR` triggers a read-back; any other code is
/// a failure as reported.
pub async fn reconcile<S: InstanceSource + ?Sized>(
    source: &S,
    failure: &RemoteFailure,
    instance_code: &str,
    transition: Transition,
) -> OperationOutcome {
    if failure.code != AMBIGUOUS_INTERNAL_ERROR {
        return OperationOutcome::Failure(generic_reason(failure, transition));
    }

    match source.current_status(instance_code).await {
        Ok(status) => {
            info!(
                instance_code,
                operation = transition.verb(),
                status = %status,
                "read back instance status after ambiguous failure"
            );
            outcome_for(status, failure, transition)
        }
        Err(e) => {
            error!(
                instance_code,
                operation = transition.verb(),
                code = failure.code,
                error = %e,
                "cannot read back instance status"
            );
            OperationOutcome::Failure(format!(
                "{}; status lookup failed: {}",
                generic_reason(failure, transition),
                e
            ))
        }
    }
}

/// Compare the observed status with the transition's target.
pub fn outcome_for(status: InstanceStatus, failure: &RemoteFailure, transition: Transition) -> OperationOutcome {
    if status == transition.target() {
        OperationOutcome::AlreadyInTargetState
    } else if status.is_terminal() {
        OperationOutcome::Failure(format!(
            "already {}, cannot {}",
            status.description(),
            transition.verb()
        ))
    } else {
        OperationOutcome::Failure(generic_reason(failure, transition))
    }
}

fn generic_reason(failure: &RemoteFailure, transition: Transition) -> String {
    format!(
        "{} failed with code {}: {}",
        transition.verb(),
        failure.code,
        failure.msg
    )
}

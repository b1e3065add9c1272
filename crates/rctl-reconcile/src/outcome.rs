use rctl_schemas::Require;
use serde::Serialize;
use std::time::Duration;

/// Why a reconciliation stopped short of acting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "on", rename_all = "snake_case")]
pub enum WaitReason {
    /// Unmet `requires` entries.
    Dependencies { pending: Vec<String> },
    /// File content source not available yet.
    Content { detail: String },
}

impl WaitReason {
    pub(crate) fn dependencies(pending: &[Require]) -> Self {
        WaitReason::Dependencies {
            pending: pending.iter().map(ToString::to_string).collect(),
        }
    }
}

/// What one successful reconciliation did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The resource no longer exists.
    Absent,
    /// Already done or failed; nothing ran.
    AlreadySettled,
    /// Blocked; a poll has been requested.
    Waiting(WaitReason),
    /// Action ran and succeeded.
    Done,
    /// Action ran and the remote command exited non-zero.
    Failed { exit_code: i32 },
    /// The resource can never run as declared (e.g. unsupported content source).
    Rejected { message: String },
}

impl Outcome {
    /// `true` if this call executed a remote command.
    pub fn ran_action(&self) -> bool {
        matches!(self, Outcome::Done | Outcome::Failed { .. })
    }

    /// `true` when the resource reached, or already was in, a terminal state.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Outcome::AlreadySettled | Outcome::Done | Outcome::Failed { .. } | Outcome::Rejected { .. }
        )
    }
}

/// Outcome plus the caller's next step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciled {
    pub outcome: Outcome,
    /// Re-deliver the same key after this delay. `None`: do not requeue.
    pub requeue_after: Option<Duration>,
}

impl Reconciled {
    pub fn finished(outcome: Outcome) -> Self {
        Self {
            outcome,
            requeue_after: None,
        }
    }

    pub fn requeue(outcome: Outcome, after: Duration) -> Self {
        Self {
            outcome,
            requeue_after: Some(after),
        }
    }
}

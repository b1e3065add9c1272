use rctl_schemas::ResourceKey;
use std::fmt;

/// Store failures.
///
/// `NotFound` is the only variant callers are expected to branch on; every
/// other variant is an infrastructure failure and retryable.
#[derive(Debug)]
pub enum StoreError {
    NotFound {
        key: ResourceKey,
    },
    /// Optimistic-concurrency check failed on a status write.
    Conflict {
        key: ResourceKey,
        expected: u64,
        actual: u64,
    },
    /// Re-apply with a spec different from the stored one.
    SpecImmutable {
        key: ResourceKey,
    },
    /// Backend failure (lock poisoning, snapshot IO, injected fault, ...).
    Backend {
        op: &'static str,
        reason: String,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn backend(op: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Backend {
            op,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { key } => write!(f, "{key} not found"),
            StoreError::Conflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "conflict writing {key}: resourceVersion {expected} is stale (stored {actual})"
            ),
            StoreError::SpecImmutable { key } => {
                write!(f, "spec of {key} is immutable; delete and re-create to change it")
            }
            StoreError::Backend { op, reason } => write!(f, "store {op} failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

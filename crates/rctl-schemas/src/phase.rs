//! Coarse progress marker stored as `status_string`.
//!
//! # Progression
//!
//! ```text
//!   None ──► Waiting ─┬─► Running ──► Done   (terminal)
//!     │        ▲  │   │          └──► Failed (terminal)
//!     │        └──┘   │
//!     └───────────────┘
//! ```
//!
//! `Waiting` may be re-entered any number of times while dependencies are
//! unmet. No other backward move exists.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "WAITING")]
    Waiting,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "FAILED")]
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::None => "",
            Phase::Waiting => "WAITING",
            Phase::Running => "RUNNING",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        }
    }

    /// Position along the forward path. `Done` and `Failed` share a rank.
    fn rank(&self) -> u8 {
        match self {
            Phase::None => 0,
            Phase::Waiting => 1,
            Phase::Running => 2,
            Phase::Done | Phase::Failed => 3,
        }
    }

    /// `true` for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }

    /// Whether moving from `self` to `next` keeps the progression monotonic.
    ///
    /// Staying in `Waiting` is allowed; leaving a terminal phase is not.
    pub fn can_advance_to(&self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if *self == Phase::Waiting && next == Phase::Waiting {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::None => f.write_str("<none>"),
            other => f.write_str(other.as_str()),
        }
    }
}

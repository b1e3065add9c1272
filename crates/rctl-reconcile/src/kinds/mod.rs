//! Per-kind capabilities plugged into the generic engine.
//!
//! Each kind answers three questions: what does it depend on, what command
//! does it run, and how does that command's output land in its status.

mod command;
mod file;
mod file_content;
mod host;

pub use host::host_facts;

use crate::ReconcileError;
use rctl_config::CredentialResolver;
use rctl_exec::ExecOutput;
use rctl_schemas::{KindResource, Phase, Requires};
use rctl_store::ResourceStore;

/// Read-only collaborators available to the content gate.
pub struct ContentSources<'a> {
    pub store: &'a dyn ResourceStore,
    pub credentials: &'a dyn CredentialResolver,
}

/// Kind-specific gate between dependency readiness and the action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentGate {
    /// Proceed. Carries the resolved content for kinds that need it.
    Ready(Option<String>),
    /// Not available yet; poll like an unmet dependency.
    Pending(String),
    /// Can never become available as declared.
    Rejected(String),
}

/// How an executed command's output classifies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Success; status now holds the result and `done`.
    Done,
    /// Business failure; status now holds FAILED and the exit code.
    Failed { exit_code: i32 },
    /// The command succeeded but its output is unusable; status now holds
    /// FAILED and `message`.
    Rejected { message: String },
    /// The action cannot be judged yet; status untouched, caller retries.
    Retry { exit_code: i32, stderr: String },
}

/// A resource kind the engine can drive.
pub trait Reconcilable: KindResource {
    /// Dependency list. Hosts have none.
    fn requires(&self) -> Option<&Requires>;

    /// Name of the Host the action runs on.
    fn host_name(&self) -> &str;

    fn phase(&self) -> Phase;
    fn set_phase(&mut self, phase: Phase);
    fn is_done(&self) -> bool;

    /// Resolve action input that lives outside the spec. Default: nothing to
    /// resolve.
    fn resolve_content(&self, _sources: &ContentSources<'_>) -> Result<ContentGate, ReconcileError> {
        Ok(ContentGate::Ready(None))
    }

    /// Record a terminal rejection from the content gate.
    fn reject(&mut self, _message: String) {
        self.set_phase(Phase::Failed);
    }

    /// The shell command to run. `content` is what `resolve_content`
    /// returned.
    fn build_command(&self, content: Option<&str>) -> String;

    /// Fold the command's output into status.
    fn apply_result(&mut self, output: ExecOutput) -> Verdict;
}

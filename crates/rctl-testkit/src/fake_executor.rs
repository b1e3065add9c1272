//! Scripted remote executor.
//!
//! Rules match on a substring of the command and are tried in insertion
//! order. A rule may be limited to a number of uses, after which it is
//! skipped. Unmatched commands succeed with empty output, except the host
//! facts probe, which answers with a plausible `uname -a` line.

use rctl_config::PrivateKey;
use rctl_exec::commands::HOST_FACTS_COMMAND;
use rctl_exec::{ExecOutput, RemoteExecutor, Target, TransportError};
use std::sync::Mutex;

#[derive(Clone, Debug)]
pub enum FakeResponse {
    Output(ExecOutput),
    /// Fail as if the host could not be dialed.
    Unreachable(String),
}

impl FakeResponse {
    pub fn ok(stdout: &str) -> Self {
        FakeResponse::Output(ExecOutput::success(stdout))
    }

    pub fn exit(code: i32, stderr: &str) -> Self {
        FakeResponse::Output(ExecOutput::exited(code, stderr))
    }
}

/// One recorded call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecCall {
    pub target: Target,
    pub command: String,
}

struct Rule {
    needle: String,
    response: FakeResponse,
    remaining: Option<usize>,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    calls: Vec<ExecCall>,
}

#[derive(Default)]
pub struct FakeExecutor {
    state: Mutex<State>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every command containing `needle` with `response`.
    pub fn on(&self, needle: &str, response: FakeResponse) -> &Self {
        self.push(needle, response, None)
    }

    /// Answer the next `times` commands containing `needle` with `response`.
    pub fn on_times(&self, needle: &str, times: usize, response: FakeResponse) -> &Self {
        self.push(needle, response, Some(times))
    }

    fn push(&self, needle: &str, response: FakeResponse, remaining: Option<usize>) -> &Self {
        self.lock().rules.push(Rule {
            needle: needle.to_string(),
            response,
            remaining,
        });
        self
    }

    pub fn calls(&self) -> Vec<ExecCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Calls whose command contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.command.contains(needle))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread must not hide the calls from the others.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl RemoteExecutor for FakeExecutor {
    fn execute(
        &self,
        target: &Target,
        _key: &PrivateKey,
        command: &str,
    ) -> Result<ExecOutput, TransportError> {
        let mut state = self.lock();
        state.calls.push(ExecCall {
            target: target.clone(),
            command: command.to_string(),
        });

        let matched = state.rules.iter_mut().find(|r| {
            command.contains(&r.needle) && r.remaining.map_or(true, |n| n > 0)
        });
        let response = match matched {
            Some(rule) => {
                if let Some(n) = rule.remaining.as_mut() {
                    *n -= 1;
                }
                rule.response.clone()
            }
            None if command == HOST_FACTS_COMMAND => FakeResponse::ok(&format!(
                "Linux {} 6.1.0-fake #1 SMP x86_64 GNU/Linux\n",
                target.address
            )),
            None => FakeResponse::ok(""),
        };

        match response {
            FakeResponse::Output(out) => Ok(out),
            FakeResponse::Unreachable(reason) => Err(TransportError::Dial {
                target: target.to_string(),
                reason,
            }),
        }
    }
}

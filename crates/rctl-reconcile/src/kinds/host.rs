use super::{Reconcilable, Verdict};
use rctl_exec::{commands, ExecOutput};
use rctl_schemas::{Host, Phase, Requires};
use std::collections::BTreeMap;

/// A Host is its own target: the engine looks it up by its own name.
impl Reconcilable for Host {
    fn requires(&self) -> Option<&Requires> {
        None
    }

    fn host_name(&self) -> &str {
        &self.metadata.name
    }

    fn phase(&self) -> Phase {
        self.status.status_string
    }

    fn set_phase(&mut self, phase: Phase) {
        self.status.status_string = phase;
    }

    fn is_done(&self) -> bool {
        self.status.ready
    }

    fn build_command(&self, _content: Option<&str>) -> String {
        commands::HOST_FACTS_COMMAND.to_string()
    }

    fn apply_result(&mut self, output: ExecOutput) -> Verdict {
        if output.exit_code != 0 {
            return Verdict::Retry {
                exit_code: output.exit_code,
                stderr: output.stderr,
            };
        }
        self.status.facts = host_facts(&output.stdout);
        self.status.ready = true;
        self.status.status_string = Phase::Done;
        Verdict::Done
    }
}

/// Facts from `uname -a` output: the full line as `uname`, plus `kernel`,
/// `hostname` and `kernel_release` when present.
pub fn host_facts(uname: &str) -> BTreeMap<String, String> {
    let line = uname.trim_end();
    let mut facts = BTreeMap::new();
    facts.insert("uname".to_string(), line.to_string());
    for (name, value) in ["kernel", "hostname", "kernel_release"]
        .into_iter()
        .zip(line.split_whitespace())
    {
        facts.insert(name.to_string(), value.to_string());
    }
    facts
}

use super::{Reconcilable, Verdict};
use rctl_exec::ExecOutput;
use rctl_schemas::{Command, Phase, Requires};

impl Reconcilable for Command {
    fn requires(&self) -> Option<&Requires> {
        self.spec.requires.as_ref()
    }

    fn host_name(&self) -> &str {
        &self.spec.host
    }

    fn phase(&self) -> Phase {
        self.status.status_string
    }

    fn set_phase(&mut self, phase: Phase) {
        self.status.status_string = phase;
    }

    fn is_done(&self) -> bool {
        self.status.done
    }

    fn build_command(&self, _content: Option<&str>) -> String {
        self.spec.command.clone()
    }

    fn apply_result(&mut self, output: ExecOutput) -> Verdict {
        let s = &mut self.status;
        s.stdout = output.stdout;
        s.stderr = output.stderr;
        s.exit_code = output.exit_code;
        if output.exit_code == 0 {
            s.done = true;
            s.status_string = Phase::Done;
            Verdict::Done
        } else {
            s.done = false;
            s.status_string = Phase::Failed;
            Verdict::Failed {
                exit_code: output.exit_code,
            }
        }
    }
}

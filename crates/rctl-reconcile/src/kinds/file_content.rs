use super::{Reconcilable, Verdict};
use rctl_exec::{commands, ExecOutput};
use rctl_schemas::{FileContent, Phase, Requires};

impl Reconcilable for FileContent {
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
        commands::read_file(&self.spec.path)
    }

    fn apply_result(&mut self, output: ExecOutput) -> Verdict {
        let s = &mut self.status;
        s.exit_code = Some(output.exit_code);
        s.stderr = output.stderr;
        if output.exit_code == 0 && output.stdout_lossy {
            let message = format!("{} is not valid UTF-8 text", self.spec.path);
            s.status_string = Phase::Failed;
            s.message = Some(message.clone());
            Verdict::Rejected { message }
        } else if output.exit_code == 0 {
            s.content = output.stdout;
            s.done = true;
            s.status_string = Phase::Done;
            Verdict::Done
        } else {
            s.status_string = Phase::Failed;
            Verdict::Failed {
                exit_code: output.exit_code,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rctl_schemas::FileContentSpec;

    fn fc() -> FileContent {
        FileContent::new(
            "default",
            "logo",
            FileContentSpec {
                host: "h1".to_string(),
                path: "/srv/logo.png".to_string(),
                requires: None,
            },
        )
    }

    #[test]
    fn text_is_captured_verbatim() {
        let mut r = fc();
        let v = r.apply_result(ExecOutput::from_raw("héllo\n".as_bytes(), b"", 0));
        assert_eq!(v, Verdict::Done);
        assert!(r.status.done);
        assert_eq!(r.status.content, "héllo\n");
        assert_eq!(r.status.message, None);
    }

    #[test]
    fn binary_content_fails_instead_of_being_mangled() {
        let mut r = fc();
        let v = r.apply_result(ExecOutput::from_raw(b"\x89PNG\r\n\x1a\n\xff", b"", 0));
        assert_eq!(
            v,
            Verdict::Rejected {
                message: "/srv/logo.png is not valid UTF-8 text".to_string()
            }
        );
        assert!(!r.status.done);
        assert_eq!(r.status.status_string, Phase::Failed);
        assert_eq!(r.status.content, "");
        assert_eq!(r.status.exit_code, Some(0));
    }
}

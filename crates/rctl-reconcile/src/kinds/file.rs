use super::{ContentGate, ContentSources, Reconcilable, Verdict};
use crate::ReconcileError;
use rctl_exec::{commands, ExecOutput};
use rctl_schemas::{File, FileContent, KindResource, Phase, Requires};
use rctl_store::get_as;

impl Reconcilable for File {
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

    /// Content resolution order: literal `content`, then `source.filecontent`,
    /// then `source.secret`. ConfigMap sources, a FAILED FileContent source,
    /// and a File with neither content nor a usable source, are rejected.
    fn resolve_content(&self, sources: &ContentSources<'_>) -> Result<ContentGate, ReconcileError> {
        if let Some(content) = &self.spec.content {
            return Ok(ContentGate::Ready(Some(content.clone())));
        }
        let Some(source) = &self.spec.source else {
            return Ok(ContentGate::Rejected(
                "file declares neither content nor source".to_string(),
            ));
        };
        let namespace = &self.metadata.namespace;

        if let Some(fc) = &source.file_content {
            return match get_as::<FileContent>(sources.store, namespace, &fc.name) {
                Ok(r) if r.status.done => Ok(ContentGate::Ready(Some(r.status.content))),
                Ok(r) if r.status.status_string == Phase::Failed => Ok(ContentGate::Rejected(
                    format!("filecontent '{}' failed", fc.name),
                )),
                Ok(_) => Ok(ContentGate::Pending(format!("filecontent '{}' not done", fc.name))),
                Err(e) if e.is_not_found() => {
                    Ok(ContentGate::Pending(format!("filecontent '{}' not found", fc.name)))
                }
                Err(e) => Err(ReconcileError::ContentSource {
                    key: self.key(),
                    source_ref: format!("filecontent/{}", fc.name),
                    reason: e.to_string(),
                }),
            };
        }

        if let Some(secret) = &source.secret {
            return match sources.credentials.resolve(namespace, &secret.name, &secret.key) {
                Ok(bytes) => Ok(match String::from_utf8(bytes) {
                    Ok(text) => ContentGate::Ready(Some(text)),
                    Err(_) => ContentGate::Rejected(format!(
                        "secret '{}' key '{}' is not UTF-8 text",
                        secret.name, secret.key
                    )),
                }),
                Err(e) if e.is_not_found() => Ok(ContentGate::Pending(format!(
                    "secret '{}' key '{}' not found",
                    secret.name, secret.key
                ))),
                Err(e) => Err(ReconcileError::ContentSource {
                    key: self.key(),
                    source_ref: format!("secret/{}", secret.name),
                    reason: e.to_string(),
                }),
            };
        }

        if let Some(cm) = &source.config_map {
            return Ok(ContentGate::Rejected(format!(
                "configmap content source '{}' is not supported",
                cm.name
            )));
        }

        Ok(ContentGate::Rejected(
            "file source names no content provider".to_string(),
        ))
    }

    fn reject(&mut self, message: String) {
        self.status.status_string = Phase::Failed;
        self.status.message = Some(message);
    }

    fn build_command(&self, content: Option<&str>) -> String {
        commands::write_file(&self.spec.path, content.unwrap_or_default())
    }

    fn apply_result(&mut self, output: ExecOutput) -> Verdict {
        let s = &mut self.status;
        s.exit_code = Some(output.exit_code);
        s.stderr = output.stderr;
        if output.exit_code == 0 {
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

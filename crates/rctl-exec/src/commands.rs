//! Shell command builders for the built-in resource kinds.

/// Run on every Host to collect its facts.
pub const HOST_FACTS_COMMAND: &str = "/usr/bin/uname -a";

const HEREDOC_DELIMITER: &str = "RCTL_EOF";

/// Single-quote `s` for a POSIX shell.
pub fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Print the file at `path`.
pub fn read_file(path: &str) -> String {
    format!("cat {}", sh_quote(path))
}

/// Replace the file at `path` with `content` through a quoted heredoc, so
/// the content is taken verbatim with no shell expansion.
///
/// A heredoc always ends in a newline: content without a trailing newline
/// gets one; empty content yields an empty file.
pub fn write_file(path: &str, content: &str) -> String {
    let delimiter = heredoc_delimiter(content);
    let mut cmd = format!("cat > {} <<'{delimiter}'\n", sh_quote(path));
    cmd.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        cmd.push('\n');
    }
    cmd.push_str(&delimiter);
    cmd
}

/// A delimiter that does not occur as a line of `content`.
fn heredoc_delimiter(content: &str) -> String {
    let clashes = |d: &str| content.lines().any(|l| l == d);
    if !clashes(HEREDOC_DELIMITER) {
        return HEREDOC_DELIMITER.to_string();
    }
    (1..)
        .map(|n| format!("{HEREDOC_DELIMITER}_{n}"))
        .find(|d| !clashes(d))
        .unwrap_or_else(|| HEREDOC_DELIMITER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_survives_embedded_quotes() {
        assert_eq!(sh_quote("/tmp/it's"), r"'/tmp/it'\''s'");
        assert_eq!(read_file("/etc/motd"), "cat '/etc/motd'");
    }

    #[test]
    fn write_adds_missing_final_newline_only() {
        assert_eq!(
            write_file("/f", "hello"),
            "cat > '/f' <<'RCTL_EOF'\nhello\nRCTL_EOF"
        );
        assert_eq!(
            write_file("/f", "hello\n"),
            "cat > '/f' <<'RCTL_EOF'\nhello\nRCTL_EOF"
        );
        assert_eq!(write_file("/f", ""), "cat > '/f' <<'RCTL_EOF'\nRCTL_EOF");
    }

    #[test]
    fn delimiter_avoids_content_lines() {
        let cmd = write_file("/f", "a\nRCTL_EOF\nb");
        assert!(cmd.starts_with("cat > '/f' <<'RCTL_EOF_1'\n"));
        assert!(cmd.ends_with("\nRCTL_EOF_1"));
    }

    #[test]
    fn shell_metacharacters_are_not_expanded() {
        let cmd = write_file("/f", "$HOME `id`");
        assert!(cmd.contains("<<'RCTL_EOF'"));
        assert!(cmd.contains("$HOME `id`\n"));
    }
}

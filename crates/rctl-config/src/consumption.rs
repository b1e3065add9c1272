//! Config consumption map and unused-key guard.
//!
//! Each entry point (daemon, one-shot apply) declares the JSON-pointer
//! prefixes it actually reads. A leaf under any consumed prefix is consumed;
//! every other leaf is reported as unused, which catches typos such as
//! `controler.workers` that would otherwise silently fall back to defaults.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSurface {
    /// Long-running daemon: everything, including the HTTP listener.
    Daemon,
    /// One-shot `apply` from the CLI: no listener.
    Apply,
}

impl ConfigSurface {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSurface::Daemon => "DAEMON",
            ConfigSurface::Apply => "APPLY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub surface: String,
    /// Consumed prefixes used for this analysis (sorted, unique).
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted).
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Pointers read by `ControllerConfig::from_config_json`, per surface.
pub fn consumed_pointers_for(surface: ConfigSurface) -> &'static [&'static str] {
    const SHARED: &[&str] = &[
        "/controller/workers",
        "/controller/dependency_poll_secs",
        "/controller/backoff/base_ms",
        "/controller/backoff/max_secs",
        "/ssh/user",
        "/ssh/connect_timeout_secs",
        "/ssh/binary",
        "/ssh/transport",
        "/credentials/dir",
        "/store/state_file",
    ];
    const DAEMON: &[&str] = &[
        "/controller/workers",
        "/controller/dependency_poll_secs",
        "/controller/backoff/base_ms",
        "/controller/backoff/max_secs",
        "/ssh/user",
        "/ssh/connect_timeout_secs",
        "/ssh/binary",
        "/ssh/transport",
        "/credentials/dir",
        "/store/state_file",
        "/daemon/addr",
        "/daemon/heartbeat_secs",
    ];
    match surface {
        ConfigSurface::Apply => SHARED,
        ConfigSurface::Daemon => DAEMON,
    }
}

/// Produce an unused-key report. With `Fail`, any unused leaf is an error.
pub fn report_unused_keys(
    surface: ConfigSurface,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers_for(surface)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        surface: surface.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (surface={}): {} unused config key(s): {}",
            report.surface,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }
    for p in &report.unused_leaf_pointers {
        tracing::warn!(surface = report.surface, pointer = %p, "config_key_unused");
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// `/a/b` consumes `/a/b` and `/a/b/c` but not `/a/bc`. `/` consumes all.
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map_or(false, |rest| rest.starts_with('/'))
}

pub(crate) fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                let next = format!("{prefix}/{}", escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ => out.push(if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    format!("{:?}", items.iter().take(n).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_respects_segment_boundary() {
        assert!(is_prefix_pointer("/ssh/user", "/ssh/user"));
        assert!(is_prefix_pointer("/ssh", "/ssh/user"));
        assert!(!is_prefix_pointer("/ssh/user", "/ssh/username"));
        assert!(is_prefix_pointer("/", "/anything"));
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        let v = serde_json::json!({"a/b": {"c~d": 1}});
        let mut out = Vec::new();
        collect_leaf_pointers(&v, "", &mut out);
        assert_eq!(out, vec!["/a~1b/c~0d".to_string()]);
    }
}

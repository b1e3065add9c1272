//! Command handler modules for rctl.
//!
//! Shared utilities used by multiple command paths live here.

pub mod apply;
pub mod status;
pub mod validate;

use anyhow::{Context, Result};
use rctl_config::{
    load_layered_yaml, report_unused_keys, ConfigSurface, ControllerConfig, UnusedKeyPolicy,
};
use rctl_schemas::{parse_manifest_json, parse_manifest_yaml, Object};
use std::fs;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Effective config and its hash. No paths means built-in defaults.
pub fn load_config(paths: &[String]) -> Result<(ControllerConfig, Option<String>)> {
    if paths.is_empty() {
        return Ok((ControllerConfig::default(), None));
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    report_unused_keys(ConfigSurface::Apply, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    let cfg = ControllerConfig::from_config_json(&loaded.config_json)?;
    Ok((cfg, Some(loaded.config_hash)))
}

/// Read every manifest file, in order. `.json` files are parsed as JSON,
/// everything else as (multi-document) YAML.
pub fn load_manifests(files: &[String]) -> Result<Vec<Object>> {
    let mut out = Vec::new();
    for path in files {
        let text = fs::read_to_string(path).with_context(|| format!("read manifest failed: {path}"))?;
        let objects = if path.ends_with(".json") {
            parse_manifest_json(&text).with_context(|| format!("parse manifest failed: {path}"))?
        } else {
            parse_manifest_yaml(&text).with_context(|| format!("parse manifest failed: {path}"))?
        };
        out.extend(objects);
    }
    Ok(out)
}

/// One line per resource: `Kind/ns/name phase=... done=...`.
pub fn resource_line(obj: &Object) -> String {
    let phase = match obj.phase().as_str() {
        "" => "NONE",
        p => p,
    };
    format!("{} phase={} done={}", obj.key(), phase, obj.is_done())
}

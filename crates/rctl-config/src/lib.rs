//! rctl-config
//!
//! Layered YAML configuration for the controller, plus credential lookup.
//!
//! # Contract
//! - Config files are merged in order; later layers override earlier ones
//!   key by key (objects merge recursively, everything else replaces).
//! - The merged document is hashed (sha256 over canonical JSON) so a run can
//!   be tied to the exact configuration it used.
//! - Config never carries secret material. A leaf string that looks like a
//!   key or token aborts the load with `CONFIG_SECRET_DETECTED`. SSH keys
//!   live in the credential store (see [`credentials`]), referenced by name.

pub mod consumption;
pub mod credentials;
mod settings;

pub use consumption::{report_unused_keys, ConfigSurface, UnusedKeyPolicy, UnusedKeyReport};
pub use credentials::{
    CredentialError, CredentialResolver, DirCredentialResolver, PrivateKey,
    StaticCredentialResolver, SSH_PRIVATE_KEY_FIELD,
};
pub use settings::{
    BackoffSettings, ControllerConfig, ControllerSettings, CredentialSettings, DaemonSettings,
    SshSettings, StoreSettings, TransportKind,
};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Leaf values starting with any of these are treated as inline secrets.
const SECRET_PREFIXES: &[&str] = &[
    "-----BEGIN", // PEM / OpenSSH private keys
    "ssh-rsa AAAA",
    "ssh-ed25519 AAAA",
    "sk-",
    "AKIA",
    "ghp_",
    "glpat-",
    "xoxb-",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::with_capacity(paths.len());
    for p in paths {
        let raw = fs::read_to_string(p).with_context(|| format!("failed to read config: {p}"))?;
        docs.push(raw);
    }
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        // An empty layer parses as null; it contributes nothing.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Compact JSON with object keys in sorted order.
///
/// serde_json's default `Map` is a BTreeMap, so key order is already
/// canonical once the value is built.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    consumption::collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

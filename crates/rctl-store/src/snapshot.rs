//! JSON snapshot persistence for [`crate::MemoryStore`].

use crate::StoreError;
use rctl_schemas::Object;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub format_version: u32,
    pub objects: Vec<Object>,
}

impl SnapshotFile {
    pub fn from_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            objects: objects.into_iter().collect(),
        }
    }
}

pub fn load_snapshot(path: &Path) -> Result<SnapshotFile, StoreError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| StoreError::backend("load", format!("read {}: {e}", path.display())))?;
    let snap: SnapshotFile = serde_json::from_str(&raw)
        .map_err(|e| StoreError::backend("load", format!("parse {}: {e}", path.display())))?;
    if snap.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(StoreError::backend(
            "load",
            format!(
                "{}: unsupported snapshot format_version {} (expected {SNAPSHOT_FORMAT_VERSION})",
                path.display(),
                snap.format_version
            ),
        ));
    }
    Ok(snap)
}

/// Write `snap` to `path` atomically: temp file in the same directory, then
/// rename over the target.
pub fn write_snapshot(path: &Path, snap: &SnapshotFile) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let body = serde_json::to_vec_pretty(snap)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

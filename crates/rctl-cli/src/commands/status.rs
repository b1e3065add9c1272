use super::{load_config, resource_line};
use anyhow::{bail, Result};
use rctl_runtime::bootstrap::open_store;
use rctl_store::ResourceStore;
use std::path::Path;

pub fn run(config_paths: &[String], state_file: Option<&str>) -> Result<()> {
    let (cfg, _) = load_config(config_paths)?;
    let Some(path) = state_file
        .map(Path::new)
        .or(cfg.store.state_file.as_deref())
    else {
        bail!("no state file: pass --state-file or set /store/state_file");
    };
    if !path.exists() {
        bail!("state file not found: {}", path.display());
    }

    let store = open_store(&cfg, Some(path))?;
    let objects = store.list(None, None)?;
    println!("resources={}", objects.len());
    for obj in &objects {
        println!("{}", resource_line(obj));
    }
    Ok(())
}

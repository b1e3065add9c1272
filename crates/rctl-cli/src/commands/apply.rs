//! `rctl apply`: load manifests into the store and drive them to a terminal
//! state with an in-process controller.

use super::{load_config, load_manifests, resource_line};
use anyhow::{bail, Context, Result};
use rctl_runtime::bootstrap::{build_controller, open_store};
use rctl_schemas::ResourceKey;
use rctl_store::{Applied, ResourceStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct ApplyArgs {
    pub files: Vec<String>,
    pub config_paths: Vec<String>,
    pub state_file: Option<String>,
    pub timeout_secs: u64,
}

const SETTLE_CHECK: Duration = Duration::from_millis(200);

pub async fn run(args: ApplyArgs) -> Result<()> {
    let (cfg, config_hash) = load_config(&args.config_paths)?;
    if let Some(hash) = &config_hash {
        println!("config_hash={hash}");
    }

    let mut objects = load_manifests(&args.files)?;
    let problems = super::validate::check(&objects);
    if !problems.is_empty() {
        for p in &problems {
            println!("problem: {p}");
        }
        bail!("INVALID_MANIFEST: {} problem(s)", problems.len());
    }

    let store = open_store(&cfg, args.state_file.as_deref().map(Path::new))?;
    let mut keys = Vec::with_capacity(objects.len());
    let (mut created, mut unchanged) = (0usize, 0usize);
    for mut obj in objects.drain(..) {
        obj.clear_status();
        let key = obj.key();
        let applied = store.apply(obj).with_context(|| format!("apply {key} failed"))?;
        keys.push(key);
        match applied {
            Applied::Created(_) => created += 1,
            Applied::Unchanged(_) => unchanged += 1,
        }
    }
    println!("applied created={created} unchanged={unchanged}");
    tracing::info!(created, unchanged, "manifests_applied");

    let controller = build_controller(&cfg, store.clone())?;
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(Arc::clone(&controller).run(stop_rx));

    let settled = wait_settled(store.as_ref(), &keys, Duration::from_secs(args.timeout_secs)).await;

    let _ = stop_tx.send(true);
    task.await
        .context("controller task panicked")?
        .context("controller stopped with a store error")?;

    let mut failed = 0usize;
    for key in &keys {
        let obj = store.get(key).with_context(|| format!("read back {key}"))?;
        if !obj.is_done() && obj.is_settled() {
            failed += 1;
        }
        println!("{}", resource_line(&obj));
    }
    let stats = controller.stats();
    println!(
        "reconciles={} errors={} requeues={}",
        stats.reconciles, stats.errors, stats.requeues
    );

    if !settled {
        bail!(
            "APPLY_TIMEOUT: not every resource settled within {}s",
            args.timeout_secs
        );
    }
    if failed > 0 {
        bail!("APPLY_FAILED: {failed} resource(s) FAILED");
    }
    println!("converged=true");
    Ok(())
}

/// Poll until every key is settled or `timeout` elapses.
async fn wait_settled(store: &dyn ResourceStore, keys: &[ResourceKey], timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let all = keys
            .iter()
            .all(|k| store.get(k).map(|o| o.is_settled()).unwrap_or(false));
        if all {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(timeout_secs = timeout.as_secs(), "apply_wait_timed_out");
            return false;
        }
        tokio::time::sleep(SETTLE_CHECK).await;
    }
}

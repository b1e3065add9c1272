//! rctl-daemon entry point.
//!
//! Thin: loads config, opens the store, starts the controller and the
//! heartbeat, wires middleware and serves HTTP until Ctrl-C.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use rctl_config::{
    load_layered_yaml, report_unused_keys, ConfigSurface, ControllerConfig, UnusedKeyPolicy,
};
use rctl_daemon::{routes, state};
use tokio::sync::watch;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let (cfg, config_hash) = load_config()?;
    let store = rctl_runtime::bootstrap::open_store(&cfg, None)?;
    let controller = rctl_runtime::bootstrap::build_controller(&cfg, store.clone())?;

    let mut app_state = state::AppState::new(store, Arc::clone(&controller));
    if let Some(hash) = config_hash {
        app_state = app_state.with_config_hash(hash);
    }
    let shared = Arc::new(app_state);

    state::spawn_heartbeat(
        shared.bus.clone(),
        Duration::from_secs(cfg.daemon.heartbeat_secs.max(1)),
    );
    state::spawn_event_forwarder(&controller, shared.bus.clone());

    let (stop_tx, stop_rx) = watch::channel(false);
    let controller_task = tokio::spawn(Arc::clone(&controller).run(stop_rx));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env()
        .map(Ok)
        .unwrap_or_else(|| cfg.daemon.addr.parse::<SocketAddr>())
        .with_context(|| format!("CONFIG_INVALID /daemon/addr '{}'", cfg.daemon.addr))?;
    info!("rctl-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("server crashed")?;

    let _ = stop_tx.send(true);
    controller_task
        .await
        .context("controller task panicked")?
        .context("controller stopped with a store error")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `RCTL_CONFIG` holds comma-separated layer paths in merge order. Unset
/// means built-in defaults.
fn load_config() -> anyhow::Result<(ControllerConfig, Option<String>)> {
    let Ok(raw) = std::env::var("RCTL_CONFIG") else {
        info!("RCTL_CONFIG not set; using built-in defaults");
        return Ok((ControllerConfig::default(), None));
    };
    let paths: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    let loaded = load_layered_yaml(&paths)?;
    report_unused_keys(ConfigSurface::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    let cfg = ControllerConfig::from_config_json(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, "config loaded");
    Ok((cfg, Some(loaded.config_hash)))
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("RCTL_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

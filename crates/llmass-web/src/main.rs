use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use llmass_web::config::{Args, ensure_sessions_dir, load_runtime_config};
use llmass_web::{AppState, serve};

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before logging so RUST_LOG may come from .env too.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llmass_web=info,libllmass=info".into()),
        )
        .init();

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => info!("no .env file, using process environment"),
        Err(e) => return Err(e).context("failed to load .env"),
    }

    let args = Args::parse();
    let cfg = load_runtime_config(&args)?;
    ensure_sessions_dir(&cfg.sessions_dir)?;

    let state = AppState::from_config(&cfg);
    let dispatcher = state.dispatcher.clone();

    let listener = tokio::net::TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!(
        listen = %cfg.listen,
        base_url = %cfg.base_url,
        sessions_dir = %cfg.sessions_dir.display(),
        default_mode = %cfg.default_mode,
        "llmass-web listening"
    );

    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down...");
    })
    .await
    .context("http server failed")?;

    let pending = dispatcher.in_flight();
    if pending > 0 {
        info!(pending, "waiting for background commands to finish");
    }
    dispatcher.drain().await;
    Ok(())
}

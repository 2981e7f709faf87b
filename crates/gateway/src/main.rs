//! wamux server binary.

use std::sync::Arc;

use {
    anyhow::Context,
    clap::Parser,
    tracing::info,
    tracing_subscriber::EnvFilter,
};

use {
    wamux_connector::{FsCredentialStore, SidecarConnector, sidecar::DEFAULT_SIDECAR_URL},
    wamux_gateway::{ApiState, auth::AuthConfig, router},
    wamux_sessions::{SessionRegistry, SessionTuning},
};

#[derive(Parser)]
#[command(name = "wamux", about = "Multi-tenant WhatsApp session gateway")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "WAMUX_BIND", default_value = "0.0.0.0:3300")]
    bind: String,

    /// Static API key callers must present.
    #[arg(long, env = "API_KEY")]
    api_key: String,

    /// Secret for request-signature verification.
    #[arg(long, env = "SECRET_KEY")]
    signing_secret: String,

    /// Directory holding per-tenant credential directories.
    #[arg(long, env = "WAMUX_CREDENTIAL_DIR", default_value = "sessions")]
    credential_dir: String,

    /// WebSocket URL of the connector sidecar.
    #[arg(long, env = "WAMUX_SIDECAR_URL", default_value = DEFAULT_SIDECAR_URL)]
    sidecar_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let store = Arc::new(FsCredentialStore::new(&args.credential_dir));
    let connector = Arc::new(SidecarConnector::new(&args.sidecar_url));
    let registry = Arc::new(SessionRegistry::new(
        connector,
        store,
        SessionTuning::default(),
    ));

    let state = ApiState::new(registry, AuthConfig {
        api_key: args.api_key,
        signing_secret: args.signing_secret,
    });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(bind = %args.bind, "wamux gateway listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

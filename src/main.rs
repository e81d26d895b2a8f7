// src/main.rs

use std::env;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use cosmos_tx_relay::{
    api::create_router,
    config::Config,
    keys::{encryption::seal_private_key, Keyring},
    AppState,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- HTTP Server Logic ---
async fn run_http_server(state: AppState) -> Result<()> {
    let app = create_router(state.clone());

    let addr = SocketAddr::from((state.config.bind_address, state.config.port));
    info!(
        "🚀 HTTP Server listening on {} ({:?} mode, keys in {})",
        addr,
        state.config.connectivity,
        state.key_store.dir().display()
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("HTTP server failed")
}

// --- Key sealing ---
// Reads a hex private key from `input`, seals it with KEY_PASSPHRASE and
// writes the key file to `output`.
fn seal_key(input: &Path, output: &Path) -> Result<()> {
    let passphrase = env::var("KEY_PASSPHRASE").context("KEY_PASSPHRASE must be set to seal a key")?;
    let prefix = env::var("BECH32_PREFIX").unwrap_or_else(|_| "cosmos".to_string());

    let key_hex = zeroize::Zeroizing::new(
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?,
    );
    let address = Keyring::from_hex(&key_hex)?.account_id(&prefix)?;

    let sealed = seal_private_key(&key_hex, &passphrase)?;
    std::fs::write(output, sealed).with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Sealed key for {} written to {}", address, output.display());
    println!("{}", address);
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cosmos_tx_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("seal-key") => match (args.get(2), args.get(3)) {
            (Some(input), Some(output)) => seal_key(Path::new(input), Path::new(output)),
            _ => Err(anyhow!("usage: {} seal-key <hex-key-file> <out-file>", args[0])),
        },
        _ => serve().await,
    };

    if let Err(e) = result {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn serve() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let state = AppState::new(config).context("Failed to initialize node client")?;
    run_http_server(state).await
}

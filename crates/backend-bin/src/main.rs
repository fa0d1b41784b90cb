//! `volunteer-server`: HTTP entry point and credential tooling.
//!
//! Usage:
//!   volunteer-server [serve] [-c config.toml] [--listen <addr>]
//!   echo 'password' | volunteer-server hash-password

use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;
use volunteer_backend::{
    auth::{CredentialHasher, Pbkdf2Hasher},
    config::{Settings, DEFAULT_CONFIG_FILE},
    router,
    storage::FlatFileUserStore,
    AppState,
};
use zeroize::Zeroize;

/// How often idle legacy sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Volunteering platform identity server.
#[derive(Parser, Debug)]
#[command(name = "volunteer-server", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Path to the TOML config file
        #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Listen address, overriding `bind_addr`
        #[arg(long = "listen")]
        listen: Option<SocketAddr>,
    },
    /// Read a password from stdin and print a fresh salt and hash for it
    HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve {
        config: PathBuf::from(DEFAULT_CONFIG_FILE),
        listen: None,
    }) {
        Command::Serve { config, listen } => serve(config, listen).await,
        Command::HashPassword => hash_password(),
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn serve(config: PathBuf, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    // A missing signing secret stops us here, before anything listens
    let settings = Settings::load_from(&config)?;
    init_tracing(&settings);
    info!(config = %config.display(), "configuration loaded");

    let users = Arc::new(FlatFileUserStore::new(&settings.data_dir)?);
    let addr = listen.unwrap_or(settings.bind_addr);
    let state = Arc::new(AppState::new(users, settings)?);

    let sweeper = state.sessions.spawn_cleanup(SESSION_SWEEP_INTERVAL);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = router::create_router(state).layer(cors);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

/// Prints the two columns an operator needs to seed a user record by hand
fn hash_password() -> anyhow::Result<()> {
    let mut password = String::new();
    std::io::stdin().lock().read_line(&mut password)?;

    let trimmed_len = password.trim_end_matches(['\r', '\n']).len();
    password.truncate(trimmed_len);
    if password.is_empty() {
        anyhow::bail!("no password given on stdin");
    }

    let hasher = Pbkdf2Hasher::new();
    let salt = hasher.generate_salt();
    let hash = hasher.compute_hash(&password, &salt);
    password.zeroize();
    let hash = hash?;

    println!("PswdSalt: {salt}");
    println!("PswdHash: {hash}");
    Ok(())
}

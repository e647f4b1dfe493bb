//! SecureBiz server and operator tools
//!
//! ```bash
//! # Run the API (reads JWT_SECRET, APP_ENV, BIND_ADDR, ...)
//! securebiz serve
//!
//! # Print a signing secret strong enough for the given environment
//! securebiz generate-secret --environment production
//!
//! # Hash a password read from stdin
//! echo -n 'correct horse' | securebiz hash-password
//! ```

use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use securebiz::error::{self, ErrorConfig};
use securebiz::observability::{self, security_event, ObservabilityConfig, SecurityEvent};
use securebiz::{password, AppConfig, AppState, Environment, SigningSecret};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "securebiz")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,

    /// Generate a random JWT signing secret
    GenerateSecret {
        /// Target environment: development, test, production
        #[arg(short, long, default_value = "production")]
        environment: String,
    },

    /// Hash a password from stdin with bcrypt
    HashPassword {
        /// bcrypt cost
        #[arg(long, default_value_t = securebiz::DEFAULT_BCRYPT_COST)]
        cost: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => cmd_serve(),
        Commands::GenerateSecret { environment } => cmd_generate_secret(&environment),
        Commands::HashPassword { cost } => cmd_hash_password(cost),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_serve() -> anyhow::Result<()> {
    observability::init(ObservabilityConfig::from_env())?;

    let config = AppConfig::from_env().context("failed to load configuration")?;
    error::init(ErrorConfig::for_environment(config.environment));

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr;
    let environment = config.environment;
    let state = AppState::new(config).context("failed to initialize auth service")?;
    let app = securebiz::app(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    security_event!(
        SecurityEvent::SystemStartup,
        addr = %addr,
        environment = %environment,
        version = env!("CARGO_PKG_VERSION"),
        "Server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    security_event!(SecurityEvent::SystemShutdown, addr = %addr, "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn cmd_generate_secret(environment: &str) -> anyhow::Result<()> {
    let environment = Environment::from_str_loose(environment)
        .with_context(|| format!("unknown environment: {environment}"))?;
    println!("{}", SigningSecret::generate_for(environment));
    Ok(())
}

fn cmd_hash_password(cost: u32) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;
    let plaintext = input.trim_end_matches(['\r', '\n']);
    anyhow::ensure!(!plaintext.is_empty(), "no password on stdin");

    println!("{}", password::hash_password(plaintext, cost)?);
    Ok(())
}

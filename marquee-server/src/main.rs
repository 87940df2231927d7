use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee_core::application::unit_of_work::AppUnitOfWork;
use marquee_core::auth::AuthCrypto;
use marquee_core::database::PostgresDatabase;
use marquee_core::rate_limit::{InMemoryRateLimiter, RateLimiter};
use marquee_core::visitors::spawn_retention_sweep;
use marquee_server::infra::config::{Config, ConfigLoad, ConfigLoader, ConfigWarnings};
use marquee_server::infra::middleware::RedisRateLimiter;
use marquee_server::{AppState, create_app};

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const VISITOR_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "marquee-server")]
#[command(about = "HTTP back end for the Marquee streaming front end")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, env = "MARQUEE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env)
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli.serve)?;

    if let Some(Command::Db(DbCommand::Migrate)) = cli.command {
        return run_db_migrate(&config).await;
    }

    run_server(config).await
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }

    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    init_tracing();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    log_config_warnings(&warnings);

    Ok(config)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn log_config_warnings(warnings: &ConfigWarnings) {
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }
}

async fn connect_postgres(config: &Config) -> anyhow::Result<Option<Arc<PostgresDatabase>>> {
    let Some(url) = config.database.primary_url.as_deref() else {
        return Ok(None);
    };
    let db = PostgresDatabase::connect(url, config.database.max_connections)
        .await
        .context("failed to connect to PostgreSQL")?;
    db.migrate().await.context("database migration failed")?;
    Ok(Some(Arc::new(db)))
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    if connect_postgres(config).await?.is_none() {
        anyhow::bail!("DATABASE_URL is not set; nothing to migrate");
    }
    info!("Database migrations applied successfully");
    Ok(())
}

async fn build_rate_limiter(
    config: &Config,
) -> (Arc<dyn RateLimiter>, Option<JoinHandle<()>>) {
    if let Some(redis) = &config.redis {
        match RedisRateLimiter::connect(&redis.url).await {
            Ok(limiter) => {
                info!("rate limiting backed by Redis");
                return (Arc::new(limiter), None);
            }
            Err(err) => {
                warn!(error = %err, "Redis unavailable, falling back to in-memory rate limiting")
            }
        }
    }
    let limiter = Arc::new(InMemoryRateLimiter::new());
    let sweeper = limiter.spawn_sweeper(RATE_LIMIT_SWEEP_INTERVAL);
    let limiter: Arc<dyn RateLimiter> = limiter;
    (limiter, Some(sweeper))
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let postgres = connect_postgres(&config).await?;
    let unit_of_work = match &postgres {
        Some(db) => AppUnitOfWork::from_postgres(db),
        None => {
            info!("using the in-memory store");
            AppUnitOfWork::in_memory()
        }
    };

    let auth_crypto = AuthCrypto::new(config.auth.password_pepper.as_bytes())
        .context("failed to initialise password hashing")?;
    let (rate_limiter, rate_limit_sweeper) = build_rate_limiter(&config).await;
    let visitor_sweeper = spawn_retention_sweep(
        unit_of_work.visitor_logs.clone(),
        config.visitors.retention,
        VISITOR_SWEEP_INTERVAL,
    );

    let mut state =
        AppState::new(config, unit_of_work, auth_crypto, rate_limiter)
            .with_configured_upstreams()?;
    if let Some(db) = postgres {
        state = state.with_postgres(db);
    }

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    )
    .parse()
    .context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, dev_mode = state.config.dev_mode, "Marquee server listening");

    let app = create_app(state.clone());
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("shutting down, draining playtime queue");
    visitor_sweeper.abort();
    if let Some(sweeper) = rate_limit_sweeper {
        sweeper.abort();
    }
    match state.playtime.flush_all().await {
        Ok(report) => info!(persisted = report.persisted, "playtime queue drained"),
        Err(err) => error!(error = %err, "playtime queue not fully drained"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}

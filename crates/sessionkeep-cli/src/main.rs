//! sessionkeep CLI
//!
//! Command-line interface for creating, inspecting and sweeping session tables

mod settings;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sessionkeep_core::{Cookie, SessionData, SessionStore};
use sessionkeep_sql::{SqlSessionStore, StoreConfig, schema};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "sessionkeep")]
#[command(about = "sessionkeep - relational session storage", long_about = None)]
struct Cli {
    /// Path to a YAML or TOML store configuration
    #[arg(long, env = "SESSIONKEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Database connection URL (sqlite://, postgres://, mysql://)
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://sessions.db?mode=rwc")]
    database_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log SQL queries (sqlx is held at warn otherwise)
    #[arg(long)]
    log_sql_queries: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the session table and its expiry index if missing
    Init,
    /// Count stored sessions, expired ones included
    Count,
    /// Delete every stored session
    Clear,
    /// Delete expired sessions once
    Sweep,
    /// Simulate visitors against the store and report on it periodically
    Demo {
        /// Cookie lifetime of the simulated sessions in milliseconds
        #[arg(long, default_value = "30000")]
        max_age_ms: i64,

        /// Seconds between session count reports
        #[arg(long, default_value = "2")]
        report_secs: u64,

        /// Seconds between full clears
        #[arg(long, default_value = "30")]
        clear_secs: u64,

        /// Stop after this many seconds (runs until Ctrl-C otherwise)
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_sql_queries)?;

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading store configuration from {}", path.display());
            StoreConfig::from_file(path)?
        }
        None => StoreConfig::default(),
    };
    if cli.config.is_none() {
        config.db_type = settings::db_type_from_url(&cli.database_url)?;
    }
    settings::merge_env(&mut config);
    config.validate()?;

    tracing::debug!(
        db_type = %config.db_type,
        table = %config.table_name,
        cleanup_interval_ms = config.cleanup_interval_ms,
        "Store configuration"
    );

    let pool = connect(&cli.database_url).await?;

    match cli.command {
        Commands::Init => {
            if schema::create_table(&pool, &config.dialect()).await? {
                println!("Created table {}", config.table_name);
            } else {
                println!("Table {} already exists", config.table_name);
            }
        }
        Commands::Count => {
            let store = open_store(pool, config.with_cleanup_interval_ms(0))?;
            println!("There are {} sessions", store.length().await?);
        }
        Commands::Clear => {
            let store = open_store(pool, config.with_cleanup_interval_ms(0))?;
            println!("Cleared {} sessions", store.clear().await?);
        }
        Commands::Sweep => {
            let store = open_store(pool, config.with_cleanup_interval_ms(0))?;
            let stats = store.cleanup_now().await?;
            println!(
                "Removed {} expired sessions in {}ms",
                stats.sessions_deleted, stats.duration_ms
            );
        }
        Commands::Demo {
            max_age_ms,
            report_secs,
            clear_secs,
            duration_secs,
        } => {
            schema::create_table(&pool, &config.dialect()).await?;
            let store = open_store(pool, config)?;
            run_demo(
                &store,
                max_age_ms,
                Duration::from_secs(report_secs.max(1)),
                Duration::from_secs(clear_secs.max(1)),
                duration_secs.map(Duration::from_secs),
            )
            .await?;
            store.shutdown().await;
        }
    }

    Ok(())
}

fn init_logging(log_level: &str, log_sql_queries: bool) -> anyhow::Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if !log_sql_queries {
        match "sqlx=warn".parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Failed to set sqlx log filter: {}", e),
        }
    }

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn connect(database_url: &str) -> anyhow::Result<AnyPool> {
    sqlx::any::install_default_drivers();

    AnyPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to {}", settings::redact_url(database_url)))
}

fn open_store(pool: AnyPool, config: StoreConfig) -> anyhow::Result<SqlSessionStore> {
    Ok(SqlSessionStore::new(pool, config)?)
}

/// Simulated traffic: each tick a new or returning visitor bumps a view count
async fn run_demo(
    store: &SqlSessionStore,
    max_age_ms: i64,
    report_every: Duration,
    clear_every: Duration,
    duration: Option<Duration>,
) -> anyhow::Result<()> {
    let mut visitors: Vec<String> = Vec::new();
    let mut visits: u64 = 0;
    let mut visit = tokio::time::interval(Duration::from_millis(500));
    let mut report = tokio::time::interval(report_every);
    let mut clear = tokio::time::interval(clear_every);
    // Both intervals fire immediately otherwise
    report.tick().await;
    clear.tick().await;

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    tracing::info!("Demo running, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = visit.tick() => {
                let sid = next_visitor(&mut visitors, visits);
                visits += 1;
                let views = match store.get(&sid).await? {
                    Some(session) => session.get("views").and_then(|v| v.as_u64()).unwrap_or(0),
                    None => 0,
                };
                let session = SessionData::new(Cookie::new().with_max_age(max_age_ms))
                    .with_field("views", views + 1);
                store.set(&sid, &session).await?;
                tracing::debug!("{} views for session {}", views, sid);
            }
            _ = report.tick() => {
                println!("There are {} sessions", store.length().await?);
            }
            _ = clear.tick() => {
                println!("Cleared {} sessions", store.clear().await?);
                visitors.clear();
            }
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping demo");
                break;
            }
        }
    }

    Ok(())
}

/// Every third visit comes from a new visitor; the rest return
fn next_visitor(visitors: &mut Vec<String>, visit: u64) -> String {
    if visit % 3 != 0 && !visitors.is_empty() {
        let index = (uuid::Uuid::new_v4().as_u128() % visitors.len() as u128) as usize;
        return visitors[index].clone();
    }
    let sid = uuid::Uuid::new_v4().to_string();
    visitors.push(sid.clone());
    sid
}

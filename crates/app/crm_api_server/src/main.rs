//! Startup CRM API server binary.

use std::sync::Arc;

use clap::Parser;
use crm_api::AppState;
use crm_api::config::ApiConfig;
use crm_core::auth::memory::MemoryCredentialStore;
use crm_core::auth::queries::PgCredentialStore;
use crm_core::auth::seed::{seed_demo_users, seed_role_permissions};
use crm_core::auth::store::CredentialStore;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server. Unset options fall back to the
/// environment (see [`ApiConfig::from_env`]).
#[derive(Parser, Debug)]
#[command(name = "crm_api_server", about = "Startup CRM API server")]
struct Args {
    /// Address to listen on, e.g. 0.0.0.0:3100.
    #[arg(long)]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep users, sessions and permissions in process memory instead of
    /// PostgreSQL. Everything is lost on exit.
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Create the demo accounts (admin, manager1, sales1, dev1, sales2).
    #[arg(long, env = "SEED_DEMO_USERS", default_value_t = false)]
    seed_demo_users: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,crm_api=debug,crm_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(database_url) = args.database_url {
        config.pg_connection_url = database_url;
    }

    info!(
        version = crm_core::version(),
        bind_addr = %config.bind_addr,
        environment = ?config.environment,
        in_memory = args.in_memory,
        "starting crm_api_server"
    );

    let store: Arc<dyn CredentialStore> = if args.in_memory {
        warn!("using in-memory credential store; data is not persisted");
        Arc::new(MemoryCredentialStore::new())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        crm_core::migrate::migrate(&pool).await?;
        Arc::new(PgCredentialStore::new(pool))
    };

    seed_role_permissions(store.as_ref()).await?;

    let state = AppState::new(store, config.clone());
    state.gate.engine().invalidate().await;

    if args.seed_demo_users {
        let created = seed_demo_users(&state.sessions).await?;
        info!(created, "demo users seeded");
    }

    let app = crm_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_sentinel::cli::{self, Cli, Commands, CycleCommands, DbCommands, TxCommands};
use ledger_sentinel::config::{Config, LogFormat};
use ledger_sentinel::services::JobScheduler;
use ledger_sentinel::{db, health, startup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if let Some(Commands::Config) = cli.command {
        return cli::handle_config_validate(&config);
    }

    let pool = db::create_pool(&config).await?;

    match cli.command {
        None | Some(Commands::Serve) => serve(config, pool).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&pool).await,
        Some(Commands::Tx(TxCommands::List { owner_id, types })) => {
            let engine = startup::build_engine(&config, &pool)?;
            cli::handle_tx_list(&engine, &owner_id, &types).await
        }
        Some(Commands::Monitor(CycleCommands::RunOnce)) => {
            let engine = startup::build_engine(&config, &pool)?;
            cli::handle_monitor_run_once(&engine).await
        }
        Some(Commands::Scan(CycleCommands::RunOnce)) => {
            let engine = startup::build_engine(&config, &pool)?;
            cli::handle_scan_run_once(&engine).await
        }
        Some(Commands::Config) => Ok(()),
    }
}

async fn serve(config: Config, pool: sqlx::PgPool) -> anyhow::Result<()> {
    db::run_migrations(&pool).await?;

    let engine = startup::build_engine(&config, &pool)?;
    let mut scheduler = JobScheduler::new();
    engine.schedule(&mut scheduler, &config.reconciler);
    tracing::info!(jobs = scheduler.job_count(), "Background jobs scheduled");

    let app = health::router(engine.health_state(&pool, scheduler.board()));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.health_port));
    tracing::info!("listening on {}", addr);

    let server = axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        });

    let result = server.await;
    scheduler.shutdown().await;
    result?;

    Ok(())
}

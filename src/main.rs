use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regtoken::auth::jwt::JwtVerifier;
use regtoken::store::postgres::PgStore;
use regtoken::store::{AllocationFilter, SequenceStore};
use regtoken::{api, cli, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "regtoken=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Tokens { command }) => handle_tokens_command(&cfg, command).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let identity = Arc::new(JwtVerifier::new(&cfg.jwt_secret, cfg.jwt_issuer.as_deref()));
    let state = Arc::new(AppState::new(Arc::new(db), identity, &cfg));
    let app = api::app_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("registration-token issuance service listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_tokens_command(
    cfg: &config::Config,
    cmd: cli::TokenCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::List {
            prefix,
            year,
            month,
        } => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let records = db
                .list_allocations(&AllocationFilter {
                    prefix,
                    year,
                    month,
                })
                .await?;

            if records.is_empty() {
                println!("No tokens issued.");
                return Ok(());
            }

            println!("{:<28} {:<22} ISSUED BY", "TOKEN", "GENERATED");
            for r in records {
                println!(
                    "{:<28} {:<22} {}",
                    r.token,
                    r.generated_at.format("%Y-%m-%d %H:%M:%S"),
                    r.generated_by
                );
            }
        }
    }
    Ok(())
}

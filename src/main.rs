use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agendita_api::config::{AppConfig, SecretSource};
use agendita_api::types::ServiceKind;

#[derive(Parser)]
#[command(name = "agendita-api")]
#[command(about = "Run one Agendita service: the gateway or a resource service")]
#[command(version)]
struct Args {
    #[arg(long, value_enum, default_value = "gateway")]
    service: ServiceKind,

    #[arg(long, help = "Listen port (defaults to the service's configured port)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agendita_api=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("Starting {} in {:?} mode", args.service, config.environment);

    if config.security.secret_source == SecretSource::DevelopmentDefault {
        tracing::warn!("JWT_SECRET is not set; using the built-in development secret");
    }

    let app = agendita_api::app::build(args.service, &config).await?;

    let port = args.port.unwrap_or_else(|| config.services.port(args.service));
    let bind_addr = format!("{}:{}", config.services.host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("{} listening on http://{}", args.service, bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

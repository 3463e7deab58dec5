use clap::Args;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::types::ServiceKind;

const DATA_SERVICES: [ServiceKind; 4] = [
    ServiceKind::Users,
    ServiceKind::Notes,
    ServiceKind::Tasks,
    ServiceKind::Events,
];

#[derive(Args)]
pub struct MigrateArgs {
    #[arg(long, value_enum, help = "Only migrate this service's database")]
    pub service: Option<ServiceKind>,
}

pub async fn handle(args: MigrateArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let manager = DatabaseManager::from_config(&config.database)?;

    let targets: Vec<ServiceKind> = match args.service {
        Some(ServiceKind::Gateway) => anyhow::bail!("the gateway has no database"),
        Some(service) => vec![service],
        None => DATA_SERVICES.to_vec(),
    };

    let mut migrated = Vec::new();
    for service in targets {
        manager.migrate(service).await?;
        migrated.push(service.name());
    }
    manager.close_all().await;

    output_success(
        output_format,
        "Migrations applied",
        Some(json!({ "services": migrated.join(", ") })),
    )
}

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod ingest;
mod sources;

use ingest::IngestArgs;

#[derive(Debug, Parser)]
#[command(name = "affdb-cli")]
#[command(about = "Affiliate catalog ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pull every enabled source (or one) through the ingestion pipeline
    Ingest(IngestArgs),
    /// List the sources registered in the sources file
    Sources,
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = affdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Ingest(args) => ingest::run_ingest(&config, &args).await,
        Commands::Sources => sources::list_sources(&config),
        Commands::Migrate => {
            let pool_config = affdb_db::PoolConfig::from_app_config(&config);
            let pool = affdb_db::connect_pool(&config.database_url, pool_config).await?;
            let applied = affdb_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
    }
}

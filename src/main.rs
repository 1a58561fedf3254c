//! Modelwatch CLI - Main entry point.

use modelwatch::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match &cli.command {
        Commands::Serve {
            metrics_port,
            catalog,
            dev,
        } => {
            let mut config = cli.load_config(*dev)?;
            if let Some(port) = metrics_port {
                config.monitoring.metrics_port = *port;
            }
            if let Some(path) = catalog {
                config.registry.catalog_path = Some(path.clone());
            }

            modelwatch::run(config).await?;
        }

        Commands::CheckConfig => {
            let config = cli.load_config(false)?;
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Version => {
            println!("Modelwatch v{}", env!("CARGO_PKG_VERSION"));
            println!("Model serving with drift, latency and resource monitoring");
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "camlog")]
#[command(about = "Camera sighting logger with interval coalescing and batch upload", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve POST /log and rotate batches on a timer
    Run,
    /// Upload closed batches left on disk by failed uploads
    Flush {
        /// Close and upload the active batch as well (server must be stopped)
        #[arg(long)]
        include_active: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = camlog::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            camlog::cli::run::run(config_path).await?;
        }
        Some(Commands::Flush { include_active }) => {
            camlog::cli::flush::flush(config_path, include_active).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                camlog::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                camlog::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use stackwire_core::config::RegistryBackend;
use stackwire_core::Config;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "stackwire")]
#[command(about = "Deploy independently owned stacks that share configuration", long_about = None)]
struct Cli {
    /// Environment to operate on
    #[arg(short, long, global = true, default_value = "dev")]
    env: String,

    /// Config file (defaults to ~/.stackwire/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry backend override
    #[arg(long, global = true, value_enum)]
    registry: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Memory,
    Sqlite,
}

impl From<Backend> for RegistryBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Memory => RegistryBackend::Memory,
            Backend::Sqlite => RegistryBackend::Sqlite,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a stack and everything it depends on (all stacks if omitted)
    Deploy {
        /// Stack name (e.g., "app-shell", "system-health", "edge")
        stack: Option<String>,
    },

    /// Show the deployment order without deploying
    Plan {
        /// Stack name (optional)
        stack: Option<String>,
    },

    /// Compose the edge routing table from the current registry
    Routes,

    /// Inspect or edit the registry
    #[command(subcommand)]
    Registry(RegistryCommands),
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// Print the value of a key
    Get {
        /// Registry key (e.g., "/appshell/vpc/id")
        key: String,
    },

    /// Write a value
    Put {
        /// Registry key
        key: String,

        /// Value, or list items with --list
        #[arg(required = true, num_args = 1..)]
        values: Vec<String>,

        /// Store the values as a JSON list
        #[arg(short, long)]
        list: bool,
    },

    /// List entries under a prefix
    List {
        /// Key prefix
        #[arg(default_value = "/")]
        prefix: String,
    },

    /// Remove a key
    Rm {
        /// Registry key
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(backend) = cli.registry {
        config.registry.backend = backend.into();
    }

    stackwire_core::init_observability(&config.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::Deploy { stack } => {
            commands::deploy(config, &cli.env, stack.as_deref()).await?;
        }

        Commands::Plan { stack } => {
            commands::plan(&config, &cli.env, stack.as_deref())?;
        }

        Commands::Routes => {
            commands::routes(&config, &cli.env).await?;
        }

        Commands::Registry(registry_cmd) => match registry_cmd {
            RegistryCommands::Get { key } => {
                commands::registry::get(&config, &cli.env, &key).await?;
            }

            RegistryCommands::Put { key, values, list } => {
                commands::registry::put(&config, &cli.env, &key, &values, list).await?;
            }

            RegistryCommands::List { prefix } => {
                commands::registry::list(&config, &cli.env, &prefix).await?;
            }

            RegistryCommands::Rm { key } => {
                commands::registry::rm(&config, &cli.env, &key).await?;
            }
        },
    }

    Ok(())
}

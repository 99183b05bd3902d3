//! FBot CLI, the main entry point.
//!
//! Commands:
//! - `serve`    Start the HTTP gateway
//! - `chat`     Interactive or single-message chat against a thread
//! - `onboard`  Write the default config file
//! - `config`   Show, validate or locate the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "fbot", about = "FBot, a routed student assistant", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.fbot/config.toml
    #[arg(short, long, global = true, env = "FBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing thread
        #[arg(short, long)]
        thread: Option<String>,

        /// Owner of the thread's tasks
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Write the default configuration file
    Onboard,

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Load and validate the configuration
    Validate,
    /// Print the config file path
    Path,
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "fbot=debug,tower_http=debug"
    } else {
        "fbot=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Chat { message, thread, user } => {
            commands::chat::run(config_path, message, thread, user).await?
        }
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}

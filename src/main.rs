use anyhow::Result;
use cambio::core::Currency;
use cambio::core::log::init_logging;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for cambio::AppCommand {
    fn from(cmd: Commands) -> cambio::AppCommand {
        match cmd {
            Commands::Rates { json } => cambio::AppCommand::Rates { json },
            Commands::Convert { amount, from, to } => {
                cambio::AppCommand::Convert { amount, from, to }
            }
            Commands::Providers => cambio::AppCommand::Providers,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Compose and display the current exchange rates
    Rates {
        /// Print the rates snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert an amount between currencies
    Convert {
        /// Amount to convert
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        /// Source currency (VES, USD, EUR or COP)
        from: Currency,
        /// Target currencies; all others when omitted
        to: Vec<Currency>,
    },
    /// List configured rate providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => cambio::cli::setup::setup(),
        Some(cmd) => cambio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

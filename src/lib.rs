pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{Composer, Currency, SystemClock};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Rates {
        json: bool,
    },
    Convert {
        amount: f64,
        from: Currency,
        to: Vec<Currency>,
    },
    Providers,
}

fn build_composer(config: AppConfig) -> Composer {
    let clock = Arc::new(SystemClock);
    let providers = providers::build_providers(&config.providers, clock.clone());
    Composer::new(providers, config.composition, clock)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("cambio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Rates { json } => cli::rates::run(&build_composer(config), json).await,
        AppCommand::Convert { amount, from, to } => {
            cli::convert::run(&build_composer(config), amount, from, &to).await
        }
        AppCommand::Providers => {
            cli::providers::run(&config.providers);
            Ok(())
        }
    }
}

use crate::core::compose::CompositionPolicy;
use crate::core::rate::MAX_SIGNIFICANT_DIGITS;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FxResponseFormat {
    /// `{"rates": {"COP": 4200.0}}`
    Rates,
    /// `{"data": {"COP": {"value": 4200.0}}}`
    Data,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FxSourceConfig {
    pub name: String,
    pub url: String,
    pub format: FxResponseFormat,
    /// Query parameter carrying the API key, e.g. `apikey` or `app_id`.
    #[serde(default)]
    pub key_param: Option<String>,
    #[serde(default)]
    pub requires_key: bool,
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BcvProviderConfig {
    pub sources: Vec<SourceConfig>,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FrankfurterProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PublicFxProviderConfig {
    pub sources: Vec<FxSourceConfig>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Providers in merge order: later sections override earlier ones.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProvidersConfig {
    pub bcv: Option<BcvProviderConfig>,
    pub frankfurter: Option<FrankfurterProviderConfig>,
    pub public_fx: Option<PublicFxProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        let source = |name: &str, url: &str| SourceConfig {
            name: name.to_string(),
            url: url.to_string(),
        };
        let fx_source = |name: &str, url: &str, format, key_param: Option<&str>| FxSourceConfig {
            name: name.to_string(),
            url: url.to_string(),
            format,
            key_param: key_param.map(str::to_string),
            requires_key: key_param.is_some(),
        };

        ProvidersConfig {
            bcv: Some(BcvProviderConfig {
                sources: vec![
                    source("BCV Official", "https://www.bcv.org.ve/"),
                    source("DolarToday", "https://dolartoday.com/"),
                    source("Monitor Dolar", "https://monitordolarvzla.com/"),
                ],
                retries: default_retries(),
                retry_delay_ms: default_retry_delay_ms(),
            }),
            frankfurter: Some(FrankfurterProviderConfig {
                base_url: "https://api.frankfurter.app".to_string(),
            }),
            public_fx: Some(PublicFxProviderConfig {
                sources: vec![
                    fx_source(
                        "ExchangeRate.host",
                        "https://api.exchangerate.host/latest?base=USD&symbols=COP,EUR",
                        FxResponseFormat::Rates,
                        None,
                    ),
                    fx_source(
                        "CurrencyAPI",
                        "https://api.currencyapi.com/v3/latest?base_currency=USD&currencies=COP,EUR",
                        FxResponseFormat::Data,
                        Some("apikey"),
                    ),
                    fx_source(
                        "OpenExchangeRates",
                        "https://openexchangerates.org/api/latest.json?base=USD&symbols=COP,EUR",
                        FxResponseFormat::Rates,
                        Some("app_id"),
                    ),
                ],
                api_key: None,
                retries: default_retries(),
                retry_delay_ms: default_retry_delay_ms(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub composition: CompositionPolicy,
}

impl AppConfig {
    /// Loads the config from the default location, or built-in defaults when
    /// no file exists there yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "cambio", "cambio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let digits = self.composition.cross_rate_digits;
        if !(1..=MAX_SIGNIFICANT_DIGITS).contains(&digits) {
            bail!(
                "composition.cross_rate_digits must be between 1 and {MAX_SIGNIFICANT_DIGITS}, got {digits}"
            );
        }
        Ok(())
    }
}

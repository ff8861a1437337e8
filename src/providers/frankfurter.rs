use super::util::{fetch_text, http_client, parse_timestamp, sane_value};
use crate::core::{Clock, Currency, ProviderResult, Rate, RateGraph, RateProvider};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

const PROVIDER: &str = "Frankfurter";

/// ECB reference rates for EUR/USD.
pub struct FrankfurterProvider {
    base_url: String,
    clock: Arc<dyn Clock>,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str, clock: Arc<dyn Clock>) -> Self {
        FrankfurterProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            clock,
        }
    }

    async fn fetch(&self) -> Result<RateGraph> {
        let url = format!("{}/latest?from=EUR&to=USD", self.base_url);
        let client = http_client()?;
        let text = fetch_text(&client, &url, 0, 0).await?;

        let data: FrankfurterResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse Frankfurter response: {}", e))?;
        debug!(response = ?data, "Received Frankfurter response");

        let eur_usd = data
            .rates
            .get("USD")
            .copied()
            .and_then(|value| sane_value(value, f64::MAX))
            .ok_or_else(|| anyhow!("No valid rates found in Frankfurter response"))?;

        let at = parse_timestamp(data.date.as_deref(), self.clock.now());
        let rate = Rate::new(Currency::Eur, Currency::Usd, eur_usd, PROVIDER, at)
            .context("Invalid EUR-USD rate")?;
        let inverse = rate.inverse();
        Ok([rate, inverse].into_iter().collect())
    }
}

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    date: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(name = "FrankfurterFetch", skip(self))]
    async fn fetch_rates(&self) -> ProviderResult {
        ProviderResult::from_result(PROVIDER, self.fetch().await)
    }
}

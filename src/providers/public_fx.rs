use super::util::{average_rate, fetch_text, http_client, sane_value};
use crate::core::config::{FxResponseFormat, FxSourceConfig, PublicFxProviderConfig};
use crate::core::{Clock, Currency, ProviderResult, RateGraph, RateProvider};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const PROVIDER: &str = "PublicFX";

/// USD-based quotes from several public FX APIs, averaged per pair.
pub struct PublicFxProvider {
    config: PublicFxProviderConfig,
    clock: Arc<dyn Clock>,
}

/// USD -> COP and USD -> EUR quotes taken from one source.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct UsdQuotes {
    cop: Option<f64>,
    eur: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RatesStyleResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct DataValue {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct DataStyleResponse {
    #[serde(default)]
    data: HashMap<String, DataValue>,
}

fn parse_quotes(format: FxResponseFormat, text: &str) -> Result<UsdQuotes> {
    let mut values = match format {
        FxResponseFormat::Rates => serde_json::from_str::<RatesStyleResponse>(text)?.rates,
        FxResponseFormat::Data => serde_json::from_str::<DataStyleResponse>(text)?
            .data
            .into_iter()
            .map(|(code, entry)| (code, entry.value))
            .collect(),
    };
    let mut take = |code: &str| values.remove(code).and_then(|v| sane_value(v, f64::MAX));
    let quotes = UsdQuotes {
        cop: take("COP"),
        eur: take("EUR"),
    };
    if quotes == UsdQuotes::default() {
        bail!("no COP or EUR quote in response");
    }
    Ok(quotes)
}

impl PublicFxProvider {
    pub fn new(config: PublicFxProviderConfig, clock: Arc<dyn Clock>) -> Self {
        PublicFxProvider { config, clock }
    }

    fn source_url(&self, source: &FxSourceConfig) -> Result<Option<String>> {
        let api_key = self.config.api_key.as_deref();
        if source.requires_key && api_key.is_none() {
            return Ok(None);
        }
        let mut url = reqwest::Url::parse(&source.url)
            .with_context(|| format!("Invalid URL for {}: {}", source.name, source.url))?;
        if let (Some(param), Some(key)) = (source.key_param.as_deref(), api_key) {
            url.query_pairs_mut().append_pair(param, key);
        }
        Ok(Some(url.to_string()))
    }

    async fn fetch_source(&self, client: &reqwest::Client, source: &FxSourceConfig) -> Result<UsdQuotes> {
        let url = self
            .source_url(source)?
            .ok_or_else(|| anyhow!("API key required but not provided"))?;
        let text = fetch_text(client, &url, self.config.retries, self.config.retry_delay_ms).await?;
        parse_quotes(source.format, &text)
            .with_context(|| format!("Failed to parse {} response", source.name))
    }

    async fn fetch(&self) -> Result<RateGraph> {
        let client = http_client()?;
        let fetches = self.config.sources.iter().map(|source| {
            let client = &client;
            async move { (source.name.as_str(), self.fetch_source(client, source).await) }
        });

        let mut cop = Vec::new();
        let mut eur = Vec::new();
        let mut errors = Vec::new();
        for (name, result) in join_all(fetches).await {
            match result {
                Ok(quotes) => {
                    debug!(source = name, ?quotes, "Source returned quotes");
                    cop.extend(quotes.cop);
                    eur.extend(quotes.eur);
                }
                Err(e) => {
                    warn!(source = name, error = %format!("{e:#}"), "Source failed");
                    errors.push(format!("{name}: {e:#}"));
                }
            }
        }

        if cop.is_empty() && eur.is_empty() {
            bail!("All sources failed: {}", errors.join(", "));
        }

        let now = self.clock.now();
        let mut graph = RateGraph::new();
        for (quote, samples) in [(Currency::Cop, &cop), (Currency::Eur, &eur)] {
            if let Some(rate) = average_rate(Currency::Usd, quote, samples, now)? {
                graph.insert(rate.inverse());
                graph.insert(rate);
            }
        }
        Ok(graph)
    }
}

#[async_trait]
impl RateProvider for PublicFxProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(name = "PublicFxFetch", skip(self), fields(sources = self.config.sources.len()))]
    async fn fetch_rates(&self) -> ProviderResult {
        ProviderResult::from_result(PROVIDER, self.fetch().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(name: &str, url: String, format: FxResponseFormat, key_param: Option<&str>) -> FxSourceConfig {
        FxSourceConfig {
            name: name.to_string(),
            url,
            format,
            key_param: key_param.map(str::to_string),
            requires_key: key_param.is_some(),
        }
    }

    fn provider(sources: Vec<FxSourceConfig>, api_key: Option<&str>) -> PublicFxProvider {
        let config = PublicFxProviderConfig {
            sources,
            api_key: api_key.map(str::to_string),
            retries: 0,
            retry_delay_ms: 1,
        };
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap());
        PublicFxProvider::new(config, Arc::new(clock))
    }

    async fn mount(mock_server: &MockServer, route: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_averages_across_sources() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/a", 200, r#"{"rates":{"COP":4000.0,"EUR":0.9}}"#).await;
        mount(&mock_server, "/b", 200, r#"{"data":{"COP":{"value":4400.0}}}"#).await;

        let provider = provider(
            vec![
                source("A", format!("{}/a", mock_server.uri()), FxResponseFormat::Rates, None),
                source("B", format!("{}/b", mock_server.uri()), FxResponseFormat::Data, None),
            ],
            None,
        );
        let result = provider.fetch_rates().await;

        assert!(result.success);
        assert_eq!(result.rates.len(), 4);
        let usd_cop = result.rates.get(Currency::Usd, Currency::Cop).unwrap();
        assert_eq!(usd_cop.value(), 4200.0);
        assert_eq!(usd_cop.provider(), "Average of 2 sources");
        let usd_eur = result.rates.get(Currency::Usd, Currency::Eur).unwrap();
        assert_eq!(usd_eur.value(), 0.9);
        assert_eq!(usd_eur.provider(), "Average of 1 sources");
        let cop_usd = result.rates.get(Currency::Cop, Currency::Usd).unwrap();
        assert!((cop_usd.value() - 1.0 / 4200.0).abs() < 1e-15);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_good_sources() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/good", 200, r#"{"rates":{"COP":4100.0}}"#).await;
        mount(&mock_server, "/down", 503, "").await;
        mount(&mock_server, "/junk", 200, "not json").await;

        let provider = provider(
            vec![
                source("Good", format!("{}/good", mock_server.uri()), FxResponseFormat::Rates, None),
                source("Down", format!("{}/down", mock_server.uri()), FxResponseFormat::Rates, None),
                source("Junk", format!("{}/junk", mock_server.uri()), FxResponseFormat::Rates, None),
            ],
            None,
        );
        let result = provider.fetch_rates().await;

        assert!(result.success);
        assert_eq!(result.rates.len(), 2);
        assert_eq!(
            result.rates.get(Currency::Usd, Currency::Cop).unwrap().value(),
            4100.0
        );
    }

    #[tokio::test]
    async fn test_keyed_source_skipped_without_key() {
        let mock_server = MockServer::start().await;
        let provider = provider(
            vec![source(
                "CurrencyAPI",
                format!("{}/v3/latest", mock_server.uri()),
                FxResponseFormat::Data,
                Some("apikey"),
            )],
            None,
        );

        let result = provider.fetch_rates().await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("All sources failed: CurrencyAPI: API key required but not provided")
        );
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_key_appended_to_query() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest.json"))
            .and(query_param("base", "USD"))
            .and(query_param("app_id", "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"rates":{"COP":4000.0,"EUR":0.92}}"#),
            )
            .mount(&mock_server)
            .await;

        let provider = provider(
            vec![source(
                "OpenExchangeRates",
                format!("{}/api/latest.json?base=USD", mock_server.uri()),
                FxResponseFormat::Rates,
                Some("app_id"),
            )],
            Some("secret"),
        );
        let result = provider.fetch_rates().await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.rates.get(Currency::Usd, Currency::Eur).unwrap().value(),
            0.92
        );
    }

    #[tokio::test]
    async fn test_api_key_never_reported() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/api", 503, "").await;

        let provider = provider(
            vec![source(
                "OpenExchangeRates",
                format!("{}/api?base=USD", mock_server.uri()),
                FxResponseFormat::Rates,
                Some("app_id"),
            )],
            Some("SUPERSECRET"),
        );
        let result = provider.fetch_rates().await;

        assert!(!result.success);
        let error = result.error.clone().unwrap();
        assert!(error.contains("503 Service Unavailable"), "{error}");
        assert!(!error.contains("SUPERSECRET"), "{error}");
        assert!(!serde_json::to_string(&result).unwrap().contains("SUPERSECRET"));
    }

    #[test]
    fn test_parse_quotes_rejects_empty_and_invalid() {
        assert!(parse_quotes(FxResponseFormat::Rates, r#"{"rates":{}}"#).is_err());
        assert!(parse_quotes(FxResponseFormat::Rates, r#"{"rates":{"COP":-5.0}}"#).is_err());
        assert_eq!(
            parse_quotes(FxResponseFormat::Data, r#"{"data":{"EUR":{"value":0.91}}}"#).unwrap(),
            UsdQuotes {
                cop: None,
                eur: Some(0.91)
            }
        );
    }
}

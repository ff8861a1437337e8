use super::util::{average_rate, fetch_text, http_client, sane_value};
use crate::core::config::{BcvProviderConfig, SourceConfig};
use crate::core::{Clock, Currency, ProviderResult, RateGraph, RateProvider};
use anyhow::{Result, bail};
use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

const PROVIDER: &str = "BCV";
const MAX_VES_RATE: f64 = 1_000_000.0;

fn patterns(code: &str, word: &str) -> Vec<Regex> {
    [
        format!(r"(?i){code}\s*=\s*Bs\.?\s*([\d.,]+)"),
        format!(r"(?i){word}\s*=\s*Bs\.?\s*([\d.,]+)"),
        format!(r"(?i){code}\s*Bs\.?\s*([\d.,]+)"),
        format!(r"(?i){word}\s*Bs\.?\s*([\d.,]+)"),
        format!(r"(?i)1\s*{code}\s*=\s*([\d.,]+)\s*Bs"),
        format!(r"(?i)1\s*{word}\s*=\s*([\d.,]+)\s*Bs"),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
}

static USD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| patterns("USD", "Dólar"));
static EUR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| patterns("EUR", "Euro"));

/// Parses a Venezuelan-formatted number such as `36,21` or `1.234,56`.
///
/// With both separators present the last one is the decimal point; a lone
/// comma is a decimal comma.
fn parse_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim_end_matches(['.', ',']);
    let normalized = match (raw.rfind('.'), raw.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (None, Some(_)) => raw.replace(',', "."),
        _ => raw.to_string(),
    };
    normalized.parse().ok()
}

/// First pattern whose capture parses to a plausible rate wins.
fn extract_rate(html: &str, patterns: &[Regex]) -> Option<f64> {
    patterns.iter().find_map(|pattern| {
        let captures = pattern.captures(html)?;
        let value = parse_amount(captures.get(1)?.as_str())?;
        sane_value(value, MAX_VES_RATE)
    })
}

/// USD -> VES and EUR -> VES found in one page.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct VesQuotes {
    usd: Option<f64>,
    eur: Option<f64>,
}

fn parse_page(html: &str) -> VesQuotes {
    VesQuotes {
        usd: extract_rate(html, &USD_PATTERNS),
        eur: extract_rate(html, &EUR_PATTERNS),
    }
}

/// Scrapes the bolívar rate from several Venezuelan pages and averages them.
pub struct BcvProvider {
    config: BcvProviderConfig,
    clock: Arc<dyn Clock>,
}

impl BcvProvider {
    pub fn new(config: BcvProviderConfig, clock: Arc<dyn Clock>) -> Self {
        BcvProvider { config, clock }
    }

    async fn fetch_source(&self, client: &reqwest::Client, source: &SourceConfig) -> Result<VesQuotes> {
        let html = fetch_text(client, &source.url, self.config.retries, self.config.retry_delay_ms).await?;
        let quotes = parse_page(&html);
        if quotes == VesQuotes::default() {
            bail!("no rate found in page");
        }
        Ok(quotes)
    }

    async fn fetch(&self) -> Result<RateGraph> {
        let client = http_client()?;
        let fetches = self.config.sources.iter().map(|source| {
            let client = &client;
            async move { (source.name.as_str(), self.fetch_source(client, source).await) }
        });

        let mut usd = Vec::new();
        let mut eur = Vec::new();
        let mut errors = Vec::new();
        for (name, result) in join_all(fetches).await {
            match result {
                Ok(quotes) => {
                    debug!(source = name, ?quotes, "Source returned quotes");
                    usd.extend(quotes.usd);
                    eur.extend(quotes.eur);
                }
                Err(e) => {
                    warn!(source = name, error = %format!("{e:#}"), "Source failed");
                    errors.push(format!("{name}: {e:#}"));
                }
            }
        }

        if usd.is_empty() && eur.is_empty() {
            bail!("All sources failed: {}", errors.join(", "));
        }

        let now = self.clock.now();
        let mut graph = RateGraph::new();
        for (base, samples) in [(Currency::Usd, &usd), (Currency::Eur, &eur)] {
            if let Some(rate) = average_rate(base, Currency::Ves, samples, now)? {
                graph.insert(rate);
            }
        }
        Ok(graph)
    }
}

#[async_trait]
impl RateProvider for BcvProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(name = "BcvFetch", skip(self), fields(sources = self.config.sources.len()))]
    async fn fetch_rates(&self) -> ProviderResult {
        ProviderResult::from_result(PROVIDER, self.fetch().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(mock_server: &MockServer, routes: &[&str]) -> BcvProvider {
        let config = BcvProviderConfig {
            sources: routes
                .iter()
                .map(|route| SourceConfig {
                    name: route.trim_start_matches('/').to_string(),
                    url: format!("{}{}", mock_server.uri(), route),
                })
                .collect(),
            retries: 0,
            retry_delay_ms: 1,
        };
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap());
        BcvProvider::new(config, Arc::new(clock))
    }

    async fn mount(mock_server: &MockServer, route: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(mock_server)
            .await;
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("36,21"), Some(36.21));
        assert_eq!(parse_amount("36.21"), Some(36.21));
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("39,45."), Some(39.45));
        assert_eq!(parse_amount("."), None);
    }

    #[test]
    fn test_parse_page_patterns() {
        assert_eq!(
            parse_page("<p>USD = Bs. 36,21</p><p>EUR Bs 39,45</p>"),
            VesQuotes {
                usd: Some(36.21),
                eur: Some(39.45)
            }
        );
        assert_eq!(parse_page("Hoy 1 Dólar = 36.50 Bs").usd, Some(36.5));
        assert_eq!(parse_page("euro = bs. 40,10").eur, Some(40.1));
        assert_eq!(parse_page("<html>sin datos</html>"), VesQuotes::default());
    }

    #[test]
    fn test_implausible_values_fall_through() {
        // First pattern yields an out-of-range value, a later one is usable.
        let html = "USD = Bs. 5000000 ... 1 USD = 36,00 Bs";
        assert_eq!(parse_page(html).usd, Some(36.0));
        assert_eq!(parse_page("USD = Bs. 0,00").usd, None);
    }

    #[tokio::test]
    async fn test_averages_sources_and_skips_failures() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/bcv", 200, "<div>USD = Bs. 36,00</div><div>EUR = Bs. 39,00</div>").await;
        mount(&mock_server, "/monitor", 200, "1 USD = 38,00 Bs").await;
        mount(&mock_server, "/down", 503, "").await;

        let result = provider(&mock_server, &["/bcv", "/monitor", "/down"])
            .fetch_rates()
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.provider, "BCV");
        assert_eq!(result.rates.len(), 2);
        let usd_ves = result.rates.get(Currency::Usd, Currency::Ves).unwrap();
        assert_eq!(usd_ves.value(), 37.0);
        assert_eq!(usd_ves.provider(), "Average of 2 sources");
        let eur_ves = result.rates.get(Currency::Eur, Currency::Ves).unwrap();
        assert_eq!(eur_ves.value(), 39.0);
        assert_eq!(eur_ves.provider(), "Average of 1 sources");
        assert_eq!(
            eur_ves.at(),
            Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_all_sources_failed() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/empty", 200, "<html>mantenimiento</html>").await;
        mount(&mock_server, "/down", 500, "").await;

        let result = provider(&mock_server, &["/empty", "/down"]).fetch_rates().await;

        assert!(!result.success);
        assert!(result.rates.is_empty());
        let error = result.error.unwrap();
        assert!(error.starts_with("All sources failed: "));
        assert!(error.contains("empty: no rate found in page"));
        assert!(error.contains("500 Internal Server Error"));
    }
}

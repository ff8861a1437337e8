use crate::core::currency::Currency;
use crate::core::rate::Rate;
use anyhow::{Context, Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "cambio/0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(mut operation: F, retries: usize, delay_ms: u64) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(anyhow::Error::from) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// `url` without its query string, safe to log or report since queries may
/// carry API keys.
pub fn redact_url(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// GETs `url` and returns the body of a successful response, retrying on
/// transport errors and non-2xx statuses. Errors never include the query.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    retries: usize,
    delay_ms: u64,
) -> Result<String> {
    let shown = redact_url(url);
    debug!("Requesting {}", shown);
    let response = with_retry(
        || async {
            client
                .get(url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(reqwest::Error::without_url)
        },
        retries,
        delay_ms,
    )
    .await
    .with_context(|| format!("Request failed for {shown}"))?;

    response
        .text()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("Failed to read response body from {shown}"))
}

/// Parses a provider timestamp, either RFC 3339 or a bare `YYYY-MM-DD` date
/// (taken as midnight UTC). Falls back to `default` when absent or invalid.
pub fn parse_timestamp(value: Option<&str>, default: DateTime<Utc>) -> DateTime<Utc> {
    let Some(value) = value else {
        return default;
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return at.with_timezone(&Utc);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| {
            debug!("Unrecognised timestamp '{}', using current time", value);
            default
        })
}

/// Averages samples gathered from several sources into one labelled rate.
pub fn average_rate(
    base: Currency,
    quote: Currency,
    samples: &[f64],
    at: DateTime<Utc>,
) -> Result<Option<Rate>> {
    if samples.is_empty() {
        return Ok(None);
    }
    let average = samples.iter().sum::<f64>() / samples.len() as f64;
    let rate = Rate::new(
        base,
        quote,
        average,
        format!("Average of {} sources", samples.len()),
        at,
    )?;
    Ok(Some(rate))
}

/// Accepts only finite values inside `(0, max)` that have a finite inverse.
pub fn sane_value(value: f64, max: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0 && value < max && (1.0 / value).is_finite())
        .then_some(value)
}

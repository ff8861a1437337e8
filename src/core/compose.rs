//! Composition engine: fans out to every provider and reconciles the
//! partial results into one consistent [`RateGraph`].

use crate::core::clock::Clock;
use crate::core::currency::Currency;
use crate::core::error::ComposeError;
use crate::core::graph::RateGraph;
use crate::core::provider::{ProviderResult, RateProvider};
use crate::core::rate::{Rate, RateKey, round_to_significant_digits};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Provider label for seed rates injected into a sparse graph.
pub const FALLBACK_PROVIDER: &str = "Fallback";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FallbackRate {
    pub pair: RateKey,
    pub value: f64,
}

/// Tunables of a composition cycle.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CompositionPolicy {
    /// Below this many edges the fallback seeds are injected.
    pub min_rates: usize,
    /// Significant digits kept for derived cross rates.
    pub cross_rate_digits: u32,
    /// Preferred pivot currencies; the remaining currencies are tried after these.
    pub pivots: Vec<Currency>,
    /// Pairs derived through a pivot when no provider quotes them.
    pub required_pairs: Vec<RateKey>,
    pub fallback: Vec<FallbackRate>,
}

impl Default for CompositionPolicy {
    fn default() -> Self {
        let pair = RateKey::new;
        CompositionPolicy {
            min_rates: 4,
            cross_rate_digits: 6,
            pivots: vec![Currency::Usd, Currency::Eur],
            required_pairs: vec![
                pair(Currency::Cop, Currency::Ves),
                pair(Currency::Ves, Currency::Cop),
                pair(Currency::Eur, Currency::Ves),
                pair(Currency::Ves, Currency::Eur),
                pair(Currency::Eur, Currency::Cop),
                pair(Currency::Cop, Currency::Eur),
            ],
            fallback: vec![
                FallbackRate {
                    pair: pair(Currency::Usd, Currency::Ves),
                    value: 200.0,
                },
                FallbackRate {
                    pair: pair(Currency::Usd, Currency::Cop),
                    value: 4200.0,
                },
                FallbackRate {
                    pair: pair(Currency::Eur, Currency::Usd),
                    value: 1.08,
                },
            ],
        }
    }
}

impl CompositionPolicy {
    /// Configured pivots first, then every other currency in declaration order.
    pub fn pivot_order(&self) -> Vec<Currency> {
        let mut order = Vec::with_capacity(Currency::ALL.len());
        for currency in self.pivots.iter().chain(Currency::ALL.iter()) {
            if !order.contains(currency) {
                order.push(*currency);
            }
        }
        order
    }
}

/// Snapshot produced by one composition cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatesResponse {
    pub at: DateTime<Utc>,
    pub provider_notes: Vec<String>,
    pub rates: RateGraph,
}

pub struct Composer {
    providers: Vec<Arc<dyn RateProvider>>,
    policy: CompositionPolicy,
    clock: Arc<dyn Clock>,
}

impl Composer {
    /// Providers are merged in the given order; later providers override
    /// earlier ones for the same pair.
    pub fn new(
        providers: Vec<Arc<dyn RateProvider>>,
        policy: CompositionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            providers,
            policy,
            clock,
        }
    }

    pub fn providers(&self) -> &[Arc<dyn RateProvider>] {
        &self.providers
    }

    pub fn policy(&self) -> &CompositionPolicy {
        &self.policy
    }

    #[instrument(name = "ComposeRates", skip(self), fields(providers = self.providers.len()))]
    pub async fn compose_rates(&self) -> Result<RatesResponse, ComposeError> {
        let results = self.fetch_all().await;
        let now = self.clock.now();

        let mut notes = Vec::new();
        let mut graph = merge_results(results, &mut notes);
        add_inverse_rates(&mut graph);
        self.inject_fallback(&mut graph, now, &mut notes)?;
        self.derive_cross_rates(&mut graph, now, &mut notes);

        graph.validate()?;
        info!(rates = graph.len(), notes = notes.len(), "Composed rate graph");

        Ok(RatesResponse {
            at: now,
            provider_notes: notes,
            rates: graph,
        })
    }

    /// Runs every provider concurrently and waits for all of them.
    async fn fetch_all(&self) -> Vec<(String, ProviderResult)> {
        let fetches = self.providers.iter().map(|provider| async move {
            let name = provider.name().to_string();
            let result = match AssertUnwindSafe(provider.fetch_rates())
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    error!(provider = %name, "Rate provider panicked");
                    ProviderResult::failed(&name, "provider panicked")
                }
            };
            (name, result)
        });
        join_all(fetches).await
    }

    fn inject_fallback(
        &self,
        graph: &mut RateGraph,
        now: DateTime<Utc>,
        notes: &mut Vec<String>,
    ) -> Result<(), ComposeError> {
        let live = graph.len();
        if live >= self.policy.min_rates {
            return Ok(());
        }

        warn!(
            live,
            min = self.policy.min_rates,
            "Too few live rates, injecting fallback seeds"
        );
        let mut injected = 0;
        for seed in &self.policy.fallback {
            let rate = Rate::new(
                seed.pair.base,
                seed.pair.quote,
                seed.value,
                FALLBACK_PROVIDER,
                now,
            )?;
            let inverse = rate.inverse();
            injected += usize::from(graph.insert_if_absent(rate));
            injected += usize::from(graph.insert_if_absent(inverse));
        }
        notes.push(format!(
            "{FALLBACK_PROVIDER}: injected {injected} seed rates (only {live} live rates)"
        ));
        Ok(())
    }

    fn derive_cross_rates(
        &self,
        graph: &mut RateGraph,
        now: DateTime<Utc>,
        notes: &mut Vec<String>,
    ) {
        let digits = self.policy.cross_rate_digits;
        let pivots = self.policy.pivot_order();

        for key in &self.policy.required_pairs {
            if key.base == key.quote || graph.contains(key) {
                continue;
            }

            let derived = pivots
                .iter()
                .filter(|pivot| **pivot != key.base && **pivot != key.quote)
                .find_map(|pivot| {
                    let first = graph.get(key.base, *pivot)?;
                    let second = graph.get(*pivot, key.quote)?;
                    let rate = first.cross(second, digits, now);
                    if rate.is_none() {
                        warn!(pair = %key, %pivot, "Cross rate out of range, trying next pivot");
                    }
                    rate.map(|rate| (*pivot, rate))
                });

            let Some((pivot, rate)) = derived else {
                debug!(pair = %key, "No pivot available for cross rate");
                continue;
            };

            let inverse = Rate::new(
                rate.quote(),
                rate.base(),
                round_to_significant_digits(1.0 / rate.value(), digits),
                rate.provider(),
                now,
            )
            .unwrap_or_else(|_| rate.inverse());
            debug!(pair = %key, %pivot, value = rate.value(), "Derived cross rate");
            notes.push(format!(
                "{key}: Computed via {} × {}",
                RateKey::new(key.base, pivot),
                RateKey::new(pivot, key.quote)
            ));
            graph.insert(rate);
            graph.insert_if_absent(inverse);
        }
    }
}

/// Merges successful results in order and records one note per provider.
fn merge_results(results: Vec<(String, ProviderResult)>, notes: &mut Vec<String>) -> RateGraph {
    let mut graph = RateGraph::new();
    for (name, result) in results {
        if result.success {
            debug!(provider = %name, rates = result.rates.len(), "Merging provider rates");
            notes.push(format!("{name}: {} rates", result.rates.len()));
            graph.merge(result.rates);
        } else {
            let reason = result.error.as_deref().unwrap_or("unknown error");
            warn!(provider = %name, error = %reason, "Provider failed");
            notes.push(format!("{name}: Failed ({reason})"));
        }
    }
    graph
}

/// Adds the reverse of every edge that lacks one. Reads a snapshot so inverses
/// added here never feed back into the same pass.
fn add_inverse_rates(graph: &mut RateGraph) {
    let snapshot: Vec<Rate> = graph.values().cloned().collect();
    for rate in snapshot {
        graph.insert_if_absent(rate.inverse());
    }
}

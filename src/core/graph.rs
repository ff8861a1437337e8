//! The rates bundle: a directed graph of exchange-rate edges.

use crate::core::currency::Currency;
use crate::core::error::ComposeError;
use crate::core::rate::{Rate, RateKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Known edges for one composition cycle, keyed by `(base, quote)`.
///
/// A missing edge means the rate is unknown. Inserting an existing key
/// replaces the previous rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateGraph {
    edges: BTreeMap<RateKey, Rate>,
}

impl RateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, base: Currency, quote: Currency) -> Option<&Rate> {
        self.edges.get(&RateKey::new(base, quote))
    }

    pub fn get_key(&self, key: &RateKey) -> Option<&Rate> {
        self.edges.get(key)
    }

    pub fn contains(&self, key: &RateKey) -> bool {
        self.edges.contains_key(key)
    }

    /// Inserts `rate` under its own key, returning the rate it replaced.
    pub fn insert(&mut self, rate: Rate) -> Option<Rate> {
        self.edges.insert(rate.key(), rate)
    }

    /// Inserts `rate` only when its key is absent. Returns whether it was added.
    pub fn insert_if_absent(&mut self, rate: Rate) -> bool {
        if self.contains(&rate.key()) {
            return false;
        }
        self.insert(rate);
        true
    }

    /// Merges `other` into `self`; edges from `other` win on conflicts.
    pub fn merge(&mut self, other: RateGraph) {
        self.edges.extend(other.edges);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RateKey, &Rate)> {
        self.edges.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Rate> {
        self.edges.values()
    }

    /// Checks that every edge sits under its own key and holds a valid value.
    pub fn validate(&self) -> Result<(), ComposeError> {
        for (key, rate) in &self.edges {
            if *key != rate.key() {
                return Err(ComposeError::KeyMismatch {
                    key: *key,
                    actual: rate.key(),
                });
            }
            Rate::new(rate.base(), rate.quote(), rate.value(), rate.provider(), rate.at())?;
        }
        Ok(())
    }
}

impl FromIterator<Rate> for RateGraph {
    fn from_iter<T: IntoIterator<Item = Rate>>(iter: T) -> Self {
        let mut graph = RateGraph::new();
        for rate in iter {
            graph.insert(rate);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rate(base: Currency, quote: Currency, value: f64, provider: &str) -> Rate {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Rate::new(base, quote, value, provider, at).unwrap()
    }

    #[test]
    fn test_merge_is_last_write_wins() {
        let mut graph: RateGraph = [rate(Currency::Usd, Currency::Ves, 36.0, "A")]
            .into_iter()
            .collect();
        let later: RateGraph = [
            rate(Currency::Usd, Currency::Ves, 37.0, "B"),
            rate(Currency::Eur, Currency::Usd, 1.08, "B"),
        ]
        .into_iter()
        .collect();

        graph.merge(later);

        assert_eq!(graph.len(), 2);
        let usd_ves = graph.get(Currency::Usd, Currency::Ves).unwrap();
        assert_eq!(usd_ves.value(), 37.0);
        assert_eq!(usd_ves.provider(), "B");
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let mut graph = RateGraph::new();
        assert!(graph.insert_if_absent(rate(Currency::Usd, Currency::Cop, 4200.0, "Live")));
        assert!(!graph.insert_if_absent(rate(Currency::Usd, Currency::Cop, 4000.0, "Fallback")));
        assert_eq!(graph.get(Currency::Usd, Currency::Cop).unwrap().provider(), "Live");
    }

    #[test]
    fn test_json_is_keyed_by_pair() {
        let graph: RateGraph = [rate(Currency::Usd, Currency::Ves, 36.21, "BCV")]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["USD-VES"]["value"], 36.21);

        let parsed: RateGraph = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, graph);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_misfiled_rate() {
        let json = serde_json::json!({
            "EUR-USD": {
                "base": "USD",
                "quote": "VES",
                "value": 36.21,
                "provider": "BCV",
                "at": "2024-01-01T00:00:00Z"
            }
        });
        let graph: RateGraph = serde_json::from_value(json).unwrap();
        assert!(matches!(
            graph.validate(),
            Err(ComposeError::KeyMismatch { .. })
        ));
    }
}

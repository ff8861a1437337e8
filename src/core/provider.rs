//! Contract between the composition engine and external rate sources.

use crate::core::graph::RateGraph;
use async_trait::async_trait;
use serde::Serialize;

/// Outcome of one provider fetch. Failed results always carry an empty graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResult {
    pub provider: String,
    pub rates: RateGraph,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderResult {
    pub fn ok(provider: impl Into<String>, rates: RateGraph) -> Self {
        Self {
            provider: provider.into(),
            rates,
            success: true,
            error: None,
        }
    }

    pub fn failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            rates: RateGraph::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn from_result(provider: impl Into<String>, result: anyhow::Result<RateGraph>) -> Self {
        match result {
            Ok(rates) => Self::ok(provider, rates),
            // `{:#}` keeps the context chain on one line
            Err(e) => Self::failed(provider, format!("{e:#}")),
        }
    }
}

/// An external source of exchange rates.
///
/// Implementations must not panic or return errors past this boundary: any
/// network, parse or missing-data problem is reported through
/// [`ProviderResult::failed`].
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Label used in diagnostic notes.
    fn name(&self) -> &str;

    async fn fetch_rates(&self) -> ProviderResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn test_from_result_failure_keeps_context() {
        let err: anyhow::Result<RateGraph> = Err(anyhow!("connection refused")).context("Request failed");
        let result = ProviderResult::from_result("BCV", err);

        assert!(!result.success);
        assert!(result.rates.is_empty());
        assert_eq!(
            result.error.as_deref(),
            Some("Request failed: connection refused")
        );
    }

    #[test]
    fn test_from_result_success() {
        let result = ProviderResult::from_result("Frankfurter", Ok(RateGraph::new()));
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.provider, "Frankfurter");
    }
}

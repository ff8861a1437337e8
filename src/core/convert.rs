//! Conversion resolver over a finished [`RateGraph`].
//!
//! Lookups are tried in a fixed order and the first path that resolves wins:
//! identity, direct edge, USD pivot, EUR pivot, the explicit VES/COP routes
//! through USD and finally the `VES -> USD -> EUR -> target` route.

use crate::core::currency::Currency;
use crate::core::graph::RateGraph;
use crate::core::rate::{Rate, round_to_significant_digits};
use serde::Serialize;
use std::fmt::Display;

/// Significant digits kept in conversion results.
pub const CONVERSION_DIGITS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteKind {
    Identity,
    Direct,
    Pivot(Currency),
    Explicit,
    ThreeHop,
}

impl Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteKind::Identity => write!(f, "identity"),
            RouteKind::Direct => write!(f, "direct"),
            RouteKind::Pivot(pivot) => write!(f, "via {pivot}"),
            RouteKind::Explicit => write!(f, "explicit route"),
            RouteKind::ThreeHop => write!(f, "three-hop route"),
        }
    }
}

/// The chain of edges a conversion multiplies through.
#[derive(Debug, Clone, PartialEq)]
pub struct Route<'a> {
    pub kind: RouteKind,
    pub legs: Vec<&'a Rate>,
}

impl Route<'_> {
    /// Product of all leg values; `1.0` for the identity route.
    pub fn effective_rate(&self) -> f64 {
        self.legs.iter().map(|leg| leg.value()).product()
    }

    /// Currencies visited, e.g. `VES -> USD -> COP`.
    pub fn path(&self) -> String {
        let mut hops: Vec<String> = self.legs.iter().map(|leg| leg.base().to_string()).collect();
        if let Some(last) = self.legs.last() {
            hops.push(last.quote().to_string());
        }
        hops.join(" -> ")
    }

    fn apply(&self, amount: f64) -> f64 {
        let converted = self.legs.iter().fold(amount, |acc, leg| acc * leg.value());
        round_to_significant_digits(converted, CONVERSION_DIGITS)
    }
}

/// Routes tried after the generic pivots, as full currency paths.
const EXPLICIT_ROUTES: [&[Currency]; 2] = [
    &[Currency::Ves, Currency::Usd, Currency::Cop],
    &[Currency::Cop, Currency::Usd, Currency::Ves],
];

const THREE_HOP_SOURCE: Currency = Currency::Ves;
const THREE_HOP_TARGETS: [Currency; 2] = [Currency::Eur, Currency::Cop];
const THREE_HOP_VIA: [Currency; 2] = [Currency::Usd, Currency::Eur];

/// Finds the path used to convert `from` into `to`, if any.
pub fn resolve(from: Currency, to: Currency, graph: &RateGraph) -> Option<Route<'_>> {
    if from == to {
        return Some(Route {
            kind: RouteKind::Identity,
            legs: Vec::new(),
        });
    }

    if let Some(rate) = graph.get(from, to) {
        return Some(Route {
            kind: RouteKind::Direct,
            legs: vec![rate],
        });
    }

    for pivot in [Currency::Usd, Currency::Eur] {
        if let Some(legs) = chain(graph, &[from, pivot, to]) {
            return Some(Route {
                kind: RouteKind::Pivot(pivot),
                legs,
            });
        }
    }

    for path in EXPLICIT_ROUTES {
        if path.first() == Some(&from) && path.last() == Some(&to) {
            if let Some(legs) = chain(graph, path) {
                return Some(Route {
                    kind: RouteKind::Explicit,
                    legs,
                });
            }
        }
    }

    if from == THREE_HOP_SOURCE && THREE_HOP_TARGETS.contains(&to) {
        let mut path = vec![from];
        path.extend(THREE_HOP_VIA);
        path.push(to);
        path.dedup();
        if let Some(legs) = chain(graph, &path) {
            return Some(Route {
                kind: RouteKind::ThreeHop,
                legs,
            });
        }
    }

    None
}

/// Converts `amount` of `from` into `to`.
///
/// Returns `None` when no path resolves, which callers must present as
/// "rate unavailable" rather than zero.
pub fn convert(amount: f64, from: Currency, to: Currency, graph: &RateGraph) -> Option<f64> {
    let route = resolve(from, to, graph)?;
    if route.kind == RouteKind::Identity {
        return Some(amount);
    }
    Some(route.apply(amount))
}

/// Looks up every consecutive edge along `path`. Pivots equal to an endpoint
/// make the path degenerate and never resolve.
fn chain<'a>(graph: &'a RateGraph, path: &[Currency]) -> Option<Vec<&'a Rate>> {
    if path.windows(2).any(|pair| pair[0] == pair[1]) {
        return None;
    }
    path.windows(2)
        .map(|pair| graph.get(pair[0], pair[1]))
        .collect()
}

//! Rate graph, composition engine and conversion resolver

pub mod clock;
pub mod compose;
pub mod config;
pub mod convert;
pub mod currency;
pub mod error;
pub mod format;
pub mod graph;
pub mod log;
pub mod provider;
pub mod rate;

// Re-export main types for cleaner imports
pub use clock::{Clock, FixedClock, SystemClock};
pub use compose::{Composer, CompositionPolicy, RatesResponse};
pub use convert::{Route, RouteKind, convert, resolve};
pub use currency::Currency;
pub use error::{ComposeError, RateError};
pub use graph::RateGraph;
pub use provider::{ProviderResult, RateProvider};
pub use rate::{Rate, RateKey, create_rate_key, round_to_significant_digits};

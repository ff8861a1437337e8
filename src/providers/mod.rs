pub mod bcv;
pub mod frankfurter;
pub mod public_fx;
pub mod util;

use crate::core::config::ProvidersConfig;
use crate::core::{Clock, RateProvider};
use std::sync::Arc;

pub use bcv::BcvProvider;
pub use frankfurter::FrankfurterProvider;
pub use public_fx::PublicFxProvider;

/// Builds the enabled providers in merge order: BCV, Frankfurter, Public FX.
pub fn build_providers(config: &ProvidersConfig, clock: Arc<dyn Clock>) -> Vec<Arc<dyn RateProvider>> {
    let mut providers: Vec<Arc<dyn RateProvider>> = Vec::new();
    if let Some(bcv) = &config.bcv {
        providers.push(Arc::new(BcvProvider::new(bcv.clone(), Arc::clone(&clock))));
    }
    if let Some(frankfurter) = &config.frankfurter {
        providers.push(Arc::new(FrankfurterProvider::new(
            &frankfurter.base_url,
            Arc::clone(&clock),
        )));
    }
    if let Some(public_fx) = &config.public_fx {
        providers.push(Arc::new(PublicFxProvider::new(public_fx.clone(), clock)));
    }
    providers
}

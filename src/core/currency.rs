//! Currency symbols supported by the rate graph

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Ves,
    Usd,
    Eur,
    Cop,
}

impl Currency {
    /// Every supported currency, in declaration order.
    pub const ALL: [Currency; 4] = [Currency::Ves, Currency::Usd, Currency::Eur, Currency::Cop];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ves => "VES",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Cop => "COP",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Currency::Ves => "Bolívar Soberano",
            Currency::Usd => "US Dollar",
            Currency::Eur => "Euro",
            Currency::Cop => "Colombian Peso",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Ves => "Bs",
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Cop => "$",
        }
    }

    /// Number of fraction digits shown for amounts in this currency.
    pub fn precision(&self) -> usize {
        match self {
            Currency::Ves | Currency::Usd | Currency::Eur | Currency::Cop => 2,
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VES" => Ok(Currency::Ves),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "COP" => Ok(Currency::Cop),
            _ => Err(anyhow!("Unsupported currency: {}", s)),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading venues the optimizer knows how to allocate across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Binance,
    Coinbase,
    Kraken,
    Ftx,
    Deribit,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Binance,
        Platform::Coinbase,
        Platform::Kraken,
        Platform::Ftx,
        Platform::Deribit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Binance => "binance",
            Platform::Coinbase => "coinbase",
            Platform::Kraken => "kraken",
            Platform::Ftx => "ftx",
            Platform::Deribit => "deribit",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown platform '{s}'. Must be one of: binance, coinbase, kraken, ftx, deribit"
                )
            })
    }
}

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub private_key: String,
    pub wallet_address: String,
    pub is_mainnet: bool,
}

impl ExchangeConfig {
    pub fn network(&self) -> &'static str {
        if self.is_mainnet {
            "mainnet"
        } else {
            "testnet"
        }
    }
}

/// Load exchange credentials from the environment. A `.env` file is read if
/// present; missing files are fine since the variables may be set directly.
pub fn load_exchange_config() -> Result<ExchangeConfig> {
    dotenvy::dotenv().ok();

    let private_key = env::var("HYPERGRID_PRIVATE_KEY")
        .map_err(|_| EngineError::Config("HYPERGRID_PRIVATE_KEY must be set".to_string()))?;
    let wallet_address = env::var("HYPERGRID_WALLET_ADDRESS")
        .map_err(|_| EngineError::Config("HYPERGRID_WALLET_ADDRESS must be set".to_string()))?;

    let network = env::var("HYPERGRID_NETWORK").unwrap_or_else(|_| "mainnet".to_string());
    let is_mainnet = match network.as_str() {
        "mainnet" => true,
        "testnet" => false,
        other => {
            return Err(EngineError::Config(format!(
                "HYPERGRID_NETWORK must be 'mainnet' or 'testnet', got '{}'",
                other
            )))
        }
    };

    Ok(ExchangeConfig {
        private_key,
        wallet_address,
        is_mainnet,
    })
}

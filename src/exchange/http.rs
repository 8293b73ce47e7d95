use crate::constants::HTTP_TIMEOUT;
use crate::error::{EngineError, Result};
use reqwest::Client;

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

/// Long-lived HTTP handle to the exchange. One timeout per call; failures
/// are not retried here, the next tick is the retry.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(is_mainnet: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        let base_url = if is_mainnet {
            MAINNET_API_URL
        } else {
            TESTNET_API_URL
        };
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn is_mainnet(&self) -> bool {
        self.base_url == MAINNET_API_URL
    }

    pub async fn post(&self, path: &'static str, body: String) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        if status < 400 {
            return Ok(text);
        }
        Err(EngineError::Transport(format!(
            "{} returned status {}: {}",
            path, status, text
        )))
    }
}

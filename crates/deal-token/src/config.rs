//! Core configuration.
//!
//! One [`CoreConfig`] value is threaded through every operation via the
//! [`Connection`](crate::Connection). It selects the network, the submission
//! [`Mode`], retry and confirmation bounds, marketplace parameters and the
//! redemption ticket key.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DealError, Result};
use crate::keys::Address;
use crate::network::Network;

/// Default explorer for transaction links.
pub const DEFAULT_EXPLORER_BASE: &str = "https://explorer.solana.com";

/// Default lamports charged to list a token.
pub const DEFAULT_LISTING_FEE_LAMPORTS: u64 = 1000;

/// Whether transactions really go to a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every submission needs a capable wallet and a live ledger.
    #[default]
    Production,
    /// A wallet with no signing method gets a placeholder signature instead
    /// of an error, so front ends can exercise their success path.
    Simulated,
}

/// Configuration for the deal token core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoreConfig {
    /// Ledger network.
    pub network: Network,
    /// Submission mode.
    pub mode: Mode,
    /// Override for the network's RPC endpoint.
    pub rpc_url: Option<String>,
    /// Extra send attempts after a transient failure.
    pub max_retries: u32,
    /// Bound on waiting for a confirmation.
    pub confirm_timeout_secs: u64,
    /// Delay between status polls.
    pub poll_interval_ms: u64,
    /// Explorer used for transaction links.
    pub explorer_base: String,
    /// Recipient of listing fees.
    pub marketplace_address: Option<Address>,
    /// Fee paid to list a token.
    pub listing_fee_lamports: u64,
    /// Redemption ticket lifetime.
    pub ticket_ttl_secs: i64,
    /// Hex-encoded 32-byte key for ticket MACs.
    pub ticket_key: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            network: Network::Devnet,
            mode: Mode::Production,
            rpc_url: None,
            max_retries: 3,
            confirm_timeout_secs: 60,
            poll_interval_ms: 500,
            explorer_base: DEFAULT_EXPLORER_BASE.to_string(),
            marketplace_address: None,
            listing_fee_lamports: DEFAULT_LISTING_FEE_LAMPORTS,
            ticket_ttl_secs: 86_400,
            ticket_key: None,
        }
    }
}

impl CoreConfig {
    /// Defaults for `network`.
    #[must_use]
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DealError::invalid_input(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| DealError::invalid_input(format!("invalid config JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// The RPC endpoint to use: the override if set, else the network's.
    #[must_use]
    pub fn rpc_endpoint(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or(self.network.rpc_url())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.confirm_timeout_secs == 0 {
            return Err(DealError::invalid_input(
                "confirm_timeout_secs must be greater than 0",
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(DealError::invalid_input(
                "poll_interval_ms must be greater than 0",
            ));
        }

        if self.poll_interval_ms >= self.confirm_timeout_secs.saturating_mul(1000) {
            return Err(DealError::invalid_input(
                "poll_interval_ms must be shorter than confirm_timeout_secs",
            ));
        }

        if let Some(url) = &self.rpc_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DealError::invalid_input(
                    "rpc_url must start with http:// or https://",
                ));
            }
        }

        if self.explorer_base.is_empty() {
            return Err(DealError::invalid_input("explorer_base cannot be empty"));
        }

        if self.ticket_ttl_secs <= 0 {
            return Err(DealError::invalid_input(
                "ticket_ttl_secs must be greater than 0",
            ));
        }

        if let Some(key) = &self.ticket_key {
            let bytes = hex::decode(key)
                .map_err(|e| DealError::invalid_input(format!("ticket_key is not hex: {e}")))?;
            if bytes.len() != 32 {
                return Err(DealError::invalid_input(format!(
                    "ticket_key must be 32 bytes, got {}",
                    bytes.len()
                )));
            }
        }

        Ok(())
    }
}

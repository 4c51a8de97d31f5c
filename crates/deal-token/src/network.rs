//! Network selection and the connection handle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CoreConfig, Mode};
use crate::error::{DealError, Result};
use crate::keys::Signature;
use crate::ledger::{Ledger, RpcLedger};

/// Ledger network to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Development network.
    #[default]
    Devnet,
    /// Test network.
    Testnet,
    /// Production network.
    #[serde(alias = "mainnet-beta")]
    Mainnet,
}

impl Network {
    /// The fixed RPC endpoint of this network.
    #[must_use]
    pub const fn rpc_url(&self) -> &'static str {
        match self {
            Self::Devnet => "https://api.devnet.solana.com",
            Self::Testnet => "https://api.testnet.solana.com",
            Self::Mainnet => "https://api.mainnet-beta.solana.com",
        }
    }

    /// Cluster name used in explorer links.
    #[must_use]
    pub const fn cluster(&self) -> &'static str {
        match self {
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
            Self::Mainnet => "mainnet-beta",
        }
    }

    /// `<base>/tx/<signature>?cluster=<network>`
    #[must_use]
    pub fn explorer_url(&self, base: &str, signature: &Signature) -> String {
        format!(
            "{}/tx/{signature}?cluster={}",
            base.trim_end_matches('/'),
            self.cluster()
        )
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
            Self::Mainnet => "mainnet",
        })
    }
}

impl FromStr for Network {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" | "dev" => Ok(Self::Devnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "mainnet" | "mainnet-beta" | "main" => Ok(Self::Mainnet),
            other => Err(DealError::invalid_input(format!(
                "unknown network '{other}' (expected devnet, testnet or mainnet)"
            ))),
        }
    }
}

/// Handle used for every ledger read and write.
///
/// Holds the configuration and a ledger client; nothing else survives
/// between calls.
#[derive(Debug, Clone)]
pub struct Connection<L> {
    config: CoreConfig,
    ledger: L,
}

/// Connect to `network` over RPC with default settings.
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built.
pub fn connect(network: Network) -> Result<Connection<RpcLedger>> {
    Connection::from_config(CoreConfig::for_network(network))
}

impl Connection<RpcLedger> {
    /// Connect over RPC as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let ledger = RpcLedger::new(config.rpc_endpoint())?;
        debug!(network = %config.network, url = %config.rpc_endpoint(), "connection ready");
        Ok(Self { config, ledger })
    }
}

impl<L: Ledger> Connection<L> {
    /// Wrap an existing ledger client.
    #[must_use]
    pub const fn with_ledger(config: CoreConfig, ledger: L) -> Self {
        Self { config, ledger }
    }

    /// The selected network.
    #[must_use]
    pub const fn network(&self) -> Network {
        self.config.network
    }

    /// Submission mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.config.mode
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The ledger client.
    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Explorer link for `signature` on this connection's network.
    #[must_use]
    pub fn explorer_url(&self, signature: &Signature) -> String {
        self.config
            .network
            .explorer_url(&self.config.explorer_base, signature)
    }
}

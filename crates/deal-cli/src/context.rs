//! Resolved configuration for one invocation.
//!
//! Values come from, in increasing precedence: built-in defaults, the
//! config file, environment variables and flags.

use std::path::{Path, PathBuf};

use deal_token::{Connection, CoreConfig, Keypair, KeypairWallet, Mode, RpcLedger};
use tracing::debug;

use crate::cli::Cli;
use crate::error::CliError;

/// Config file looked up when `--config` is not given.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dealctl").join("config.json"))
}

/// Keypair used when `--keypair` is not given, shared with the Solana CLI.
#[must_use]
pub fn default_keypair_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("solana").join("id.json"))
}

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective core configuration.
    pub config: CoreConfig,
    keypair_path: Option<PathBuf>,
}

impl Context {
    /// Resolve the configuration from parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit config file cannot be loaded or the
    /// result fails validation.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = match &cli.config {
            Some(path) => load_config(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => load_config(&path)?,
                None => CoreConfig::default(),
            },
        };

        if let Some(network) = cli.network {
            config.network = network;
        }
        if let Some(url) = &cli.rpc_url {
            config.rpc_url = Some(url.clone());
        }
        if cli.simulated {
            config.mode = Mode::Simulated;
        }
        config
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;

        debug!(network = %config.network, mode = ?config.mode, rpc = config.rpc_endpoint(), "configuration resolved");
        Ok(Self {
            config,
            keypair_path: cli.keypair.clone().or_else(default_keypair_path),
        })
    }

    /// Wrap an already resolved configuration, using the default keypair.
    #[must_use]
    pub fn for_config(config: CoreConfig) -> Self {
        Self {
            config,
            keypair_path: default_keypair_path(),
        }
    }

    /// Open an RPC connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connection(&self) -> Result<Connection<RpcLedger>, CliError> {
        Connection::from_config(self.config.clone()).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Path of the signing keypair.
    ///
    /// # Errors
    ///
    /// Returns an error if no path was given and no home directory exists.
    pub fn keypair_path(&self) -> Result<&Path, CliError> {
        self.keypair_path
            .as_deref()
            .ok_or_else(|| CliError::Keypair("no keypair given and no home directory".into()))
    }

    /// Load the signing wallet.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypair file is missing or malformed.
    pub fn wallet(&self) -> Result<KeypairWallet, CliError> {
        let path = self.keypair_path()?;
        let keypair = Keypair::from_file(path)
            .map_err(|e| CliError::Keypair(format!("{}: {e}", path.display())))?;
        Ok(KeypairWallet::new(keypair))
    }
}

fn load_config(path: &Path) -> Result<CoreConfig, CliError> {
    CoreConfig::from_file(path).map_err(|e| CliError::Config(e.to_string()))
}

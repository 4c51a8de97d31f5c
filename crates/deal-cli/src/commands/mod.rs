//! CLI command implementations.
//!
//! - [`token`] - keypairs, balances, minting and token inspection
//! - [`market`] - transfers, listings, purchases and redemption
//! - [`ticket`] - offline redemption tickets

pub mod market;
pub mod ticket;
pub mod token;

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::CliError;

pub use market::MarketCommand;
pub use ticket::TicketCommand;
pub use token::TokenCommand;

/// Read and parse a JSON input file.
fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, CliError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::InvalidArgument(format!("{what} file {}: {e}", path.display())))
}

/// Parse an address argument.
fn parse_address(value: &str, what: &str) -> Result<deal_token::Address, CliError> {
    value
        .parse()
        .map_err(|e| CliError::InvalidArgument(format!("{what}: {e}")))
}

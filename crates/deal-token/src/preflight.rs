//! Balance preflight.
//!
//! Reads the spendable balance once and compares it with the reserve an
//! operation needs. Runs before any transaction is built; a failure here
//! means nothing was signed or sent.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::amount::Amount;
use crate::error::{DealError, Result};
use crate::keys::Address;
use crate::ledger::Ledger;
use crate::network::Connection;
use crate::outcome::OperationResult;
use crate::programs::{rent_exempt_minimum, token};

/// Reserve for minting: the identity account, the holder account and both
/// transaction fees, with headroom for descriptive attributes.
pub const MINT_RESERVE_LAMPORTS: u64 = 100_000_000;

/// Reserve for a single-signature transaction fee.
pub const FEE_RESERVE_LAMPORTS: u64 = 5000;

/// An operation gated by a balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "operation")]
pub enum Operation {
    /// Mint a new deal token.
    Mint,
    /// Move a token; may create the recipient's holder account.
    Transfer,
    /// List a token for sale.
    List {
        /// Listing fee paid to the marketplace.
        fee: Amount,
    },
    /// Buy a listed token.
    Purchase {
        /// Ask price paid to the seller.
        price: Amount,
    },
    /// Burn a token at redemption.
    Redeem,
}

impl Operation {
    /// Minimum spendable balance required.
    #[must_use]
    pub const fn required(&self) -> Amount {
        match self {
            Self::Mint => Amount::from_lamports(MINT_RESERVE_LAMPORTS),
            Self::Transfer => Amount::from_lamports(
                FEE_RESERVE_LAMPORTS + rent_exempt_minimum(token::ACCOUNT_LEN),
            ),
            Self::List { fee } => {
                Amount::from_lamports(FEE_RESERVE_LAMPORTS).saturating_add(*fee)
            }
            Self::Purchase { price } => {
                Amount::from_lamports(FEE_RESERVE_LAMPORTS).saturating_add(*price)
            }
            Self::Redeem => Amount::from_lamports(FEE_RESERVE_LAMPORTS),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mint => "mint",
            Self::Transfer => "transfer",
            Self::List { .. } => "list",
            Self::Purchase { .. } => "purchase",
            Self::Redeem => "redeem",
        })
    }
}

/// Check that `address` holds at least `required`.
pub async fn check<L: Ledger>(
    connection: &Connection<L>,
    address: &Address,
    required: Amount,
) -> OperationResult<()> {
    ensure_balance(connection, address, required, "operation")
        .await
        .map(|_| ())
        .into()
}

/// Check `address` against the reserve of `operation`.
pub async fn check_operation<L: Ledger>(
    connection: &Connection<L>,
    address: &Address,
    operation: Operation,
) -> OperationResult<()> {
    ensure(connection, address, operation).await.map(|_| ()).into()
}

/// Current balance of `address`, for display.
pub async fn balance<L: Ledger>(
    connection: &Connection<L>,
    address: &Address,
) -> OperationResult<Amount> {
    connection.ledger().get_balance(address).await.into()
}

/// Render a balance with four decimals, e.g. `1.2500 SOL`.
#[must_use]
pub fn format_sol(amount: Amount) -> String {
    amount.to_string()
}

pub(crate) async fn ensure<L: Ledger>(
    connection: &Connection<L>,
    address: &Address,
    operation: Operation,
) -> Result<Amount> {
    ensure_balance(connection, address, operation.required(), &operation.to_string()).await
}

async fn ensure_balance<L: Ledger>(
    connection: &Connection<L>,
    address: &Address,
    required: Amount,
    operation: &str,
) -> Result<Amount> {
    let have = connection.ledger().get_balance(address).await?;
    if have < required {
        warn!(
            address = %address,
            balance = %have,
            required = %required,
            operation,
            "insufficient balance"
        );
        return Err(DealError::insufficient_balance(have, required, operation));
    }
    debug!(address = %address, balance = %have, required = %required, operation, "balance ok");
    Ok(have)
}

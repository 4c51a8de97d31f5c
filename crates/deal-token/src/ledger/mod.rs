//! The ledger boundary.
//!
//! Everything the orchestrators need from the network goes through the
//! [`Ledger`] trait: balance and account reads, the latest blockhash, raw
//! submission and signature-status polling. [`RpcLedger`] speaks JSON-RPC to
//! a real node; [`SimulatedLedger`] executes the same transactions in memory.

mod rpc;
mod simulated;

pub use rpc::RpcLedger;
pub use simulated::{LAMPORTS_PER_SIGNATURE, SimulatedLedger};

use crate::amount::Amount;
use crate::error::Result;
use crate::keys::{Address, Blockhash, Signature};
use serde::{Deserialize, Serialize};

/// Raw account as returned by an account lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Balance held by the account.
    pub lamports: u64,
    /// Program that owns the account.
    pub owner: Address,
    /// Account data.
    pub data: Vec<u8>,
    /// Whether the account holds a program.
    pub executable: bool,
}

/// How far a transaction has progressed toward finality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    /// Included by a leader, not yet voted on.
    Processed,
    /// Voted on by a supermajority.
    Confirmed,
    /// Rooted.
    Finalized,
}

/// Status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatus {
    /// Slot the transaction landed in.
    pub slot: u64,
    /// Confirmation level reached, if reported.
    pub confirmation_status: Option<ConfirmationStatus>,
    /// Execution error, if the transaction failed on-ledger.
    pub err: Option<String>,
}

impl SignatureStatus {
    /// The transaction landed at `confirmed` or better.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.confirmation_status
            .is_some_and(|s| s >= ConfirmationStatus::Confirmed)
    }
}

/// Read/write access to a ledger.
#[allow(async_fn_in_trait)]
pub trait Ledger: Send + Sync {
    /// Spendable balance of `address` (zero for unknown accounts).
    fn get_balance(
        &self,
        address: &Address,
    ) -> impl std::future::Future<Output = Result<Amount>> + Send;

    /// A recent blockhash to bind new transactions to.
    fn get_latest_blockhash(&self) -> impl std::future::Future<Output = Result<Blockhash>> + Send;

    /// The account at `address`, or `None` if it does not exist.
    fn get_account_info(
        &self,
        address: &Address,
    ) -> impl std::future::Future<Output = Result<Option<AccountInfo>>> + Send;

    /// Balance an account of `data_len` bytes needs to be rent-exempt.
    fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Submit a serialized, fully signed transaction.
    fn send_raw_transaction(
        &self,
        wire: &[u8],
    ) -> impl std::future::Future<Output = Result<Signature>> + Send;

    /// Current status of `signature`, or `None` if the ledger has not seen it.
    fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> impl std::future::Future<Output = Result<Option<SignatureStatus>>> + Send;
}

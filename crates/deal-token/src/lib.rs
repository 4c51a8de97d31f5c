//! # deal-token
//!
//! Single-edition deal tokens on Solana (SPL Token).
//!
//! This crate provides:
//! - Wallet capability probing and signing strategies
//! - Balance preflight before anything is built or signed
//! - Minting with supply permanently fixed at one unit
//! - Transfer, secondary-market listing and sale, on-ledger redemption
//! - Offline, tamper-evident redemption tickets
//! - A JSON-RPC ledger client and an in-memory simulated ledger
//!
//! Every public operation returns an [`OperationResult`]; failures carry one
//! [`ErrorKind`] from a closed set.
//!
//! ## Example
//!
//! ```rust,no_run
//! use deal_token::{connect, mint, DealMetadata, Keypair, KeypairWallet, Network};
//!
//! # async fn example(metadata: DealMetadata) -> deal_token::Result<()> {
//! let connection = connect(Network::Devnet)?;
//! let wallet = KeypairWallet::new(Keypair::from_file("id.json")?);
//!
//! let result = mint::mint(&connection, &wallet, metadata).await;
//! match result.value {
//!     Some(token) => println!("minted {}", token.mint_address),
//!     None => eprintln!("{:?}: {:?}", result.error_kind, result.message),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod config;
pub mod error;
pub mod instruction;
pub mod keys;
pub mod ledger;
pub mod mint;
pub mod network;
pub mod outcome;
pub mod preflight;
pub mod programs;
pub mod redemption;
pub mod state;
pub mod submit;
pub mod transaction;
pub mod transfer;
pub mod wallet;

pub use amount::Amount;
pub use config::{CoreConfig, Mode};
pub use error::{DealError, ErrorKind, Result};
pub use keys::{Address, Blockhash, Keypair, Signature};
pub use ledger::{Ledger, RpcLedger, SimulatedLedger};
pub use mint::{DealMetadata, DealTokenIdentity};
pub use network::{Connection, Network, connect};
pub use outcome::{OperationFailure, OperationResult};
pub use preflight::Operation;
pub use redemption::{DealRecord, RedemptionTicket, TicketKey, Ticketing, VerifiedRedemption};
pub use state::{MintState, TokenAccountState};
pub use submit::SubmitOptions;
pub use transaction::Transaction;
pub use transfer::{ListingId, ListingRecord, ListingStatus, RedemptionReceipt, TransferReceipt};
pub use wallet::{KeypairWallet, WalletCapabilities, WalletHandle, WatchOnlyWallet};

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimals of every deal token: one indivisible unit.
pub const DEAL_DECIMALS: u8 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(LAMPORTS_PER_SOL, 1_000_000_000);
        assert_eq!(DEAL_DECIMALS, 0);
    }
}

//! Wallet handles and capability probing.
//!
//! A wallet is an external capability the core borrows for the duration of a
//! call. Integrations differ in where they expose the connected address and
//! which signing methods they offer, so every orchestrator goes through
//! [`probe`] and works from the resulting [`WalletCapabilities`] rather than
//! the handle's shape.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DealError, Result};
use crate::keys::{Address, Keypair, Signature};
use crate::ledger::Ledger;
use crate::outcome::OperationResult;
use crate::transaction::Transaction;

/// An externally controlled wallet.
///
/// Every method is optional; the defaults describe a handle that exposes
/// nothing.
pub trait WalletHandle: Send + Sync {
    /// Address exposed directly on the handle.
    fn public_key(&self) -> Option<Address> {
        None
    }

    /// Address exposed by the handle's underlying adapter.
    fn adapter_public_key(&self) -> Option<Address> {
        None
    }

    /// Whether [`sign_transaction`](Self::sign_transaction) is implemented.
    fn supports_sign_transaction(&self) -> bool {
        false
    }

    /// Whether [`sign_and_send`](Self::sign_and_send) is implemented.
    fn supports_sign_and_send(&self) -> bool {
        false
    }

    /// Add the wallet's signature and return the transaction.
    ///
    /// Implementations report a user refusal as
    /// [`DealError::SigningRejected`].
    fn sign_transaction(
        &self,
        tx: Transaction,
    ) -> impl Future<Output = Result<Transaction>> + Send {
        drop(tx);
        async { Err(DealError::wallet_incapable("wallet cannot sign transactions")) }
    }

    /// Sign and submit in one step, returning the transaction signature.
    fn sign_and_send<L: Ledger>(
        &self,
        ledger: &L,
        tx: Transaction,
    ) -> impl Future<Output = Result<Signature>> + Send {
        let _ = ledger;
        drop(tx);
        async { Err(DealError::wallet_incapable("wallet cannot sign and send")) }
    }
}

/// What a wallet can do, derived fresh on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCapabilities {
    /// Connected address.
    pub address: Address,
    /// The wallet returns signed transactions for us to send.
    pub can_sign_transaction: bool,
    /// The wallet signs and sends on its own.
    pub can_sign_and_send: bool,
}

impl WalletCapabilities {
    /// Whether any signing strategy is available.
    #[must_use]
    pub const fn can_sign(&self) -> bool {
        self.can_sign_transaction || self.can_sign_and_send
    }
}

/// Normalize a wallet handle into its capabilities.
///
/// The address is looked up on the handle first and on its adapter second.
/// Missing signing methods are reported as `false`, never as an error.
pub fn probe<W: WalletHandle>(wallet: &W) -> OperationResult<WalletCapabilities> {
    capabilities(wallet).into()
}

pub(crate) fn capabilities<W: WalletHandle>(wallet: &W) -> Result<WalletCapabilities> {
    let address = wallet
        .public_key()
        .or_else(|| wallet.adapter_public_key())
        .ok_or(DealError::WalletNotConnected)?;
    let caps = WalletCapabilities {
        address,
        can_sign_transaction: wallet.supports_sign_transaction(),
        can_sign_and_send: wallet.supports_sign_and_send(),
    };
    debug!(
        address = %caps.address,
        sign_transaction = caps.can_sign_transaction,
        sign_and_send = caps.can_sign_and_send,
        "wallet probed"
    );
    Ok(caps)
}

/// A wallet backed by a local keypair. Supports both signing strategies.
#[derive(Debug)]
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    /// Wrap a keypair.
    #[must_use]
    pub const fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// The wallet's address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.keypair.address()
    }
}

impl WalletHandle for KeypairWallet {
    fn public_key(&self) -> Option<Address> {
        Some(self.keypair.address())
    }

    fn supports_sign_transaction(&self) -> bool {
        true
    }

    fn supports_sign_and_send(&self) -> bool {
        true
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction> {
        tx.partial_sign(&self.keypair)?;
        Ok(tx)
    }

    async fn sign_and_send<L: Ledger>(&self, ledger: &L, tx: Transaction) -> Result<Signature> {
        let signed = self.sign_transaction(tx).await?;
        ledger.send_raw_transaction(&signed.serialize()).await
    }
}

/// A connected wallet that exposes its address but cannot sign.
#[derive(Debug, Clone, Copy)]
pub struct WatchOnlyWallet {
    address: Address,
}

impl WatchOnlyWallet {
    /// Watch `address`.
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self { address }
    }
}

impl WalletHandle for WatchOnlyWallet {
    fn public_key(&self) -> Option<Address> {
        Some(self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    struct Disconnected;
    impl WalletHandle for Disconnected {}

    struct NestedOnly(Address);
    impl WalletHandle for NestedOnly {
        fn adapter_public_key(&self) -> Option<Address> {
            Some(self.0)
        }
        fn supports_sign_and_send(&self) -> bool {
            true
        }
    }

    struct Both {
        top: Address,
        nested: Address,
    }
    impl WalletHandle for Both {
        fn public_key(&self) -> Option<Address> {
            Some(self.top)
        }
        fn adapter_public_key(&self) -> Option<Address> {
            Some(self.nested)
        }
    }

    #[test]
    fn test_probe_disconnected() {
        let result = probe(&Disconnected);
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::WalletNotConnected));
    }

    #[test]
    fn test_probe_nested_address() {
        let address = Address::new([4; 32]);
        let caps = probe(&NestedOnly(address)).into_result().expect("probe");
        assert_eq!(caps.address, address);
        assert!(!caps.can_sign_transaction);
        assert!(caps.can_sign_and_send);
    }

    #[test]
    fn test_probe_top_level_wins() {
        let wallet = Both {
            top: Address::new([1; 32]),
            nested: Address::new([2; 32]),
        };
        let caps = probe(&wallet).into_result().expect("probe");
        assert_eq!(caps.address, Address::new([1; 32]));
    }

    #[test]
    fn test_probe_watch_only() {
        let caps = probe(&WatchOnlyWallet::new(Address::new([9; 32])))
            .into_result()
            .expect("probe");
        assert!(!caps.can_sign_transaction);
        assert!(!caps.can_sign_and_send);
        assert!(!caps.can_sign());
    }

    #[test]
    fn test_probe_keypair_wallet() {
        let wallet = KeypairWallet::new(Keypair::generate());
        let caps = probe(&wallet).into_result().expect("probe");
        assert_eq!(caps.address, wallet.address());
        assert!(caps.can_sign_transaction && caps.can_sign_and_send);
    }

    #[tokio::test]
    async fn test_default_sign_is_incapable() {
        let payer = Address::new([5; 32]);
        let tx = Transaction::build(
            &payer,
            &[crate::programs::system::transfer(&payer, &payer, 1)],
            crate::keys::Blockhash::new([0; 32]),
        )
        .expect("build");
        let err = WatchOnlyWallet::new(payer)
            .sign_transaction(tx)
            .await
            .expect_err("cannot sign");
        assert_eq!(err.kind(), ErrorKind::WalletIncapable);
    }
}

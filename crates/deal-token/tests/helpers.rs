//! Test helpers for deal token integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::NaiveDate;
use deal_token::programs::associated_token;
use deal_token::{
    Address, Amount, Connection, CoreConfig, DealError, DealMetadata, Keypair, KeypairWallet,
    LAMPORTS_PER_SOL, Ledger, Mode, Result, SimulatedLedger, TokenAccountState, Transaction, WalletHandle,
};

/// Balance comfortably above every operation's reserve.
pub const FUNDED: u64 = 2 * LAMPORTS_PER_SOL;

/// Configuration tuned for the simulated ledger: fast polling, short waits.
pub fn test_config() -> CoreConfig {
    CoreConfig {
        poll_interval_ms: 10,
        confirm_timeout_secs: 2,
        marketplace_address: Some(Keypair::generate().address()),
        ..CoreConfig::default()
    }
}

/// A connection to a fresh simulated ledger.
pub fn connection() -> Connection<SimulatedLedger> {
    Connection::with_ledger(test_config(), SimulatedLedger::new())
}

/// A connection in simulated mode, where non-signing wallets get placeholders.
pub fn simulated_mode_connection() -> Connection<SimulatedLedger> {
    let config = CoreConfig {
        mode: Mode::Simulated,
        ..test_config()
    };
    Connection::with_ledger(config, SimulatedLedger::new())
}

/// A keypair wallet holding `lamports`.
pub fn funded_wallet(connection: &Connection<SimulatedLedger>, lamports: u64) -> KeypairWallet {
    let wallet = KeypairWallet::new(Keypair::generate());
    connection
        .ledger()
        .airdrop(&wallet.address(), Amount::from_lamports(lamports));
    wallet
}

/// The demo deal used throughout.
pub fn pizza() -> DealMetadata {
    DealMetadata {
        title: "50% Off Pizza".to_string(),
        description: "demo".to_string(),
        merchant: "Joe's".to_string(),
        discount_percent: 50,
        original_price: 20.0,
        deal_price: 10.0,
        category: "Food".to_string(),
        expiry_date: NaiveDate::from_ymd_opt(2025, 8, 1).expect("valid date"),
        image_reference: None,
    }
}

/// Units of `mint` held in the associated account of `owner`.
pub async fn token_balance(
    connection: &Connection<SimulatedLedger>,
    owner: &Address,
    mint: &Address,
) -> u64 {
    let holder = associated_token::address(owner, mint).expect("derive holder");
    match connection
        .ledger()
        .get_account_info(&holder)
        .await
        .expect("account lookup")
    {
        Some(account) => TokenAccountState::unpack(&account.data)
            .expect("token account")
            .amount,
        None => 0,
    }
}

/// Lamports held by `address`.
pub async fn lamports(connection: &Connection<SimulatedLedger>, address: &Address) -> u64 {
    connection
        .ledger()
        .get_balance(address)
        .await
        .expect("balance")
        .lamports()
}

/// A keypair wallet whose user declines every signature after the first
/// `allowed` while refusal is switched on.
pub struct FlakyUser {
    inner: KeypairWallet,
    allowed: u32,
    signed: AtomicU32,
    refusing: AtomicBool,
}

impl FlakyUser {
    /// Wrap `inner`, declining from the `allowed + 1`-th signature on.
    pub fn new(inner: KeypairWallet, allowed: u32) -> Self {
        Self {
            inner,
            allowed,
            signed: AtomicU32::new(0),
            refusing: AtomicBool::new(true),
        }
    }

    /// Stop declining.
    pub fn relent(&self) {
        self.refusing.store(false, Ordering::SeqCst);
    }

    /// The wrapped wallet's address.
    pub fn address(&self) -> Address {
        self.inner.address()
    }
}

impl WalletHandle for FlakyUser {
    fn public_key(&self) -> Option<Address> {
        self.inner.public_key()
    }

    fn supports_sign_transaction(&self) -> bool {
        true
    }

    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction> {
        let count = self.signed.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) && count >= self.allowed {
            return Err(DealError::signing_rejected("user declined the request"));
        }
        self.inner.sign_transaction(tx).await
    }
}

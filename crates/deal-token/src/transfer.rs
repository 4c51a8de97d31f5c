//! Moving deal tokens: direct transfer, secondary-market listing and sale,
//! and on-ledger redemption.
//!
//! Each operation is one transaction with one signing event. Ownership is
//! not checked here; the ledger rejects a transfer or burn the signer is
//! not entitled to, and that surfaces as `SubmissionFailed`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::amount::Amount;
use crate::error::{DealError, Result};
use crate::keys::{Address, Signature};
use crate::ledger::Ledger;
use crate::network::Connection;
use crate::outcome::OperationResult;
use crate::preflight::{self, Operation};
use crate::programs::{associated_token, system, token};
use crate::submit::{self, SubmitOptions};
use crate::transaction::Transaction;
use crate::wallet::{self, WalletCapabilities, WalletHandle};

/// Proof of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    /// Token moved.
    pub mint: Address,
    /// Previous holder.
    pub from: Address,
    /// New holder.
    pub to: Address,
    /// Transfer transaction.
    pub signature: Signature,
}

/// Proof of an on-ledger redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionReceipt {
    /// Token burned.
    pub mint: Address,
    /// Holder that redeemed it.
    pub owner: Address,
    /// Burn transaction.
    pub signature: Signature,
    /// When the burn confirmed.
    pub redeemed_at: DateTime<Utc>,
}

/// Unique listing identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingId(String);

impl ListingId {
    /// Create a new random listing ID.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("listing-{}", Uuid::new_v4()))
    }

    /// Create from a string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ListingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Open for purchase.
    Listed,
    /// Bought.
    Sold,
    /// Withdrawn by the seller.
    Cancelled,
}

impl ListingStatus {
    /// Check if the listing is closed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Sold | Self::Cancelled)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listed => write!(f, "listed"),
            Self::Sold => write!(f, "sold"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A secondary-market listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    /// Listing ID.
    pub listing_id: ListingId,
    /// Token for sale.
    pub nft_id: Address,
    /// Seller, paid on sale.
    pub seller_address: Address,
    /// Price the buyer pays.
    pub ask_price: Amount,
    /// Current state.
    pub status: ListingStatus,
    /// Last transaction that changed the listing.
    pub transaction_ref: Option<Signature>,
    /// Buyer, once sold.
    pub buyer_address: Option<Address>,
    /// Creation timestamp.
    pub listed_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ListingRecord {
    /// Create an open listing.
    #[must_use]
    pub fn new(nft_id: Address, seller_address: Address, ask_price: Amount) -> Self {
        let now = Utc::now();
        Self {
            listing_id: ListingId::new(),
            nft_id,
            seller_address,
            ask_price,
            status: ListingStatus::Listed,
            transaction_ref: None,
            buyer_address: None,
            listed_at: now,
            updated_at: now,
        }
    }

    /// Record a completed purchase.
    ///
    /// # Errors
    ///
    /// Returns error if the listing is not open.
    pub fn mark_sold(&mut self, buyer: Address, signature: Signature) -> Result<()> {
        if self.status != ListingStatus::Listed {
            return Err(DealError::invalid_input(format!(
                "cannot sell listing {} in state {}",
                self.listing_id, self.status
            )));
        }
        self.status = ListingStatus::Sold;
        self.buyer_address = Some(buyer);
        self.transaction_ref = Some(signature);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Withdraw the listing.
    ///
    /// # Errors
    ///
    /// Returns error if the listing is not open.
    pub fn cancel(&mut self) -> Result<()> {
        if self.status != ListingStatus::Listed {
            return Err(DealError::invalid_input(format!(
                "cannot cancel listing {} in state {}",
                self.listing_id, self.status
            )));
        }
        self.status = ListingStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Transfer the single unit of `mint` to `to`.
///
/// `to` is parsed first; a malformed address fails with `InvalidRecipient`
/// before anything else happens. The recipient's holder account is created
/// if it does not exist.
pub async fn transfer<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    mint: &Address,
    to: &str,
) -> OperationResult<TransferReceipt> {
    let result = transfer_token(connection, wallet, mint, to).await;
    with_explorer_ref(connection, result, |r| Some(r.signature))
}

/// List `mint` for sale at `ask_price`, paying the listing fee to the
/// configured marketplace.
pub async fn list<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    mint: &Address,
    ask_price: Amount,
) -> OperationResult<ListingRecord> {
    let result = list_token(connection, wallet, mint, ask_price).await;
    with_explorer_ref(connection, result, |r| r.transaction_ref)
}

/// Buy a listed token: the buyer pays the ask price to the seller.
///
/// Returns the listing marked `Sold`. Handing over the unit itself is the
/// seller's [`transfer`].
pub async fn sell<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    buyer: &W,
    listing: &ListingRecord,
) -> OperationResult<ListingRecord> {
    let result = buy_listing(connection, buyer, listing).await;
    with_explorer_ref(connection, result, |r| r.transaction_ref)
}

/// Burn the wallet's unit of `mint`.
pub async fn redeem<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    mint: &Address,
) -> OperationResult<RedemptionReceipt> {
    let result = redeem_token(connection, wallet, mint).await;
    with_explorer_ref(connection, result, |r| Some(r.signature))
}

fn with_explorer_ref<L: Ledger, T>(
    connection: &Connection<L>,
    result: Result<T>,
    signature: impl FnOnce(&T) -> Option<Signature>,
) -> OperationResult<T> {
    match result {
        Ok(value) => match signature(&value) {
            Some(sig) => {
                let link = connection.explorer_url(&sig);
                OperationResult::ok_with_ref(value, link)
            }
            None => OperationResult::ok(value),
        },
        Err(e) => OperationResult::failed(&e),
    }
}

/// Probe the wallet and make sure it can sign.
fn signer<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
) -> Result<WalletCapabilities> {
    let caps = wallet::capabilities(wallet)?;
    submit::require_signer(connection, &caps)?;
    Ok(caps)
}

async fn send<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    caps: &WalletCapabilities,
    instructions: &[crate::instruction::Instruction],
) -> Result<Signature> {
    let blockhash = connection.ledger().get_latest_blockhash().await?;
    let tx = Transaction::build(&caps.address, instructions, blockhash)?;
    let options = SubmitOptions::from_config(connection.config());
    submit::submit_transaction(connection, wallet, caps, tx, &options).await
}

fn parse_recipient(to: &str) -> Result<Address> {
    let trimmed = to.trim();
    if trimmed.is_empty() {
        return Err(DealError::invalid_recipient("recipient address is empty"));
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| DealError::invalid_recipient(format!("'{trimmed}' is not a valid address: {e}")))
}

async fn transfer_token<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    mint: &Address,
    to: &str,
) -> Result<TransferReceipt> {
    let recipient = parse_recipient(to)?;
    let caps = signer(connection, wallet)?;
    let from = caps.address;
    if recipient == from {
        return Err(DealError::invalid_recipient("recipient is the sender"));
    }
    preflight::ensure(connection, &from, Operation::Transfer).await?;

    let source = associated_token::address(&from, mint)?;
    let destination = associated_token::address(&recipient, mint)?;
    let instructions = [
        associated_token::create_idempotent(&from, &recipient, mint)?,
        token::transfer(&source, &destination, &from, 1),
    ];
    let signature = send(connection, wallet, &caps, &instructions).await?;

    info!(mint = %mint, from = %from, to = %recipient, signature = %signature, "deal token transferred");
    Ok(TransferReceipt {
        mint: *mint,
        from,
        to: recipient,
        signature,
    })
}

async fn list_token<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    mint: &Address,
    ask_price: Amount,
) -> Result<ListingRecord> {
    if ask_price.is_zero() {
        return Err(DealError::invalid_input("sale price must be greater than zero"));
    }
    let marketplace = connection
        .config()
        .marketplace_address
        .ok_or_else(|| DealError::invalid_input("no marketplace address configured"))?;
    let caps = signer(connection, wallet)?;
    let seller = caps.address;
    let fee = Amount::from_lamports(connection.config().listing_fee_lamports);
    preflight::ensure(connection, &seller, Operation::List { fee }).await?;

    let instructions = [system::transfer(&seller, &marketplace, fee.lamports())];
    let signature = send(connection, wallet, &caps, &instructions).await?;

    let mut listing = ListingRecord::new(*mint, seller, ask_price);
    listing.transaction_ref = Some(signature);
    info!(
        listing_id = %listing.listing_id,
        mint = %mint,
        seller = %seller,
        ask_price = %ask_price,
        signature = %signature,
        "deal token listed"
    );
    Ok(listing)
}

async fn buy_listing<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    buyer: &W,
    listing: &ListingRecord,
) -> Result<ListingRecord> {
    if listing.status.is_terminal() {
        return Err(DealError::invalid_input(format!(
            "listing {} is {}",
            listing.listing_id, listing.status
        )));
    }
    let caps = signer(connection, buyer)?;
    let buyer_address = caps.address;
    if buyer_address == listing.seller_address {
        return Err(DealError::invalid_input("seller cannot buy their own listing"));
    }
    preflight::ensure(
        connection,
        &buyer_address,
        Operation::Purchase {
            price: listing.ask_price,
        },
    )
    .await?;

    let instructions = [system::transfer(
        &buyer_address,
        &listing.seller_address,
        listing.ask_price.lamports(),
    )];
    let signature = send(connection, buyer, &caps, &instructions).await?;

    let mut sold = listing.clone();
    sold.mark_sold(buyer_address, signature)?;
    info!(
        listing_id = %sold.listing_id,
        buyer = %buyer_address,
        price = %sold.ask_price,
        signature = %signature,
        "listing sold"
    );
    Ok(sold)
}

async fn redeem_token<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    mint: &Address,
) -> Result<RedemptionReceipt> {
    let caps = signer(connection, wallet)?;
    let owner = caps.address;
    preflight::ensure(connection, &owner, Operation::Redeem).await?;

    let holder = associated_token::address(&owner, mint)?;
    let instructions = [token::burn(&holder, mint, &owner, 1)];
    let signature = send(connection, wallet, &caps, &instructions).await?;

    info!(mint = %mint, owner = %owner, signature = %signature, "deal token redeemed");
    Ok(RedemptionReceipt {
        mint: *mint,
        owner,
        signature,
        redeemed_at: Utc::now(),
    })
}

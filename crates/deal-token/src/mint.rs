//! Minting single-edition deal tokens.
//!
//! A mint takes exactly two signing events:
//!
//! 1. create the token identity account and initialize it (precision 0, the
//!    caller as mint and freeze authority); partially signed by a fresh
//!    identity keypair first, then by the wallet
//! 2. create the caller's holder account if absent, mint one unit into it,
//!    and clear the mint authority
//!
//! The holder account address is derived from the identity, so step 2 cannot
//! be built until step 1 is confirmed. Clearing the authority is the last
//! instruction of the only transaction that mints, which fixes supply at one.
//! If step 2 fails the result is `PartiallyMinted` and [`resume`] finishes
//! the job.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::DEAL_DECIMALS;
use crate::error::{DealError, Result};
use crate::instruction::Instruction;
use crate::keys::{Address, Keypair, Signature};
use crate::ledger::Ledger;
use crate::network::Connection;
use crate::outcome::OperationResult;
use crate::preflight::{self, Operation};
use crate::programs::token::AuthorityType;
use crate::programs::{associated_token, system, token};
use crate::state::MintState;
use crate::submit::{self, SubmitOptions};
use crate::transaction::Transaction;
use crate::wallet::{self, WalletCapabilities, WalletHandle};

/// Symbol carried by every deal token's metadata document.
pub const DEAL_SYMBOL: &str = "DEAL";

/// Image used when a deal has none.
pub const DEFAULT_IMAGE: &str = "https://via.placeholder.com/500";

/// Descriptive attributes attached to a deal token at mint time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealMetadata {
    /// Deal headline.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Merchant offering the deal.
    #[serde(alias = "merchantName")]
    pub merchant: String,
    /// Discount in percent.
    #[serde(alias = "discount", deserialize_with = "number_or_text")]
    pub discount_percent: u8,
    /// Price before the discount, in dollars.
    #[serde(deserialize_with = "number_or_text")]
    pub original_price: f64,
    /// Price with the discount, in dollars.
    #[serde(deserialize_with = "number_or_text")]
    pub deal_price: f64,
    /// Deal category.
    pub category: String,
    /// Last day the deal can be redeemed.
    pub expiry_date: NaiveDate,
    /// Image URL.
    #[serde(default, alias = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,
}

/// Form input delivers numbers as text.
fn number_or_text<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(|e| {
            serde::de::Error::custom(format!("invalid number '{text}': {e}"))
        }),
    }
}

impl DealMetadata {
    /// Check the fields a mint depends on.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty title or description, a discount
    /// above 100%, or a negative or non-finite price.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(DealError::invalid_input("deal title cannot be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(DealError::invalid_input("deal description cannot be empty"));
        }
        if self.discount_percent > 100 {
            return Err(DealError::invalid_input(format!(
                "discount must be at most 100%, got {}%",
                self.discount_percent
            )));
        }
        for (name, price) in [
            ("original price", self.original_price),
            ("deal price", self.deal_price),
        ] {
            if !price.is_finite() || price < 0.0 {
                return Err(DealError::invalid_input(format!(
                    "{name} must be a non-negative number, got {price}"
                )));
            }
        }
        Ok(())
    }

    /// The off-ledger metadata document for a token created by `creator`.
    #[must_use]
    pub fn to_document(&self, creator: &Address) -> Value {
        let files = self.image_reference.as_ref().map_or_else(Vec::new, |uri| {
            vec![json!({ "uri": uri, "type": "image/png" })]
        });
        json!({
            "name": self.title,
            "symbol": DEAL_SYMBOL,
            "description": self.description,
            "image": self.image_reference.as_deref().unwrap_or(DEFAULT_IMAGE),
            "attributes": [
                { "trait_type": "Merchant", "value": self.merchant },
                { "trait_type": "Discount", "value": format!("{}%", self.discount_percent) },
                { "trait_type": "Expiry", "value": self.expiry_date.to_string() },
                { "trait_type": "Category", "value": self.category },
                { "trait_type": "Original Price", "value": format!("${}", self.original_price) },
                { "trait_type": "Deal Price", "value": format!("${}", self.deal_price) },
            ],
            "properties": {
                "files": files,
                "category": "image",
                "creators": [{ "address": creator.to_string(), "share": 100 }],
            },
        })
    }
}

/// A minted deal token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealTokenIdentity {
    /// The token identity (mint account).
    pub mint_address: Address,
    /// Holder of the single unit.
    pub owner_address: Address,
    /// Attributes attached at mint time.
    pub metadata: DealMetadata,
}

/// Mint a new single-edition deal token owned by the wallet.
///
/// On success `explorer_ref` links the issuing transaction.
pub async fn mint<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    metadata: DealMetadata,
) -> OperationResult<DealTokenIdentity> {
    match mint_token(connection, wallet, metadata).await {
        Ok((identity, signature)) => {
            OperationResult::ok_with_ref(identity, connection.explorer_url(&signature))
        }
        Err(e) => OperationResult::failed(&e),
    }
}

/// Finish a `PartiallyMinted` token: create the holder account if needed,
/// issue the unit if not yet issued, and clear the mint authority.
///
/// Returns the identity immediately if the token is already single-edition.
pub async fn resume<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    mint: &Address,
    metadata: DealMetadata,
) -> OperationResult<DealTokenIdentity> {
    match resume_token(connection, wallet, mint, metadata).await {
        Ok((identity, Some(signature))) => {
            OperationResult::ok_with_ref(identity, connection.explorer_url(&signature))
        }
        Ok((identity, None)) => OperationResult::ok(identity),
        Err(e) => OperationResult::failed(&e),
    }
}

/// Current on-ledger state of a token identity.
pub async fn query<L: Ledger>(
    connection: &Connection<L>,
    mint: &Address,
) -> OperationResult<MintState> {
    load_mint(connection, mint).await.into()
}

async fn mint_token<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    metadata: DealMetadata,
) -> Result<(DealTokenIdentity, Signature)> {
    metadata.validate()?;
    let caps = wallet::capabilities(wallet)?;
    submit::require_signer(connection, &caps)?;
    preflight::ensure(connection, &caps.address, Operation::Mint).await?;

    let options = SubmitOptions::from_config(connection.config());
    let owner = caps.address;
    let mint = create_identity(connection, wallet, &caps, &options).await?;

    let signature = issue(connection, wallet, &caps, &mint, true, &options)
        .await
        .map_err(|e| {
            warn!(mint = %mint, error = %e, "issuance failed after identity was created");
            DealError::partially_minted(mint, &e)
        })?;

    info!(mint = %mint, owner = %owner, signature = %signature, "deal token minted");
    Ok((
        DealTokenIdentity {
            mint_address: mint,
            owner_address: owner,
            metadata,
        },
        signature,
    ))
}

/// Step 1: create and initialize the identity account.
async fn create_identity<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    caps: &WalletCapabilities,
    options: &SubmitOptions,
) -> Result<Address> {
    let ledger = connection.ledger();
    let payer = caps.address;
    let rent = ledger
        .get_minimum_balance_for_rent_exemption(token::MINT_LEN)
        .await?;
    let blockhash = ledger.get_latest_blockhash().await?;

    // The identity keypair lives only long enough to co-sign this transaction.
    let (mint, tx) = {
        let identity = Keypair::generate();
        let mint = identity.address();
        let instructions = [
            system::create_account(&payer, &mint, rent, token::MINT_LEN as u64, &token::ID),
            token::initialize_mint(&mint, DEAL_DECIMALS, &payer, Some(&payer)),
        ];
        let mut tx = Transaction::build(&payer, &instructions, blockhash)?;
        tx.partial_sign(&identity)?;
        (mint, tx)
    };

    let signature = submit::submit_transaction(connection, wallet, caps, tx, options)
        .await
        .map_err(|e| {
            warn!(mint = %mint, error = %e, "identity creation failed");
            e.with_pending_mint(mint)
        })?;
    info!(mint = %mint, signature = %signature, rent, "step 1/2: token identity created");
    Ok(mint)
}

/// Step 2: holder account, one unit, authority cleared.
async fn issue<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    caps: &WalletCapabilities,
    mint: &Address,
    mint_unit: bool,
    options: &SubmitOptions,
) -> Result<Signature> {
    let ledger = connection.ledger();
    let owner = caps.address;
    let holder = associated_token::address(&owner, mint)?;
    let holder_exists = ledger.get_account_info(&holder).await?.is_some();

    let mut instructions: Vec<Instruction> = Vec::with_capacity(3);
    if !holder_exists {
        instructions.push(associated_token::create(&owner, &owner, mint)?);
    }
    if mint_unit {
        instructions.push(token::mint_to(mint, &holder, &owner, 1));
    }
    instructions.push(token::set_authority(
        mint,
        &owner,
        AuthorityType::MintTokens,
        None,
    ));

    let blockhash = ledger.get_latest_blockhash().await?;
    let tx = Transaction::build(&owner, &instructions, blockhash)?;
    let signature = submit::submit_transaction(connection, wallet, caps, tx, options).await?;
    info!(
        mint = %mint,
        holder = %holder,
        created_holder = !holder_exists,
        signature = %signature,
        "step 2/2: unit issued and mint authority cleared"
    );
    Ok(signature)
}

async fn resume_token<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    mint: &Address,
    metadata: DealMetadata,
) -> Result<(DealTokenIdentity, Option<Signature>)> {
    let caps = wallet::capabilities(wallet)?;
    submit::require_signer(connection, &caps)?;
    let state = load_mint(connection, mint).await?;
    let identity = DealTokenIdentity {
        mint_address: *mint,
        owner_address: caps.address,
        metadata,
    };

    if state.is_single_edition() {
        info!(mint = %mint, "token already single-edition, nothing to resume");
        return Ok((identity, None));
    }
    if state.mint_authority != Some(caps.address) {
        return Err(DealError::invalid_input(format!(
            "wallet {} is not the mint authority of {mint}",
            caps.address
        )));
    }
    if state.decimals != DEAL_DECIMALS || state.supply > 1 {
        return Err(DealError::invalid_input(format!(
            "{mint} is not a deal token identity (decimals {}, supply {})",
            state.decimals, state.supply
        )));
    }

    preflight::ensure(connection, &caps.address, Operation::Transfer).await?;
    let options = SubmitOptions::from_config(connection.config());
    let signature = issue(connection, wallet, &caps, mint, state.supply == 0, &options)
        .await
        .map_err(|e| DealError::partially_minted(*mint, &e))?;
    info!(mint = %mint, signature = %signature, "partial mint resumed");
    Ok((identity, Some(signature)))
}

async fn load_mint<L: Ledger>(connection: &Connection<L>, mint: &Address) -> Result<MintState> {
    let account = connection
        .ledger()
        .get_account_info(mint)
        .await?
        .ok_or_else(|| DealError::invalid_input(format!("no token identity at {mint}")))?;
    if account.owner != token::ID {
        return Err(DealError::invalid_input(format!(
            "{mint} is not owned by the token program"
        )));
    }
    MintState::unpack(&account.data)
}

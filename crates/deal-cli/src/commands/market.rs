//! Transfer, listing, purchase and redemption commands.

use std::io::Write;
use std::path::Path;

use deal_token::{Amount, ListingRecord, OperationResult, transfer};

use crate::commands::{parse_address, read_json};
use crate::context::Context;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Market command executor.
pub struct MarketCommand<'a> {
    ctx: &'a Context,
}

impl<'a> MarketCommand<'a> {
    /// Create a new market command.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Transfer `mint` to `to`. The recipient is validated by the core.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    pub async fn transfer<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        mint: &str,
        to: &str,
    ) -> Result<(), CliError> {
        let mint = parse_address(mint, "mint")?;
        let wallet = self.ctx.wallet()?;
        let conn = self.ctx.connection()?;
        format.write_result(writer, transfer::transfer(&conn, &wallet, &mint, to).await)?;
        Ok(())
    }

    /// List `mint` for sale at `price` SOL.
    ///
    /// # Errors
    ///
    /// Returns an error if the price is malformed or the listing fails.
    pub async fn list<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        mint: &str,
        price: &str,
    ) -> Result<(), CliError> {
        let mint = parse_address(mint, "mint")?;
        let price = Amount::parse_sol(price)?;
        let wallet = self.ctx.wallet()?;
        let conn = self.ctx.connection()?;
        format.write_result(writer, transfer::list(&conn, &wallet, &mint, price).await)?;
        Ok(())
    }

    /// Buy the listing stored in `listing`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is not a listing or the purchase fails.
    pub async fn buy<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        listing: &Path,
    ) -> Result<(), CliError> {
        let listing = load_listing(listing)?;
        let wallet = self.ctx.wallet()?;
        let conn = self.ctx.connection()?;
        format.write_result(writer, transfer::sell(&conn, &wallet, &listing).await)?;
        Ok(())
    }

    /// Burn the wallet's unit of `mint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the redemption fails.
    pub async fn redeem<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        mint: &str,
    ) -> Result<(), CliError> {
        let mint = parse_address(mint, "mint")?;
        let wallet = self.ctx.wallet()?;
        let conn = self.ctx.connection()?;
        format.write_result(writer, transfer::redeem(&conn, &wallet, &mint).await)?;
        Ok(())
    }
}

/// Accept either a bare listing or the JSON result `list` printed.
fn load_listing(path: &Path) -> Result<ListingRecord, CliError> {
    let value: serde_json::Value = read_json(path, "listing")?;
    if value.get("listingId").is_some() {
        return serde_json::from_value(value)
            .map_err(|e| CliError::InvalidArgument(format!("listing: {e}")));
    }
    let result: OperationResult<ListingRecord> = serde_json::from_value(value)
        .map_err(|e| CliError::InvalidArgument(format!("listing: {e}")))?;
    Ok(result.into_result()?)
}

//! Output formatting for CLI commands.
//!
//! Table mode renders the value of a successful operation; JSON mode writes
//! the whole operation result, failures included.

use std::io::Write;

use deal_token::preflight::format_sol;
use deal_token::{
    Address, Amount, DealTokenIdentity, ListingRecord, MintState, OperationResult,
    RedemptionReceipt, RedemptionTicket, TransferReceipt, VerifiedRedemption,
};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => write_json(writer, value)?,
            Format::Table => value.write_table(writer)?,
        }
        Ok(())
    }

    /// Write an operation result and turn a failure into an error.
    ///
    /// # Errors
    ///
    /// Returns the operation's failure, or an error if writing fails.
    pub fn write_result<W, T>(&self, writer: &mut W, result: OperationResult<T>) -> Result<T, CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        if self.is_json() {
            write_json(writer, &result)?;
            return Ok(result.into_result()?);
        }
        let explorer_ref = result.explorer_ref.clone();
        let value = result.into_result()?;
        value.write_table(writer)?;
        if let Some(link) = explorer_ref {
            writeln!(writer, "Explorer:         {link}")?;
        }
        Ok(value)
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *writer, value)
        .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
    writeln!(writer)?;
    Ok(())
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// A plain status message.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message text.
    pub message: String,
}

impl Message {
    /// Create a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.message)?;
        Ok(())
    }
}

/// Balance of one address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    /// Address inspected.
    pub address: Address,
    /// Balance in lamports.
    pub lamports: Amount,
}

impl TableDisplay for BalanceView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Address:          {}", self.address)?;
        writeln!(writer, "Balance:          {}", format_sol(self.lamports))?;
        Ok(())
    }
}

impl TableDisplay for Amount {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", format_sol(*self))?;
        Ok(())
    }
}

impl TableDisplay for DealTokenIdentity {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let m = &self.metadata;
        writeln!(writer, "Deal Token")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Mint:             {}", self.mint_address)?;
        writeln!(writer, "Owner:            {}", self.owner_address)?;
        writeln!(writer, "Title:            {}", m.title)?;
        writeln!(writer, "Merchant:         {}", m.merchant)?;
        writeln!(writer, "Discount:         {}%", m.discount_percent)?;
        writeln!(writer, "Price:            ${} (was ${})", m.deal_price, m.original_price)?;
        writeln!(writer, "Category:         {}", m.category)?;
        writeln!(writer, "Expires:          {}", m.expiry_date)?;
        Ok(())
    }
}

impl TableDisplay for MintState {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let authority = self
            .mint_authority
            .map_or_else(|| "none (supply fixed)".to_string(), |a| a.to_string());
        let freeze = self
            .freeze_authority
            .map_or_else(|| "none".to_string(), |a| a.to_string());
        writeln!(writer, "Supply:           {}", self.supply)?;
        writeln!(writer, "Decimals:         {}", self.decimals)?;
        writeln!(writer, "Mint authority:   {authority}")?;
        writeln!(writer, "Freeze authority: {freeze}")?;
        writeln!(
            writer,
            "Single edition:   {}",
            if self.is_single_edition() { "yes" } else { "no" }
        )?;
        Ok(())
    }
}

impl TableDisplay for TransferReceipt {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Transferred {}", self.mint)?;
        writeln!(writer, "  From:           {}", self.from)?;
        writeln!(writer, "  To:             {}", self.to)?;
        writeln!(writer, "  Signature:      {}", self.signature)?;
        Ok(())
    }
}

impl TableDisplay for ListingRecord {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Listing:          {}", self.listing_id)?;
        writeln!(writer, "Token:            {}", self.nft_id)?;
        writeln!(writer, "Seller:           {}", self.seller_address)?;
        writeln!(writer, "Ask price:        {}", format_sol(self.ask_price))?;
        writeln!(writer, "Status:           {}", self.status)?;
        if let Some(buyer) = self.buyer_address {
            writeln!(writer, "Buyer:            {buyer}")?;
        }
        if let Some(signature) = self.transaction_ref {
            writeln!(writer, "Transaction:      {signature}")?;
        }
        Ok(())
    }
}

impl TableDisplay for RedemptionReceipt {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Redeemed {}", self.mint)?;
        writeln!(writer, "  Owner:          {}", self.owner)?;
        writeln!(writer, "  Signature:      {}", self.signature)?;
        writeln!(writer, "  At:             {}", self.redeemed_at.to_rfc3339())?;
        Ok(())
    }
}

impl TableDisplay for RedemptionTicket {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Ticket:           {}", self.redemption_id())?;
        writeln!(writer, "Deal:             {} ({})", self.deal_title, self.deal_id)?;
        writeln!(writer, "Merchant:         {}", self.merchant)?;
        writeln!(writer, "Issued:           {}", self.ticket_issued_at.to_rfc3339())?;
        writeln!(writer, "Expires:          {}", self.expires_at.to_rfc3339())?;
        Ok(())
    }
}

impl TableDisplay for VerifiedRedemption {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "VALID ticket {}", self.redemption_id)?;
        writeln!(writer, "  Deal:           {} ({})", self.deal_title, self.deal_id)?;
        writeln!(writer, "  Merchant:       {}", self.merchant)?;
        writeln!(writer, "  Pays:           ${}", self.discount_price)?;
        writeln!(writer, "  Valid until:    {}", self.expires_at.to_rfc3339())?;
        Ok(())
    }
}

//! Keypair, balance and minting commands.

use std::io::Write;
use std::path::Path;

use deal_token::{DealMetadata, Keypair, mint, preflight};
use tracing::info;

use crate::commands::{parse_address, read_json};
use crate::context::Context;
use crate::error::CliError;
use crate::output::{BalanceView, Message, OutputFormat};

/// Token command executor.
pub struct TokenCommand<'a> {
    ctx: &'a Context,
}

impl<'a> TokenCommand<'a> {
    /// Create a new token command.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Write a fresh keypair to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists (without `force`) or cannot be
    /// written.
    pub fn keygen<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        out: &Path,
        force: bool,
    ) -> Result<(), CliError> {
        if out.exists() && !force {
            return Err(CliError::InvalidArgument(format!(
                "{} already exists (use --force to overwrite)",
                out.display()
            )));
        }
        let keypair = Keypair::generate();
        keypair
            .save(out)
            .map_err(|e| CliError::Keypair(format!("{}: {e}", out.display())))?;
        info!(address = %keypair.address(), path = %out.display(), "keypair generated");
        format.write(
            writer,
            &Message::new(format!("Wrote keypair for {} to {}", keypair.address(), out.display())),
        )
    }

    /// Show the balance of `address`, or of the configured keypair.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed or the query fails.
    pub async fn balance<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        address: Option<&str>,
    ) -> Result<(), CliError> {
        let address = match address {
            Some(a) => parse_address(a, "address")?,
            None => self.ctx.wallet()?.address(),
        };
        let conn = self.ctx.connection()?;
        let result = preflight::balance(&conn, &address)
            .await
            .map(|lamports| BalanceView { address, lamports });
        format.write_result(writer, result)?;
        Ok(())
    }

    /// Mint a deal token from a metadata file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or the mint fails.
    pub async fn mint<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        metadata: &Path,
    ) -> Result<(), CliError> {
        let metadata: DealMetadata = read_json(metadata, "metadata")?;
        let wallet = self.ctx.wallet()?;
        let conn = self.ctx.connection()?;
        format.write_result(writer, mint::mint(&conn, &wallet, metadata).await)?;
        Ok(())
    }

    /// Finish a partially minted token.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid or the resume fails.
    pub async fn resume<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        mint_address: &str,
        metadata: &Path,
    ) -> Result<(), CliError> {
        let mint_address = parse_address(mint_address, "mint")?;
        let metadata: DealMetadata = read_json(metadata, "metadata")?;
        let wallet = self.ctx.wallet()?;
        let conn = self.ctx.connection()?;
        format.write_result(
            writer,
            mint::resume(&conn, &wallet, &mint_address, metadata).await,
        )?;
        Ok(())
    }

    /// Show the state of a token identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed or the query fails.
    pub async fn info<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        mint_address: &str,
    ) -> Result<(), CliError> {
        let mint_address = parse_address(mint_address, "mint")?;
        let conn = self.ctx.connection()?;
        format.write_result(writer, mint::query(&conn, &mint_address).await)?;
        Ok(())
    }
}

//! Redemption ticket commands. These never touch the network.

use std::io::Write;
use std::path::Path;

use deal_token::{DealRecord, Ticketing};
use tracing::info;

use crate::commands::read_json;
use crate::context::Context;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Ticket command executor.
pub struct TicketCommand {
    ticketing: Ticketing,
}

impl TicketCommand {
    /// Create a ticket command keyed from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured ticket key or TTL is invalid.
    pub fn new(ctx: &Context) -> Result<Self, CliError> {
        let ticketing =
            Ticketing::from_config(&ctx.config).map_err(|e| CliError::Config(e.to_string()))?;
        Ok(Self { ticketing })
    }

    /// Issue a ticket for the deal record in `deal`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is invalid or expired, or the ticket
    /// cannot be written.
    pub fn issue<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        deal: &Path,
        out: Option<&Path>,
    ) -> Result<(), CliError> {
        let record: DealRecord = read_json(deal, "deal")?;
        let ticket = format.write_result(writer, self.ticketing.issue(&record))?;
        if let Some(out) = out {
            std::fs::write(out, ticket.to_json()?)?;
            info!(ticket = %ticket.redemption_id(), path = %out.display(), "ticket written");
        }
        Ok(())
    }

    /// Verify the ticket document in `ticket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ticket is malformed, tampered with or expired.
    pub fn verify<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        ticket: &Path,
    ) -> Result<(), CliError> {
        let document = ticket_document(&std::fs::read_to_string(ticket)?);
        format.write_result(writer, self.ticketing.verify_json(&document))?;
        Ok(())
    }
}

/// Unwrap the ticket from a `--format json` issue result; pass anything
/// else through untouched.
fn ticket_document(content: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) if value.get("success").is_some() => match value.get("value") {
            Some(ticket) if !ticket.is_null() => ticket.to_string(),
            _ => content.to_string(),
        },
        _ => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use chrono::{Duration, Utc};
    use deal_token::{CoreConfig, TicketKey};
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn command() -> TicketCommand {
        TicketCommand {
            ticketing: Ticketing::new(TicketKey::new([9; 32]), chrono::TimeDelta::hours(1)),
        }
    }

    fn deal_file() -> NamedTempFile {
        let expiry = (Utc::now() + Duration::days(30)).date_naive();
        let mut file = NamedTempFile::new().expect("should create temp file");
        write!(
            file,
            r#"{{"dealId":"deal-42","dealTitle":"Two Pizzas","merchant":"Tony's","discountPrice":9.5,"expiryDate":"{expiry}"}}"#
        )
        .expect("should write");
        file
    }

    #[test]
    fn issue_then_verify_ticket_file() {
        let cmd = command();
        let deal = deal_file();
        let ticket = NamedTempFile::new().expect("should create temp file");
        let mut out = Vec::new();
        cmd.issue(&mut out, &OutputFormat::default(), deal.path(), Some(ticket.path()))
            .expect("should issue");
        assert!(String::from_utf8_lossy(&out).contains("redeem-deal-42-"));

        let mut out = Vec::new();
        cmd.verify(&mut out, &OutputFormat::default(), ticket.path())
            .expect("should verify");
        assert!(String::from_utf8_lossy(&out).contains("VALID ticket"));
    }

    #[test]
    fn verify_accepts_json_issue_output() {
        let cmd = command();
        let deal = deal_file();
        let mut issued = NamedTempFile::new().expect("should create temp file");
        cmd.issue(
            issued.as_file_mut(),
            &OutputFormat::new(Format::Json),
            deal.path(),
            None,
        )
        .expect("should issue");

        let mut out = Vec::new();
        cmd.verify(&mut out, &OutputFormat::new(Format::Json), issued.path())
            .expect("should verify");
        let json: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(json["success"], true);
        assert_eq!(json["value"]["dealId"], "deal-42");
    }

    #[test]
    fn verify_with_other_key_fails() {
        let deal = deal_file();
        let ticket = NamedTempFile::new().expect("should create temp file");
        command()
            .issue(&mut Vec::new(), &OutputFormat::default(), deal.path(), Some(ticket.path()))
            .expect("should issue");

        let other = TicketCommand {
            ticketing: Ticketing::new(TicketKey::new([1; 32]), chrono::TimeDelta::hours(1)),
        };
        let err = other
            .verify(&mut Vec::new(), &OutputFormat::default(), ticket.path())
            .expect_err("should reject");
        assert_eq!(err.kind(), Some(deal_token::ErrorKind::InvalidTicketFormat));
    }

    #[test]
    fn new_reads_key_from_config() {
        let mut config = CoreConfig::default();
        config.ticket_key = Some(TicketKey::new([3; 32]).to_hex());
        let ctx = Context::for_config(config);
        assert!(TicketCommand::new(&ctx).is_ok());
    }
}

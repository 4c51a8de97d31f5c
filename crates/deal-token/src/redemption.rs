//! Offline redemption tickets.
//!
//! A ticket packages a deal's identifying fields with its issue time, an
//! expiry, and a keyed BLAKE3 MAC over all of them. Issuing and verifying
//! never touch the ledger. Verification recomputes the MAC from the ticket's
//! own fields, so changing any field invalidates it. Tracking which tickets
//! were already consumed is left to whoever holds durable state.

use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::error::{DealError, Result};
use crate::keys::{Address, Signature};
use crate::outcome::OperationResult;

/// Default redemption channel.
pub const DEFAULT_REDEMPTION_TYPE: &str = "QR";

/// Key-derivation context for the fallback key used when none is configured.
const UNKEYED_CONTEXT: &str = "deal-token 2025 redemption ticket fallback key";

/// A deal as presented for redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealRecord {
    /// Deal identifier.
    #[serde(alias = "id")]
    pub deal_id: String,
    /// Deal title.
    pub deal_title: String,
    /// Merchant name.
    pub merchant: String,
    /// Price the customer pays.
    pub discount_price: f64,
    /// Last day the deal can be redeemed.
    pub expiry_date: NaiveDate,
    /// Redemption channel, e.g. `QR`.
    #[serde(default = "default_redemption_type")]
    pub redemption_type: String,
    /// Token backing the deal, if minted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_mint_address: Option<Address>,
    /// Mint or purchase transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_signature: Option<Signature>,
}

fn default_redemption_type() -> String {
    DEFAULT_REDEMPTION_TYPE.to_string()
}

impl DealRecord {
    /// Check the record can back a ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the ID, title or merchant is empty or the price is
    /// not a finite non-negative number.
    pub fn validate(&self) -> Result<()> {
        if self.deal_id.trim().is_empty() {
            return Err(DealError::invalid_input("deal ID is required"));
        }
        if self.deal_title.trim().is_empty() {
            return Err(DealError::invalid_input("deal title is required"));
        }
        if self.merchant.trim().is_empty() {
            return Err(DealError::invalid_input("merchant is required"));
        }
        if !self.discount_price.is_finite() || self.discount_price < 0.0 {
            return Err(DealError::invalid_input(format!(
                "invalid discount price: {}",
                self.discount_price
            )));
        }
        if self.redemption_type.trim().is_empty() {
            return Err(DealError::invalid_input("redemption type is required"));
        }
        Ok(())
    }

    /// First instant after the deal's last valid day.
    fn expiry_instant(&self) -> Option<DateTime<Utc>> {
        self.expiry_date
            .succ_opt()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
    }
}

/// A signed, time-boxed redemption payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionTicket {
    /// Deal identifier.
    pub deal_id: String,
    /// Deal title.
    pub deal_title: String,
    /// Merchant name.
    pub merchant: String,
    /// Price the customer pays.
    pub discount_price: f64,
    /// Last day the deal can be redeemed.
    pub expiry_date: NaiveDate,
    /// Redemption channel.
    pub redemption_type: String,
    /// Token backing the deal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_mint_address: Option<Address>,
    /// Mint or purchase transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_signature: Option<Signature>,
    /// Issue time.
    pub ticket_issued_at: DateTime<Utc>,
    /// The ticket is invalid from this instant on.
    pub expires_at: DateTime<Utc>,
    /// Hex-encoded MAC over every other field.
    pub signature_payload: String,
}

impl RedemptionTicket {
    /// Serialize as the JSON document handed to point-of-sale tooling.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a ticket document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTicketFormat` if the document is not a ticket.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DealError::invalid_ticket(format!("malformed ticket document: {e}")))
    }

    /// Redemption ID shown to the customer and merchant.
    #[must_use]
    pub fn redemption_id(&self) -> String {
        let short: String = self.signature_payload.chars().take(16).collect();
        format!("redeem-{}-{short}", self.deal_id)
    }

    /// Canonical byte encoding of every field except the MAC.
    fn signed_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        let mut field = |bytes: &[u8]| {
            out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
            out.extend_from_slice(bytes);
        };
        field(self.deal_id.as_bytes());
        field(self.deal_title.as_bytes());
        field(self.merchant.as_bytes());
        field(&self.discount_price.to_bits().to_le_bytes());
        field(self.expiry_date.to_string().as_bytes());
        field(self.redemption_type.as_bytes());
        field(
            self.nft_mint_address
                .map(|a| a.to_bytes().to_vec())
                .unwrap_or_default()
                .as_slice(),
        );
        field(
            self.transaction_signature
                .map(|s| s.as_bytes().to_vec())
                .unwrap_or_default()
                .as_slice(),
        );
        field(
            self.ticket_issued_at
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        field(self.expires_at.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
        out
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedRedemption {
    /// Deal identifier.
    pub deal_id: String,
    /// Deal title.
    pub deal_title: String,
    /// Merchant name.
    pub merchant: String,
    /// Price the customer pays.
    pub discount_price: f64,
    /// Token backing the deal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_mint_address: Option<Address>,
    /// Redemption ID.
    pub redemption_id: String,
    /// When verification happened.
    pub verified_at: DateTime<Utc>,
    /// When the ticket would have expired.
    pub expires_at: DateTime<Utc>,
}

/// 32-byte ticket MAC key.
#[derive(Clone, PartialEq, Eq)]
pub struct TicketKey([u8; 32]);

impl TicketKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a hex-encoded key.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not 32 bytes of hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| DealError::invalid_input(format!("ticket key is not hex: {e}")))?;
        let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            DealError::invalid_input(format!("ticket key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// Hex encoding of the key.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Publicly known key used when none is configured. Tickets under it are
    /// tamper-evident but anyone can forge them.
    #[must_use]
    pub fn unkeyed() -> Self {
        Self(blake3::derive_key(UNKEYED_CONTEXT, b""))
    }

    fn mac(&self, message: &[u8]) -> blake3::Hash {
        blake3::keyed_hash(&self.0, message)
    }
}

impl fmt::Debug for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TicketKey(..)")
    }
}

/// Issues and verifies redemption tickets.
#[derive(Debug, Clone)]
pub struct Ticketing {
    key: TicketKey,
    ttl: TimeDelta,
}

impl Ticketing {
    /// Create with an explicit key and lifetime.
    #[must_use]
    pub const fn new(key: TicketKey, ttl: TimeDelta) -> Self {
        Self { key, ttl }
    }

    /// Create from configuration. Without a configured key the fallback key
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns error if the key is malformed or the lifetime out of range.
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        let key = match &config.ticket_key {
            Some(hex) => TicketKey::from_hex(hex)?,
            None => {
                warn!("no ticket key configured; tickets can be forged");
                TicketKey::unkeyed()
            }
        };
        let ttl = TimeDelta::try_seconds(config.ticket_ttl_secs)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or_else(|| {
                DealError::invalid_input(format!(
                    "ticket lifetime out of range: {}s",
                    config.ticket_ttl_secs
                ))
            })?;
        Ok(Self::new(key, ttl))
    }

    /// Ticket lifetime.
    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Issue a ticket for `deal`, valid from now.
    pub fn issue(&self, deal: &DealRecord) -> OperationResult<RedemptionTicket> {
        self.issue_at(deal, Utc::now()).into()
    }

    /// Issue a ticket as of `now`.
    ///
    /// The ticket expires after the configured lifetime or at the end of the
    /// deal's expiry date, whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the record is incomplete or the deal has
    /// already expired.
    pub fn issue_at(&self, deal: &DealRecord, now: DateTime<Utc>) -> Result<RedemptionTicket> {
        deal.validate()?;
        let deal_end = deal
            .expiry_instant()
            .ok_or_else(|| DealError::invalid_input("expiry date out of range"))?;
        let expires_at = now
            .checked_add_signed(self.ttl)
            .map_or(deal_end, |end| end.min(deal_end));
        if expires_at <= now {
            return Err(DealError::invalid_input(format!(
                "deal {} expired on {}",
                deal.deal_id, deal.expiry_date
            )));
        }

        let mut ticket = RedemptionTicket {
            deal_id: deal.deal_id.clone(),
            deal_title: deal.deal_title.clone(),
            merchant: deal.merchant.clone(),
            discount_price: deal.discount_price,
            expiry_date: deal.expiry_date,
            redemption_type: deal.redemption_type.clone(),
            nft_mint_address: deal.nft_mint_address,
            transaction_signature: deal.transaction_signature,
            ticket_issued_at: now,
            expires_at,
            signature_payload: String::new(),
        };
        ticket.signature_payload = self.key.mac(&ticket.signed_bytes()).to_hex().to_string();
        debug!(deal_id = %ticket.deal_id, expires_at = %ticket.expires_at, "redemption ticket issued");
        Ok(ticket)
    }

    /// Verify `ticket` now.
    pub fn verify(&self, ticket: &RedemptionTicket) -> OperationResult<VerifiedRedemption> {
        self.verify_at(ticket, Utc::now()).into()
    }

    /// Parse and verify a ticket document.
    pub fn verify_json(&self, json: &str) -> OperationResult<VerifiedRedemption> {
        RedemptionTicket::from_json(json)
            .and_then(|ticket| self.verify_at(&ticket, Utc::now()))
            .into()
    }

    /// Verify `ticket` as of `now`.
    ///
    /// The MAC is checked before the expiry, so a ticket whose expiry was
    /// moved is reported as tampered rather than expired.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTicketFormat` on a malformed or mismatched MAC and
    /// `TicketExpired` once `expires_at` has passed.
    pub fn verify_at(&self, ticket: &RedemptionTicket, now: DateTime<Utc>) -> Result<VerifiedRedemption> {
        let presented = blake3::Hash::from_hex(ticket.signature_payload.as_bytes())
            .map_err(|_| DealError::invalid_ticket("signature payload is not a 32-byte hex digest"))?;
        if presented.to_hex().as_str() != ticket.signature_payload {
            return Err(DealError::invalid_ticket("signature payload is not lowercase hex"));
        }
        // blake3::Hash equality is constant-time.
        if presented != self.key.mac(&ticket.signed_bytes()) {
            warn!(deal_id = %ticket.deal_id, "redemption ticket signature mismatch");
            return Err(DealError::invalid_ticket("signature payload does not match ticket contents"));
        }
        if ticket.expires_at <= now {
            return Err(DealError::TicketExpired {
                expired_at: ticket.expires_at,
            });
        }
        debug!(deal_id = %ticket.deal_id, "redemption ticket verified");
        Ok(VerifiedRedemption {
            deal_id: ticket.deal_id.clone(),
            deal_title: ticket.deal_title.clone(),
            merchant: ticket.merchant.clone(),
            discount_price: ticket.discount_price,
            nft_mint_address: ticket.nft_mint_address,
            redemption_id: ticket.redemption_id(),
            verified_at: now,
            expires_at: ticket.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use proptest::prelude::*;

    fn deal() -> DealRecord {
        DealRecord {
            deal_id: "deal-42".to_string(),
            deal_title: "50% Off Pizza".to_string(),
            merchant: "Joe's".to_string(),
            discount_price: 10.0,
            expiry_date: NaiveDate::from_ymd_opt(2025, 8, 1).expect("date"),
            redemption_type: DEFAULT_REDEMPTION_TYPE.to_string(),
            nft_mint_address: Some(Address::new([3; 32])),
            transaction_signature: None,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).expect("timestamp").with_timezone(&Utc)
    }

    fn ticketing() -> Ticketing {
        Ticketing::new(TicketKey::new([7; 32]), TimeDelta::hours(24))
    }

    #[test]
    fn test_issue_then_verify() {
        let t = ticketing();
        let issued = at("2025-07-01T12:00:00Z");
        let ticket = t.issue_at(&deal(), issued).expect("issue");
        assert_eq!(ticket.expires_at, at("2025-07-02T12:00:00Z"));
        assert_eq!(ticket.signature_payload.len(), 64);

        let verified = t
            .verify_at(&ticket, at("2025-07-01T18:00:00Z"))
            .expect("verify");
        assert_eq!(verified.deal_id, "deal-42");
        assert_eq!(verified.merchant, "Joe's");
        assert!(verified.redemption_id.starts_with("redeem-deal-42-"));
    }

    #[test]
    fn test_verify_after_expiry() {
        let t = ticketing();
        let ticket = t.issue_at(&deal(), at("2025-07-01T12:00:00Z")).expect("issue");
        let err = t
            .verify_at(&ticket, at("2025-07-02T12:00:00Z"))
            .expect_err("expired");
        assert_eq!(err.kind(), ErrorKind::TicketExpired);
    }

    #[test]
    fn test_expiry_capped_by_deal_date() {
        let t = ticketing();
        let ticket = t.issue_at(&deal(), at("2025-08-01T20:00:00Z")).expect("issue");
        assert_eq!(ticket.expires_at, at("2025-08-02T00:00:00Z"));
    }

    #[test]
    fn test_issue_rejects_expired_deal() {
        let err = ticketing()
            .issue_at(&deal(), at("2025-08-02T00:00:00Z"))
            .expect_err("deal over");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_issue_rejects_missing_id() {
        let mut record = deal();
        record.deal_id = "  ".to_string();
        let result = ticketing().issue(&record);
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidInput));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let ticket = ticketing()
            .issue_at(&deal(), at("2025-07-01T12:00:00Z"))
            .expect("issue");
        let other = Ticketing::new(TicketKey::new([8; 32]), TimeDelta::hours(24));
        let err = other
            .verify_at(&ticket, at("2025-07-01T13:00:00Z"))
            .expect_err("wrong key");
        assert_eq!(err.kind(), ErrorKind::InvalidTicketFormat);
    }

    #[test]
    fn test_moved_expiry_is_tamper_not_expiry() {
        let t = ticketing();
        let mut ticket = t.issue_at(&deal(), at("2025-07-01T12:00:00Z")).expect("issue");
        ticket.expires_at = at("2025-07-01T12:30:00Z");
        let err = t
            .verify_at(&ticket, at("2025-07-01T13:00:00Z"))
            .expect_err("tampered");
        assert_eq!(err.kind(), ErrorKind::InvalidTicketFormat);
    }

    #[test]
    fn test_json_document_shape() {
        let ticket = ticketing()
            .issue_at(&deal(), at("2025-07-01T12:00:00Z"))
            .expect("issue");
        let json: serde_json::Value =
            serde_json::from_str(&ticket.to_json().expect("json")).expect("parse");
        for key in [
            "dealId",
            "dealTitle",
            "merchant",
            "discountPrice",
            "expiryDate",
            "redemptionType",
            "ticketIssuedAt",
            "expiresAt",
            "signaturePayload",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["redemptionType"], "QR");
        assert_eq!(json["expiryDate"], "2025-08-01");
    }

    #[test]
    fn test_json_round_trip_still_verifies() {
        let t = ticketing();
        let ticket = t
            .issue_at(&deal(), at("2025-07-01T12:00:00.123456789Z"))
            .expect("issue");
        let parsed = RedemptionTicket::from_json(&ticket.to_json().expect("json")).expect("parse");
        assert_eq!(parsed, ticket);
        assert!(t.verify_at(&parsed, at("2025-07-01T13:00:00Z")).is_ok());
    }

    #[test]
    fn test_malformed_documents() {
        let t = ticketing();
        let result = t.verify_json("{\"dealId\": \"x\"}");
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidTicketFormat));

        let mut ticket = t.issue_at(&deal(), at("2025-07-01T12:00:00Z")).expect("issue");
        ticket.signature_payload = "not-hex".to_string();
        let err = t
            .verify_at(&ticket, at("2025-07-01T12:00:01Z"))
            .expect_err("malformed payload");
        assert_eq!(err.kind(), ErrorKind::InvalidTicketFormat);
    }

    #[test]
    fn test_deal_record_defaults_redemption_type() {
        let record: DealRecord = serde_json::from_str(
            r#"{"id":"d1","dealTitle":"t","merchant":"m","discountPrice":5,"expiryDate":"2030-01-01"}"#,
        )
        .expect("parse");
        assert_eq!(record.deal_id, "d1");
        assert_eq!(record.redemption_type, "QR");
    }

    #[test]
    fn test_key_hex() {
        let key = TicketKey::generate();
        assert_eq!(TicketKey::from_hex(&key.to_hex()).expect("hex"), key);
        assert!(TicketKey::from_hex("abcd").is_err());
        assert_eq!(format!("{key:?}"), "TicketKey(..)");
    }

    #[test]
    fn test_from_config() {
        let mut config = CoreConfig::default();
        config.ticket_key = Some(hex::encode([1u8; 32]));
        config.ticket_ttl_secs = 3600;
        let t = Ticketing::from_config(&config).expect("config");
        assert_eq!(t.ttl(), TimeDelta::hours(1));

        config.ticket_key = None;
        assert!(Ticketing::from_config(&config).is_ok());
    }

    #[test]
    fn test_uppercased_payload_is_rejected() {
        let t = ticketing();
        let mut ticket = t.issue_at(&deal(), at("2025-07-01T12:00:00Z")).expect("issue");
        let original = ticket.signature_payload.clone();
        ticket.signature_payload = original.to_uppercase();
        assert_ne!(ticket.signature_payload, original);

        let err = t.verify_at(&ticket, at("2025-07-01T12:00:01Z")).expect_err("altered case");
        assert_eq!(err.kind(), ErrorKind::InvalidTicketFormat);
    }

    fn tamper(ticket: &mut RedemptionTicket, field: usize, text: &str) {
        let altered = |s: &str| format!("{s}{text}");
        match field {
            0 => ticket.deal_id = altered(&ticket.deal_id),
            1 => ticket.deal_title = altered(&ticket.deal_title),
            2 => ticket.merchant = altered(&ticket.merchant),
            3 => ticket.discount_price += 0.01,
            4 => {
                ticket.expiry_date = ticket.expiry_date.succ_opt().expect("date");
            }
            5 => ticket.redemption_type = altered(&ticket.redemption_type),
            6 => ticket.nft_mint_address = Some(Address::new([4; 32])),
            7 => ticket.transaction_signature = Some(Signature::new([5; 64])),
            8 => ticket.ticket_issued_at += TimeDelta::nanoseconds(1),
            9 => ticket.expires_at -= TimeDelta::seconds(1),
            10 => ticket.signature_payload = ticket.signature_payload.chars().rev().collect(),
            _ => ticket.signature_payload = ticket.signature_payload.to_uppercase(),
        }
    }

    proptest! {
        #[test]
        fn prop_any_single_field_change_is_detected(field in 0usize..12, text in "[a-z0-9]{1,8}") {
            let t = ticketing();
            let mut ticket = t.issue_at(&deal(), at("2025-07-01T12:00:00Z")).expect("issue");
            tamper(&mut ticket, field, &text);
            let err = t.verify_at(&ticket, at("2025-07-01T12:00:01Z")).expect_err("tampered");
            prop_assert_eq!(err.kind(), ErrorKind::InvalidTicketFormat);
        }

        #[test]
        fn prop_round_trip_before_expiry(
            id in "[a-z0-9-]{1,24}",
            price in 0.0f64..10_000.0,
            offset_secs in 0i64..86_399,
        ) {
            let t = ticketing();
            let mut record = deal();
            record.deal_id = id;
            record.discount_price = price;
            let issued = at("2025-07-01T00:00:00Z");
            let ticket = t.issue_at(&record, issued).expect("issue");
            let verified = t.verify_at(&ticket, issued + TimeDelta::seconds(offset_secs));
            prop_assert!(verified.is_ok());
        }
    }
}

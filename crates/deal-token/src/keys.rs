//! Ledger identifiers and keys.
//!
//! Addresses are Ed25519 public keys (or program-derived addresses), shown as
//! base58 text. [`Keypair`] holds signing material and is never serialized.

use crate::error::{DealError, Result};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A 32-byte ledger address, displayed as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 32]);

impl Address {
    /// Create an address from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a base58-encoded address.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error if the string is not base58 or does not
    /// decode to exactly 32 bytes.
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| DealError::invalid_input(format!("invalid base58 address {s:?}: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Create an address from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns error if the slice is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            DealError::invalid_input(format!("address must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get the raw bytes by value.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Whether these bytes decompress to a point on the Ed25519 curve.
    ///
    /// Program-derived addresses are required to be off-curve so that no
    /// private key can exist for them.
    #[must_use]
    pub fn is_on_curve(&self) -> bool {
        VerifyingKey::from_bytes(&self.0).is_ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base58(s)
    }
}

impl TryFrom<String> for Address {
    type Error = DealError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_base58(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// A 64-byte Ed25519 transaction signature, displayed as base58.
///
/// The first signature of a transaction is its identifier on the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature([u8; 64]);

impl Signature {
    /// Create a signature from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Parse a base58-encoded signature.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not base58 or not 64 bytes.
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| DealError::invalid_input(format!("invalid base58 signature: {e}")))?;
        let array: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            DealError::invalid_input(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// A random stand-in used when no wallet can sign in simulated mode.
    #[must_use]
    pub fn placeholder() -> Self {
        let mut bytes = [0u8; 64];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// An all-zero slot that has not been signed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 64]
    }

    /// Verify this signature over `message` for `signer`.
    #[must_use]
    pub fn verify(&self, signer: &Address, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&self.0);
        key.verify(message, &sig).is_ok()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base58(s)
    }
}

impl TryFrom<String> for Signature {
    type Error = DealError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_base58(&s)
    }
}

impl From<Signature> for String {
    fn from(signature: Signature) -> Self {
        signature.to_string()
    }
}

/// A recent block hash referenced by a transaction message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Blockhash([u8; 32]);

impl Blockhash {
    /// Create a blockhash from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a base58-encoded blockhash.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not base58 or not 32 bytes.
    pub fn from_base58(s: &str) -> Result<Self> {
        Address::from_base58(s).map(|a| Self(a.to_bytes()))
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({self})")
    }
}

impl TryFrom<String> for Blockhash {
    type Error = DealError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_base58(&s)
    }
}

impl From<Blockhash> for String {
    fn from(hash: Blockhash) -> Self {
        hash.to_string()
    }
}

/// An Ed25519 keypair.
pub struct Keypair {
    signing_key: SigningKey,
    address: Address,
}

impl Keypair {
    /// Generate a new random keypair seeded from `OsRng`.
    #[must_use]
    pub fn generate() -> Self {
        let mut secret_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        Self::from_signing_key(SigningKey::from_bytes(&secret_bytes))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::new(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Create a keypair from a 32-byte secret seed.
    ///
    /// # Errors
    ///
    /// Returns error if the seed is not 32 bytes.
    pub fn from_secret_key(secret: &[u8]) -> Result<Self> {
        let secret_array: [u8; 32] = secret.try_into().map_err(|_| {
            DealError::invalid_input(format!("secret key must be 32 bytes, got {}", secret.len()))
        })?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&secret_array)))
    }

    /// Load a keypair from a JSON file (Solana CLI format: 64 bytes,
    /// secret seed followed by public key).
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, malformed, or its public half
    /// does not match the secret.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let bytes: Vec<u8> = serde_json::from_str(&contents)?;

        if bytes.len() != 64 {
            return Err(DealError::invalid_input(format!(
                "keypair file must contain 64 bytes, got {}",
                bytes.len()
            )));
        }

        let keypair = Self::from_secret_key(&bytes[..32])?;
        if keypair.address.as_bytes()[..] != bytes[32..] {
            return Err(DealError::invalid_input(
                "keypair file public key does not match its secret key",
            ));
        }
        Ok(keypair)
    }

    /// Save the keypair to a JSON file (Solana CLI format).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(self.signing_key.as_bytes());
        bytes.extend_from_slice(self.address.as_bytes());

        let json = serde_json::to_string(&bytes)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// The public address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Sign a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(message).to_bytes())
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_address_roundtrip() {
        let keypair = Keypair::generate();
        let text = keypair.address().to_string();
        let parsed = Address::from_base58(&text).expect("should parse");
        assert_eq!(keypair.address(), parsed);
    }

    #[test]
    fn test_system_program_address_is_all_ones() {
        assert_eq!(
            Address::new([0u8; 32]).to_string(),
            "11111111111111111111111111111111"
        );
    }

    #[test]
    fn test_invalid_address() {
        assert!(Address::from_base58("invalid!").is_err());
        assert!(Address::from_base58("abc").is_err());
        assert!(Address::from_base58("").is_err());
    }

    #[test]
    fn test_address_serializes_as_base58() {
        let keypair = Keypair::generate();
        let json = serde_json::to_string(&keypair.address()).expect("serialize");
        assert_eq!(json, format!("\"{}\"", keypair.address()));
        let parsed: Address = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, keypair.address());
    }

    #[test]
    fn test_address_deserialize_rejects_garbage() {
        let result: std::result::Result<Address, _> = serde_json::from_str("\"not-an-address\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_generated_keys_are_on_curve() {
        assert!(Keypair::generate().address().is_on_curve());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::generate();
        let sig = keypair.sign(b"deal");
        assert!(sig.verify(&keypair.address(), b"deal"));
        assert!(!sig.verify(&keypair.address(), b"other"));
        assert!(!sig.verify(&Keypair::generate().address(), b"deal"));
    }

    #[test]
    fn test_signature_roundtrip() {
        let sig = Keypair::generate().sign(b"x");
        let parsed = Signature::from_base58(&sig.to_string()).expect("should parse");
        assert_eq!(sig, parsed);
        assert!(Signature::from_base58("abc").is_err());
    }

    #[test]
    fn test_placeholder_is_not_empty() {
        assert!(Signature::default().is_empty());
        assert!(!Signature::placeholder().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let keypair = Keypair::generate();
        let file = NamedTempFile::new().expect("temp file");
        keypair.save(file.path()).expect("should save");
        let loaded = Keypair::from_file(file.path()).expect("should load");
        assert_eq!(keypair.address(), loaded.address());
    }

    #[test]
    fn test_load_rejects_mismatched_public_half() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let mut bytes = keypair.signing_key.as_bytes().to_vec();
        bytes.extend_from_slice(other.address().as_bytes());
        let file = NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), serde_json::to_string(&bytes).expect("json")).expect("write");
        assert!(Keypair::from_file(file.path()).is_err());
    }

    #[test]
    fn test_from_file_not_found() {
        assert!(Keypair::from_file("/nonexistent/path/id.json").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let keypair = Keypair::generate();
        let debug = format!("{keypair:?}");
        assert!(debug.contains("REDACTED"));
    }
}

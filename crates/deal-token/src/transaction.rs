//! Ledger transactions: message compilation, signing and wire encoding.
//!
//! A transaction is a compiled [`Message`] plus one signature slot per
//! required signer. Slots start empty; each signer fills its own slot, so a
//! transaction can be partially signed locally and then handed to a wallet
//! for the remaining signature.
//!
//! Wire layout (legacy format):
//!
//! ```text
//! shortvec(n) ‖ n × 64-byte signatures ‖ message
//! message = header(3) ‖ shortvec(k) ‖ k × 32-byte keys ‖ blockhash(32)
//!         ‖ shortvec(m) ‖ m × (program index ‖ shortvec(a) ‖ a × u8 ‖ shortvec(d) ‖ d bytes)
//! ```

use crate::error::{DealError, Result};
use crate::instruction::Instruction;
use crate::keys::{Address, Blockhash, Keypair, Signature};
use serde::{Deserialize, Serialize};

/// Append a compact-u16 length prefix.
fn encode_len(out: &mut Vec<u8>, len: usize) {
    let mut rem = len as u16;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Read-side cursor over a wire buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| DealError::invalid_input("transaction truncated"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn len(&mut self) -> Result<usize> {
        let mut value: usize = 0;
        for shift in [0, 7, 14] {
            let byte = self.byte()?;
            value |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DealError::invalid_input("compact length longer than 3 bytes"))
    }

    /// A compact length counting items of at least `min_item_len` bytes,
    /// rejected up front if the remaining input cannot hold that many.
    fn count(&mut self, min_item_len: usize) -> Result<usize> {
        let count = self.len()?;
        let remaining = self.data.len() - self.pos;
        if count.saturating_mul(min_item_len) > remaining {
            return Err(DealError::invalid_input(format!(
                "transaction truncated: {count} items declared, {remaining} bytes left"
            )));
        }
        Ok(count)
    }

    fn address(&mut self) -> Result<Address> {
        Address::from_slice(self.take(32)?)
    }

    const fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Counts that classify the message's account keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Leading keys that must sign.
    pub num_required_signatures: u8,
    /// Trailing keys among the signers that are read-only.
    pub num_readonly_signed: u8,
    /// Trailing keys among the non-signers that are read-only.
    pub num_readonly_unsigned: u8,
}

/// An instruction with accounts replaced by key indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledInstruction {
    /// Index of the program id in the key list.
    pub program_id_index: u8,
    /// Indices of the instruction's accounts.
    pub accounts: Vec<u8>,
    /// Instruction data.
    pub data: Vec<u8>,
}

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Signer/writability counts.
    pub header: MessageHeader,
    /// All referenced accounts; the fee payer is first.
    pub account_keys: Vec<Address>,
    /// Recent blockhash bounding the transaction's lifetime.
    pub recent_blockhash: Blockhash,
    /// Compiled instructions, executed in order.
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Clone, Copy)]
struct KeyFlags {
    address: Address,
    is_signer: bool,
    is_writable: bool,
}

impl Message {
    /// Compile instructions into a message paid for by `payer`.
    ///
    /// Keys are deduplicated (flags merged) and ordered: payer, writable
    /// signers, read-only signers, writable non-signers, read-only
    /// non-signers. Within a group, first appearance wins.
    ///
    /// # Errors
    ///
    /// Returns error if more than 256 distinct accounts are referenced.
    pub fn compile(
        payer: &Address,
        instructions: &[Instruction],
        recent_blockhash: Blockhash,
    ) -> Result<Self> {
        let mut keys: Vec<KeyFlags> = vec![KeyFlags {
            address: *payer,
            is_signer: true,
            is_writable: true,
        }];
        let mut upsert = |address: Address, is_signer: bool, is_writable: bool| {
            if let Some(existing) = keys.iter_mut().find(|k| k.address == address) {
                existing.is_signer |= is_signer;
                existing.is_writable |= is_writable;
            } else {
                keys.push(KeyFlags {
                    address,
                    is_signer,
                    is_writable,
                });
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.address, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        let rank = |k: &KeyFlags| match (k.is_signer, k.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        // Payer stays at index 0; stable sort keeps first-appearance order.
        keys[1..].sort_by_key(rank);

        if keys.len() > 256 {
            return Err(DealError::invalid_input(format!(
                "transaction references {} accounts, limit is 256",
                keys.len()
            )));
        }

        let header = MessageHeader {
            num_required_signatures: keys.iter().filter(|k| k.is_signer).count() as u8,
            num_readonly_signed: keys.iter().filter(|k| k.is_signer && !k.is_writable).count()
                as u8,
            num_readonly_unsigned: keys
                .iter()
                .filter(|k| !k.is_signer && !k.is_writable)
                .count() as u8,
        };
        let account_keys: Vec<Address> = keys.iter().map(|k| k.address).collect();
        let index_of = |address: &Address| -> u8 {
            account_keys
                .iter()
                .position(|k| k == address)
                .map_or(0, |i| i as u8)
        };

        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.address)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// The fee payer.
    #[must_use]
    pub fn payer(&self) -> Option<&Address> {
        self.account_keys.first()
    }

    /// Keys that must sign, in slot order.
    #[must_use]
    pub fn signer_keys(&self) -> &[Address] {
        let n = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    /// Whether the key at `index` must sign.
    #[must_use]
    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    /// Whether the key at `index` may be written.
    #[must_use]
    pub fn is_writable(&self, index: usize) -> bool {
        let signers = usize::from(self.header.num_required_signatures);
        if index < signers {
            index < signers - usize::from(self.header.num_readonly_signed)
        } else {
            index < self.account_keys.len() - usize::from(self.header.num_readonly_unsigned)
        }
    }

    /// Encode the message bytes that signers sign.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + 32 * (self.account_keys.len() + 1) + 64);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed);
        out.push(self.header.num_readonly_unsigned);
        encode_len(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());
        encode_len(&mut out, self.instructions.len());
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_len(&mut out, ix.accounts.len());
            out.extend_from_slice(&ix.accounts);
            encode_len(&mut out, ix.data.len());
            out.extend_from_slice(&ix.data);
        }
        out
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let header = MessageHeader {
            num_required_signatures: reader.byte()?,
            num_readonly_signed: reader.byte()?,
            num_readonly_unsigned: reader.byte()?,
        };
        let key_count = reader.count(32)?;
        let account_keys = (0..key_count)
            .map(|_| reader.address())
            .collect::<Result<Vec<_>>>()?;
        let recent_blockhash = Blockhash::new(reader.address()?.to_bytes());
        // program index plus two empty compact lengths
        let ix_count = reader.count(3)?;
        let mut instructions = Vec::with_capacity(ix_count);
        for _ in 0..ix_count {
            let program_id_index = reader.byte()?;
            let n = reader.len()?;
            let accounts = reader.take(n)?.to_vec();
            let n = reader.len()?;
            let data = reader.take(n)?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        let message = Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        };
        message.sanitize()?;
        Ok(message)
    }

    /// Reject messages whose header or indices point outside the key list.
    fn sanitize(&self) -> Result<()> {
        let keys = self.account_keys.len();
        let signers = usize::from(self.header.num_required_signatures);
        if signers == 0 || signers > keys {
            return Err(DealError::invalid_input("message signer count out of range"));
        }
        if usize::from(self.header.num_readonly_signed) >= signers {
            return Err(DealError::invalid_input("fee payer must be writable"));
        }
        if usize::from(self.header.num_readonly_unsigned) > keys - signers {
            return Err(DealError::invalid_input("read-only count out of range"));
        }
        let in_range = |i: &u8| usize::from(*i) < keys;
        if !self
            .instructions
            .iter()
            .all(|ix| in_range(&ix.program_id_index) && ix.accounts.iter().all(in_range))
        {
            return Err(DealError::invalid_input("instruction index out of range"));
        }
        Ok(())
    }
}

/// A message plus its signature slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    signatures: Vec<Signature>,
    message: Message,
}

impl Transaction {
    /// Wrap a message with empty signature slots.
    #[must_use]
    pub fn new_unsigned(message: Message) -> Self {
        let slots = usize::from(message.header.num_required_signatures);
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    /// Compile instructions and wrap them unsigned.
    ///
    /// # Errors
    ///
    /// Propagates message compilation errors.
    pub fn build(
        payer: &Address,
        instructions: &[Instruction],
        recent_blockhash: Blockhash,
    ) -> Result<Self> {
        Message::compile(payer, instructions, recent_blockhash).map(Self::new_unsigned)
    }

    /// The compiled message.
    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    /// All signature slots.
    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// The transaction id: the fee payer's signature, once present.
    #[must_use]
    pub fn signature(&self) -> Option<Signature> {
        self.signatures.first().copied().filter(|s| !s.is_empty())
    }

    /// Fill the slot belonging to `keypair`.
    ///
    /// # Errors
    ///
    /// Returns error if the keypair is not a required signer.
    pub fn partial_sign(&mut self, keypair: &Keypair) -> Result<()> {
        let signature = keypair.sign(&self.message.serialize());
        self.add_signature(&keypair.address(), signature)
    }

    /// Place an externally produced signature in `signer`'s slot.
    ///
    /// # Errors
    ///
    /// Returns error if `signer` is not a required signer.
    pub fn add_signature(&mut self, signer: &Address, signature: Signature) -> Result<()> {
        let slot = self
            .message
            .signer_keys()
            .iter()
            .position(|k| k == signer)
            .ok_or_else(|| {
                DealError::invalid_input(format!("{signer} is not a required signer"))
            })?;
        self.signatures[slot] = signature;
        Ok(())
    }

    /// Signers whose slots are still empty.
    #[must_use]
    pub fn missing_signers(&self) -> Vec<Address> {
        self.message
            .signer_keys()
            .iter()
            .zip(&self.signatures)
            .filter(|(_, sig)| sig.is_empty())
            .map(|(key, _)| *key)
            .collect()
    }

    /// Every required slot is filled.
    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(|s| !s.is_empty())
    }

    /// Every slot holds a valid signature by its signer over the message.
    #[must_use]
    pub fn verify_signatures(&self) -> bool {
        let bytes = self.message.serialize();
        self.signatures.len() == self.message.signer_keys().len()
            && self
                .message
                .signer_keys()
                .iter()
                .zip(&self.signatures)
                .all(|(key, sig)| sig.verify(key, &bytes))
    }

    /// Encode for submission.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let message = self.message.serialize();
        let mut out = Vec::with_capacity(1 + 64 * self.signatures.len() + message.len());
        encode_len(&mut out, self.signatures.len());
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend_from_slice(&message);
        out
    }

    /// Decode a wire-format transaction.
    ///
    /// # Errors
    ///
    /// Returns error on truncation, trailing bytes, or an inconsistent
    /// header.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let count = reader.count(64)?;
        let mut signatures = Vec::with_capacity(count);
        for _ in 0..count {
            let raw: [u8; 64] = reader
                .take(64)?
                .try_into()
                .map_err(|_| DealError::invalid_input("signature truncated"))?;
            signatures.push(Signature::new(raw));
        }
        let message = Message::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(DealError::invalid_input("trailing bytes after transaction"));
        }
        if signatures.len() != usize::from(message.header.num_required_signatures) {
            return Err(DealError::invalid_input(
                "signature count does not match message header",
            ));
        }
        Ok(Self {
            signatures,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs::{system, token};

    fn blockhash() -> Blockhash {
        Blockhash::new([42; 32])
    }

    #[test]
    fn test_encode_len() {
        let cases: [(usize, &[u8]); 5] = [
            (0, &[0x00]),
            (0x7f, &[0x7f]),
            (0x80, &[0x80, 0x01]),
            (0x3fff, &[0xff, 0x7f]),
            (0x4000, &[0x80, 0x80, 0x01]),
        ];
        for (len, expected) in cases {
            let mut out = Vec::new();
            encode_len(&mut out, len);
            assert_eq!(out, expected, "len {len}");
            assert_eq!(Reader::new(&out).len().expect("decode"), len);
        }
    }

    #[test]
    fn test_compile_orders_keys() {
        let payer = Keypair::generate().address();
        let mint = Keypair::generate().address();
        let ixs = [
            system::create_account(&payer, &mint, 1_461_600, 82, &token::ID),
            token::initialize_mint(&mint, 0, &payer, Some(&payer)),
        ];
        let message = Message::compile(&payer, &ixs, blockhash()).expect("compile");

        assert_eq!(message.account_keys[0], payer);
        assert_eq!(message.account_keys[1], mint);
        assert_eq!(message.header.num_required_signatures, 2);
        assert_eq!(message.header.num_readonly_signed, 0);
        // system program, rent sysvar, token program
        assert_eq!(message.header.num_readonly_unsigned, 3);
        assert!(message.is_writable(0));
        assert!(message.is_writable(1));
        assert!(!message.is_writable(2));
        assert_eq!(message.signer_keys(), &[payer, mint]);
    }

    #[test]
    fn test_readonly_signer_is_demoted_below_writable_signers() {
        let payer = Keypair::generate().address();
        let authority = Keypair::generate().address();
        let mint = Keypair::generate().address();
        let ata = Keypair::generate().address();
        let ix = token::mint_to(&mint, &ata, &authority, 1);
        let message = Message::compile(&payer, &[ix], blockhash()).expect("compile");
        assert_eq!(message.signer_keys(), &[payer, authority]);
        assert_eq!(message.header.num_readonly_signed, 1);
        assert!(!message.is_writable(1));
        assert!(message.is_writable(2));
    }

    #[test]
    fn test_partial_sign_then_complete() {
        let payer = Keypair::generate();
        let mint = Keypair::generate();
        let ixs = [system::create_account(
            &payer.address(),
            &mint.address(),
            1,
            82,
            &token::ID,
        )];
        let mut tx = Transaction::build(&payer.address(), &ixs, blockhash()).expect("build");

        tx.partial_sign(&mint).expect("mint signs");
        assert!(!tx.is_fully_signed());
        assert_eq!(tx.missing_signers(), vec![payer.address()]);
        assert!(tx.signature().is_none());

        tx.partial_sign(&payer).expect("payer signs");
        assert!(tx.is_fully_signed());
        assert!(tx.verify_signatures());
        assert!(tx.signature().is_some());
    }

    #[test]
    fn test_sign_by_stranger_rejected() {
        let payer = Keypair::generate();
        let mut tx = Transaction::build(
            &payer.address(),
            &[system::transfer(&payer.address(), &Keypair::generate().address(), 5)],
            blockhash(),
        )
        .expect("build");
        assert!(tx.partial_sign(&Keypair::generate()).is_err());
    }

    #[test]
    fn test_wire_roundtrip_preserves_signatures() {
        let payer = Keypair::generate();
        let to = Keypair::generate().address();
        let mut tx = Transaction::build(
            &payer.address(),
            &[system::transfer(&payer.address(), &to, 1000)],
            blockhash(),
        )
        .expect("build");
        tx.partial_sign(&payer).expect("sign");

        let decoded = Transaction::deserialize(&tx.serialize()).expect("decode");
        assert_eq!(decoded, tx);
        assert!(decoded.verify_signatures());
    }

    #[test]
    fn test_tampered_message_fails_verification() {
        let payer = Keypair::generate();
        let to = Keypair::generate().address();
        let mut tx = Transaction::build(
            &payer.address(),
            &[system::transfer(&payer.address(), &to, 1000)],
            blockhash(),
        )
        .expect("build");
        tx.partial_sign(&payer).expect("sign");

        let mut wire = tx.serialize();
        let last = wire.len() - 1;
        wire[last] ^= 0xff;
        let decoded = Transaction::deserialize(&wire).expect("still well-formed");
        assert!(!decoded.verify_signatures());
    }

    #[test]
    fn test_deserialize_rejects_truncation_and_trailing_bytes() {
        let payer = Keypair::generate();
        let tx = Transaction::build(
            &payer.address(),
            &[system::transfer(&payer.address(), &payer.address(), 0)],
            blockhash(),
        )
        .expect("build");
        let wire = tx.serialize();
        assert!(Transaction::deserialize(&wire[..wire.len() - 1]).is_err());
        let mut extended = wire.clone();
        extended.push(0);
        assert!(Transaction::deserialize(&extended).is_err());
    }

    #[test]
    fn test_deserialize_rejects_counts_larger_than_input() {
        let huge = [0xff, 0xff, 0x7f];
        let err = Transaction::deserialize(&huge).expect_err("signature count");
        assert!(err.to_string().contains("items declared"));

        // no signatures, empty header and key list, zero blockhash
        let mut wire = vec![0, 1, 0, 0, 0];
        wire.extend_from_slice(&[0u8; 32]);
        wire.extend_from_slice(&huge);
        let err = Transaction::deserialize(&wire).expect_err("instruction count");
        assert!(err.to_string().contains("items declared"));
    }
}

//! Instruction builders for the on-ledger programs this crate drives.
//!
//! - [`system`]: account creation and lamport transfers
//! - [`token`]: SPL token mint/account operations
//! - [`associated_token`]: deterministic per-owner token accounts
//!
//! Encodings follow the programs' native layouts (little-endian integers,
//! `COption` as a one-byte tag inside instruction data).

use crate::error::{DealError, Result};
use crate::instruction::{AccountMeta, Instruction};
use crate::keys::Address;
use sha2::{Digest, Sha256};

/// Marker appended to every program-derived address preimage.
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum number of seeds for a derived address.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

/// Per-account storage overhead counted by the rent calculation.
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

/// Default lamports per byte-year.
const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;

/// Years of rent an account must hold to be exempt.
const EXEMPTION_THRESHOLD_YEARS: u64 = 2;

/// Rent sysvar address (`SysvarRent111111111111111111111111111111111`).
pub const RENT_SYSVAR_ID: Address = Address::new([
    6, 167, 213, 23, 25, 44, 92, 81, 33, 140, 201, 76, 61, 74, 241, 127, 88, 218, 238, 8, 155,
    161, 253, 68, 227, 219, 217, 138, 0, 0, 0, 0,
]);

/// Minimum balance for an account of `data_len` bytes to be rent-exempt
/// under default cluster rent parameters.
#[must_use]
pub const fn rent_exempt_minimum(data_len: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + data_len as u64) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_THRESHOLD_YEARS
}

/// Hash `seeds ‖ program_id ‖ marker` into a candidate address.
///
/// # Errors
///
/// Returns error if the seeds exceed the limits or the result lands on the
/// curve (and could therefore have a private key).
pub fn create_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<Address> {
    if seeds.len() > MAX_SEEDS {
        return Err(DealError::invalid_input(format!(
            "at most {MAX_SEEDS} seeds allowed, got {}",
            seeds.len()
        )));
    }
    if seeds.iter().any(|s| s.len() > MAX_SEED_LEN) {
        return Err(DealError::invalid_input(format!(
            "seed longer than {MAX_SEED_LEN} bytes"
        )));
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    let hash: [u8; 32] = hasher.finalize().into();

    let address = Address::new(hash);
    if address.is_on_curve() {
        return Err(DealError::invalid_input("derived address is on the curve"));
    }
    Ok(address)
}

/// Find the first off-curve derived address, searching bump seeds from 255
/// downward.
///
/// # Errors
///
/// Returns error if no bump seed yields a valid address (probability ~2^-256)
/// or the seeds exceed the limits.
pub fn find_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<(Address, u8)> {
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(_) if seeds.len() < MAX_SEEDS => {}
            Err(e) => return Err(e),
        }
    }
    Err(DealError::invalid_input(
        "unable to find a viable program address bump seed",
    ))
}

/// System program: account creation and native transfers.
pub mod system {
    use super::{AccountMeta, Address, Instruction};

    /// System program id (`11111111111111111111111111111111`).
    pub const ID: Address = Address::new([0u8; 32]);

    /// Instruction discriminants (u32 little-endian).
    pub const CREATE_ACCOUNT: u32 = 0;
    /// Transfer discriminant.
    pub const TRANSFER: u32 = 2;

    /// Fund and allocate `new_account`, assigning it to `owner`.
    ///
    /// Both `from` and `new_account` must sign.
    #[must_use]
    pub fn create_account(
        from: &Address,
        new_account: &Address,
        lamports: u64,
        space: u64,
        owner: &Address,
    ) -> Instruction {
        let mut data = Vec::with_capacity(52);
        data.extend_from_slice(&CREATE_ACCOUNT.to_le_bytes());
        data.extend_from_slice(&lamports.to_le_bytes());
        data.extend_from_slice(&space.to_le_bytes());
        data.extend_from_slice(owner.as_bytes());
        Instruction::new(
            ID,
            vec![
                AccountMeta::writable(*from, true),
                AccountMeta::writable(*new_account, true),
            ],
            data,
        )
    }

    /// Move `lamports` from `from` to `to`.
    #[must_use]
    pub fn transfer(from: &Address, to: &Address, lamports: u64) -> Instruction {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&TRANSFER.to_le_bytes());
        data.extend_from_slice(&lamports.to_le_bytes());
        Instruction::new(
            ID,
            vec![
                AccountMeta::writable(*from, true),
                AccountMeta::writable(*to, false),
            ],
            data,
        )
    }
}

/// SPL token program.
pub mod token {
    use super::{AccountMeta, Address, Instruction, RENT_SYSVAR_ID};

    /// Token program id (`TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`).
    pub const ID: Address = Address::new([
        6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
        237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
    ]);

    /// Size of a mint account.
    pub const MINT_LEN: usize = 82;

    /// Size of a token account.
    pub const ACCOUNT_LEN: usize = 165;

    /// Instruction tags.
    pub const INITIALIZE_MINT: u8 = 0;
    /// Transfer tag.
    pub const TRANSFER: u8 = 3;
    /// Set-authority tag.
    pub const SET_AUTHORITY: u8 = 6;
    /// Mint-to tag.
    pub const MINT_TO: u8 = 7;
    /// Burn tag.
    pub const BURN: u8 = 8;

    /// Authority slots on mints and token accounts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    pub enum AuthorityType {
        /// Permission to mint new units.
        MintTokens = 0,
        /// Permission to freeze token accounts.
        FreezeAccount = 1,
        /// Owner of a token account.
        AccountOwner = 2,
        /// Permission to close a token account.
        CloseAccount = 3,
    }

    impl AuthorityType {
        /// Decode from the wire tag.
        #[must_use]
        pub const fn from_u8(tag: u8) -> Option<Self> {
            match tag {
                0 => Some(Self::MintTokens),
                1 => Some(Self::FreezeAccount),
                2 => Some(Self::AccountOwner),
                3 => Some(Self::CloseAccount),
                _ => None,
            }
        }
    }

    fn push_optional_address(data: &mut Vec<u8>, address: Option<&Address>) {
        match address {
            Some(address) => {
                data.push(1);
                data.extend_from_slice(address.as_bytes());
            }
            None => data.push(0),
        }
    }

    /// Initialize `mint` with the given precision and authorities.
    #[must_use]
    pub fn initialize_mint(
        mint: &Address,
        decimals: u8,
        mint_authority: &Address,
        freeze_authority: Option<&Address>,
    ) -> Instruction {
        let mut data = Vec::with_capacity(67);
        data.push(INITIALIZE_MINT);
        data.push(decimals);
        data.extend_from_slice(mint_authority.as_bytes());
        push_optional_address(&mut data, freeze_authority);
        Instruction::new(
            ID,
            vec![
                AccountMeta::writable(*mint, false),
                AccountMeta::readonly(RENT_SYSVAR_ID, false),
            ],
            data,
        )
    }

    /// Credit `amount` new units of `mint` to `destination`.
    #[must_use]
    pub fn mint_to(
        mint: &Address,
        destination: &Address,
        authority: &Address,
        amount: u64,
    ) -> Instruction {
        let mut data = Vec::with_capacity(9);
        data.push(MINT_TO);
        data.extend_from_slice(&amount.to_le_bytes());
        Instruction::new(
            ID,
            vec![
                AccountMeta::writable(*mint, false),
                AccountMeta::writable(*destination, false),
                AccountMeta::readonly(*authority, true),
            ],
            data,
        )
    }

    /// Replace (or clear, with `None`) an authority on `account`.
    #[must_use]
    pub fn set_authority(
        account: &Address,
        current_authority: &Address,
        authority_type: AuthorityType,
        new_authority: Option<&Address>,
    ) -> Instruction {
        let mut data = Vec::with_capacity(35);
        data.push(SET_AUTHORITY);
        data.push(authority_type as u8);
        push_optional_address(&mut data, new_authority);
        Instruction::new(
            ID,
            vec![
                AccountMeta::writable(*account, false),
                AccountMeta::readonly(*current_authority, true),
            ],
            data,
        )
    }

    /// Move `amount` units between two token accounts of the same mint.
    #[must_use]
    pub fn transfer(
        source: &Address,
        destination: &Address,
        owner: &Address,
        amount: u64,
    ) -> Instruction {
        let mut data = Vec::with_capacity(9);
        data.push(TRANSFER);
        data.extend_from_slice(&amount.to_le_bytes());
        Instruction::new(
            ID,
            vec![
                AccountMeta::writable(*source, false),
                AccountMeta::writable(*destination, false),
                AccountMeta::readonly(*owner, true),
            ],
            data,
        )
    }

    /// Destroy `amount` units held in `account`.
    #[must_use]
    pub fn burn(account: &Address, mint: &Address, owner: &Address, amount: u64) -> Instruction {
        let mut data = Vec::with_capacity(9);
        data.push(BURN);
        data.extend_from_slice(&amount.to_le_bytes());
        Instruction::new(
            ID,
            vec![
                AccountMeta::writable(*account, false),
                AccountMeta::writable(*mint, false),
                AccountMeta::readonly(*owner, true),
            ],
            data,
        )
    }
}

/// Associated token account program.
pub mod associated_token {
    use super::{AccountMeta, Address, Instruction, Result, find_program_address, system, token};

    /// Program id (`ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`).
    pub const ID: Address = Address::new([
        140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153,
        218, 255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
    ]);

    /// Instruction tags. An empty data buffer is also read as `CREATE`.
    pub const CREATE: u8 = 0;
    /// Create-if-missing tag.
    pub const CREATE_IDEMPOTENT: u8 = 1;

    /// The deterministic token account of `wallet` for `mint`.
    ///
    /// # Errors
    ///
    /// Only fails if no bump seed yields an off-curve address.
    pub fn address(wallet: &Address, mint: &Address) -> Result<Address> {
        find_program_address(
            &[wallet.as_bytes(), token::ID.as_bytes(), mint.as_bytes()],
            &ID,
        )
        .map(|(address, _)| address)
    }

    fn instruction(
        payer: &Address,
        associated: &Address,
        wallet: &Address,
        mint: &Address,
        tag: u8,
    ) -> Instruction {
        Instruction::new(
            ID,
            vec![
                AccountMeta::writable(*payer, true),
                AccountMeta::writable(*associated, false),
                AccountMeta::readonly(*wallet, false),
                AccountMeta::readonly(*mint, false),
                AccountMeta::readonly(system::ID, false),
                AccountMeta::readonly(token::ID, false),
            ],
            vec![tag],
        )
    }

    /// Create the associated account; fails on the ledger if it exists.
    ///
    /// # Errors
    ///
    /// Propagates address derivation failure.
    pub fn create(payer: &Address, wallet: &Address, mint: &Address) -> Result<Instruction> {
        let associated = address(wallet, mint)?;
        Ok(instruction(payer, &associated, wallet, mint, CREATE))
    }

    /// Create the associated account unless it already exists.
    ///
    /// # Errors
    ///
    /// Propagates address derivation failure.
    pub fn create_idempotent(
        payer: &Address,
        wallet: &Address,
        mint: &Address,
    ) -> Result<Instruction> {
        let associated = address(wallet, mint)?;
        Ok(instruction(payer, &associated, wallet, mint, CREATE_IDEMPOTENT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_ids_render() {
        assert_eq!(
            token::ID.to_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
        assert_eq!(
            associated_token::ID.to_string(),
            "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL"
        );
        assert_eq!(
            RENT_SYSVAR_ID.to_string(),
            "SysvarRent111111111111111111111111111111111"
        );
        assert_eq!(system::ID.to_string(), "11111111111111111111111111111111");
    }

    #[test]
    fn test_rent_exempt_minimum_for_mint() {
        assert_eq!(rent_exempt_minimum(token::MINT_LEN), 1_461_600);
        assert_eq!(rent_exempt_minimum(token::ACCOUNT_LEN), 2_039_280);
    }

    #[test]
    fn test_associated_token_address_known_vector() {
        let wallet = Address::from_base58("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM")
            .expect("wallet");
        let mint =
            Address::from_base58("So11111111111111111111111111111111111111112").expect("mint");
        let derived = associated_token::address(&wallet, &mint).expect("derive");
        assert_eq!(
            derived.to_string(),
            "8LjUgMjzZuHj8VdyxzkmLLQVmW4C3gd56md1nLd76TNW"
        );
        assert!(!derived.is_on_curve());
    }

    #[test]
    fn test_derivation_is_deterministic_per_owner() {
        let mint = crate::Keypair::generate().address();
        let a = crate::Keypair::generate().address();
        let b = crate::Keypair::generate().address();
        let a1 = associated_token::address(&a, &mint).expect("derive");
        let a2 = associated_token::address(&a, &mint).expect("derive");
        let b1 = associated_token::address(&b, &mint).expect("derive");
        assert_eq!(a1, a2);
        assert_ne!(a1, b1);
    }

    #[test]
    fn test_create_account_layout() {
        let from = Address::new([1; 32]);
        let new = Address::new([2; 32]);
        let ix = system::create_account(&from, &new, 1_461_600, 82, &token::ID);
        assert_eq!(ix.data.len(), 52);
        assert_eq!(&ix.data[..4], &[0, 0, 0, 0]);
        assert_eq!(u64::from_le_bytes(ix.data[4..12].try_into().expect("8")), 1_461_600);
        assert_eq!(u64::from_le_bytes(ix.data[12..20].try_into().expect("8")), 82);
        assert_eq!(&ix.data[20..], token::ID.as_bytes());
        assert!(ix.accounts.iter().all(|m| m.is_signer && m.is_writable));
    }

    #[test]
    fn test_initialize_mint_layout() {
        let mint = Address::new([3; 32]);
        let authority = Address::new([4; 32]);
        let ix = token::initialize_mint(&mint, 0, &authority, Some(&authority));
        assert_eq!(ix.data.len(), 67);
        assert_eq!(ix.data[0], token::INITIALIZE_MINT);
        assert_eq!(ix.data[1], 0);
        assert_eq!(&ix.data[2..34], authority.as_bytes());
        assert_eq!(ix.data[34], 1);
        assert_eq!(ix.accounts[1].address, RENT_SYSVAR_ID);
    }

    #[test]
    fn test_revoke_mint_authority_layout() {
        let mint = Address::new([3; 32]);
        let authority = Address::new([4; 32]);
        let ix = token::set_authority(&mint, &authority, token::AuthorityType::MintTokens, None);
        assert_eq!(ix.data, vec![token::SET_AUTHORITY, 0, 0]);
        assert!(ix.accounts[1].is_signer);
    }

    #[test]
    fn test_find_program_address_returns_highest_viable_bump() {
        let seeds: [&[u8]; 2] = [b"deal", b"listing"];
        let (address, bump) = find_program_address(&seeds, &token::ID).expect("derive");
        assert!(!address.is_on_curve());

        let bump_seed = [bump];
        let again = create_program_address(&[seeds[0], seeds[1], &bump_seed], &token::ID)
            .expect("recreate");
        assert_eq!(again, address);
        for higher in bump.saturating_add(1)..=u8::MAX {
            if higher == bump {
                break;
            }
            let higher_seed = [higher];
            assert!(
                create_program_address(&[seeds[0], seeds[1], &higher_seed], &token::ID).is_err()
            );
        }
    }

    #[test]
    fn test_too_many_seeds_rejected() {
        let seed: &[u8] = b"s";
        let seeds = vec![seed; MAX_SEEDS + 1];
        assert!(create_program_address(&seeds, &token::ID).is_err());
    }
}

//! Decoded token program account layouts.

use crate::error::{DealError, Result};
use crate::keys::Address;
use crate::programs::token::{ACCOUNT_LEN, MINT_LEN};
use serde::{Deserialize, Serialize};

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// `COption<Pubkey>` as stored in account data: u32 tag then 32 bytes.
fn read_optional_address(data: &[u8], offset: usize) -> Result<Option<Address>> {
    match &data[offset..offset + 4] {
        [0, 0, 0, 0] => Ok(None),
        [1, 0, 0, 0] => Address::from_slice(&data[offset + 4..offset + 36]).map(Some),
        _ => Err(DealError::invalid_input("malformed optional address tag")),
    }
}

fn write_optional_address(data: &mut [u8], offset: usize, value: Option<&Address>) {
    match value {
        Some(address) => {
            data[offset..offset + 4].copy_from_slice(&1u32.to_le_bytes());
            data[offset + 4..offset + 36].copy_from_slice(address.as_bytes());
        }
        None => data[offset..offset + 36].fill(0),
    }
}

/// State of a token identity (mint account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintState {
    /// Who may mint more units; `None` once revoked.
    pub mint_authority: Option<Address>,
    /// Total units in circulation.
    pub supply: u64,
    /// Decimal precision.
    pub decimals: u8,
    /// Whether `InitializeMint` has run.
    pub is_initialized: bool,
    /// Who may freeze holder accounts.
    pub freeze_authority: Option<Address>,
}

impl MintState {
    /// Decode an 82-byte mint account.
    ///
    /// # Errors
    ///
    /// Returns error on wrong length or malformed option tags.
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() != MINT_LEN {
            return Err(DealError::invalid_input(format!(
                "mint account must be {MINT_LEN} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            mint_authority: read_optional_address(data, 0)?,
            supply: read_u64(data, 36),
            decimals: data[44],
            is_initialized: data[45] != 0,
            freeze_authority: read_optional_address(data, 46)?,
        })
    }

    /// Encode into an 82-byte buffer.
    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        let mut data = vec![0u8; MINT_LEN];
        write_optional_address(&mut data, 0, self.mint_authority.as_ref());
        data[36..44].copy_from_slice(&self.supply.to_le_bytes());
        data[44] = self.decimals;
        data[45] = u8::from(self.is_initialized);
        write_optional_address(&mut data, 46, self.freeze_authority.as_ref());
        data
    }

    /// Supply is fixed at exactly one unit and can never change.
    #[must_use]
    pub fn is_single_edition(&self) -> bool {
        self.is_initialized && self.supply == 1 && self.decimals == 0 && self.mint_authority.is_none()
    }
}

/// State of a token account holding units of one mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccountState {
    /// The mint whose units are held.
    pub mint: Address,
    /// Owner allowed to move the units.
    pub owner: Address,
    /// Units held.
    pub amount: u64,
    /// Whether the account has been initialized.
    pub is_initialized: bool,
}

impl TokenAccountState {
    /// A freshly initialized, empty account.
    #[must_use]
    pub const fn new(mint: Address, owner: Address) -> Self {
        Self {
            mint,
            owner,
            amount: 0,
            is_initialized: true,
        }
    }

    /// Decode a 165-byte token account.
    ///
    /// Delegate and close-authority fields are not used by this crate and are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns error on wrong length.
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() != ACCOUNT_LEN {
            return Err(DealError::invalid_input(format!(
                "token account must be {ACCOUNT_LEN} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            mint: Address::from_slice(&data[0..32])?,
            owner: Address::from_slice(&data[32..64])?,
            amount: read_u64(data, 64),
            is_initialized: data[108] != 0,
        })
    }

    /// Encode into a 165-byte buffer.
    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        let mut data = vec![0u8; ACCOUNT_LEN];
        data[0..32].copy_from_slice(self.mint.as_bytes());
        data[32..64].copy_from_slice(self.owner.as_bytes());
        data[64..72].copy_from_slice(&self.amount.to_le_bytes());
        // 1 = Initialized, 2 = Frozen
        data[108] = u8::from(self.is_initialized);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_layout_offsets() {
        let authority = Address::new([9; 32]);
        let state = MintState {
            mint_authority: Some(authority),
            supply: 1,
            decimals: 0,
            is_initialized: true,
            freeze_authority: None,
        };
        let data = state.pack();
        assert_eq!(data.len(), MINT_LEN);
        assert_eq!(&data[0..4], &[1, 0, 0, 0]);
        assert_eq!(&data[4..36], authority.as_bytes());
        assert_eq!(data[36], 1);
        assert_eq!(data[45], 1);
        assert_eq!(MintState::unpack(&data).expect("unpack"), state);
    }

    #[test]
    fn test_single_edition_requires_revoked_authority() {
        let mut state = MintState {
            mint_authority: Some(Address::new([1; 32])),
            supply: 1,
            decimals: 0,
            is_initialized: true,
            freeze_authority: None,
        };
        assert!(!state.is_single_edition());
        state.mint_authority = None;
        assert!(state.is_single_edition());
    }

    #[test]
    fn test_mint_unpack_rejects_bad_tag() {
        let mut data = vec![0u8; MINT_LEN];
        data[0] = 7;
        assert!(MintState::unpack(&data).is_err());
        assert!(MintState::unpack(&data[..10]).is_err());
    }

    #[test]
    fn test_token_account_layout() {
        let mut state = TokenAccountState::new(Address::new([1; 32]), Address::new([2; 32]));
        state.amount = 1;
        let data = state.pack();
        assert_eq!(data.len(), ACCOUNT_LEN);
        assert_eq!(data[64], 1);
        assert_eq!(TokenAccountState::unpack(&data).expect("unpack"), state);
    }
}

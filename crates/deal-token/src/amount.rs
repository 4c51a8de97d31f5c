//! SOL amount representation.
//!
//! Amounts are stored as lamports (base units) so balance comparisons and
//! price transfers never touch floating point. Decimal SOL strings are parsed
//! with integer arithmetic.

use crate::LAMPORTS_PER_SOL;
use crate::error::{DealError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits in one SOL.
const SOL_DECIMALS: usize = 9;

/// An amount of SOL, held as lamports (1 SOL = 10^9 lamports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount {
    lamports: u64,
}

impl Amount {
    /// Zero SOL.
    pub const ZERO: Self = Self { lamports: 0 };

    /// Maximum amount (`u64::MAX` lamports).
    pub const MAX: Self = Self {
        lamports: u64::MAX,
    };

    /// Create an amount from lamports.
    #[must_use]
    pub const fn from_lamports(lamports: u64) -> Self {
        Self { lamports }
    }

    /// Parse a decimal SOL string such as `"1.25"` or `"0.000005"`.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error for signs, more than nine fractional
    /// digits, non-digits, or values that overflow `u64` lamports.
    pub fn parse_sol(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DealError::invalid_input("amount cannot be empty"));
        }

        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(DealError::invalid_input(format!("invalid amount: {s}")));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(DealError::invalid_input(format!("invalid amount: {s}")));
        }
        if frac.len() > SOL_DECIMALS {
            return Err(DealError::invalid_input(format!(
                "amount has more than {SOL_DECIMALS} decimal places: {s}"
            )));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| DealError::invalid_input(format!("amount too large: {s}")))?
        };
        let frac: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<SOL_DECIMALS$}");
            padded
                .parse()
                .map_err(|_| DealError::invalid_input(format!("invalid amount: {s}")))?
        };

        whole
            .checked_mul(LAMPORTS_PER_SOL)
            .and_then(|l| l.checked_add(frac))
            .map(Self::from_lamports)
            .ok_or_else(|| DealError::invalid_input(format!("amount too large: {s}")))
    }

    /// Get the amount in lamports.
    #[must_use]
    pub const fn lamports(&self) -> u64 {
        self.lamports
    }

    /// Get the amount in SOL (for display only).
    #[must_use]
    pub fn as_sol(&self) -> f64 {
        self.lamports as f64 / LAMPORTS_PER_SOL as f64
    }

    /// Check if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.lamports == 0
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(&self, other: Self) -> Self {
        Self {
            lamports: self.lamports.saturating_add(other.lamports),
        }
    }

    /// Saturating subtraction.
    #[must_use]
    pub const fn saturating_sub(&self, other: Self) -> Self {
        Self {
            lamports: self.lamports.saturating_sub(other.lamports),
        }
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(&self, other: Self) -> Option<Self> {
        match self.lamports.checked_add(other.lamports) {
            Some(lamports) => Some(Self { lamports }),
            None => None,
        }
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Four decimals, the precision balances are shown to users with.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} SOL", self.as_sol())
    }
}

impl FromStr for Amount {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_sol(s)
    }
}

impl From<u64> for Amount {
    fn from(lamports: u64) -> Self {
        Self::from_lamports(lamports)
    }
}

//! The CD format uses binary-coded decimal (BCD) extensively in its
//! internal format (track numbers, seek positions etc...) probably in
//! order to make it easier to display those informations on the first CD
//! players.

use crate::CdError;
use std::fmt;
use std::str::FromStr;

/// A single packed BCD value in the range 0-99 (2 digits, 4 bits per
/// digit).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bcd(u8);

impl Bcd {
    /// BCD value of 0
    pub const ZERO: Bcd = Bcd(0);

    /// The largest possible BCD value (99)
    pub const MAX: Bcd = Bcd(0x99);

    /// Table of all valid BCD values, indexed by their binary equivalent
    pub const TABLE: [Bcd; 100] = {
        let mut t = [Bcd(0); 100];
        let mut i = 0;

        while i < 100 {
            t[i] = Bcd((((i / 10) << 4) | (i % 10)) as u8);
            i += 1;
        }

        t
    };

    /// Build a `Bcd` from an `u8` in BCD format. Returns `None` if the
    /// value provided is not valid BCD.
    pub const fn from_bcd(b: u8) -> Option<Bcd> {
        if b <= 0x99 && (b & 0xf) <= 0x9 {
            Some(Bcd(b))
        } else {
            None
        }
    }

    /// Build a `Bcd` from a binary `u8`. Returns `None` if the value is
    /// greater than 99.
    pub const fn from_binary(b: u8) -> Option<Bcd> {
        if b > 99 {
            None
        } else {
            Some(Bcd::TABLE[b as usize])
        }
    }

    /// Returns the BCD as an u8
    pub const fn bcd(self) -> u8 {
        self.0
    }

    /// Convert the BCD to a binary byte
    pub const fn binary(self) -> u8 {
        let b = self.0;

        (b >> 4) * 10 + (b & 0xf)
    }

    /// Returns the BCD value plus one. Wraps to 0 if `self` is equal to
    /// 99.
    pub const fn wrapping_next(self) -> Bcd {
        let b = self.bcd();

        if b & 0xf < 9 {
            Bcd(b + 1)
        } else if b < 0x99 {
            Bcd((b & 0xf0) + 0x10)
        } else {
            Bcd(0)
        }
    }
}

impl FromStr for Bcd {
    type Err = CdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = match u8::from_str(s) {
            Ok(b) => b,
            Err(_) => return Err(CdError::BadBcd),
        };

        Bcd::from_binary(b).ok_or(CdError::BadBcd)
    }
}

impl fmt::Display for Bcd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl fmt::Debug for Bcd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

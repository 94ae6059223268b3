//! Address strings such as `D200` or `C10.05`.
//!
//! An address names a memory area by letter, a word offset (0-65535) and an
//! optional bit offset (0-15). A bit offset of 0 means the whole word; any
//! other value makes the access one bit wide.
//!
//! # Example
//!
//! ```
//! use fins_core::{Address, MemoryArea};
//!
//! let addr: Address = "D200.1".parse().unwrap();
//! assert_eq!(addr.area, MemoryArea::DM);
//! assert_eq!(addr.word, 200);
//! assert_eq!(addr.bit, 1);
//! assert_eq!(addr.to_string(), "D200.1");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{FinsError, Result};
use crate::memory::MemoryArea;

/// Highest valid bit offset within a word.
pub const MAX_BIT: u8 = 15;

const MAX_WORD_DIGITS: usize = 5;
const MAX_BIT_DIGITS: usize = 2;

/// A resolved memory address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Memory area.
    pub area: MemoryArea,
    /// Word offset in the area.
    pub word: u16,
    /// Bit position (1-15) for bit access, or 0 for word access.
    pub bit: u8,
}

impl Address {
    /// Creates a word address (bit = 0).
    pub fn word(area: MemoryArea, word: u16) -> Self {
        Self { area, word, bit: 0 }
    }

    /// Creates an address with an explicit bit offset.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::AddressOutOfRange` if bit > 15.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::{Address, MemoryArea};
    ///
    /// let addr = Address::bit(MemoryArea::CIO, 100, 5).unwrap();
    /// assert!(addr.is_bit());
    /// assert!(Address::bit(MemoryArea::CIO, 100, 16).is_err());
    /// ```
    pub fn bit(area: MemoryArea, word: u16, bit: u8) -> Result<Self> {
        if bit > MAX_BIT {
            return Err(FinsError::address_out_of_range(
                format!("{}{}.{}", area.letter(), word, bit),
                "bit must be 0-15",
            ));
        }
        Ok(Self { area, word, bit })
    }

    /// Parses an address string of the form `<Area><word>[.<bit>]`.
    ///
    /// The area letter is one of `D`, `C`, `W`, `H`, `A` in either case.
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// - `InvalidAddress` if the string does not have that shape, including
    ///   words of more than 5 digits and bits of more than 2
    /// - `UnknownArea` if the letter is not a supported area
    /// - `AddressOutOfRange` if the word exceeds 65535 or the bit exceeds 15
    pub fn parse(address: &str) -> Result<Self> {
        let trimmed = address.trim();
        let mut chars = trimmed.chars();
        let letter = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => c,
            _ => return Err(FinsError::invalid_address(address)),
        };
        let rest = chars.as_str();

        let (word_part, bit_part) = match rest.split_once('.') {
            Some((word, bit)) => (word, Some(bit)),
            None => (rest, None),
        };
        if !is_digits(word_part, MAX_WORD_DIGITS)
            || bit_part.is_some_and(|bit| !is_digits(bit, MAX_BIT_DIGITS))
        {
            return Err(FinsError::invalid_address(address));
        }

        let area = MemoryArea::from_letter(letter)
            .ok_or_else(|| FinsError::unknown_area(letter.to_string()))?;

        let word = parse_bounded(word_part, u16::MAX as u32).ok_or_else(|| {
            FinsError::address_out_of_range(address, "word must be 0-65535")
        })? as u16;

        let bit = match bit_part {
            Some(bit) => parse_bounded(bit, MAX_BIT as u32)
                .ok_or_else(|| FinsError::address_out_of_range(address, "bit must be 0-15"))?
                as u8,
            None => 0,
        };

        Ok(Self { area, word, bit })
    }

    /// Returns whether this address selects a single bit.
    pub fn is_bit(self) -> bool {
        self.bit != 0
    }

    /// Returns the word address with the bit offset cleared.
    pub fn to_word(self) -> Self {
        Self { bit: 0, ..self }
    }

    /// Serializes to the 4-byte wire form: area code, word high, word low, bit.
    pub(crate) fn to_bytes(self) -> [u8; 4] {
        let [hi, lo] = self.word.to_be_bytes();
        [self.area.code(), hi, lo, self.bit]
    }
}

fn is_digits(s: &str, max_len: usize) -> bool {
    (1..=max_len).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a decimal string that is already known to be all digits.
fn parse_bounded(digits: &str, max: u32) -> Option<u32> {
    let mut value: u32 = 0;
    for b in digits.bytes() {
        value = value.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
        if value > max {
            return None;
        }
    }
    Some(value)
}

impl FromStr for Address {
    type Err = FinsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.area.letter(), self.word)?;
        if self.bit != 0 {
            write!(f, ".{}", self.bit)?;
        }
        Ok(())
    }
}

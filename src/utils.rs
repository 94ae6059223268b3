//! Bit manipulation and frame formatting helpers.
//!
//! # Example
//!
//! ```
//! use fins_core::utils::{format_frame, get_bit, set_bit};
//!
//! let value: u16 = 0xFFFF;
//! let cleared = set_bit(value, 3, false);
//! assert_eq!(cleared, 0xFFF7);
//! assert!(!get_bit(cleared, 3));
//!
//! assert_eq!(format_frame(&[0x80, 0x00, 0x02]), "80 00 02");
//! ```

/// Gets a single bit from a 16-bit word.
///
/// `bit` is masked to 0-15.
///
/// # Example
///
/// ```
/// use fins_core::utils::get_bit;
///
/// let value: u16 = 0b0000_0000_0000_0101;
/// assert!(get_bit(value, 0));
/// assert!(!get_bit(value, 1));
/// assert!(get_bit(value, 2));
/// ```
#[inline]
pub fn get_bit(value: u16, bit: u8) -> bool {
    (value & (1 << (bit & 0x0F))) != 0
}

/// Sets or clears a single bit in a 16-bit word, leaving the other 15 bits unchanged.
///
/// `bit` is masked to 0-15.
///
/// # Example
///
/// ```
/// use fins_core::utils::set_bit;
///
/// assert_eq!(set_bit(0, 5, true), 0b0000_0000_0010_0000);
/// assert_eq!(set_bit(0xFFFF, 3, false), 0xFFF7);
/// ```
#[inline]
pub fn set_bit(value: u16, bit: u8, state: bool) -> u16 {
    let mask = 1 << (bit & 0x0F);
    if state {
        value | mask
    } else {
        value & !mask
    }
}

/// Formats a frame as space-separated upper-case hex bytes.
pub fn format_frame(frame: &[u8]) -> String {
    let hex = hex::encode_upper(frame);
    let mut out = String::with_capacity(frame.len() * 3);
    for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.extend(pair.iter().map(|&c| c as char));
    }
    out
}

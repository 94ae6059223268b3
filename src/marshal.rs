//! Conversions between word sequences and typed values.
//!
//! Every value maps to a fixed number of 16-bit words:
//!
//! | Type | Words |
//! |------|:-----:|
//! | `i16`, `u16` | 1 |
//! | `i32`, `u32`, `f32` | 2 |
//! | `i64`, `u64`, `f64` | 4 |
//!
//! Bytes within a word are always big-endian. The order of words within a
//! multi-word value is chosen by [`WordOrder`]; the default is low word first.
//! Floats are reinterpreted bit for bit, so every bit pattern round-trips.
//!
//! Strings use a single-byte encoding, two characters per word (first
//! character in the high byte), zero-padded, and decoding stops at the first
//! zero byte.
//!
//! # Example
//!
//! ```
//! use fins_core::{Marshaller, WordOrder};
//!
//! let low_first = Marshaller::default();
//! assert_eq!(low_first.encode(123456i32), vec![0xE240, 0x0001]);
//!
//! let high_first = Marshaller::default().with_word_order(WordOrder::HighWordFirst);
//! assert_eq!(high_first.encode(123456i32), vec![0x0001, 0xE240]);
//!
//! assert_eq!(low_first.decode::<i32>(&[0xE240, 0x0001]).unwrap(), 123456);
//! ```

use crate::error::{FinsError, Result};

/// Order of words within a multi-word value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WordOrder {
    /// Least significant word at the lowest address.
    #[default]
    LowWordFirst,
    /// Most significant word at the lowest address.
    HighWordFirst,
}

impl WordOrder {
    /// Returns `HighWordFirst` when `high_word_first` is set.
    pub fn from_high_word_first(high_word_first: bool) -> Self {
        if high_word_first {
            WordOrder::HighWordFirst
        } else {
            WordOrder::LowWordFirst
        }
    }
}

/// Single-byte character encoding for string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StringEncoding {
    /// 7-bit ASCII; anything else becomes `?`.
    #[default]
    Ascii,
    /// ISO-8859-1; characters above U+00FF become `?`.
    Latin1,
}

impl StringEncoding {
    fn encode_char(self, c: char) -> u8 {
        let limit = match self {
            StringEncoding::Ascii => 0x7F,
            StringEncoding::Latin1 => 0xFF,
        };
        if (c as u32) <= limit {
            c as u8
        } else {
            b'?'
        }
    }

    fn decode_byte(self, b: u8) -> char {
        match self {
            StringEncoding::Ascii if b > 0x7F => '?',
            _ => char::from(b),
        }
    }
}

/// A value with a fixed word-sequence representation.
pub trait WordValue: Sized + Copy {
    /// Number of words the value occupies.
    const WORDS: usize;

    /// Encodes the value into exactly [`Self::WORDS`] words.
    fn to_words(self, order: WordOrder) -> Vec<u16>;

    /// Decodes a value from exactly [`Self::WORDS`] words.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::WordCountMismatch` if `words.len() != Self::WORDS`.
    fn from_words(words: &[u16], order: WordOrder) -> Result<Self>;
}

/// Splits the low `count * 16` bits of `bits` into words.
fn split_words(bits: u64, count: usize, order: WordOrder) -> Vec<u16> {
    let mut words: Vec<u16> = (0..count).map(|i| (bits >> (16 * i)) as u16).collect();
    if order == WordOrder::HighWordFirst {
        words.reverse();
    }
    words
}

fn join_words(words: &[u16], count: usize, order: WordOrder) -> Result<u64> {
    if words.len() != count {
        return Err(FinsError::word_count_mismatch(count, words.len()));
    }
    let fold = |acc: u64, &w: &u16| (acc << 16) | u64::from(w);
    Ok(match order {
        WordOrder::HighWordFirst => words.iter().fold(0, fold),
        WordOrder::LowWordFirst => words.iter().rev().fold(0, fold),
    })
}

macro_rules! impl_word_value_int {
    ($($ty:ty => $unsigned:ty),* $(,)?) => {$(
        impl WordValue for $ty {
            const WORDS: usize = std::mem::size_of::<$ty>() / 2;

            fn to_words(self, order: WordOrder) -> Vec<u16> {
                split_words(self as $unsigned as u64, Self::WORDS, order)
            }

            fn from_words(words: &[u16], order: WordOrder) -> Result<Self> {
                Ok(join_words(words, Self::WORDS, order)? as $unsigned as $ty)
            }
        }
    )*};
}

impl_word_value_int!(
    i16 => u16,
    u16 => u16,
    i32 => u32,
    u32 => u32,
    i64 => u64,
    u64 => u64,
);

impl WordValue for f32 {
    const WORDS: usize = 2;

    fn to_words(self, order: WordOrder) -> Vec<u16> {
        self.to_bits().to_words(order)
    }

    fn from_words(words: &[u16], order: WordOrder) -> Result<Self> {
        u32::from_words(words, order).map(f32::from_bits)
    }
}

impl WordValue for f64 {
    const WORDS: usize = 4;

    fn to_words(self, order: WordOrder) -> Vec<u16> {
        self.to_bits().to_words(order)
    }

    fn from_words(words: &[u16], order: WordOrder) -> Result<Self> {
        u64::from_words(words, order).map(f64::from_bits)
    }
}

/// Encodes a string, two characters per word, padding an odd final byte with 0x00.
pub fn string_to_words(value: &str, encoding: StringEncoding) -> Vec<u16> {
    let bytes: Vec<u8> = value.chars().map(|c| encoding.encode_char(c)).collect();
    bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect()
}

/// Encodes a string into exactly `word_count` words, zero-filling the remainder.
///
/// # Errors
///
/// Returns `FinsError::WordCountMismatch` if the string needs more than
/// `word_count` words.
pub fn string_to_words_fixed(
    value: &str,
    word_count: usize,
    encoding: StringEncoding,
) -> Result<Vec<u16>> {
    let mut words = string_to_words(value, encoding);
    if words.len() > word_count {
        return Err(FinsError::word_count_mismatch(word_count, words.len()));
    }
    words.resize(word_count, 0);
    Ok(words)
}

/// Decodes a string from words, stopping at the first 0x00 byte.
pub fn words_to_string(words: &[u16], encoding: StringEncoding) -> String {
    words
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .take_while(|&b| b != 0)
        .map(|b| encoding.decode_byte(b))
        .collect()
}

/// Word order and string encoding bundled for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Marshaller {
    /// Order of words in multi-word values.
    pub word_order: WordOrder,
    /// Encoding for string values.
    pub encoding: StringEncoding,
}

impl Marshaller {
    /// Creates a marshaller.
    pub fn new(word_order: WordOrder, encoding: StringEncoding) -> Self {
        Self {
            word_order,
            encoding,
        }
    }

    /// Sets the word order.
    pub fn with_word_order(mut self, word_order: WordOrder) -> Self {
        self.word_order = word_order;
        self
    }

    /// Sets the string encoding.
    pub fn with_encoding(mut self, encoding: StringEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Encodes one value.
    pub fn encode<T: WordValue>(&self, value: T) -> Vec<u16> {
        value.to_words(self.word_order)
    }

    /// Decodes one value from exactly `T::WORDS` words.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::WordCountMismatch` on a length mismatch.
    pub fn decode<T: WordValue>(&self, words: &[u16]) -> Result<T> {
        T::from_words(words, self.word_order)
    }

    /// Encodes consecutive values.
    pub fn encode_slice<T: WordValue>(&self, values: &[T]) -> Vec<u16> {
        values
            .iter()
            .flat_map(|&v| v.to_words(self.word_order))
            .collect()
    }

    /// Decodes consecutive values.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::WordCountMismatch` if `words` is not a whole
    /// number of values.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::Marshaller;
    ///
    /// let m = Marshaller::default();
    /// let words = m.encode_slice(&[1.5f32, -2.25]);
    /// assert_eq!(m.decode_slice::<f32>(&words).unwrap(), vec![1.5, -2.25]);
    /// assert!(m.decode_slice::<f32>(&words[..3]).is_err());
    /// ```
    pub fn decode_slice<T: WordValue>(&self, words: &[u16]) -> Result<Vec<T>> {
        if words.len() % T::WORDS != 0 {
            let expected = words.len().div_ceil(T::WORDS) * T::WORDS;
            return Err(FinsError::word_count_mismatch(expected, words.len()));
        }
        words
            .chunks_exact(T::WORDS)
            .map(|chunk| T::from_words(chunk, self.word_order))
            .collect()
    }

    /// Encodes a string.
    pub fn encode_str(&self, value: &str) -> Vec<u16> {
        string_to_words(value, self.encoding)
    }

    /// Encodes a string into a fixed-width field.
    ///
    /// # Errors
    ///
    /// See [`string_to_words_fixed`].
    pub fn encode_str_fixed(&self, value: &str, word_count: usize) -> Result<Vec<u16>> {
        string_to_words_fixed(value, word_count, self.encoding)
    }

    /// Decodes a string.
    pub fn decode_str(&self, words: &[u16]) -> String {
        words_to_string(words, self.encoding)
    }
}

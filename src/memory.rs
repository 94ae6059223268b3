//! Memory area definitions for the FINS protocol.
//!
//! This module defines the [`MemoryArea`] enum which represents the memory
//! regions an address can refer to. Each area is identified on the wire by a
//! single area-code byte and in address strings by a single letter.
//!
//! # Memory Areas Overview
//!
//! | Area | Letter | Code | Description |
//! |------|:------:|:----:|-------------|
//! | CIO | `C` | `0x30` | Core I/O - inputs, outputs, internal relays |
//! | WR | `W` | `0x31` | Work area - temporary work bits/words |
//! | HR | `H` | `0xB1` | Holding area - retentive bits/words |
//! | AR | `A` | `0xB0` | Auxiliary area - system status/control |
//! | DM | `D` | `0x82` | Data Memory - numeric data storage |
//!
//! # Example
//!
//! ```
//! use fins_core::MemoryArea;
//!
//! assert_eq!(MemoryArea::DM.code(), 0x82);
//! assert_eq!(MemoryArea::from_letter('h'), Some(MemoryArea::HR));
//! assert_eq!(MemoryArea::from_code(0x30), Some(MemoryArea::CIO));
//! assert_eq!(MemoryArea::DM.to_string(), "DM");
//! ```

/// Memory areas addressable through memory area read/write commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryArea {
    /// CIO (Core I/O) area - general purpose I/O and internal relays.
    CIO,
    /// WR (Work) area - work bits/words.
    WR,
    /// HR (Holding) area - holding bits/words that retain values.
    HR,
    /// AR (Auxiliary) area - system status and control bits/words.
    AR,
    /// DM (Data Memory) area - numeric data storage.
    DM,
}

impl MemoryArea {
    /// All supported areas, in address-letter order.
    pub const ALL: [MemoryArea; 5] = [
        MemoryArea::CIO,
        MemoryArea::WR,
        MemoryArea::HR,
        MemoryArea::AR,
        MemoryArea::DM,
    ];

    /// Returns the area-code byte used on the wire.
    pub fn code(self) -> u8 {
        match self {
            MemoryArea::CIO => 0x30,
            MemoryArea::WR => 0x31,
            MemoryArea::HR => 0xB1,
            MemoryArea::AR => 0xB0,
            MemoryArea::DM => 0x82,
        }
    }

    /// Looks up an area by its wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|area| area.code() == code)
    }

    /// Returns the upper-case letter used in address strings.
    pub fn letter(self) -> char {
        match self {
            MemoryArea::CIO => 'C',
            MemoryArea::WR => 'W',
            MemoryArea::HR => 'H',
            MemoryArea::AR => 'A',
            MemoryArea::DM => 'D',
        }
    }

    /// Looks up an area by its address letter, case-insensitively.
    pub fn from_letter(letter: char) -> Option<Self> {
        let letter = letter.to_ascii_uppercase();
        Self::ALL.into_iter().find(|area| area.letter() == letter)
    }
}

impl std::fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryArea::CIO => write!(f, "CIO"),
            MemoryArea::WR => write!(f, "WR"),
            MemoryArea::HR => write!(f, "HR"),
            MemoryArea::AR => write!(f, "AR"),
            MemoryArea::DM => write!(f, "DM"),
        }
    }
}

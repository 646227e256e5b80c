//! The wire encoding for date/time values (spec §6, glossary *ticks-epoch*).
//!
//! A signed 64-bit count of 100-nanosecond ticks since
//! `0001-01-01T00:00:00 UTC`, with the top two bits of the same word packed
//! as a calendar-kind flag the way the source format does it.

use crate::error::{Error, Result};
use crate::io::ByteSource;

const TICKS_MASK: i64 = (1i64 << 62) - 1;
const KIND_SHIFT: u32 = 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarKind {
    Unspecified,
    Utc,
    Local,
}

impl CalendarKind {
    fn from_bits(bits: i64) -> Self {
        match bits & 0b11 {
            0 => CalendarKind::Unspecified,
            1 => CalendarKind::Utc,
            _ => CalendarKind::Local,
        }
    }

    fn to_bits(self) -> i64 {
        match self {
            CalendarKind::Unspecified => 0,
            CalendarKind::Utc => 1,
            CalendarKind::Local => 2,
        }
    }
}

/// Ticks-since-epoch date/time value, packed as described in spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireDateTime {
    pub ticks: i64,
    pub kind: CalendarKind,
}

impl WireDateTime {
    pub fn new(ticks: i64, kind: CalendarKind) -> Self {
        WireDateTime { ticks, kind }
    }

    fn packed(self) -> i64 {
        (self.ticks & TICKS_MASK) | (self.kind.to_bits() << KIND_SHIFT)
    }

    fn unpack(word: i64) -> Self {
        let kind = CalendarKind::from_bits(word >> KIND_SHIFT);
        let mut ticks = word & TICKS_MASK;
        // sign-extend the 62-bit tick field
        if ticks & (1 << 61) != 0 {
            ticks |= !TICKS_MASK;
        }
        WireDateTime { ticks, kind }
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.packed().to_le_bytes());
    }

    pub fn read(src: &mut dyn ByteSource) -> Result<Self> {
        let mut bytes = [0u8; 8];
        src.read_exact(&mut bytes).map_err(|_| Error::UnexpectedEndOfStream)?;
        Ok(Self::unpack(i64::from_le_bytes(bytes)))
    }
}

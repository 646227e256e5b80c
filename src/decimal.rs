//! The 128-bit fixed-point decimal wire layout (spec §4.2/§6, glossary
//! *fixed-point decimal*): a 96-bit unsigned mantissa split into three
//! little-endian 32-bit words (low, mid, high), followed by a 32-bit flags
//! word where bit 31 is sign and bits 16..23 are the scale (0..=28).

use crate::error::{Error, Result};
use crate::io::ByteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireDecimal {
    pub mantissa: u96,
    pub negative: bool,
    pub scale: u8,
}

/// A 96-bit unsigned integer, stored as three 32-bit little-endian words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(non_camel_case_types)]
pub struct u96 {
    pub low: u32,
    pub mid: u32,
    pub high: u32,
}

impl u96 {
    pub fn new(low: u32, mid: u32, high: u32) -> Self {
        u96 { low, mid, high }
    }

    pub fn from_u64(v: u64) -> Self {
        u96 { low: v as u32, mid: (v >> 32) as u32, high: 0 }
    }
}

impl WireDecimal {
    pub fn new(mantissa: u96, negative: bool, scale: u8) -> Result<Self> {
        if scale > 28 {
            return Err(Error::TypeMismatch {
                expected: "decimal scale 0..=28".into(),
                got: scale.to_string(),
            });
        }
        Ok(WireDecimal { mantissa, negative, scale })
    }

    fn flags(&self) -> u32 {
        let sign_bit = if self.negative { 1u32 << 31 } else { 0 };
        let scale_bits = (self.scale as u32) << 16;
        sign_bit | scale_bits
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.mantissa.low.to_le_bytes());
        buf.extend_from_slice(&self.mantissa.mid.to_le_bytes());
        buf.extend_from_slice(&self.mantissa.high.to_le_bytes());
        buf.extend_from_slice(&self.flags().to_le_bytes());
    }

    pub fn read(src: &mut dyn ByteSource) -> Result<Self> {
        let low = read_u32(src)?;
        let mid = read_u32(src)?;
        let high = read_u32(src)?;
        let flags = read_u32(src)?;
        let negative = flags & (1 << 31) != 0;
        let scale = ((flags >> 16) & 0xff) as u8;
        WireDecimal::new(u96::new(low, mid, high), negative, scale)
    }
}

fn read_u32(src: &mut dyn ByteSource) -> Result<u32> {
    let mut bytes = [0u8; 4];
    src.read_exact(&mut bytes).map_err(|_| Error::UnexpectedEndOfStream)?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SliceSource;

    #[test]
    fn round_trips_mantissa_sign_and_scale() {
        let d = WireDecimal::new(u96::new(1, 2, 3), true, 4).unwrap();
        let mut buf = Vec::new();
        d.write(&mut buf);
        assert_eq!(buf.len(), 16);
        let mut src = SliceSource::new(&buf);
        assert_eq!(WireDecimal::read(&mut src).unwrap(), d);
    }

    #[test]
    fn rejects_scale_above_28() {
        assert!(WireDecimal::new(u96::default(), false, 29).is_err());
    }

    #[test]
    fn word_order_is_low_mid_high_flags() {
        let d = WireDecimal::new(u96::new(0xAAAAAAAA, 0xBBBBBBBB, 0xCCCCCCCC), false, 2).unwrap();
        let mut buf = Vec::new();
        d.write(&mut buf);
        assert_eq!(&buf[0..4], &0xAAAAAAAAu32.to_le_bytes());
        assert_eq!(&buf[4..8], &0xBBBBBBBBu32.to_le_bytes());
        assert_eq!(&buf[8..12], &0xCCCCCCCCu32.to_le_bytes());
    }
}

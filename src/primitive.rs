//! Scalar primitive codecs (spec §4.2): the native/LEB128 choice for
//! integers and chars, fixed tags for floats, decimal and date-time, and the
//! byte/dedicated-tag split for booleans.
//!
//! `to_le_bytes`/`from_le_bytes` already produce and consume the portable
//! little-endian wire layout on any host, so there is no manual byte-swap
//! step here the way a C-shaped port would need.

use crate::context::OptimizationMode;
use crate::datetime::WireDateTime;
use crate::decimal::WireDecimal;
use crate::error::{Error, Result};
use crate::io::{ByteSource, Writer};
use crate::leb128;
use crate::tag::Tag;

macro_rules! unsigned_width {
    ($write:ident, $read:ident, $t:ty, $native:expr, $leb:expr) => {
        pub fn $write(w: &mut Writer, v: $t, mode: OptimizationMode) {
            let native_len = std::mem::size_of::<$t>();
            if mode == OptimizationMode::Speed {
                w.write_byte($native.as_u8());
                w.write_all(&v.to_le_bytes());
                return;
            }
            let mut leb = Vec::new();
            leb128::write_unsigned(&mut leb, v as u64);
            if leb.len() < native_len {
                w.write_byte($leb.as_u8());
                w.write_all(&leb);
            } else {
                w.write_byte($native.as_u8());
                w.write_all(&v.to_le_bytes());
            }
        }

        pub fn $read(tag: Tag, src: &mut dyn ByteSource) -> Result<$t> {
            if tag == $native {
                let mut bytes = [0u8; std::mem::size_of::<$t>()];
                src.read_exact(&mut bytes)?;
                Ok(<$t>::from_le_bytes(bytes))
            } else if tag == $leb {
                Ok(leb128::read_unsigned_64(src)? as $t)
            } else {
                Err(Error::unexpected_tag(format!("{} or {}", $native, $leb), tag.to_string()))
            }
        }
    };
}

macro_rules! signed_width {
    ($write:ident, $read:ident, $t:ty, $native:expr, $leb:expr) => {
        pub fn $write(w: &mut Writer, v: $t, mode: OptimizationMode) {
            let native_len = std::mem::size_of::<$t>();
            if mode == OptimizationMode::Speed {
                w.write_byte($native.as_u8());
                w.write_all(&v.to_le_bytes());
                return;
            }
            let mut leb = Vec::new();
            leb128::write_signed(&mut leb, v as i64);
            if leb.len() < native_len {
                w.write_byte($leb.as_u8());
                w.write_all(&leb);
            } else {
                w.write_byte($native.as_u8());
                w.write_all(&v.to_le_bytes());
            }
        }

        pub fn $read(tag: Tag, src: &mut dyn ByteSource) -> Result<$t> {
            if tag == $native {
                let mut bytes = [0u8; std::mem::size_of::<$t>()];
                src.read_exact(&mut bytes)?;
                Ok(<$t>::from_le_bytes(bytes))
            } else if tag == $leb {
                Ok(leb128::read_signed_64(src)? as $t)
            } else {
                Err(Error::unexpected_tag(format!("{} or {}", $native, $leb), tag.to_string()))
            }
        }
    };
}

signed_width!(write_i16, read_i16, i16, Tag::I16Native, Tag::I16Leb);
unsigned_width!(write_u16, read_u16, u16, Tag::U16Native, Tag::U16Leb);
signed_width!(write_i32, read_i32, i32, Tag::I32Native, Tag::I32Leb);
unsigned_width!(write_u32, read_u32, u32, Tag::U32Native, Tag::U32Leb);
signed_width!(write_i64, read_i64, i64, Tag::I64Native, Tag::I64Leb);
unsigned_width!(write_u64, read_u64, u64, Tag::U64Native, Tag::U64Leb);

pub fn write_i8(w: &mut Writer, v: i8) {
    w.write_byte(Tag::I8.as_u8());
    w.write_byte(v as u8);
}

pub fn read_i8(tag: Tag, src: &mut dyn ByteSource) -> Result<i8> {
    expect_tag(tag, Tag::I8)?;
    let byte = src.read_byte().ok_or(Error::UnexpectedEndOfStream)?;
    Ok(byte as i8)
}

pub fn write_u8(w: &mut Writer, v: u8) {
    w.write_byte(Tag::U8.as_u8());
    w.write_byte(v);
}

pub fn read_u8(tag: Tag, src: &mut dyn ByteSource) -> Result<u8> {
    expect_tag(tag, Tag::U8)?;
    src.read_byte().ok_or(Error::UnexpectedEndOfStream)
}

pub fn write_f32(w: &mut Writer, v: f32) {
    w.write_byte(Tag::F32.as_u8());
    w.write_all(&v.to_le_bytes());
}

pub fn read_f32(tag: Tag, src: &mut dyn ByteSource) -> Result<f32> {
    expect_tag(tag, Tag::F32)?;
    let mut bytes = [0u8; 4];
    src.read_exact(&mut bytes)?;
    Ok(f32::from_le_bytes(bytes))
}

pub fn write_f64(w: &mut Writer, v: f64) {
    w.write_byte(Tag::F64.as_u8());
    w.write_all(&v.to_le_bytes());
}

pub fn read_f64(tag: Tag, src: &mut dyn ByteSource) -> Result<f64> {
    expect_tag(tag, Tag::F64)?;
    let mut bytes = [0u8; 8];
    src.read_exact(&mut bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

/// UTF-16 code unit, sharing the native/LEB128 choice with `u16`.
pub fn write_char(w: &mut Writer, v: u16, mode: OptimizationMode) {
    let native_len = std::mem::size_of::<u16>();
    if mode == OptimizationMode::Speed {
        w.write_byte(Tag::CharNative.as_u8());
        w.write_all(&v.to_le_bytes());
        return;
    }
    let mut leb = Vec::new();
    leb128::write_unsigned(&mut leb, v as u64);
    if leb.len() < native_len {
        w.write_byte(Tag::CharLeb.as_u8());
        w.write_all(&leb);
    } else {
        w.write_byte(Tag::CharNative.as_u8());
        w.write_all(&v.to_le_bytes());
    }
}

pub fn read_char(tag: Tag, src: &mut dyn ByteSource) -> Result<u16> {
    if tag == Tag::CharNative {
        let mut bytes = [0u8; 2];
        src.read_exact(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    } else if tag == Tag::CharLeb {
        Ok(leb128::read_unsigned_64(src)? as u16)
    } else {
        Err(Error::unexpected_tag("CharNative or CharLeb", tag.to_string()))
    }
}

pub fn write_bool(w: &mut Writer, v: bool, mode: OptimizationMode) {
    match mode {
        OptimizationMode::Speed => {
            w.write_byte(Tag::BoolByte.as_u8());
            w.write_byte(if v { 1 } else { 0 });
        }
        OptimizationMode::Size => {
            w.write_byte(if v { Tag::BoolTrue.as_u8() } else { Tag::BoolFalse.as_u8() });
        }
    }
}

pub fn read_bool(tag: Tag, src: &mut dyn ByteSource) -> Result<bool> {
    match tag {
        Tag::BoolByte => Ok(src.read_byte().ok_or(Error::UnexpectedEndOfStream)? != 0),
        Tag::BoolTrue => Ok(true),
        Tag::BoolFalse => Ok(false),
        other => Err(Error::unexpected_tag("BoolByte, BoolTrue or BoolFalse", other.to_string())),
    }
}

pub fn write_decimal(w: &mut Writer, v: &WireDecimal) {
    w.write_byte(Tag::Decimal.as_u8());
    let mut bytes = Vec::with_capacity(16);
    v.write(&mut bytes);
    w.write_all(&bytes);
}

pub fn read_decimal(tag: Tag, src: &mut dyn ByteSource) -> Result<WireDecimal> {
    expect_tag(tag, Tag::Decimal)?;
    WireDecimal::read(src)
}

pub fn write_datetime(w: &mut Writer, v: &WireDateTime) {
    w.write_byte(Tag::DateTime.as_u8());
    let mut bytes = Vec::with_capacity(8);
    v.write(&mut bytes);
    w.write_all(&bytes);
}

pub fn read_datetime(tag: Tag, src: &mut dyn ByteSource) -> Result<WireDateTime> {
    expect_tag(tag, Tag::DateTime)?;
    WireDateTime::read(src)
}

pub fn write_str(w: &mut Writer, v: &str) {
    w.write_byte(Tag::Str.as_u8());
    let mut len_bytes = Vec::new();
    leb128::write_unsigned(&mut len_bytes, v.len() as u64);
    w.write_all(&len_bytes);
    w.write_all(v.as_bytes());
}

/// Reads a string payload assuming the `Str` tag has already been consumed.
pub fn read_str_body(src: &mut dyn ByteSource) -> Result<String> {
    let len = leb128::read_unsigned_64(src)? as usize;
    let bytes = src.read_vec(len)?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidUtf8(e.utf8_error()))
}

fn expect_tag(got: Tag, expected: Tag) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::unexpected_tag(expected.to_string(), got.to_string()))
    }
}

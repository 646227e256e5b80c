//! Array codecs (spec §4.6): SZARRAY (one-dimensional, zero-based) and
//! MDARRAY (multi-dimensional or non-zero-based), each with a speed path
//! (fixed-width native elements) and a size path (a bitmap prefix that picks
//! LEB128 or native per element for integers/chars).
//!
//! Byte arrays and boolean arrays get their own dedicated tags rather than
//! routing through the generic primitive-kind path: bytes need no bitmap at
//! all, and bools pack to one bit per element instead of choosing between
//! native and LEB128. `PrimitiveKind::U8` is therefore never emitted by this
//! module — byte slices always take the `SzArrayByte`/`MdArrayByte` path.

use crate::context::OptimizationMode;
use crate::datetime::WireDateTime;
use crate::decimal::WireDecimal;
use crate::error::{Error, Result};
use crate::io::{ByteSource, Writer};
use crate::leb128;
use crate::tag::{PrimitiveKind, Tag};

/// A dimension's lower bound and length, as used by MDARRAY headers.
pub type Dim = (u64, usize);

#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValues {
    I8(Vec<i8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Char(Vec<u16>),
    Decimal(Vec<WireDecimal>),
    DateTime(Vec<WireDateTime>),
}

impl PrimitiveValues {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveValues::I8(_) => PrimitiveKind::I8,
            PrimitiveValues::I16(_) => PrimitiveKind::I16,
            PrimitiveValues::U16(_) => PrimitiveKind::U16,
            PrimitiveValues::I32(_) => PrimitiveKind::I32,
            PrimitiveValues::U32(_) => PrimitiveKind::U32,
            PrimitiveValues::I64(_) => PrimitiveKind::I64,
            PrimitiveValues::U64(_) => PrimitiveKind::U64,
            PrimitiveValues::F32(_) => PrimitiveKind::F32,
            PrimitiveValues::F64(_) => PrimitiveKind::F64,
            PrimitiveValues::Char(_) => PrimitiveKind::Char,
            PrimitiveValues::Decimal(_) => PrimitiveKind::Decimal,
            PrimitiveValues::DateTime(_) => PrimitiveKind::DateTime,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimitiveValues::I8(v) => v.len(),
            PrimitiveValues::I16(v) => v.len(),
            PrimitiveValues::U16(v) => v.len(),
            PrimitiveValues::I32(v) => v.len(),
            PrimitiveValues::U32(v) => v.len(),
            PrimitiveValues::I64(v) => v.len(),
            PrimitiveValues::U64(v) => v.len(),
            PrimitiveValues::F32(v) => v.len(),
            PrimitiveValues::F64(v) => v.len(),
            PrimitiveValues::Char(v) => v.len(),
            PrimitiveValues::Decimal(v) => v.len(),
            PrimitiveValues::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An element type with both a fixed-width native encoding and a LEB128
/// encoding, for the compact-array bitmap choice.
trait ArrayElement: Copy + Sized {
    fn native_len() -> usize;
    fn write_native(self, buf: &mut Vec<u8>);
    fn read_native(src: &mut dyn ByteSource) -> Result<Self>;
    fn leb_len(self) -> usize;
    fn write_leb(self, buf: &mut Vec<u8>);
    fn read_leb(src: &mut dyn ByteSource) -> Result<Self>;
}

macro_rules! signed_element {
    ($t:ty) => {
        impl ArrayElement for $t {
            fn native_len() -> usize {
                std::mem::size_of::<$t>()
            }
            fn write_native(self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_le_bytes());
            }
            fn read_native(src: &mut dyn ByteSource) -> Result<Self> {
                let mut bytes = [0u8; std::mem::size_of::<$t>()];
                src.read_exact(&mut bytes)?;
                Ok(<$t>::from_le_bytes(bytes))
            }
            fn leb_len(self) -> usize {
                leb128::byte_count_i64(self as i64)
            }
            fn write_leb(self, buf: &mut Vec<u8>) {
                leb128::write_signed(buf, self as i64);
            }
            fn read_leb(src: &mut dyn ByteSource) -> Result<Self> {
                Ok(leb128::read_signed_64(src)? as $t)
            }
        }
    };
}

macro_rules! unsigned_element {
    ($t:ty) => {
        impl ArrayElement for $t {
            fn native_len() -> usize {
                std::mem::size_of::<$t>()
            }
            fn write_native(self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_le_bytes());
            }
            fn read_native(src: &mut dyn ByteSource) -> Result<Self> {
                let mut bytes = [0u8; std::mem::size_of::<$t>()];
                src.read_exact(&mut bytes)?;
                Ok(<$t>::from_le_bytes(bytes))
            }
            fn leb_len(self) -> usize {
                leb128::byte_count_u64(self as u64)
            }
            fn write_leb(self, buf: &mut Vec<u8>) {
                leb128::write_unsigned(buf, self as u64);
            }
            fn read_leb(src: &mut dyn ByteSource) -> Result<Self> {
                Ok(leb128::read_unsigned_64(src)? as $t)
            }
        }
    };
}

signed_element!(i16);
unsigned_element!(u16);
signed_element!(i32);
unsigned_element!(u32);
signed_element!(i64);
unsigned_element!(u64);

fn write_compact<T: ArrayElement>(w: &mut Writer, values: &[T]) {
    let bitmap_len = values.len().div_ceil(8);
    let mut bitmap = vec![0u8; bitmap_len];
    let mut payload = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if v.leb_len() < T::native_len() {
            bitmap[i / 8] |= 1 << (i % 8);
            v.write_leb(&mut payload);
        } else {
            v.write_native(&mut payload);
        }
    }
    w.write_all(&bitmap);
    w.write_all(&payload);
}

fn read_compact<T: ArrayElement>(src: &mut dyn ByteSource, len: usize) -> Result<Vec<T>> {
    let bitmap = src.read_vec(len.div_ceil(8))?;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let use_leb = bitmap[i / 8] & (1 << (i % 8)) != 0;
        out.push(if use_leb { T::read_leb(src)? } else { T::read_native(src)? });
    }
    Ok(out)
}

fn write_native_seq<T: ArrayElement>(w: &mut Writer, values: &[T]) {
    let mut payload = Vec::new();
    for v in values {
        v.write_native(&mut payload);
    }
    w.write_all(&payload);
}

fn read_native_seq<T: ArrayElement>(src: &mut dyn ByteSource, len: usize) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(T::read_native(src)?);
    }
    Ok(out)
}

fn write_elements_body(w: &mut Writer, values: &PrimitiveValues, mode: OptimizationMode) {
    let compact = mode == OptimizationMode::Size;
    match values {
        PrimitiveValues::I8(v) => {
            let mut payload = Vec::with_capacity(v.len());
            payload.extend(v.iter().map(|b| *b as u8));
            w.write_all(&payload);
        }
        PrimitiveValues::I16(v) => {
            if compact { write_compact(w, v) } else { write_native_seq(w, v) }
        }
        PrimitiveValues::U16(v) | PrimitiveValues::Char(v) => {
            if compact { write_compact(w, v) } else { write_native_seq(w, v) }
        }
        PrimitiveValues::I32(v) => {
            if compact { write_compact(w, v) } else { write_native_seq(w, v) }
        }
        PrimitiveValues::U32(v) => {
            if compact { write_compact(w, v) } else { write_native_seq(w, v) }
        }
        PrimitiveValues::I64(v) => {
            if compact { write_compact(w, v) } else { write_native_seq(w, v) }
        }
        PrimitiveValues::U64(v) => {
            if compact { write_compact(w, v) } else { write_native_seq(w, v) }
        }
        PrimitiveValues::F32(v) => {
            let mut payload = Vec::new();
            for x in v {
                payload.extend_from_slice(&x.to_le_bytes());
            }
            w.write_all(&payload);
        }
        PrimitiveValues::F64(v) => {
            let mut payload = Vec::new();
            for x in v {
                payload.extend_from_slice(&x.to_le_bytes());
            }
            w.write_all(&payload);
        }
        PrimitiveValues::Decimal(v) => {
            let mut payload = Vec::new();
            for x in v {
                x.write(&mut payload);
            }
            w.write_all(&payload);
        }
        PrimitiveValues::DateTime(v) => {
            let mut payload = Vec::new();
            for x in v {
                x.write(&mut payload);
            }
            w.write_all(&payload);
        }
    }
}

fn read_elements_body(
    src: &mut dyn ByteSource,
    kind: PrimitiveKind,
    len: usize,
    mode: OptimizationMode,
) -> Result<PrimitiveValues> {
    let compact = mode == OptimizationMode::Size;
    Ok(match kind {
        PrimitiveKind::I8 => {
            let bytes = src.read_vec(len)?;
            PrimitiveValues::I8(bytes.into_iter().map(|b| b as i8).collect())
        }
        PrimitiveKind::U8 => {
            return Err(Error::unexpected_tag(
                "a dedicated byte-array tag",
                "PrimitiveKind::U8 inside SzArrayPrimitive/MdArrayPrimitive",
            ))
        }
        PrimitiveKind::I16 => {
            PrimitiveValues::I16(if compact { read_compact(src, len)? } else { read_native_seq(src, len)? })
        }
        PrimitiveKind::U16 => {
            PrimitiveValues::U16(if compact { read_compact(src, len)? } else { read_native_seq(src, len)? })
        }
        PrimitiveKind::I32 => {
            PrimitiveValues::I32(if compact { read_compact(src, len)? } else { read_native_seq(src, len)? })
        }
        PrimitiveKind::U32 => {
            PrimitiveValues::U32(if compact { read_compact(src, len)? } else { read_native_seq(src, len)? })
        }
        PrimitiveKind::I64 => {
            PrimitiveValues::I64(if compact { read_compact(src, len)? } else { read_native_seq(src, len)? })
        }
        PrimitiveKind::U64 => {
            PrimitiveValues::U64(if compact { read_compact(src, len)? } else { read_native_seq(src, len)? })
        }
        PrimitiveKind::F32 => {
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                let mut bytes = [0u8; 4];
                src.read_exact(&mut bytes)?;
                out.push(f32::from_le_bytes(bytes));
            }
            PrimitiveValues::F32(out)
        }
        PrimitiveKind::F64 => {
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                let mut bytes = [0u8; 8];
                src.read_exact(&mut bytes)?;
                out.push(f64::from_le_bytes(bytes));
            }
            PrimitiveValues::F64(out)
        }
        PrimitiveKind::Char => {
            PrimitiveValues::Char(if compact { read_compact(src, len)? } else { read_native_seq(src, len)? })
        }
        PrimitiveKind::Decimal => {
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(WireDecimal::read(src)?);
            }
            PrimitiveValues::Decimal(out)
        }
        PrimitiveKind::DateTime => {
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(WireDateTime::read(src)?);
            }
            PrimitiveValues::DateTime(out)
        }
    })
}

fn write_len(w: &mut Writer, len: usize) {
    let mut bytes = Vec::new();
    leb128::write_unsigned(&mut bytes, len as u64);
    w.write_all(&bytes);
}

fn read_len(src: &mut dyn ByteSource) -> Result<usize> {
    Ok(leb128::read_unsigned_64(src)? as usize)
}

fn write_dims(w: &mut Writer, dims: &[Dim]) {
    write_len(w, dims.len());
    for (lower, len) in dims {
        let mut bytes = Vec::new();
        leb128::write_unsigned(&mut bytes, *lower);
        leb128::write_unsigned(&mut bytes, *len as u64);
        w.write_all(&bytes);
    }
}

fn read_dims(src: &mut dyn ByteSource) -> Result<Vec<Dim>> {
    let rank = read_len(src)?;
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        let lower = leb128::read_unsigned_64(src)?;
        let len = leb128::read_unsigned_64(src)? as usize;
        dims.push((lower, len));
    }
    Ok(dims)
}

fn dims_element_count(dims: &[Dim]) -> usize {
    dims.iter().map(|(_, len)| *len).product()
}

// ---- SZARRAY, primitive element ----

pub fn write_sz_primitive_array(w: &mut Writer, values: &PrimitiveValues, mode: OptimizationMode) {
    w.write_byte(Tag::SzArrayPrimitive.as_u8());
    w.write_byte(values.kind().as_u8());
    write_len(w, values.len());
    write_elements_body(w, values, mode);
}

/// Assumes the `SzArrayPrimitive` tag has already been consumed.
pub fn read_sz_primitive_array(src: &mut dyn ByteSource, mode: OptimizationMode) -> Result<PrimitiveValues> {
    let kind = PrimitiveKind::try_from_u8(src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?;
    let len = read_len(src)?;
    read_elements_body(src, kind, len, mode)
}

// ---- MDARRAY, primitive element ----

pub fn write_md_primitive_array(w: &mut Writer, dims: &[Dim], values: &PrimitiveValues, mode: OptimizationMode) {
    debug_assert_eq!(dims_element_count(dims), values.len());
    w.write_byte(Tag::MdArrayPrimitive.as_u8());
    w.write_byte(values.kind().as_u8());
    write_dims(w, dims);
    write_elements_body(w, values, mode);
}

/// Assumes the `MdArrayPrimitive` tag has already been consumed.
pub fn read_md_primitive_array(
    src: &mut dyn ByteSource,
    mode: OptimizationMode,
) -> Result<(Vec<Dim>, PrimitiveValues)> {
    let kind = PrimitiveKind::try_from_u8(src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?;
    let dims = read_dims(src)?;
    let len = dims_element_count(&dims);
    let values = read_elements_body(src, kind, len, mode)?;
    Ok((dims, values))
}

// ---- byte arrays (dedicated tag, no bitmap) ----

pub fn write_sz_byte_array(w: &mut Writer, bytes: &[u8]) {
    w.write_byte(Tag::SzArrayByte.as_u8());
    write_len(w, bytes.len());
    w.write_all(bytes);
}

/// Assumes the `SzArrayByte` tag has already been consumed.
pub fn read_sz_byte_array(src: &mut dyn ByteSource) -> Result<Vec<u8>> {
    let len = read_len(src)?;
    src.read_vec(len)
}

pub fn write_md_byte_array(w: &mut Writer, dims: &[Dim], bytes: &[u8]) {
    debug_assert_eq!(dims_element_count(dims), bytes.len());
    w.write_byte(Tag::MdArrayByte.as_u8());
    write_dims(w, dims);
    w.write_all(bytes);
}

/// Assumes the `MdArrayByte` tag has already been consumed.
pub fn read_md_byte_array(src: &mut dyn ByteSource) -> Result<(Vec<Dim>, Vec<u8>)> {
    let dims = read_dims(src)?;
    let bytes = src.read_vec(dims_element_count(&dims))?;
    Ok((dims, bytes))
}

// ---- boolean arrays ----

pub fn write_sz_bool_array(w: &mut Writer, bits: &[bool], mode: OptimizationMode) {
    w.write_byte(Tag::SzArrayBool.as_u8());
    write_len(w, bits.len());
    write_bool_body(w, bits, mode);
}

/// Assumes the `SzArrayBool` tag has already been consumed.
pub fn read_sz_bool_array(src: &mut dyn ByteSource, mode: OptimizationMode) -> Result<Vec<bool>> {
    let len = read_len(src)?;
    read_bool_body(src, len, mode)
}

pub fn write_md_bool_array(w: &mut Writer, dims: &[Dim], bits: &[bool], mode: OptimizationMode) {
    debug_assert_eq!(dims_element_count(dims), bits.len());
    w.write_byte(Tag::MdArrayBool.as_u8());
    write_dims(w, dims);
    write_bool_body(w, bits, mode);
}

/// Assumes the `MdArrayBool` tag has already been consumed.
pub fn read_md_bool_array(src: &mut dyn ByteSource, mode: OptimizationMode) -> Result<(Vec<Dim>, Vec<bool>)> {
    let dims = read_dims(src)?;
    let len = dims_element_count(&dims);
    let bits = read_bool_body(src, len, mode)?;
    Ok((dims, bits))
}

fn write_bool_body(w: &mut Writer, bits: &[bool], mode: OptimizationMode) {
    match mode {
        OptimizationMode::Speed => {
            let bytes: Vec<u8> = bits.iter().map(|b| if *b { 1 } else { 0 }).collect();
            w.write_all(&bytes);
        }
        OptimizationMode::Size => {
            let mut packed = vec![0u8; bits.len().div_ceil(8)];
            for (i, b) in bits.iter().enumerate() {
                if *b {
                    packed[i / 8] |= 1 << (i % 8);
                }
            }
            w.write_all(&packed);
        }
    }
}

fn read_bool_body(src: &mut dyn ByteSource, len: usize, mode: OptimizationMode) -> Result<Vec<bool>> {
    match mode {
        OptimizationMode::Speed => {
            let bytes = src.read_vec(len)?;
            Ok(bytes.into_iter().map(|b| b != 0).collect())
        }
        OptimizationMode::Size => {
            let packed = src.read_vec(len.div_ceil(8))?;
            Ok((0..len).map(|i| packed[i / 8] & (1 << (i % 8)) != 0).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SliceSource;

    #[test]
    fn sz_primitive_array_round_trips_both_modes() {
        for mode in [OptimizationMode::Speed, OptimizationMode::Size] {
            let values = PrimitiveValues::I32(vec![1, 300, -5, 70000]);
            let mut w = Writer::new();
            write_sz_primitive_array(&mut w, &values, mode);
            let bytes = w.into_vec();
            let mut src = SliceSource::new(&bytes);
            let tag = Tag::try_from_u8(src.read_byte().unwrap()).unwrap();
            assert_eq!(tag, Tag::SzArrayPrimitive);
            let back = read_sz_primitive_array(&mut src, mode).unwrap();
            assert_eq!(back, values);
        }
    }

    #[test]
    fn s6_md_int32_matrix_row_major() {
        let dims = vec![(0u64, 2usize), (0u64, 3usize)];
        let values = PrimitiveValues::I32(vec![1, 2, 3, 4, 5, 6]);
        let mut w = Writer::new();
        write_md_primitive_array(&mut w, &dims, &values, OptimizationMode::Speed);
        let bytes = w.into_vec();
        let mut src = SliceSource::new(&bytes);
        let tag = Tag::try_from_u8(src.read_byte().unwrap()).unwrap();
        assert_eq!(tag, Tag::MdArrayPrimitive);
        let (back_dims, back_values) = read_md_primitive_array(&mut src, OptimizationMode::Speed).unwrap();
        assert_eq!(back_dims, dims);
        assert_eq!(back_values, values);
    }

    #[test]
    fn byte_array_has_no_bitmap_or_kind_byte() {
        let mut w = Writer::new();
        write_sz_byte_array(&mut w, &[1, 2, 3]);
        let bytes = w.into_vec();
        let mut src = SliceSource::new(&bytes);
        let tag = Tag::try_from_u8(src.read_byte().unwrap()).unwrap();
        assert_eq!(tag, Tag::SzArrayByte);
        assert_eq!(read_sz_byte_array(&mut src).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn bool_array_speed_is_byte_per_element_size_is_bit_packed() {
        let bits = vec![true, false, true, true, false, false, false, true, true];
        let mut speed = Writer::new();
        write_sz_bool_array(&mut speed, &bits, OptimizationMode::Speed);
        let speed_bytes = speed.into_vec();
        let mut size = Writer::new();
        write_sz_bool_array(&mut size, &bits, OptimizationMode::Size);
        let size_bytes = size.into_vec();
        assert!(size_bytes.len() < speed_bytes.len());

        let mut src = SliceSource::new(&size_bytes);
        src.read_byte().unwrap();
        assert_eq!(read_sz_bool_array(&mut src, OptimizationMode::Size).unwrap(), bits);
    }

    #[test]
    fn md_byte_array_round_trips() {
        let dims = vec![(0u64, 2usize), (0u64, 2usize)];
        let bytes_data = vec![10u8, 20, 30, 40];
        let mut w = Writer::new();
        write_md_byte_array(&mut w, &dims, &bytes_data);
        let bytes = w.into_vec();
        let mut src = SliceSource::new(&bytes);
        src.read_byte().unwrap();
        let (back_dims, back) = read_md_byte_array(&mut src).unwrap();
        assert_eq!(back_dims, dims);
        assert_eq!(back, bytes_data);
    }
}

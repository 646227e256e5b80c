//! The closed payload-tag discriminator (spec §3/§4.2).
//!
//! Every value on the wire begins with exactly one byte from [`Tag`]; the
//! bytes that follow are entirely determined by it.

use crate::error::Error;

macro_rules! tag_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident = $value:expr),* $(,)? }) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant = $value),*
        }

        impl $name {
            pub fn try_from_u8(byte: u8) -> Result<Self, Error> {
                match byte {
                    $($value => Ok($name::$variant),)*
                    other => Err(Error::unexpected_tag(
                        concat!("one of ", stringify!($name), "'s variants"),
                        format!("0x{other:02x}"),
                    )),
                }
            }

            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}

tag_enum! {
    pub enum Tag {
        NullReference = 0,
        BackReference = 1,
        I8 = 2,
        U8 = 3,
        I16Native = 4,
        I16Leb = 5,
        U16Native = 6,
        U16Leb = 7,
        I32Native = 8,
        I32Leb = 9,
        U32Native = 10,
        U32Leb = 11,
        I64Native = 12,
        I64Leb = 13,
        U64Native = 14,
        U64Leb = 15,
        F32 = 16,
        F64 = 17,
        CharNative = 18,
        CharLeb = 19,
        Decimal = 20,
        DateTime = 21,
        BoolByte = 22,
        BoolTrue = 23,
        BoolFalse = 24,
        Str = 25,
        Type = 26,
        TypeId = 27,
        TypeObject = 28,
        ArchiveStart = 29,
        ArchiveEnd = 30,
        BaseArchiveStart = 31,
        Enum = 32,
        Buffer = 33,
        SzArrayPrimitive = 34,
        MdArrayPrimitive = 35,
        SzArrayByte = 36,
        MdArrayByte = 37,
        SzArrayBool = 38,
        MdArrayBool = 39,
        SzArrayObject = 40,
        MdArrayObject = 41,
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The 13 primitive scalar kinds (spec §2 item 1 / §4.2), used both to tag
/// scalar values directly and as the per-element discriminator inside
/// primitive array payloads.
tag_enum! {
    pub enum PrimitiveKind {
        I8 = 0,
        U8 = 1,
        I16 = 2,
        U16 = 3,
        I32 = 4,
        U32 = 5,
        I64 = 6,
        U64 = 7,
        F32 = 8,
        F64 = 9,
        Char = 10,
        Decimal = 11,
        DateTime = 12,
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips_through_raw_byte() {
        for tag in [Tag::NullReference, Tag::ArchiveEnd, Tag::MdArrayObject] {
            assert_eq!(Tag::try_from_u8(tag.as_u8()).unwrap(), tag);
        }
    }

    #[test]
    fn unknown_tag_byte_is_an_error() {
        assert!(Tag::try_from_u8(250).is_err());
    }
}

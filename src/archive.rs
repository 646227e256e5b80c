//! The archive boundary (spec §4.5/§4.7/§9): `WriteArchive`/`ReadArchive`
//! pair a byte sink/source with the per-pass type and object tables and hand
//! out the field-level codecs a custom serializer's `write`/decode thunk
//! calls. This is the layer the registered `Archivable::write` and the
//! registry's decode thunks are actually written against.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::array::{self, Dim, PrimitiveValues};
use crate::context::Context;
use crate::datetime::WireDateTime;
use crate::decimal::WireDecimal;
use crate::error::{Error, Result};
use crate::io::{ByteSource, Writer};
use crate::leb128;
use crate::object_table::{DecoderObjectTable, EncoderObjectTable};
use crate::primitive;
use crate::registry::{self, Archivable, ObjectHandle};
use crate::tag::Tag;
use crate::type_table::{DecoderTypeTable, EncoderTypeTable, TypeRef};

/// Compile-time stand-in for a runtime is-assignable-from check (spec §4.5's
/// base-archive chaining): implement `BaseOf<Base>` for `Derived` once per
/// link in its inheritance chain, then call
/// [`WriteArchive::write_base_archive_for`] with `Derived` as the witness
/// type parameter.
pub trait BaseOf<B> {}

/// Per-pass override of the version a type is written at, keyed by type
/// name (spec §3). Falls back to the type's own registered maximum when no
/// override is set.
#[derive(Default)]
pub struct VersionTable {
    overrides: HashMap<String, u32>,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, type_name: impl Into<String>, version: u32) {
        self.overrides.insert(type_name.into(), version);
    }

    fn resolve(&self, type_name: &str, declared_max: u32) -> u32 {
        self.overrides.get(type_name).copied().unwrap_or(declared_max)
    }
}

pub struct WriteArchive<'a> {
    writer: &'a mut Writer,
    types: &'a mut EncoderTypeTable,
    objects: &'a mut EncoderObjectTable,
    versions: &'a VersionTable,
    ctx: &'a Context,
}

impl<'a> WriteArchive<'a> {
    pub fn new(
        writer: &'a mut Writer,
        types: &'a mut EncoderTypeTable,
        objects: &'a mut EncoderObjectTable,
        versions: &'a VersionTable,
        ctx: &'a Context,
    ) -> Self {
        WriteArchive { writer, types, objects, versions, ctx }
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    pub fn write_i8(&mut self, v: i8) {
        primitive::write_i8(self.writer, v);
    }
    pub fn write_u8(&mut self, v: u8) {
        primitive::write_u8(self.writer, v);
    }
    pub fn write_f32(&mut self, v: f32) {
        primitive::write_f32(self.writer, v);
    }
    pub fn write_f64(&mut self, v: f64) {
        primitive::write_f64(self.writer, v);
    }
    pub fn write_i16(&mut self, v: i16) {
        primitive::write_i16(self.writer, v, self.ctx.mode());
    }
    pub fn write_u16(&mut self, v: u16) {
        primitive::write_u16(self.writer, v, self.ctx.mode());
    }
    pub fn write_i32(&mut self, v: i32) {
        primitive::write_i32(self.writer, v, self.ctx.mode());
    }
    pub fn write_u32(&mut self, v: u32) {
        primitive::write_u32(self.writer, v, self.ctx.mode());
    }
    pub fn write_i64(&mut self, v: i64) {
        primitive::write_i64(self.writer, v, self.ctx.mode());
    }
    pub fn write_u64(&mut self, v: u64) {
        primitive::write_u64(self.writer, v, self.ctx.mode());
    }
    /// Writes a UTF-16 code unit (spec §3's `char`); see [`primitive::write_char`].
    pub fn write_char(&mut self, v: u16) {
        primitive::write_char(self.writer, v, self.ctx.mode());
    }
    pub fn write_bool(&mut self, v: bool) {
        primitive::write_bool(self.writer, v, self.ctx.mode());
    }
    pub fn write_decimal(&mut self, v: &WireDecimal) {
        primitive::write_decimal(self.writer, v);
    }
    pub fn write_datetime(&mut self, v: &WireDateTime) {
        primitive::write_datetime(self.writer, v);
    }

    /// Writes a string, or `NullReference` for `None`. Non-null strings
    /// share the object id space (spec §4.4): a repeat of an
    /// already-written string writes a `BackReference` instead of the bytes
    /// again.
    pub fn write_str(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            self.writer.write_byte(Tag::NullReference.as_u8());
            return;
        };
        if let Some(id) = self.objects.lookup_string(value) {
            self.writer.write_byte(Tag::BackReference.as_u8());
            let mut bytes = Vec::new();
            leb128::write_unsigned(&mut bytes, id as u64);
            self.writer.write_all(&bytes);
            return;
        }
        self.objects.reserve_string(value);
        primitive::write_str(self.writer, value);
    }

    pub fn write_sz_primitive_array(&mut self, values: &PrimitiveValues) {
        array::write_sz_primitive_array(self.writer, values, self.ctx.mode());
    }
    pub fn write_md_primitive_array(&mut self, dims: &[Dim], values: &PrimitiveValues) {
        array::write_md_primitive_array(self.writer, dims, values, self.ctx.mode());
    }
    pub fn write_sz_byte_array(&mut self, bytes: &[u8]) {
        array::write_sz_byte_array(self.writer, bytes);
    }
    pub fn write_md_byte_array(&mut self, dims: &[Dim], bytes: &[u8]) {
        array::write_md_byte_array(self.writer, dims, bytes);
    }
    pub fn write_sz_bool_array(&mut self, bits: &[bool]) {
        array::write_sz_bool_array(self.writer, bits, self.ctx.mode());
    }
    pub fn write_md_bool_array(&mut self, dims: &[Dim], bits: &[bool]) {
        array::write_md_bool_array(self.writer, dims, bits, self.ctx.mode());
    }

    /// Writes a one-dimensional array of (possibly null) objects: the
    /// `SzArrayObject` tag, a ULEB128 length, then each element through
    /// [`Self::write_object`] so elements fully participate in back-reference
    /// interning the same as any other object field (spec §4.6).
    pub fn write_sz_object_array(&mut self, values: &[Option<Rc<dyn Archivable>>]) -> Result<()> {
        self.writer.write_byte(Tag::SzArrayObject.as_u8());
        let mut len = Vec::new();
        leb128::write_unsigned(&mut len, values.len() as u64);
        self.writer.write_all(&len);
        for v in values {
            self.write_object(v.as_ref())?;
        }
        Ok(())
    }

    /// Multi-dimensional counterpart of [`Self::write_sz_object_array`].
    pub fn write_md_object_array(&mut self, dims: &[Dim], values: &[Option<Rc<dyn Archivable>>]) -> Result<()> {
        self.writer.write_byte(Tag::MdArrayObject.as_u8());
        let mut bytes = Vec::new();
        leb128::write_unsigned(&mut bytes, dims.len() as u64);
        for (lower, len) in dims {
            leb128::write_unsigned(&mut bytes, *lower);
            leb128::write_unsigned(&mut bytes, *len as u64);
        }
        self.writer.write_all(&bytes);
        for v in values {
            self.write_object(v.as_ref())?;
        }
        Ok(())
    }

    /// Writes an enum's declaring type followed by its underlying integer
    /// value (spec §4.5).
    pub fn write_enum(&mut self, type_name: &str, value: i64) {
        let t = TypeRef::simple(type_name);
        self.types.write_type_metadata(self.writer, &t);
        self.writer.write_byte(Tag::Enum.as_u8());
        let mut bytes = Vec::new();
        leb128::write_signed(&mut bytes, value);
        self.writer.write_all(&bytes);
    }

    /// Writes `target` as a first-class type-object value (spec §4.5): the
    /// reified handle type's own metadata, the `TypeObject` tag, then the
    /// decomposed target type.
    pub fn write_type_object(&mut self, target: &TypeRef) {
        let handle_type = TypeRef::simple("objwire.TypeObject");
        self.types.write_type_metadata(self.writer, &handle_type);
        self.writer.write_byte(Tag::TypeObject.as_u8());
        self.types.write_type_metadata(self.writer, target);
        self.objects.reserve_anonymous();
    }

    /// Writes `bytes` as an opaque length-prefixed payload (spec §4.7).
    pub fn write_buffer(&mut self, bytes: &[u8]) {
        self.writer.write_byte(Tag::Buffer.as_u8());
        let mut len = Vec::new();
        leb128::write_unsigned(&mut len, bytes.len() as u64);
        self.writer.write_all(&len);
        self.writer.write_all(bytes);
    }

    /// Writes `bytes` as a stream payload. The writer's buffered-sink
    /// contract already collects the whole value before a commit, so this
    /// is simply [`Self::write_buffer`] under a different name for callers
    /// thinking in stream terms rather than true incremental chunking.
    pub fn write_stream(&mut self, bytes: &[u8]) {
        self.write_buffer(bytes);
    }

    /// Writes `value`, or `NullReference` for `None`. A value seen before
    /// (by `Rc` allocation identity) writes a `BackReference` instead of
    /// re-encoding it.
    pub fn write_object(&mut self, value: Option<&Rc<dyn Archivable>>) -> Result<()> {
        let Some(value) = value else {
            self.writer.write_byte(Tag::NullReference.as_u8());
            return Ok(());
        };
        let ptr = Rc::as_ptr(value) as *const () as usize;
        if let Some(id) = self.objects.lookup_ptr(ptr) {
            self.writer.write_byte(Tag::BackReference.as_u8());
            let mut bytes = Vec::new();
            leb128::write_unsigned(&mut bytes, id as u64);
            self.writer.write_all(&bytes);
            return Ok(());
        }

        let type_name = value.type_name().to_string();
        let t = TypeRef::simple(type_name.clone());
        self.types.write_type_metadata(self.writer, &t);
        self.objects.reserve_ptr(ptr);

        let declared_max = registry::max_supported_version(&type_name).unwrap_or(0);
        let version = self.versions.resolve(&type_name, declared_max);
        self.writer.write_byte(Tag::ArchiveStart.as_u8());
        let mut vbytes = Vec::new();
        leb128::write_unsigned(&mut vbytes, version as u64);
        self.writer.write_all(&vbytes);

        value.write(self)?;

        self.writer.write_byte(Tag::ArchiveEnd.as_u8());
        Ok(())
    }

    /// Writes `base`'s type metadata, a `BaseArchiveStart` tag and version,
    /// then `base`'s own fields inline — with no matching `ArchiveEnd`,
    /// since a base segment is not a separately bounded region (spec §9
    /// Open Question (a)). `Derived` only serves as the compile-time
    /// witness that `base` really is a base of the type currently being
    /// written.
    pub fn write_base_archive_for<Derived, B>(&mut self, base: &B) -> Result<()>
    where
        Derived: BaseOf<B>,
        B: Archivable,
    {
        let type_name = base.type_name().to_string();
        let t = TypeRef::simple(type_name.clone());
        self.types.write_type_metadata(self.writer, &t);

        let declared_max = registry::max_supported_version(&type_name).unwrap_or(0);
        let version = self.versions.resolve(&type_name, declared_max);
        self.writer.write_byte(Tag::BaseArchiveStart.as_u8());
        let mut vbytes = Vec::new();
        leb128::write_unsigned(&mut vbytes, version as u64);
        self.writer.write_all(&vbytes);

        base.write(self)
    }
}

pub struct ReadArchive<'a> {
    src: &'a mut dyn ByteSource,
    types: &'a mut DecoderTypeTable,
    objects: &'a mut DecoderObjectTable,
    ctx: &'a Context,
    stream_remaining: Option<usize>,
}

impl<'a> ReadArchive<'a> {
    pub fn new(
        src: &'a mut dyn ByteSource,
        types: &'a mut DecoderTypeTable,
        objects: &'a mut DecoderObjectTable,
        ctx: &'a Context,
    ) -> Self {
        ReadArchive { src, types, objects, ctx, stream_remaining: None }
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    /// Discards whatever remains of a still-open stream view (spec §4.7: at
    /// most one stream view open at a time; any other archive access closes
    /// and drops the unread tail).
    fn close_stream_view(&mut self) {
        if let Some(n) = self.stream_remaining.take() {
            if n > 0 {
                self.src.skip_forward(n);
            }
        }
    }

    fn next_tag(&mut self) -> Result<Tag> {
        self.close_stream_view();
        Tag::try_from_u8(self.src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)
    }

    /// Resolves a type reference that may have been omitted on the wire
    /// because it matched the encoder's last-written-type cache (spec
    /// §4.3's "repeat of the immediately preceding type writes nothing").
    /// If `tag` is `Type`/`TypeId`, parses it normally and returns `true`
    /// (the tag was consumed as metadata, so the caller must read a fresh
    /// tag for whatever follows). Otherwise reuses `current` and returns
    /// `false` (`tag` was never metadata and is still unconsumed — the
    /// caller should interpret it directly as what comes after the type).
    fn read_possibly_cached_type(&mut self, tag: Tag) -> Result<(TypeRef, bool)> {
        if tag == Tag::Type || tag == Tag::TypeId {
            let t = self.types.read_type_metadata_with_tag(tag, self.src, self.ctx)?;
            Ok((t, true))
        } else {
            let t = self
                .types
                .current
                .clone()
                .ok_or_else(|| Error::unexpected_tag("Type or TypeId", tag.to_string()))?;
            Ok((t, false))
        }
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        let tag = self.next_tag()?;
        primitive::read_i8(tag, self.src)
    }
    pub fn read_u8(&mut self) -> Result<u8> {
        let tag = self.next_tag()?;
        primitive::read_u8(tag, self.src)
    }
    pub fn read_f32(&mut self) -> Result<f32> {
        let tag = self.next_tag()?;
        primitive::read_f32(tag, self.src)
    }
    pub fn read_f64(&mut self) -> Result<f64> {
        let tag = self.next_tag()?;
        primitive::read_f64(tag, self.src)
    }
    pub fn read_i16(&mut self) -> Result<i16> {
        let tag = self.next_tag()?;
        primitive::read_i16(tag, self.src)
    }
    pub fn read_u16(&mut self) -> Result<u16> {
        let tag = self.next_tag()?;
        primitive::read_u16(tag, self.src)
    }
    pub fn read_i32(&mut self) -> Result<i32> {
        let tag = self.next_tag()?;
        primitive::read_i32(tag, self.src)
    }
    pub fn read_u32(&mut self) -> Result<u32> {
        let tag = self.next_tag()?;
        primitive::read_u32(tag, self.src)
    }
    pub fn read_i64(&mut self) -> Result<i64> {
        let tag = self.next_tag()?;
        primitive::read_i64(tag, self.src)
    }
    pub fn read_u64(&mut self) -> Result<u64> {
        let tag = self.next_tag()?;
        primitive::read_u64(tag, self.src)
    }
    pub fn read_char(&mut self) -> Result<u16> {
        let tag = self.next_tag()?;
        primitive::read_char(tag, self.src)
    }
    pub fn read_bool(&mut self) -> Result<bool> {
        let tag = self.next_tag()?;
        primitive::read_bool(tag, self.src)
    }
    pub fn read_decimal(&mut self) -> Result<WireDecimal> {
        let tag = self.next_tag()?;
        primitive::read_decimal(tag, self.src)
    }
    pub fn read_datetime(&mut self) -> Result<WireDateTime> {
        let tag = self.next_tag()?;
        primitive::read_datetime(tag, self.src)
    }

    /// Reads `None`, a back-referenced string, or a fresh one, mirroring
    /// [`WriteArchive::write_str`].
    pub fn read_str(&mut self) -> Result<Option<Rc<str>>> {
        let tag = self.next_tag()?;
        match tag {
            Tag::NullReference => Ok(None),
            Tag::BackReference => {
                let id = leb128::read_unsigned_64(self.src)? as u32;
                Ok(Some(self.objects.resolve_string(id)?))
            }
            Tag::Str => {
                let s = primitive::read_str_body(self.src)?;
                let rc: Rc<str> = Rc::from(s);
                self.objects.reserve_string(rc.clone());
                Ok(Some(rc))
            }
            other => Err(Error::unexpected_tag("NullReference, BackReference or Str", other.to_string())),
        }
    }

    pub fn read_sz_primitive_array(&mut self) -> Result<PrimitiveValues> {
        let tag = self.next_tag()?;
        if tag != Tag::SzArrayPrimitive {
            return Err(Error::unexpected_tag("SzArrayPrimitive", tag.to_string()));
        }
        array::read_sz_primitive_array(self.src, self.ctx.mode())
    }

    pub fn read_md_primitive_array(&mut self) -> Result<(Vec<Dim>, PrimitiveValues)> {
        let tag = self.next_tag()?;
        if tag != Tag::MdArrayPrimitive {
            return Err(Error::unexpected_tag("MdArrayPrimitive", tag.to_string()));
        }
        array::read_md_primitive_array(self.src, self.ctx.mode())
    }

    pub fn read_sz_byte_array(&mut self) -> Result<Vec<u8>> {
        let tag = self.next_tag()?;
        if tag != Tag::SzArrayByte {
            return Err(Error::unexpected_tag("SzArrayByte", tag.to_string()));
        }
        array::read_sz_byte_array(self.src)
    }

    pub fn read_md_byte_array(&mut self) -> Result<(Vec<Dim>, Vec<u8>)> {
        let tag = self.next_tag()?;
        if tag != Tag::MdArrayByte {
            return Err(Error::unexpected_tag("MdArrayByte", tag.to_string()));
        }
        array::read_md_byte_array(self.src)
    }

    pub fn read_sz_bool_array(&mut self) -> Result<Vec<bool>> {
        let tag = self.next_tag()?;
        if tag != Tag::SzArrayBool {
            return Err(Error::unexpected_tag("SzArrayBool", tag.to_string()));
        }
        array::read_sz_bool_array(self.src, self.ctx.mode())
    }

    pub fn read_md_bool_array(&mut self) -> Result<(Vec<Dim>, Vec<bool>)> {
        let tag = self.next_tag()?;
        if tag != Tag::MdArrayBool {
            return Err(Error::unexpected_tag("MdArrayBool", tag.to_string()));
        }
        array::read_md_bool_array(self.src, self.ctx.mode())
    }

    /// Reads a one-dimensional array of (possibly null) objects, mirroring
    /// [`WriteArchive::write_sz_object_array`].
    pub fn read_sz_object_array(&mut self) -> Result<Vec<Option<ObjectHandle>>> {
        let tag = self.next_tag()?;
        if tag != Tag::SzArrayObject {
            return Err(Error::unexpected_tag("SzArrayObject", tag.to_string()));
        }
        let len = leb128::read_unsigned_64(self.src)? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_object()?);
        }
        Ok(out)
    }

    /// Multi-dimensional counterpart of [`Self::read_sz_object_array`].
    pub fn read_md_object_array(&mut self) -> Result<(Vec<Dim>, Vec<Option<ObjectHandle>>)> {
        let tag = self.next_tag()?;
        if tag != Tag::MdArrayObject {
            return Err(Error::unexpected_tag("MdArrayObject", tag.to_string()));
        }
        let rank = leb128::read_unsigned_64(self.src)? as usize;
        let mut dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            let lower = leb128::read_unsigned_64(self.src)?;
            let len = leb128::read_unsigned_64(self.src)? as usize;
            dims.push((lower, len));
        }
        let count: usize = dims.iter().map(|(_, l)| *l).product();
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_object()?);
        }
        Ok((dims, out))
    }

    /// Reads an enum's declaring type and underlying value, mirroring
    /// [`WriteArchive::write_enum`].
    pub fn read_enum(&mut self) -> Result<(TypeRef, i64)> {
        let tag = self.next_tag()?;
        let (t, consumed) = self.read_possibly_cached_type(tag)?;
        let body_tag = if consumed {
            Tag::try_from_u8(self.src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?
        } else {
            tag
        };
        if body_tag != Tag::Enum {
            return Err(Error::unexpected_tag("Enum", body_tag.to_string()));
        }
        let value = leb128::read_signed_64(self.src)?;
        Ok((t, value))
    }

    /// Reads a first-class type-object value, or a back-reference to one
    /// seen earlier, mirroring [`WriteArchive::write_type_object`].
    pub fn read_type_object(&mut self) -> Result<TypeRef> {
        let tag = self.next_tag()?;
        if tag == Tag::BackReference {
            let id = leb128::read_unsigned_64(self.src)? as u32;
            return self.objects.resolve_type_object(id);
        }
        let (_handle_type, consumed) = self.read_possibly_cached_type(tag)?;
        let body_tag = if consumed {
            Tag::try_from_u8(self.src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?
        } else {
            tag
        };
        if body_tag != Tag::TypeObject {
            return Err(Error::unexpected_tag("TypeObject", body_tag.to_string()));
        }
        let target_tag = Tag::try_from_u8(self.src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?;
        let (target, _) = self.read_possibly_cached_type(target_tag)?;
        self.objects.reserve_type_object(target.clone());
        Ok(target)
    }

    pub fn read_buffer(&mut self) -> Result<Vec<u8>> {
        let tag = self.next_tag()?;
        if tag != Tag::Buffer {
            return Err(Error::unexpected_tag("Buffer", tag.to_string()));
        }
        let len = leb128::read_unsigned_64(self.src)? as usize;
        self.src.read_vec(len)
    }

    /// Opens the next `Buffer` payload as a stream view without fully
    /// materializing it, so a caller can pull it in chunks via
    /// [`Self::read_stream_chunk`].
    pub fn read_stream(&mut self) -> Result<()> {
        let tag = self.next_tag()?;
        if tag != Tag::Buffer {
            return Err(Error::unexpected_tag("Buffer", tag.to_string()));
        }
        let len = leb128::read_unsigned_64(self.src)? as usize;
        self.stream_remaining = Some(len);
        Ok(())
    }

    /// Pulls up to `dst.len()` bytes from the stream view opened by
    /// [`Self::read_stream`]. Any other archive read closes the view and
    /// discards whatever is left unread (spec §4.7).
    pub fn read_stream_chunk(&mut self, dst: &mut [u8]) -> Result<usize> {
        let remaining =
            self.stream_remaining.ok_or_else(|| Error::unexpected_tag("an open stream view", "none"))?;
        let n = dst.len().min(remaining);
        self.src.read_exact(&mut dst[..n])?;
        let left = remaining - n;
        self.stream_remaining = if left > 0 { Some(left) } else { None };
        Ok(n)
    }

    /// Reads `None`, a back-reference, or a fresh object: the tag is read
    /// once up front so `NullReference`/`BackReference` can be told apart
    /// from `Type`/`TypeId` before falling into type-metadata parsing. A
    /// handle is reserved (and so is back-referenceable) *before* the
    /// registered decode thunk runs, implementing the handle-first protocol
    /// spec §9 describes for cyclic graphs.
    pub fn read_object(&mut self) -> Result<Option<ObjectHandle>> {
        let tag = self.next_tag()?;
        match tag {
            Tag::NullReference => return Ok(None),
            Tag::BackReference => {
                let id = leb128::read_unsigned_64(self.src)? as u32;
                return Ok(Some(self.objects.resolve_object(id)?));
            }
            _ => {}
        }

        let (t, consumed) = self.read_possibly_cached_type(tag)?;
        let type_name = t.name;
        let start_tag = if consumed {
            Tag::try_from_u8(self.src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?
        } else {
            tag
        };
        if start_tag != Tag::ArchiveStart {
            return Err(Error::unexpected_tag("ArchiveStart", start_tag.to_string()));
        }

        let handle: ObjectHandle = Rc::new(RefCell::new(None));
        self.objects.reserve_object(handle.clone());

        let version = leb128::read_unsigned_64(self.src)? as u32;
        if let Some(max) = registry::max_supported_version(&type_name) {
            if version > max {
                return Err(Error::VersionTooNew { type_name, got: version, max });
            }
        }

        match registry::decode(&type_name, self, &handle) {
            Some(result) => result?,
            None => return Err(Error::NotSerializable(type_name)),
        }

        let end_tag = Tag::try_from_u8(self.src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?;
        if end_tag != Tag::ArchiveEnd {
            return Err(Error::unexpected_tag("ArchiveEnd", end_tag.to_string()));
        }
        Ok(Some(handle))
    }

    /// Reads a base segment's type metadata, `BaseArchiveStart` tag and
    /// version (no matching `ArchiveEnd` — spec §9 Open Question (a)).
    /// Callers pass the returned version on to their own statically-known
    /// base-class field decoder, since there is no separate bounded region
    /// to dispatch through the registry a second time.
    pub fn read_base_archive(&mut self) -> Result<(TypeRef, u32)> {
        let tag = self.next_tag()?;
        let (t, consumed) = self.read_possibly_cached_type(tag)?;
        let start_tag = if consumed {
            Tag::try_from_u8(self.src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?
        } else {
            tag
        };
        if start_tag != Tag::BaseArchiveStart {
            return Err(Error::unexpected_tag("BaseArchiveStart", start_tag.to_string()));
        }
        let version = leb128::read_unsigned_64(self.src)? as u32;
        if let Some(max) = registry::max_supported_version(&t.name) {
            if version > max {
                return Err(Error::VersionTooNew { type_name: t.name.clone(), got: version, max });
            }
        }
        Ok((t, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::io::SliceSource;

    #[test]
    fn scalar_round_trips_through_archive() {
        let ctx = Context::default();
        let mut w = Writer::new();
        let mut enc_types = EncoderTypeTable::new();
        let mut enc_objects = EncoderObjectTable::new();
        let versions = VersionTable::new();
        {
            let mut archive = WriteArchive::new(&mut w, &mut enc_types, &mut enc_objects, &versions, &ctx);
            archive.write_i32(300);
            archive.write_str(Some("hi"));
            archive.write_str(Some("hi"));
        }
        let bytes = w.into_vec();

        let mut dec_types = DecoderTypeTable::new();
        let mut dec_objects = DecoderObjectTable::new();
        let mut src = SliceSource::new(&bytes);
        let mut archive = ReadArchive::new(&mut src, &mut dec_types, &mut dec_objects, &ctx);
        assert_eq!(archive.read_i32().unwrap(), 300);
        let first = archive.read_str().unwrap().unwrap();
        let second = archive.read_str().unwrap().unwrap();
        assert_eq!(&*first, "hi");
        assert!(Rc::ptr_eq(&first, &second), "repeat string resolves to the same back-referenced allocation");
    }

    #[test]
    fn unwritten_object_tag_stream_round_trips_null_and_back_reference() {
        let ctx = Context::default();
        let mut w = Writer::new();
        w.write_byte(Tag::NullReference.as_u8());
        let bytes = w.into_vec();

        let mut dec_types = DecoderTypeTable::new();
        let mut dec_objects = DecoderObjectTable::new();
        let mut src = SliceSource::new(&bytes);
        let mut archive = ReadArchive::new(&mut src, &mut dec_types, &mut dec_objects, &ctx);
        assert!(archive.read_object().unwrap().is_none());
    }

    #[test]
    fn stream_view_leftover_is_discarded_by_the_next_read() {
        let ctx = Context::default();
        let mut w = Writer::new();
        let mut enc_types = EncoderTypeTable::new();
        let mut enc_objects = EncoderObjectTable::new();
        let versions = VersionTable::new();
        {
            let mut archive = WriteArchive::new(&mut w, &mut enc_types, &mut enc_objects, &versions, &ctx);
            archive.write_stream(&[1, 2, 3, 4]);
            archive.write_i32(7);
        }
        let bytes = w.into_vec();

        let mut dec_types = DecoderTypeTable::new();
        let mut dec_objects = DecoderObjectTable::new();
        let mut src = SliceSource::new(&bytes);
        let mut archive = ReadArchive::new(&mut src, &mut dec_types, &mut dec_objects, &ctx);
        archive.read_stream().unwrap();
        let mut first_two = [0u8; 2];
        assert_eq!(archive.read_stream_chunk(&mut first_two).unwrap(), 2);
        assert_eq!(first_two, [1, 2]);
        // Bytes 3 and 4 are never pulled; the next read must discard them.
        assert_eq!(archive.read_i32().unwrap(), 7);
    }
}

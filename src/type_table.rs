//! Type-reference interning (spec §4.3): per-pass encoder/decoder id tables
//! plus the process-wide name→arity cache and pre-encoded name-snippet
//! cache, published copy-on-write the way spec §5/§9 describes.
//!
//! Rust has no runtime reflection, so a "runtime type" here is whatever
//! [`TypeRef`] the caller supplies for the value being archived — typically
//! produced by a small `fn type_ref() -> TypeRef` a type implements itself,
//! the same shape `register_type` expects callers to advertise once up
//! front for anything that can appear as a generic argument count lookup.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::io::ByteSource;
use crate::io::Writer;
use crate::leb128;
use crate::tag::Tag;

/// A fully-closed type reference: a definition name plus, for generics, its
/// argument types in order (spec §3's "generic type definition followed by
/// its argument types, recursively").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeRef>,
}

impl TypeRef {
    pub fn simple(name: impl Into<String>) -> Self {
        TypeRef { name: name.into(), args: Vec::new() }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef { name: name.into(), args }
    }
}

#[derive(Clone)]
struct TypeDescriptor {
    generic_arity: usize,
}

static REGISTRY: Lazy<ArcSwap<HashMap<String, TypeDescriptor>>> =
    Lazy::new(|| ArcSwap::from_pointee(HashMap::new()));
static SNIPPETS: Lazy<ArcSwap<HashMap<String, Arc<[u8]>>>> =
    Lazy::new(|| ArcSwap::from_pointee(HashMap::new()));

/// Advertises a type's generic arity to the process-wide cache. Call once,
/// e.g. from a `static INIT` or a setup routine, before any pass that might
/// decode a closed generic built on this definition.
pub fn register_type(name: impl Into<String>, generic_arity: usize) {
    let name = name.into();
    let mut next = (**REGISTRY.load()).clone();
    next.insert(name, TypeDescriptor { generic_arity });
    REGISTRY.store(Arc::new(next));
}

fn lookup_arity(name: &str) -> Option<usize> {
    REGISTRY.load().get(name).map(|d| d.generic_arity)
}

fn cached_snippet(name: &str) -> Option<Arc<[u8]>> {
    SNIPPETS.load().get(name).cloned()
}

fn cache_snippet(name: &str, bytes: Arc<[u8]>) {
    let mut next = (**SNIPPETS.load()).clone();
    next.insert(name.to_string(), bytes);
    SNIPPETS.store(Arc::new(next));
}

fn encode_snippet(name: &str) -> Arc<[u8]> {
    let mut bytes = Vec::with_capacity(name.len() + 2);
    leb128::write_unsigned(&mut bytes, name.len() as u64);
    bytes.extend_from_slice(name.as_bytes());
    Arc::from(bytes.into_boxed_slice())
}

/// Drops everything from the first `,` onward — our stand-in for "drop the
/// assembly-version qualifier, keep simple-name + namespace" (spec §7).
fn simple_name(name: &str) -> &str {
    name.split(',').next().unwrap_or(name).trim()
}

fn resolve_name(name: &str, ctx: &Context) -> Result<(String, usize)> {
    if let Some(arity) = lookup_arity(name) {
        return Ok((name.to_string(), arity));
    }
    if ctx.strict() {
        return Err(Error::UnknownType(name.to_string()));
    }
    let short = simple_name(name);
    let snapshot = REGISTRY.load();
    if let Some((found_name, descriptor)) =
        snapshot.iter().find(|(candidate, _)| simple_name(candidate) == short)
    {
        return Ok((found_name.clone(), descriptor.generic_arity));
    }
    drop(snapshot);
    if let Some(resolver) = ctx.resolver() {
        if let Some(resolved) = resolver.resolve(name) {
            if let Some(arity) = lookup_arity(&resolved) {
                tracing::warn!(original = name, resolved = %resolved, "version-tolerant type resolution fell back past exact match");
                return Ok((resolved, arity));
            }
        }
    }
    Err(Error::UnknownType(name.to_string()))
}

/// Per-pass encoder state: `type_to_id` plus the "last type written" cache
/// that lets a run of same-typed values skip re-emitting metadata entirely.
#[derive(Default)]
pub struct EncoderTypeTable {
    type_to_id: HashMap<String, u32>,
    next_id: u32,
    last_written: Option<TypeRef>,
}

impl EncoderTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Returns `true` if metadata was actually written (`false` when `t`
    /// matches the last-written-type cache and nothing needed emitting).
    pub fn write_type_metadata(&mut self, w: &mut Writer, t: &TypeRef) -> bool {
        if self.last_written.as_ref() == Some(t) {
            return false;
        }
        self.write_component(w, t);
        self.last_written = Some(t.clone());
        true
    }

    fn write_component(&mut self, w: &mut Writer, t: &TypeRef) {
        if let Some(&id) = self.type_to_id.get(&t.name) {
            w.write_byte(Tag::TypeId.as_u8());
            let mut bytes = Vec::new();
            leb128::write_unsigned(&mut bytes, id as u64);
            w.write_all(&bytes);
        } else {
            w.write_byte(Tag::Type.as_u8());
            let snippet = cached_snippet(&t.name).unwrap_or_else(|| {
                let snippet = encode_snippet(&t.name);
                cache_snippet(&t.name, snippet.clone());
                snippet
            });
            w.write_all(&snippet);
            let id = self.next_id;
            self.next_id += 1;
            self.type_to_id.insert(t.name.clone(), id);
            tracing::trace!(type_name = %t.name, id, "type first seen this pass");
        }
        for arg in &t.args {
            self.write_component(w, arg);
        }
    }
}

/// Per-pass decoder state: the inverse `id_to_type` table plus
/// `current_deserialized_type`, the type most recently introduced or
/// referenced, consulted by tag handlers that operate on "the type just
/// named" (e.g. `Enum`).
#[derive(Default)]
pub struct DecoderTypeTable {
    id_to_type: Vec<String>,
    pub current: Option<TypeRef>,
}

impl DecoderTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn read_type_metadata(&mut self, src: &mut dyn ByteSource, ctx: &Context) -> Result<TypeRef> {
        let tag = Tag::try_from_u8(src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?;
        self.read_type_metadata_with_tag(tag, src, ctx)
    }

    /// Same as [`Self::read_type_metadata`], but for a caller that already
    /// consumed the leading tag itself (e.g. to first rule out
    /// `NullReference`/`BackReference`).
    pub fn read_type_metadata_with_tag(
        &mut self,
        tag: Tag,
        src: &mut dyn ByteSource,
        ctx: &Context,
    ) -> Result<TypeRef> {
        let t = self.read_component(tag, src, ctx)?;
        self.current = Some(t.clone());
        Ok(t)
    }

    fn read_component(&mut self, tag: Tag, src: &mut dyn ByteSource, ctx: &Context) -> Result<TypeRef> {
        let name = match tag {
            Tag::TypeId => {
                let id = leb128::read_unsigned_64(src)? as usize;
                self.id_to_type
                    .get(id)
                    .cloned()
                    .ok_or(Error::DanglingBackReference(id as u32))?
            }
            Tag::Type => {
                let len = leb128::read_unsigned_64(src)? as usize;
                let bytes = src.read_vec(len)?;
                let name =
                    String::from_utf8(bytes).map_err(|e| Error::InvalidUtf8(e.utf8_error()))?;
                self.id_to_type.push(name.clone());
                name
            }
            other => return Err(Error::unexpected_tag("Type or TypeId", other.to_string())),
        };
        let (resolved_name, arity) = resolve_name(&name, ctx)?;
        let mut args = Vec::with_capacity(arity);
        for _ in 0..arity {
            let arg_tag = Tag::try_from_u8(src.read_byte().ok_or(Error::UnexpectedEndOfStream)?)?;
            args.push(self.read_component(arg_tag, src, ctx)?);
        }
        Ok(TypeRef::generic(resolved_name, args))
    }
}

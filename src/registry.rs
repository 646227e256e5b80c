//! The process-wide custom-serializer registry (spec §6). Internal
//! serializers (implemented by the type itself) and external serializers (a
//! separate plug-in for a type that cannot be modified) are both discovered
//! through this same name-keyed table; the distinction only matters for
//! *how* an entry gets registered, not for how the core looks one up.
//!
//! Decoding fills an [`ObjectHandle`] in place rather than returning a fresh
//! value, per spec §9's guidance for cyclic graphs: "decoding builds the
//! graph via indices/handles first, then resolves back-references by
//! lookup." The handle is reserved (and so is back-referenceable) before the
//! registered thunk runs, so a field that points back to an
//! still-under-construction ancestor resolves to the same shared cell.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;

use crate::archive::ReadArchive;
use crate::error::Result;

/// A reference-typed value reachable through the custom-serializer protocol:
/// it can report its own wire type name and write itself into an archive.
/// One serializer instance is single-threaded end to end (spec §5), so this
/// deliberately does not require `Send`/`Sync` the way the registry's own
/// storage does.
pub trait Archivable: std::any::Any {
    fn as_any(&self) -> &dyn std::any::Any;
    fn type_name(&self) -> &str;
    fn write(&self, archive: &mut crate::archive::WriteArchive) -> Result<()>;
}

/// The decode-time handle for a reference-typed custom object: reserved
/// empty, then filled in by the registered thunk, then clonable by anything
/// that resolved a back-reference to it before it was full.
pub type ObjectHandle = Rc<RefCell<Option<Box<dyn Archivable>>>>;

type DecodeThunk = Arc<dyn Fn(&mut ReadArchive, &ObjectHandle) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    max_supported_version: u32,
    decode: DecodeThunk,
}

static REGISTRY: Lazy<ArcSwap<HashMap<String, Entry>>> =
    Lazy::new(|| ArcSwap::from_pointee(HashMap::new()));

/// Registers a decode thunk and the maximum version this process can read
/// for `type_name`. Used for both the internal-serializer discovery path
/// (a type registering its own constructor) and the external-plugin path
/// (a separate module registering on the type's behalf).
pub fn register<F>(type_name: impl Into<String>, max_supported_version: u32, decode: F)
where
    F: Fn(&mut ReadArchive, &ObjectHandle) -> Result<()> + Send + Sync + 'static,
{
    let name = type_name.into();
    let mut next = (**REGISTRY.load()).clone();
    next.insert(name, Entry { max_supported_version, decode: Arc::new(decode) });
    REGISTRY.store(Arc::new(next));
}

pub fn max_supported_version(type_name: &str) -> Option<u32> {
    REGISTRY.load().get(type_name).map(|e| e.max_supported_version)
}

pub fn is_registered(type_name: &str) -> bool {
    REGISTRY.load().contains_key(type_name)
}

/// Invokes the registered decoder for `type_name` against `handle`, if any.
pub fn decode(type_name: &str, archive: &mut ReadArchive, handle: &ObjectHandle) -> Option<Result<()>> {
    let thunk = REGISTRY.load().get(type_name).map(|e| e.decode.clone());
    thunk.map(|f| f(archive, handle))
}

//! Top-level entry points (spec §4.1/§9): wraps a fresh pair of per-pass
//! type/object tables around a single archive call so callers never touch
//! `WriteArchive`/`ReadArchive` construction directly for the common case of
//! "serialize one object graph" / "deserialize one object graph".

use std::rc::Rc;

use crate::archive::{ReadArchive, VersionTable, WriteArchive};
use crate::context::Context;
use crate::error::Result;
use crate::io::{ByteSource, Writer};
use crate::object_table::{DecoderObjectTable, EncoderObjectTable};
use crate::registry::{Archivable, ObjectHandle};
use crate::type_table::{DecoderTypeTable, EncoderTypeTable};

/// Serializes `root` against `ctx`, with no per-type version overrides.
pub fn serialize(root: &Rc<dyn Archivable>, ctx: &Context) -> Result<Vec<u8>> {
    serialize_with_versions(root, ctx, &VersionTable::new())
}

/// Serializes `root`, overriding the written version for any type named in
/// `versions` (spec §3's per-pass version control).
pub fn serialize_with_versions(
    root: &Rc<dyn Archivable>,
    ctx: &Context,
    versions: &VersionTable,
) -> Result<Vec<u8>> {
    let _span = tracing::debug_span!("objwire::serialize", root_type = root.type_name()).entered();
    let mut writer = Writer::new();
    let mut types = EncoderTypeTable::new();
    let mut objects = EncoderObjectTable::new();
    {
        let mut archive = WriteArchive::new(&mut writer, &mut types, &mut objects, versions, ctx);
        archive.write_object(Some(root))?;
    }
    Ok(writer.into_vec())
}

/// Deserializes a single object graph from `bytes`, returning `None` for an
/// input that encodes a null root reference.
pub fn deserialize(bytes: &[u8], ctx: &Context) -> Result<Option<ObjectHandle>> {
    deserialize_from(&mut crate::io::SliceSource::new(bytes), ctx)
}

/// Same as [`deserialize`], but reads from any [`ByteSource`] rather than
/// requiring the whole payload already be in memory.
pub fn deserialize_from(src: &mut dyn ByteSource, ctx: &Context) -> Result<Option<ObjectHandle>> {
    let _span = tracing::debug_span!("objwire::deserialize").entered();
    let mut types = DecoderTypeTable::new();
    let mut objects = DecoderObjectTable::new();
    let mut archive = ReadArchive::new(src, &mut types, &mut objects, ctx);
    archive.read_object()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::WriteArchive as WA;
    use std::any::Any;

    struct Leaf(i32);
    impl Archivable for Leaf {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn type_name(&self) -> &str {
            "objwire.tests.engine.Leaf"
        }
        fn write(&self, archive: &mut WA) -> Result<()> {
            archive.write_i32(self.0);
            Ok(())
        }
    }

    fn register_leaf() {
        crate::registry::register("objwire.tests.engine.Leaf", 0, |archive, handle| {
            let value = archive.read_i32()?;
            *handle.borrow_mut() = Some(Box::new(Leaf(value)));
            Ok(())
        });
    }

    #[test]
    fn serialize_then_deserialize_round_trips_a_single_object() {
        register_leaf();
        let ctx = Context::default();
        let root: Rc<dyn Archivable> = Rc::new(Leaf(42));
        let bytes = serialize(&root, &ctx).unwrap();
        let handle = deserialize(&bytes, &ctx).unwrap().expect("non-null root");
        let borrowed = handle.borrow();
        let leaf = borrowed.as_ref().unwrap().as_any().downcast_ref::<Leaf>().unwrap();
        assert_eq!(leaf.0, 42);
    }

    #[test]
    fn null_root_round_trips_to_none() {
        let ctx = Context::default();
        let bytes = {
            let mut w = Writer::new();
            w.write_byte(crate::tag::Tag::NullReference.as_u8());
            w.into_vec()
        };
        assert!(deserialize(&bytes, &ctx).unwrap().is_none());
    }
}

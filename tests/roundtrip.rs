//! Integration tests exercising objwire's own wire format end to end:
//! scalar mode selection, string interning, cyclic object graphs,
//! base-class archives and multidimensional arrays.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use objwire::{
    register, Archivable, BaseOf, CalendarKind, Context, Dim, Error, OptimizationMode,
    PrimitiveValues, ReadArchive, Tag, WireDateTime, WriteArchive,
};

static REGISTER: Once = Once::new();

struct Pair {
    first: String,
    second: String,
}

impl Archivable for Pair {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &str {
        "objwire.tests.roundtrip.Pair"
    }
    fn write(&self, archive: &mut WriteArchive) -> Result<(), Error> {
        archive.write_str(Some(&self.first));
        archive.write_str(Some(&self.second));
        Ok(())
    }
}

struct DecodedPair {
    first: String,
    second: String,
}

impl Archivable for DecodedPair {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &str {
        "objwire.tests.roundtrip.Pair"
    }
    fn write(&self, _archive: &mut WriteArchive) -> Result<(), Error> {
        unreachable!("decoded pairs are never re-encoded in these tests")
    }
}

struct Node {
    label: String,
    next: RefCell<Option<Rc<dyn Archivable>>>,
}

impl Archivable for Node {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &str {
        "objwire.tests.roundtrip.Node"
    }
    fn write(&self, archive: &mut WriteArchive) -> Result<(), Error> {
        archive.write_str(Some(&self.label));
        archive.write_object(self.next.borrow().as_ref())?;
        Ok(())
    }
}

struct DecodedNode {
    label: String,
    next: RefCell<Option<objwire::ObjectHandle>>,
}

impl Archivable for DecodedNode {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &str {
        "objwire.tests.roundtrip.Node"
    }
    fn write(&self, _archive: &mut WriteArchive) -> Result<(), Error> {
        unreachable!("decoded nodes are never re-encoded in these tests")
    }
}

struct Base {
    id: i32,
}

impl Archivable for Base {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &str {
        "objwire.tests.roundtrip.Base"
    }
    fn write(&self, archive: &mut WriteArchive) -> Result<(), Error> {
        archive.write_i32(self.id);
        Ok(())
    }
}

struct Derived {
    base: Base,
    extra: String,
}

impl BaseOf<Base> for Derived {}

impl Archivable for Derived {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &str {
        "objwire.tests.roundtrip.Derived"
    }
    fn write(&self, archive: &mut WriteArchive) -> Result<(), Error> {
        archive.write_str(Some(&self.extra));
        archive.write_base_archive_for::<Derived, Base>(&self.base)?;
        Ok(())
    }
}

struct DecodedDerived {
    extra: String,
    base_id: i32,
}

impl Archivable for DecodedDerived {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &str {
        "objwire.tests.roundtrip.Derived"
    }
    fn write(&self, _archive: &mut WriteArchive) -> Result<(), Error> {
        unreachable!("decoded derived objects are never re-encoded in these tests")
    }
}

fn register_types() {
    REGISTER.call_once(|| {
        register("objwire.tests.roundtrip.Pair", 0, |archive: &mut ReadArchive, handle| {
            let first = archive.read_str()?.map(|s| s.to_string()).unwrap_or_default();
            let second = archive.read_str()?.map(|s| s.to_string()).unwrap_or_default();
            *handle.borrow_mut() = Some(Box::new(DecodedPair { first, second }));
            Ok(())
        });
        register("objwire.tests.roundtrip.Node", 0, |archive: &mut ReadArchive, handle| {
            let label = archive.read_str()?.map(|s| s.to_string()).unwrap_or_default();
            let next = archive.read_object()?;
            *handle.borrow_mut() = Some(Box::new(DecodedNode { label, next: RefCell::new(next) }));
            Ok(())
        });
        register("objwire.tests.roundtrip.Derived", 0, |archive: &mut ReadArchive, handle| {
            let extra = archive.read_str()?.map(|s| s.to_string()).unwrap_or_default();
            let (base_type, _version) = archive.read_base_archive()?;
            assert_eq!(base_type.name, "objwire.tests.roundtrip.Base");
            let base_id = archive.read_i32()?;
            *handle.borrow_mut() = Some(Box::new(DecodedDerived { extra, base_id }));
            Ok(())
        });
    });
}

#[test]
fn s1_s2_scalar_mode_picks_leb128_or_native() {
    let speed = Context::builder().mode(OptimizationMode::Speed).build();
    let size = Context::builder().mode(OptimizationMode::Size).build();

    let mut w = objwire::Writer::new();
    {
        let mut types = objwire::EncoderTypeTable::new();
        let mut objects = objwire::EncoderObjectTable::new();
        let versions = objwire::VersionTable::new();
        let mut archive = WriteArchive::new(&mut w, &mut types, &mut objects, &versions, &size);
        archive.write_i32(300);
    }
    let size_bytes = w.into_vec();
    assert_eq!(size_bytes, vec![Tag::I32Leb.as_u8(), 0xAC, 0x02]);

    let mut w = objwire::Writer::new();
    {
        let mut types = objwire::EncoderTypeTable::new();
        let mut objects = objwire::EncoderObjectTable::new();
        let versions = objwire::VersionTable::new();
        let mut archive = WriteArchive::new(&mut w, &mut types, &mut objects, &versions, &speed);
        archive.write_i32(300);
    }
    let speed_bytes = w.into_vec();
    assert_eq!(speed_bytes, vec![Tag::I32Native.as_u8(), 0x2C, 0x01, 0x00, 0x00]);
}

#[test]
fn s3_repeated_string_field_writes_a_back_reference() {
    register_types();
    let ctx = Context::default();
    let root: Rc<dyn Archivable> =
        Rc::new(Pair { first: "hi".to_string(), second: "hi".to_string() });
    let bytes = objwire::serialize(&root, &ctx).unwrap();
    let handle = objwire::deserialize(&bytes, &ctx).unwrap().unwrap();
    let borrowed = handle.borrow();
    let pair = borrowed.as_ref().unwrap().as_any().downcast_ref::<DecodedPair>().unwrap();
    assert_eq!(pair.first, "hi");
    assert_eq!(pair.second, "hi");
    // exactly one Str tag byte should appear in the payload
    assert_eq!(bytes.iter().filter(|&&b| b == Tag::Str.as_u8()).count(), 1);
    assert_eq!(bytes.iter().filter(|&&b| b == Tag::BackReference.as_u8()).count(), 1);
}

#[test]
fn s4_two_node_cycle_round_trips() {
    register_types();
    let ctx = Context::default();

    let a = Rc::new(Node { label: "A".to_string(), next: RefCell::new(None) });
    let b = Rc::new(Node { label: "B".to_string(), next: RefCell::new(None) });
    let a_dyn: Rc<dyn Archivable> = a.clone();
    let b_dyn: Rc<dyn Archivable> = b.clone();
    *a.next.borrow_mut() = Some(b_dyn);
    *b.next.borrow_mut() = Some(a_dyn.clone());

    let bytes = objwire::serialize(&a_dyn, &ctx).unwrap();
    let handle = objwire::deserialize(&bytes, &ctx).unwrap().unwrap();

    let borrowed = handle.borrow();
    let decoded_a = borrowed.as_ref().unwrap().as_any().downcast_ref::<DecodedNode>().unwrap();
    assert_eq!(decoded_a.label, "A");
    let b_handle = decoded_a.next.borrow().clone().unwrap();
    let b_borrowed = b_handle.borrow();
    let decoded_b = b_borrowed.as_ref().unwrap().as_any().downcast_ref::<DecodedNode>().unwrap();
    assert_eq!(decoded_b.label, "B");
    let back_to_a = decoded_b.next.borrow().clone().unwrap();
    assert!(Rc::ptr_eq(&back_to_a, &handle), "B.next must resolve back to the same A handle");
}

#[test]
fn s5_base_class_archive_round_trips_derived_then_base_fields() {
    register_types();
    let ctx = Context::default();
    let root: Rc<dyn Archivable> =
        Rc::new(Derived { base: Base { id: 9 }, extra: "derived-field".to_string() });
    let bytes = objwire::serialize(&root, &ctx).unwrap();
    let handle = objwire::deserialize(&bytes, &ctx).unwrap().unwrap();
    let borrowed = handle.borrow();
    let derived = borrowed.as_ref().unwrap().as_any().downcast_ref::<DecodedDerived>().unwrap();
    assert_eq!(derived.extra, "derived-field");
    assert_eq!(derived.base_id, 9);
}

#[test]
fn s6_2x3_int32_matrix_round_trips_row_major() {
    let ctx = Context::builder().mode(OptimizationMode::Speed).build();
    let dims: Vec<Dim> = vec![(0, 2), (0, 3)];
    let values = PrimitiveValues::I32(vec![1, 2, 3, 4, 5, 6]);

    let mut w = objwire::Writer::new();
    {
        let mut types = objwire::EncoderTypeTable::new();
        let mut objects = objwire::EncoderObjectTable::new();
        let versions = objwire::VersionTable::new();
        let mut archive = WriteArchive::new(&mut w, &mut types, &mut objects, &versions, &ctx);
        archive.write_md_primitive_array(&dims, &values);
    }
    let bytes = w.into_vec();

    let mut dec_types = objwire::DecoderTypeTable::new();
    let mut dec_objects = objwire::DecoderObjectTable::new();
    let mut src = objwire::SliceSource::new(&bytes);
    let mut archive = ReadArchive::new(&mut src, &mut dec_types, &mut dec_objects, &ctx);
    let (back_dims, back_values) = archive.read_md_primitive_array().unwrap();
    assert_eq!(back_dims, dims);
    assert_eq!(back_values, values);
}

#[test]
fn version_newer_than_decoder_supports_is_rejected() {
    register("objwire.tests.roundtrip.versioned", 1, |archive: &mut ReadArchive, handle| {
        let _ = archive.read_i32()?;
        *handle.borrow_mut() = None;
        Ok(())
    });

    let ctx = Context::default();
    let mut w = objwire::Writer::new();
    {
        let mut types = objwire::EncoderTypeTable::new();
        let mut objects = objwire::EncoderObjectTable::new();
        let mut versions = objwire::VersionTable::new();
        versions.set("objwire.tests.roundtrip.versioned", 5);
        let mut archive = WriteArchive::new(&mut w, &mut types, &mut objects, &versions, &ctx);
        let root: Rc<dyn Archivable> = Rc::new(VersionedLeaf(1));
        archive.write_object(Some(&root)).unwrap();
    }
    let bytes = w.into_vec();
    let err = objwire::deserialize(&bytes, &ctx).unwrap_err();
    assert!(matches!(err, Error::VersionTooNew { got: 5, max: 1, .. }));
}

struct VersionedLeaf(i32);
impl Archivable for VersionedLeaf {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &str {
        "objwire.tests.roundtrip.versioned"
    }
    fn write(&self, archive: &mut WriteArchive) -> Result<(), Error> {
        archive.write_i32(self.0);
        Ok(())
    }
}

#[test]
fn datetime_round_trips_through_archive() {
    let ctx = Context::default();
    let dt = WireDateTime::new(637_000_000_000_000_000, CalendarKind::Utc);
    let mut w = objwire::Writer::new();
    {
        let mut types = objwire::EncoderTypeTable::new();
        let mut objects = objwire::EncoderObjectTable::new();
        let versions = objwire::VersionTable::new();
        let mut archive = WriteArchive::new(&mut w, &mut types, &mut objects, &versions, &ctx);
        archive.write_datetime(&dt);
    }
    let bytes = w.into_vec();
    let mut dec_types = objwire::DecoderTypeTable::new();
    let mut dec_objects = objwire::DecoderObjectTable::new();
    let mut src = objwire::SliceSource::new(&bytes);
    let mut archive = ReadArchive::new(&mut src, &mut dec_types, &mut dec_objects, &ctx);
    assert_eq!(archive.read_datetime().unwrap(), dt);
}

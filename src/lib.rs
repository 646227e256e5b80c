//! # objwire
//!
//! Self-describing binary object-graph serialization: every value on the
//! wire carries its own payload tag, and reference-typed values carry their
//! own type name, so a decoder never has to know the shape of a graph ahead
//! of reading it. Types participate by implementing [`Archivable`] and
//! registering a decode thunk with [`register`]; [`serialize`]/[`deserialize`]
//! are the entry points for archiving one rooted object graph end to end.
//!
//! ```rust
//! use std::rc::Rc;
//! use objwire::{register, Archivable, Context, Error, ReadArchive, WriteArchive};
//!
//! struct Point { x: i32, y: i32 }
//!
//! impl Archivable for Point {
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//!     fn type_name(&self) -> &str { "example.Point" }
//!     fn write(&self, archive: &mut WriteArchive) -> Result<(), Error> {
//!         archive.write_i32(self.x);
//!         archive.write_i32(self.y);
//!         Ok(())
//!     }
//! }
//!
//! register("example.Point", 0, |archive: &mut ReadArchive, handle| {
//!     let x = archive.read_i32()?;
//!     let y = archive.read_i32()?;
//!     *handle.borrow_mut() = Some(Box::new(Point { x, y }));
//!     Ok(())
//! });
//!
//! let ctx = Context::default();
//! let root: Rc<dyn Archivable> = Rc::new(Point { x: 3, y: 4 });
//! let bytes = objwire::serialize(&root, &ctx).unwrap();
//! let handle = objwire::deserialize(&bytes, &ctx).unwrap().unwrap();
//! let borrowed = handle.borrow();
//! let point = borrowed.as_ref().unwrap().as_any().downcast_ref::<Point>().unwrap();
//! assert_eq!((point.x, point.y), (3, 4));
//! ```

mod archive;
mod array;
mod context;
mod datetime;
mod decimal;
mod engine;
mod error;
mod io;
mod leb128;
mod object_table;
mod primitive;
mod registry;
mod tag;
mod type_table;

pub use archive::{BaseOf, ReadArchive, VersionTable, WriteArchive};
pub use array::{Dim, PrimitiveValues};
pub use context::{Context, ContextBuilder, OptimizationMode, TypeResolver};
pub use datetime::{CalendarKind, WireDateTime};
pub use decimal::{u96, WireDecimal};
pub use engine::{deserialize, deserialize_from, serialize, serialize_with_versions};
pub use error::{Error, Result};
pub use io::{ByteSource, ReadSource, SliceSource, Writer};
pub use object_table::{DecoderObjectTable, EncoderObjectTable};
pub use registry::{is_registered, max_supported_version, register, Archivable, ObjectHandle};
pub use tag::{PrimitiveKind, Tag};
pub use type_table::{register_type, DecoderTypeTable, EncoderTypeTable, TypeRef};

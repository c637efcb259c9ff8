//! Schema-derived binary pickler for algebraic data types.
//!
//! Given a root [`Describable`] type, [`Pickler::for_type`] discovers every
//! record, enum, and sealed interface reachable from it, analyses each
//! field's generic shape into a flat [`ast::Ast`], and stages a
//! write/read/size closure chain for every one of them — once, at
//! construction time. Nothing on the `serialize`/`deserialize`/`size_of`
//! path re-inspects a type tag afterwards.

pub mod ast;
pub mod chain;
pub mod descriptor;
pub mod error;
pub mod parray;
pub mod pickler;
pub mod record;
pub mod schema;
pub mod tag;
pub mod value;
pub mod varint;

pub use ast::{Schematic, TypeDesc};
pub use descriptor::{Describable, UserTypeDescriptor, UserTypeKind};
pub use error::{CallError, ConstructionError};
pub use parray::PArray;
pub use pickler::{Pickler, PicklerBuilder};
pub use record::CompatibilityMode;
pub use schema::Schema;
pub use value::{ArrayValue, Value};

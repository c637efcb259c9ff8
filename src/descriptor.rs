//! The reflective surface a Rust type offers the engine (§1, §4.3): a static
//! `UserTypeDescriptor` naming its shape, plus a `Describable` bridge between
//! a concrete struct/enum and the engine's closed `Value` vocabulary. This is
//! the one pair of methods a derive macro would generate; here they are
//! written out in full the way a hand-derived `impl` would read.

use crate::ast::TypeDesc;
use crate::error::CallError;
use crate::value::Value;

/// Static shape of a record, enum, or sealed interface, as produced by its
/// `Describable::descriptor` function. Cheap to construct (no heap reuse
/// across calls is assumed); callers that need it repeatedly keep the `fn`
/// pointer rather than the value.
pub struct UserTypeDescriptor {
    pub name: &'static str,
    pub kind: UserTypeKind,
}

pub enum UserTypeKind {
    Record(RecordDescriptor),
    Enum(EnumDescriptor),
    Interface(InterfaceDescriptor),
}

pub struct RecordDescriptor {
    pub fields: Vec<FieldDescriptor>,
}

pub struct FieldDescriptor {
    pub name: &'static str,
    pub type_desc: TypeDesc,
}

pub struct EnumDescriptor {
    /// Variant names in declaration order; declaration order is the
    /// variant's stable wire ordinal (§4.6).
    pub variants: Vec<&'static str>,
}

pub struct InterfaceDescriptor {
    /// Implementing records' descriptor functions, in the stable order that
    /// assigns their wire ordinals (§4.7). Schema discovery walks this list
    /// to find every permitted variant of the sealed hierarchy.
    pub variants: Vec<fn() -> UserTypeDescriptor>,
}

/// Bridges a concrete Rust record, enum, or sealed-interface member to the
/// engine. The only place a user's own field access or variant match ever
/// happens; everything downstream works in `Value`.
pub trait Describable: Sized + 'static {
    fn descriptor() -> UserTypeDescriptor;
    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self, CallError>;
}

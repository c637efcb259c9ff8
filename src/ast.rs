//! The Type AST (§4.3): a flat, left-to-right sequence of `(tag, concrete
//! type)` nodes describing one field's generic structure, plus the
//! compile-time `Schematic` trait family that substitutes for host-language
//! reflection when producing it (§1).

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::OnceLock;

use crate::descriptor::UserTypeDescriptor;
use crate::error::ConstructionError;
use crate::tag::BuiltinTag;

/// Maximum nesting depth a `TypeDesc` tree may reach before the analyser
/// gives up rather than risk a stack overflow on a pathologically
/// hand-constructed descriptor. Ordinary schemas never come close.
const MAX_DEPTH: usize = 64;

/// The shape of one field's type, resolved at compile time by the
/// `Schematic` trait family (monomorphization stands in for the recursive
/// descent over parameterized type structure a reflective host performs at
/// construction time).
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Builtin(BuiltinTag),
    Optional(Box<TypeDesc>),
    List(Box<TypeDesc>),
    Array(Box<TypeDesc>),
    Map(Box<TypeDesc>, Box<TypeDesc>),
    /// A record, enum, or interface leaf, identified by its descriptor
    /// function (itself a stable, hashable, process-wide identity).
    User(fn() -> UserTypeDescriptor),
}

/// Implemented by every Rust type that can appear as a field: primitives
/// directly, containers generically over their element `Schematic`, and
/// user records/enums/interfaces via the blanket impl over `Describable`.
pub trait Schematic {
    fn type_desc() -> TypeDesc;
}

macro_rules! impl_schematic_builtin {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Schematic for $ty {
                fn type_desc() -> TypeDesc {
                    TypeDesc::Builtin(BuiltinTag::$tag)
                }
            }
        )*
    };
}

impl_schematic_builtin! {
    bool => Boolean,
    i8 => Byte,
    i16 => Short,
    char => Character,
    i32 => Integer,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    uuid::Uuid => Uuid,
}

impl<T: Schematic> Schematic for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Optional(Box::new(T::type_desc()))
    }
}

impl<T: Schematic> Schematic for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::List(Box::new(T::type_desc()))
    }
}

impl<T: Schematic> Schematic for crate::parray::PArray<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Array(Box::new(T::type_desc()))
    }
}

impl<K: Schematic, V: Schematic> Schematic for std::collections::HashMap<K, V> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Map(Box::new(K::type_desc()), Box::new(V::type_desc()))
    }
}

/// Every record, enum, and sealed-interface member reaches the engine
/// through this single blanket impl rather than its own hand-written one —
/// the Rust substitute for a reflective host recognising "this is a user
/// type" by the absence of a built-in marker.
impl<T: crate::descriptor::Describable> Schematic for T {
    fn type_desc() -> TypeDesc {
        TypeDesc::User(T::descriptor)
    }
}

/// One node of a flattened `Ast`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum AstNode {
    Optional,
    List,
    Array,
    Map,
    MapSeparator,
    Leaf(LeafTag),
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum LeafTag {
    Builtin(BuiltinTag),
    Record(fn() -> UserTypeDescriptor),
    Enum(fn() -> UserTypeDescriptor),
    Interface(fn() -> UserTypeDescriptor),
}

/// The flat, left-to-right sequence of nodes analysing a `TypeDesc` yields.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ast {
    pub nodes: Vec<AstNode>,
}

static AST_CACHE: OnceLock<Mutex<HashMap<TypeDesc, Ast>>> = OnceLock::new();

/// Recursive descent over a `TypeDesc`, producing its flat `Ast` (§4.3).
/// Memoised by the process-wide cache keyed on `TypeDesc` structural
/// identity, since the same reachable type is commonly analysed from many
/// record fields.
pub fn analyse(desc: &TypeDesc) -> Result<Ast, ConstructionError> {
    let cache = AST_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Some(cached) = cache.lock().expect("ast cache poisoned").get(desc) {
        return Ok(cached.clone());
    }
    let mut nodes = Vec::new();
    push(desc, &mut nodes, 0)?;
    let ast = Ast { nodes };
    validate(&ast)?;
    cache
        .lock()
        .expect("ast cache poisoned")
        .insert(desc.clone(), ast.clone());
    Ok(ast)
}

fn push(desc: &TypeDesc, nodes: &mut Vec<AstNode>, depth: usize) -> Result<(), ConstructionError> {
    if depth > MAX_DEPTH {
        return Err(ConstructionError::UnsupportedType(
            "type nesting exceeds the supported depth",
        ));
    }
    match desc {
        TypeDesc::Builtin(tag) => nodes.push(AstNode::Leaf(LeafTag::Builtin(*tag))),
        TypeDesc::Optional(inner) => {
            nodes.push(AstNode::Optional);
            push(inner, nodes, depth + 1)?;
        }
        TypeDesc::List(inner) => {
            nodes.push(AstNode::List);
            push(inner, nodes, depth + 1)?;
        }
        TypeDesc::Array(inner) => {
            nodes.push(AstNode::Array);
            push(inner, nodes, depth + 1)?;
        }
        TypeDesc::Map(key, value) => {
            nodes.push(AstNode::Map);
            push(key, nodes, depth + 1)?;
            nodes.push(AstNode::MapSeparator);
            push(value, nodes, depth + 1)?;
        }
        TypeDesc::User(descriptor_fn) => {
            let descriptor = descriptor_fn();
            let leaf = match descriptor.kind {
                crate::descriptor::UserTypeKind::Record(_) => LeafTag::Record(*descriptor_fn),
                crate::descriptor::UserTypeKind::Enum(_) => LeafTag::Enum(*descriptor_fn),
                crate::descriptor::UserTypeKind::Interface(_) => LeafTag::Interface(*descriptor_fn),
            };
            nodes.push(AstNode::Leaf(leaf));
        }
    }
    Ok(())
}

/// Checks the flat-sequence invariants of §3: every container opens exactly
/// the slots it consumes, `MAP` carries exactly one `MAP_SEPARATOR` between
/// its two sub-trees, and the sequence terminates in a leaf.
pub fn validate(ast: &Ast) -> Result<(), ConstructionError> {
    let mut pos = 0;
    pos = expect_subtree(&ast.nodes, pos)?;
    if pos != ast.nodes.len() {
        return Err(ConstructionError::InvalidSchema(
            "trailing nodes after a well-formed type tree",
        ));
    }
    Ok(())
}

fn expect_subtree(nodes: &[AstNode], pos: usize) -> Result<usize, ConstructionError> {
    match nodes.get(pos) {
        None => Err(ConstructionError::InvalidSchema(
            "type sequence does not terminate in a leaf",
        )),
        Some(AstNode::Leaf(_)) => Ok(pos + 1),
        Some(AstNode::Optional | AstNode::List | AstNode::Array) => expect_subtree(nodes, pos + 1),
        Some(AstNode::Map) => {
            let after_key = expect_subtree(nodes, pos + 1)?;
            match nodes.get(after_key) {
                Some(AstNode::MapSeparator) => expect_subtree(nodes, after_key + 1),
                _ => Err(ConstructionError::InvalidSchema(
                    "map type is missing its key/value separator",
                )),
            }
        }
        Some(AstNode::MapSeparator) => Err(ConstructionError::InvalidSchema(
            "unexpected map separator outside a map",
        )),
    }
}

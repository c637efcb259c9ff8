//! The chain builder (§4.5): recursive-descent construction of a
//! write/read/size closure triple for one field's `Ast`, built once at
//! schema-discovery time and reused for every call thereafter. No part of
//! `serialize`/`deserialize`/`size_of` re-inspects a type tag at call time —
//! every dispatch was already resolved when the chain was built.

use std::collections::HashMap;

use uuid::Uuid;

use crate::ast::{Ast, AstNode, LeafTag};
use crate::error::CallError;
use crate::record::CompatibilityMode;
use crate::schema::Schema;
use crate::tag::BuiltinTag;
use crate::value::{ArrayValue, Value};
use crate::varint::{self, ByteReader, ByteWriter};

pub type WriterFn = Box<dyn Fn(&Schema, &Value, &mut ByteWriter<'_>) -> Result<(), CallError> + Send + Sync>;
pub type ReaderFn =
    Box<dyn Fn(&Schema, CompatibilityMode, &mut ByteReader<'_>) -> Result<Value, CallError> + Send + Sync>;
pub type SizerFn = Box<dyn Fn(&Schema, &Value) -> usize + Send + Sync>;

/// A complete staged delegation triple for one field.
pub struct FieldChain {
    pub write: WriterFn,
    pub read: ReaderFn,
    pub size: SizerFn,
}

/// Number of leading elements an array's write inspects to choose between
/// the packed-varint and fixed-width wire forms (§4.5).
const SAMPLE_SIZE: usize = 32;

/// Builds the chain for one field's `Ast`. `ordinals` must already contain
/// every user type reachable from this field (schema discovery resolves all
/// ordinals before building any chain, so recursive/cyclic schemas are safe:
/// a chain only ever captures a plain `u32` ordinal, never a borrow into the
/// `Schema` being assembled).
pub fn build(ast: &Ast, ordinals: &HashMap<&'static str, u32>) -> Result<FieldChain, crate::error::ConstructionError> {
    let (chain, next) = build_node(&ast.nodes, 0, ordinals)?;
    debug_assert_eq!(next, ast.nodes.len(), "chain builder did not consume the whole Ast");
    Ok(chain)
}

fn build_node(
    nodes: &[AstNode],
    pos: usize,
    ordinals: &HashMap<&'static str, u32>,
) -> Result<(FieldChain, usize), crate::error::ConstructionError> {
    match nodes.get(pos) {
        Some(AstNode::Leaf(leaf)) => Ok((build_leaf(leaf, ordinals)?, pos + 1)),
        Some(AstNode::Optional) => {
            let (inner, next) = build_node(nodes, pos + 1, ordinals)?;
            Ok((wrap_optional(inner), next))
        }
        Some(AstNode::List) => {
            let (inner, next) = build_node(nodes, pos + 1, ordinals)?;
            Ok((wrap_list(inner), next))
        }
        Some(AstNode::Array) => {
            let specialization = nodes.get(pos + 1).and_then(array_specialization);
            let (inner, next) = build_node(nodes, pos + 1, ordinals)?;
            Ok((wrap_array(inner, specialization), next))
        }
        Some(AstNode::Map) => {
            let (key_chain, after_key) = build_node(nodes, pos + 1, ordinals)?;
            match nodes.get(after_key) {
                Some(AstNode::MapSeparator) => {}
                _ => {
                    return Err(crate::error::ConstructionError::InvalidSchema(
                        "map ast is missing its separator",
                    ))
                }
            }
            let (value_chain, after_value) = build_node(nodes, after_key + 1, ordinals)?;
            Ok((wrap_map(key_chain, value_chain), after_value))
        }
        Some(AstNode::MapSeparator) => Err(crate::error::ConstructionError::InvalidSchema(
            "unexpected map separator",
        )),
        None => Err(crate::error::ConstructionError::InvalidSchema(
            "ast ended before a chain could be built",
        )),
    }
}

#[derive(Clone, Copy)]
enum ArraySpecialization {
    Byte,
    Bool,
    Int,
    Long,
}

fn array_specialization(node: &AstNode) -> Option<ArraySpecialization> {
    match node {
        AstNode::Leaf(LeafTag::Builtin(BuiltinTag::Byte)) => Some(ArraySpecialization::Byte),
        AstNode::Leaf(LeafTag::Builtin(BuiltinTag::Boolean)) => Some(ArraySpecialization::Bool),
        AstNode::Leaf(LeafTag::Builtin(BuiltinTag::Integer)) => Some(ArraySpecialization::Int),
        AstNode::Leaf(LeafTag::Builtin(BuiltinTag::Long)) => Some(ArraySpecialization::Long),
        _ => None,
    }
}

fn build_leaf(
    leaf: &LeafTag,
    ordinals: &HashMap<&'static str, u32>,
) -> Result<FieldChain, crate::error::ConstructionError> {
    match leaf {
        LeafTag::Builtin(tag) => build_builtin_leaf(*tag),
        LeafTag::Record(descriptor_fn) => {
            let ordinal = resolve_ordinal(*descriptor_fn, ordinals)?;
            Ok(build_record_leaf(ordinal))
        }
        LeafTag::Enum(descriptor_fn) => {
            let ordinal = resolve_ordinal(*descriptor_fn, ordinals)?;
            Ok(build_enum_leaf(ordinal))
        }
        LeafTag::Interface(descriptor_fn) => {
            let ordinal = resolve_ordinal(*descriptor_fn, ordinals)?;
            Ok(build_interface_leaf(ordinal))
        }
    }
}

fn resolve_ordinal(
    descriptor_fn: fn() -> crate::descriptor::UserTypeDescriptor,
    ordinals: &HashMap<&'static str, u32>,
) -> Result<u32, crate::error::ConstructionError> {
    let name = descriptor_fn().name;
    ordinals
        .get(name)
        .copied()
        .ok_or(crate::error::ConstructionError::InvalidSchema(
            "leaf type is not part of the discovered schema",
        ))
}

fn build_builtin_leaf(tag: BuiltinTag) -> Result<FieldChain, crate::error::ConstructionError> {
    Ok(match tag {
        BuiltinTag::Boolean => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Bool(b) => {
                    writer.write_u8(u8::from(*b));
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected bool value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Bool(reader.read_u8()? != 0))),
            size: Box::new(|_schema, _value| 1),
        },
        BuiltinTag::Byte => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Byte(b) => {
                    writer.write_u8(*b as u8);
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected byte value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Byte(reader.read_u8()? as i8))),
            size: Box::new(|_schema, _value| 1),
        },
        BuiltinTag::Short => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Short(n) => {
                    writer.write_bytes(&n.to_le_bytes());
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected short value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Short(i16::from_le_bytes(reader.read_fixed::<2>()?)))),
            size: Box::new(|_schema, _value| 2),
        },
        BuiltinTag::Character => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Char(c) => {
                    writer.write_varint32(*c as u32 as i32);
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected char value")),
            }),
            read: Box::new(|_schema, _mode, reader| {
                let scalar = reader.read_varint32()? as u32;
                char::from_u32(scalar)
                    .map(Value::Char)
                    .ok_or(CallError::MalformedWire("invalid unicode scalar value"))
            }),
            size: Box::new(|_schema, value| match value {
                Value::Char(c) => varint::varint32_size(*c as u32 as i32),
                _ => 0,
            }),
        },
        BuiltinTag::Integer => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Int(n) => {
                    writer.write_varint32(*n);
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected int value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Int(reader.read_varint32()?))),
            size: Box::new(|_schema, value| match value {
                Value::Int(n) => varint::varint32_size(*n),
                _ => 0,
            }),
        },
        BuiltinTag::Long => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Long(n) => {
                    writer.write_varint64(*n);
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected long value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Long(reader.read_varint64()?))),
            size: Box::new(|_schema, value| match value {
                Value::Long(n) => varint::varint64_size(*n),
                _ => 0,
            }),
        },
        BuiltinTag::Float => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Float(n) => {
                    writer.write_bytes(&n.to_le_bytes());
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected float value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Float(f32::from_le_bytes(reader.read_fixed::<4>()?)))),
            size: Box::new(|_schema, _value| 4),
        },
        BuiltinTag::Double => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Double(n) => {
                    writer.write_bytes(&n.to_le_bytes());
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected double value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Double(f64::from_le_bytes(reader.read_fixed::<8>()?)))),
            size: Box::new(|_schema, _value| 8),
        },
        BuiltinTag::String => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Str(s) => {
                    writer.write_string(s);
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected string value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Str(reader.read_string()?))),
            size: Box::new(|_schema, value| match value {
                Value::Str(s) => varint::string_size(s),
                _ => 0,
            }),
        },
        BuiltinTag::Uuid => FieldChain {
            write: Box::new(|_schema, value, writer| match value {
                Value::Uuid(u) => {
                    writer.write_bytes(u.as_bytes());
                    Ok(())
                }
                _ => Err(CallError::SchemaMismatch("expected uuid value")),
            }),
            read: Box::new(|_schema, _mode, reader| Ok(Value::Uuid(Uuid::from_bytes(reader.read_fixed::<16>()?)))),
            size: Box::new(|_schema, _value| 16),
        },
        BuiltinTag::IntArrayPacked
        | BuiltinTag::IntArrayPlain
        | BuiltinTag::LongArrayPacked
        | BuiltinTag::LongArrayPlain => {
            return Err(crate::error::ConstructionError::InvalidSchema(
                "array specialization markers cannot appear as a standalone leaf",
            ))
        }
    })
}

fn build_record_leaf(ordinal: u32) -> FieldChain {
    FieldChain {
        write: Box::new(move |schema, value, writer| {
            let (_name, fields) = match value {
                Value::Record(name, fields) => (name, fields),
                _ => return Err(CallError::SchemaMismatch("expected record value")),
            };
            writer.write_varint64(i64::from(ordinal) + 1);
            crate::record::write_record(schema, ordinal, fields, writer)
        }),
        read: Box::new(move |schema, mode, reader| {
            let wire_ordinal = reader.read_varint64()?;
            if wire_ordinal != i64::from(ordinal) + 1 {
                return Err(CallError::SchemaMismatch(
                    "record ordinal on the wire does not match this field's static record type",
                ));
            }
            crate::record::read_record(schema, mode, ordinal, reader)
        }),
        size: Box::new(move |schema, value| match value {
            Value::Record(_, fields) => {
                varint::varint64_size(i64::from(ordinal) + 1) + crate::record::size_record(schema, ordinal, fields)
            }
            _ => 0,
        }),
    }
}

fn build_enum_leaf(ordinal: u32) -> FieldChain {
    FieldChain {
        write: Box::new(move |schema, value, writer| {
            let index = match value {
                Value::EnumVariant(_, index) => *index,
                _ => return Err(CallError::SchemaMismatch("expected enum value")),
            };
            let entry = schema
                .entry(ordinal)
                .ok_or(CallError::SchemaMismatch("unknown enum ordinal"))?;
            let count = match &entry.descriptor.kind {
                crate::descriptor::UserTypeKind::Enum(e) => e.variants.len() as u32,
                _ => return Err(CallError::SchemaMismatch("ordinal is not an enum")),
            };
            if index >= count {
                return Err(CallError::SchemaMismatch("enum variant index out of range"));
            }
            writer.write_varint64(i64::from(index));
            Ok(())
        }),
        read: Box::new(move |schema, mode, reader| {
            let raw = reader.read_varint64()?;
            let index = u32::try_from(raw).map_err(|_| CallError::MalformedWire("enum variant index out of range"))?;
            let entry = schema
                .entry(ordinal)
                .ok_or(CallError::SchemaMismatch("unknown enum ordinal"))?;
            match &entry.descriptor.kind {
                crate::descriptor::UserTypeKind::Enum(e) => {
                    if index as usize >= e.variants.len() {
                        return Err(CallError::MalformedWire("enum variant index out of range"));
                    }
                    Ok(Value::EnumVariant(entry.descriptor.name, index))
                }
                _ => Err(CallError::SchemaMismatch("ordinal is not an enum")),
            }
        }),
        size: Box::new(move |_schema, value| match value {
            Value::EnumVariant(_, index) => varint::varint64_size(i64::from(*index)),
            _ => 0,
        }),
    }
}

fn build_interface_leaf(declared_ordinal: u32) -> FieldChain {
    FieldChain {
        write: Box::new(move |schema, value, writer| {
            let name = match value {
                Value::Record(name, _) => *name,
                _ => return Err(CallError::SchemaMismatch("expected a record implementing the interface")),
            };
            let ordinal = schema
                .ordinal_of(name)
                .ok_or(CallError::SchemaMismatch("interface variant not in schema"))?;
            writer.write_varint64(i64::from(ordinal) + 1);
            let fields = match value {
                Value::Record(_, fields) => fields,
                _ => unreachable!(),
            };
            crate::record::write_record(schema, ordinal, fields, writer)
        }),
        read: Box::new(move |schema, mode, reader| {
            let wire_ordinal = reader.read_varint64()?;
            let ordinal = u32::try_from(wire_ordinal - 1)
                .map_err(|_| CallError::MalformedWire("interface variant ordinal out of range"))?;
            let declared = schema
                .entry(declared_ordinal)
                .ok_or(CallError::SchemaMismatch("unknown interface ordinal"))?;
            if !declared.variant_ordinals.contains(&ordinal) {
                return Err(CallError::MalformedWire(
                    "decoded ordinal is not one of this interface's permitted variants",
                ));
            }
            crate::record::read_record(schema, mode, ordinal, reader)
        }),
        size: Box::new(move |schema, value| {
            let name = match value {
                Value::Record(name, _) => *name,
                _ => return 0,
            };
            let ordinal = match schema.ordinal_of(name) {
                Some(o) => o,
                None => return 0,
            };
            let fields = match value {
                Value::Record(_, fields) => fields,
                _ => return 0,
            };
            varint::varint64_size(i64::from(ordinal) + 1) + crate::record::size_record(schema, ordinal, fields)
        }),
    }
}

fn wrap_optional(inner: FieldChain) -> FieldChain {
    let FieldChain { write, read, size } = inner;
    FieldChain {
        write: Box::new(move |schema, value, writer| match value {
            Value::Optional(None) => {
                writer.write_varint64(0);
                Ok(())
            }
            Value::Optional(Some(boxed)) => {
                writer.write_varint64(BuiltinTag::Optional.marker());
                write(schema, boxed, writer)
            }
            _ => Err(CallError::SchemaMismatch("expected optional value")),
        }),
        read: Box::new(move |schema, mode, reader| {
            let marker = reader.read_varint64()?;
            if marker == 0 {
                Ok(Value::Optional(None))
            } else if marker == BuiltinTag::Optional.marker() {
                Ok(Value::Optional(Some(Box::new(read(schema, mode, reader)?))))
            } else {
                Err(CallError::MalformedWire("expected the OPTIONAL marker or null"))
            }
        }),
        size: Box::new(move |schema, value| match value {
            Value::Optional(None) => varint::varint64_size(0),
            Value::Optional(Some(boxed)) => varint::varint64_size(BuiltinTag::Optional.marker()) + size(schema, boxed),
            _ => 0,
        }),
    }
}

fn wrap_list(inner: FieldChain) -> FieldChain {
    let FieldChain { write, read, size } = inner;
    FieldChain {
        write: Box::new(move |schema, value, writer| match value {
            Value::List(items) => {
                if items.is_empty() {
                    writer.write_varint64(0);
                    return Ok(());
                }
                writer.write_varint64(BuiltinTag::List.marker());
                writer.write_uvarint64(items.len() as u64);
                for item in items {
                    write(schema, item, writer)?;
                }
                Ok(())
            }
            _ => Err(CallError::SchemaMismatch("expected list value")),
        }),
        read: Box::new(move |schema, mode, reader| {
            let marker = reader.read_varint64()?;
            if marker == 0 {
                return Ok(Value::List(Vec::new()));
            }
            if marker != BuiltinTag::List.marker() {
                return Err(CallError::MalformedWire("expected the LIST marker or null"));
            }
            let len = reader.read_uvarint64()? as usize;
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                items.push(read(schema, mode, reader)?);
            }
            Ok(Value::List(items))
        }),
        size: Box::new(move |schema, value| match value {
            Value::List(items) if items.is_empty() => varint::varint64_size(0),
            Value::List(items) => {
                varint::varint64_size(BuiltinTag::List.marker())
                    + varint::varint64_size(items.len() as i64)
                    + items.iter().map(|item| size(schema, item)).sum::<usize>()
            }
            _ => 0,
        }),
    }
}

fn wrap_map(key_chain: FieldChain, value_chain: FieldChain) -> FieldChain {
    let FieldChain { write: write_key, read: read_key, size: size_key } = key_chain;
    let FieldChain { write: write_value, read: read_value, size: size_value } = value_chain;
    FieldChain {
        write: Box::new(move |schema, value, writer| match value {
            Value::Map(pairs) => {
                if pairs.is_empty() {
                    writer.write_varint64(0);
                    return Ok(());
                }
                writer.write_varint64(BuiltinTag::Map.marker());
                writer.write_uvarint64(pairs.len() as u64);
                for (k, v) in pairs {
                    write_key(schema, k, writer)?;
                    write_value(schema, v, writer)?;
                }
                Ok(())
            }
            _ => Err(CallError::SchemaMismatch("expected map value")),
        }),
        read: Box::new(move |schema, mode, reader| {
            let marker = reader.read_varint64()?;
            if marker == 0 {
                return Ok(Value::Map(Vec::new()));
            }
            if marker != BuiltinTag::Map.marker() {
                return Err(CallError::MalformedWire("expected the MAP marker or null"));
            }
            let len = reader.read_uvarint64()? as usize;
            let mut pairs = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                let k = read_key(schema, mode, reader)?;
                let v = read_value(schema, mode, reader)?;
                pairs.push((k, v));
            }
            Ok(Value::Map(pairs))
        }),
        size: Box::new(move |schema, value| match value {
            Value::Map(pairs) if pairs.is_empty() => varint::varint64_size(0),
            Value::Map(pairs) => {
                varint::varint64_size(BuiltinTag::Map.marker())
                    + varint::varint64_size(pairs.len() as i64)
                    + pairs
                        .iter()
                        .map(|(k, v)| size_key(schema, k) + size_value(schema, v))
                        .sum::<usize>()
            }
            _ => 0,
        }),
    }
}

fn wrap_array(inner: FieldChain, specialization: Option<ArraySpecialization>) -> FieldChain {
    match specialization {
        Some(ArraySpecialization::Byte) => array_bytes_chain(),
        Some(ArraySpecialization::Bool) => array_bools_chain(),
        Some(ArraySpecialization::Int) => array_ints_chain(),
        Some(ArraySpecialization::Long) => array_longs_chain(),
        None => array_generic_chain(inner),
    }
}

fn array_bytes_chain() -> FieldChain {
    FieldChain {
        write: Box::new(|_schema, value, writer| match value {
            Value::Array(ArrayValue::Bytes(items)) => {
                if items.is_empty() {
                    writer.write_varint64(0);
                    return Ok(());
                }
                writer.write_varint64(BuiltinTag::Array.marker());
                writer.write_uvarint64(items.len() as u64);
                for b in items {
                    writer.write_u8(*b as u8);
                }
                Ok(())
            }
            _ => Err(CallError::SchemaMismatch("expected byte array value")),
        }),
        read: Box::new(|_schema, _mode, reader| {
            let marker = reader.read_varint64()?;
            if marker == 0 {
                return Ok(Value::Array(ArrayValue::Bytes(Vec::new())));
            }
            if marker != BuiltinTag::Array.marker() {
                return Err(CallError::MalformedWire("expected the ARRAY marker or null"));
            }
            let len = reader.read_uvarint64()? as usize;
            let bytes = reader.read_bytes(len)?;
            Ok(Value::Array(ArrayValue::Bytes(bytes.iter().map(|b| *b as i8).collect())))
        }),
        size: Box::new(|_schema, value| match value {
            Value::Array(ArrayValue::Bytes(items)) if items.is_empty() => varint::varint64_size(0),
            Value::Array(ArrayValue::Bytes(items)) => {
                varint::varint64_size(BuiltinTag::Array.marker())
                    + varint::varint64_size(items.len() as i64)
                    + items.len()
            }
            _ => 0,
        }),
    }
}

fn array_bools_chain() -> FieldChain {
    FieldChain {
        write: Box::new(|_schema, value, writer| match value {
            Value::Array(ArrayValue::Bools(items)) => {
                if items.is_empty() {
                    writer.write_varint64(0);
                    return Ok(());
                }
                writer.write_varint64(BuiltinTag::Array.marker());
                writer.write_uvarint64(items.len() as u64);
                for chunk in items.chunks(8) {
                    let mut byte = 0u8;
                    for (i, b) in chunk.iter().enumerate() {
                        if *b {
                            byte |= 1 << i;
                        }
                    }
                    writer.write_u8(byte);
                }
                Ok(())
            }
            _ => Err(CallError::SchemaMismatch("expected bool array value")),
        }),
        read: Box::new(|_schema, _mode, reader| {
            let marker = reader.read_varint64()?;
            if marker == 0 {
                return Ok(Value::Array(ArrayValue::Bools(Vec::new())));
            }
            if marker != BuiltinTag::Array.marker() {
                return Err(CallError::MalformedWire("expected the ARRAY marker or null"));
            }
            let len = reader.read_uvarint64()? as usize;
            let packed_len = len.div_ceil(8);
            let packed = reader.read_bytes(packed_len)?;
            let mut items = Vec::with_capacity(len);
            for i in 0..len {
                let byte = packed[i / 8];
                items.push(byte & (1 << (i % 8)) != 0);
            }
            Ok(Value::Array(ArrayValue::Bools(items)))
        }),
        size: Box::new(|_schema, value| match value {
            Value::Array(ArrayValue::Bools(items)) if items.is_empty() => varint::varint64_size(0),
            Value::Array(ArrayValue::Bools(items)) => {
                varint::varint64_size(BuiltinTag::Array.marker())
                    + varint::varint64_size(items.len() as i64)
                    + items.len().div_ceil(8)
            }
            _ => 0,
        }),
    }
}

fn array_ints_chain() -> FieldChain {
    FieldChain {
        write: Box::new(|_schema, value, writer| match value {
            Value::Array(ArrayValue::Ints(items)) => {
                if items.is_empty() {
                    writer.write_varint64(0);
                    return Ok(());
                }
                writer.write_varint64(BuiltinTag::Array.marker());
                writer.write_uvarint64(items.len() as u64);
                let packed = choose_packed(items.iter().copied().map(i64::from), 4);
                writer.write_varint64(if packed {
                    BuiltinTag::IntArrayPacked.marker()
                } else {
                    BuiltinTag::IntArrayPlain.marker()
                });
                for n in items {
                    if packed {
                        writer.write_varint32(*n);
                    } else {
                        writer.write_bytes(&n.to_le_bytes());
                    }
                }
                Ok(())
            }
            _ => Err(CallError::SchemaMismatch("expected int array value")),
        }),
        read: Box::new(|_schema, _mode, reader| {
            let marker = reader.read_varint64()?;
            if marker == 0 {
                return Ok(Value::Array(ArrayValue::Ints(Vec::new())));
            }
            if marker != BuiltinTag::Array.marker() {
                return Err(CallError::MalformedWire("expected the ARRAY marker or null"));
            }
            let len = reader.read_uvarint64()? as usize;
            let discriminator = reader.read_varint64()?;
            let packed = if discriminator == BuiltinTag::IntArrayPacked.marker() {
                true
            } else if discriminator == BuiltinTag::IntArrayPlain.marker() {
                false
            } else {
                return Err(CallError::MalformedWire("expected an int array discriminator"));
            };
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                if packed {
                    items.push(reader.read_varint32()?);
                } else {
                    items.push(i32::from_le_bytes(reader.read_fixed::<4>()?));
                }
            }
            Ok(Value::Array(ArrayValue::Ints(items)))
        }),
        size: Box::new(|_schema, value| match value {
            Value::Array(ArrayValue::Ints(items)) if items.is_empty() => varint::varint64_size(0),
            Value::Array(ArrayValue::Ints(items)) => {
                let packed = choose_packed(items.iter().copied().map(i64::from), 4);
                varint::varint64_size(BuiltinTag::Array.marker())
                    + varint::varint64_size(items.len() as i64)
                    + varint::varint64_size(if packed {
                        BuiltinTag::IntArrayPacked.marker()
                    } else {
                        BuiltinTag::IntArrayPlain.marker()
                    })
                    + if packed {
                        items.iter().map(|n| varint::varint32_size(*n)).sum()
                    } else {
                        items.len() * 4
                    }
            }
            _ => 0,
        }),
    }
}

fn array_longs_chain() -> FieldChain {
    FieldChain {
        write: Box::new(|_schema, value, writer| match value {
            Value::Array(ArrayValue::Longs(items)) => {
                if items.is_empty() {
                    writer.write_varint64(0);
                    return Ok(());
                }
                writer.write_varint64(BuiltinTag::Array.marker());
                writer.write_uvarint64(items.len() as u64);
                let packed = choose_packed(items.iter().copied(), 8);
                writer.write_varint64(if packed {
                    BuiltinTag::LongArrayPacked.marker()
                } else {
                    BuiltinTag::LongArrayPlain.marker()
                });
                for n in items {
                    if packed {
                        writer.write_varint64(*n);
                    } else {
                        writer.write_bytes(&n.to_le_bytes());
                    }
                }
                Ok(())
            }
            _ => Err(CallError::SchemaMismatch("expected long array value")),
        }),
        read: Box::new(|_schema, _mode, reader| {
            let marker = reader.read_varint64()?;
            if marker == 0 {
                return Ok(Value::Array(ArrayValue::Longs(Vec::new())));
            }
            if marker != BuiltinTag::Array.marker() {
                return Err(CallError::MalformedWire("expected the ARRAY marker or null"));
            }
            let len = reader.read_uvarint64()? as usize;
            let discriminator = reader.read_varint64()?;
            let packed = if discriminator == BuiltinTag::LongArrayPacked.marker() {
                true
            } else if discriminator == BuiltinTag::LongArrayPlain.marker() {
                false
            } else {
                return Err(CallError::MalformedWire("expected a long array discriminator"));
            };
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                if packed {
                    items.push(reader.read_varint64()?);
                } else {
                    items.push(i64::from_le_bytes(reader.read_fixed::<8>()?));
                }
            }
            Ok(Value::Array(ArrayValue::Longs(items)))
        }),
        size: Box::new(|_schema, value| match value {
            Value::Array(ArrayValue::Longs(items)) if items.is_empty() => varint::varint64_size(0),
            Value::Array(ArrayValue::Longs(items)) => {
                let packed = choose_packed(items.iter().copied(), 8);
                varint::varint64_size(BuiltinTag::Array.marker())
                    + varint::varint64_size(items.len() as i64)
                    + varint::varint64_size(if packed {
                        BuiltinTag::LongArrayPacked.marker()
                    } else {
                        BuiltinTag::LongArrayPlain.marker()
                    })
                    + if packed {
                        items.iter().map(|n| varint::varint64_size(*n)).sum()
                    } else {
                        items.len() * 8
                    }
            }
            _ => 0,
        }),
    }
}

fn array_generic_chain(inner: FieldChain) -> FieldChain {
    let FieldChain { write, read, size } = inner;
    FieldChain {
        write: Box::new(move |schema, value, writer| match value {
            Value::Array(ArrayValue::Generic(items)) => {
                if items.is_empty() {
                    writer.write_varint64(0);
                    return Ok(());
                }
                writer.write_varint64(BuiltinTag::Array.marker());
                writer.write_uvarint64(items.len() as u64);
                for item in items {
                    write(schema, item, writer)?;
                }
                Ok(())
            }
            _ => Err(CallError::SchemaMismatch("expected generic array value")),
        }),
        read: Box::new(move |schema, mode, reader| {
            let marker = reader.read_varint64()?;
            if marker == 0 {
                return Ok(Value::Array(ArrayValue::Generic(Vec::new())));
            }
            if marker != BuiltinTag::Array.marker() {
                return Err(CallError::MalformedWire("expected the ARRAY marker or null"));
            }
            let len = reader.read_uvarint64()? as usize;
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                items.push(read(schema, mode, reader)?);
            }
            Ok(Value::Array(ArrayValue::Generic(items)))
        }),
        size: Box::new(move |schema, value| match value {
            Value::Array(ArrayValue::Generic(items)) if items.is_empty() => varint::varint64_size(0),
            Value::Array(ArrayValue::Generic(items)) => {
                varint::varint64_size(BuiltinTag::Array.marker())
                    + varint::varint64_size(items.len() as i64)
                    + items.iter().map(|item| size(schema, item)).sum::<usize>()
            }
            _ => 0,
        }),
    }
}

/// Samples up to [`SAMPLE_SIZE`] leading elements, comparing their average
/// varint footprint to `fixed_width`, to decide whether the whole array
/// should be written packed or fixed-width (§4.5). An empty array always
/// chooses packed, trivially.
fn choose_packed(values: impl Iterator<Item = i64>, fixed_width: usize) -> bool {
    let mut total = 0usize;
    let mut count = 0usize;
    for n in values.take(SAMPLE_SIZE) {
        total += varint::varint64_size(n);
        count += 1;
    }
    if count == 0 {
        return true;
    }
    total <= count * fixed_width
}

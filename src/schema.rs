//! Schema discovery (§4.4): the transitive closure of user types reachable
//! from a root, sorted into a stable ordinal assignment.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::ast::{self, Ast, LeafTag, TypeDesc};
use crate::chain::{self, FieldChain};
use crate::descriptor::{Describable, UserTypeDescriptor, UserTypeKind};
use crate::error::ConstructionError;

/// One discovered user type: its static descriptor plus the derived `Ast`
/// and built `FieldChain` for each of its fields (records), or the ordinals
/// of its permitted variants (interfaces).
pub struct SchemaEntry {
    pub ordinal: u32,
    pub descriptor: UserTypeDescriptor,
    /// Field ASTs in source order, for records; empty otherwise.
    pub field_asts: Vec<Ast>,
    /// Built write/read/size chains, one per field in source order, for
    /// records; empty otherwise. Built once at schema-discovery time and
    /// reused for every call thereafter.
    pub field_chains: Vec<FieldChain>,
    /// Ordinals of the implementing records, in the interface's own variant
    /// order, for interfaces; empty otherwise.
    pub variant_ordinals: Vec<u32>,
}

/// The discovered, ordinal-indexed closure of user types reachable from one
/// root `Describable` type.
pub struct Schema {
    pub entries: Vec<SchemaEntry>,
    pub ordinal_by_name: HashMap<&'static str, u32>,
}

impl Schema {
    /// Walks the transitive closure of types reachable from `T`, assigns
    /// ordinals by fully-qualified name, and validates every discovered
    /// record and interface before returning.
    pub fn discover<T: Describable>() -> Result<Self, ConstructionError> {
        let mut reachable: HashMap<&'static str, fn() -> UserTypeDescriptor> = HashMap::new();
        let mut frontier: Vec<fn() -> UserTypeDescriptor> = vec![T::descriptor];
        let mut seen: HashSet<&'static str> = HashSet::new();

        while let Some(descriptor_fn) = frontier.pop() {
            let descriptor = descriptor_fn();
            if !seen.insert(descriptor.name) {
                continue;
            }
            collect_dependencies(&descriptor, &mut frontier);
            reachable.insert(descriptor.name, descriptor_fn);
        }

        let mut names: Vec<&'static str> = reachable.keys().copied().collect();
        names.sort_unstable();

        debug!("schema discovery found {} reachable user type(s)", names.len());

        let mut ordinal_by_name = HashMap::new();
        for (ordinal, name) in names.iter().enumerate() {
            ordinal_by_name.insert(*name, ordinal as u32);
        }

        let mut entries = Vec::with_capacity(names.len());
        for name in &names {
            let descriptor_fn = reachable[name];
            let descriptor = descriptor_fn();
            let ordinal = ordinal_by_name[name];
            let (field_asts, variant_ordinals) = match &descriptor.kind {
                UserTypeKind::Record(record) => {
                    let mut asts = Vec::with_capacity(record.fields.len());
                    for field in &record.fields {
                        asts.push(ast::analyse(&field.type_desc)?);
                    }
                    (asts, Vec::new())
                }
                UserTypeKind::Enum(_) => (Vec::new(), Vec::new()),
                UserTypeKind::Interface(interface) => {
                    let mut ordinals = Vec::with_capacity(interface.variants.len());
                    for variant_fn in &interface.variants {
                        let variant_descriptor = variant_fn();
                        if !matches!(variant_descriptor.kind, UserTypeKind::Record(_)) {
                            return Err(ConstructionError::InvalidSchema(
                                "interface variant must be a record",
                            ));
                        }
                        let variant_ordinal = *ordinal_by_name.get(variant_descriptor.name).ok_or(
                            ConstructionError::InvalidSchema(
                                "interface variant is unreachable from its own descriptor",
                            ),
                        )?;
                        ordinals.push(variant_ordinal);
                    }
                    (Vec::new(), ordinals)
                }
            };
            validate_entry(&descriptor)?;
            let field_chains = field_asts
                .iter()
                .map(|field_ast| chain::build(field_ast, &ordinal_by_name))
                .collect::<Result<Vec<_>, _>>()?;
            entries.push(SchemaEntry {
                ordinal,
                descriptor,
                field_asts,
                field_chains,
                variant_ordinals,
            });
        }

        Ok(Self {
            entries,
            ordinal_by_name,
        })
    }

    #[must_use]
    pub fn entry(&self, ordinal: u32) -> Option<&SchemaEntry> {
        self.entries.get(ordinal as usize)
    }

    #[must_use]
    pub fn ordinal_of(&self, name: &str) -> Option<u32> {
        self.ordinal_by_name.get(name).copied()
    }
}

fn collect_dependencies(
    descriptor: &UserTypeDescriptor,
    frontier: &mut Vec<fn() -> UserTypeDescriptor>,
) {
    match &descriptor.kind {
        UserTypeKind::Record(record) => {
            for field in &record.fields {
                collect_from_type_desc(&field.type_desc, frontier);
            }
        }
        UserTypeKind::Enum(_) => {}
        UserTypeKind::Interface(interface) => {
            frontier.extend(interface.variants.iter().copied());
        }
    }
}

fn collect_from_type_desc(desc: &TypeDesc, frontier: &mut Vec<fn() -> UserTypeDescriptor>) {
    match desc {
        TypeDesc::Builtin(_) => {}
        TypeDesc::Optional(inner) | TypeDesc::List(inner) | TypeDesc::Array(inner) => {
            collect_from_type_desc(inner, frontier);
        }
        TypeDesc::Map(key, value) => {
            collect_from_type_desc(key, frontier);
            collect_from_type_desc(value, frontier);
        }
        TypeDesc::User(descriptor_fn) => frontier.push(*descriptor_fn),
    }
}

fn validate_entry(descriptor: &UserTypeDescriptor) -> Result<(), ConstructionError> {
    match &descriptor.kind {
        UserTypeKind::Record(record) => {
            let mut seen = HashSet::new();
            for field in &record.fields {
                if !seen.insert(field.name) {
                    return Err(ConstructionError::InvalidSchema(
                        "record declares the same field name twice",
                    ));
                }
            }
            Ok(())
        }
        UserTypeKind::Enum(e) => {
            if e.variants.is_empty() {
                return Err(ConstructionError::InvalidSchema(
                    "enum declares no variants",
                ));
            }
            Ok(())
        }
        UserTypeKind::Interface(interface) => {
            if interface.variants.is_empty() {
                return Err(ConstructionError::InvalidSchema(
                    "interface declares no permitted variants",
                ));
            }
            Ok(())
        }
    }
}

/// Resolves the leaf's ordinal via `schema`, for the chain builder's user
/// leaves, which only know their descriptor function until discovery runs.
pub fn ordinal_for_leaf(schema: &Schema, leaf: &LeafTag) -> Option<u32> {
    let descriptor_fn = match leaf {
        LeafTag::Builtin(_) => return None,
        LeafTag::Record(f) | LeafTag::Enum(f) | LeafTag::Interface(f) => *f,
    };
    schema.ordinal_of(descriptor_fn().name)
}

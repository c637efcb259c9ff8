//! Record field orchestration and the additive compatibility pathway (§4.6).
//!
//! A record's wire body is its fields' payloads back to back, in source
//! order, with no length or count framing of its own — the record's own
//! ordinal (written by the caller, see `chain::build_record_leaf`) is the
//! only thing that precedes it. Because there is no framing, a reader can
//! only ever consume exactly as many fields as its own schema declares;
//! [`CompatibilityMode::Backward`]/[`CompatibilityMode::Both`] cope with a
//! record that has *fewer* fields on the wire than the reader's schema by
//! catching the buffer running out mid-read and padding the rest with
//! default values. There is no way to detect *extra* trailing fields
//! without framing, so [`CompatibilityMode::Forward`] cannot actually skip
//! anything it doesn't recognise — see its docs below.

use crate::error::CallError;
use crate::schema::Schema;
use crate::value::Value;
use crate::varint::{ByteReader, ByteWriter};

/// How a reader tolerates a record whose wire field count does not match
/// its own compiled field count. Off by default; every other mode is
/// strictly additive, matching the single-direction evolution (`SPEC_FULL.md`
/// §9) this port supports — fields are only ever appended, never removed or
/// reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompatibilityMode {
    /// The wire field count must equal the reader's; any mismatch is a
    /// `SchemaMismatch`.
    #[default]
    Off,
    /// The reader may have gained fields since the data was written; a
    /// record running out of wire bytes partway through its field list is
    /// padded rather than rejected.
    Backward,
    /// The reader may be older than the writer. There is no framing to skip
    /// unrecognised trailing fields by, so this mode is observably identical
    /// to [`Self::Off`]: a record is read by consuming exactly the reader's
    /// own field count and leaving anything past it untouched for whichever
    /// chain reads next. Kept as a distinct, named mode so a caller's
    /// intent is recorded even though this port cannot act on it.
    Forward,
    /// Both directions are tolerated at once (`Backward`'s padding plus
    /// `Forward`'s no-op).
    Both,
}

impl CompatibilityMode {
    fn tolerates_fewer_on_wire(self) -> bool {
        matches!(self, Self::Backward | Self::Both)
    }
}

/// Writes one record's fields back to back, in source order. No length or
/// count prefix: the record's own ordinal, written by the caller, is all
/// that identifies this body on the wire.
pub fn write_record(
    schema: &Schema,
    ordinal: u32,
    fields: &[Value],
    writer: &mut ByteWriter<'_>,
) -> Result<(), CallError> {
    let entry = schema
        .entry(ordinal)
        .ok_or(CallError::SchemaMismatch("unknown record ordinal"))?;
    if fields.len() != entry.field_chains.len() {
        return Err(CallError::SchemaMismatch(
            "record value's field count does not match its schema",
        ));
    }
    for (chain, value) in entry.field_chains.iter().zip(fields) {
        (chain.write)(schema, value, writer)?;
    }
    Ok(())
}

/// Reads one record's fields in source order. Under `Backward`/`Both`, a
/// buffer that runs out partway through the field list is not an error: the
/// remaining fields are padded with their default value instead.
pub fn read_record(
    schema: &Schema,
    mode: CompatibilityMode,
    ordinal: u32,
    reader: &mut ByteReader<'_>,
) -> Result<Value, CallError> {
    let entry = schema
        .entry(ordinal)
        .ok_or(CallError::SchemaMismatch("unknown record ordinal"))?;

    let mut fields = Vec::with_capacity(entry.field_chains.len());
    let mut padding = false;
    for (index, chain) in entry.field_chains.iter().enumerate() {
        if !padding {
            match (chain.read)(schema, mode, reader) {
                Ok(value) => {
                    fields.push(value);
                    continue;
                }
                Err(CallError::BufferExhausted) if mode.tolerates_fewer_on_wire() => padding = true,
                Err(err) => return Err(err),
            }
        }
        fields.push(default_value(entry, index)?);
    }

    Ok(Value::Record(entry.descriptor.name, fields))
}

/// Computes the wire size of one record's body: just its fields, summed.
pub fn size_record(schema: &Schema, ordinal: u32, fields: &[Value]) -> usize {
    let Some(entry) = schema.entry(ordinal) else {
        return 0;
    };
    entry
        .field_chains
        .iter()
        .zip(fields)
        .map(|(chain, value)| (chain.size)(schema, value))
        .sum()
}

/// The zero value for a field appended since the data on the wire was
/// written (`Backward`/`Both`). Only meaningful for `OPTIONAL`-wrapped
/// fields — any other appended field type cannot be defaulted and is a
/// schema error, since a required value has no safe placeholder.
fn default_value(entry: &crate::schema::SchemaEntry, field_index: usize) -> Result<Value, CallError> {
    let ast = entry
        .field_asts
        .get(field_index)
        .ok_or(CallError::SchemaMismatch("missing field ast for defaulting"))?;
    match ast.nodes.first() {
        Some(crate::ast::AstNode::Optional) => Ok(Value::Optional(None)),
        _ => Err(CallError::SchemaMismatch(
            "appended field is not optional and has no default value",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        Describable, FieldDescriptor, RecordDescriptor, UserTypeDescriptor, UserTypeKind,
    };
    use crate::schema::Schema;

    struct Padded;

    impl Describable for Padded {
        fn descriptor() -> UserTypeDescriptor {
            UserTypeDescriptor {
                name: "record::tests::Padded",
                kind: UserTypeKind::Record(RecordDescriptor {
                    fields: vec![
                        FieldDescriptor {
                            name: "a",
                            type_desc: crate::ast::TypeDesc::Builtin(crate::tag::BuiltinTag::Integer),
                        },
                        FieldDescriptor {
                            name: "b",
                            type_desc: crate::ast::TypeDesc::Optional(Box::new(
                                crate::ast::TypeDesc::Builtin(crate::tag::BuiltinTag::Integer),
                            )),
                        },
                    ],
                }),
            }
        }

        fn to_value(&self) -> Value {
            Value::Record(
                "record::tests::Padded",
                vec![Value::Int(1), Value::Optional(None)],
            )
        }

        fn from_value(_value: Value) -> Result<Self, CallError> {
            Ok(Padded)
        }
    }

    #[test]
    fn backward_mode_pads_missing_trailing_optional_field() {
        let schema = Schema::discover::<Padded>().unwrap();
        let ordinal = schema.ordinal_of("record::tests::Padded").unwrap();

        // Hand-write a record with only the first field, as an older schema
        // would have: no framing, so this is just field "a"'s own payload.
        let mut buf = Vec::new();
        ByteWriter::new(&mut buf).write_varint32(1);

        let err = read_record(&schema, CompatibilityMode::Off, ordinal, &mut ByteReader::new(&buf));
        assert!(matches!(err, Err(CallError::BufferExhausted)));

        let mut reader = ByteReader::new(&buf);
        let value = read_record(&schema, CompatibilityMode::Backward, ordinal, &mut reader).unwrap();
        match value {
            Value::Record(_, fields) => {
                assert_eq!(fields[0], Value::Int(1));
                assert_eq!(fields[1], Value::Optional(None));
            }
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn forward_mode_cannot_skip_trailing_bytes_without_framing() {
        let schema = Schema::discover::<Padded>().unwrap();
        let ordinal = schema.ordinal_of("record::tests::Padded").unwrap();

        // A writer running a newer schema would have appended a field this
        // reader doesn't declare; with no length/count framing, those
        // trailing bytes are indistinguishable from whatever comes next in
        // the stream, so they are simply left unread.
        let mut buf = Vec::new();
        {
            let mut writer = ByteWriter::new(&mut buf);
            writer.write_varint32(1);
            writer.write_varint64(0);
            writer.write_string("from the future");
        }

        let mut reader = ByteReader::new(&buf);
        let value = read_record(&schema, CompatibilityMode::Forward, ordinal, &mut reader).unwrap();
        match value {
            Value::Record(_, fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0], Value::Int(1));
                assert_eq!(fields[1], Value::Optional(None));
            }
            _ => panic!("expected record"),
        }
        assert!(!reader.is_at_end());
    }
}

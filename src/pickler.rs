//! The façade (§4.8): wires schema discovery, AST analysis, and chain
//! construction together once, then hands back a value that does none of
//! that work again.

use std::marker::PhantomData;

use crate::ast::{self, Schematic};
use crate::chain::{self, FieldChain};
use crate::descriptor::{Describable, UserTypeKind};
use crate::error::{CallError, ConstructionError};
use crate::record::CompatibilityMode;
use crate::schema::Schema;
use crate::varint::{ByteReader, ByteWriter};

/// A pickler built for one root `Describable` type `T`. Construction runs
/// schema discovery, AST analysis, and chain building exactly once; every
/// `serialize`/`deserialize`/`size_of` call after that only walks the
/// already-built chains.
///
/// `root_chain` is built the same way a `RECORD`/`INTERFACE`/`ENUM` field's
/// chain is, and for records and interfaces that already writes and reads
/// its own `ordinal+1` (§4.5). An `ENUM` field never does — its type
/// identity normally comes from the surrounding record field's static
/// position — but a bare enum *root* has no such surrounding position, and
/// §4.8 still requires one, so `Pickler` supplies it itself exactly when
/// `T`'s own kind is `Enum`.
pub struct Pickler<T> {
    schema: Schema,
    root_chain: FieldChain,
    root_ordinal: u32,
    root_is_bare_enum: bool,
    mode: CompatibilityMode,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Describable> Pickler<T> {
    /// Builds a pickler for `T` with [`CompatibilityMode::Off`]. Equivalent
    /// to `Pickler::builder().build()`.
    pub fn for_type() -> Result<Self, ConstructionError> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> PicklerBuilder<T> {
        PicklerBuilder::new()
    }

    /// Appends `value`'s wire representation to `buf`, returning the number
    /// of bytes written.
    pub fn serialize(&self, buf: &mut Vec<u8>, value: &T) -> Result<usize, CallError> {
        let start = buf.len();
        let mut writer = ByteWriter::new(buf);
        let repr = value.to_value();
        if self.root_is_bare_enum {
            writer.write_varint64(i64::from(self.root_ordinal) + 1);
        }
        (self.root_chain.write)(&self.schema, &repr, &mut writer)?;
        Ok(writer.position() - start)
    }

    /// Decodes one `T` from `reader`, advancing it past the value's bytes.
    pub fn deserialize(&self, reader: &mut ByteReader<'_>) -> Result<T, CallError> {
        if self.root_is_bare_enum {
            let wire_ordinal = reader.read_varint64()?;
            if wire_ordinal != i64::from(self.root_ordinal) + 1 {
                return Err(CallError::SchemaMismatch(
                    "root ordinal on the wire does not match this pickler's enum type",
                ));
            }
        }
        let repr = (self.root_chain.read)(&self.schema, self.mode, reader)?;
        T::from_value(repr)
    }

    /// The exact number of bytes [`Self::serialize`] would produce for
    /// `value`, computed without encoding it.
    #[must_use]
    pub fn size_of(&self, value: &T) -> usize {
        let base = (self.root_chain.size)(&self.schema, &value.to_value());
        if self.root_is_bare_enum {
            crate::varint::varint64_size(i64::from(self.root_ordinal) + 1) + base
        } else {
            base
        }
    }

    /// Writes a length-prefixed, homogeneous sequence of root values.
    pub fn serialize_seq(&self, buf: &mut Vec<u8>, values: &[T]) -> Result<usize, CallError> {
        let start = buf.len();
        ByteWriter::new(buf).write_uvarint64(values.len() as u64);
        for value in values {
            self.serialize(buf, value)?;
        }
        Ok(buf.len() - start)
    }

    /// Reads back a sequence written by [`Self::serialize_seq`].
    pub fn deserialize_seq(&self, reader: &mut ByteReader<'_>) -> Result<Vec<T>, CallError> {
        let len = reader.read_uvarint64()? as usize;
        let mut values = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            values.push(self.deserialize(reader)?);
        }
        Ok(values)
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Builds a [`Pickler`], configuring its compatibility mode before the
/// one-time construction work runs.
pub struct PicklerBuilder<T> {
    mode: CompatibilityMode,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Describable> Default for PicklerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Describable> PicklerBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: CompatibilityMode::Off,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn compatibility_mode(mut self, mode: CompatibilityMode) -> Self {
        self.mode = mode;
        self
    }

    /// Runs schema discovery over the transitive closure of types reachable
    /// from `T`, analyses every field's `Ast`, and builds every chain.
    pub fn build(self) -> Result<Pickler<T>, ConstructionError> {
        let schema = Schema::discover::<T>()?;
        let type_desc = T::type_desc();
        let root_ast = ast::analyse(&type_desc)?;
        let root_chain = chain::build(&root_ast, &schema.ordinal_by_name)?;
        let root_descriptor = T::descriptor();
        let root_ordinal = schema
            .ordinal_of(root_descriptor.name)
            .ok_or(ConstructionError::InvalidSchema("root type is missing from its own discovered schema"))?;
        let root_is_bare_enum = matches!(root_descriptor.kind, UserTypeKind::Enum(_));
        Ok(Pickler {
            schema,
            root_chain,
            root_ordinal,
            root_is_bare_enum,
            mode: self.mode,
            _marker: PhantomData,
        })
    }
}

//! The structural tag registry (§4.2): a closed enumeration of container
//! operators, built-in leaves, user leaves, and the `MAP_SEPARATOR`
//! pseudo-marker, each with a stable wire marker.

use num_enum::TryFromPrimitive;

/// The structural tag of one `Ast` node.
///
/// Container and built-in-leaf variants carry a stable negative wire marker
/// (`-1..-N`, assigned by declaration order below — new tags must be
/// appended, never inserted, to keep existing markers stable). User leaves
/// (`Record`/`Enum`/`Interface`) do not carry their own marker: their
/// instances are prefixed by a positive ordinal from the schema instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum BuiltinTag {
    Optional = 1,
    List = 2,
    Array = 3,
    Map = 4,
    Boolean = 5,
    Byte = 6,
    Short = 7,
    Character = 8,
    Integer = 9,
    Long = 10,
    Float = 11,
    Double = 12,
    String = 13,
    Uuid = 14,
    /// Inside an `Array` of `i32`s written with the sampled-packed encoding.
    IntArrayPacked = 15,
    /// Inside an `Array` of `i32`s written with the fixed-width encoding.
    IntArrayPlain = 16,
    /// Inside an `Array` of `i64`s written with the sampled-packed encoding.
    LongArrayPacked = 17,
    /// Inside an `Array` of `i64`s written with the fixed-width encoding.
    LongArrayPlain = 18,
}

impl BuiltinTag {
    /// The negative wire marker for this tag: the negation of its registry
    /// ordinal. Stable forever once assigned.
    #[must_use]
    pub fn marker(self) -> i64 {
        -(self as i64)
    }

    #[must_use]
    pub fn from_marker(marker: i64) -> Option<Self> {
        if marker >= 0 {
            return None;
        }
        u8::try_from(-marker).ok().and_then(|n| Self::try_from(n).ok())
    }

    /// Fixed per-instance wire size, where the tag has one independent of
    /// the value (`None` for varint-sized or variable-length leaves).
    #[must_use]
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Boolean | Self::Byte => Some(1),
            Self::Short => Some(2),
            Self::Float => Some(4),
            Self::Double => Some(8),
            Self::Uuid => Some(16),
            _ => None,
        }
    }
}

/// The full structural tag space an `Ast` node can carry, including the two
/// kinds the registry does not assign a marker to: user leaves (identified
/// by the schema's ordinal instead) and the `MAP_SEPARATOR` pseudo-marker,
/// which never appears on the wire — it only sequences a `Map`'s key and
/// value sub-trees inside the flat `Ast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Builtin(BuiltinTag),
    Record,
    Enum,
    Interface,
    MapSeparator,
}

impl Tag {
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Tag::Builtin(BuiltinTag::Optional)
                | Tag::Builtin(BuiltinTag::List)
                | Tag::Builtin(BuiltinTag::Array)
                | Tag::Builtin(BuiltinTag::Map)
        )
    }

    #[must_use]
    pub fn is_leaf(self) -> bool {
        !self.is_container() && !matches!(self, Tag::MapSeparator)
    }
}

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Identifies a type on the wire. Negative when it tags a definition.
pub type TypeId = i32;

pub const BOOL_ID: TypeId = 1;
pub const INT_ID: TypeId = 2;
pub const UINT_ID: TypeId = 3;
pub const FLOAT_ID: TypeId = 4;
pub const BYTES_ID: TypeId = 5;
pub const STRING_ID: TypeId = 6;
pub const COMPLEX_ID: TypeId = 7;
pub const INTERFACE_ID: TypeId = 8;
// 9..=15 are reserved and never resolve.

/// User defined types can't actually go below this.
pub const SMALLEST_USER_TYPE_ID: TypeId = 64;

/// Names kept at the top of every type table, in id order.
const BUILTIN_NAMES: [&str; 8] = [
    "bool",
    "int64",
    "uint64",
    "float64",
    "[]byte",
    "string",
    "complex128",
    "interface{}",
];

pub fn is_builtin(id: TypeId) -> bool {
    (BOOL_ID..=INTERFACE_ID).contains(&id)
}

pub fn builtin_name(id: TypeId) -> Option<&'static str> {
    if is_builtin(id) {
        Some(BUILTIN_NAMES[(id - 1) as usize])
    } else {
        None
    }
}

pub fn builtin_id(name: &str) -> Option<TypeId> {
    BUILTIN_NAMES
        .iter()
        .position(|n| *n == name)
        .map(|i| i as TypeId + 1)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonType {
    pub name: String,
    pub id: TypeId,
}

impl CommonType {
    pub fn new(name: impl Into<String>, id: TypeId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapType {
    pub common: CommonType,
    pub key: TypeId,
    pub elem: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub common: CommonType,
    pub fields: Vec<FieldType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    pub name: String,
    pub id: TypeId,
}

impl FieldType {
    pub fn new(name: impl Into<String>, id: TypeId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceType {
    pub common: CommonType,
    pub elem: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub common: CommonType,
    pub elem: TypeId,
    pub len: usize,
}

/// Which self-encoding interface produced an opaque type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    GobEncoder,
    BinaryMarshaler,
    TextMarshaler,
}

impl OpaqueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpaqueKind::GobEncoder => "GobEncoder",
            OpaqueKind::BinaryMarshaler => "BinaryMarshaler",
            OpaqueKind::TextMarshaler => "TextMarshaler",
        }
    }
}

/// A decoded type definition. Exactly one shape, always with its name and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireType {
    Array(ArrayType),
    Slice(SliceType),
    Struct(StructType),
    Map(MapType),
    Opaque(OpaqueKind, CommonType),
}

impl WireType {
    pub fn common(&self) -> &CommonType {
        match self {
            WireType::Array(t) => &t.common,
            WireType::Slice(t) => &t.common,
            WireType::Struct(t) => &t.common,
            WireType::Map(t) => &t.common,
            WireType::Opaque(_, t) => t,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonType {
        match self {
            WireType::Array(t) => &mut t.common,
            WireType::Slice(t) => &mut t.common,
            WireType::Struct(t) => &mut t.common,
            WireType::Map(t) => &mut t.common,
            WireType::Opaque(_, t) => t,
        }
    }

    pub fn name(&self) -> &str {
        self.common().name.trim()
    }

    pub fn id(&self) -> TypeId {
        self.common().id
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, WireType::Struct(_))
    }
}

impl AsRef<WireType> for WireType {
    fn as_ref(&self) -> &WireType {
        self
    }
}

// Unnamed composites are spelled out structurally; this bounds how far.
const NAME_DEPTH: usize = 8;

/// Display name of `id` in `types`: the builtin name, the definition's own
/// name, or for unnamed slices, arrays and maps a spelled-out type.
/// `None` when the id is neither builtin nor defined.
pub fn type_name<W: AsRef<WireType>>(types: &BTreeMap<TypeId, W>, id: TypeId) -> Option<Cow<'_, str>> {
    describe(types, id, 0)
}

fn describe<W: AsRef<WireType>>(
    types: &BTreeMap<TypeId, W>,
    id: TypeId,
    depth: usize,
) -> Option<Cow<'_, str>> {
    if let Some(name) = builtin_name(id) {
        return Some(Cow::Borrowed(name));
    }
    let wire = types.get(&id)?.as_ref();
    if !wire.name().is_empty() {
        return Some(Cow::Borrowed(wire.name()));
    }
    if depth >= NAME_DEPTH {
        return Some(Cow::Borrowed("..."));
    }
    let inner = |elem| {
        describe(types, elem, depth + 1).unwrap_or(Cow::Borrowed("?"))
    };
    let name = match wire {
        WireType::Slice(s) => format!("[]{}", inner(s.elem)),
        WireType::Array(a) => format!("[{}]{}", a.len, inner(a.elem)),
        WireType::Map(m) => format!("map[{}]{}", inner(m.key), inner(m.elem)),
        WireType::Struct(_) => "struct{...}".to_string(),
        WireType::Opaque(kind, _) => kind.as_str().to_string(),
    };
    Some(Cow::Owned(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins() {
        assert!(is_builtin(BOOL_ID));
        assert!(is_builtin(INTERFACE_ID));
        assert!(!is_builtin(0));
        assert!(!is_builtin(9));
        assert!(!is_builtin(SMALLEST_USER_TYPE_ID));
        assert_eq!(builtin_name(INT_ID), Some("int64"));
        assert_eq!(builtin_name(15), None);
        assert_eq!(builtin_id("complex128"), Some(COMPLEX_ID));
        assert_eq!(builtin_id("Foo"), None);
    }

    #[test]
    fn unnamed_types_are_spelled_out() {
        let mut types = BTreeMap::new();
        types.insert(
            65,
            WireType::Slice(SliceType {
                common: CommonType::new("", 65),
                elem: STRING_ID,
            }),
        );
        types.insert(
            66,
            WireType::Map(MapType {
                common: CommonType::new("", 66),
                key: STRING_ID,
                elem: 65,
            }),
        );
        types.insert(
            67,
            WireType::Array(ArrayType {
                common: CommonType::new("Pair", 67),
                elem: INT_ID,
                len: 2,
            }),
        );
        assert_eq!(type_name(&types, 66).unwrap(), "map[string][]string");
        assert_eq!(type_name(&types, 67).unwrap(), "Pair");
        assert_eq!(type_name(&types, 99), None);
    }

    #[test]
    fn self_referencing_names_terminate() {
        let mut types = BTreeMap::new();
        types.insert(
            65,
            WireType::Slice(SliceType {
                common: CommonType::new("", 65),
                elem: 65,
            }),
        );
        let name = type_name(&types, 65).unwrap();
        assert!(name.starts_with("[][]"));
        assert!(name.ends_with("..."));
    }
}

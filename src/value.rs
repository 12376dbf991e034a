use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

/// A decoded value, self-contained: composite values carry the names of
/// their element types rather than ids, since ids only mean something
/// inside the gob they came from.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    Bytes(Vec<u8>),
    String(String),
    Interface {
        name: String,
        value: Box<Value>,
    },
    /// Only the fields present on the wire, in wire order.
    Struct {
        name: String,
        fields: Vec<(String, Value)>,
    },
    Slice {
        elem: String,
        values: Vec<Value>,
    },
    Array {
        elem: String,
        len: usize,
        values: Vec<Value>,
    },
    /// Entries in wire order; duplicates are kept.
    Map {
        key: String,
        elem: String,
        entries: Vec<(Value, Value)>,
    },
    /// Bytes a type encoded for itself.
    Opaque {
        name: String,
        raw: Vec<u8>,
    },
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl Value {
    /// Looks a struct field up by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct { fields, .. } => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// The value behind any number of interface wrappers.
    pub fn unwrap_interface(&self) -> &Value {
        match self {
            Value::Interface { value, .. } => value.unwrap_interface(),
            v => v,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Uint(a), Uint(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Complex(ar, ai), Complex(br, bi)) => {
                ar.to_bits() == br.to_bits() && ai.to_bits() == bi.to_bits()
            }
            (Bytes(a), Bytes(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Interface { name: n1, value: v1 }, Interface { name: n2, value: v2 }) => {
                n1 == n2 && v1 == v2
            }
            (Struct { name: n1, fields: f1 }, Struct { name: n2, fields: f2 }) => {
                n1 == n2 && f1 == f2
            }
            (Slice { elem: e1, values: v1 }, Slice { elem: e2, values: v2 }) => {
                e1 == e2 && v1 == v2
            }
            (
                Array { elem: e1, len: l1, values: v1 },
                Array { elem: e2, len: l2, values: v2 },
            ) => e1 == e2 && l1 == l2 && v1 == v2,
            (
                Map { key: k1, elem: e1, entries: a },
                Map { key: k2, elem: e2, entries: b },
            ) => k1 == k2 && e1 == e2 && same_entries(a, b),
            (Opaque { name: n1, raw: r1 }, Opaque { name: n2, raw: r2 }) => n1 == n2 && r1 == r2,
            _ => false,
        }
    }
}

// Maps compare as unordered collections of entries.
fn same_entries(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|entry| {
        let hit = b
            .iter()
            .enumerate()
            .position(|(i, other)| !used[i] && other == entry);
        match hit {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// JSON-ish shape used by the JSON rendering style.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Uint(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serialize_float(*f, serializer),
            Value::Complex(re, im) => {
                let mut s = serializer.serialize_struct("complex", 2)?;
                s.serialize_field("real", &JsonFloat(*re))?;
                s.serialize_field("imag", &JsonFloat(*im))?;
                s.end()
            }
            Value::Bytes(b) => serialize_byte_list(b, serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Interface { value, .. } => value.serialize(serializer),
            Value::Struct { fields, .. } => {
                let mut m = serializer.serialize_map(Some(fields.len()))?;
                for (name, v) in fields {
                    m.serialize_entry(name, v)?;
                }
                m.end()
            }
            Value::Slice { values, .. } | Value::Array { values, .. } => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for v in values {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Map { entries, .. } => {
                let string_keys = entries
                    .iter()
                    .all(|(k, _)| matches!(k.unwrap_interface(), Value::String(_)));
                if string_keys {
                    let mut m = serializer.serialize_map(Some(entries.len()))?;
                    for (k, v) in entries {
                        m.serialize_entry(k, v)?;
                    }
                    m.end()
                } else {
                    let mut seq = serializer.serialize_seq(Some(entries.len()))?;
                    for (k, v) in entries {
                        seq.serialize_element(&(k, v))?;
                    }
                    seq.end()
                }
            }
            Value::Opaque { name, raw } => {
                let mut s = serializer.serialize_struct("opaque", 2)?;
                s.serialize_field("type", name)?;
                s.serialize_field("raw", &ByteList(raw))?;
                s.end()
            }
        }
    }
}

struct JsonFloat(f64);

impl Serialize for JsonFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_float(self.0, serializer)
    }
}

// JSON has no NaN or infinities; those go out as strings.
fn serialize_float<S: Serializer>(f: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if f.is_finite() {
        serializer.serialize_f64(f)
    } else {
        serializer.collect_str(&f)
    }
}

struct ByteList<'a>(&'a [u8]);

impl Serialize for ByteList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_byte_list(self.0, serializer)
    }
}

// serde_bytes keeps binary formats compact; JSON gets a list of numbers
// either way.
fn serialize_byte_list<S: Serializer>(b: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.collect_seq(b)
    } else {
        serde_bytes::Bytes::new(b).serialize(serializer)
    }
}

//! Human readable output for decoded gobs: Go-like syntax on one line, the
//! same behind `//`, or JSON.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use crate::types::{self, TypeId, WireType};
use crate::value::Value;

/// How values are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    /// `Foo{X: 1, Y: "a"}`
    SingleLine,
    /// `//Foo{X: 1, Y: "a"}`
    #[default]
    CommentedSingleLine,
    Json,
}

/// Go-like literal syntax, on a single line.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Complex(re, im) => write!(f, "({re}{im:+}i)"),
            Value::Bytes(b) => {
                f.write_str("[]byte{")?;
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{byte:#04x}")?;
                }
                f.write_char('}')
            }
            Value::String(s) => write!(f, "{s:?}"),
            Value::Interface { value, .. } => fmt::Display::fmt(value, f),
            Value::Struct { name, fields } => {
                write!(f, "{name}{{")?;
                for (i, (field, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}: {v}")?;
                }
                f.write_char('}')
            }
            Value::Slice { elem, values } => {
                write!(f, "[]{elem}{{")?;
                write_list(f, values)?;
                f.write_char('}')
            }
            Value::Array { elem, len, values } => {
                write!(f, "[{len}]{elem}{{")?;
                write_list(f, values)?;
                f.write_char('}')
            }
            Value::Map { key, elem, entries } => {
                write!(f, "map[{key}]{elem}{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_char('}')
            }
            Value::Opaque { name, raw } => write!(f, "{name}(0x{})", hex::encode(raw)),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}

pub fn render_value(value: &Value, style: Style) -> String {
    match style {
        Style::SingleLine => value.to_string(),
        Style::CommentedSingleLine => format!("//{value}"),
        Style::Json => serde_json::to_string(value).unwrap_or_else(|e| {
            log::warn!("value has no JSON form: {e}");
            "null".to_string()
        }),
    }
}

/// A single definition, e.g. `type Foo []string`. Unnamed ones are written
/// as a comment holding just their shape.
pub fn render_type<W: AsRef<WireType>>(types: &BTreeMap<TypeId, W>, id: TypeId) -> Option<String> {
    let wire = types.get(&id)?.as_ref();
    let name_of = |elem| types::type_name(types, elem).unwrap_or(std::borrow::Cow::Borrowed("?"));

    let shape = match wire {
        WireType::Array(a) => format!("[{}]{}", a.len, name_of(a.elem)),
        WireType::Slice(s) => format!("[]{}", name_of(s.elem)),
        WireType::Map(m) => format!("map[{}]{}", name_of(m.key), name_of(m.elem)),
        WireType::Struct(st) => {
            let mut out = String::from("struct {\n");
            for field in &st.fields {
                let _ = writeln!(out, "\t{} {}", field.name, name_of(field.id));
            }
            out.push('}');
            out
        }
        WireType::Opaque(kind, _) => return Some(format!("type {} // {}", wire.name(), kind.as_str())),
    };
    if wire.name().is_empty() {
        Some(format!("// {shape}"))
    } else {
        Some(format!("type {} {shape}", wire.name()))
    }
}

/// Every definition in ascending id order, separated by blank lines.
pub fn render_types<W: AsRef<WireType>>(types: &BTreeMap<TypeId, W>) -> String {
    let mut out = String::new();
    for (&id, wire) in types {
        let Some(rendered) = render_type(types, id) else {
            continue;
        };
        if is_anonymous(wire.as_ref()) {
            out.push_str("// Anonymous struct\n");
        }
        out.push_str(&rendered);
        out.push_str("\n\n");
    }
    out
}

// Anonymous structs only ever carry the name the decoder made up for them.
fn is_anonymous(wire: &WireType) -> bool {
    let plain = format!("Anon{}", wire.id());
    wire.is_struct()
        && wire
            .name()
            .strip_prefix(plain.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
}

/// Offset, hex and ASCII columns, 16 bytes a row.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:04x}: ", i * 16);
        for b in chunk {
            let _ = write!(out, "{b:02x} ");
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push_str(" | ");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::display::{self, Style};
use crate::types::{TypeId, WireType};
use crate::value::Value;

/// One decoded message: the types it defined and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Gob {
    pub types: BTreeMap<TypeId, WireType>,
    pub value: Value,
}

impl Gob {
    pub fn write_types<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "// Types:")?;
        w.write_all(display::render_types(&self.types).as_bytes())
    }

    pub fn write_value<W: Write + ?Sized>(&self, w: &mut W, style: Style) -> io::Result<()> {
        writeln!(w, "// Values:")?;
        match style {
            Style::Json => {
                serde_json::to_writer(&mut *w, &self.value).map_err(io::Error::other)?;
                writeln!(w)
            }
            style => writeln!(w, "{}", display::render_value(&self.value, style)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommonType, SliceType, STRING_ID};

    fn gob() -> Gob {
        let mut types = BTreeMap::new();
        types.insert(
            65,
            WireType::Slice(SliceType {
                common: CommonType::new("Names", 65),
                elem: STRING_ID,
            }),
        );
        Gob {
            types,
            value: Value::Slice {
                elem: "string".into(),
                values: vec!["a".into(), "b".into()],
            },
        }
    }

    #[test]
    fn writes_types_then_values() {
        let g = gob();
        let mut out = Vec::new();
        g.write_types(&mut out).unwrap();
        g.write_value(&mut out, Style::CommentedSingleLine).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "// Types:\ntype Names []string\n\n// Values:\n//[]string{\"a\", \"b\"}\n"
        );
    }

    #[test]
    fn json_value() {
        let mut out = Vec::new();
        gob().write_value(&mut out, Style::Json).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "// Values:\n[\"a\",\"b\"]\n");
    }
}

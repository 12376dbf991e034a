use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::encode::Encoder;
use crate::error::EncodeError;
use crate::gob::Gob;
use crate::types::*;
use crate::value::Value;

type Result<T> = std::result::Result<T, EncodeError>;

/// Writes decoded messages back out in gob wire format.
pub struct GobWriter<W: Write> {
    encoder: Encoder<W>,
    split_frames: bool,
}

impl<W: Write> GobWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            encoder: Encoder::new(writer),
            split_frames: false,
        }
    }

    /// Give every type definition a frame of its own, the way Go's encoder
    /// does, instead of packing the whole message into one.
    pub fn split_frames(mut self, split: bool) -> Self {
        self.split_frames = split;
        self
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }

    pub fn into_inner(self) -> W {
        self.encoder.into_inner()
    }

    /// Writes `value` as a message of type `id`, preceded by every
    /// definition in `types`.
    pub fn write_message(
        &mut self,
        types: &BTreeMap<TypeId, WireType>,
        id: TypeId,
        value: &Value,
    ) -> Result<()> {
        let mut body = Encoder::new(Vec::new());
        for (&tid, wire) in types {
            let mut def = Encoder::new(Vec::new());
            def.write_int(-(tid as i64))?;
            write_wire_type(&mut def, wire)?;
            if self.split_frames {
                self.write_frame(&def.into_inner())?;
            } else {
                body.write_all(&def.into_inner())?;
            }
        }

        let values = ValueWriter { types };
        body.write_int(id as i64)?;
        values.write_singleton(&mut body, id, value)?;
        Ok(self.write_frame(&body.into_inner())?)
    }

    /// Like [`write_message`](Self::write_message), working out the type of
    /// the gob's value from its shape.
    pub fn write_gob(&mut self, gob: &Gob) -> Result<()> {
        let values = ValueWriter { types: &gob.types };
        let id = values
            .locate(&gob.value)
            .ok_or_else(|| EncodeError::UnknownInterfaceType(value_type_name(&gob.value)))?;
        self.write_message(&gob.types, id, &gob.value)
    }

    fn write_frame(&mut self, body: &[u8]) -> io::Result<()> {
        self.encoder.write_uint(body.len() as u64)?;
        self.encoder.write_all(body)
    }
}

// Running field number of a struct being written.
struct Fields {
    last: i64,
}

impl Fields {
    fn new() -> Self {
        Self { last: -1 }
    }

    fn next<E: Write>(&mut self, enc: &mut Encoder<E>, num: i64) -> io::Result<()> {
        enc.write_uint((num - self.last) as u64)?;
        self.last = num;
        Ok(())
    }
}

// Zero-valued fields are left out, as Go does.
fn write_wire_type<E: Write>(enc: &mut Encoder<E>, wire: &WireType) -> io::Result<()> {
    let selector = match wire {
        WireType::Array(_) => 1,
        WireType::Slice(_) => 2,
        WireType::Struct(_) => 3,
        WireType::Map(_) => 4,
        WireType::Opaque(OpaqueKind::GobEncoder, _) => 5,
        WireType::Opaque(OpaqueKind::BinaryMarshaler, _) => 6,
        WireType::Opaque(OpaqueKind::TextMarshaler, _) => 7,
    };
    enc.write_uint(selector)?;

    let mut f = Fields::new();
    f.next(enc, 0)?;
    write_common(enc, wire.common())?;
    match wire {
        WireType::Array(a) => {
            f.next(enc, 1)?;
            enc.write_int(a.elem as i64)?;
            if a.len > 0 {
                f.next(enc, 2)?;
                enc.write_int(a.len as i64)?;
            }
        }
        WireType::Slice(s) => {
            f.next(enc, 1)?;
            enc.write_int(s.elem as i64)?;
        }
        WireType::Map(m) => {
            f.next(enc, 1)?;
            enc.write_int(m.key as i64)?;
            f.next(enc, 2)?;
            enc.write_int(m.elem as i64)?;
        }
        WireType::Struct(st) => {
            if !st.fields.is_empty() {
                f.next(enc, 1)?;
                enc.write_uint(st.fields.len() as u64)?;
                for field in &st.fields {
                    let mut ff = Fields::new();
                    if !field.name.is_empty() {
                        ff.next(enc, 0)?;
                        enc.write_string(&field.name)?;
                    }
                    ff.next(enc, 1)?;
                    enc.write_int(field.id as i64)?;
                    enc.write_uint(0)?;
                }
            }
        }
        WireType::Opaque(..) => {}
    }
    // closes the inner struct, then wireType itself
    enc.write_uint(0)?;
    enc.write_uint(0)
}

fn write_common<E: Write>(enc: &mut Encoder<E>, common: &CommonType) -> io::Result<()> {
    let mut f = Fields::new();
    if !common.name.is_empty() {
        f.next(enc, 0)?;
        enc.write_string(&common.name)?;
    }
    if common.id != 0 {
        f.next(enc, 1)?;
        enc.write_int(common.id as i64)?;
    }
    enc.write_uint(0)
}

fn builtin_kind(value: &Value) -> Option<TypeId> {
    Some(match value {
        Value::Bool(_) => BOOL_ID,
        Value::Int(_) => INT_ID,
        Value::Uint(_) => UINT_ID,
        Value::Float(_) => FLOAT_ID,
        Value::Bytes(_) => BYTES_ID,
        Value::String(_) => STRING_ID,
        Value::Complex(..) => COMPLEX_ID,
        _ => return None,
    })
}

fn value_type_name(value: &Value) -> String {
    match value {
        Value::Struct { name, .. } | Value::Opaque { name, .. } => name.clone(),
        Value::Interface { name, .. } => name.clone(),
        Value::Slice { elem, .. } => format!("[]{elem}"),
        Value::Array { elem, len, .. } => format!("[{len}]{elem}"),
        Value::Map { key, elem, .. } => format!("map[{key}]{elem}"),
        Value::Nil => "nil".to_string(),
        other => builtin_kind(other)
            .and_then(builtin_name)
            .unwrap_or_default()
            .to_string(),
    }
}

struct ValueWriter<'a> {
    types: &'a BTreeMap<TypeId, WireType>,
}

impl ValueWriter<'_> {
    fn name_of(&self, id: TypeId) -> String {
        type_name(self.types, id).unwrap_or_default().into_owned()
    }

    /// The type a value belongs to, judged by name first and then by shape.
    fn locate(&self, value: &Value) -> Option<TypeId> {
        if let Some(id) = builtin_kind(value) {
            return Some(id);
        }
        if matches!(value, Value::Interface { .. } | Value::Nil) {
            return Some(INTERFACE_ID);
        }
        let wanted = value_type_name(value);
        if let Some((&id, _)) = self
            .types
            .iter()
            .find(|&(&id, _)| type_name(self.types, id).is_some_and(|n| n == wanted))
        {
            return Some(id);
        }
        self.types
            .iter()
            .find(|&(_, wire)| match (wire, value) {
                (WireType::Slice(s), Value::Slice { elem, .. }) => self.name_of(s.elem) == *elem,
                (WireType::Array(a), Value::Array { elem, len, .. }) => {
                    a.len == *len && self.name_of(a.elem) == *elem
                }
                (WireType::Map(m), Value::Map { key, elem, .. }) => {
                    self.name_of(m.key) == *key && self.name_of(m.elem) == *elem
                }
                _ => false,
            })
            .map(|(&id, _)| id)
    }

    fn write_singleton<E: Write>(&self, enc: &mut Encoder<E>, id: TypeId, value: &Value) -> Result<()> {
        let is_struct = self.types.get(&id).is_some_and(WireType::is_struct);
        if !is_struct {
            enc.write_uint(0)?;
        }
        self.write_value(enc, id, value)
    }

    fn write_value<E: Write>(&self, enc: &mut Encoder<E>, id: TypeId, value: &Value) -> Result<()> {
        match (id, value) {
            (BOOL_ID, Value::Bool(b)) => enc.write_bool(*b)?,
            (INT_ID, Value::Int(i)) => enc.write_int(*i)?,
            (UINT_ID, Value::Uint(u)) => enc.write_uint(*u)?,
            (FLOAT_ID, Value::Float(x)) => enc.write_float(*x)?,
            (BYTES_ID, Value::Bytes(b)) => enc.write_bytes(b)?,
            (STRING_ID, Value::String(s)) => enc.write_string(s)?,
            (COMPLEX_ID, Value::Complex(re, im)) => enc.write_complex(*re, *im)?,
            (INTERFACE_ID, v) => self.write_interface(enc, v)?,
            (id, v) if is_builtin(id) => {
                log::debug!("cannot write {} as {id}", value_type_name(v));
                return Err(EncodeError::Mismatch {
                    id,
                    expected: builtin_name(id).unwrap_or("builtin"),
                });
            }
            (id, v) => {
                let wire = self.types.get(&id).ok_or(EncodeError::UnknownType(id))?;
                self.write_composite(enc, wire, v)?;
            }
        }
        Ok(())
    }

    fn write_composite<E: Write>(&self, enc: &mut Encoder<E>, wire: &WireType, value: &Value) -> Result<()> {
        match (wire, value) {
            (WireType::Struct(st), Value::Struct { fields, .. }) => self.write_struct(enc, st, fields)?,
            (WireType::Slice(s), Value::Slice { values, .. }) => {
                enc.write_uint(values.len() as u64)?;
                for v in values {
                    self.write_value(enc, s.elem, v)?;
                }
            }
            (WireType::Array(a), Value::Array { values, .. }) => {
                enc.write_uint(values.len() as u64)?;
                for v in values {
                    self.write_value(enc, a.elem, v)?;
                }
            }
            (WireType::Map(m), Value::Map { entries, .. }) => {
                enc.write_uint(entries.len() as u64)?;
                for (k, v) in entries {
                    self.write_value(enc, m.key, k)?;
                    self.write_value(enc, m.elem, v)?;
                }
            }
            (WireType::Opaque(..), Value::Opaque { raw, .. }) => enc.write_bytes(raw)?,
            (wire, _) => {
                let expected = match wire {
                    WireType::Array(_) => "array",
                    WireType::Slice(_) => "slice",
                    WireType::Struct(_) => "struct",
                    WireType::Map(_) => "map",
                    WireType::Opaque(kind, _) => kind.as_str(),
                };
                return Err(EncodeError::Mismatch {
                    id: wire.id(),
                    expected,
                });
            }
        }
        Ok(())
    }

    fn write_struct<E: Write>(
        &self,
        enc: &mut Encoder<E>,
        st: &StructType,
        fields: &[(String, Value)],
    ) -> Result<()> {
        let mut present = Vec::with_capacity(fields.len());
        for (name, v) in fields {
            let index = st
                .fields
                .iter()
                .position(|f| f.name == *name)
                .ok_or_else(|| EncodeError::UnknownField {
                    type_name: st.common.name.clone(),
                    field: name.clone(),
                })?;
            present.push((index, v));
        }
        // wire order is field order; a field can only appear once
        present.sort_by_key(|&(index, _)| index);
        present.dedup_by_key(|&mut (index, _)| index);

        let mut f = Fields::new();
        for (index, v) in present {
            f.next(enc, index as i64)?;
            self.write_value(enc, st.fields[index].id, v)?;
        }
        enc.write_uint(0)?;
        Ok(())
    }

    fn write_interface<E: Write>(&self, enc: &mut Encoder<E>, value: &Value) -> Result<()> {
        let (name, inner) = match value {
            Value::Nil => return Ok(enc.write_uint(0)?),
            Value::Interface { name, value } => (name.clone(), &**value),
            other => (value_type_name(other), other),
        };
        if inner.is_nil() {
            return Ok(enc.write_uint(0)?);
        }
        let id = self
            .locate(inner)
            .or_else(|| {
                self.types
                    .iter()
                    .find(|(_, w)| w.name() == name)
                    .map(|(&id, _)| id)
            })
            .ok_or_else(|| EncodeError::UnknownInterfaceType(name.clone()))?;

        let mut payload = Encoder::new(Vec::new());
        self.write_singleton(&mut payload, id, inner)?;
        let payload = payload.into_inner();

        enc.write_string(&name)?;
        enc.write_int(id as i64)?;
        enc.write_uint(payload.len() as u64)?;
        enc.write_all(&payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // type P struct { X int }, id 65
    const STRUCT_P: [u8; 21] = [
        0xff, 0x81, 0x03, 0x01, 0x01, 0x01, b'P', 0x01, 0xff, 0x82, 0x00, 0x01, 0x01, 0x01, 0x01,
        b'X', 0x01, 0x04, 0x00, 0x00, 0x00,
    ];

    fn p_types() -> BTreeMap<TypeId, WireType> {
        let mut types = BTreeMap::new();
        types.insert(
            65,
            WireType::Struct(StructType {
                common: CommonType::new("P", 65),
                fields: vec![FieldType::new("X", INT_ID)],
            }),
        );
        types
    }

    fn p(x: i64) -> Value {
        Value::Struct {
            name: "P".into(),
            fields: vec![("X".into(), Value::Int(x))],
        }
    }

    #[test]
    fn one_frame_message() {
        let mut w = GobWriter::new(Vec::new());
        w.write_message(&p_types(), 65, &p(7)).unwrap();
        let mut expected = vec![26];
        expected.extend_from_slice(&STRUCT_P);
        expected.extend_from_slice(&[0xff, 0x82, 0x01, 0x0e, 0x00]);
        assert_eq!(w.into_inner(), expected);
    }

    #[test]
    fn split_frames_like_go() {
        let mut w = GobWriter::new(Vec::new()).split_frames(true);
        w.write_message(&p_types(), 65, &p(7)).unwrap();
        let mut expected = vec![21];
        expected.extend_from_slice(&STRUCT_P);
        expected.extend_from_slice(&[0x05, 0xff, 0x82, 0x01, 0x0e, 0x00]);
        assert_eq!(w.into_inner(), expected);
    }

    #[test]
    fn builtin_message() {
        let mut w = GobWriter::new(Vec::new());
        w.write_gob(&Gob {
            types: BTreeMap::new(),
            value: Value::Int(7),
        })
        .unwrap();
        assert_eq!(w.into_inner(), vec![0x03, 0x04, 0x00, 0x0e]);
    }

    #[test]
    fn interface_of_int() {
        let mut w = GobWriter::new(Vec::new());
        let v = Value::Interface {
            name: "int".into(),
            value: Box::new(Value::Int(7)),
        };
        w.write_message(&BTreeMap::new(), INTERFACE_ID, &v).unwrap();
        assert_eq!(
            w.into_inner(),
            vec![0x0a, 0x10, 0x00, 0x03, b'i', b'n', b't', 0x04, 0x02, 0x00, 0x0e]
        );
    }

    #[test]
    fn mismatches_are_reported() {
        let mut w = GobWriter::new(Vec::new());
        let err = w.write_message(&p_types(), STRING_ID, &Value::Int(1)).unwrap_err();
        assert!(matches!(err, EncodeError::Mismatch { id: STRING_ID, expected: "string" }));

        let bad = Value::Struct {
            name: "P".into(),
            fields: vec![("Y".into(), Value::Int(1))],
        };
        let err = w.write_message(&p_types(), 65, &bad).unwrap_err();
        assert!(matches!(err, EncodeError::UnknownField { .. }));

        let err = w.write_message(&p_types(), 70, &p(1)).unwrap_err();
        assert!(matches!(err, EncodeError::UnknownType(70)));
    }

    #[test]
    fn locates_types_by_name_and_shape() {
        let mut types = p_types();
        types.insert(
            66,
            WireType::Slice(SliceType {
                common: CommonType::new("Names", 66),
                elem: STRING_ID,
            }),
        );
        let values = ValueWriter { types: &types };
        assert_eq!(values.locate(&p(1)), Some(65));
        let names = Value::Slice {
            elem: "string".into(),
            values: vec![],
        };
        assert_eq!(values.locate(&names), Some(66));
        assert_eq!(values.locate(&Value::Uint(1)), Some(UINT_ID));
    }
}

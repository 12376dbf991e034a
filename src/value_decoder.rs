//! Values, decoded against the types registered so far.

use std::borrow::Cow;

use crate::error::{ErrorKind, Result};
use crate::session::Session;
use crate::types::*;
use crate::value::Value;
use crate::varint::{uint_to_complex, uint_to_float};

impl Session {
    /// A value sent on its own, at the top of a frame or inside an
    /// interface. Anything but a struct is wrapped as the single field of a
    /// struct, so a zero delta comes first.
    pub(crate) fn decode_singleton(&mut self, id: TypeId) -> Result<Value> {
        if !is_builtin(id) && !self.registry.contains(id) {
            return Err(self.error(ErrorKind::UnexpectedType(id)));
        }
        let is_struct = self.registry.lookup(id).is_some_and(WireType::is_struct);
        if !is_struct {
            self.expect_delta(0)?;
        }
        self.decode_value(id)
    }

    /// Decodes one value of type `id` from the current frame.
    pub fn decode_value(&mut self, id: TypeId) -> Result<Value> {
        self.enter()?;
        let value = self.decode_value_inner(id);
        self.leave();
        value
    }

    fn decode_value_inner(&mut self, id: TypeId) -> Result<Value> {
        let value = match id {
            BOOL_ID => Value::Bool(self.next_uint()? != 0),
            INT_ID => Value::Int(self.next_int()?),
            UINT_ID => Value::Uint(self.next_uint()?),
            FLOAT_ID => Value::Float(uint_to_float(self.next_uint()?)),
            BYTES_ID => Value::Bytes(self.read_bytes()?),
            STRING_ID => Value::String(self.read_string()?),
            COMPLEX_ID => {
                let re = self.next_uint()?;
                let im = self.next_uint()?;
                let (re, im) = uint_to_complex(re, im);
                Value::Complex(re, im)
            }
            INTERFACE_ID => self.decode_interface()?,
            _ => {
                let Some(wire) = self.registry.shared(id) else {
                    return Err(self.error(ErrorKind::UnexpectedType(id)));
                };
                let name = wire.name().to_string();
                match &*wire {
                    WireType::Struct(st) => self.decode_struct(name, st)?,
                    WireType::Slice(sl) => self.decode_slice(sl.elem)?,
                    WireType::Array(at) => self.decode_array(at)?,
                    WireType::Map(mt) => self.decode_map(mt.key, mt.elem)?,
                    WireType::Opaque(..) => Value::Opaque {
                        name,
                        raw: self.read_bytes()?,
                    },
                }
            }
        };
        Ok(value)
    }

    fn elem_name(&self, id: TypeId) -> Result<String> {
        self.registry
            .resolved_name(id)
            .map(Cow::into_owned)
            .map_err(|kind| self.error(kind))
    }

    fn decode_interface(&mut self) -> Result<Value> {
        let name_len = self.next_uint()?;
        if name_len == 0 {
            return Ok(Value::Nil);
        }
        let raw = self.take_bytes(name_len)?;
        let full = String::from_utf8_lossy(&raw);
        let name = full.rsplit('.').next().unwrap_or(&full).to_string();

        loop {
            let id = self.read_type_id()?;
            if id < 0 {
                let id = self.definition_id(id)?;
                self.decode_type(id)?;
                continue;
            }
            let payload_len = self.next_uint()?;
            log::trace!("interface {name}: {payload_len} byte payload of type {id}");
            let value = self.decode_singleton(id)?;
            return Ok(Value::Interface {
                name,
                value: Box::new(value),
            });
        }
    }

    fn decode_struct(&mut self, name: String, st: &StructType) -> Result<Value> {
        let mut fields = Vec::new();
        self.for_each_field(|s, num, _| {
            let Some(field) = usize::try_from(num).ok().and_then(|i| st.fields.get(i)) else {
                return Err(s.error(ErrorKind::BadFieldNum {
                    field: num,
                    count: st.fields.len(),
                }));
            };
            let value = s.decode_value(field.id)?;
            fields.push((field.name.clone(), value));
            Ok(())
        })?;
        Ok(Value::Struct { name, fields })
    }

    fn decode_slice(&mut self, elem: TypeId) -> Result<Value> {
        let elem_name = self.elem_name(elem)?;
        let count = self.next_uint()?;
        let mut values = Vec::with_capacity(self.capacity_hint(count));
        for _ in 0..count {
            values.push(self.decode_value(elem)?);
        }
        Ok(Value::Slice {
            elem: elem_name,
            values,
        })
    }

    fn decode_array(&mut self, at: &ArrayType) -> Result<Value> {
        let elem_name = self.elem_name(at.elem)?;
        let count = self.next_uint()?;
        if count != at.len as u64 {
            log::debug!("array of {} sent {count} elements", at.len);
        }
        let mut values = Vec::with_capacity(self.capacity_hint(at.len as u64));
        for _ in 0..count {
            values.push(self.decode_value(at.elem)?);
        }
        Ok(Value::Array {
            elem: elem_name,
            len: at.len,
            values,
        })
    }

    fn decode_map(&mut self, key: TypeId, elem: TypeId) -> Result<Value> {
        let key_name = self.elem_name(key)?;
        let elem_name = self.elem_name(elem)?;
        let count = self.next_uint()?;
        let mut entries = Vec::with_capacity(self.capacity_hint(count));
        for _ in 0..count {
            let k = self.decode_value(key)?;
            let v = self.decode_value(elem)?;
            entries.push((k, v));
        }
        Ok(Value::Map {
            key: key_name,
            elem: elem_name,
            entries,
        })
    }
}

//! Type definitions as they appear on the wire.
//!
//! A definition is a `wireType` struct with exactly one of its seven fields
//! set, each of those itself a struct beginning with a `CommonType`. All of
//! them go through the same delta field loop, so fields left out by the
//! producer because they are zero simply keep their defaults.

use crate::error::{Error, ErrorKind, Result};
use crate::session::Session;
use crate::types::{
    ArrayType, CommonType, FieldType, MapType, OpaqueKind, SMALLEST_USER_TYPE_ID, SliceType,
    StructType, TypeId, WireType,
};

impl Session {
    /// Decodes the definition of `id` from the current frame and registers
    /// it. The `-id` tag has already been read.
    pub fn decode_type(&mut self, id: TypeId) -> Result<()> {
        if id < SMALLEST_USER_TYPE_ID || self.registry.contains(id) {
            return Err(self.error(ErrorKind::DuplicateType(id)));
        }

        let mut wire = match self.next_uint()? {
            1 => WireType::Array(self.decode_array_type()?),
            2 => WireType::Slice(self.decode_slice_type()?),
            3 => WireType::Struct(self.decode_struct_type()?),
            4 => WireType::Map(self.decode_map_type()?),
            5 => WireType::Opaque(OpaqueKind::GobEncoder, self.decode_opaque_type()?),
            6 => WireType::Opaque(OpaqueKind::BinaryMarshaler, self.decode_opaque_type()?),
            7 => WireType::Opaque(OpaqueKind::TextMarshaler, self.decode_opaque_type()?),
            delta => return Err(self.error(ErrorKind::UnknownDelta(delta))),
        };
        // the inner struct ate its own terminator, this one closes wireType
        self.expect_delta(0)?;

        let common = wire.common_mut();
        if common.id != id {
            log::debug!("type {id} carries id {} in its definition", common.id);
            common.id = id;
        }
        if wire.is_struct() && wire.name().is_empty() {
            wire.common_mut().name = self.anonymous_name(id);
        }
        log::debug!("defined type {id} as {:?}", wire.name());

        self.registry.insert(id, wire).map_err(|kind| self.error(kind))
    }

    fn unknown_field(&self, delta: u64) -> Error {
        self.error(ErrorKind::GenericMismatch {
            expected: 0,
            found: delta,
        })
    }

    fn decode_common(&mut self) -> Result<CommonType> {
        let mut common = CommonType::default();
        self.for_each_field(|s, num, _| {
            match num {
                0 => common.name = s.read_string()?,
                1 => common.id = s.read_type_id()?,
                n => return Err(s.error(ErrorKind::CorruptCommonType(n))),
            }
            Ok(())
        })?;
        Ok(common)
    }

    fn decode_array_type(&mut self) -> Result<ArrayType> {
        let mut common = CommonType::default();
        let mut elem = 0;
        let mut len = 0i64;
        self.for_each_field(|s, num, delta| {
            match num {
                0 => common = s.decode_common()?,
                1 => elem = s.read_type_id()?,
                2 => len = s.next_int()?,
                _ => return Err(s.unknown_field(delta)),
            }
            Ok(())
        })?;
        let len = usize::try_from(len).unwrap_or_else(|_| {
            log::debug!("array type {:?} declares length {len}, using 0", common.name);
            0
        });
        Ok(ArrayType { common, elem, len })
    }

    fn decode_slice_type(&mut self) -> Result<SliceType> {
        let mut common = CommonType::default();
        let mut elem = 0;
        self.for_each_field(|s, num, delta| {
            match num {
                0 => common = s.decode_common()?,
                1 => elem = s.read_type_id()?,
                _ => return Err(s.unknown_field(delta)),
            }
            Ok(())
        })?;
        Ok(SliceType { common, elem })
    }

    fn decode_map_type(&mut self) -> Result<MapType> {
        let mut common = CommonType::default();
        let mut key = 0;
        let mut elem = 0;
        self.for_each_field(|s, num, delta| {
            match num {
                0 => common = s.decode_common()?,
                1 => key = s.read_type_id()?,
                2 => elem = s.read_type_id()?,
                _ => return Err(s.unknown_field(delta)),
            }
            Ok(())
        })?;
        Ok(MapType { common, key, elem })
    }

    fn decode_struct_type(&mut self) -> Result<StructType> {
        let mut common = CommonType::default();
        let mut fields = Vec::new();
        self.for_each_field(|s, num, delta| {
            match num {
                0 => common = s.decode_common()?,
                1 => {
                    let count = s.next_uint()?;
                    let mut list = Vec::with_capacity(s.capacity_hint(count));
                    for _ in 0..count {
                        list.push(s.decode_field()?);
                    }
                    fields = list;
                }
                _ => return Err(s.unknown_field(delta)),
            }
            Ok(())
        })?;
        Ok(StructType { common, fields })
    }

    fn decode_field(&mut self) -> Result<FieldType> {
        let mut field = FieldType::new("", 0);
        self.for_each_field(|s, num, delta| {
            match num {
                0 => field.name = s.read_string()?,
                1 => field.id = s.read_type_id()?,
                _ => return Err(s.unknown_field(delta)),
            }
            Ok(())
        })?;
        log::trace!("field {:?} of type {}", field.name, field.id);
        Ok(field)
    }

    fn decode_opaque_type(&mut self) -> Result<CommonType> {
        let mut common = CommonType::default();
        self.for_each_field(|s, num, delta| {
            match num {
                0 => common = s.decode_common()?,
                _ => return Err(s.unknown_field(delta)),
            }
            Ok(())
        })?;
        Ok(common)
    }
}

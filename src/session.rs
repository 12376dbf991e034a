use std::sync::PoisonError;

use crate::buffer::FrameCursor;
use crate::error::{Error, ErrorKind, Result};
use crate::gob::Gob;
use crate::registry::{SharedNamer, TypeRegistry};
use crate::types::TypeId;
use crate::value::Value;
use crate::varint::{self, uint_to_int};

/// State for decoding one gob: the frame being read, the types defined so
/// far and the position in the source.
///
/// Type definitions live only as long as the gob that introduced them;
/// [`finish`](Session::finish) hands them to the [`Gob`] and starts over.
pub struct Session {
    pub(crate) cursor: FrameCursor,
    pub(crate) registry: TypeRegistry,
    namer: SharedNamer,
    /// Source bytes before the current frame body.
    base: u64,
    max_depth: usize,
    depth: usize,
    /// Set once the current frame reached its value tag.
    in_value: bool,
}

impl Session {
    pub fn new(namer: SharedNamer, max_depth: usize) -> Self {
        Self {
            cursor: FrameCursor::with_capacity(4096),
            registry: TypeRegistry::new(),
            namer,
            base: 0,
            max_depth,
            depth: 0,
            in_value: false,
        }
    }

    /// Bytes consumed from the start of the source.
    pub fn processed(&self) -> u64 {
        self.base + self.cursor.position() as u64
    }

    pub(crate) fn error(&self, kind: ErrorKind) -> Error {
        Error::new(kind, self.processed(), self.cursor.raw_bytes())
    }

    pub fn in_value(&self) -> bool {
        self.in_value
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Accounts for bytes read outside a frame body (length prefixes).
    pub(crate) fn advance(&mut self, n: u64) {
        self.base += n;
    }

    /// Drops the current frame, read or not, keeping the offset right.
    pub(crate) fn discard_frame(&mut self) {
        self.base += self.cursor.raw_bytes().len() as u64;
        self.cursor.reset();
        self.in_value = false;
    }

    /// Starts on `body` as the next frame of the source.
    pub fn load_frame(&mut self, body: &[u8]) {
        self.discard_frame();
        self.cursor.extend_from_slice(body);
    }

    /// Forgets every type seen so far.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.depth = 0;
        self.in_value = false;
    }

    /// Packages the types and the decoded value, leaving an empty registry.
    pub fn finish(&mut self, value: Value) -> Gob {
        let gob = Gob {
            types: self.registry.take(),
            value,
        };
        self.clear();
        gob
    }

    /// Decodes the loaded frame: any number of type definitions, then at
    /// most one value. `None` means the frame only carried definitions and
    /// the value is still to come in a later frame.
    pub fn decode_frame(&mut self) -> Result<Option<Value>> {
        self.in_value = false;
        while !self.cursor.is_empty() {
            let id = self.read_type_id()?;
            if id >= 0 {
                self.in_value = true;
                let value = self.decode_singleton(id)?;
                if !self.cursor.is_empty() {
                    log::debug!("ignoring {} bytes after value of type {id}", self.cursor.len());
                }
                return Ok(Some(value));
            }
            let id = self.definition_id(id)?;
            self.decode_type(id)?;
        }
        Ok(None)
    }

    /// Turns a negative definition tag into the id being defined.
    pub(crate) fn definition_id(&self, tag: TypeId) -> Result<TypeId> {
        tag.checked_neg()
            .ok_or_else(|| self.error(ErrorKind::DuplicateType(tag)))
    }

    pub(crate) fn next_uint(&mut self) -> Result<u64> {
        match varint::read_uint(&mut self.cursor) {
            Ok((v, _)) => Ok(v),
            Err(e) => {
                let kind = match e.kind {
                    ErrorKind::Eof | ErrorKind::UnexpectedEof => ErrorKind::FrameExhausted,
                    kind => kind,
                };
                Err(self.error(kind))
            }
        }
    }

    pub(crate) fn next_int(&mut self) -> Result<i64> {
        Ok(uint_to_int(self.next_uint()?))
    }

    pub(crate) fn read_type_id(&mut self) -> Result<TypeId> {
        let v = self.next_int()?;
        TypeId::try_from(v).map_err(|_| {
            let clamped = v.clamp(TypeId::MIN as i64, TypeId::MAX as i64) as TypeId;
            self.error(ErrorKind::UnexpectedType(clamped))
        })
    }

    /// Consumes a delta that must have a fixed value.
    pub(crate) fn expect_delta(&mut self, expected: u64) -> Result<()> {
        let found = self.next_uint()?;
        if found != expected {
            return Err(self.error(ErrorKind::GenericMismatch { expected, found }));
        }
        Ok(())
    }

    /// A uint length followed by that many raw bytes.
    pub(crate) fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.next_uint()?;
        self.take_bytes(len)
    }

    pub(crate) fn take_bytes(&mut self, len: u64) -> Result<Vec<u8>> {
        let wanted = usize::try_from(len).unwrap_or(usize::MAX);
        match self.cursor.take_slice(wanted) {
            Ok(b) => Ok(b.to_vec()),
            Err(available) => Err(self.error(ErrorKind::BadString {
                wanted: len,
                available,
            })),
        }
    }

    pub(crate) fn read_string(&mut self) -> Result<String> {
        let b = self.read_bytes()?;
        Ok(match String::from_utf8(b) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    /// Walks the delta-encoded fields of one struct on the wire, handing
    /// each field number and its delta to `field`. Stops after the zero
    /// delta that ends the struct.
    pub(crate) fn for_each_field<F>(&mut self, mut field: F) -> Result<()>
    where
        F: FnMut(&mut Self, i64, u64) -> Result<()>,
    {
        let mut num: i64 = -1;
        loop {
            let delta = self.next_uint()?;
            if delta == 0 {
                return Ok(());
            }
            num = num.saturating_add(i64::try_from(delta).unwrap_or(i64::MAX));
            field(self, num, delta)?;
        }
    }

    /// Storage to reserve for `count` wire elements. Every element takes at
    /// least a byte, so the frame bounds what can really arrive.
    pub(crate) fn capacity_hint(&self, count: u64) -> usize {
        usize::try_from(count).unwrap_or(usize::MAX).min(self.cursor.len())
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(self.error(ErrorKind::NestingTooDeep(self.max_depth)));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn anonymous_name(&self, id: TypeId) -> String {
        self.namer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .name_for(id)
    }
}

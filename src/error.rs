use crate::types::TypeId;

/// What went wrong while decoding, without the positional context.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Clean end of the source at a frame boundary.
    #[error("end of input")]
    Eof,

    /// The source ended in the middle of a frame or a frame length.
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("found uint claiming to be longer than 8 bytes")]
    VarintTooBig,

    /// An assembled frame ran out of bytes before its content was complete.
    #[error("frame ended before its content was complete")]
    FrameExhausted,

    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: u64, limit: u64 },

    #[error("duplicate type found (id {0})")]
    DuplicateType(TypeId),

    #[error("found unexpected delta value {0} when trying to decode type")]
    UnknownDelta(u64),

    #[error("bad field number {0} for CommonType")]
    CorruptCommonType(i64),

    #[error("bad field number {field} for struct with {count} fields")]
    BadFieldNum { field: i64, count: usize },

    #[error("failed to decode string: wanted {wanted} bytes, {available} available")]
    BadString { wanted: u64, available: usize },

    #[error("gob had value for unknown type {0}")]
    UnexpectedType(TypeId),

    #[error("expected delta {expected} but got {found}")]
    GenericMismatch { expected: u64, found: u64 },

    #[error("values nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A decoding failure together with where it happened.
///
/// `processed` counts every byte consumed from the start of the source,
/// frame length prefixes included. `raw` holds the whole frame that was
/// being decoded, including the bytes already consumed, so a failing gob
/// can be dumped for inspection.
#[derive(Debug, thiserror::Error)]
#[error("error: {kind} after processing {processed} bytes")]
pub struct Error {
    pub kind: ErrorKind,
    pub processed: u64,
    pub raw: Vec<u8>,
}

impl Error {
    pub fn new(kind: ErrorKind, processed: u64, raw: &[u8]) -> Self {
        Self {
            kind,
            processed,
            raw: raw.to_vec(),
        }
    }

    /// Whether the source itself was cut short. Nothing after this point can
    /// be trusted to start on a frame boundary.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self.kind, ErrorKind::UnexpectedEof)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, ErrorKind::Eof)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while writing a gob stream back out.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no definition for type id {0}")]
    UnknownType(TypeId),

    #[error("value does not fit type {id}: expected {expected}")]
    Mismatch { id: TypeId, expected: &'static str },

    #[error("struct {type_name} has no field named {field}")]
    UnknownField { type_name: String, field: String },

    #[error("no type named {0} to encode an interface value with")]
    UnknownInterfaceType(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tried to use custom seed {value} which cannot be parsed to i64: {source}")]
    BadSeed {
        value: String,
        source: std::num::ParseIntError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offset() {
        let err = Error::new(ErrorKind::VarintTooBig, 3, &[0x05, 0x0c, 0x80]);
        assert_eq!(
            err.to_string(),
            "error: found uint claiming to be longer than 8 bytes after processing 3 bytes"
        );
        assert_eq!(err.raw, vec![0x05, 0x0c, 0x80]);
    }

    #[test]
    fn eof_predicates() {
        assert!(Error::new(ErrorKind::Eof, 0, &[]).is_eof());
        assert!(Error::new(ErrorKind::UnexpectedEof, 0, &[]).is_unexpected_eof());
        assert!(!Error::new(ErrorKind::FrameExhausted, 0, &[]).is_unexpected_eof());
    }
}

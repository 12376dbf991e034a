use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::error::ErrorKind;

/// Longest big-endian payload a uint may claim.
pub const UINT_BYTE_SIZE: usize = 8;

/// A failed uint read. `consumed` is exact even on failure so callers can
/// keep their offsets right.
#[derive(Debug, thiserror::Error)]
#[error("{kind} after {consumed} bytes")]
pub struct ReadUintError {
    pub kind: ErrorKind,
    pub consumed: usize,
}

impl ReadUintError {
    fn new(kind: ErrorKind, consumed: usize) -> Self {
        Self { kind, consumed }
    }
}

/// Reads one gob uint and reports how many bytes it took.
///
/// Values up to 0x7F are a single byte. Anything larger is a byte holding
/// the payload length, negated, followed by that many big-endian bytes.
///
/// | Bytes        | Value | Consumed |
/// |--------------|-------|----------|
/// | `07`         | 7     | 1        |
/// | `FF 80`      | 128   | 2        |
/// | `FE 01 00`   | 256   | 3        |
///
/// Nothing available at all is [`ErrorKind::Eof`]; running out after the
/// length byte is [`ErrorKind::UnexpectedEof`].
pub fn read_uint<R: Read + ?Sized>(r: &mut R) -> Result<(u64, usize), ReadUintError> {
    let u7_or_len = match r.read_u8() {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ReadUintError::new(ErrorKind::Eof, 0));
        }
        Err(e) => return Err(ReadUintError::new(ErrorKind::Io(e), 0)),
    };
    if u7_or_len <= 0x7f {
        return Ok((u7_or_len as u64, 1));
    }

    let len = (u7_or_len as i8).unsigned_abs() as usize;
    if len > UINT_BYTE_SIZE {
        return Err(ReadUintError::new(ErrorKind::VarintTooBig, 1));
    }

    let mut buf = [0u8; UINT_BYTE_SIZE];
    let (got, err) = read_full(r, &mut buf[..len]);
    if let Some(e) = err {
        return Err(ReadUintError::new(ErrorKind::Io(e), 1 + got));
    }
    if got < len {
        return Err(ReadUintError::new(ErrorKind::UnexpectedEof, 1 + got));
    }
    Ok((BigEndian::read_uint(&buf[..len], len), 1 + len))
}

// Like read_exact, but tells how far it got before the source dried up.
fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> (usize, Option<io::Error>) {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (filled, Some(e)),
        }
    }
    (filled, None)
}

/// The low bit is the sign: when set the value is the complement of the rest.
#[inline]
pub fn uint_to_int(x: u64) -> i64 {
    let i = (x >> 1) as i64;
    if x & 1 != 0 { !i } else { i }
}

/// Floats travel byte-reversed so that common values have short encodings.
#[inline]
pub fn uint_to_float(x: u64) -> f64 {
    f64::from_bits(x.swap_bytes())
}

#[inline]
pub fn uint_to_complex(re: u64, im: u64) -> (f64, f64) {
    (uint_to_float(re), uint_to_float(im))
}

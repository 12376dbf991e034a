use std::io::{self, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

/// Writes gob primitives to an underlying writer.
pub struct Encoder<W: Write> {
    writer: W,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    /// Values below 128 take a single byte. Anything larger is its minimal
    /// big-endian bytes, preceded by their count negated.
    pub fn write_uint(&mut self, v: u64) -> io::Result<()> {
        if v < 0x80 {
            return self.writer.write_u8(v as u8);
        }
        let n = 8 - (v.leading_zeros() / 8) as usize;
        let mut buf = [0u8; 8];
        BigEndian::write_uint(&mut buf, v, n);
        self.writer.write_u8((n as u8).wrapping_neg())?;
        self.writer.write_all(&buf[..n])
    }

    /// Low bit flags a complemented negative.
    pub fn write_int(&mut self, v: i64) -> io::Result<()> {
        let u = if v < 0 {
            ((!v as u64) << 1) | 1
        } else {
            (v as u64) << 1
        };
        self.write_uint(u)
    }

    /// Floats go out byte-reversed so small exponents stay short.
    pub fn write_float(&mut self, v: f64) -> io::Result<()> {
        self.write_uint(v.to_bits().swap_bytes())
    }

    pub fn write_complex(&mut self, re: f64, im: f64) -> io::Result<()> {
        self.write_float(re)?;
        self.write_float(im)
    }

    pub fn write_bool(&mut self, v: bool) -> io::Result<()> {
        self.write_uint(v as u64)
    }

    /// Length, then the raw bytes.
    pub fn write_bytes(&mut self, v: &[u8]) -> io::Result<()> {
        self.write_uint(v.len() as u64)?;
        self.writer.write_all(v)
    }

    pub fn write_string(&mut self, v: &str) -> io::Result<()> {
        self.write_bytes(v.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::{read_uint, uint_to_complex, uint_to_float, uint_to_int};

    fn encoded(f: impl FnOnce(&mut Encoder<&mut Vec<u8>>) -> io::Result<()>) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut Encoder::new(&mut buf)).unwrap();
        buf
    }

    #[test]
    fn test_uint_encoding() {
        let tests = vec![
            (0, vec![0]),
            (127, vec![127]),
            (128, vec![255, 128]),
            (256, vec![254, 1, 0]),
            (u64::MAX, vec![248, 255, 255, 255, 255, 255, 255, 255, 255]),
        ];

        for (val, expected) in tests {
            let buf = encoded(|e| e.write_uint(val));
            assert_eq!(buf, expected, "Failed encoding {}", val);
            let (decoded, n) = read_uint(&mut buf.as_slice()).unwrap();
            assert_eq!((decoded, n), (val, expected.len()), "Failed decoding {}", val);
        }
    }

    #[test]
    fn test_int_encoding() {
        assert_eq!(encoded(|e| e.write_int(-129)), vec![254, 1, 1]);
        for val in [0, -1, 1, -128, 128, i64::MIN, i64::MAX] {
            let buf = encoded(|e| e.write_int(val));
            let (u, _) = read_uint(&mut buf.as_slice()).unwrap();
            assert_eq!(uint_to_int(u), val, "Failed decoding {}", val);
        }
    }

    #[test]
    fn test_float_encoding() {
        // 17.0 is 0x4031000000000000; reversed it needs two bytes
        assert_eq!(encoded(|e| e.write_float(17.0)), vec![0xfe, 0x31, 0x40]);

        let buf = encoded(|e| e.write_complex(5.0, 3.0));
        let mut r = buf.as_slice();
        let (re, _) = read_uint(&mut r).unwrap();
        let (im, _) = read_uint(&mut r).unwrap();
        assert_eq!(uint_to_complex(re, im), (5.0, 3.0));
        assert_eq!(uint_to_float(re), 5.0);
    }

    #[test]
    fn test_string_encoding() {
        let buf = encoded(|e| e.write_string("Hello World"));
        assert_eq!(buf[0], 11);
        assert_eq!(&buf[1..], b"Hello World");
    }
}

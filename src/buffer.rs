use std::io::{self, Read, Write};

/// Holds one frame while it is decoded.
///
/// Unlike a plain reader the consumed bytes stay around: [`raw_bytes`]
/// always returns the frame from its first byte, so an error raised halfway
/// through can still carry the whole gob.
///
/// [`raw_bytes`]: FrameCursor::raw_bytes
#[derive(Debug, Default, Clone)]
pub struct FrameCursor {
    data: Vec<u8>,
    pos: usize,
}

impl FrameCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap),
            pos: 0,
        }
    }

    /// Borrows the next `n` bytes and moves past them, or returns how many
    /// were actually left.
    pub fn take_slice(&mut self, n: usize) -> Result<&[u8], usize> {
        let available = self.len();
        if n > available {
            return Err(available);
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends everything `r` yields, up to `limit` bytes. Returns how many
    /// bytes arrived, which is short of `limit` when the source ends early.
    pub fn fill_from<R: Read + ?Sized>(&mut self, r: &mut R, limit: u64) -> io::Result<usize> {
        r.take(limit).read_to_end(&mut self.data)
    }

    /// Every byte of the frame, consumed or not.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The unread part of the frame.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Drops the frame but keeps the allocation for the next one.
    pub fn reset(&mut self) {
        self.data.clear();
        self.pos = 0;
    }
}

/// The only way bytes leave the frame besides [`FrameCursor::take_slice`].
/// An exhausted frame reads `Ok(0)`, like any other reader at its end.
impl Read for FrameCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.remaining().len().min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for FrameCursor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_bytes_survive_reads() {
        let mut cur = FrameCursor::new();
        cur.write_all(&[1, 2, 3, 4]).unwrap();
        let mut two = [0u8; 2];
        cur.read_exact(&mut two).unwrap();
        assert_eq!(two, [1, 2]);
        assert_eq!(cur.remaining(), &[3, 4]);
        assert_eq!(cur.raw_bytes(), &[1, 2, 3, 4]);
        assert_eq!(cur.position(), 2);
    }

    #[test]
    fn exhausted_frame_reads_nothing() {
        let mut cur = FrameCursor::new();
        cur.write_all(&[9]).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(cur.read(&mut buf).unwrap(), 1);
        assert_eq!(cur.read(&mut buf).unwrap(), 0);
        let err = cur.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn take_slice_reports_available() {
        let mut cur = FrameCursor::new();
        cur.write_all(b"hello").unwrap();
        assert_eq!(cur.take_slice(2).unwrap(), b"he");
        assert_eq!(cur.take_slice(10).unwrap_err(), 3);
        assert_eq!(cur.take_slice(3).unwrap(), b"llo");
        assert!(cur.is_empty());
        assert_eq!(cur.take_slice(1).unwrap_err(), 0);
    }

    #[test]
    fn fill_from_stops_at_limit_or_source_end() {
        let mut cur = FrameCursor::with_capacity(8);
        let mut src: &[u8] = &[1, 2, 3, 4, 5];
        assert_eq!(cur.fill_from(&mut src, 3).unwrap(), 3);
        assert_eq!(cur.remaining(), &[1, 2, 3]);
        assert_eq!(cur.fill_from(&mut src, 100).unwrap(), 2);
        assert_eq!(cur.len(), 5);
    }

    #[test]
    fn reset_rewinds() {
        let mut cur = FrameCursor::new();
        cur.extend_from_slice(&[1, 2]);
        cur.take_slice(1).unwrap();
        cur.reset();
        assert!(cur.raw_bytes().is_empty());
        assert_eq!(cur.position(), 0);
    }
}

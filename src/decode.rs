use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::config::DecoderConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::gob::Gob;
use crate::registry;
use crate::session::Session;
use crate::varint;

/// Reads length-prefixed frames from a byte source and turns them into
/// [`Gob`]s.
pub struct Decoder<R> {
    reader: R,
    session: Session,
    config: DecoderConfig,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, DecoderConfig::default())
    }

    pub fn with_config(reader: R, config: DecoderConfig) -> Self {
        let namer = registry::namer_for(config.naming);
        Self {
            reader,
            session: Session::new(namer, config.max_depth),
            config,
        }
    }

    /// Bytes consumed from the source so far.
    pub fn processed(&self) -> u64 {
        self.session.processed()
    }

    /// Replaces the loaded frame with the next one from the source.
    fn read_frame(&mut self) -> Result<()> {
        self.session.discard_frame();

        let (len, n) = match varint::read_uint(&mut self.reader) {
            Ok(v) => v,
            Err(e) => {
                self.session.advance(e.consumed as u64);
                // a source cut off inside a length prefix ends like one cut
                // off between frames; there is no body to report
                let kind = match e.kind {
                    ErrorKind::UnexpectedEof => {
                        log::warn!("input ends inside a frame length, ignoring {} bytes", e.consumed);
                        ErrorKind::Eof
                    }
                    kind => kind,
                };
                return Err(self.session.error(kind));
            }
        };
        self.session.advance(n as u64);

        let limit = self.config.max_frame_size;
        if len > limit {
            let err = self.session.error(ErrorKind::FrameTooLarge { size: len, limit });
            // step over the body so the next length lands on a frame boundary
            let skipped = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())
                .map_err(|e| self.session.error(ErrorKind::Io(e)))?;
            self.session.advance(skipped);
            if skipped < len {
                return Err(self.session.error(ErrorKind::UnexpectedEof));
            }
            return Err(err);
        }

        let got = self
            .session
            .cursor
            .fill_from(&mut self.reader, len)
            .map_err(|e| self.session.error(ErrorKind::Io(e)))?;
        if (got as u64) < len {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                self.session.processed() + got as u64,
                self.session.cursor.raw_bytes(),
            ));
        }
        log::trace!("frame of {len} bytes at offset {}", self.session.processed());
        Ok(())
    }

    /// Reads frames until one of them completes a message. `None` once the
    /// source ends cleanly between frames.
    pub fn next_gob(&mut self) -> Result<Option<Gob>> {
        loop {
            if let Err(e) = self.read_frame() {
                if e.is_eof() {
                    self.drop_partial();
                    return Ok(None);
                }
                return Err(e);
            }
            if let Some(value) = self.session.decode_frame()? {
                let gob = self.session.finish(value);
                log::debug!("decoded gob with {} types", gob.types.len());
                return Ok(Some(gob));
            }
        }
    }

    /// Decodes the whole source. The first error aborts everything.
    pub fn decode_all(&mut self) -> Result<Vec<Gob>> {
        let mut gobs = Vec::new();
        while let Some(gob) = self.next_gob()? {
            gobs.push(gob);
        }
        Ok(gobs)
    }

    fn drop_partial(&mut self) {
        let pending = self.session.registry().len();
        if pending > 0 {
            log::warn!("input ended with {pending} type definitions but no value, dropping them");
            self.session.clear();
        }
    }
}

impl<R: Read + Send + 'static> Decoder<R> {
    /// Decodes on a background thread, handing each gob or error over a
    /// queue holding at most `buffer` items (0 hands them over one by one).
    ///
    /// Malformed frames are reported and skipped; only a source that ends
    /// mid-frame, or fails to read, ends the stream early.
    pub fn decode_stream(self, cancel: CancelToken, buffer: usize) -> GobStream {
        let (tx, rx) = channel::bounded(buffer);
        let token = cancel.clone();
        let spawned = thread::Builder::new()
            .name("gob-stream".to_string())
            .stack_size(self.config.stream_stack_size())
            .spawn(move || self.run_stream(&tx, &token));

        match spawned {
            Ok(worker) => GobStream {
                rx: Some(rx),
                cancel,
                worker: Some(worker),
            },
            Err(e) => {
                let (tx, rx) = channel::bounded(1);
                let _ = tx.send(Err(Error::new(ErrorKind::Io(e), 0, &[])));
                GobStream {
                    rx: Some(rx),
                    cancel,
                    worker: None,
                }
            }
        }
    }

    fn run_stream(mut self, tx: &Sender<StreamItem>, cancel: &CancelToken) {
        // after a broken type section nothing is reported until a message
        // decodes again
        let mut scanning = false;
        loop {
            if cancel.is_cancelled() {
                log::debug!("stream cancelled after {} bytes", self.processed());
                return;
            }

            if let Err(e) = self.read_frame() {
                match e.kind {
                    ErrorKind::Eof => {
                        self.drop_partial();
                        return;
                    }
                    ErrorKind::UnexpectedEof | ErrorKind::Io(_) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                    _ => {}
                }
                self.session.clear();
                if !scanning {
                    log::warn!("{e}, looking for the next message");
                    if tx.send(Err(e)).is_err() {
                        return;
                    }
                    scanning = true;
                }
                continue;
            }

            match self.session.decode_frame() {
                Ok(Some(value)) => {
                    if scanning {
                        log::warn!("back in sync at byte {}", self.processed());
                        scanning = false;
                    }
                    let gob = self.session.finish(value);
                    if tx.send(Ok(gob)).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    let in_value = self.session.in_value();
                    self.session.clear();
                    if scanning {
                        log::debug!("skipping frame: {e}");
                        scanning = !in_value;
                        continue;
                    }
                    if !in_value {
                        log::warn!("{e}, looking for the next message");
                        scanning = true;
                    }
                    if tx.send(Err(e)).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Asks a running stream to stop. Checked between frames only, so a frame
/// already being decoded is finished first.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub type StreamItem = Result<Gob>;

/// Gobs and errors from [`Decoder::decode_stream`], in source order.
///
/// Dropping the stream cancels the worker.
pub struct GobStream {
    rx: Option<Receiver<StreamItem>>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl GobStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn finish(&mut self) {
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("gob stream worker panicked");
            }
        }
    }
}

impl Iterator for GobStream {
    type Item = StreamItem;

    fn next(&mut self) -> Option<StreamItem> {
        let item = self.rx.as_ref()?.recv().ok();
        if item.is_none() {
            // the worker hung up, so it has already returned
            self.finish();
        }
        item
    }
}

impl Drop for GobStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        // a blocked send fails once the receiver is gone; the worker may
        // still be stuck reading, so it is not joined here
        self.rx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_MAX_DEPTH, NamingMode};
    use crate::encode::Encoder;
    use crate::value::Value;

    // type P struct { X int }, id 65
    const STRUCT_P: [u8; 21] = [
        0xff, 0x81, 0x03, 0x01, 0x01, 0x01, b'P', 0x01, 0xff, 0x82, 0x00, 0x01, 0x01, 0x01, 0x01,
        b'X', 0x01, 0x04, 0x00, 0x00, 0x00,
    ];

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        enc.write_uint(body.len() as u64).unwrap();
        enc.write_all(body).unwrap();
        out
    }

    fn int_frame(v: i64) -> Vec<u8> {
        let mut body = Vec::new();
        let mut enc = Encoder::new(&mut body);
        enc.write_int(2).unwrap();
        enc.write_uint(0).unwrap();
        enc.write_int(v).unwrap();
        frame(&body)
    }

    // P{X: x} with its definition, all in one frame
    fn p_message(x: i64) -> Vec<u8> {
        let mut body = STRUCT_P.to_vec();
        let mut enc = Encoder::new(&mut body);
        enc.write_int(65).unwrap();
        enc.write_uint(1).unwrap();
        enc.write_int(x).unwrap();
        enc.write_uint(0).unwrap();
        frame(&body)
    }

    fn p_value(x: i64) -> Value {
        Value::Struct {
            name: "P".into(),
            fields: vec![("X".into(), Value::Int(x))],
        }
    }

    fn decoder(data: Vec<u8>) -> Decoder<io::Cursor<Vec<u8>>> {
        let config = DecoderConfig::default().with_naming(NamingMode::Plain);
        Decoder::with_config(io::Cursor::new(data), config)
    }

    #[test]
    fn golden_int() {
        assert_eq!(int_frame(7), vec![0x03, 0x04, 0x00, 0x0e]);
        let gobs = decoder(int_frame(7)).decode_all().unwrap();
        assert_eq!(gobs.len(), 1);
        assert!(gobs[0].types.is_empty());
        assert_eq!(gobs[0].value, Value::Int(7));
    }

    #[test]
    fn types_are_scoped_per_message() {
        let mut data = p_message(1);
        data.extend(p_message(-2));
        let gobs = decoder(data).decode_all().unwrap();
        assert_eq!(gobs.len(), 2);
        assert_eq!(gobs[1].value, p_value(-2));
        assert_eq!(gobs[1].types.len(), 1);
    }

    #[test]
    fn definitions_in_their_own_frame() {
        let mut data = frame(&STRUCT_P);
        data.extend(frame(&[0xff, 0x82, 0x01, 0x0e, 0x00]));
        data.extend(int_frame(3));
        let mut dec = decoder(data);
        let first = dec.next_gob().unwrap().unwrap();
        assert_eq!(first.value, p_value(7));
        assert_eq!(first.types.len(), 1);
        let second = dec.next_gob().unwrap().unwrap();
        assert!(second.types.is_empty());
        assert!(dec.next_gob().unwrap().is_none());
        assert_eq!(dec.processed(), 22 + 6 + 4);
    }

    #[test]
    fn first_error_aborts_the_batch() {
        let mut data = int_frame(1);
        data.extend(frame(&[0x04, 0x02, 0x0e]));
        data.extend(int_frame(2));
        let err = decoder(data).decode_all().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::GenericMismatch { expected: 0, found: 2 }));
        // 4 bytes of the first frame, the length and two bytes of the second
        assert_eq!(err.processed, 7);
        assert_eq!(err.raw, vec![0x04, 0x02, 0x0e]);
    }

    #[test]
    fn truncation() {
        let err = decoder(vec![0x05, 0x04, 0x00]).decode_all().unwrap_err();
        assert!(err.is_unexpected_eof());
        assert_eq!(err.processed, 3);
    }

    #[test]
    fn partial_length_prefix_ends_the_input() {
        let mut data = int_frame(7);
        data.extend_from_slice(&[0xfe, 0x01]);
        let mut dec = decoder(data);
        let gobs = dec.decode_all().unwrap();
        assert_eq!(gobs.len(), 1);
        assert_eq!(gobs[0].value, Value::Int(7));
        assert_eq!(dec.processed(), 6);

        assert!(decoder(vec![0xfe, 0x01]).decode_all().unwrap().is_empty());
    }

    // type Nest []Nest, then a value `levels` slices deep
    fn nested(levels: usize) -> Vec<u8> {
        let mut body = vec![0xff, 0x81, 0x02, 0x01, 0x01, 0x04, b'N', b'e', b's', b't'];
        body.extend_from_slice(&[0x01, 0xff, 0x82, 0x00, 0x01, 0xff, 0x82, 0x00, 0x00]);
        body.extend_from_slice(&[0xff, 0x82, 0x00]);
        body.extend(std::iter::repeat_n(0x01, levels - 1));
        body.push(0x00);
        frame(&body)
    }

    #[test]
    fn nesting_up_to_the_limit_decodes() {
        let gobs = decoder(nested(DEFAULT_MAX_DEPTH)).decode_all().unwrap();
        let mut value = &gobs[0].value;
        let mut levels = 1;
        while let Value::Slice { values, .. } = value {
            match values.first() {
                Some(inner) => {
                    value = inner;
                    levels += 1;
                }
                None => break,
            }
        }
        assert_eq!(levels, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn nesting_past_the_limit_is_an_error() {
        for levels in [DEFAULT_MAX_DEPTH + 1, 1000] {
            let err = decoder(nested(levels)).decode_all().unwrap_err();
            assert!(matches!(err.kind, ErrorKind::NestingTooDeep(DEFAULT_MAX_DEPTH)));
        }
    }

    #[test]
    fn stream_worker_reaches_a_raised_limit() {
        let config = DecoderConfig::default()
            .with_naming(NamingMode::Plain)
            .with_max_depth(1024);
        let mut data = nested(1024);
        data.extend(nested(1025));
        let items: Vec<_> = Decoder::with_config(io::Cursor::new(data), config)
            .decode_stream(CancelToken::new(), 0)
            .collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1].as_ref().unwrap_err().kind,
            ErrorKind::NestingTooDeep(1024)
        ));
    }

    #[test]
    fn trailing_types_are_dropped() {
        let gobs = decoder(frame(&STRUCT_P)).decode_all().unwrap();
        assert!(gobs.is_empty());
    }

    #[test]
    fn oversized_frames_are_refused() {
        let mut data = frame(&[0u8; 40]);
        data.extend(int_frame(5));
        let config = DecoderConfig::default().with_max_frame_size(16);
        let mut dec = Decoder::with_config(io::Cursor::new(data), config);
        let err = dec.next_gob().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::FrameTooLarge { size: 40, limit: 16 }));
        // the body was skipped, so decoding can carry on
        assert_eq!(dec.next_gob().unwrap().unwrap().value, Value::Int(5));
    }

    #[test]
    fn lying_length_does_not_allocate() {
        // claims 4 GiB, has 2
        let data = vec![0xfb, 0x01, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00];
        let config = DecoderConfig::default().with_max_frame_size(u64::MAX);
        let err = Decoder::with_config(io::Cursor::new(data), config)
            .decode_all()
            .unwrap_err();
        assert!(err.is_unexpected_eof());
    }

    fn collect(data: Vec<u8>, buffer: usize) -> Vec<StreamItem> {
        decoder(data).decode_stream(CancelToken::new(), buffer).collect()
    }

    #[test]
    fn stream_skips_a_broken_type_section() {
        let mut broken = p_message(2);
        // struct selector becomes an unknown one
        broken[3] = 0x09;
        let mut data = p_message(1);
        data.extend(broken);
        data.extend(p_message(3));

        let items = collect(data, 0);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().value, p_value(1));
        let err = items[1].as_ref().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownDelta(9)));
        assert_eq!(items[2].as_ref().unwrap().value, p_value(3));
    }

    #[test]
    fn stream_skips_a_broken_value() {
        let mut broken = p_message(2);
        // field delta past the only field
        let at = broken.len() - 3;
        broken[at] = 0x05;
        let mut data = p_message(1);
        data.extend(broken);
        data.extend(p_message(3));

        let items = collect(data, 4);
        assert_eq!(items.len(), 3);
        assert!(matches!(
            items[1].as_ref().unwrap_err().kind,
            ErrorKind::BadFieldNum { field: 4, count: 1 }
        ));
        assert_eq!(items[2].as_ref().unwrap().value, p_value(3));
    }

    #[test]
    fn stream_keeps_multi_frame_messages_after_a_scan() {
        let mut data = frame(&[0xff, 0x81, 0x0a]);
        data.extend(frame(&STRUCT_P));
        data.extend(frame(&[0xff, 0x82, 0x01, 0x0e, 0x00]));
        let items = collect(data, 0);
        assert_eq!(items.len(), 2);
        assert!(items[0].is_err());
        assert_eq!(items[1].as_ref().unwrap().value, p_value(7));
    }

    #[test]
    fn stream_ends_on_truncation() {
        let mut data = int_frame(1);
        data.extend([0x05, 0x04, 0x00]);
        let items = collect(data, 0);
        assert_eq!(items.len(), 2);
        assert!(items[1].as_ref().unwrap_err().is_unexpected_eof());
    }

    #[test]
    fn cancellation_stops_between_frames() {
        let mut data = Vec::new();
        for i in 0..20 {
            data.extend(int_frame(i));
        }
        let mut stream = decoder(data).decode_stream(CancelToken::new(), 0);
        assert_eq!(stream.next().unwrap().unwrap().value, Value::Int(0));
        stream.cancel();
        let rest = stream.count();
        assert!(rest < 19, "got {rest} more gobs after cancelling");
    }

    #[test]
    fn dropping_the_stream_cancels() {
        let mut data = Vec::new();
        for i in 0..20 {
            data.extend(int_frame(i));
        }
        let token = CancelToken::new();
        let mut stream = decoder(data).decode_stream(token.clone(), 0);
        assert!(stream.next().is_some());
        drop(stream);
        assert!(token.is_cancelled());
    }
}

//! Length-prefixed framing for byte-stream conduits.
//!
//! Wire format:
//! ```text
//! ┌──────────────┬───────────┬─────────────────┐
//! │ Magic (2B)   │ Length    │ Payload          │
//! │ 0x52 0x50    │ (4B LE)   │ (Length bytes)   │
//! │ "RP"         │           │                  │
//! └──────────────┴───────────┴─────────────────┘
//! ```

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::{Result, TransportError};

/// Frame header: magic (2) + length (4) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Magic bytes: "RP" (0x52 0x50).
pub const MAGIC: [u8; 2] = [0x52, 0x50];

/// Default maximum payload size: 1 MiB. Envelopes are small JSON documents.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration for framed streams.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
    /// Read timeout applied to socket streams; doubles as the inbox poll interval.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to socket streams.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: Some(Duration::from_millis(100)),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Encode one payload into the wire format.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(TransportError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one payload from the front of `src`.
///
/// Returns `Ok(None)` until a complete frame is buffered; consumes the frame
/// bytes on success.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(TransportError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    if payload_len > max_payload {
        return Err(TransportError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Reads complete frames from any `Read` stream.
///
/// Bytes read before a timeout stay buffered, so a frame split across two
/// poll intervals is still delivered whole.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_payload_size: usize,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_payload(inner, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(inner: T, max_payload_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload_size,
        }
    }

    /// Read the next complete frame payload.
    ///
    /// Returns `Ok(None)` when the stream reports `WouldBlock`/`TimedOut`
    /// and `Err(TransportError::Closed)` at EOF.
    pub fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(payload) = decode_frame(&mut self.buf, self.max_payload_size)? {
                return Ok(Some(payload));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(None);
                }
                Err(err) => return Err(TransportError::Io(err)),
            };

            if read == 0 {
                return Err(TransportError::Closed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

/// Writes complete frames to any `Write` stream.
///
/// A write that times out part-way through a frame leaves the stream
/// desynchronized; every later `send` then reports `Closed`.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    max_payload_size: usize,
    torn: bool,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_payload(inner, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(inner: T, max_payload_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload_size,
            torn: false,
        }
    }

    /// Encode and write one payload, then flush.
    ///
    /// `WouldBlock`/`TimedOut` from the stream means its write timeout
    /// expired and is reported as `WriteTimeout`.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.torn {
            return Err(TransportError::Closed);
        }
        if payload.len() > self.max_payload_size {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => {
                    self.torn = offset > 0;
                    warn!(written = offset, total = self.buf.len(), "frame write timed out");
                    return Err(TransportError::WriteTimeout {
                        written: offset,
                        total: self.buf.len(),
                    });
                }
                Err(err) if is_disconnect(&err) => return Err(TransportError::Closed),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => {
                    let total = self.buf.len();
                    return Err(TransportError::WriteTimeout {
                        written: total,
                        total,
                    });
                }
                Err(err) if is_disconnect(&err) => return Err(TransportError::Closed),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(br#"{"method":"quit"}"#, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 17);

        let payload = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(payload.as_ref(), br#"{"method":"quit"}"#);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut buf = BytesMut::from(&[0x52, 0x50, 0x05][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());

        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut buf = BytesMut::from(&[0x49, 0x50, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(TransportError::InvalidMagic)));
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(64);
        let result = decode_frame(&mut buf, 16);
        assert!(matches!(
            result,
            Err(TransportError::PayloadTooLarge { size: 64, max: 16 })
        ));
    }

    #[test]
    fn reader_handles_byte_by_byte_stream() {
        let mut wire = BytesMut::new();
        encode_frame(b"first", &mut wire).unwrap();
        encode_frame(b"second", &mut wire).unwrap();

        let mut reader = FrameReader::new(ByteByByte {
            bytes: wire.to_vec(),
            pos: 0,
        });
        assert_eq!(reader.read_frame().unwrap().unwrap().as_ref(), b"first");
        assert_eq!(reader.read_frame().unwrap().unwrap().as_ref(), b"second");
        assert!(matches!(reader.read_frame(), Err(TransportError::Closed)));
    }

    #[test]
    fn reader_keeps_partial_frame_across_timeouts() {
        let mut wire = BytesMut::new();
        encode_frame(b"split", &mut wire).unwrap();
        let (head, tail) = wire.split_at(4);

        let mut reader = FrameReader::new(Stalling {
            chunks: vec![head.to_vec(), tail.to_vec()],
            stalled: false,
        });
        assert!(reader.read_frame().unwrap().is_none());
        assert_eq!(reader.read_frame().unwrap().unwrap().as_ref(), b"split");
    }

    #[test]
    fn writer_rejects_oversized_payload() {
        let mut writer = FrameWriter::with_max_payload(Cursor::new(Vec::new()), 4);
        let result = writer.send(b"too long");
        assert!(matches!(result, Err(TransportError::PayloadTooLarge { .. })));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn writer_output_is_readable() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send(b"ping").unwrap();
        let bytes = writer.into_inner().into_inner();

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().unwrap().as_ref(), b"ping");
    }

    #[test]
    fn writer_gives_up_when_write_times_out() {
        let mut writer = FrameWriter::new(Stuck { accept: 0 });
        let result = writer.send(b"ping");
        assert!(matches!(
            result,
            Err(TransportError::WriteTimeout { written: 0, total: 10 })
        ));
        // Nothing reached the stream, so the writer stays usable.
        writer.get_mut().accept = usize::MAX;
        writer.send(b"ping").unwrap();
    }

    #[test]
    fn writer_torn_mid_frame_reports_closed() {
        let mut writer = FrameWriter::new(Stuck { accept: 3 });
        assert!(matches!(
            writer.send(b"ping"),
            Err(TransportError::WriteTimeout { written: 3, total: 10 })
        ));
        writer.get_mut().accept = usize::MAX;
        assert!(matches!(writer.send(b"ping"), Err(TransportError::Closed)));
    }

    #[cfg(unix)]
    #[test]
    fn unread_socket_write_returns_after_timeout() {
        use std::os::unix::net::UnixStream;
        use std::time::Instant;

        let (left, _right) = UnixStream::pair().unwrap();
        left.set_write_timeout(Some(Duration::from_millis(50))).unwrap();
        let mut writer = FrameWriter::new(left);
        let payload = vec![b'x'; 512 * 1024];

        let start = Instant::now();
        let err = loop {
            match writer.send(&payload) {
                Ok(()) => assert!(start.elapsed() < Duration::from_secs(5)),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, TransportError::WriteTimeout { .. }), "{err:?}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    /// Accepts `accept` bytes, then times out on every write.
    struct Stuck {
        accept: usize,
    }

    impl Write for Stuck {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.accept == 0 {
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let n = buf.len().min(self.accept);
            self.accept -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ByteByByte {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByte {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    /// Yields its first chunk, then one timeout, then the rest.
    struct Stalling {
        chunks: Vec<Vec<u8>>,
        stalled: bool,
    }

    impl Read for Stalling {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.len() == 1 && !self.stalled {
                self.stalled = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }
}

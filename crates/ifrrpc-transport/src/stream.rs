use std::io::{Read, Write};

use bytes::Bytes;

use crate::error::Result;
use crate::frame::{FrameReader, FrameWriter};
use crate::traits::{Conduit, Inbox};

/// Send half over a framed byte stream.
pub struct StreamConduit<W> {
    writer: FrameWriter<W>,
    name: &'static str,
}

/// Receive half over a framed byte stream.
///
/// The poll interval is the read timeout configured on the stream itself.
pub struct StreamInbox<R> {
    reader: FrameReader<R>,
}

impl<W: Write> StreamConduit<W> {
    pub fn new(writer: FrameWriter<W>, name: &'static str) -> Self {
        Self { writer, name }
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

impl<R: Read> StreamInbox<R> {
    pub fn new(reader: FrameReader<R>) -> Self {
        Self { reader }
    }

    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }
}

impl<W: Write> Conduit for StreamConduit<W> {
    fn post(&mut self, message: &[u8]) -> Result<()> {
        self.writer.send(message)
    }

    fn transport_name(&self) -> &'static str {
        self.name
    }
}

impl<R: Read> Inbox for StreamInbox<R> {
    fn next_message(&mut self) -> Result<Option<Bytes>> {
        self.reader.read_frame()
    }
}

impl<W> std::fmt::Debug for StreamConduit<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConduit")
            .field("transport", &self.name)
            .finish()
    }
}

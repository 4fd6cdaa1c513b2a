//! Newline-delimited text transport.
//!
//! Works over anything byte-oriented: child process stdio, TCP streams,
//! Unix sockets, `tokio::io::duplex`. Each text message is one line, so
//! messages must not contain `\n`. Protocol frames never do: JSON escapes
//! newlines and prefixes are validated.
//!
//! Inbound lines that are not valid UTF-8 are delivered as
//! `RawMessage::Binary`, and lines longer than the receiver's limit are
//! discarded, so stray output on a shared stream never ends the link.

use super::{FrameReceiver, FrameSender, RawMessage};
use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::warn;

/// Default cap on one inbound line, newline excluded.
pub const DEFAULT_MAX_LINE: usize = 16 * 1024 * 1024;

/// Writes one message per line.
pub struct LineSender<W> {
    writer: Mutex<W>,
}

/// Reads one message per line.
pub struct LineReceiver<R> {
    reader: BufReader<R>,
    /// Bytes of the current, unterminated line.
    line: Vec<u8>,
    max_line: usize,
    /// Set while skipping the rest of an oversized line.
    discarding: bool,
}

impl<R: AsyncRead + Unpin + Send> LineReceiver<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::new(),
            max_line: DEFAULT_MAX_LINE,
            discarding: false,
        }
    }

    /// Drop lines longer than `max_line` bytes instead of buffering them.
    #[must_use]
    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    /// Append `chunk` to the current line, or start discarding it once it
    /// would exceed the cap.
    fn push(&mut self, chunk: &[u8]) {
        if self.discarding {
            return;
        }
        if self.line.len() + chunk.len() > self.max_line {
            warn!(
                max_line = self.max_line,
                "Discarding oversized inbound line"
            );
            self.discarding = true;
            self.line = Vec::new();
        } else {
            self.line.extend_from_slice(chunk);
        }
    }

    /// Finish the current line. `None` if it was discarded.
    fn take_line(&mut self) -> Option<RawMessage> {
        if std::mem::take(&mut self.discarding) {
            self.line.clear();
            return None;
        }
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(match String::from_utf8(line) {
            Ok(text) => RawMessage::Text(text),
            Err(e) => RawMessage::Binary(Bytes::from(e.into_bytes())),
        })
    }
}

/// Wrap a reader/writer pair as a transport.
pub fn split<R, W>(reader: R, writer: W) -> (LineSender<W>, LineReceiver<R>)
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    (
        LineSender {
            writer: Mutex::new(writer),
        },
        LineReceiver::new(reader),
    )
}

#[async_trait]
impl<W> FrameSender for LineSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: RawMessage) -> Result<(), TransportError> {
        let RawMessage::Text(text) = message else {
            return Err(TransportError::Io(
                "binary messages cannot be line-framed".into(),
            ));
        };
        if text.contains('\n') {
            return Err(TransportError::Io("message contains a newline".into()));
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<R> FrameReceiver for LineReceiver<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn receive(&mut self) -> Result<RawMessage, TransportError> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                // EOF: an unterminated last line still counts.
                if !self.line.is_empty() || self.discarding {
                    if let Some(message) = self.take_line() {
                        return Ok(message);
                    }
                }
                return Err(TransportError::Closed);
            }

            match available.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    let chunk = available[..end].to_vec();
                    self.reader.consume(end + 1);
                    self.push(&chunk);
                    if let Some(message) = self.take_line() {
                        return Ok(message);
                    }
                }
                None => {
                    let chunk = available.to_vec();
                    self.reader.consume(chunk.len());
                    self.push(&chunk);
                }
            }
        }
    }
}

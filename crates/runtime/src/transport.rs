//! Pipe transport for the driver message stream.
//!
//! Messages are framed as a 4-byte little-endian length prefix followed by
//! that many bytes of UTF-8 JSON, one logical message per frame. The
//! receiver half runs an independent read loop and hands parsed frames to
//! the connection over an unbounded channel, so a slow consumer can never
//! stall ingestion of subsequent frames.

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Length-prefix header size in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Sender half of a transport: writes one complete frame per call.
pub trait TransportSender: Send {
    fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>>;
}

/// Receiver half of a transport: drives the read loop to completion.
///
/// `run` returns `Ok(())` on clean shutdown (EOF at a frame boundary or
/// consumer gone) and an error on a truncated frame or pipe failure. Either
/// way the stream is finished exactly once.
pub trait TransportReceiver: Send {
    fn run(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// The pieces a [`crate::connection::Connection`] needs to take ownership of
/// a transport.
pub struct TransportParts {
    pub sender: Box<dyn TransportSender>,
    pub receiver: Box<dyn TransportReceiver>,
    pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Transport over a pair of byte streams (driver stdin/stdout in
/// production, in-memory duplex pipes in tests).
pub struct PipeTransport<W, R> {
    sender: PipeTransportSender<W>,
    receiver: PipeTransportReceiver<R>,
}

impl<W, R> PipeTransport<W, R>
where
    W: AsyncWrite + Unpin + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Creates a transport over the given streams.
    ///
    /// Returns the transport and the receiving end of the inbound message
    /// channel.
    pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let transport = Self {
            sender: PipeTransportSender { writer },
            receiver: PipeTransportReceiver {
                reader,
                message_tx,
            },
        };
        (transport, message_rx)
    }

    /// Splits into sender and receiver halves.
    pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
        (self.sender, self.receiver)
    }

    /// Boxes the halves into [`TransportParts`] for the connection.
    pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
        TransportParts {
            sender: Box::new(self.sender),
            receiver: Box::new(self.receiver),
            message_rx,
        }
    }
}

/// Encodes one message as a length-prefixed frame.
pub fn encode_frame(message: &Value) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(message)?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Writing half of a [`PipeTransport`].
pub struct PipeTransportSender<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> PipeTransportSender<W> {
    /// Writes one complete frame. Fails once the stream is closed.
    pub async fn send(&mut self, message: Value) -> Result<()> {
        let frame = encode_frame(&message)?;
        self.writer
            .write_all(&frame)
            .await
            .map_err(|e| Error::Transport(format!("Failed to write frame: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("Failed to flush frame: {e}")))?;
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin + Send> TransportSender for PipeTransportSender<W> {
    fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.send(message))
    }
}

/// Reading half of a [`PipeTransport`].
pub struct PipeTransportReceiver<R> {
    reader: R,
    message_tx: mpsc::UnboundedSender<Value>,
}

impl<R: AsyncRead + Unpin + Send> PipeTransportReceiver<R> {
    /// Reads frames until EOF, error, or the consumer drops the channel.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let mut len_buf = [0u8; FRAME_HEADER_LEN];

            // A clean EOF between frames is a normal shutdown; an EOF
            // mid-header is a truncated frame.
            let first = self
                .reader
                .read(&mut len_buf[..1])
                .await
                .map_err(|e| Error::Transport(format!("Failed to read length prefix: {e}")))?;
            if first == 0 {
                return Ok(());
            }
            self.reader
                .read_exact(&mut len_buf[1..])
                .await
                .map_err(|e| Error::Transport(format!("Failed to read length prefix: {e}")))?;

            let length = u32::from_le_bytes(len_buf) as usize;
            let mut payload = vec![0u8; length];
            self.reader
                .read_exact(&mut payload)
                .await
                .map_err(|e| Error::Transport(format!("Failed to read message body: {e}")))?;

            let message: Value = serde_json::from_slice(&payload)
                .map_err(|e| Error::Transport(format!("Failed to parse message frame: {e}")))?;

            if self.message_tx.send(message).is_err() {
                // Consumer gone; treat as shutdown.
                return Ok(());
            }
        }
    }
}

impl<R: AsyncRead + Unpin + Send> TransportReceiver for PipeTransportReceiver<R> {
    fn run(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.run())
    }
}

//! Where detector frames come from and where tick replies go.

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, Lines};
use tokio::net::TcpStream;

use crate::protocol::{message_stream, send_message, ClientMessage, MessageStream, ServerMessage};

/// One inbound item. A malformed frame is reported but does not end the stream.
#[derive(Debug)]
pub enum Inbound {
    Message(ClientMessage),
    Malformed(anyhow::Error),
}

#[allow(async_fn_in_trait)]
pub trait FrameChannel {
    /// Wait for the next frame. `Ok(None)` when the feed has ended.
    async fn recv(&mut self) -> Result<Option<Inbound>>;

    async fn send(&mut self, msg: &ServerMessage) -> Result<()>;
}

/// Detector feed over the length-delimited bincode protocol.
pub struct TcpChannel<S = TcpStream> {
    stream: MessageStream<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TcpChannel<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: message_stream(stream),
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> FrameChannel for TcpChannel<S> {
    async fn recv(&mut self) -> Result<Option<Inbound>> {
        match self.stream.next().await {
            Some(Ok(bytes)) => Ok(Some(match bincode::deserialize(&bytes) {
                Ok(msg) => Inbound::Message(msg),
                Err(e) => Inbound::Malformed(anyhow::Error::new(e).context("undecodable frame")),
            })),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn send(&mut self, msg: &ServerMessage) -> Result<()> {
        send_message(&mut self.stream, msg).await
    }
}

/// Recorded feed: one JSON `ClientMessage` per line in, one JSON `ServerMessage`
/// per line out.
pub struct ReplayChannel<R, W> {
    lines: Lines<R>,
    line_no: usize,
    out: W,
}

impl<R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin> ReplayChannel<R, W> {
    pub fn new(reader: R, out: W) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

impl<R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin> FrameChannel for ReplayChannel<R, W> {
    async fn recv(&mut self) -> Result<Option<Inbound>> {
        loop {
            let Some(line) = self.lines.next_line().await.context("Failed to read replay")? else {
                return Ok(None);
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = self.line_no;
            return Ok(Some(match serde_json::from_str(&line) {
                Ok(msg) => Inbound::Message(msg),
                Err(e) => Inbound::Malformed(
                    anyhow::Error::new(e).context(format!("replay line {}", line_no)),
                ),
            }));
        }
    }

    async fn send(&mut self, msg: &ServerMessage) -> Result<()> {
        let mut line = serde_json::to_string(msg)?;
        line.push('\n');
        self.out.write_all(line.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }
}

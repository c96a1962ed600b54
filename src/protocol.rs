//! TCP protocol for detector-feed ↔ guard-coach communication.
//!
//! Length-delimited frames carrying bincode payloads.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::guard::{GuardLabel, Variant};
use crate::pose::Keypoint;

/// Largest accepted frame. A 17-point pose is a few hundred bytes.
pub const MAX_FRAME_LENGTH: usize = 1024 * 1024;

// --- Message types ---

/// Detector feed → coach
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// One detector result. Empty `keypoints` means no pose this frame.
    /// `mirror_stance: None` falls back to the configured stance.
    Landmarks {
        #[serde(default)]
        timestamp_us: u64,
        keypoints: Vec<Keypoint>,
        #[serde(default)]
        mirror_stance: Option<bool>,
    },
    /// Export the last processed frame as a labeled training sample.
    CaptureSample { labels: BTreeMap<GuardLabel, f32> },
}

/// Coach → detector feed
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Ready {
        variant: Variant,
        labels: Vec<GuardLabel>,
    },
    Feedback {
        timestamp_us: u64,
        lines: Vec<String>,
        code: Option<u8>,
    },
    NoPose { timestamp_us: u64 },
    /// Pretty-printed `LabeledSample` JSON
    Sample { json: String },
    Error { message: String },
}

// --- TCP codec helpers ---

pub type MessageStream<S = TcpStream> = Framed<S, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream<S: AsyncRead + AsyncWrite>(stream: S) -> MessageStream<S> {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize, S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut MessageStream<S>,
    msg: &T,
) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message. `Ok(None)` once the peer closes.
pub async fn recv_message<T: DeserializeOwned, S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut MessageStream<S>,
) -> anyhow::Result<Option<T>> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(Some(bincode::deserialize(&bytes)?)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_over_duplex() {
        let (a, b) = tokio::io::duplex(4096);
        let mut client = message_stream(a);
        let mut server = message_stream(b);

        let msg = ClientMessage::Landmarks {
            timestamp_us: 42,
            keypoints: vec![Keypoint::new(1.0, 2.0, 0.5); 17],
            mirror_stance: Some(true),
        };
        send_message(&mut client, &msg).await.unwrap();
        let received: Option<ClientMessage> = recv_message(&mut server).await.unwrap();
        assert_eq!(received, Some(msg));

        let reply = ServerMessage::Feedback {
            timestamp_us: 42,
            lines: vec!["Guard is correct!".to_string()],
            code: None,
        };
        send_message(&mut server, &reply).await.unwrap();
        let received: Option<ServerMessage> = recv_message(&mut client).await.unwrap();
        assert_eq!(received, Some(reply));
    }

    #[tokio::test]
    async fn test_closed_stream_yields_none() {
        let (a, b) = tokio::io::duplex(64);
        let mut server = message_stream(b);
        drop(a);
        let received: Option<ClientMessage> = recv_message(&mut server).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_capture_labels_survive_encoding() {
        let (a, b) = tokio::io::duplex(1024);
        let mut client = message_stream(a);
        let mut server = message_stream(b);

        let labels = BTreeMap::from([(GuardLabel::Head, 1.0), (GuardLabel::LeftHip, 0.0)]);
        send_message(&mut client, &ClientMessage::CaptureSample { labels: labels.clone() })
            .await
            .unwrap();
        let received: Option<ClientMessage> = recv_message(&mut server).await.unwrap();
        assert_eq!(received, Some(ClientMessage::CaptureSample { labels }));
    }
}

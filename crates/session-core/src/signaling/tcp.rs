//! Client side of the relay's newline-delimited JSON protocol

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use super::SignalingChannel;
use crate::errors::{Result, SessionError};

/// Longest line accepted from the relay; SDP with many candidates stays well below this
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// TCP connection to a rendezvous relay.
///
/// Outbound messages go through a queue drained by a writer task; inbound
/// lines are handed to the receiver returned by [`connect`](Self::connect).
pub struct TcpSignalingChannel {
    outbound: mpsc::UnboundedSender<String>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl TcpSignalingChannel {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<(Self, mpsc::UnboundedReceiver<String>)> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        info!("Connected to signaling relay at {}", peer);

        let (read_half, write_half) = stream.into_split();
        let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_MESSAGE_LEN));
        let mut sink = FramedWrite::new(write_half, LinesCodec::new());

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    warn!("Signaling write failed: {}", e);
                    break;
                }
            }
            debug!("Signaling writer finished");
        });

        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => {
                        if inbound.send(line).is_err() {
                            break;
                        }
                    }
                    Err(LinesCodecError::MaxLineLengthExceeded) => {
                        warn!("Discarding signaling message longer than {} bytes", MAX_MESSAGE_LEN);
                    }
                    Err(LinesCodecError::Io(e)) => {
                        warn!("Signaling read failed: {}", e);
                        break;
                    }
                }
            }
            info!("Signaling relay connection closed");
        });

        Ok((
            Self {
                outbound,
                writer,
                reader,
            },
            inbound_rx,
        ))
    }
}

#[async_trait]
impl SignalingChannel for TcpSignalingChannel {
    async fn send(&self, message: String) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| SessionError::signaling("relay connection closed"))
    }
}

impl Drop for TcpSignalingChannel {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}

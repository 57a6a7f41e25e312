//! TCP front end of the relay

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::router::{ConnectionId, Router};

pub struct RelayServer {
    listener: TcpListener,
    router: Arc<Router>,
    max_message_len: usize,
    next_connection: AtomicU64,
}

impl RelayServer {
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.socket_addr()?).await?;
        info!("Signaling relay listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            router: Arc::new(Router::new()),
            max_message_len: config.max_message_len,
            next_connection: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            self.spawn_connection(stream, addr);
        }
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Signaling relay shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        return Err(e.into());
                    }
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let router = self.router.clone();
        let max_message_len = self.max_message_len;
        info!(connection, %addr, "Peer connected");
        tokio::spawn(async move {
            serve_connection(router, connection, stream, max_message_len).await;
            info!(connection, %addr, "Peer disconnected");
        });
    }
}

async fn serve_connection(router: Arc<Router>, connection: ConnectionId, stream: TcpStream, max_message_len: usize) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(connection, "Could not set TCP_NODELAY: {}", e);
    }
    let (read_half, write_half) = stream.into_split();
    let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(max_message_len));
    let mut sink = FramedWrite::new(write_half, LinesCodec::new());

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    router.connect(connection, outbound);

    let writer = tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if let Err(e) = sink.send(line).await {
                warn!(connection, "Write failed: {}", e);
                break;
            }
        }
    });

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                router.route(connection, &line);
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(connection, "Discarding message longer than {} bytes", max_message_len);
            }
            Err(LinesCodecError::Io(e)) => {
                warn!(connection, "Read failed: {}", e);
                break;
            }
        }
    }

    router.disconnect(connection);
    writer.abort();
}

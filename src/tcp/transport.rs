//! The TCP implementation of [`crate::rpc::Transport`].
//!
//! A dedicated outbound task owns the socket's write half and drains a
//! channel of already-framed buffers, while a second task owns the read
//! half and feeds raw bytes to a connection.
//!
//! A completion-based I/O core with a pool of pending reads per socket is
//! one way to get non-blocking sends and overlapping reads that don't
//! head-of-line-block other connections; tokio's own reactor is already
//! completion-driven under the hood (epoll/kqueue/IOCP depending on
//! platform) and multiplexes many sockets without an explicit
//! pending-operation pool in user code, so this module relies on that
//! instead of hand-rolling IOCP. Per-socket read/write serialization holds
//! here because each connection's read and write loops are independent
//! tokio tasks and never block each other.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::rpc::connection::Connection;
use crate::rpc::transport::Transport;
use crate::sync::ZeroSemaphore;

use super::frame::FrameReader;

/// Default per-read scratch buffer size. A pool of `K` pending reads in a
/// completion-based I/O design becomes one read loop with a buffer this
/// large, since tokio's reactor already overlaps reads across connections
/// without user-managed pending operations.
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

pub struct TcpTransport {
    send_tx: mpsc::UnboundedSender<Vec<u8>>,
    inflight: Arc<ZeroSemaphore>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl TcpTransport {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Waits for every queued send to finish hitting the socket. Used
    /// before dropping a transport so in-flight writes aren't abandoned
    /// mid-frame.
    pub async fn quiesce(&self) {
        self.inflight.wait().await;
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, frame: Vec<u8>) -> Result<(), anyhow::Error> {
        self.inflight.increment();
        self.send_tx.send(frame).map_err(|_| anyhow::anyhow!("transport's writer task has ended"))?;
        Ok(())
    }
}

/// Splits `stream` and spawns its writer task, returning the transport and
/// the still-unattached read half — the caller builds the owning
/// [`Connection`] from the transport first, then hands the read half to
/// [`spawn_reader`] along with a weak reference to it. This two-step
/// handoff is what breaks the transport/connection ownership cycle: the
/// connection owns (a reference-counted clone of) its transport, and the
/// transport's read loop only ever holds a `Weak` back to the connection.
pub fn spawn(stream: TcpStream) -> (Arc<TcpTransport>, OwnedReadHalf) {
    let _ = stream.set_nodelay(true);
    let local_addr = stream.local_addr().ok();
    let peer_addr = stream.peer_addr().ok();
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let inflight = Arc::new(ZeroSemaphore::new());

    tokio::spawn(writer_loop(write_half, rx, inflight.clone()));

    let transport = Arc::new(TcpTransport { send_tx: tx, inflight, local_addr, peer_addr });
    (transport, read_half)
}

/// Spawns the read loop that feeds bytes to `connection` (by weak
/// reference, so a dropped connection quietly stops the loop on its next
/// iteration instead of keeping the socket alive).
pub fn spawn_reader(read_half: OwnedReadHalf, connection: std::sync::Weak<Connection>, buffer_size: usize) {
    tokio::spawn(reader_loop(read_half, connection, buffer_size));
}

async fn writer_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Vec<u8>>, inflight: Arc<ZeroSemaphore>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_half.write_all(&frame).await {
            tracing::debug!("TCP transport write failed, closing: {e}");
            inflight.decrement();
            break;
        }
        inflight.decrement();
    }
}

async fn reader_loop(mut read_half: OwnedReadHalf, connection: std::sync::Weak<Connection>, buffer_size: usize) {
    let mut scratch = vec![0u8; buffer_size];
    let mut framer = FrameReader::new();
    loop {
        let n = match super::frame::read_chunk(&mut read_half, &mut scratch).await {
            Ok(0) => {
                tracing::debug!("TCP transport read EOF, disconnecting");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("TCP transport read error, disconnecting: {e}");
                break;
            }
        };
        let Some(conn) = connection.upgrade() else {
            break;
        };
        for (header, frame) in framer.feed(&scratch[..n]) {
            conn.on_received_frame(header, frame).await;
        }
    }
    if let Some(conn) = connection.upgrade() {
        conn.on_disconnected();
    }
}

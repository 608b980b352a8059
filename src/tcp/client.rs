//! Client-side TCP connector — the outbound counterpart to
//! [`super::listener::RpcTcpListener`], used both by application code that
//! initiates a connection and by `tests/rpc.rs` to stand up a loopback pair.

use std::io;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::rpc::{Connection, RpcTable};

use super::transport::{self, DEFAULT_READ_BUFFER};

/// Connects to `addr` and builds a [`Connection`] dispatching inbound
/// requests against `table` on `target`, using the default read buffer
/// size. See [`connect_with_buffer_size`] to tune it.
pub async fn connect<T: Send + Sync + 'static + ?Sized>(
    addr: &str,
    table: Arc<RpcTable<T>>,
    target: Arc<T>,
) -> io::Result<Arc<Connection>> {
    connect_with_buffer_size(addr, table, target, DEFAULT_READ_BUFFER).await
}

pub async fn connect_with_buffer_size<T: Send + Sync + 'static + ?Sized>(
    addr: &str,
    table: Arc<RpcTable<T>>,
    target: Arc<T>,
    read_buffer_size: usize,
) -> io::Result<Arc<Connection>> {
    let stream = TcpStream::connect(addr).await?;
    let (transport, read_half) = transport::spawn(stream);
    let conn = Connection::new(transport, table, target);
    transport::spawn_reader(read_half, Arc::downgrade(&conn), read_buffer_size);
    Ok(conn)
}

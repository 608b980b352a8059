//! Callee-side half of a connection: decodes an inbound request, dispatches
//! it against the bound [`RpcTable`], and lets the dispatcher's own
//! [`ReplySink`] write the reply (or nothing, for a void success).
//!
//! A reply for a future-valued return needs no deferred-deletion
//! bookkeeping here: every dispatched method is `async`, and `tokio::spawn`
//! already gives each in-flight dispatch its own task, with the current
//! connection re-scoped around it (see `rpc::connection::CURRENT_CONNECTION`).
//! Dropping the owning connection's transport naturally orphans the reply
//! write (it fails silently into `tracing::error!`) rather than reanimating
//! a stale socket.

use std::sync::{Arc, Weak};

use super::connection::Connection;
use super::header::RpcHeader;
use super::reply_sink::ReplySink;
use super::table::RpcTable;
use super::transport::Transport;

pub struct InProcessor<T: ?Sized> {
    table: Arc<RpcTable<T>>,
    target: Arc<T>,
}

impl<T: Send + Sync + 'static + ?Sized> InProcessor<T> {
    pub fn new(table: Arc<RpcTable<T>>, target: Arc<T>) -> Self {
        InProcessor { table, target }
    }

    /// Dispatches one inbound request frame. `frame` holds everything after
    /// the header: the parameter tuple (non-generic) or `(name, Vec<Any>)`
    /// (generic). `connection` is re-established as the "current connection"
    /// around the task the table spawns to run the method.
    pub fn on_incoming(
        &self,
        transport: Arc<dyn Transport>,
        connection: Weak<Connection>,
        header: RpcHeader,
        mut frame: crate::buffer::ChunkBuffer,
    ) {
        let has_return_value = self.table.has_return_value(header.rpcid()).unwrap_or(true);
        let reply = ReplySink::new(transport, has_return_value, header.rpcid(), header.counter());
        self.table.dispatch(header.rpcid(), self.target.clone(), &mut frame, reply, connection);
    }
}

//! Accepts transports, creates connections, and tracks them for the
//! lifetime of the server.
//!
//! Connections are tracked in a `Mutex<HashMap<usize, ..>>` keyed by
//! transport pointer identity — the natural Rust analogue once the socket
//! handle itself is erased behind a `dyn Transport`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::connection::Connection;
use super::table::RpcTable;
use super::transport::Transport;

/// Connections are keyed by the transport's trait-object data pointer,
/// which is stable for the transport's lifetime and unique per connection.
fn transport_key(transport: &Arc<dyn Transport>) -> usize {
    Arc::as_ptr(transport) as *const () as usize
}

pub struct Server<T: ?Sized> {
    table: Arc<RpcTable<T>>,
    connections: Mutex<HashMap<usize, Arc<Connection>>>,
}

impl<T: Send + Sync + 'static + ?Sized> Server<T> {
    pub fn new(table: Arc<RpcTable<T>>) -> Arc<Self> {
        Arc::new(Server { table, connections: Mutex::new(HashMap::new()) })
    }

    /// Accepts a newly established transport, building a connection wired
    /// to a freshly built handler object from `make_target`.
    pub fn accept<F>(self: &Arc<Self>, transport: Arc<dyn Transport>, make_target: F) -> Arc<Connection>
    where
        F: FnOnce() -> Arc<T>,
    {
        let key = transport_key(&transport);
        let target = make_target();
        let conn = Connection::new(transport, self.table.clone(), target);
        self.connections.lock().expect("server mutex poisoned").insert(key, conn.clone());
        conn
    }

    /// Removes a connection from the server's tracking set, e.g. once its
    /// disconnect callback has fired. Does not itself tear the connection
    /// down — call [`Connection::on_disconnected`] for that.
    pub fn forget(&self, transport: &Arc<dyn Transport>) {
        self.connections.lock().expect("server mutex poisoned").remove(&transport_key(transport));
    }

    /// Calls `f` once per currently tracked connection.
    pub fn iterate_clients<F: FnMut(&Arc<Connection>)>(&self, mut f: F) {
        for conn in self.connections.lock().expect("server mutex poisoned").values() {
            f(conn);
        }
    }

    /// Finds the first connection whose user data satisfies `predicate`.
    pub fn find_user_data<D, F>(&self, mut predicate: F) -> Option<Arc<Connection>>
    where
        D: std::any::Any + Clone,
        F: FnMut(&D) -> bool,
    {
        self.connections
            .lock()
            .expect("server mutex poisoned")
            .values()
            .find(|conn| conn.user_data::<D>().is_some_and(|d| predicate(&d)))
            .cloned()
    }

    /// Force-disconnects every tracked connection, e.g. on server shutdown.
    pub fn disconnect_all(&self) {
        let conns: Vec<_> = self.connections.lock().expect("server mutex poisoned").drain().map(|(_, c)| c).collect();
        for conn in conns {
            conn.on_disconnected();
        }
    }

    pub fn disconnect_client(&self, conn: &Arc<Connection>) {
        conn.on_disconnected();
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().expect("server mutex poisoned").len()
    }
}

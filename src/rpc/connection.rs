//! Binds a transport to an out-processor/in-processor pair and exposes the
//! per-connection RPC surface applications and generated stubs call into.
//!
//! The "current connection" ambient value is a `tokio::task_local!` rather
//! than a thread-local: a genuine thread-local doesn't survive a task
//! hopping between worker threads across an `.await`, which is exactly
//! what happens here since every dispatched method is `async`.

use std::any::Any as StdAny;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::any::Any;
use crate::error::RpcError;
use crate::serialize::{Deserialize, Serialize};

use super::header::RpcHeader;
use super::in_processor::InProcessor;
use super::out_processor::OutProcessor;
use super::reply_future::RpcFuture;
use super::table::RpcTable;
use super::transport::Transport;

tokio::task_local! {
    /// Readable crate-wide so [`super::table::RpcTableBuilder::register`] can
    /// re-establish it around the task it spawns per dispatched call — a
    /// task-local set around the *caller's* poll of `on_received_frame`
    /// would not be visible inside a freshly `tokio::spawn`-ed task, since
    /// that task gets its own independent poll context. Scoping again at
    /// the spawn site (same value, re-entered per poll of the spawned
    /// future) is what actually makes it ambient for the dispatched method.
    pub(crate) static CURRENT_CONNECTION: Weak<Connection>;
}

/// A paired out-processor and in-processor bound to one transport and one
/// local handler object (`target`).
pub struct Connection {
    transport: Arc<dyn Transport>,
    out: Arc<OutProcessor>,
    in_processor: Box<dyn Fn(RpcHeader, crate::buffer::ChunkBuffer) + Send + Sync>,
    connected: AtomicBool,
    on_disconnected: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    user_data: Mutex<Option<Box<dyn StdAny + Send + Sync>>>,
}

impl Connection {
    /// Builds a connection bound to `transport`, dispatching inbound
    /// requests against `table` on `target`.
    pub fn new<T: Send + Sync + 'static + ?Sized>(
        transport: Arc<dyn Transport>,
        table: Arc<RpcTable<T>>,
        target: Arc<T>,
    ) -> Arc<Self> {
        let out = OutProcessor::new(transport.clone());
        let in_processor = InProcessor::new(table, target);
        let transport_for_in = transport.clone();
        Arc::new_cyclic(|weak_self| {
            let weak_self = weak_self.clone();
            Connection {
                transport,
                out,
                in_processor: Box::new(move |header, frame| {
                    in_processor.on_incoming(transport_for_in.clone(), weak_self.clone(), header, frame);
                }),
                connected: AtomicBool::new(true),
                on_disconnected: Mutex::new(None),
                user_data: Mutex::new(None),
            }
        })
    }

    /// The connection the currently executing dispatched method was invoked
    /// from, if any — lets a server-side method issue a reverse RPC without
    /// threading the connection through every handler signature.
    pub fn current() -> Option<Arc<Connection>> {
        CURRENT_CONNECTION.try_with(|w| w.upgrade()).ok().flatten()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn set_user_data<D: StdAny + Send + Sync>(&self, data: D) {
        *self.user_data.lock().expect("connection mutex poisoned") = Some(Box::new(data));
    }

    pub fn user_data<D: StdAny + Clone>(&self) -> Option<D> {
        self.user_data.lock().expect("connection mutex poisoned").as_ref().and_then(|d| d.downcast_ref::<D>().cloned())
    }

    /// Stores the callback invoked for reply exceptions and for exceptions
    /// on void calls, which otherwise have no future to observe.
    pub fn set_exception_callback<F: Fn(String) + Send + Sync + 'static>(&self, f: F) {
        self.out.set_exception_callback(f);
    }

    /// Stores the callback invoked exactly once on connected -> disconnected.
    pub fn set_on_disconnected<F: FnOnce() + Send + 'static>(&self, f: F) {
        *self.on_disconnected.lock().expect("connection mutex poisoned") = Some(Box::new(f));
    }

    pub fn call<P, R>(self: &Arc<Self>, rpcid: u8, params: &P) -> Result<RpcFuture<R>, RpcError>
    where
        P: Serialize,
        R: Deserialize + Send + 'static,
    {
        self.out.call(rpcid, params)
    }

    pub fn call_void<P: Serialize>(self: &Arc<Self>, rpcid: u8, params: &P) -> Result<RpcFuture<()>, RpcError> {
        self.out.call_void(rpcid, params)
    }

    pub fn call_generic(self: &Arc<Self>, name: &str, params: Vec<Any>) -> Result<RpcFuture<Any>, RpcError> {
        self.out.call_generic(name, params)
    }

    /// Dispatch path for one inbound frame: replies are routed to the
    /// out-processor; requests are routed to the in-processor, which carries
    /// this connection's weak reference down to wherever the method's task
    /// actually gets spawned.
    pub async fn on_received_frame(self: &Arc<Self>, header: RpcHeader, mut frame: crate::buffer::ChunkBuffer) {
        if header.is_reply() {
            self.out.on_incoming(&header, &mut frame);
            return;
        }
        // Decoding and dispatch happen synchronously here (a decode failure
        // replies inline); a successfully decoded call's actual method
        // invocation is spawned as its own task by the table, scoped with
        // the current connection at the spawn site — see the note on
        // `CURRENT_CONNECTION` above.
        (self.in_processor)(header, frame);
    }

    /// Drives the connected -> disconnected transition. Idempotent — only
    /// the first call has any effect, so the disconnect callback fires
    /// exactly once.
    pub fn on_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            if let Some(cb) = self.on_disconnected.lock().expect("connection mutex poisoned").take() {
                cb();
            }
            self.out.shutdown();
        }
    }
}

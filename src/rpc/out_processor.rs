//! Caller-side half of a connection: allocates reply keys, sends frames,
//! parks promises, matches replies, and routes exceptions.
//!
//! The reply map is a `Mutex<HashMap<u32, ReplyHandler>>` keyed by
//! [`RpcHeader::key`]; dropping every entry on [`OutProcessor::shutdown`]
//! resolves their promises to broken-promise automatically, for free,
//! through [`crate::future::Promise`]'s own drop semantics — no separate
//! "break everything" loop is needed beyond clearing the map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::any::Any;
use crate::error::RpcError;
use crate::serialize::{Deserialize, Serialize};

use super::header::RpcHeader;
use super::reply_future::{RpcFuture, RpcPromise};

/// 22-bit wire counter's logical range. A caller with this many calls
/// already in flight on one connection is refused a new one rather than
/// risking a wrapped counter silently reusing a still-live key.
const MAX_IN_FLIGHT: usize = 1 << 22;

type ReplyHandler = Box<dyn FnOnce(&RpcHeader, &mut crate::buffer::ChunkBuffer) + Send>;

pub struct OutProcessor {
    transport: Arc<dyn super::transport::Transport>,
    next_counter: AtomicU32,
    replies: Mutex<HashMap<u32, ReplyHandler>>,
    exception_callback: Mutex<Option<Box<dyn Fn(String) + Send + Sync>>>,
}

impl OutProcessor {
    pub fn new(transport: Arc<dyn super::transport::Transport>) -> Arc<Self> {
        Arc::new(OutProcessor {
            transport,
            next_counter: AtomicU32::new(0),
            replies: Mutex::new(HashMap::new()),
            exception_callback: Mutex::new(None),
        })
    }

    pub fn set_exception_callback<F: Fn(String) + Send + Sync + 'static>(&self, f: F) {
        *self.exception_callback.lock().expect("out-processor mutex poisoned") = Some(Box::new(f));
    }

    fn next_counter(&self) -> u32 {
        self.next_counter.fetch_add(1, Ordering::Relaxed) & 0x3F_FFFF
    }

    /// Issues a typed call expecting a reply (`hasReturnValue == true`).
    pub fn call<P, R>(self: &Arc<Self>, rpcid: u8, params: &P) -> Result<RpcFuture<R>, RpcError>
    where
        P: Serialize,
        R: Deserialize + Send + 'static,
    {
        let counter = self.next_counter();
        let header = RpcHeader::request(rpcid, counter);

        let promise: RpcPromise<R> = RpcPromise::new();
        let future = promise.get_future();
        self.install(header.key(), move |hdr, frame| {
            if hdr.success() {
                match R::deserialize(frame) {
                    Ok(v) => {
                        let _ = promise.set_value(Ok(v));
                    }
                    Err(e) => {
                        let _ = promise.set_value(Err(e));
                    }
                }
            } else {
                let msg = String::deserialize(frame).unwrap_or_else(|_| "malformed error reply".to_string());
                let _ = promise.set_value(Err(RpcError::MethodFailed(msg)));
            }
        })?;

        if let Err(e) = self.send_request(header, params) {
            self.replies.lock().expect("out-processor mutex poisoned").remove(&header.key());
            return Err(e);
        }

        Ok(future)
    }

    /// Issues a call to a `void` method (`hasReturnValue == false`):
    /// resolves immediately on successful send and never installs a reply
    /// entry. A failure reply arriving later (the method threw) then finds
    /// no entry for its key and is routed to the exception callback instead
    /// — see [`OutProcessor::on_incoming`].
    pub fn call_void<P: Serialize>(&self, rpcid: u8, params: &P) -> Result<RpcFuture<()>, RpcError> {
        let counter = self.next_counter();
        let header = RpcHeader::request(rpcid, counter);
        self.send_request(header, params)?;
        Ok(RpcFuture::ready(Ok(())))
    }

    /// Issues a generic (name-dispatched) call.
    pub fn call_generic(self: &Arc<Self>, name: &str, params: Vec<Any>) -> Result<RpcFuture<Any>, RpcError> {
        let counter = self.next_counter();
        let header = RpcHeader::request(super::header::RPCID_GENERIC, counter);

        let promise: RpcPromise<Any> = RpcPromise::new();
        let future = promise.get_future();
        self.install(header.key(), move |hdr, frame| {
            if hdr.success() {
                match Any::read_from(frame) {
                    Ok(v) => {
                        let _ = promise.set_value(Ok(v));
                    }
                    Err(e) => {
                        let _ = promise.set_value(Err(e));
                    }
                }
            } else {
                let msg = String::deserialize(frame).unwrap_or_else(|_| "malformed error reply".to_string());
                let _ = promise.set_value(Err(RpcError::MethodFailed(msg)));
            }
        })?;

        let payload = (name.to_string(), params);
        if let Err(e) = self.send_request(header, &payload) {
            self.replies.lock().expect("out-processor mutex poisoned").remove(&header.key());
            return Err(e);
        }

        Ok(future)
    }

    fn install<F>(&self, key: u32, handler: F) -> Result<(), RpcError>
    where
        F: FnOnce(&RpcHeader, &mut crate::buffer::ChunkBuffer) + Send + 'static,
    {
        let mut replies = self.replies.lock().expect("out-processor mutex poisoned");
        if replies.len() >= MAX_IN_FLIGHT {
            return Err(RpcError::TooManyInFlightCalls);
        }
        replies.insert(key, Box::new(handler));
        Ok(())
    }

    fn send_request<P: Serialize>(&self, header: RpcHeader, params: &P) -> Result<(), RpcError> {
        let mut w = super::transport::FrameWriter::new();
        w.write_header(header);
        params.serialize(w.body_mut());
        let frame = w.finish();
        let transport = self.transport.clone();
        // The transport's own send is async; the processor's call sites are
        // synchronous (building and handing off a future), so the send is
        // fire-and-forget here and its failure surfaces as a disconnect.
        tokio::spawn(async move {
            if let Err(e) = transport.send(frame).await {
                tracing::error!("failed to send RPC request: {e}");
            }
        });
        Ok(())
    }

    /// Routes an inbound reply frame: matches it to a parked promise by key,
    /// or — if nothing is waiting on that key (a void call, or a stale
    /// reply after the caller gave up) — reports a failure reply to the
    /// exception callback.
    pub fn on_incoming(&self, header: &RpcHeader, frame: &mut crate::buffer::ChunkBuffer) {
        let handler = self.replies.lock().expect("out-processor mutex poisoned").remove(&header.key());
        match handler {
            Some(handler) => handler(header, frame),
            None => {
                if !header.success() {
                    let msg = String::deserialize(frame).unwrap_or_else(|_| "malformed error reply".to_string());
                    let cb = self.exception_callback.lock().expect("out-processor mutex poisoned");
                    if let Some(cb) = cb.as_ref() {
                        cb(msg);
                    }
                }
            }
        }
    }

    /// Drops every pending reply entry, which resolves each entry's future
    /// to broken-promise via `Promise`'s own drop semantics.
    pub fn shutdown(&self) {
        self.replies.lock().expect("out-processor mutex poisoned").clear();
    }
}

//! The callee-side handle a dispatched method's completion writes its
//! reply frame through.
//!
//! A [`ReplySink`] is consumed exactly once per dispatch: a decode failure
//! calls [`ReplySink::send_err`] synchronously; a successfully decoded call
//! hands the sink into the spawned task that awaits the method and calls
//! [`send_value`](ReplySink::send_value)/[`send_any`](ReplySink::send_any)
//! (typed and generic replies respectively) or `send_err` on completion.

use std::sync::Arc;

use crate::serialize::Serialize;

use super::header::RpcHeader;
use super::transport::{FrameWriter, Transport};

pub struct ReplySink {
    transport: Arc<dyn Transport>,
    has_return_value: bool,
    rpcid: u8,
    counter: u32,
}

impl ReplySink {
    pub(crate) fn new(transport: Arc<dyn Transport>, has_return_value: bool, rpcid: u8, counter: u32) -> Self {
        ReplySink { transport, has_return_value, rpcid, counter }
    }

    /// Writes a successful reply carrying `value`. A no-op for a `void`
    /// method (`has_return_value == false`) — the dispatcher writes nothing
    /// at all on a void success, only on failure.
    pub fn send_value<R: Serialize>(self, value: &R) {
        if !self.has_return_value {
            return;
        }
        let mut w = FrameWriter::new();
        w.write_header(RpcHeader::reply(self.rpcid, self.counter, true));
        value.serialize(w.body_mut());
        Self::spawn_send(self.transport, w.finish());
    }

    /// Writes a successful generic reply carrying an [`crate::any::Any`].
    pub fn send_any(self, value: crate::any::Any) {
        if !self.has_return_value {
            return;
        }
        let mut w = FrameWriter::new();
        w.write_header(RpcHeader::reply(self.rpcid, self.counter, true));
        value.write_to(w.body_mut());
        Self::spawn_send(self.transport, w.finish());
    }

    /// Writes a failure reply carrying `message`. Always sent, void or not —
    /// this is the only signal a failed void call gives its caller, routed
    /// through the connection's exception callback since there is no future
    /// observing a void call.
    pub fn send_err(self, message: String) {
        let mut w = FrameWriter::new();
        w.write_header(RpcHeader::reply(self.rpcid, self.counter, false));
        message.serialize(w.body_mut());
        Self::spawn_send(self.transport, w.finish());
    }

    fn spawn_send(transport: Arc<dyn Transport>, frame: Vec<u8>) {
        tokio::spawn(async move {
            if let Err(e) = transport.send(frame).await {
                tracing::error!("failed to send RPC reply: {e}");
            }
        });
    }
}

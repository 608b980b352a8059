//! Per-interface RPC table: an ordered, immutable sequence of method
//! descriptors indexed by `rpcid`, built once via [`RpcTable::builder`].
//!
//! Index 0 is always the built-in generic (name-dispatched) entry, indices
//! 1..N are user methods in declaration order, fixed by an explicit
//! registration call per method rather than generated by a macro — in the
//! same spirit as hand-matching program numbers instead of building a jump
//! table.
//!
//! Compile-time validation of a method's signature falls out of the trait
//! bounds on [`RpcTableBuilder::register`]: a parameter or return type that
//! isn't `Serialize`/`Deserialize`/`ToTuple`/`Into<Any>` as required simply
//! fails to type-check.

use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;

use crate::any::{Any, ToTuple};
use crate::error::RpcError;
use crate::serialize::{Deserialize, Serialize};

use super::connection::{Connection, CURRENT_CONNECTION};
use super::header::RPCID_GENERIC;
use super::reply_sink::ReplySink;

type DecodeAndDispatch<T> =
    Box<dyn Fn(Arc<T>, &mut crate::buffer::ChunkBuffer, ReplySink, Weak<Connection>) + Send + Sync>;
type GenericDispatch<T> = Box<dyn Fn(Arc<T>, &[Any], ReplySink, Weak<Connection>) + Send + Sync>;

struct RpcDescriptor<T: ?Sized> {
    name: &'static str,
    param_count: usize,
    has_return_value: bool,
    decode_and_dispatch: DecodeAndDispatch<T>,
    generic_dispatch: GenericDispatch<T>,
}

/// An immutable, per-interface binding of numeric `rpcid`s to descriptors.
/// Built once per interface type and shared freely across connections.
pub struct RpcTable<T: ?Sized> {
    descriptors: Vec<RpcDescriptor<T>>,
}

impl<T: Send + Sync + 'static + ?Sized> RpcTable<T> {
    pub fn builder() -> RpcTableBuilder<T> {
        RpcTableBuilder { descriptors: Vec::new() }
    }

    /// Total descriptor count including the reserved generic entry at 0.
    pub fn len(&self) -> usize {
        self.descriptors.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Looks up the `rpcid` a method was registered under, by name — used
    /// to build typed client stubs without hard-coding registration order.
    pub fn rpcid_of(&self, name: &str) -> Option<u8> {
        self.descriptors.iter().position(|d| d.name == name).map(|i| (i + 1) as u8)
    }

    pub fn has_return_value(&self, rpcid: u8) -> Option<bool> {
        if rpcid == RPCID_GENERIC {
            return None;
        }
        self.descriptors.get(rpcid as usize - 1).map(|d| d.has_return_value)
    }

    /// Decodes parameters for `rpcid` from `frame` and dispatches to
    /// `target`, consuming `reply` exactly once — either synchronously (for
    /// a decode error) or from the spawned task that awaits the method.
    /// `connection` is re-scoped as the "current connection" around that
    /// spawned task so the method can issue a reverse call.
    pub fn dispatch(
        &self,
        rpcid: u8,
        target: Arc<T>,
        frame: &mut crate::buffer::ChunkBuffer,
        reply: ReplySink,
        connection: Weak<Connection>,
    ) {
        if rpcid == RPCID_GENERIC {
            self.dispatch_generic(target, frame, reply, connection);
            return;
        }
        match self.descriptors.get(rpcid as usize - 1) {
            Some(d) => (d.decode_and_dispatch)(target, frame, reply, connection),
            None => reply.send_err(RpcError::UnknownRpc(format!("id {rpcid}")).to_string()),
        }
    }

    fn dispatch_generic(
        &self,
        target: Arc<T>,
        frame: &mut crate::buffer::ChunkBuffer,
        reply: ReplySink,
        connection: Weak<Connection>,
    ) {
        let name = match String::deserialize(frame) {
            Ok(n) => n,
            Err(_) => {
                reply.send_err(RpcError::InvalidParameters.to_string());
                return;
            }
        };
        let params = match Vec::<Any>::deserialize(frame) {
            Ok(p) => p,
            Err(_) => {
                reply.send_err(RpcError::InvalidParameters.to_string());
                return;
            }
        };
        match self.descriptors.iter().find(|d| d.name == name) {
            None => reply.send_err(RpcError::UnknownRpc(name).to_string()),
            Some(d) => (d.generic_dispatch)(target, &params, reply, connection),
        }
    }
}

/// Accumulates descriptors in registration order; registration order must
/// match across every process instance sharing this table, since the wire
/// encoding (`rpcid`) depends on it.
pub struct RpcTableBuilder<T: ?Sized> {
    descriptors: Vec<RpcDescriptor<T>>,
}

impl<T: Send + Sync + 'static + ?Sized> RpcTableBuilder<T> {
    /// Registers one method. `has_return_value` controls whether a
    /// successful dispatch writes a reply at all: void methods write
    /// nothing on success, but still reply on failure so the caller's
    /// exception callback can observe it.
    pub fn register<P, R, F, Fut>(mut self, name: &'static str, has_return_value: bool, method: F) -> Self
    where
        P: Deserialize + ToTuple + Send + 'static,
        R: Serialize + Into<Any> + Send + 'static,
        F: Fn(Arc<T>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, anyhow::Error>> + Send + 'static,
    {
        assert!(self.descriptors.len() < u8::MAX as usize, "too many methods registered for an 8-bit rpcid");
        let method = Arc::new(method);

        let m = method.clone();
        let decode_and_dispatch: DecodeAndDispatch<T> = Box::new(move |target, frame, reply, connection| {
            let params = match P::deserialize(frame) {
                Ok(p) => p,
                Err(e) => {
                    reply.send_err(e.to_string());
                    return;
                }
            };
            let m = m.clone();
            let work: BoxFuture<'static, ()> = Box::pin(async move {
                match m(target, params).await {
                    Ok(value) => reply.send_value(&value),
                    Err(e) => reply.send_err(e.to_string()),
                }
            });
            tokio::spawn(CURRENT_CONNECTION.scope(connection, work));
        });

        let m = method.clone();
        let generic_dispatch: GenericDispatch<T> = Box::new(move |target, values, reply, connection| {
            let params = match P::to_tuple(values) {
                Some(p) => p,
                None => {
                    reply.send_err(RpcError::InvalidParameters.to_string());
                    return;
                }
            };
            let m = m.clone();
            let work: BoxFuture<'static, ()> = Box::pin(async move {
                match m(target, params).await {
                    Ok(value) => reply.send_any(value.into()),
                    Err(e) => reply.send_err(e.to_string()),
                }
            });
            tokio::spawn(CURRENT_CONNECTION.scope(connection, work));
        });

        self.descriptors.push(RpcDescriptor {
            name,
            param_count: P::ARITY,
            has_return_value,
            decode_and_dispatch,
            generic_dispatch,
        });
        self
    }

    pub fn build(self) -> RpcTable<T> {
        RpcTable { descriptors: self.descriptors }
    }
}

/// Read-only view of a descriptor's shape, exposed for diagnostics/tests.
pub struct DescriptorInfo {
    pub name: &'static str,
    pub param_count: usize,
    pub has_return_value: bool,
}

impl<T: Send + Sync + 'static + ?Sized> RpcTable<T> {
    pub fn describe(&self, rpcid: u8) -> Option<DescriptorInfo> {
        if rpcid == RPCID_GENERIC {
            return None;
        }
        self.descriptors.get(rpcid as usize - 1).map(|d| DescriptorInfo {
            name: d.name,
            param_count: d.param_count,
            has_return_value: d.has_return_value,
        })
    }
}

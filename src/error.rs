//! Typed errors for the concurrency and RPC layers.
//!
//! Wire-level and transport failures are reported as `anyhow::Error`; call
//! sites that need to match on a specific reason — a broken promise, an
//! unknown generic RPC name — get a plain enum with a hand-written
//! `Display` instead of a derived one.

use std::fmt;

/// Errors a [`crate::future::Future`]/[`crate::future::Promise`] pair can
/// resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureError {
    /// Every `Promise` for this cell was dropped before a value was set.
    BrokenPromise,
    /// `set_value`/`set_exception` called on a cell that already has one.
    PromiseAlreadySatisfied,
    /// `Promise::get_future` called twice, or on a promise with no state.
    NoState,
}

impl fmt::Display for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FutureError::BrokenPromise => "broken promise",
            FutureError::PromiseAlreadySatisfied => "promise already satisfied",
            FutureError::NoState => "future/promise has no shared state",
        };
        write!(f, "{msg}")
    }
}

impl std::error::Error for FutureError {}

/// Errors surfaced by the RPC layer (table lookup, dispatch, processors).
#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    /// A future's producers all dropped without a value being set.
    BrokenPromise,
    /// A generic call named a method not present in the target's table.
    UnknownRpc(String),
    /// A generic call's `Vec<Any>` didn't match the target method's arity
    /// or element types.
    InvalidParameters,
    /// Out-processor refused a new call because too many are in flight on
    /// this connection (process-local guard on the 22-bit wire counter).
    TooManyInFlightCalls,
    /// A dispatched method returned/threw an application-level failure;
    /// carries the message the method supplied.
    MethodFailed(String),
    /// The connection backing a call or a pending reply was torn down.
    Disconnected,
    /// A read underran the buffered bytes available (chunk-buffer or frame
    /// decode boundary).
    NoData,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::BrokenPromise => write!(f, "broken promise"),
            RpcError::UnknownRpc(name) => write!(f, "Unknown RPC ({name})"),
            RpcError::InvalidParameters => write!(f, "Invalid parameter count or types"),
            RpcError::TooManyInFlightCalls => write!(f, "too many in-flight calls on this connection"),
            RpcError::MethodFailed(msg) => write!(f, "{msg}"),
            RpcError::Disconnected => write!(f, "connection disconnected"),
            RpcError::NoData => write!(f, "chunk buffer underrun"),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<FutureError> for RpcError {
    fn from(e: FutureError) -> Self {
        match e {
            FutureError::BrokenPromise => RpcError::BrokenPromise,
            FutureError::PromiseAlreadySatisfied | FutureError::NoState => {
                RpcError::MethodFailed(e.to_string())
            }
        }
    }
}

impl From<crate::buffer::NoData> for RpcError {
    fn from(_: crate::buffer::NoData) -> Self {
        RpcError::NoData
    }
}

//! crazyrpc - an asynchronous RPC framework over a custom TCP wire protocol
//!
//! This crate lets two peers expose typed methods to each other over a
//! plain TCP socket: register a set of methods once into an [`rpc::RpcTable`],
//! accept or initiate a connection, and call through a generated client
//! stub (or the untyped, name-dispatched path) to get back an
//! [`rpc::RpcFuture`] that resolves with the callee's return value or an
//! [`error::RpcError`].
//!
//! ## Main components
//!
//! - `rpc`: the RPC runtime — wire header, typed method table, the
//!   out-processor/in-processor pair that drives calls and dispatch, the
//!   per-socket `Connection`, and the `Server` that accepts and tracks them.
//!   Depends only on the `Transport` trait, not on any concrete socket type.
//!
//! - `tcp`: the TCP binding for `rpc` — a listener/acceptor pair and the
//!   length-prefixed frame reader/writer that turns a `TcpStream` into a
//!   `rpc::Transport`.
//!
//! - `any`: the tagged-union value type used for name-dispatched (generic)
//!   calls, with conversions to and from Rust's native types and tuples.
//!
//! - `buffer`: a chained, fixed-capacity byte buffer (`ChunkBuffer`) with a
//!   reserve/patch mechanism for writing a length prefix before its value
//!   is known.
//!
//! - `serialize`: `Serialize`/`Deserialize` over `ChunkBuffer` for the
//!   scalar, string, and tuple types RPC parameters and return values are
//!   built from.
//!
//! - `future`: a minimal single-assignment future/promise pair with
//!   broken-promise semantics on an abandoned call, underlying `rpc::RpcFuture`.
//!
//! - `sync`: connection-adjacent concurrency primitives (a cancellable
//!   timer queue, a bounded work queue, a zero-counting semaphore) used by
//!   the RPC runtime and the TCP transport.
//!
//! - `error`: the crate's two error types, `future::FutureError` and
//!   `error::RpcError`.

pub mod any;
pub mod buffer;
pub mod error;
pub mod future;
pub mod rpc;
pub mod serialize;
pub mod sync;
pub mod tcp;

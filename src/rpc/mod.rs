//! The RPC runtime: wire header, typed table, out/in-processor pair,
//! connection, and server, built on the leaf primitives at the crate root
//! (`crate::buffer`, `crate::any`, `crate::serialize`, `crate::future`,
//! `crate::sync`).
//!
//! The transport this module dispatches through is an abstraction
//! ([`transport::Transport`]); the only concrete implementation is
//! [`crate::tcp`], which depends on this module's public surface only.

pub mod connection;
pub mod header;
pub mod in_processor;
pub mod out_processor;
pub mod reply_future;
pub mod reply_sink;
pub mod server;
pub mod table;
pub mod transport;

pub use connection::Connection;
pub use header::{RpcHeader, RPCID_GENERIC};
pub use reply_future::{RpcFuture, RpcFutureExt};
pub use server::Server;
pub use table::{RpcTable, RpcTableBuilder};
pub use transport::{FrameWriter, Transport};

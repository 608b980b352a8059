//! The TCP binding for the RPC runtime in [`crate::rpc`].
//!
//! A listener that binds eagerly and accepts lazily, one task pair (read
//! loop + write loop) per connection, with frame reassembly pulled out
//! into its own module (`frame.rs`) separate from the socket plumbing.

pub mod client;
pub mod frame;
pub mod listener;
pub mod transport;

pub use client::{connect, connect_with_buffer_size};
pub use listener::RpcTcpListener;
pub use transport::TcpTransport;

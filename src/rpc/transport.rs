//! The transport abstraction the RPC layer sends frames through and
//! receives framed bytes from.
//!
//! `prepareSend`/`send` go upward from the connection into the transport;
//! `onReceivedData`/`onDisconnected` go downward from the transport into the
//! connection. The only implementation in this crate is
//! [`crate::tcp::transport::TcpTransport`]; the trait exists so the
//! processors and `Connection` never depend on sockets directly.

use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian};

use crate::buffer::{ChunkBuffer, WritePos};

/// A length-prefixed frame under construction: the 4-byte length is
/// reserved up front (its value isn't known until the header and payload
/// have been written) and patched in by [`FrameWriter::finish`].
pub struct FrameWriter {
    buf: ChunkBuffer,
    length_pos: WritePos,
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter {
    pub fn new() -> Self {
        let mut buf = ChunkBuffer::new();
        let length_pos = buf.reserve(4);
        FrameWriter { buf, length_pos }
    }

    pub fn write_header(&mut self, header: super::header::RpcHeader) {
        self.buf.write_pod(header.to_bits());
    }

    /// The buffer the frame body (header + payload) is written into.
    pub fn body_mut(&mut self) -> &mut ChunkBuffer {
        &mut self.buf
    }

    /// Patches the length prefix and returns the complete frame, ready to
    /// hand to a [`Transport::send`].
    ///
    /// The length prefix is **little-endian** regardless of the
    /// native-endian payload — the two peers share a binary for the body,
    /// but the prefix is parsed before either side knows anything about the
    /// other, so it's pinned to a fixed byte order.
    pub fn finish(mut self) -> Vec<u8> {
        let body_len = (self.buf.len() - 4) as u32;
        let mut prefix = [0u8; 4];
        LittleEndian::write_u32(&mut prefix, body_len);
        self.buf.write_at(self.length_pos, &prefix);
        self.buf.to_vec()
    }
}

/// Byte-level collaborator that delivers framed messages in order between
/// two connections. A transport owns nothing about RPC semantics — it only
/// guarantees that `send` emits exactly one length-prefixed frame and that
/// bytes handed to the owning connection via `on_received_data` preserve
/// order.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one already-length-prefixed frame, as produced by
    /// [`FrameWriter::finish`]. Must not interleave bytes from two
    /// concurrent calls to `send` on the wire.
    async fn send(&self, frame: Vec<u8>) -> Result<(), anyhow::Error>;
}

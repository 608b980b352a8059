//! Reassembles length-prefixed RPC frames off a byte stream.
//!
//! Reads a fixed-size length prefix, then reads exactly that many more
//! bytes. One length prefix covers the whole frame, so there is no
//! fragment-continuation loop — just "read header, then read body".

use byteorder::{ByteOrder, LittleEndian};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::buffer::ChunkBuffer;
use crate::rpc::RpcHeader;

/// Bytes accumulated from the socket that haven't formed a complete frame
/// yet, plus whatever has been read of the next one.
pub struct FrameReader {
    pending: Vec<u8>,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        FrameReader { pending: Vec::new() }
    }

    /// Appends freshly read bytes and returns every complete frame now
    /// available, each as `(header, body)` with the body positioned right
    /// after the header (ready for parameter/reply decoding). Mirrors
    /// `hasFullRPC`: a frame is only drained once its full length-prefixed
    /// body has arrived.
    pub fn feed(&mut self, data: &[u8]) -> Vec<(RpcHeader, ChunkBuffer)> {
        self.pending.extend_from_slice(data);
        let mut frames = Vec::new();
        loop {
            if self.pending.len() < 4 {
                break;
            }
            let body_len = LittleEndian::read_u32(&self.pending[0..4]) as usize;
            if self.pending.len() < 4 + body_len {
                break;
            }
            let frame_end = 4 + body_len;
            let body = self.pending[4..frame_end].to_vec();
            self.pending.drain(..frame_end);

            if body.len() < 4 {
                tracing::warn!("dropping undersized RPC frame ({} bytes body)", body.len());
                continue;
            }
            let header = RpcHeader::from_bits(u32::from_ne_bytes(body[0..4].try_into().expect("checked len")));
            let mut buf = ChunkBuffer::new();
            buf.write(&body[4..]);
            frames.push((header, buf));
        }
        frames
    }
}

/// Reads one byte chunk from `reader` into a reusable scratch buffer,
/// returning `Ok(0)` on graceful peer close (mapped to *disconnected* by the
/// caller) and propagating any other I/O error.
pub async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, scratch: &mut [u8]) -> std::io::Result<usize> {
    reader.read(scratch).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_a_frame_split_across_two_feeds() {
        let mut reader = FrameReader::new();
        let header = RpcHeader::request(1, 7);
        let mut body = header.to_bits().to_ne_bytes().to_vec();
        body.extend_from_slice(b"payload");
        let mut wire = (body.len() as u32).to_le_bytes().to_vec();
        wire.extend_from_slice(&body);

        let mid = wire.len() / 2;
        assert!(reader.feed(&wire[..mid]).is_empty());
        let frames = reader.feed(&wire[mid..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0.rpcid(), 1);
        assert_eq!(frames[0].0.counter(), 7);
        assert_eq!(frames[0].1.to_vec(), b"payload");
    }

    #[test]
    fn drains_multiple_frames_from_one_feed() {
        let mut reader = FrameReader::new();
        let mut wire = Vec::new();
        for counter in 0..3u32 {
            let header = RpcHeader::request(2, counter);
            let mut body = header.to_bits().to_ne_bytes().to_vec();
            body.push(counter as u8);
            wire.extend_from_slice(&(body.len() as u32).to_le_bytes());
            wire.extend_from_slice(&body);
        }
        let frames = reader.feed(&wire);
        assert_eq!(frames.len(), 3);
        for (i, (header, _)) in frames.iter().enumerate() {
            assert_eq!(header.counter(), i as u32);
        }
    }
}

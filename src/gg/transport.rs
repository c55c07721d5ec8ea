// Frame transport
// Reassembles the raw TCP byte stream into complete frames.

use log::{debug, warn};

use super::consts::GG_HEADER_LEN;
use crate::error::{GGError, Result};

/// A complete frame cut from the stream, payload not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub packet_type: u32,
    pub payload: Vec<u8>,
}

/// Accumulates socket bytes and yields whole frames in arrival order.
///
/// A header announcing more than `max_payload` bytes poisons the receiver:
/// the error is returned and every later call keeps failing, since the stream
/// can no longer be resynchronised.
pub struct FrameReceiver {
    buffer: Vec<u8>,
    max_payload: u32,
    poisoned: Option<u32>,
}

impl FrameReceiver {
    pub fn new(max_payload: u32) -> Self {
        FrameReceiver {
            buffer: Vec::with_capacity(8192),
            max_payload,
            poisoned: None,
        }
    }

    /// Append bytes as they arrive.
    pub fn push(&mut self, bytes: &[u8]) {
        if self.poisoned.is_none() {
            self.buffer.extend_from_slice(bytes);
        }
    }

    /// Bytes buffered but not yet emitted.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete frame, if one is fully buffered.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if let Some(length) = self.poisoned {
            return Err(GGError::FrameTooLarge {
                length,
                max: self.max_payload,
            });
        }
        if self.buffer.len() < GG_HEADER_LEN {
            return Ok(None);
        }

        let packet_type = u32::from_le_bytes([self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]]);
        let length = u32::from_le_bytes([self.buffer[4], self.buffer[5], self.buffer[6], self.buffer[7]]);
        if length > self.max_payload {
            warn!(
                "Peer announced frame {:#x} with {} bytes, limit is {}",
                packet_type, length, self.max_payload
            );
            self.poisoned = Some(length);
            self.buffer.clear();
            return Err(GGError::FrameTooLarge {
                length,
                max: self.max_payload,
            });
        }

        let total = GG_HEADER_LEN + length as usize;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let payload = self.buffer[GG_HEADER_LEN..total].to_vec();
        self.buffer.drain(..total);
        debug!("Frame {:#x} with {} payload bytes reassembled", packet_type, length);
        Ok(Some(RawFrame { packet_type, payload }))
    }

    /// Push a chunk and collect every frame it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<RawFrame>> {
        self.push(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gg::packets::frame;

    fn sample_stream() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(frame(0x01, &42u32.to_le_bytes()));
        bytes.extend(frame(0x07, &[]));
        bytes.extend(frame(0x2e, &(0u8..=200).collect::<Vec<u8>>()));
        bytes.extend(frame(0x35, &[9, 9, 9]));
        bytes
    }

    fn collect_in_chunks(bytes: &[u8], chunk: usize) -> Vec<RawFrame> {
        let mut receiver = FrameReceiver::new(1024);
        let mut frames = Vec::new();
        for piece in bytes.chunks(chunk) {
            frames.extend(receiver.feed(piece).unwrap());
        }
        assert_eq!(receiver.buffered(), 0);
        frames
    }

    #[test]
    fn test_chunking_does_not_change_frames() {
        let bytes = sample_stream();
        let whole = collect_in_chunks(&bytes, bytes.len());
        assert_eq!(whole.len(), 4);
        assert_eq!(whole[0].packet_type, 0x01);
        assert!(whole[1].payload.is_empty());
        assert_eq!(whole[2].payload.len(), 201);

        for chunk in [1, 2, 3, 5, 7, 8, 13, 64] {
            assert_eq!(collect_in_chunks(&bytes, chunk), whole, "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_partial_header_is_kept() {
        let mut receiver = FrameReceiver::new(1024);
        let bytes = frame(0x07, &[1, 2]);
        assert!(receiver.feed(&bytes[..5]).unwrap().is_empty());
        assert_eq!(receiver.buffered(), 5);
        let frames = receiver.feed(&bytes[5..]).unwrap();
        assert_eq!(frames, vec![RawFrame { packet_type: 0x07, payload: vec![1, 2] }]);
    }

    #[test]
    fn test_oversized_frame_is_fatal() {
        let mut receiver = FrameReceiver::new(16);
        let mut bytes = frame(0x01, &[0u8; 4]);
        bytes.extend_from_slice(&0x2eu32.to_le_bytes());
        bytes.extend_from_slice(&17u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 17]);

        receiver.push(&bytes);
        assert!(receiver.next_frame().unwrap().is_some());
        match receiver.next_frame() {
            Err(GGError::FrameTooLarge { length, max }) => {
                assert_eq!(length, 17);
                assert_eq!(max, 16);
            }
            other => panic!("expected FrameTooLarge, got {:?}", other),
        }

        // stays broken, never yields the oversized payload
        receiver.push(&frame(0x07, &[]));
        assert!(receiver.next_frame().is_err());
        assert_eq!(receiver.buffered(), 0);
    }

    #[test]
    fn test_oversized_header_rejected_before_payload_arrives() {
        let mut receiver = FrameReceiver::new(1024);
        let mut header = 0x2eu32.to_le_bytes().to_vec();
        header.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(receiver.feed(&header).is_err());
    }
}

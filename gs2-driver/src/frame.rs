use crate::constants::{HEADER_SIZE, SYNC_BYTE, SYNC_LEN};

/// Fixed-size frame header following the four-byte sync marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub address: u8,
    pub frame_type: u8,
    pub payload_len: u16,
}

/// Incremental header synchronizer.
///
/// Feed bytes in stream order; the machine matches four identical sync
/// bytes, then collects address, type and little-endian length. Any byte
/// that breaks the sync sequence, or a type byte differing from the armed
/// expectation, resets the match position to zero. There is no partial-match
/// carry-over, so the reader self-heals after corruption or mid-frame
/// drops.
pub(crate) struct FrameSync {
    pos: usize,
    expected_type: Option<u8>,
    address: u8,
    frame_type: u8,
    len: [u8; 2],
}

impl FrameSync {
    /// Accepts any frame type; callers validate the header afterwards.
    pub(crate) fn new() -> Self {
        FrameSync {
            pos: 0,
            expected_type: None,
            address: 0,
            frame_type: 0,
            len: [0; 2],
        }
    }

    /// Rejects, mid-stream, any header whose type byte differs from
    /// `frame_type`.
    pub(crate) fn expecting(frame_type: u8) -> Self {
        FrameSync {
            expected_type: Some(frame_type),
            ..FrameSync::new()
        }
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    /// Number of bytes still needed to complete a header, assuming no
    /// further resynchronization.
    pub(crate) fn pending(&self) -> usize {
        HEADER_SIZE - self.pos
    }

    /// Consumes one byte. Returns the completed header once all eight
    /// header bytes matched.
    pub(crate) fn push(&mut self, byte: u8) -> Option<FrameHeader> {
        match self.pos {
            0..=3 => {
                debug_assert!(self.pos < SYNC_LEN);
                if byte != SYNC_BYTE {
                    self.reset();
                    return None;
                }
            }
            4 => self.address = byte,
            5 => {
                if let Some(expected) = self.expected_type {
                    if byte != expected {
                        self.reset();
                        return None;
                    }
                }
                self.frame_type = byte;
            }
            6 => self.len[0] = byte,
            _ => self.len[1] = byte,
        }
        self.pos += 1;

        if self.pos == HEADER_SIZE {
            self.reset();
            return Some(FrameHeader {
                address: self.address,
                frame_type: self.frame_type,
                payload_len: u16::from_le_bytes(self.len),
            });
        }
        None
    }

    /// Consumes a whole chunk, returning the first completed header.
    pub(crate) fn advance(&mut self, chunk: &[u8]) -> Option<FrameHeader> {
        for &byte in chunk {
            if let Some(header) = self.push(byte) {
                return Some(header);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(address: u8, frame_type: u8, len: u16) -> Vec<u8> {
        let mut bytes = vec![SYNC_BYTE; 4];
        bytes.push(address);
        bytes.push(frame_type);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes
    }

    #[test]
    fn test_header_after_leading_noise() {
        let mut sync = FrameSync::new();
        let mut stream = vec![0x00, 0x3F, SYNC_BYTE, 0x12];
        stream.extend(header_bytes(0x01, 0x63, 322));
        let header = sync.advance(&stream).unwrap();
        assert_eq!(
            header,
            FrameHeader {
                address: 0x01,
                frame_type: 0x63,
                payload_len: 322,
            }
        );
    }

    #[test]
    fn test_no_false_positive_after_partial_sync() {
        // {sync, sync, sync, other} must not count toward a later match.
        let mut sync = FrameSync::new();
        let mut stream = vec![SYNC_BYTE, SYNC_BYTE, SYNC_BYTE, 0x42];
        assert_eq!(sync.advance(&stream), None);
        assert_eq!(sync.pending(), HEADER_SIZE);

        stream = header_bytes(0x02, 0x61, 10);
        let header = sync.advance(&stream).unwrap();
        assert_eq!(header.address, 0x02);
        assert_eq!(header.frame_type, 0x61);
    }

    #[test]
    fn test_type_mismatch_resets_match() {
        let mut sync = FrameSync::expecting(0x63);
        let rejected = header_bytes(0x01, 0x61, 4);
        assert_eq!(sync.advance(&rejected), None);
        assert_eq!(sync.pending(), HEADER_SIZE);

        let accepted = header_bytes(0x01, 0x63, 4);
        assert!(sync.advance(&accepted).is_some());
    }

    #[test]
    fn test_header_split_across_chunks() {
        let mut sync = FrameSync::new();
        let bytes = header_bytes(0x04, 0x63, 480);
        assert_eq!(sync.advance(&bytes[..5]), None);
        assert_eq!(sync.pending(), 3);
        let header = sync.advance(&bytes[5..]).unwrap();
        assert_eq!(header.payload_len, 480);
    }

    #[test]
    fn test_sync_run_longer_than_marker() {
        // A fifth sync byte is consumed as the address field, matching the
        // device's own framing of address 0xA5.
        let mut sync = FrameSync::new();
        let mut stream = vec![SYNC_BYTE; 5];
        stream.extend([0x63, 0x02, 0x00]);
        let header = sync.advance(&stream).unwrap();
        assert_eq!(header.address, SYNC_BYTE);
        assert_eq!(header.frame_type, 0x63);
        assert_eq!(header.payload_len, 2);
    }
}

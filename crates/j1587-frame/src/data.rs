use crate::Mid;

pub const DATA_PID: u8 = 198;

/// Maximum payload bytes carried by a single connection-mode data-transfer frame.
pub const MAX_SEGMENT_LEN: usize = 15;

/// A J1587 PID 198 connection-mode data-transfer frame, checksum already stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFrame {
    pub src: Mid,
    pub dst: Mid,
    /// 1-indexed segment number.
    pub segment_id: u8,
    pub payload: Vec<u8>,
}

impl DataFrame {
    #[must_use]
    pub fn new(src: Mid, dst: Mid, segment_id: u8, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_SEGMENT_LEN);
        Self {
            src,
            dst,
            segment_id,
            payload,
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5 + self.payload.len());
        buf.push(self.src);
        buf.push(DATA_PID);
        buf.push((2 + self.payload.len()) as u8);
        buf.push(self.dst);
        buf.push(self.segment_id);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Parse a data-transfer frame from checksum-stripped bytes.
///
/// Callers must have already confirmed via [`crate::classify`] that `buf` is
/// long enough and carries PID 198. Per spec §9, `buf` here is already
/// checksum-stripped by the caller (the worker spine), so the payload is
/// simply `buf[5..]`.
#[must_use]
pub fn parse_data(buf: &[u8]) -> DataFrame {
    DataFrame {
        src: buf[0],
        dst: buf[3],
        segment_id: buf[4],
        payload: buf[5..].to_vec(),
    }
}

/// Split `payload` into 15-byte segments, numbered 1..=N; the last segment
/// may be shorter.
#[must_use]
pub fn segment(src: Mid, dst: Mid, payload: &[u8]) -> Vec<DataFrame> {
    payload
        .chunks(MAX_SEGMENT_LEN)
        .enumerate()
        .map(|(i, chunk)| DataFrame::new(src, dst, (i + 1) as u8, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_roundtrip() {
        let frame = DataFrame::new(0xac, 0x80, 2, vec![1, 2, 3]);
        let bytes = frame.to_bytes();
        assert_eq!(bytes, vec![0xac, DATA_PID, 5, 0x80, 2, 1, 2, 3]);
        assert_eq!(parse_data(&bytes), frame);
    }

    #[test]
    fn test_segment_exact_multiple() {
        let payload: Vec<u8> = (0..30).collect();
        let frames = segment(0xac, 0x80, &payload);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].segment_id, 1);
        assert_eq!(frames[0].payload.len(), 15);
        assert_eq!(frames[1].segment_id, 2);
        assert_eq!(frames[1].payload.len(), 15);
    }

    #[test]
    fn test_segment_short_last_chunk() {
        let payload: Vec<u8> = (0..20).collect();
        let frames = segment(0xac, 0x80, &payload);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].payload.len(), 5);
    }

    #[test]
    fn test_segment_s5_fixture() {
        // spec scenario S5: a 12-byte payload fits in one segment.
        let payload = b"\x00\xc8\x07\x04\x06\x00\x46\x41\x41\x5a\x05\x48";
        let frames = segment(0xac, 0x80, payload);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].to_bytes(),
            b"\xac\xc6\x0e\x80\x01\x00\xc8\x07\x04\x06\x00\x46\x41\x41\x5a\x05\x48"
        );
    }
}

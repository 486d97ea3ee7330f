use crate::Mid;

pub const MULTISECTION_PID: u8 = 192;

/// Maximum payload bytes carried by a single multisection section frame.
pub const MAX_SECTION_LEN: usize = 15;

/// A J1587 PID 192 multisection parameter frame, checksum already stripped.
///
/// Unlike the connection-mode transport, multisection parameters are
/// broadcast: there is no destination MID and no RTS/CTS handshake. Section 0
/// additionally carries the total parameter length; later sections omit it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisectionFrame {
    pub src: Mid,
    /// `buf[3]`: the PID the reassembled parameter belongs to. One byte on
    /// the wire, per §3.
    pub target_pid: u8,
    /// High nibble of `section_byte`: the index of the final section of this
    /// parameter. A frame is the last one when `this_index == final_index`.
    pub final_index: u8,
    /// Low nibble of `section_byte`: this frame's 0-indexed section number.
    pub this_index: u8,
    /// Total parameter length in bytes, present only on section 0.
    pub target_len: Option<u8>,
    pub payload: Vec<u8>,
}

impl MultisectionFrame {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let section_byte = (self.final_index << 4) | (self.this_index & 0x0F);

        let mut buf = Vec::with_capacity(5 + self.payload.len());
        buf.push(self.src);
        buf.push(MULTISECTION_PID);
        let body_len = 2 + usize::from(self.target_len.is_some()) + self.payload.len();
        buf.push(body_len as u8);
        buf.push(self.target_pid);
        buf.push(section_byte);
        if let Some(total) = self.target_len {
            buf.push(total);
        }
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Parse a multisection frame from checksum-stripped bytes.
///
/// Callers must have already confirmed via [`crate::classify`] that `buf` is
/// long enough and carries PID 192.
///
/// # Errors
///
/// Returns an error if `buf` is too short to contain the fixed header fields.
pub fn parse_multisection(buf: &[u8]) -> eyre::Result<MultisectionFrame> {
    eyre::ensure!(
        buf.len() >= 5,
        "multisection frame too short: {} bytes",
        buf.len()
    );
    let src = buf[0];
    let target_pid = buf[3];
    let section_byte = buf[4];
    let final_index = section_byte >> 4;
    let this_index = section_byte & 0x0F;

    let (target_len, payload) = if this_index == 0 {
        eyre::ensure!(
            buf.len() >= 6,
            "section-0 multisection frame missing target length byte"
        );
        (Some(buf[5]), buf[6..].to_vec())
    } else {
        (None, buf[5..].to_vec())
    };

    Ok(MultisectionFrame {
        src,
        target_pid,
        final_index,
        this_index,
        target_len,
        payload,
    })
}

/// Split `payload` into section frames for `target_pid`, numbered from 0,
/// each ≤[`MAX_SECTION_LEN`] bytes. Section 0 carries the total payload
/// length; every section's `final_index` is the 0-indexed number of the last
/// section produced.
///
/// # Panics
///
/// Panics if `payload` would require more than 16 sections (the final index
/// must fit a nibble) or more than 255 bytes (the target length is one byte).
#[must_use]
pub fn section(src: Mid, target_pid: u8, payload: &[u8]) -> Vec<MultisectionFrame> {
    assert!(payload.len() <= u8::MAX as usize, "parameter too long");
    let total_len = payload.len() as u8;
    let chunks: Vec<&[u8]> = payload.chunks(MAX_SECTION_LEN).collect();
    let final_index = chunks.len().saturating_sub(1);
    assert!(final_index <= 0x0F, "parameter requires too many sections");
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| MultisectionFrame {
            src,
            target_pid,
            final_index: final_index as u8,
            this_index: i as u8,
            target_len: if i == 0 { Some(total_len) } else { None },
            payload: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_single_section_roundtrip() {
        let frame = MultisectionFrame {
            src: 0xac,
            target_pid: 0xfa,
            final_index: 0,
            this_index: 0,
            target_len: Some(3),
            payload: vec![1, 2, 3],
        };
        let bytes = frame.to_bytes();
        assert_eq!(parse_multisection(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_section_chopping_sets_final_index() {
        let payload: Vec<u8> = (0..40).collect();
        let frames = section(0xac, 200, &payload);
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.final_index, 2);
        }
        assert_eq!(frames[0].target_len, Some(40));
        assert_eq!(frames[1].target_len, None);
        assert_eq!(frames[2].target_len, None);
        assert_eq!(frames[0].this_index, 0);
        assert_eq!(frames[1].this_index, 1);
        assert_eq!(frames[2].this_index, 2);
    }

    #[test]
    fn test_non_section_zero_has_no_target_len() {
        let frame = MultisectionFrame {
            src: 0xac,
            target_pid: 100,
            final_index: 1,
            this_index: 1,
            target_len: None,
            payload: vec![9, 9],
        };
        let bytes = frame.to_bytes();
        assert_eq!(parse_multisection(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_section_byte_packs_nibbles() {
        let frame = MultisectionFrame {
            src: 0xac,
            target_pid: 10,
            final_index: 3,
            this_index: 2,
            target_len: None,
            payload: vec![],
        };
        let bytes = frame.to_bytes();
        assert_eq!(bytes[4], 0x32);
    }
}

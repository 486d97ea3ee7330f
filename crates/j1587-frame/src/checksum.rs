/// Compute the J1708 checksum: the two's-complement of the mod-256 sum of `bytes`.
///
/// Equivalent to `(!sum + 1) mod 256`, taken as a single byte.
#[inline]
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    (!sum).wrapping_add(1)
}

/// Append the computed checksum byte to `bytes`.
pub fn append_checksum(bytes: &mut Vec<u8>) {
    let check = checksum(bytes);
    bytes.push(check);
}

/// `true` if the trailing byte of `framed` is the correct checksum of the bytes preceding it.
///
/// An empty slice has no checksum byte to verify and is rejected.
#[inline]
#[must_use]
pub fn verify_checksum(framed: &[u8]) -> bool {
    match framed.split_last() {
        Some((check, body)) => checksum(body) == *check,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_checksum_known_vector() {
        // 0xAC + 0xFE + 0x80 + 0xF0 + 0x17 + checksum == 0 (mod 256)
        let msg = [0xACu8, 0xFE, 0x80, 0xF0, 0x17];
        let check = checksum(&msg);
        let total: u8 = msg.iter().fold(check, |acc, b| acc.wrapping_add(*b));
        assert_eq!(total, 0);
    }

    #[test]
    fn test_append_and_verify_roundtrip() {
        for len in 0..30usize {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let mut framed = bytes.clone();
            append_checksum(&mut framed);
            assert!(verify_checksum(&framed), "len={len}");
        }
    }

    #[test]
    fn test_verify_rejects_tampered_checksum() {
        let mut framed = vec![0x80u8, 0x00];
        append_checksum(&mut framed);
        *framed.last_mut().unwrap() ^= 0xFF;
        assert!(!verify_checksum(&framed));
    }

    #[test]
    fn test_verify_empty_is_invalid() {
        assert!(!verify_checksum(&[]));
    }
}

//! candump-style `hex[:mask]` frame filters for `--show`/`--hide`.
//!
//! Unlike `candump`, which filters on a numeric CAN ID, J1708 frames carry
//! no ID field: the leading bytes (source MID, then PID) play that role.
//! A [`FilterExpr`] therefore matches against the leading bytes of a
//! checksum-stripped frame rather than a parsed identifier.

use std::str::FromStr;

use eyre::WrapErr;

/// A parsed `--show`/`--hide` expression: `hex[:mask]`.
///
/// `hex` gives the bytes to match against the start of a frame; `mask`
/// (defaulting to all-ones, i.e. an exact match) selects which bits of
/// those bytes matter. Both are big-endian hex strings of equal length
/// when `mask` is given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterExpr {
    pattern: Vec<u8>,
    mask: Vec<u8>,
}

impl FilterExpr {
    /// `true` if `frame` (checksum-stripped) matches this expression: `frame`
    /// must be at least as long as the pattern, and every masked bit of the
    /// pattern must equal the corresponding bit of `frame`.
    #[must_use]
    pub fn matches(&self, frame: &[u8]) -> bool {
        if frame.len() < self.pattern.len() {
            return false;
        }
        self.pattern
            .iter()
            .zip(&self.mask)
            .zip(frame)
            .all(|((p, m), f)| p & m == f & m)
    }
}

impl FromStr for FilterExpr {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((hex_pattern, hex_mask)) => {
                let pattern = hex::decode(hex_pattern)
                    .wrap_err_with(|| format!("invalid hex pattern in filter {s:?}"))?;
                let mask = hex::decode(hex_mask)
                    .wrap_err_with(|| format!("invalid hex mask in filter {s:?}"))?;
                eyre::ensure!(
                    pattern.len() == mask.len(),
                    "filter {s:?} pattern and mask must be the same length"
                );
                Ok(FilterExpr { pattern, mask })
            }
            None => {
                let pattern =
                    hex::decode(s).wrap_err_with(|| format!("invalid hex pattern in filter {s:?}"))?;
                let mask = vec![0xFFu8; pattern.len()];
                Ok(FilterExpr { pattern, mask })
            }
        }
    }
}

/// `true` if `frame` should be emitted given the `--show`/`--hide` lists.
///
/// A frame matching any `hide` expression is excluded outright. Otherwise,
/// if `show` is non-empty, the frame must match at least one `show`
/// expression; an empty `show` list shows everything not hidden.
#[must_use]
pub fn passes(frame: &[u8], show: &[FilterExpr], hide: &[FilterExpr]) -> bool {
    if hide.iter().any(|f| f.matches(frame)) {
        return false;
    }
    show.is_empty() || show.iter().any(|f| f.matches(frame))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_exact_pattern_no_mask() {
        let expr: FilterExpr = "80c5".parse().unwrap();
        assert_eq!(expr.pattern, vec![0x80, 0xc5]);
        assert_eq!(expr.mask, vec![0xff, 0xff]);
    }

    #[test]
    fn test_parse_pattern_with_mask() {
        let expr: FilterExpr = "80c5:f0ff".parse().unwrap();
        assert_eq!(expr.pattern, vec![0x80, 0xc5]);
        assert_eq!(expr.mask, vec![0xf0, 0xff]);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        assert!("80c5:ff".parse::<FilterExpr>().is_err());
    }

    #[test]
    fn test_matches_exact() {
        let expr: FilterExpr = "80c5".parse().unwrap();
        assert!(expr.matches(&[0x80, 0xc5, 0x02, 0xac]));
        assert!(!expr.matches(&[0x81, 0xc5]));
    }

    #[test]
    fn test_matches_masked_nibble() {
        // match any source MID in 0x8_, with PID exactly 0xc5
        let expr: FilterExpr = "80c5:f0ff".parse().unwrap();
        assert!(expr.matches(&[0x8f, 0xc5]));
        assert!(!expr.matches(&[0x70, 0xc5]));
    }

    #[test]
    fn test_short_frame_never_matches() {
        let expr: FilterExpr = "80c5".parse().unwrap();
        assert!(!expr.matches(&[0x80]));
    }

    #[test]
    fn test_passes_empty_lists_shows_everything() {
        assert!(passes(&[0x80, 0x00], &[], &[]));
    }

    #[test]
    fn test_passes_hide_wins_over_show() {
        let show: FilterExpr = "80".parse().unwrap();
        let hide: FilterExpr = "8000".parse().unwrap();
        assert!(!passes(&[0x80, 0x00], &[show], &[hide]));
    }

    #[test]
    fn test_passes_show_list_restricts() {
        let show: FilterExpr = "ac".parse().unwrap();
        assert!(!passes(&[0x80, 0x00], &[show.clone()], &[]));
        assert!(passes(&[0xac, 0x00], &[show], &[]));
    }
}

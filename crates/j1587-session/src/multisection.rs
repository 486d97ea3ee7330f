use std::collections::HashMap;

use j1587_frame::{Mid, MultisectionFrame};
use tracing::trace;

use crate::types::{Delivery, MultisectionKey};

struct Accumulator {
    target_len: u8,
    last_seen: u8,
    data: Vec<u8>,
}

/// Outcome of feeding one multisection frame to the reassembler.
#[derive(Debug, PartialEq, Eq)]
pub enum MultisectionOutcome {
    /// The parameter is still being accumulated; nothing to deliver yet.
    Pending,
    /// The parameter completed: `[src, target_pid, target_len] ++ payload`.
    Delivered(Delivery),
    /// A section arrived out of order (or a frame was too short); the
    /// matching session (if any) was cleared and the caller should pass the
    /// offending raw frame through to the mailbox unchanged.
    PassThrough,
}

/// Per-`(peer_mid, target_pid)` accumulator for PID-192 multisection
/// parameter frames, per §4.5.
///
/// Owned exclusively by the worker spine — unlike the connection-mode
/// transport sessions, this is plain accumulation state with no concurrency
/// or timeouts of its own.
#[derive(Default)]
pub struct MultisectionReassembler {
    sessions: HashMap<MultisectionKey, Accumulator>,
}

impl MultisectionReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one parsed multisection frame from `src`.
    pub fn handle(&mut self, src: Mid, frame: MultisectionFrame) -> MultisectionOutcome {
        let key = (src, frame.target_pid);

        if frame.this_index == 0 {
            let target_len = frame.target_len.unwrap_or(0);
            trace!(peer = src, pid = frame.target_pid, target_len, "multisection section 0");
            self.sessions.insert(
                key,
                Accumulator {
                    target_len,
                    last_seen: 0,
                    data: frame.payload.clone(),
                },
            );
            return self.maybe_deliver(key, &frame);
        }

        let Some(acc) = self.sessions.get_mut(&key) else {
            trace!(peer = src, pid = frame.target_pid, "multisection section with no session, pass through");
            return MultisectionOutcome::PassThrough;
        };
        if acc.last_seen + 1 != frame.this_index {
            trace!(peer = src, pid = frame.target_pid, "multisection gap, dropping session");
            self.sessions.remove(&key);
            return MultisectionOutcome::PassThrough;
        }

        acc.data.extend_from_slice(&frame.payload);
        acc.last_seen = frame.this_index;
        self.maybe_deliver(key, &frame)
    }

    fn maybe_deliver(&mut self, key: MultisectionKey, frame: &MultisectionFrame) -> MultisectionOutcome {
        let complete = self
            .sessions
            .get(&key)
            .map(|acc| {
                frame.this_index == frame.final_index && acc.data.len() == acc.target_len as usize
            })
            .unwrap_or(false);

        if !complete {
            return MultisectionOutcome::Pending;
        }

        let acc = self.sessions.remove(&key).expect("checked present above");
        let mut out = vec![key.0, key.1, acc.target_len];
        out.extend_from_slice(&acc.data);
        MultisectionOutcome::Delivered(out)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_three_section_reassembly_s7() {
        let mut reassembler = MultisectionReassembler::new();
        let sections = j1587_frame::multisection::section(0x80, 243, &[0xabu8; 33]);
        assert_eq!(sections.len(), 3);

        let mut last = MultisectionOutcome::Pending;
        for section in sections {
            last = reassembler.handle(0x80, section);
        }
        match last {
            MultisectionOutcome::Delivered(bytes) => {
                assert_eq!(bytes[0], 0x80);
                assert_eq!(bytes[1], 243);
                assert_eq!(bytes[2], 33);
                assert_eq!(&bytes[3..], &[0xabu8; 33][..]);
            }
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[test]
    fn test_gap_drops_session_and_passes_through() {
        let mut reassembler = MultisectionReassembler::new();
        let sections = j1587_frame::multisection::section(0x80, 10, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        // feed section 0 then skip straight to a later section index.
        let outcome0 = reassembler.handle(0x80, sections[0].clone());
        assert_eq!(outcome0, MultisectionOutcome::Pending);

        let mut bogus = sections[0].clone();
        bogus.this_index = 5;
        bogus.target_len = None;
        let outcome = reassembler.handle(0x80, bogus);
        assert_eq!(outcome, MultisectionOutcome::PassThrough);

        // session was cleared; resubmitting section 1 now also passes through.
        let outcome2 = reassembler.handle(0x80, sections[1].clone());
        assert_eq!(outcome2, MultisectionOutcome::PassThrough);
    }

    #[test]
    fn test_unknown_session_passes_through() {
        let mut reassembler = MultisectionReassembler::new();
        let mut frame = j1587_frame::multisection::section(0x80, 10, &[1, 2, 3])
            .pop()
            .unwrap();
        frame.this_index = 1;
        frame.target_len = None;
        let outcome = reassembler.handle(0x80, frame);
        assert_eq!(outcome, MultisectionOutcome::PassThrough);
    }
}

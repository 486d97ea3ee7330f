use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use j1587_frame::{ConnFrame, Mid};
use tracing::{debug, trace, warn};

use crate::types::{Delivery, OutboundFrame, SessionEvent};

/// How long the session waits on its inbound channel before checking for
/// missing segments or an expired deadline.
const WAIT_TICK: Duration = Duration::from_secs(2);
/// Gap between successive missing-segment CTS retransmissions.
const RETRY_GAP: Duration = Duration::from_millis(100);
/// Overall wall-clock budget from session creation.
const SESSION_DEADLINE: Duration = Duration::from_secs(60);

/// A parent-stop signal shared by the spine and every live session. Set by
/// the facade's `close`; observed by sessions at every suspension point.
pub type StopSignal = Arc<AtomicBool>;

/// Reassembles one connection-mode transport message addressed to `my_mid`
/// from a single peer, per §4.3.
///
/// Runs as its own thread, spawned by the worker spine on an unsolicited
/// RTS. Drains its inbound channel with a bounded wait so timeout-driven CTS
/// retransmission can occur without blocking the spine.
pub struct ReceiveSession {
    my_mid: Mid,
    peer_mid: Mid,
    segments: Vec<Option<Vec<u8>>>,
    inbound: Receiver<SessionEvent>,
    outbound: Sender<OutboundFrame>,
    mailbox: Sender<Delivery>,
    stop: StopSignal,
}

impl ReceiveSession {
    /// Spawn a receive session reacting to an inbound RTS, returning the
    /// channel the spine should forward subsequent frames for this peer on,
    /// and the thread's join handle.
    #[must_use]
    pub fn spawn(
        my_mid: Mid,
        peer_mid: Mid,
        num_segments: u8,
        outbound: Sender<OutboundFrame>,
        mailbox: Sender<Delivery>,
        stop: StopSignal,
    ) -> (Sender<SessionEvent>, thread::JoinHandle<()>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let session = ReceiveSession {
            my_mid,
            peer_mid,
            segments: vec![None; num_segments as usize],
            inbound: rx,
            outbound,
            mailbox,
            stop,
        };
        let handle = thread::spawn(move || session.run());
        (tx, handle)
    }

    fn emit(&self, frame: ConnFrame) {
        let _ = self.outbound.send(frame.to_bytes());
    }

    fn missing_segments(&self) -> impl Iterator<Item = u8> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, seg)| seg.is_none())
            .map(|(i, _)| i as u8)
    }

    fn is_complete(&self) -> bool {
        self.segments.iter().all(Option::is_some)
    }

    fn assemble(&self) -> Delivery {
        let mut out = vec![self.peer_mid];
        for segment in &self.segments {
            out.extend_from_slice(segment.as_deref().unwrap_or_default());
        }
        out
    }

    fn abort_x3(&self) {
        for _ in 0..3 {
            self.emit(ConnFrame::abort(self.my_mid, self.peer_mid));
        }
    }

    fn eom_x3(&self) {
        for _ in 0..3 {
            self.emit(ConnFrame::eom(self.my_mid, self.peer_mid));
        }
    }

    fn run(mut self) {
        let deadline = Instant::now() + SESSION_DEADLINE;
        if self.stop.load(Ordering::SeqCst) {
            return;
        }
        self.emit(ConnFrame::cts(self.my_mid, self.peer_mid, self.segments.len() as u8, 1));

        loop {
            if self.stop.load(Ordering::SeqCst) {
                debug!(peer = self.peer_mid, "receive session observed stop signal");
                return;
            }

            match self.inbound.recv_timeout(WAIT_TICK) {
                Ok(SessionEvent::Data(frame)) => {
                    if frame.segment_id == 0 || frame.segment_id as usize > self.segments.len() {
                        trace!(segment_id = frame.segment_id, "data frame out of range, dropping");
                        continue;
                    }
                    self.segments[(frame.segment_id - 1) as usize] = Some(frame.payload);
                    if self.is_complete() {
                        if self.stop.load(Ordering::SeqCst) {
                            return;
                        }
                        self.eom_x3();
                        let _ = self.mailbox.send(self.assemble());
                        return;
                    }
                }
                Ok(SessionEvent::Conn(frame)) if frame.is_abort() => {
                    debug!(peer = self.peer_mid, "receive session aborted by peer");
                    return;
                }
                Ok(SessionEvent::Conn(frame)) if frame.is_rts() => {
                    // Redundant retransmission of the RTS we already answered.
                }
                Ok(SessionEvent::Conn(_other)) => {
                    warn!(peer = self.peer_mid, "protocol violation in receive session");
                    if !self.stop.load(Ordering::SeqCst) {
                        self.abort_x3();
                    }
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if Instant::now() >= deadline {
                        if !self.stop.load(Ordering::SeqCst) {
                            self.abort_x3();
                        }
                        return;
                    }
                    if self.stop.load(Ordering::SeqCst) {
                        return;
                    }
                    let missing: Vec<u8> = self.missing_segments().collect();
                    for segment_index in missing {
                        if self.stop.load(Ordering::SeqCst) {
                            return;
                        }
                        self.emit(ConnFrame::cts(self.my_mid, self.peer_mid, 1, segment_index + 1));
                        thread::sleep(RETRY_GAP);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return;
                }
            }
        }
    }
}

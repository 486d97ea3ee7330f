use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use j1587_frame::data::segment;
use j1587_frame::{ConnFrame, DataFrame, Mid};
use tracing::{debug, warn};

use crate::receive::StopSignal;
use crate::types::{OutboundFrame, SessionEvent};

/// Overall wall-clock budget from session creation.
const SESSION_DEADLINE: Duration = Duration::from_secs(10);
/// How long the session waits on its inbound channel before re-checking its
/// deadline.
const WAIT_TICK: Duration = Duration::from_secs(2);

/// Outcome of a completed send session, joined by the facade's
/// `transport_send`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The peer sent EOM (or, in preempt-CTS mode, all data frames went out
    /// without waiting for acknowledgment).
    Success,
    /// The peer sent ABORT, or the 10-second deadline elapsed.
    Failed,
}

/// Fragments and transmits one connection-mode transport message to
/// `peer_mid`, per §4.4.
///
/// Runs as its own thread, joined directly by the facade: the thread always
/// terminates within [`SESSION_DEADLINE`], so `JoinHandle::join` already
/// bounds the wait the spec describes as a one-shot completion event.
pub struct SendSession {
    my_mid: Mid,
    peer_mid: Mid,
    data_frames: Vec<DataFrame>,
    total_length: u16,
    preempt_cts: bool,
    inbound: Receiver<SessionEvent>,
    outbound: Sender<OutboundFrame>,
    stop: StopSignal,
}

impl SendSession {
    /// Spawn a send session for `payload` to `peer_mid`, returning the
    /// channel the spine should forward CTS/EOM/ABORT frames for this peer
    /// on, and a join handle yielding the session's outcome.
    #[must_use]
    pub fn spawn(
        my_mid: Mid,
        peer_mid: Mid,
        payload: Vec<u8>,
        preempt_cts: bool,
        outbound: Sender<OutboundFrame>,
        stop: StopSignal,
    ) -> (Sender<SessionEvent>, thread::JoinHandle<SendOutcome>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let data_frames = segment(my_mid, peer_mid, &payload);
        let session = SendSession {
            my_mid,
            peer_mid,
            total_length: payload.len() as u16,
            data_frames,
            preempt_cts,
            inbound: rx,
            outbound,
            stop,
        };
        let handle = thread::spawn(move || session.run());
        (tx, handle)
    }

    fn emit_conn(&self, frame: ConnFrame) {
        let _ = self.outbound.send(frame.to_bytes());
    }

    fn emit_data(&self, frame: &DataFrame) {
        let _ = self.outbound.send(frame.to_bytes());
    }

    fn emit_range(&self, next_segment: u8, count: u8) {
        for segment_id in next_segment..next_segment.saturating_add(count) {
            if let Some(frame) = self
                .data_frames
                .iter()
                .find(|f| f.segment_id == segment_id)
            {
                self.emit_data(frame);
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn run(self) -> SendOutcome {
        if self.stopped() {
            return SendOutcome::Failed;
        }
        self.emit_conn(ConnFrame::rts(
            self.my_mid,
            self.peer_mid,
            self.data_frames.len() as u8,
            self.total_length,
        ));

        if self.preempt_cts {
            for frame in &self.data_frames {
                if self.stopped() {
                    return SendOutcome::Failed;
                }
                self.emit_data(frame);
            }
            return SendOutcome::Success;
        }

        let deadline = Instant::now() + SESSION_DEADLINE;
        loop {
            if self.stopped() {
                return SendOutcome::Failed;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(peer = self.peer_mid, "send session deadline exceeded");
                return SendOutcome::Failed;
            }
            match self.inbound.recv_timeout(remaining.min(WAIT_TICK)) {
                Ok(SessionEvent::Conn(frame)) if frame.is_abort() => {
                    warn!(peer = self.peer_mid, "send session aborted by peer");
                    return SendOutcome::Failed;
                }
                Ok(SessionEvent::Conn(ref frame))
                    if matches!(frame.kind, j1587_frame::ConnKind::Cts { .. }) =>
                {
                    if let j1587_frame::ConnKind::Cts {
                        num_segments,
                        next_segment,
                    } = frame.kind
                    {
                        if self.stopped() {
                            return SendOutcome::Failed;
                        }
                        self.emit_range(next_segment, num_segments);
                    }
                }
                Ok(SessionEvent::Conn(ref frame)) if matches!(frame.kind, j1587_frame::ConnKind::Eom) => {
                    return SendOutcome::Success;
                }
                Ok(SessionEvent::Conn(_)) | Ok(SessionEvent::Data(_)) => {
                    // RTS/RSD (or a stray data frame) — ignored per §4.4.
                }
                Err(RecvTimeoutError::Timeout) => {
                    // Re-check the deadline at the top of the loop.
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return SendOutcome::Failed;
                }
            }
        }
    }
}

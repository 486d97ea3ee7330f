//! C6: the worker spine. Single thread, sole owner of the transport session
//! index and the multisection reassembler; dispatches inbound frames to
//! sessions or the mailbox, and drains outbound frames to the paced link.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use j1587_frame::{append_checksum, classify, verify_checksum, ConnFrame, FrameKind, Mid};
use j1587_link::{LinkEndpoint, RawFrame};
use j1587_session::{
    Delivery, MultisectionOutcome, MultisectionReassembler, OutboundFrame, ReceiveSession,
    SendOutcome, SendSession, SessionEvent, SessionKey, StopSignal,
};
use tracing::{debug, trace, warn};

use crate::config::DriverConfig;

/// How long the spine blocks on its combined event queue before re-checking
/// the stop signal, per §5.
const SPINE_TICK: Duration = Duration::from_secs(1);
/// How long the link-reader thread blocks on one `read` before re-checking
/// the stop signal.
const READER_TICK: Duration = Duration::from_secs(1);
/// Bounded grace period `close` gives the combined queue to flush any
/// outbound frames still in flight (a one-shot `send`/`pid_send`, or the
/// tail of a just-finished `transport_send`) once shutdown begins, per §5.
const SHUTDOWN_DRAIN: Duration = Duration::from_millis(500);

/// One item on the spine's combined, tagged event queue (§4.6/§9: "prefer
/// merging the inbound and outbound sources into one tagged channel").
enum SpineEvent {
    Inbound(RawFrame),
    Outbound(OutboundFrame),
    Control(SpineCommand),
}

/// A request from the facade that needs the session index, which only the
/// spine thread may mutate.
enum SpineCommand {
    /// Start a send session to `peer_mid` and hand the join handle back on
    /// `reply` so the facade can await it directly, off the spine thread.
    SpawnSend {
        peer_mid: Mid,
        payload: Vec<u8>,
        reply: Sender<JoinHandle<SendOutcome>>,
    },
}

/// Handle to a running worker spine: the channels needed to drive it, plus
/// the join handles shutdown must wait on.
pub struct SpineHandle {
    outbound_tx: Sender<OutboundFrame>,
    control_tx: Sender<SpineEvent>,
    spine_thread: JoinHandle<()>,
    reader_thread: JoinHandle<()>,
    stop: StopSignal,
}

impl SpineHandle {
    /// Enqueue a raw, checksum-less frame for paced transmission. Used both
    /// for the facade's one-shot `send` and by sessions emitting
    /// RTS/CTS/EOM/ABORT/data frames.
    pub fn send_raw(&self, frame: OutboundFrame) {
        let _ = self.outbound_tx.send(frame);
    }

    /// A cloneable sender sessions can use to emit outbound frames.
    #[must_use]
    pub fn outbound_sender(&self) -> Sender<OutboundFrame> {
        self.outbound_tx.clone()
    }

    /// Ask the spine to start a send session, returning its join handle.
    ///
    /// # Panics
    ///
    /// Panics if the spine thread has already exited without replying,
    /// which only happens if `close` raced this call.
    #[must_use]
    pub fn spawn_send(&self, peer_mid: Mid, payload: Vec<u8>) -> JoinHandle<SendOutcome> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let _ = self.control_tx.send(SpineEvent::Control(SpineCommand::SpawnSend {
            peer_mid,
            payload,
            reply: reply_tx,
        }));
        reply_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker spine did not acknowledge SpawnSend before exiting")
    }

    /// Signal shutdown and join every thread the spine owns, including live
    /// sessions (bounded by their own per-tick stop-signal checks).
    pub fn close(self) {
        self.stop.store(true, std::sync::atomic::Ordering::SeqCst);
        let _ = self.reader_thread.join();
        let _ = self.spine_thread.join();
    }
}

/// Spawn the link-reader thread, the worker spine thread, and wire them
/// together with the combined event queue described in §4.6/§9.
pub fn spawn(
    link: Arc<dyn LinkEndpoint>,
    config: DriverConfig,
    mailbox_tx: Sender<Delivery>,
) -> SpineHandle {
    let stop: StopSignal = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let (combined_tx, combined_rx) = mpsc::channel::<SpineEvent>();
    let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>();

    // Forwarder: relays the session/facade-facing outbound channel into the
    // spine's single combined queue, so the spine thread only ever selects
    // over one receiver.
    {
        let combined_tx = combined_tx.clone();
        thread::spawn(move || {
            while let Ok(frame) = outbound_rx.recv() {
                if combined_tx.send(SpineEvent::Outbound(frame)).is_err() {
                    break;
                }
            }
        });
    }

    let reader_thread = {
        let link = Arc::clone(&link);
        let combined_tx = combined_tx.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || read_loop(link, combined_tx, stop))
    };

    // Facade control commands (`spawn_send`) are sent straight onto the
    // combined queue via this clone; `Sender` is multi-producer, so no
    // separate bridge thread is needed.
    let control_tx = combined_tx.clone();

    let spine_thread = {
        let outbound_tx_for_sessions = outbound_tx.clone();
        let loopback_tx = combined_tx;
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut spine = Spine {
                link,
                config,
                sessions: HashMap::new(),
                session_handles: Vec::new(),
                reassembler: MultisectionReassembler::new(),
                mailbox_tx,
                outbound_tx: outbound_tx_for_sessions,
                loopback_tx,
                stop,
            };
            spine.run(combined_rx);
        })
    };

    SpineHandle {
        outbound_tx,
        control_tx,
        spine_thread,
        reader_thread,
        stop,
    }
}

fn read_loop(link: Arc<dyn LinkEndpoint>, combined_tx: Sender<SpineEvent>, stop: StopSignal) {
    loop {
        if stop.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        match link.read(READER_TICK) {
            Ok(Some(frame)) => {
                if combined_tx.send(SpineEvent::Inbound(frame)).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                if stop.load(std::sync::atomic::Ordering::SeqCst) {
                    return;
                }
                warn!(error = %e, "J1708 link read failed, link reader exiting");
                return;
            }
        }
    }
}

struct Spine {
    link: Arc<dyn LinkEndpoint>,
    config: DriverConfig,
    sessions: HashMap<SessionKey, Sender<SessionEvent>>,
    session_handles: Vec<JoinHandle<()>>,
    reassembler: MultisectionReassembler,
    mailbox_tx: Sender<Delivery>,
    outbound_tx: Sender<OutboundFrame>,
    loopback_tx: Sender<SpineEvent>,
    stop: StopSignal,
}

impl Spine {
    fn run(&mut self, combined_rx: Receiver<SpineEvent>) {
        loop {
            if self.stop.load(std::sync::atomic::Ordering::SeqCst) {
                break;
            }
            match combined_rx.recv_timeout(SPINE_TICK) {
                Ok(SpineEvent::Inbound(raw)) => self.handle_inbound(raw),
                Ok(SpineEvent::Outbound(frame)) => self.handle_outbound(frame),
                Ok(SpineEvent::Control(cmd)) => self.handle_control(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.drain_outbound(&combined_rx);
        self.join_sessions();
    }

    /// Flush whatever is still sitting on the combined queue once shutdown
    /// begins, bounded by [`SHUTDOWN_DRAIN`]: the forwarder thread relaying
    /// the facade's outbound channel may still be catching up with a frame
    /// enqueued just before `close`.
    fn drain_outbound(&self, combined_rx: &Receiver<SpineEvent>) {
        let deadline = std::time::Instant::now() + SHUTDOWN_DRAIN;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            match combined_rx.recv_timeout(remaining.min(Duration::from_millis(50))) {
                Ok(SpineEvent::Outbound(frame)) => self.handle_outbound(frame),
                Ok(SpineEvent::Inbound(_) | SpineEvent::Control(_)) => {}
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// Join every retained receive-session thread. Each session checks the
    /// shared stop signal on its own receive tick, so this is bounded by
    /// the session's own timeout rather than blocking forever.
    fn join_sessions(&mut self) {
        for handle in self.session_handles.drain(..) {
            let _ = handle.join();
        }
    }

    fn handle_control(&mut self, cmd: SpineCommand) {
        match cmd {
            SpineCommand::SpawnSend {
                peer_mid,
                payload,
                reply,
            } => {
                let (tx, handle) = SendSession::spawn(
                    self.config.my_mid,
                    peer_mid,
                    payload,
                    self.config.preempt_cts,
                    self.outbound_tx.clone(),
                    Arc::clone(&self.stop),
                );
                self.sessions.insert((self.config.my_mid, peer_mid), tx);
                let _ = reply.send(handle);
            }
        }
    }

    fn handle_outbound(&self, frame: OutboundFrame) {
        if self.config.silent {
            return;
        }
        if let Err(e) = self.link.send(&frame, false) {
            warn!(error = %e, "failed to transmit J1708 frame");
            return;
        }
        if self.config.loopback {
            let mut framed = frame;
            append_checksum(&mut framed);
            let _ = self.loopback_tx.send(SpineEvent::Inbound(framed));
        }
    }

    fn handle_inbound(&mut self, raw: RawFrame) {
        if !verify_checksum(&raw) {
            self.reject_invalid(&raw);
            return;
        }
        let stripped = &raw[..raw.len() - 1];
        match classify(stripped) {
            FrameKind::Malformed => self.reject_invalid(&raw),
            FrameKind::Conn(conn) => {
                let (dst, src) = (conn.dst, conn.src);
                self.dispatch_transport(stripped, dst, src, SessionEvent::Conn(conn));
            }
            FrameKind::Data => {
                let data = j1587_frame::data::parse_data(stripped);
                let (dst, src) = (data.dst, data.src);
                self.dispatch_transport(stripped, dst, src, SessionEvent::Data(data));
            }
            FrameKind::Multisection => self.dispatch_multisection(stripped),
            FrameKind::NonTransport => {
                let _ = self.mailbox_tx.send(stripped.to_vec());
            }
        }
    }

    fn reject_invalid(&self, raw: &[u8]) {
        if !self.config.pass_invalid_messages {
            return;
        }
        let body = if raw.is_empty() {
            Vec::new()
        } else {
            raw[..raw.len() - 1].to_vec()
        };
        let _ = self.mailbox_tx.send(body);
    }

    /// Shared dispatch for PID 197 ([`SessionEvent::Conn`]) and PID 198
    /// ([`SessionEvent::Data`]) per §4.6: both are routed by the same
    /// `(dst, src)` session key and the same create-on-RTS-or-ABORT rule.
    fn dispatch_transport(&mut self, stripped: &[u8], dst: Mid, src: Mid, event: SessionEvent) {
        if !self.config.suppress_fragments {
            let _ = self.mailbox_tx.send(stripped.to_vec());
        }
        if dst != self.config.my_mid && !self.config.reassemble_others {
            return;
        }

        let key: SessionKey = (dst, src);
        let event = if let Some(sender) = self.sessions.get(&key) {
            match sender.send(event) {
                Ok(()) => return,
                // Session thread already exited; recover the event and fall
                // through as if there was never a live session.
                Err(mpsc::SendError(event)) => {
                    self.sessions.remove(&key);
                    event
                }
            }
        } else {
            event
        };

        let rts_segments = match &event {
            SessionEvent::Conn(ConnFrame {
                kind: j1587_frame::ConnKind::Rts { segments, .. },
                ..
            }) => Some(*segments),
            _ => None,
        };
        if let Some(segments) = rts_segments {
            debug!(local = dst, peer = src, segments, "spawning receive session on unsolicited RTS");
            let (tx, handle) = ReceiveSession::spawn(
                dst,
                src,
                segments,
                self.outbound_tx.clone(),
                self.mailbox_tx.clone(),
                Arc::clone(&self.stop),
            );
            self.sessions.insert(key, tx);
            self.session_handles.push(handle);
        } else {
            trace!(local = dst, peer = src, "no live session, replying ABORT");
            let _ = self
                .outbound_tx
                .send(ConnFrame::abort(dst, src).to_bytes());
        }
    }

    fn dispatch_multisection(&mut self, stripped: &[u8]) {
        if !self.config.suppress_fragments {
            let _ = self.mailbox_tx.send(stripped.to_vec());
        }
        match j1587_frame::multisection::parse_multisection(stripped) {
            Ok(frame) => match self.reassembler.handle(frame.src, frame) {
                MultisectionOutcome::Pending => {}
                MultisectionOutcome::Delivered(bytes) => {
                    let _ = self.mailbox_tx.send(bytes);
                }
                MultisectionOutcome::PassThrough => {
                    let _ = self.mailbox_tx.send(stripped.to_vec());
                }
            },
            Err(_) => {
                let _ = self.mailbox_tx.send(stripped.to_vec());
            }
        }
    }
}

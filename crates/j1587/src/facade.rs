//! C7: the driver facade. Owns the worker spine and the mailbox receiver;
//! exposes the blocking operations upper-layer diagnostic code calls.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use j1587_frame::{append_checksum, multisection, Mid};
use j1587_link::{LinkEndpoint, LinkFactory};
use j1587_session::{Delivery, SendOutcome};
use tracing::{debug, trace};

use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::spine::{self, SpineHandle};

/// Outer budget `request_pid` polls the mailbox within, per spec §4.7.
const REQUEST_PID_OUTER: Duration = Duration::from_millis(80);
/// Per-attempt inner budget, checked against the outer budget each pass.
const REQUEST_PID_INNER: Duration = Duration::from_millis(20);

/// The PID `request_pid` uses to ask a peer for a parameter, per spec §4.7.
const PID_REQUEST: u8 = 0;

/// Public entry point: `send`, `transport_send`, `read`, `request_pid`,
/// `pid_send`, `close`, per spec §4.7.
pub struct Driver {
    config: DriverConfig,
    spine: Option<SpineHandle>,
    mailbox_rx: Receiver<Delivery>,
}

impl Driver {
    /// Build a link via `factory` and start the worker spine.
    ///
    /// # Errors
    ///
    /// Propagates the factory's error if the backend cannot be constructed.
    pub fn new(
        config: DriverConfig,
        factory: &dyn LinkFactory,
    ) -> Result<Self, DriverError> {
        let link: Arc<dyn LinkEndpoint> = Arc::from(factory.make()?);
        Ok(Self::with_link(config, link))
    }

    /// Start the worker spine over an already-constructed link. Mainly used
    /// by tests that inject a fake `LinkEndpoint` directly.
    #[must_use]
    pub fn with_link(config: DriverConfig, link: Arc<dyn LinkEndpoint>) -> Self {
        let (mailbox_tx, mailbox_rx) = mpsc::channel();
        let spine = spine::spawn(link, config, mailbox_tx);
        Self {
            config,
            spine: Some(spine),
            mailbox_rx,
        }
    }

    /// Enqueue a single J1708 frame for transmission. No fragmentation, no
    /// acknowledgment.
    pub fn send(&self, bytes: &[u8]) {
        self.spine().send_raw(bytes.to_vec());
    }

    /// Start a send session to `dst` and block until it completes or its
    /// 10-second deadline elapses.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Timeout`] if the session did not observe EOM
    /// (or, in preempt-CTS mode, did not finish transmitting).
    pub fn transport_send(&self, dst: Mid, bytes: &[u8]) -> Result<(), DriverError> {
        let handle = self.spine().spawn_send(dst, bytes.to_vec());
        match handle.join() {
            Ok(SendOutcome::Success) => Ok(()),
            Ok(SendOutcome::Failed) | Err(_) => Err(DriverError::Timeout),
        }
    }

    /// Send `payload` tagged with `pid`, using multisection parameter
    /// framing when it doesn't fit in one frame.
    ///
    /// The original source marks this unimplemented; this driver implements
    /// it for real, mirroring the send-direction section-numbering rules of
    /// §3/§4.5.
    pub fn pid_send(&self, pid: u8, payload: &[u8]) {
        for section in multisection::section(self.config.my_mid, pid, payload) {
            self.spine().send_raw(section.to_bytes());
        }
    }

    /// Pop the next delivered message from the mailbox.
    ///
    /// `block=true` waits indefinitely; `block=false` returns `Empty`
    /// immediately if nothing is queued. `timeout` is used only when
    /// `block` is true.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Empty`] if nothing arrived within the budget,
    /// or [`DriverError::LinkClosed`] if the spine has shut down.
    pub fn read(&self, block: bool, timeout: Duration) -> Result<Delivery, DriverError> {
        if block {
            match self.mailbox_rx.recv_timeout(timeout) {
                Ok(delivery) => Ok(delivery),
                Err(RecvTimeoutError::Timeout) => Err(DriverError::Empty),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(DriverError::LinkClosed(j1587_link::LinkError::Unavailable(
                        "worker spine has shut down".to_string(),
                    )))
                }
            }
        } else {
            self.mailbox_rx.try_recv().map_err(|_| DriverError::Empty)
        }
    }

    /// Request `pid` from `mid`: transmit a request frame, then poll `read`
    /// with an 80 ms outer budget and a 20 ms per-attempt inner budget,
    /// accepting the first delivery whose bytes are `[mid, pid, ...]`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Timeout`] if no matching message arrives
    /// within the outer budget.
    pub fn request_pid(&self, mid: Mid, pid: u16) -> Result<Delivery, DriverError> {
        let request = self.request_frame(mid, pid);
        self.send(&request);

        let deadline = Instant::now() + REQUEST_PID_OUTER;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DriverError::Timeout);
            }
            let budget = remaining.min(REQUEST_PID_INNER);
            match self.read(true, budget) {
                Ok(delivery) if matches_request(&delivery, mid, pid) => return Ok(delivery),
                Ok(_) => {}
                Err(DriverError::Empty) => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Build the `request_pid` wire frame, per spec §4.7 and the §9 Open
    /// Question on extended-page PIDs.
    fn request_frame(&self, mid: Mid, pid: u16) -> Vec<u8> {
        if pid < 255 {
            vec![self.config.my_mid, PID_REQUEST, pid as u8]
        } else if self.config.request_pid_extended_page_compat {
            // Conformance-bug-compatible: kept byte-for-byte from the
            // original, which itself flags this as wrong (should use PID
            // 256 framing, not a mod-256 wraparound on the page byte).
            debug!(mid, pid, "encoding extended-page PID request (compat mode)");
            vec![self.config.my_mid, PID_REQUEST, 255, (pid % 256) as u8]
        } else {
            vec![self.config.my_mid, PID_REQUEST, 255, (pid >> 8) as u8, (pid & 0xff) as u8]
        }
    }

    /// Terminate the worker spine and join every thread it owns, including
    /// live sessions (bounded by their own per-tick stop-signal checks).
    pub fn close(mut self) {
        if let Some(spine) = self.spine.take() {
            trace!("closing J1587 driver");
            spine.close();
        }
    }

    fn spine(&self) -> &SpineHandle {
        self.spine.as_ref().expect("spine taken only by close()")
    }
}

/// `true` if `bytes` begins with `[mid, pid_low]` (and, for extended-page
/// requests, the matching page byte), per the `request_pid` match rule.
fn matches_request(bytes: &[u8], mid: Mid, pid: u16) -> bool {
    if bytes.len() < 2 || bytes[0] != mid {
        return false;
    }
    if pid < 255 {
        bytes[1] as u16 == pid
    } else {
        bytes[1] == 255 && bytes.len() >= 3 && bytes[2] == (pid % 256) as u8
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    struct LoopbackLink {
        outbox: Mutex<VecDeque<Vec<u8>>>,
    }

    impl LoopbackLink {
        fn new() -> Self {
            Self {
                outbox: Mutex::new(VecDeque::new()),
            }
        }
    }

    impl LinkEndpoint for LoopbackLink {
        fn read(&self, timeout: Duration) -> Result<Option<Vec<u8>>, j1587_link::LinkError> {
            std::thread::sleep(Duration::from_millis(1));
            let _ = timeout;
            Ok(self.outbox.lock().unwrap().pop_front())
        }

        fn send(&self, buf: &[u8], has_checksum: bool) -> Result<(), j1587_link::LinkError> {
            let mut framed = buf.to_vec();
            if !has_checksum {
                append_checksum(&mut framed);
            }
            self.outbox.lock().unwrap().push_back(framed);
            Ok(())
        }
    }

    #[test]
    fn test_send_then_loopback_receive() {
        let link: Arc<dyn LinkEndpoint> = Arc::new(LoopbackLink::new());
        let config = DriverConfig::new(0xac).with_loopback(true);
        let driver = Driver::with_link(config, link);

        driver.send(b"\xff\x00");
        let delivery = driver.read(true, Duration::from_secs(1)).unwrap();
        assert_eq!(delivery, b"\xff\x00");

        driver.close();
    }

    #[test]
    fn test_read_empty_times_out() {
        let link: Arc<dyn LinkEndpoint> = Arc::new(LoopbackLink::new());
        let driver = Driver::with_link(DriverConfig::new(0xac), link);
        let result = driver.read(true, Duration::from_millis(20));
        assert!(matches!(result, Err(DriverError::Empty)));
        driver.close();
    }

    #[test]
    fn test_request_frame_short_pid() {
        let link: Arc<dyn LinkEndpoint> = Arc::new(LoopbackLink::new());
        let driver = Driver::with_link(DriverConfig::new(0xac), link);
        assert_eq!(driver.request_frame(0x80, 100), vec![0xac, 0, 100]);
        driver.close();
    }

    #[test]
    fn test_request_frame_extended_page_compat() {
        let link: Arc<dyn LinkEndpoint> = Arc::new(LoopbackLink::new());
        let driver = Driver::with_link(DriverConfig::new(0xac), link);
        assert_eq!(driver.request_frame(0x80, 300), vec![0xac, 0, 255, 44]);
        driver.close();
    }

    /// A link double that plays back a fixed script of inbound frames and
    /// records everything transmitted, for the end-to-end scenarios in
    /// spec §8.
    struct ScriptedLink {
        inbound: Mutex<VecDeque<Vec<u8>>>,
        transmitted: Mutex<Vec<Vec<u8>>>,
    }

    impl ScriptedLink {
        fn new(frames: Vec<Vec<u8>>) -> Self {
            Self {
                inbound: Mutex::new(frames.into()),
                transmitted: Mutex::new(Vec::new()),
            }
        }

        fn transmitted(&self) -> Vec<Vec<u8>> {
            self.transmitted.lock().unwrap().clone()
        }
    }

    impl LinkEndpoint for ScriptedLink {
        fn read(&self, _timeout: Duration) -> Result<Option<Vec<u8>>, j1587_link::LinkError> {
            let popped = self.inbound.lock().unwrap().pop_front();
            if popped.is_none() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(popped)
        }

        fn send(&self, buf: &[u8], has_checksum: bool) -> Result<(), j1587_link::LinkError> {
            let mut framed = buf.to_vec();
            if !has_checksum {
                append_checksum(&mut framed);
            }
            self.transmitted.lock().unwrap().push(framed);
            Ok(())
        }
    }

    fn framed(bytes: &[u8]) -> Vec<u8> {
        let mut out = bytes.to_vec();
        append_checksum(&mut out);
        out
    }

    #[test]
    fn test_s2_one_shot_receive() {
        let link_inner = Arc::new(ScriptedLink::new(vec![framed(b"\x80\x00")]));
        let link: Arc<dyn LinkEndpoint> = link_inner;
        let driver = Driver::with_link(DriverConfig::new(0xac), link);

        let delivered = driver.read(true, Duration::from_secs(1)).unwrap();
        assert_eq!(delivered, b"\x80\x00");

        driver.close();
    }

    #[test]
    fn test_s3_suppress_fragments_default_emits_cts() {
        let rts = b"\x80\xc5\x04\xac\x01\x01\x00\x01";
        let non_transport = b"\x80\x00";
        let link_inner = Arc::new(ScriptedLink::new(vec![framed(rts), framed(non_transport)]));
        let link: Arc<dyn LinkEndpoint> = Arc::clone(&link_inner) as Arc<dyn LinkEndpoint>;
        let driver = Driver::with_link(DriverConfig::new(0xac), link);

        let delivered = driver.read(true, Duration::from_secs(1)).unwrap();
        assert_eq!(delivered, non_transport);

        std::thread::sleep(Duration::from_millis(100));
        let expected_cts = framed(&j1587_frame::ConnFrame::cts(0xac, 0x80, 1, 1).to_bytes());
        assert!(link_inner.transmitted().contains(&expected_cts));

        driver.close();
    }

    #[test]
    fn test_s4_silent_receive_mirrors_fragment_and_stays_silent() {
        let rts = b"\x80\xc5\x04\xac\x01\x01\x00\x01";
        let link_inner = Arc::new(ScriptedLink::new(vec![framed(rts)]));
        let link: Arc<dyn LinkEndpoint> = Arc::clone(&link_inner) as Arc<dyn LinkEndpoint>;
        let config = DriverConfig::new(0xac)
            .with_silent(true)
            .with_suppress_fragments(false);
        let driver = Driver::with_link(config, link);

        let delivered = driver.read(true, Duration::from_secs(1)).unwrap();
        assert_eq!(delivered, rts);

        std::thread::sleep(Duration::from_millis(100));
        assert!(link_inner.transmitted().is_empty());

        driver.close();
    }

    #[test]
    fn test_s5_preempt_cts_transport_send() {
        let link_inner = Arc::new(ScriptedLink::new(Vec::new()));
        let link: Arc<dyn LinkEndpoint> = Arc::clone(&link_inner) as Arc<dyn LinkEndpoint>;
        let config = DriverConfig::new(0xac).with_preempt_cts(true);
        let driver = Driver::with_link(config, link);

        let payload = b"\x00\xc8\x07\x04\x06\x00\x46\x41\x41\x5a\x05\x48";
        driver.transport_send(0x80, payload).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        let transmitted = link_inner.transmitted();
        assert_eq!(transmitted.len(), 2);
        assert_eq!(transmitted[0], framed(b"\xac\xc5\x05\x80\x01\x01\x0c\x00"));
        assert_eq!(
            transmitted[1],
            framed(b"\xac\xc6\x0e\x80\x01\x00\xc8\x07\x04\x06\x00\x46\x41\x41\x5a\x05\x48")
        );

        driver.close();
    }

    #[test]
    fn test_s6_reassemble_others() {
        let rts = b"\xac\xc5\x05\x80\x01\x01\x0c\x00";
        let data = b"\xac\xc6\x0e\x80\x01\x00\xc8\x07\x04\x06\x00\x46\x41\x41\x5a\x05\x48";
        let link_inner = Arc::new(ScriptedLink::new(vec![framed(rts), framed(data)]));
        let link: Arc<dyn LinkEndpoint> = link_inner;
        let config = DriverConfig::new(0xb6).with_reassemble_others(true);
        let driver = Driver::with_link(config, link);

        let delivered = driver.read(true, Duration::from_secs(2)).unwrap();
        assert_eq!(
            delivered,
            b"\xac\x00\xc8\x07\x04\x06\x00\x46\x41\x41\x5a\x05\x48"
        );

        driver.close();
    }

    #[test]
    fn test_s7_multisection_reassembly() {
        let sections = multisection::section(0x80, 243, &[0xabu8; 33]);
        let frames = sections
            .into_iter()
            .map(|section| framed(&section.to_bytes()))
            .collect();
        let link_inner = Arc::new(ScriptedLink::new(frames));
        let link: Arc<dyn LinkEndpoint> = link_inner;
        let driver = Driver::with_link(DriverConfig::new(0xac), link);

        let delivered = driver.read(true, Duration::from_secs(2)).unwrap();
        let mut expected = vec![0x80u8, 243, 0x21];
        expected.extend_from_slice(&[0xabu8; 33]);
        assert_eq!(delivered, expected);

        driver.close();
    }
}

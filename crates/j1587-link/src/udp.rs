use std::net::UdpSocket;
use std::time::Duration;

use j1587_frame::append_checksum;
use tracing::{debug, warn};

use crate::endpoint::{LinkEndpoint, LinkError, RawFrame};
use crate::pacing::PacingClock;

/// `(serve_port, client_port)` pairs matching the TruckDuck ECM and DPA
/// buses exposed by the `ecm`/`non_ecm` upstart services.
pub const ECM: (u16, u16) = (6969, 6970);
pub const DPA: (u16, u16) = (6971, 6972);

/// Maximum UDP datagram size accepted from the bus bridge; comfortably
/// larger than any legal J1708 frame (21 bytes + checksum).
const RECV_BUF_SIZE: usize = 256;

/// A J1708 link endpoint backed by a local UDP bridge (e.g. TruckDuck's
/// `ecm`/`non_ecm` services), one port pair per bus.
pub struct UdpLink {
    socket: UdpSocket,
    host: String,
    serve_port: u16,
    pacing: PacingClock,
}

impl UdpLink {
    /// Bind to `ports.1` (the client/receive port) on `host` and prepare to
    /// transmit to `ports.0` (the serve port).
    ///
    /// # Errors
    ///
    /// Returns an error if the client port cannot be bound.
    pub fn new(ports: (u16, u16), host: impl Into<String>) -> Result<Self, LinkError> {
        let host = host.into();
        let (serve_port, client_port) = ports;
        let socket = UdpSocket::bind((host.as_str(), client_port))?;
        Ok(Self {
            socket,
            host,
            serve_port,
            pacing: PacingClock::new(),
        })
    }

    /// Bind the ECM bus on `localhost`.
    pub fn ecm() -> Result<Self, LinkError> {
        Self::new(ECM, "localhost")
    }

    /// Bind the DPA bus on `localhost`.
    pub fn dpa() -> Result<Self, LinkError> {
        Self::new(DPA, "localhost")
    }
}

impl LinkEndpoint for UdpLink {
    fn read(&self, timeout: Duration) -> Result<Option<RawFrame>, LinkError> {
        self.socket.set_read_timeout(Some(timeout))?;
        let mut buf = [0u8; RECV_BUF_SIZE];
        match self.socket.recv(&mut buf) {
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn send(&self, buf: &[u8], has_checksum: bool) -> Result<(), LinkError> {
        let mut msg = buf.to_vec();
        if !has_checksum {
            append_checksum(&mut msg);
        }
        self.pacing.wait_and_advance(msg.len());
        debug!(bytes = msg.len(), "transmitting J1708 frame over UDP");
        match self.socket.send_to(&msg, (self.host.as_str(), self.serve_port)) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "UDP send failed");
                Err(e.into())
            }
        }
    }
}

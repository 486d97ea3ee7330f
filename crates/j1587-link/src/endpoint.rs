use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`LinkEndpoint`] backend.
///
/// These are distinct from the facade-level `DriverError` in the `j1587`
/// crate; the facade maps every variant here onto `DriverError::LinkClosed`.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("J1708 link I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("J1708 link backend unavailable: {0}")]
    Unavailable(String),
}

/// A raw, complete J1708 frame as read from or written to the bus, including
/// its trailing checksum byte.
pub type RawFrame = Vec<u8>;

/// Reads and writes whole J1708 frames, enforcing bus pacing on transmit.
///
/// Implementations must serialize `send` internally: two threads calling
/// `send` concurrently must observe the pacing clock serially, never
/// interleaved with the underlying write.
pub trait LinkEndpoint: Send + Sync {
    /// Block for up to `timeout` for one complete frame (checksum byte
    /// included). Returns `Ok(None)` on timeout, never on a short read.
    fn read(&self, timeout: Duration) -> Result<Option<RawFrame>, LinkError>;

    /// Transmit `buf`. If `has_checksum` is `false`, a checksum byte is
    /// computed and appended before the frame is sent. Blocks until the
    /// pacing clock permits transmission.
    fn send(&self, buf: &[u8], has_checksum: bool) -> Result<(), LinkError>;
}

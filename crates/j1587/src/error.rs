use thiserror::Error;

/// Errors surfaced by the [`crate::facade`] public API, per spec §7.
///
/// Protocol-level failures (malformed frames, bad checksums, a session's
/// protocol violation) are handled internally by the worker spine and the
/// offending session; they never reach the facade directly. They only
/// become visible here as a `Timeout` (the operation that depended on them
/// never completed) or as silence (nothing arrives in the mailbox).
#[derive(Debug, Error)]
pub enum DriverError {
    /// `transport_send` did not complete within its 10-second session
    /// deadline, or `request_pid` saw no matching reply within its 80ms
    /// budget.
    #[error("operation timed out")]
    Timeout,
    /// `read` was called with a timeout and no message arrived.
    #[error("no message available")]
    Empty,
    /// A frame failed classification (too short, or an unrecognized
    /// connection-management control code).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// A frame's trailing checksum byte did not match.
    #[error("checksum verification failed")]
    ChecksumFailed,
    /// A session received a frame that violated its expected protocol
    /// state (e.g. a non-management frame while waiting for RTS/CTS). The
    /// session emits ABORT and terminates; this never reaches the facade.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// The link backend errored outside of shutdown.
    #[error("J1708 link closed: {0}")]
    LinkClosed(#[from] j1587_link::LinkError),
}

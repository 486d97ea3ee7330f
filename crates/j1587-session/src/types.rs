use j1587_frame::{ConnFrame, DataFrame, Mid};

/// A frame routed to a session by the worker spine.
///
/// Per the tagged-variant design in the driver's design notes, sessions
/// accumulate heterogeneous frame kinds without dynamic dispatch; this is
/// the session-facing half of that tag (the spine-facing half is
/// [`j1587_frame::FrameKind`]).
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Conn(ConnFrame),
    Data(DataFrame),
}

/// A raw, checksum-less frame a session hands to the spine for paced
/// transmission. The spine always forwards these with `has_checksum=false`.
pub type OutboundFrame = Vec<u8>;

/// A fully reassembled message delivered to the upper layer's mailbox.
pub type Delivery = Vec<u8>;

/// Identifies a transport session by its local and remote MID, matching the
/// session index key described in §3/§4.6: `(local_mid, peer_mid)`.
pub type SessionKey = (Mid, Mid);

/// Identifies a multisection accumulator by its peer MID and target PID.
pub type MultisectionKey = (Mid, u8);

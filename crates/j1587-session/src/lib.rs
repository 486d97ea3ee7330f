//! Connection-mode transport sessions (receive and send) and the
//! multisection parameter reassembler.
//!
//! Sessions own no shared state beyond what's threaded through their
//! constructor: the worker spine in the `j1587` crate is the sole mutator of
//! the session index described in the data model.

pub mod multisection;
pub mod receive;
pub mod send;
pub mod types;

pub use multisection::{MultisectionOutcome, MultisectionReassembler};
pub use receive::{ReceiveSession, StopSignal};
pub use send::{SendOutcome, SendSession};
pub use types::{Delivery, MultisectionKey, OutboundFrame, SessionEvent, SessionKey};

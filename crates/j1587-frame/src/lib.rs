//! Parsing and serialization for the J1708/J1587 wire formats: the frame
//! checksum, connection-management frames (PID 197), connection-mode
//! data-transfer frames (PID 198), and multisection parameter frames
//! (PID 192).
//!
//! This crate is pure: no I/O, no threads, no clocks. Everything here
//! operates on checksum-stripped byte slices already read from the link.

pub mod checksum;
pub mod classify;
pub mod conn;
pub mod data;
pub mod multisection;

pub use checksum::{append_checksum, checksum as frame_checksum, verify_checksum};
pub use classify::{classify, FrameKind};
pub use conn::{ConnFrame, ConnKind};
pub use data::DataFrame;
pub use multisection::MultisectionFrame;

/// An 8-bit J1587 Message Identifier.
pub type Mid = u8;

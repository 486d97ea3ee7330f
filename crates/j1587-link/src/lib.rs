//! J1708 link endpoints: UDP bridge and RP1210 vendor-DLL backends, bus
//! pacing, and the factory indirection the facade depends on for test
//! injection.

pub mod endpoint;
pub mod factory;
pub mod pacing;
pub mod rp1210;
pub mod udp;

pub use endpoint::{LinkEndpoint, LinkError, RawFrame};
pub use factory::{make_link, set_factory, CliLinkFactory, Interface, LinkFactory};
pub use pacing::PacingClock;
pub use rp1210::Rp1210Link;
pub use udp::{UdpLink, DPA, ECM};

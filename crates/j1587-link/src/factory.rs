use std::sync::{Mutex, OnceLock};

use clap::ValueEnum;

use crate::endpoint::{LinkEndpoint, LinkError};
use crate::rp1210::Rp1210Link;
use crate::udp::{UdpLink, DPA, ECM};

/// Which bus/backend a [`CliLinkFactory`] should construct, mirroring the
/// `--j1708-interface` CLI flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Interface {
    /// ECM bus over the UDP bridge.
    #[value(name = "j1708")]
    J1708,
    /// DPA bus over the UDP bridge.
    #[value(name = "j1708_2")]
    J17082,
    /// PLC fallback, also carried over the UDP bridge in this implementation.
    #[value(name = "plc")]
    Plc,
    /// Vendor RP1210 DLL.
    #[value(name = "rp1210")]
    Rp1210,
}

/// Constructs [`LinkEndpoint`]s. The facade depends on this trait rather than
/// a concrete backend so that tests can inject a fake link without threading
/// a dependency through every constructor (see `DESIGN.md`).
pub trait LinkFactory: Send + Sync {
    /// Construct a new link endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be constructed (e.g. a UDP
    /// port cannot be bound, or the RP1210 backend is selected on a
    /// non-Windows platform).
    fn make(&self) -> Result<Box<dyn LinkEndpoint>, LinkError>;
}

/// Builds link endpoints the way the `j1708dump`/`j1708send` CLIs do: one
/// `--j1708-interface` selection plus the host/DLL/device options that
/// apply to it.
#[derive(Clone, Debug)]
pub struct CliLinkFactory {
    pub interface: Interface,
    pub host: String,
    pub rp1210_dll: String,
    pub rp1210_device: u32,
}

impl Default for CliLinkFactory {
    fn default() -> Self {
        Self {
            interface: Interface::J1708,
            host: "localhost".to_string(),
            rp1210_dll: String::new(),
            rp1210_device: 0,
        }
    }
}

impl LinkFactory for CliLinkFactory {
    fn make(&self) -> Result<Box<dyn LinkEndpoint>, LinkError> {
        match self.interface {
            Interface::J1708 => Ok(Box::new(UdpLink::new(ECM, self.host.clone())?)),
            Interface::J17082 => Ok(Box::new(UdpLink::new(DPA, self.host.clone())?)),
            // The original source has no distinct PLC UDP port pair; PLC is
            // a protocol-string fallback on the RP1210 backend only. Over
            // the UDP bridge it behaves identically to the ECM bus.
            Interface::Plc => Ok(Box::new(UdpLink::new(ECM, self.host.clone())?)),
            Interface::Rp1210 => {
                if !cfg!(windows) {
                    return Err(LinkError::Unavailable(
                        "RP1210 backend is only available on Windows".to_string(),
                    ));
                }
                Ok(Box::new(Rp1210Link::new(
                    self.rp1210_dll.clone(),
                    self.rp1210_device,
                )))
            }
        }
    }
}

static DEFAULT_FACTORY: OnceLock<Mutex<Box<dyn LinkFactory>>> = OnceLock::new();

fn factory_lock() -> &'static Mutex<Box<dyn LinkFactory>> {
    DEFAULT_FACTORY.get_or_init(|| Mutex::new(Box::new(CliLinkFactory::default())))
}

/// Replace the process-wide default factory. Intended for tests to inject a
/// fake backend; production code should prefer constructing a facade with an
/// explicit [`LinkFactory`] rather than mutating global state.
pub fn set_factory(factory: Box<dyn LinkFactory>) {
    let mut guard = factory_lock().lock().expect("link factory lock poisoned");
    *guard = factory;
}

/// Construct a link endpoint via the process-wide default factory.
///
/// # Errors
///
/// Propagates whatever error the current factory's `make` returns.
pub fn make_link() -> Result<Box<dyn LinkEndpoint>, LinkError> {
    let guard = factory_lock().lock().expect("link factory lock poisoned");
    guard.make()
}

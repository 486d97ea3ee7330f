//! Shared `clap` args for the `j1708dump`/`j1708send` binaries: the
//! `--j1708-interface`/`--truckduck-host`/`--rp1210-*` link selection common
//! to both, per spec §6.

use clap::Parser;
use j1587_link::{CliLinkFactory, Interface};

#[derive(Debug, Parser)]
pub struct LinkArgs {
    /// Which J1708/J1587 bus to use.
    #[clap(long, default_value = "j1708")]
    pub j1708_interface: Interface,

    /// Host the UDP bridge (TruckDuck `ecm`/`non_ecm` services) listens on.
    #[clap(long, default_value = "localhost")]
    pub truckduck_host: String,

    /// RP1210 vendor DLL name, used only when `--j1708-interface=rp1210`.
    #[clap(long, default_value = "")]
    pub rp1210_dll: String,

    /// RP1210 device id, used only when `--j1708-interface=rp1210`.
    #[clap(long, default_value_t = 0)]
    pub rp1210_device: u32,

    /// List available RP1210 adapters and exit.
    ///
    /// This backend isn't available on this build; the flag always exits 1.
    #[clap(long)]
    pub list_rp1210: bool,
}

impl LinkArgs {
    #[must_use]
    pub fn into_factory(self) -> CliLinkFactory {
        CliLinkFactory {
            interface: self.j1708_interface,
            host: self.truckduck_host,
            rp1210_dll: self.rp1210_dll,
            rp1210_device: self.rp1210_device,
        }
    }
}

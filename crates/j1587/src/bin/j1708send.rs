use std::io::IsTerminal;

use clap::{Parser, Subcommand};
use j1587::cli::LinkArgs;
use j1587::config::DriverConfig;
use j1587::facade::Driver;

/// Transmit J1587/J1708 messages onto the bus.
///
#[derive(Debug, Parser)]
#[clap(version, verbatim_doc_comment)]
struct Args {
    #[clap(short, long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    /// Local MID to present on the bus.
    #[clap(long, default_value_t = 0xac)]
    my_mid: u8,

    #[command(flatten)]
    link: LinkArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a single raw frame with no fragmentation or acknowledgment.
    Raw {
        /// Hex-encoded frame bytes (checksum appended by the link).
        hex: String,
    },
    /// Start a connection-mode transport send session and wait for it to
    /// complete.
    Transport {
        /// Destination MID.
        #[clap(value_parser = parse_mid)]
        dst: u8,
        /// Hex-encoded payload to fragment and send.
        hex: String,
        /// Skip the CTS handshake and send all segments immediately.
        #[clap(long)]
        preempt_cts: bool,
    },
    /// Broadcast a PID-tagged parameter, using multisection framing when
    /// the payload exceeds one frame. Multisection parameters carry no
    /// destination MID.
    Pid {
        /// Target PID.
        #[clap(value_parser = parse_mid)]
        pid: u8,
        /// Hex-encoded payload.
        hex: String,
    },
}

fn parse_mid(s: &str) -> Result<u8, std::num::ParseIntError> {
    if let Some(stripped) = s.strip_prefix("0x") {
        u8::from_str_radix(stripped, 16)
    } else {
        s.parse()
    }
}

fn main() -> eyre::Result<()> {
    let use_color = std::io::stderr().is_terminal();
    if use_color {
        color_eyre::install()?;
    }

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(args.log_level.into())
        .with_env_var("J1587_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_color)
        .with_writer(std::io::stderr)
        .init();

    if args.link.list_rp1210 {
        tracing::error!("RP1210 backend unavailable on this build: no vendor DLL binding");
        std::process::exit(1);
    }

    let factory = args.link.into_factory();
    let preempt_cts = matches!(&args.command, Command::Transport { preempt_cts: true, .. });
    let config = DriverConfig::new(args.my_mid).with_preempt_cts(preempt_cts);

    let driver = match Driver::new(config, &factory) {
        Ok(driver) => driver,
        Err(e) => {
            tracing::error!(error = %e, "failed to open J1708 link");
            std::process::exit(1);
        }
    };

    match args.command {
        Command::Raw { hex } => {
            let bytes = hex::decode(&hex)?;
            driver.send(&bytes);
            tracing::info!(bytes = bytes.len(), "sent raw frame");
        }
        Command::Transport { dst, hex, .. } => {
            let payload = hex::decode(&hex)?;
            match driver.transport_send(dst, &payload) {
                Ok(()) => tracing::info!(dst, bytes = payload.len(), "transport send completed"),
                Err(e) => {
                    tracing::error!(error = %e, dst, "transport send failed");
                    driver.close();
                    std::process::exit(1);
                }
            }
        }
        Command::Pid { pid, hex } => {
            let payload = hex::decode(&hex)?;
            driver.pid_send(pid, &payload);
            tracing::info!(pid, bytes = payload.len(), "pid send enqueued");
        }
    }

    driver.close();
    Ok(())
}

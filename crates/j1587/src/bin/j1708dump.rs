use std::io::{IsTerminal, Write};
use std::time::Duration;

use clap::Parser;
use j1587::cli::LinkArgs;
use j1587::config::DriverConfig;
use j1587::facade::Driver;
use j1587_utils::FilterExpr;

/// Dump J1587/J1708 traffic to stdout, one message per line, hex-encoded.
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

    /// Only show frames matching this `hex[:mask]` expression. May be
    /// repeated; a frame matching any `--show` expression is shown.
    #[clap(long = "show")]
    show: Vec<FilterExpr>,

    /// Hide frames matching this `hex[:mask]` expression. May be repeated;
    /// hiding always wins over showing.
    #[clap(long = "hide")]
    hide: Vec<FilterExpr>,

    /// Print the trailing checksum byte alongside the frame.
    #[clap(long, default_value_t = false)]
    show_checksums: bool,

    /// Discard frames whose trailing checksum byte doesn't match. Pass
    /// `--validate false` to show them on the mailbox instead.
    #[clap(long, action = clap::ArgAction::Set, default_value_t = true)]
    validate: bool,

    /// Reassemble connection-mode and multisection traffic not addressed to
    /// `--my-mid`, sniffing the bus passively.
    #[clap(long)]
    promiscuous: bool,
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
    let config = DriverConfig::new(args.my_mid)
        .with_silent(true)
        .with_suppress_fragments(false)
        .with_reassemble_others(args.promiscuous)
        .with_pass_invalid_messages(!args.validate);

    let driver = match Driver::new(config, &factory) {
        Ok(driver) => driver,
        Err(e) => {
            tracing::error!(error = %e, "failed to open J1708 link");
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();

    loop {
        match driver.read(true, Duration::from_secs(1)) {
            Ok(delivery) => {
                if !j1587_utils::filter::passes(&delivery, &args.show, &args.hide) {
                    continue;
                }
                let mut line = hex::encode(&delivery);
                if args.show_checksums {
                    let mut framed = delivery.clone();
                    j1587_frame::append_checksum(&mut framed);
                    line.push(' ');
                    line.push_str(&hex::encode([*framed.last().expect("checksum just appended")]));
                }
                writeln!(writer, "{line}")?;
            }
            Err(j1587::DriverError::Empty) => {}
            Err(e) => {
                tracing::warn!(error = %e, "read failed");
            }
        }
    }
}

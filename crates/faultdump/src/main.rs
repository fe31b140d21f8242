//! Command-line driver for faultdump: arms the SIGSEGV handler, then
//! raises a fault on purpose.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use libfaultdump::probe::DEFAULT_RADIUS;
use libfaultdump::trigger::{FaultKind, exhaust_descriptors};
use libfaultdump::{HandlerConfig, handler};
use log::{debug, info};

/// Top-level argument parser.
#[derive(Parser, Debug)]
#[command(name = "faultdump", version, about = "Dump registers and memory on SIGSEGV", long_about = None)]
struct Cli {
    /// Bytes dumped on each side of the faulting address.
    #[arg(long, global = true, env = "FAULTDUMP_RADIUS", default_value_t = DEFAULT_RADIUS)]
    radius: usize,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install the handler and raise a fault.
    Trigger {
        #[arg(value_enum)]
        kind: Fault,
        /// Make probe-pipe creation fail inside the handler.
        #[arg(long)]
        exhaust_fds: bool,
    },
    /// Display version information for diagnostics.
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Fault {
    /// Write to the null pointer.
    NullWrite,
    /// Write into a read-only string literal.
    ReadOnlyWrite,
}

impl From<Fault> for FaultKind {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::NullWrite => FaultKind::NullWrite,
            Fault::ReadOnlyWrite => FaultKind::ReadOnlyWrite,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Trigger { kind, exhaust_fds } => trigger(cli.radius, kind.into(), exhaust_fds),
        Command::Version => {
            println!("faultdump {}", libfaultdump::version());
            Ok(())
        }
    }
}

fn trigger(radius: usize, kind: FaultKind, exhaust_fds: bool) -> Result<()> {
    let config = HandlerConfig::default().with_radius(radius)?;
    libfaultdump::install(&config).context("Sigaction failed")?;
    debug!("handler state: {:?}", handler::state());
    if exhaust_fds {
        exhaust_descriptors().context("could not lower RLIMIT_NOFILE")?;
    }
    info!("Raising {kind:?}");
    kind.raise();
    anyhow::bail!("{kind:?} did not fault")
}

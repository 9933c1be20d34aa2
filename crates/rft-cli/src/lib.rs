pub mod net;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use rft_core::log::ArrivalLog;
use rft_core::receiver::{ReceiverEngine, run_receiver};
use rft_core::sender::{SenderEngine, WINDOW_FLOOR, run_sender};

use crate::net::UdpChannel;

#[derive(Parser, Debug)]
#[command(author, version, about = "Reliable file transfer over a lossy UDP relay")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a file through the relay.
    Send(SendArgs),
    /// Receive a file from the relay.
    Recv(RecvArgs),
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Relay (network emulator) hostname or address.
    #[arg(long)]
    pub relay_host: String,

    #[arg(long)]
    pub relay_port: u16,

    /// Local UDP port to bind.
    #[arg(long)]
    pub bind_port: u16,

    /// Round timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: u64,

    /// Maximum window size in packets.
    #[arg(long)]
    pub max_window: u32,

    /// ASCII input file to transfer.
    pub input: PathBuf,

    /// Write a JSON transfer report here on completion.
    #[arg(long)]
    pub report_out: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct RecvArgs {
    /// Relay (network emulator) hostname or address.
    #[arg(long)]
    pub relay_host: String,

    #[arg(long)]
    pub relay_port: u16,

    /// Local UDP port to bind.
    #[arg(long)]
    pub bind_port: u16,

    /// Reorder-buffer capacity in packets.
    #[arg(long)]
    pub buffer_size: u32,

    /// Output file (created or truncated).
    pub output: PathBuf,

    /// Arrival log path.
    #[arg(long, default_value = "arrival.log")]
    pub arrival_log: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Send(args) => run_send(args),
        Command::Recv(args) => run_recv(args),
    }
}

fn run_send(args: SendArgs) -> Result<()> {
    // Configuration and input problems must be fatal before any socket
    // activity.
    if args.timeout_ms == 0 {
        bail!("timeout must be a positive number of milliseconds");
    }
    if args.max_window < WINDOW_FLOOR {
        bail!("maximum window size must be at least {WINDOW_FLOOR}");
    }
    let input = fs::read(&args.input)
        .with_context(|| format!("failed to read input file {}", args.input.display()))?;
    let mut engine = SenderEngine::new(&input, args.max_window)
        .with_context(|| format!("input file {} must be ASCII text", args.input.display()))?;

    let mut channel = UdpChannel::bind(args.bind_port, (args.relay_host.as_str(), args.relay_port))
        .context("failed to bind sender socket")?;
    info!(
        input = %args.input.display(),
        packets = engine.packet_count(),
        relay = %format!("{}:{}", args.relay_host, args.relay_port),
        "sender ready"
    );

    let report = run_sender(
        &mut channel,
        &mut engine,
        Duration::from_millis(args.timeout_ms),
    )?;

    if let Some(path) = &args.report_out {
        let json =
            serde_json::to_vec_pretty(&report).context("failed to serialize transfer report")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(report = %path.display(), "transfer report written");
    }
    Ok(())
}

fn run_recv(args: RecvArgs) -> Result<()> {
    if args.buffer_size == 0 {
        bail!("buffer size must be at least 1 packet");
    }
    let output = File::create(&args.output)
        .with_context(|| format!("failed to create output file {}", args.output.display()))?;
    let mut output = BufWriter::new(output);
    let log_file = File::create(&args.arrival_log).with_context(|| {
        format!("failed to create arrival log {}", args.arrival_log.display())
    })?;
    let mut log = ArrivalLog::new(BufWriter::new(log_file));

    let mut channel = UdpChannel::bind(args.bind_port, (args.relay_host.as_str(), args.relay_port))
        .context("failed to bind receiver socket")?;
    let mut engine = ReceiverEngine::new(args.buffer_size);
    info!(
        output = %args.output.display(),
        buffer = args.buffer_size,
        "receiver ready"
    );

    let summary = run_receiver(&mut channel, &mut engine, &mut output, &mut log)?;
    info!(
        packets = summary.delivered_packets,
        bytes = summary.delivered_bytes,
        "output file complete"
    );
    Ok(())
}

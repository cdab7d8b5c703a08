//! RDT Simulator - runs a reliable transfer over a faulty virtual link
//!
//! Loads a TOML configuration (or the defaults), applies command-line
//! overrides, runs the simulation and checks that delivery matched
//! submission.

use clap::Parser;
use rdt_protocol::{ArqMode, MessageFraming};
use rdt_sim::{display_report, SimConfig, Simulation};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rdt-sim")]
#[command(about = "Reliable data transfer simulator", long_about = None)]
struct Args {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of messages to submit
    #[arg(short, long)]
    messages: Option<usize>,

    /// Probability a packet is lost
    #[arg(long)]
    loss: Option<f64>,

    /// Probability a packet is corrupted
    #[arg(long)]
    corrupt: Option<f64>,

    /// Probability a packet is duplicated
    #[arg(long)]
    duplicate: Option<f64>,

    /// Probability a packet is reordered
    #[arg(long)]
    reorder: Option<f64>,

    /// Window size in packets
    #[arg(short, long)]
    window: Option<usize>,

    /// Fixed packet size in bytes
    #[arg(short, long)]
    packet_size: Option<usize>,

    /// Base retransmission interval in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Receive policy (selective-repeat, go-back-n)
    #[arg(long)]
    mode: Option<String>,

    /// Message framing (stream, length-prefixed)
    #[arg(long)]
    framing: Option<String>,

    /// Seed for every random stream
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_mode(mode: &str) -> anyhow::Result<ArqMode> {
    match mode {
        "selective-repeat" | "sr" => Ok(ArqMode::SelectiveRepeat),
        "go-back-n" | "gbn" => Ok(ArqMode::GoBackN),
        other => anyhow::bail!("Unknown mode '{}' (use selective-repeat or go-back-n)", other),
    }
}

fn parse_framing(framing: &str) -> anyhow::Result<MessageFraming> {
    match framing {
        "stream" => Ok(MessageFraming::Stream),
        "length-prefixed" => Ok(MessageFraming::LengthPrefixed),
        other => anyhow::bail!("Unknown framing '{}' (use stream or length-prefixed)", other),
    }
}

fn apply_overrides(config: &mut SimConfig, args: &Args) -> anyhow::Result<()> {
    if let Some(messages) = args.messages {
        config.workload.message_count = messages;
    }
    if let Some(loss) = args.loss {
        config.channel.loss_rate = loss;
    }
    if let Some(corrupt) = args.corrupt {
        config.channel.corruption_rate = corrupt;
    }
    if let Some(duplicate) = args.duplicate {
        config.channel.duplication_rate = duplicate;
    }
    if let Some(reorder) = args.reorder {
        config.channel.reorder_rate = reorder;
    }
    if let Some(window) = args.window {
        config.protocol.window_size = window;
    }
    if let Some(packet_size) = args.packet_size {
        config.protocol.packet_size = packet_size;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.protocol.retransmit_timeout_ms = timeout_ms;
    }
    if let Some(ref mode) = args.mode {
        config.protocol.mode = parse_mode(mode)?;
    }
    if let Some(ref framing) = args.framing {
        config.protocol.framing = parse_framing(framing)?;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match args.config {
        Some(ref path) => {
            tracing::info!("Loading configuration from {}", path.display());
            SimConfig::from_file(path)?
        }
        None => SimConfig::default(),
    };
    apply_overrides(&mut config, &args)?;
    config.validate()?;

    if args.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    tracing::info!(
        seed = config.seed,
        packet_size = config.protocol.packet_size,
        window = config.protocol.window_size,
        "RDT Simulator starting..."
    );

    let report = Simulation::new(config)?.run()?;
    display_report(&report);

    if let Err(e) = report.verify() {
        anyhow::bail!("Verification failed: {}", e);
    }

    tracing::info!("Delivered data verified");
    Ok(())
}

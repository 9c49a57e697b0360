//! sluice-pipe - Push a file through one decode stage
//!
//! Splits the input into fixed-size deliveries, runs them through a
//! `StreamingDecodeLoop` against the in-memory host, and writes every
//! emitted output buffer to the output file. Draining the host after each
//! pass plays the part of the downstream consumer freeing buffers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use sluice_common::config::TomlConfig;
use sluice_common::logging::init_tracing;
use sluice_stage::codecs::{FramedPcmDecoder, PcmDecoder};
use sluice_stage::{
    ConnectorId, ConnectorInfo, Decoder, MemoryHost, StageConfig, StreamingDecodeLoop,
};
use tracing::{debug, error, info};

const INPUT: ConnectorId = ConnectorId(0);
const OUTPUT: ConnectorId = ConnectorId(1);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Codec {
    /// Headerless s16le PCM (needs --rate and --channels)
    Pcm,
    /// SLPK packets carrying their own format headers
    Framed,
}

/// Command-line arguments for sluice-pipe
#[derive(Parser, Debug)]
#[command(name = "sluice-pipe")]
#[command(about = "Run a file through a sluice decode stage")]
#[command(version)]
struct Args {
    /// Compressed input file
    input: PathBuf,

    /// Decoded f32le output file
    output: PathBuf,

    /// Input codec
    #[arg(long, value_enum, default_value = "pcm")]
    codec: Codec,

    /// Sample rate for headerless PCM
    #[arg(long, default_value = "44100")]
    rate: u32,

    /// Channel count for headerless PCM
    #[arg(long, default_value = "2")]
    channels: u16,

    /// Bytes per input delivery
    #[arg(long, default_value = "4096")]
    chunk_size: usize,

    /// Capacity of each output buffer in bytes
    #[arg(long, default_value = "8192")]
    output_buffer_size: usize,

    /// Number of output buffers in the host pool
    #[arg(long, default_value = "4")]
    output_buffers: usize,

    /// Configuration file (overrides SLUICE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print each stage event as a JSON line on stdout
    #[arg(long)]
    events_json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) = TomlConfig::load_resolved(args.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;
    source.log();

    info!("Starting sluice-pipe v{}", env!("CARGO_PKG_VERSION"));

    if args.chunk_size == 0 {
        bail!("--chunk-size must be greater than zero");
    }
    if args.output_buffer_size == 0 || args.output_buffers == 0 {
        bail!("--output-buffer-size and --output-buffers must be greater than zero");
    }

    let stage_config =
        StageConfig::from_settings(&config.stage).context("Invalid [stage] configuration")?;

    let decoder: Box<dyn Decoder> = match args.codec {
        Codec::Pcm => Box::new(
            PcmDecoder::new(args.rate, args.channels).context("Invalid PCM parameters")?,
        ),
        Codec::Framed => Box::new(FramedPcmDecoder::new()),
    };

    let data = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let out_file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut writer = BufWriter::new(out_file);

    info!(
        "{} -> {} ({} bytes, {:?}, {}-byte deliveries)",
        args.input.display(),
        args.output.display(),
        data.len(),
        args.codec,
        args.chunk_size
    );

    let mut host = MemoryHost::new(&[ConnectorInfo::input(0), ConnectorInfo::output(1)]);
    host.add_output_buffers(OUTPUT, args.output_buffers, args.output_buffer_size);

    let mut stage = StreamingDecodeLoop::new(&stage_config, decoder)
        .context("Failed to construct stage")?;
    stage.discover(&mut host).context("Connector discovery failed")?;

    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![&data[..]]
    } else {
        data.chunks(args.chunk_size).collect()
    };
    let mut next_chunk = 0;
    let mut written_total = 0usize;
    let mut passes = 0usize;

    loop {
        passes += 1;

        let mut queued = false;
        if host.pending(INPUT) == 0 && next_chunk < chunks.len() {
            let last = next_chunk + 1 == chunks.len();
            host.queue_input(INPUT, chunks[next_chunk], last);
            next_chunk += 1;
            queued = true;
        }

        let result = stage.process(&mut host);
        emit_events(&mut host, args.events_json)?;
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("Stage failed after {} pass(es): {}", passes, e);
                return Err(e).context("Decode failed");
            }
        };

        let drained = host.drain_output(OUTPUT);
        writer
            .write_all(&drained)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
        written_total += drained.len();

        debug!(
            "Pass {}: {:?}, {} byte(s) drained",
            passes,
            report.stop,
            drained.len()
        );

        if host.eos_count(OUTPUT) > 0 {
            break;
        }
        if !queued && !report.made_progress() && drained.is_empty() {
            bail!(
                "Stage stalled after {} pass(es) ({:?}); {} of {} deliveries queued",
                passes,
                report.stop,
                next_chunk,
                chunks.len()
            );
        }
    }

    writer.flush().context("Failed to flush output")?;

    info!(
        "Done: {} pass(es), {} input bytes, {} output bytes{}",
        passes,
        data.len(),
        written_total,
        stage
            .format()
            .map(|f| format!(" at {}", f))
            .unwrap_or_default()
    );
    Ok(())
}

fn emit_events(host: &mut MemoryHost, as_json: bool) -> Result<()> {
    for event in host.take_events() {
        if as_json {
            println!(
                "{}",
                serde_json::to_string(&event).context("Failed to serialize event")?
            );
        } else {
            debug!("Event: {:?}", event);
        }
    }
    Ok(())
}

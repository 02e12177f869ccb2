//! `rtp-extract` — list, dump, and replay RTP streams recovered from a
//! packet capture.
//!
//! This binary is the external-collaborator shell around
//! `rtp-extract-core`: argument parsing, interactive stream/codec
//! selection, and the replay driver loop all live here; the packet-to-
//! media pipeline itself is in the library crate.

mod error;
mod prompt;

use std::collections::HashMap;
use std::fs::File;
use std::io::Write as _;
use std::net::ToSocketAddrs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use error::{CliError, Result};
use rtp_extract::keystore::KeyStore;
use rtp_extract::media::{self, CodecMetadata};
use rtp_extract::stream::{RtpStream, StreamIndex};
use rtp_extract::{capture, replay};

const BANNER: &str = r"
     /\_/\
    ( o.o )
     > ^ <
";

#[derive(Parser)]
#[command(name = "rtp-extract", version, before_help = BANNER)]
#[command(about = "Recover RTP streams from a packet capture and extract or replay them")]
struct Cli {
    /// ESP key file (SPI -> algorithm/key), used to decrypt tunnelled RTP.
    #[arg(short = 'k', long = "key-file", global = true, default_value = "esp-keys.txt")]
    key_file: PathBuf,

    /// Verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List RTP streams found in a capture.
    #[command(alias = "s")]
    Streams { capture: PathBuf },

    /// Dump a stream's payload to a codec-specific media file.
    #[command(alias = "d")]
    Dump {
        capture: PathBuf,

        /// Output file. Required unless --interactive.
        output: Option<PathBuf>,

        /// Prompt interactively for stream, codec, and options.
        #[arg(short, long)]
        interactive: bool,

        /// 1-based stream index, as printed by `streams` (non-interactive).
        #[arg(long, conflicts_with = "ssrc")]
        index: Option<usize>,

        /// Stream SSRC in hex, e.g. 0xdeadbeef (non-interactive).
        #[arg(long)]
        ssrc: Option<String>,

        /// Codec short name, e.g. amr or h264 (non-interactive).
        #[arg(short, long)]
        codec: Option<String>,

        /// Comma-separated codec options, e.g. sample-rate=nb,octet-aligned=1.
        #[arg(long = "codec-options")]
        codec_options: Option<String>,
    },

    /// Replay a stream (or all streams) over UDP, preserving capture timing.
    Play {
        capture: PathBuf,

        /// 1-based stream index (omit with --all to replay every stream).
        #[arg(long, conflicts_with_all = ["ssrc", "all"])]
        index: Option<usize>,

        /// Stream SSRC in hex.
        #[arg(long, conflicts_with = "all")]
        ssrc: Option<String>,

        /// Replay every stream concurrently; stream i plays to port + 2*i.
        #[arg(long)]
        all: bool,

        #[arg(long, default_value = "localhost")]
        host: String,

        #[arg(long, default_value_t = 1234)]
        port: u16,
    },

    /// List supported codecs and their configuration options.
    #[command(alias = "c")]
    Codecs {
        #[command(subcommand)]
        command: CodecsCommand,
    },
}

#[derive(Subcommand)]
enum CodecsCommand {
    /// Describe one codec, or every codec if no name is given.
    List { name: Option<String> },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    run(cli)?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Streams { capture } => streams_cmd(&capture, &cli.key_file),
        Command::Dump {
            capture,
            output,
            interactive,
            index,
            ssrc,
            codec,
            codec_options,
        } => dump_cmd(
            &capture,
            &cli.key_file,
            output,
            interactive,
            index,
            ssrc,
            codec,
            codec_options,
        ),
        Command::Play {
            capture,
            index,
            ssrc,
            all,
            host,
            port,
        } => play_cmd(&capture, &cli.key_file, index, ssrc, all, &host, port),
        Command::Codecs { command } => codecs_cmd(command),
    }
}

fn load_streams(capture_path: &PathBuf, key_file: &PathBuf) -> Result<StreamIndex> {
    let keystore = KeyStore::load(key_file)?;
    Ok(capture::extract_streams(capture_path, &keystore)?)
}

fn streams_cmd(capture_path: &PathBuf, key_file: &PathBuf) -> Result<()> {
    let streams = load_streams(capture_path, key_file)?;
    for stream in streams.streams() {
        println!("{stream}");
    }
    Ok(())
}

fn parse_ssrc(text: &str) -> Result<u32> {
    let text = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    u32::from_str_radix(text, 16).map_err(|_| CliError::Usage(format!("invalid SSRC '{text}'")))
}

/// Resolve a stream by 1-based `index` or hex `ssrc`; exactly one of the
/// two selectors is expected to be `Some` (clap enforces mutual exclusion).
fn select_stream<'s>(
    streams: &'s StreamIndex,
    index: Option<usize>,
    ssrc: Option<&str>,
) -> Result<&'s RtpStream> {
    if let Some(index) = index {
        return streams
            .get(index.wrapping_sub(1))
            .ok_or(CliError::StreamIndexOutOfRange(index));
    }
    if let Some(ssrc) = ssrc {
        let ssrc = parse_ssrc(ssrc)?;
        return streams.by_ssrc(ssrc).ok_or(CliError::UnknownSsrc(ssrc));
    }
    Err(CliError::Usage(
        "dump/play need either --index or --ssrc in non-interactive mode".into(),
    ))
}

fn parse_codec_options(text: &str) -> Result<HashMap<String, String>> {
    let mut options = HashMap::new();
    for pair in text.split(',').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| CliError::Usage(format!("codec option '{pair}' is not key=value")))?;
        options.insert(key.to_string(), value.to_string());
    }
    Ok(options)
}

#[allow(clippy::too_many_arguments)]
fn dump_cmd(
    capture_path: &PathBuf,
    key_file: &PathBuf,
    output: Option<PathBuf>,
    interactive: bool,
    index: Option<usize>,
    ssrc: Option<String>,
    codec: Option<String>,
    codec_options: Option<String>,
) -> Result<()> {
    let streams = load_streams(capture_path, key_file)?;
    if streams.is_empty() {
        println!("no streams found");
        return Ok(());
    }

    if interactive {
        return interactive_dump(&streams);
    }

    let stream = select_stream(&streams, index, ssrc.as_deref())?;
    let codec_name = codec.ok_or_else(|| CliError::Usage("dump needs --codec in non-interactive mode".into()))?;
    let options = codec_options
        .as_deref()
        .map(parse_codec_options)
        .transpose()?
        .unwrap_or_default();
    let output = output.ok_or_else(|| CliError::Usage("dump needs an output path in non-interactive mode".into()))?;

    write_dump(stream, &codec_name, &options, &output)
}

fn interactive_dump(streams: &StreamIndex) -> Result<()> {
    let list = streams.streams();
    let index = prompt::expect_int_range(
        || {
            println!("Choose RTP Stream:");
            for (i, s) in list.iter().enumerate() {
                println!("({:03}) {s}", i + 1);
            }
            print!("[1-{}]: ", list.len());
        },
        1,
        list.len(),
    )?;
    let stream = &list[index - 1];
    println!("({:<3}) {stream}\n", index);

    let registry = media::registry();
    let codec_index = prompt::expect_int_range(
        || {
            println!("Choose codec:");
            for (i, m) in registry.iter().enumerate() {
                println!("({:03}) {}", i + 1, m.short_name);
            }
            print!("[1-{}]: ", registry.len());
        },
        1,
        registry.len(),
    )?;
    let metadata = &registry[codec_index - 1];
    println!("({:<3}) {}\n", codec_index, metadata.short_name);

    let mut options = HashMap::new();
    for opt in metadata.options {
        let value = if let Some(values) = opt.restricted_values {
            let valid: Vec<&str> = values.iter().map(|(v, _)| *v).collect();
            prompt::expect_restricted_string(
                || {
                    println!("{} - {}required", opt.name, if opt.required { "" } else { "not " });
                    for (v, desc) in values {
                        println!("({v}) {desc}");
                    }
                },
                &valid,
            )?
        } else {
            prompt::expect_any_string(|| println!("{}: ", opt.name))?
        };
        options.insert(opt.name.to_string(), value);
    }

    let output = prompt::expect_any_string(|| print!("Output file: "))?;
    println!("{output}");

    write_dump(stream, metadata.short_name, &options, &PathBuf::from(output))
}

/// Configure the named codec, feed it every accepted packet in order, and
/// write the resulting bytes. Per-packet depayload errors are logged and
/// skipped; the output file is always flushed and closed, even
/// if every packet failed.
fn write_dump(
    stream: &RtpStream,
    codec_name: &str,
    options: &HashMap<String, String>,
    output: &PathBuf,
) -> Result<()> {
    let mut depayloader = media::configure(codec_name, options)?;
    let mut file = File::create(output)?;
    file.write_all(depayloader.format_magic())?;

    let mut written = 0usize;
    let mut skipped = 0usize;
    for packet in stream.packets() {
        match depayloader.handle_rtp_packet(packet) {
            Ok(bytes) => {
                file.write_all(&bytes)?;
                written += 1;
            }
            Err(err) => {
                tracing::warn!(sequence = packet.sequence_number, error = %err, "packet skipped");
                skipped += 1;
            }
        }
    }
    file.flush()?;

    println!("wrote {written} packet(s) to {}, skipped {skipped}", output.display());
    Ok(())
}

fn play_cmd(
    capture_path: &PathBuf,
    key_file: &PathBuf,
    index: Option<usize>,
    ssrc: Option<String>,
    all: bool,
    host: &str,
    port: u16,
) -> Result<()> {
    let streams = load_streams(capture_path, key_file)?;
    if streams.is_empty() {
        println!("no streams found");
        return Ok(());
    }

    // Resolve early so a bad host:port is reported before any UDP traffic.
    (host, port)
        .to_socket_addrs()
        .map_err(|_| CliError::Usage(format!("cannot resolve {host}:{port}")))?;

    if all {
        let refs: Vec<&RtpStream> = streams.streams().iter().collect();
        println!("replaying {} stream(s) to {host}, base port {port}", refs.len());
        replay::replay_streams(&refs, host, port)?;
        return Ok(());
    }

    let stream = select_stream(&streams, index, ssrc.as_deref())?;
    println!(
        "replaying {} packet(s) from {} to {host}:{port}",
        stream.packets().len(),
        stream.ssrc_hex()
    );
    replay::replay_stream(stream, host, port)?;
    Ok(())
}

fn codecs_cmd(command: CodecsCommand) -> Result<()> {
    let CodecsCommand::List { name } = command;

    let mut found = name.is_none();
    for metadata in media::registry() {
        if found || name.as_deref() == Some(metadata.short_name) {
            print_codec(metadata);
            found = true;
        }
    }
    if !found {
        println!("codec {} not available", name.unwrap_or_default());
    }
    Ok(())
}

fn print_codec(metadata: &CodecMetadata) {
    print!("{metadata}");
}

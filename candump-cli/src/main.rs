//! candump decoder CLI
//!
//! Reads `candump` output from standard input and decodes it with a DBC database:
//! - without `--csv`, every line is echoed with the decoded message appended
//! - with `--csv FILE`, timestamped `candump -L` lines become rows of a sparse CSV

use anyhow::{Context, Result};
use candump_decoder::{decode_stream, decode_stream_to_csv, DecodeConfig, Decoder};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

mod config;

/// Decode "candump" CAN frames read from standard input
#[derive(Parser, Debug)]
#[command(name = "candump-decode")]
#[command(
    about = "Decode \"candump\" CAN frames read from standard input and print them in a human readable format",
    long_about = None
)]
#[command(version)]
struct Args {
    /// Database file (.dbc)
    #[arg(value_name = "DATABASE")]
    database: Option<PathBuf>,

    /// Do not convert scaled values to choice strings
    #[arg(short = 'c', long)]
    no_decode_choices: bool,

    /// Print the decoded message on a single line
    #[arg(short, long)]
    single_line: bool,

    /// File encoding of the database
    #[arg(short, long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// Skip database consistency checks
    #[arg(long)]
    no_strict: bool,

    /// Only compare selected frame id bits to find the message in the database
    #[arg(short = 'm', long, value_name = "MASK", value_parser = parse_mask)]
    frame_id_mask: Option<u32>,

    /// Write decoded frames to a sparse CSV file (input must be `candump -L`)
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Number of lines used to collect CSV header names
    #[arg(long, value_name = "LINES")]
    start: Option<u64>,

    /// Quit after this many lines (0 = read to end of input)
    #[arg(long, value_name = "LINES")]
    end: Option<u64>,

    /// Path to configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long)]
    quiet: bool,
}

/// Parse a frame id mask given in decimal or `0x` hex
fn parse_mask(value: &str) -> std::result::Result<u32, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid frame id mask {:?}: {}", value, e))
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::debug!("candump-decode v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using decoder library v{}", candump_decoder::VERSION);

    let (database, config) = resolve_config(&args)?;

    let decoder = Decoder::load(&database, &config.database_options())
        .with_context(|| format!("Failed to load database {:?}", database))?;
    let stats = decoder.database_stats();
    log::info!(
        "Loaded {} messages with {} signals from {:?}",
        stats.num_messages,
        stats.num_signals,
        database
    );

    let stdin = io::stdin();
    match &config.csv_output {
        Some(csv_path) => {
            let file = File::create(csv_path)
                .with_context(|| format!("Failed to create CSV file {:?}", csv_path))?;
            decode_stream_to_csv(stdin.lock(), BufWriter::new(file), &decoder, &config)
                .with_context(|| format!("Failed to write CSV file {:?}", csv_path))?;
        }
        None => {
            // Stdout is line buffered; decoded lines appear as soon as they are read
            let stdout = io::stdout();
            decode_stream(stdin.lock(), stdout.lock(), &decoder, &config)
                .context("Failed to write decoded output")?;
        }
    }

    Ok(())
}

/// Merge the optional config file with command line flags
///
/// Command line flags win; boolean switches only ever turn a default off or on.
fn resolve_config(args: &Args) -> Result<(PathBuf, DecodeConfig)> {
    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };

    let mut decode = app_config.decode;
    if args.no_decode_choices {
        decode.decode_choices = false;
    }
    if args.single_line {
        decode.single_line = true;
    }
    if let Some(encoding) = &args.encoding {
        decode.database_encoding = Some(encoding.clone());
    }
    if args.no_strict {
        decode.strict = false;
    }
    if let Some(mask) = args.frame_id_mask {
        decode.frame_id_mask = Some(mask);
    }
    if let Some(csv) = &args.csv {
        decode.csv_output = Some(csv.clone());
    }
    if let Some(start) = args.start {
        decode.start_from = start;
    }
    if let Some(end) = args.end {
        decode.end_at = end;
    }

    let database = args
        .database
        .clone()
        .or(app_config.database)
        .context("No database given: pass DATABASE or set `database` in the config file")?;

    Ok((database, decode))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::{Builder, Target};
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

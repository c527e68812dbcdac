//! candump Decoder Library
//!
//! Decodes text captures produced by the Linux `candump` tool against a DBC signal
//! database.
//!
//! # Architecture
//!
//! - `formats`: recognise the `candump` and `candump -L` line notations and extract
//!   the frame id, payload and timestamp
//! - `decoder`: load a DBC file and decode frames through the `FrameDecoder` trait
//! - `output`: the human-readable emitter and the sparse CSV emitter
//! - `pipeline`: read a stream line by line and drive one of the emitters
//!
//! # Example Usage
//!
//! ```no_run
//! use candump_decoder::{decode_stream, DecodeConfig, Decoder};
//! use std::io;
//! use std::path::Path;
//!
//! let config = DecodeConfig::new().with_single_line(true);
//! let decoder = Decoder::load(Path::new("powertrain.dbc"), &config.database_options()).unwrap();
//!
//! let stdin = io::stdin();
//! let summary = decode_stream(stdin.lock(), io::stdout(), &decoder, &config).unwrap();
//! println!("Decoded {} of {} lines", summary.decoded, summary.lines);
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod formats;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-export main types for convenience
pub use config::{DatabaseOptions, DecodeConfig};
pub use decoder::{DatabaseStats, Decoder, FrameDecoder};
pub use formats::{DetectorState, FormatDetector, FrameParseError, NotationKind};
pub use output::{CsvSummary, HumanSummary};
pub use pipeline::{decode_stream, decode_stream_to_csv};
pub use types::{DecodedRecord, DecoderError, ParsedFrame, Result, SignalValue};

// Internal modules (not exposed in public API)
mod message_decoder;
mod signals;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! candump line notations
//!
//! This module recognises the textual notations `candump` writes and extracts the
//! timestamp, frame id and payload from a single line. `FormatDetector` picks and
//! locks the notation for a stream.
//!
//! ## Supported notations
//! - `candump`: `vcan0  1F0   [8]  00 00 00 00 00 00 1B C1`, optionally prefixed
//!   with `(timestamp)` as written by `candump -ta`
//! - `candump -L`: `(1594172461.968006) vcan0 1F0#0000000000001BC1`; the timestamp
//!   is optional
//! - timestamped `candump -L`: as above with a mandatory timestamp, used for CSV

use crate::types::ParsedFrame;
use byteorder::{BigEndian, ByteOrder};
use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

pub mod detector;

pub use detector::{DetectorState, FormatDetector};

/// Frame ids are at most 4 bytes
const FRAME_ID_HEX_DIGITS: usize = 8;

static TABULAR_LOG: OnceLock<Regex> = OnceLock::new();
static HEX_CONCATENATED: OnceLock<Regex> = OnceLock::new();
static TIMESTAMPED_HEX_CONCATENATED: OnceLock<Regex> = OnceLock::new();

/// The supported line notations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotationKind {
    /// `candump` default output with a bracketed byte count
    TabularLog,
    /// `candump -L` style `ID#PAYLOAD`
    HexConcatenated,
    /// `candump -L` with a mandatory `(seconds.fraction)` timestamp
    TimestampedHexConcatenated,
}

/// Line-level parse failures. Never fatal: the caller reports and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FrameParseError {
    #[error("line does not match any supported candump notation")]
    Unrecognized,

    #[error("line does not match the {0} notation")]
    NotationMismatch(NotationKind),

    #[error("frame id '{0}' is longer than 8 hex digits")]
    FrameIdTooLong(String),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl fmt::Display for NotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotationKind::TabularLog => write!(f, "candump"),
            NotationKind::HexConcatenated => write!(f, "candump -L"),
            NotationKind::TimestampedHexConcatenated => write!(f, "timestamped candump -L"),
        }
    }
}

impl NotationKind {
    /// Notations probed by the detector, in priority order
    pub const AUTO_DETECT_ORDER: [NotationKind; 2] =
        [NotationKind::TabularLog, NotationKind::HexConcatenated];

    fn regex(self) -> &'static Regex {
        let (cell, pattern) = match self {
            NotationKind::TabularLog => (
                &TABULAR_LOG,
                r"^\s*(?:\((?P<ts>.*?)\))?\s*\S+\s+(?P<id>[0-9A-Fa-f]+)\s*\[\d+\]\s*(?P<data>[0-9A-Fa-f ]*)$",
            ),
            NotationKind::HexConcatenated => (
                &HEX_CONCATENATED,
                r"^(?:\((?P<ts>\d+\.\d+)\)\s+)?\S+\s+(?P<id>[0-9A-Fa-f]+)#(?P<data>[0-9A-Fa-f]*)$",
            ),
            NotationKind::TimestampedHexConcatenated => (
                &TIMESTAMPED_HEX_CONCATENATED,
                r"^\((?P<ts>\d+\.\d+)\)\s+\S+\s+(?P<id>[0-9A-Fa-f]+)#(?P<data>[0-9A-Fa-f]*)$",
            ),
        };
        cell.get_or_init(|| Regex::new(pattern).expect("notation pattern is valid"))
    }

    /// Match the line against this notation without normalizing the fields
    pub fn matches<'a>(self, line: &'a str) -> Option<FrameFields<'a>> {
        self.regex().captures(line).map(FrameFields::from_captures)
    }

    /// Match and normalize the line into a `ParsedFrame`
    pub fn parse(self, line: &str) -> Result<ParsedFrame, FrameParseError> {
        self.matches(line)
            .ok_or(FrameParseError::NotationMismatch(self))?
            .into_frame()
    }
}

/// Raw text fields captured from a matching line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFields<'a> {
    pub timestamp: Option<&'a str>,
    pub frame_id: &'a str,
    pub payload: &'a str,
}

impl<'a> FrameFields<'a> {
    fn from_captures(captures: Captures<'a>) -> Self {
        let field = |name: &str| captures.name(name).map(|m| m.as_str()).unwrap_or("");
        Self {
            timestamp: captures.name("ts").map(|m| m.as_str()),
            frame_id: field("id"),
            payload: field("data"),
        }
    }

    /// Normalize the captured text into a frame
    ///
    /// A timestamp that is not a number (e.g. a `candump -td` delta with a sign)
    /// is dropped rather than rejected.
    pub fn into_frame(self) -> Result<ParsedFrame, FrameParseError> {
        Ok(ParsedFrame {
            timestamp: self.timestamp.and_then(|ts| ts.trim().parse::<f64>().ok()),
            frame_id: parse_frame_id(self.frame_id)?,
            payload: parse_payload(self.payload)?,
        })
    }
}

/// Decode a hex frame id, left-padded with zeros to 8 digits, as big-endian `u32`
pub fn parse_frame_id(hex_id: &str) -> Result<u32, FrameParseError> {
    if hex_id.len() > FRAME_ID_HEX_DIGITS {
        return Err(FrameParseError::FrameIdTooLong(hex_id.to_string()));
    }
    let padded = format!("{:0>width$}", hex_id, width = FRAME_ID_HEX_DIGITS);
    let bytes = hex::decode(padded)?;
    Ok(BigEndian::read_u32(&bytes))
}

/// Decode hex byte pairs, ignoring embedded spaces
pub fn parse_payload(hex_data: &str) -> Result<Vec<u8>, FrameParseError> {
    let cleaned: String = hex_data.chars().filter(|c| *c != ' ').collect();
    Ok(hex::decode(cleaned)?)
}

//! Core types for the candump decoder library
//!
//! This module defines the values that flow through the line-decoding pipeline:
//! parsed frames, decoded signal values, decoded records and the error type.

use std::collections::BTreeMap;
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// A decoded record: column name → value, kept sorted by name
pub type DecodedRecord = BTreeMap<String, SignalValue>;

/// A single CAN frame extracted from one candump line
///
/// Lives for exactly one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFrame {
    /// Capture timestamp in seconds, when the notation carries one
    pub timestamp: Option<f64>,
    /// CAN frame id (11-bit or 29-bit, without flag bits)
    pub frame_id: u32,
    /// Payload bytes in wire order
    pub payload: Vec<u8>,
}

impl ParsedFrame {
    /// Number of payload bytes
    pub fn dlc(&self) -> usize {
        self.payload.len()
    }
}

/// Errors that can occur while loading a database or decoding a frame
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Unsupported database encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Inconsistent database: {0}")]
    InconsistentDatabase(String),

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Unknown frame id {0} (0x{0:x})")]
    MessageNotFound(u32),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Decoded signal value
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    /// Integral physical value (integral factor and offset)
    Integer(i64),
    /// Floating-point physical value (after scaling/offset)
    Float(f64),
    /// Named choice from the signal's value table
    Choice(String),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{}", v),
            SignalValue::Choice(label) => f.write_str(label),
        }
    }
}

impl SignalValue {
    /// Convert signal value to f64, if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Integer(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::Choice(_) => None,
        }
    }

    /// True if this value is a choice label rather than a number
    pub fn is_choice(&self) -> bool {
        matches!(self, SignalValue::Choice(_))
    }
}

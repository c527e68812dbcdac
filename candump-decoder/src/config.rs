//! Decoder configuration types
//!
//! This module defines the options recognised by the line-decoding pipeline and the
//! subset of them that controls how the DBC database is loaded.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection windows shorter than this risk missing rarely-seen columns
pub const MIN_HEADER_WINDOW: u64 = 100;

/// Configuration for one decode run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Render raw values as choice strings when the database defines them
    #[serde(default = "default_true")]
    pub decode_choices: bool,

    /// Collapse the human-readable decode text to one line
    #[serde(default)]
    pub single_line: bool,

    /// Database file encoding (None = detect)
    #[serde(default)]
    pub database_encoding: Option<String>,

    /// Reject inconsistent databases at load time
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Only compare these frame id bits when looking up messages
    #[serde(default)]
    pub frame_id_mask: Option<u32>,

    /// Sparse CSV output file; enables tabular mode
    #[serde(default)]
    pub csv_output: Option<PathBuf>,

    /// Number of lines used to collect the CSV header
    #[serde(default = "default_start_from")]
    pub start_from: u64,

    /// Stop after this many lines (0 = read to end of input)
    #[serde(default)]
    pub end_at: u64,
}

fn default_true() -> bool {
    true
}

fn default_start_from() -> u64 {
    1000
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            decode_choices: true,
            single_line: false,
            database_encoding: None,
            strict: true,
            frame_id_mask: None,
            csv_output: None,
            start_from: default_start_from(),
            end_at: 0,
        }
    }
}

/// Options that control how a DBC file is turned into a signal database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseOptions {
    pub encoding: Option<String>,
    pub frame_id_mask: Option<u32>,
    pub strict: bool,
}

impl DecodeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable choice decoding
    pub fn with_decode_choices(mut self, enabled: bool) -> Self {
        self.decode_choices = enabled;
        self
    }

    /// Builder method: single-line human-readable output
    pub fn with_single_line(mut self, enabled: bool) -> Self {
        self.single_line = enabled;
        self
    }

    /// Builder method: set the database encoding
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.database_encoding = Some(encoding.into());
        self
    }

    /// Builder method: enable or disable strict database checks
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Builder method: set the frame id mask
    pub fn with_frame_id_mask(mut self, mask: u32) -> Self {
        self.frame_id_mask = Some(mask);
        self
    }

    /// Builder method: write sparse CSV to this file
    pub fn with_csv_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.csv_output = Some(path.into());
        self
    }

    /// Builder method: set the header-collection window
    pub fn with_start_from(mut self, lines: u64) -> Self {
        self.start_from = lines;
        self
    }

    /// Builder method: stop after this many lines
    pub fn with_end_at(mut self, lines: u64) -> Self {
        self.end_at = lines;
        self
    }

    /// True when output goes to a sparse CSV file
    pub fn is_tabular(&self) -> bool {
        self.csv_output.is_some()
    }

    /// True when the collection window is too short to be trusted
    pub fn header_window_too_short(&self) -> bool {
        self.start_from < MIN_HEADER_WINDOW
    }

    /// Line bound, if one is configured
    pub fn line_limit(&self) -> Option<u64> {
        (self.end_at > 0).then_some(self.end_at)
    }

    /// Database loading options derived from this configuration
    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            encoding: self.database_encoding.clone(),
            frame_id_mask: self.frame_id_mask,
            strict: self.strict,
        }
    }
}

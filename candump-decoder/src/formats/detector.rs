//! Notation auto-detection
//!
//! Capture files never mix notations, so the first line that matches any notation
//! fixes it for the rest of the stream.

use super::{FrameParseError, NotationKind};
use crate::types::ParsedFrame;

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No line has matched yet
    Undetected,
    /// Only this notation is tried from now on
    Locked(NotationKind),
}

/// Locks a stream to the first notation that matches
#[derive(Debug, Clone)]
pub struct FormatDetector {
    state: DetectorState,
}

impl FormatDetector {
    /// Create a detector that has not seen any line yet
    pub fn new() -> Self {
        Self {
            state: DetectorState::Undetected,
        }
    }

    /// Create a detector already locked to one notation
    pub fn locked(notation: NotationKind) -> Self {
        Self {
            state: DetectorState::Locked(notation),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// The locked notation, if any
    pub fn notation(&self) -> Option<NotationKind> {
        match self.state {
            DetectorState::Undetected => None,
            DetectorState::Locked(notation) => Some(notation),
        }
    }

    /// Parse a line, locking the notation on the first match
    ///
    /// A line that matches a notation's pattern locks that notation even if its
    /// hex fields then turn out to be malformed.
    pub fn parse(&mut self, line: &str) -> Result<ParsedFrame, FrameParseError> {
        match self.state {
            DetectorState::Locked(notation) => notation.parse(line),
            DetectorState::Undetected => {
                for notation in NotationKind::AUTO_DETECT_ORDER {
                    if let Some(fields) = notation.matches(line) {
                        log::debug!("Detected {} notation", notation);
                        self.state = DetectorState::Locked(notation);
                        return fields.into_frame();
                    }
                }
                Err(FrameParseError::Unrecognized)
            }
        }
    }
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self::new()
    }
}

//! Main decoder API
//!
//! The `Decoder` owns the signal database loaded from a DBC file and decodes one
//! frame at a time. The emitters only see it through the `FrameDecoder` trait.

use crate::config::DatabaseOptions;
use crate::message_decoder::MessageDecoder;
use crate::signals::{MessageDefinition, SignalDatabase};
use crate::types::{DecodedRecord, DecoderError, Result};
use std::path::Path;

/// Decodes the payload of a single frame
///
/// Implementations must be stateless between calls: the pipeline calls them once
/// per input line and never retries.
pub trait FrameDecoder {
    /// Decode a frame into human-readable text
    fn decode_to_text(
        &self,
        frame_id: u32,
        data: &[u8],
        decode_choices: bool,
        single_line: bool,
    ) -> Result<String>;

    /// Decode a frame into a record of named fields
    fn decode_to_fields(
        &self,
        frame_id: u32,
        data: &[u8],
        decode_choices: bool,
    ) -> Result<DecodedRecord>;
}

/// The main decoder struct - a loaded, read-only signal database
pub struct Decoder {
    signal_db: SignalDatabase,
}

impl Decoder {
    /// Load a DBC file
    ///
    /// # Example
    /// ```no_run
    /// use candump_decoder::{DatabaseOptions, Decoder};
    /// use std::path::Path;
    ///
    /// let options = DatabaseOptions { strict: true, ..Default::default() };
    /// let decoder = Decoder::load(Path::new("powertrain.dbc"), &options).unwrap();
    /// ```
    pub fn load(path: &Path, options: &DatabaseOptions) -> Result<Self> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = crate::signals::dbc::parse_dbc_file(path, options.encoding.as_deref())?;
        let decoder = Self::from_messages(messages, options)?;

        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(decoder)
    }

    /// Build a decoder from DBC text already in memory
    pub fn from_dbc_str(content: &str, options: &DatabaseOptions) -> Result<Self> {
        let messages = crate::signals::dbc::parse_dbc_str(content, "<memory>")?;
        Self::from_messages(messages, options)
    }

    fn from_messages(messages: Vec<MessageDefinition>, options: &DatabaseOptions) -> Result<Self> {
        let mut signal_db = match options.frame_id_mask {
            Some(mask) => SignalDatabase::with_frame_id_mask(mask),
            None => SignalDatabase::new(),
        };

        for message in messages {
            log::debug!(
                "Message '{}' (0x{:X}) from {}, sent by {}",
                message.name,
                message.id,
                message.source,
                message.sender.as_deref().unwrap_or("<none>")
            );
            let (id, name) = (message.id, message.name.clone());
            if let Some(previous) = signal_db.add_message(message) {
                if options.strict {
                    return Err(DecoderError::InconsistentDatabase(format!(
                        "messages '{}' and '{}' share frame id 0x{:X}",
                        previous.name, name, id
                    )));
                }
                log::warn!(
                    "Message '{}' replaces '{}' for frame id 0x{:X}",
                    name,
                    previous.name,
                    id
                );
            }
        }

        if options.strict {
            signal_db.validate()?;
        }

        Ok(Self { signal_db })
    }

    /// Get statistics about the loaded signal database
    pub fn database_stats(&self) -> DatabaseStats {
        self.signal_db.stats()
    }

    fn message(&self, frame_id: u32) -> Result<&MessageDefinition> {
        self.signal_db
            .get_message(frame_id)
            .ok_or(DecoderError::MessageNotFound(frame_id))
    }
}

impl FrameDecoder for Decoder {
    fn decode_to_text(
        &self,
        frame_id: u32,
        data: &[u8],
        decode_choices: bool,
        single_line: bool,
    ) -> Result<String> {
        let message_def = self.message(frame_id)?;
        log::trace!("Decoding message: {} (ID 0x{:X})", message_def.name, frame_id);
        MessageDecoder::decode_text(data, message_def, decode_choices, single_line)
    }

    fn decode_to_fields(
        &self,
        frame_id: u32,
        data: &[u8],
        decode_choices: bool,
    ) -> Result<DecodedRecord> {
        let message_def = self.message(frame_id)?;
        log::trace!("Decoding message: {} (ID 0x{:X})", message_def.name, frame_id);
        MessageDecoder::decode_fields(data, message_def, decode_choices)
    }
}

// Re-export DatabaseStats for public API
pub use crate::signals::DatabaseStats;

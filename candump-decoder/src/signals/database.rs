//! Signal database
//!
//! Holds the message definitions loaded from a DBC file, keyed by (masked) frame id.

use crate::types::{DecoderError, Result};
use std::collections::HashMap;

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN frame id (extended flag already stripped)
    pub id: u32,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message, in definition order
    pub signals: Vec<SignalDefinition>,
    /// True if this message has multiplexed signals
    pub is_multiplexed: bool,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
    /// Source file (DBC filename)
    pub source: String,
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit as written in the DBC file
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Engineering unit (e.g., "km/h", "degK", "V")
    pub unit: Option<String>,
    /// Value table for enum-like values (raw_value -> choice name)
    pub value_table: Option<HashMap<i64, String>>,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone)]
pub struct MultiplexerInfo {
    /// Name of the multiplexer signal that controls this signal
    pub multiplexer_signal: String,
    /// Multiplexer value(s) for which this signal is active
    pub multiplexer_values: Vec<u64>,
}

impl SignalDefinition {
    /// Physical bit indices (`byte * 8 + bit`, bit 0 = LSB) covered by this signal,
    /// ordered from least to most significant for Intel signals and from most to
    /// least significant for Motorola signals.
    pub fn bit_positions(&self) -> Vec<usize> {
        let start = self.start_bit as usize;
        let length = self.length as usize;

        match self.byte_order {
            ByteOrder::LittleEndian => (start..start + length).collect(),
            ByteOrder::BigEndian => {
                // DBC Motorola start bit names the MSB in sawtooth numbering;
                // walk forward in MSB-first sequential numbering from there.
                let msb = (start / 8) * 8 + (7 - start % 8);
                (msb..msb + length)
                    .map(|seq| (seq / 8) * 8 + (7 - seq % 8))
                    .collect()
            }
        }
    }

    /// Number of payload bytes this signal needs
    pub fn required_bytes(&self) -> usize {
        self.bit_positions()
            .iter()
            .max()
            .map(|&bit| bit / 8 + 1)
            .unwrap_or(0)
    }

    /// True if this signal and `other` can both be present in the same frame
    fn coexists_with(&self, other: &SignalDefinition) -> bool {
        match (&self.multiplexer_info, &other.multiplexer_info) {
            (Some(a), Some(b)) => a
                .multiplexer_values
                .iter()
                .any(|value| b.multiplexer_values.contains(value)),
            _ => true,
        }
    }
}

impl MessageDefinition {
    /// Check that every signal fits in the message and no coexisting signals overlap
    pub fn validate(&self) -> Result<()> {
        let total_bits = self.size * 8;
        let mut owners: Vec<Vec<usize>> = vec![Vec::new(); total_bits];

        for (index, signal) in self.signals.iter().enumerate() {
            if signal.length == 0 || signal.length > 64 {
                return Err(DecoderError::InvalidSignalDefinition(format!(
                    "signal '{}' in message '{}' has length {}",
                    signal.name, self.name, signal.length
                )));
            }

            for bit in signal.bit_positions() {
                let Some(slot) = owners.get_mut(bit) else {
                    return Err(DecoderError::InconsistentDatabase(format!(
                        "signal '{}' does not fit in message '{}' ({} bytes)",
                        signal.name, self.name, self.size
                    )));
                };

                if let Some(&other) = slot
                    .iter()
                    .find(|&&other| self.signals[other].coexists_with(signal))
                {
                    return Err(DecoderError::InconsistentDatabase(format!(
                        "signals '{}' and '{}' overlap in message '{}'",
                        self.signals[other].name, signal.name, self.name
                    )));
                }
                slot.push(index);
            }
        }

        Ok(())
    }
}

/// The signal database
pub struct SignalDatabase {
    /// Message definitions keyed by `frame_id & frame_id_mask`
    messages: HashMap<u32, MessageDefinition>,

    /// Only these frame id bits take part in lookups
    frame_id_mask: u32,
}

impl SignalDatabase {
    /// Create a new empty signal database comparing all id bits
    pub fn new() -> Self {
        Self::with_frame_id_mask(u32::MAX)
    }

    /// Create a new empty signal database comparing only the masked id bits
    pub fn with_frame_id_mask(frame_id_mask: u32) -> Self {
        Self {
            messages: HashMap::new(),
            frame_id_mask,
        }
    }

    /// Add a message definition, returning the definition it replaced (if any)
    pub fn add_message(&mut self, message: MessageDefinition) -> Option<MessageDefinition> {
        self.messages.insert(message.id & self.frame_id_mask, message)
    }

    /// Look up the message definition for a frame id
    pub fn get_message(&self, frame_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&(frame_id & self.frame_id_mask))
    }

    /// Run the strict consistency checks over every message
    pub fn validate(&self) -> Result<()> {
        for id in self.get_all_can_ids() {
            if let Some(message) = self.messages.get(&id) {
                message.validate()?;
            }
        }
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|msg| msg.signals.len()).sum(),
        }
    }

    /// Get all (masked) frame ids in the database, sorted
    pub fn get_all_can_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.messages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn signal(name: &str, start_bit: u16, length: u16, byte_order: ByteOrder) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit,
            length,
            byte_order,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            unit: None,
            value_table: None,
            multiplexer_info: None,
        }
    }

    pub(crate) fn message(id: u32, name: &str, signals: Vec<SignalDefinition>) -> MessageDefinition {
        MessageDefinition {
            id,
            name: name.to_string(),
            size: 8,
            sender: None,
            signals,
            is_multiplexed: false,
            multiplexer_signal: None,
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_empty_database() {
        let db = SignalDatabase::new();
        let stats = db.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
    }

    #[test]
    fn test_add_message() {
        let mut db = SignalDatabase::new();
        let replaced = db.add_message(message(
            0x123,
            "EngineData",
            vec![signal("EngineSpeed", 0, 16, ByteOrder::LittleEndian)],
        ));
        assert!(replaced.is_none());

        let stats = db.stats();
        assert_eq!(stats.num_messages, 1);
        assert_eq!(stats.num_signals, 1);

        let msg = db.get_message(0x123).unwrap();
        assert_eq!(msg.name, "EngineData");
        assert!(db.get_message(0x124).is_none());
    }

    #[test]
    fn test_duplicate_id_replaces() {
        let mut db = SignalDatabase::new();
        db.add_message(message(0x10, "First", vec![]));
        let replaced = db.add_message(message(0x10, "Second", vec![]));
        assert_eq!(replaced.unwrap().name, "First");
        assert_eq!(db.get_message(0x10).unwrap().name, "Second");
    }

    #[test]
    fn test_frame_id_mask_lookup() {
        let mut db = SignalDatabase::with_frame_id_mask(0x00FF);
        db.add_message(message(0x1F0, "Masked", vec![]));
        assert_eq!(db.get_message(0xAF0).unwrap().name, "Masked");
        assert_eq!(db.get_message(0xF0).unwrap().name, "Masked");
        assert!(db.get_message(0x1F1).is_none());
    }

    #[test]
    fn test_bit_positions_intel() {
        let sig = signal("S", 4, 8, ByteOrder::LittleEndian);
        assert_eq!(sig.bit_positions(), (4..12).collect::<Vec<_>>());
        assert_eq!(sig.required_bytes(), 2);
    }

    #[test]
    fn test_bit_positions_motorola() {
        // 16-bit Motorola signal starting at bit 55 occupies bytes 6 and 7
        let sig = signal("S", 55, 16, ByteOrder::BigEndian);
        let bits = sig.bit_positions();
        assert_eq!(bits[0], 55);
        assert_eq!(bits[7], 48);
        assert_eq!(bits[8], 63);
        assert_eq!(bits[15], 56);
        assert_eq!(sig.required_bytes(), 8);
    }

    #[test]
    fn test_validate_signal_outside_message() {
        let msg = message(1, "Short", vec![signal("S", 60, 8, ByteOrder::LittleEndian)]);
        assert!(matches!(msg.validate(), Err(DecoderError::InconsistentDatabase(_))));
    }

    #[test]
    fn test_validate_overlap() {
        let msg = message(
            1,
            "Overlap",
            vec![
                signal("A", 0, 8, ByteOrder::LittleEndian),
                signal("B", 4, 8, ByteOrder::LittleEndian),
            ],
        );
        let err = msg.validate().unwrap_err();
        assert!(err.to_string().contains("'A' and 'B' overlap"));
    }

    #[test]
    fn test_validate_multiplexed_overlap_allowed() {
        let mut a = signal("A", 8, 8, ByteOrder::LittleEndian);
        a.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".into(),
            multiplexer_values: vec![0],
        });
        let mut b = signal("B", 8, 8, ByteOrder::LittleEndian);
        b.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".into(),
            multiplexer_values: vec![1],
        });
        let msg = message(1, "Mux", vec![signal("Mode", 0, 8, ByteOrder::LittleEndian), a, b]);
        assert!(msg.validate().is_ok());
    }
}

//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN payloads based on signal definitions
//! from the signal database. Handles bit extraction, endianness, multiplexing,
//! physical value conversion and value tables.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::types::{DecodedRecord, DecoderError, Result, SignalValue};

/// Message decoder - extracts signals from CAN payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode a payload into a record of signal name → value
    ///
    /// Fails with `InvalidData` when the payload is shorter than the message.
    pub fn decode_fields(
        data: &[u8],
        message_def: &MessageDefinition,
        decode_choices: bool,
    ) -> Result<DecodedRecord> {
        if data.len() < message_def.size {
            return Err(DecoderError::InvalidData(format!(
                "message '{}' needs {} bytes but frame has {}",
                message_def.name,
                message_def.size,
                data.len()
            )));
        }

        let multiplexer_value = Self::multiplexer_value(data, message_def);
        let mut record = DecodedRecord::new();

        for signal in &message_def.signals {
            if let Some(ref mux_info) = signal.multiplexer_info {
                match multiplexer_value {
                    Some(current) if mux_info.multiplexer_values.contains(&current) => {}
                    _ => continue,
                }
            }

            if let Some(value) = Self::decode_signal(data, signal, decode_choices) {
                record.insert(signal.name.clone(), value);
            }
        }

        Ok(record)
    }

    /// Decode a payload and render it as text
    ///
    /// Single-line: `Message(Sig: value unit, ...)`. Multi-line puts every signal
    /// on its own indented line.
    pub fn decode_text(
        data: &[u8],
        message_def: &MessageDefinition,
        decode_choices: bool,
        single_line: bool,
    ) -> Result<String> {
        let record = Self::decode_fields(data, message_def, decode_choices)?;
        let formatted = Self::format_signals(message_def, &record);

        if single_line {
            Ok(format!("{}({})", message_def.name, formatted.join(", ")))
        } else {
            let indented: Vec<String> = formatted
                .iter()
                .map(|signal| format!("    {}", signal))
                .collect();
            Ok(format!("{}(\n{}\n)", message_def.name, indented.join(",\n")))
        }
    }

    /// Format decoded signals in database definition order
    fn format_signals(message_def: &MessageDefinition, record: &DecodedRecord) -> Vec<String> {
        message_def
            .signals
            .iter()
            .filter_map(|signal| {
                let value = record.get(&signal.name)?;
                Some(match (&signal.unit, value.is_choice()) {
                    (Some(unit), false) => format!("{}: {} {}", signal.name, value, unit),
                    _ => format!("{}: {}", signal.name, value),
                })
            })
            .collect()
    }

    /// Extract the active multiplexer value, if the message is multiplexed
    fn multiplexer_value(data: &[u8], message_def: &MessageDefinition) -> Option<u64> {
        if !message_def.is_multiplexed {
            return None;
        }
        let mux_signal_name = message_def.multiplexer_signal.as_ref()?;
        let mux_signal = message_def
            .signals
            .iter()
            .find(|s| s.name == *mux_signal_name)?;
        Self::extract_signal_value(data, mux_signal).map(|value| value as u64)
    }

    /// Decode a single signal from CAN payload data
    fn decode_signal(
        data: &[u8],
        signal: &SignalDefinition,
        decode_choices: bool,
    ) -> Option<SignalValue> {
        let raw_value = Self::extract_signal_value(data, signal)?;

        if decode_choices {
            if let Some(label) = signal
                .value_table
                .as_ref()
                .and_then(|table| table.get(&raw_value))
            {
                return Some(SignalValue::Choice(label.clone()));
            }
        }

        Some(Self::physical_value(raw_value, signal))
    }

    /// Apply factor and offset; stays integral when both are integral
    fn physical_value(raw_value: i64, signal: &SignalDefinition) -> SignalValue {
        let physical = signal.offset + signal.factor * (raw_value as f64);

        if signal.factor.fract() == 0.0 && signal.offset.fract() == 0.0 {
            raw_value
                .checked_mul(signal.factor as i64)
                .and_then(|scaled| scaled.checked_add(signal.offset as i64))
                .map(SignalValue::Integer)
                .unwrap_or(SignalValue::Float(physical))
        } else {
            SignalValue::Float(physical)
        }
    }

    /// Extract raw signal value from CAN payload data
    fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Option<i64> {
        let length = signal.length as usize;
        if !(1..=64).contains(&length) {
            log::warn!("Signal '{}' has unsupported length {}", signal.name, length);
            return None;
        }

        let required_bytes = signal.required_bytes();
        if required_bytes > data.len() {
            log::warn!(
                "Signal '{}' requires {} bytes but frame only has {} bytes",
                signal.name,
                required_bytes,
                data.len()
            );
            return None;
        }

        let bits = signal.bit_positions();
        let raw_value = match signal.byte_order {
            ByteOrder::LittleEndian => Self::collect_lsb_first(data, &bits),
            ByteOrder::BigEndian => Self::collect_msb_first(data, &bits),
        };

        let signed_value = match signal.value_type {
            ValueType::Unsigned => raw_value as i64,
            ValueType::Signed => Self::sign_extend(raw_value, length),
        };

        Some(signed_value)
    }

    fn bit_at(data: &[u8], bit: usize) -> u64 {
        ((data[bit / 8] >> (bit % 8)) & 0x01) as u64
    }

    /// Intel order: first position is the least significant bit
    fn collect_lsb_first(data: &[u8], bits: &[usize]) -> u64 {
        bits.iter()
            .enumerate()
            .fold(0u64, |acc, (i, &bit)| acc | (Self::bit_at(data, bit) << i))
    }

    /// Motorola order: first position is the most significant bit
    fn collect_msb_first(data: &[u8], bits: &[usize]) -> u64 {
        bits.iter()
            .fold(0u64, |acc, &bit| (acc << 1) | Self::bit_at(data, bit))
    }

    /// Sign-extend a value from N bits to 64 bits
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length == 0 || bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::tests::{message, signal};
    use crate::signals::database::MultiplexerInfo;
    use std::collections::HashMap;

    fn payload() -> Vec<u8> {
        vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1B, 0xC1]
    }

    #[test]
    fn test_extract_little_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let sig = signal("S", 0, 8, ByteOrder::LittleEndian);
        assert_eq!(MessageDecoder::extract_signal_value(&data, &sig), Some(0xAB));
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let sig = signal("S", 0, 16, ByteOrder::LittleEndian);
        assert_eq!(MessageDecoder::extract_signal_value(&data, &sig), Some(0xCDAB));
    }

    #[test]
    fn test_extract_little_endian_unaligned() {
        let data = vec![0xF0, 0x0F];
        let sig = signal("S", 4, 8, ByteOrder::LittleEndian);
        assert_eq!(MessageDecoder::extract_signal_value(&data, &sig), Some(0xFF));
    }

    #[test]
    fn test_extract_big_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let sig = signal("S", 7, 8, ByteOrder::BigEndian);
        assert_eq!(MessageDecoder::extract_signal_value(&data, &sig), Some(0xAB));
    }

    #[test]
    fn test_extract_big_endian_cross_byte() {
        let sig = signal("S", 55, 16, ByteOrder::BigEndian);
        assert_eq!(MessageDecoder::extract_signal_value(&payload(), &sig), Some(0x1BC1));
    }

    #[test]
    fn test_extract_signal_past_payload() {
        let sig = signal("S", 56, 16, ByteOrder::LittleEndian);
        assert_eq!(MessageDecoder::extract_signal_value(&payload(), &sig), None);
    }

    #[test]
    fn test_signal_wider_than_64_bits_is_skipped() {
        let mut msg = message(0x1F0, "Wide", vec![signal("S", 0, 72, ByteOrder::LittleEndian)]);
        msg.size = 16;

        assert_eq!(MessageDecoder::extract_signal_value(&[0xFF; 16], &msg.signals[0]), None);
        let record = MessageDecoder::decode_fields(&[0xFF; 16], &msg, true).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_full_64_bit_signal() {
        let sig = signal("S", 0, 64, ByteOrder::LittleEndian);
        let data = [0x01, 0, 0, 0, 0, 0, 0, 0x80];
        assert_eq!(
            MessageDecoder::extract_signal_value(&data, &sig),
            Some(i64::MIN + 1)
        );
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(MessageDecoder::sign_extend(0x7F, 8), 127);
        assert_eq!(MessageDecoder::sign_extend(0xFF, 8), -1);
        assert_eq!(MessageDecoder::sign_extend(0x8000, 16), -32768);
    }

    #[test]
    fn test_physical_value_scaling() {
        let mut sig = signal("S", 0, 8, ByteOrder::LittleEndian);
        sig.factor = 2.0;
        sig.offset = -40.0;
        assert_eq!(MessageDecoder::physical_value(50, &sig), SignalValue::Integer(60));

        sig.factor = 0.5;
        sig.offset = 0.0;
        assert_eq!(MessageDecoder::physical_value(3, &sig), SignalValue::Float(1.5));
    }

    #[test]
    fn test_decode_choices() {
        let mut gear = signal("Gear", 0, 8, ByteOrder::LittleEndian);
        gear.value_table = Some(HashMap::from([(3, "Drive".to_string())]));
        let msg = message(0x10, "Gearbox", vec![gear]);
        let data = vec![3, 0, 0, 0, 0, 0, 0, 0];

        let with = MessageDecoder::decode_fields(&data, &msg, true).unwrap();
        assert_eq!(with["Gear"], SignalValue::Choice("Drive".into()));

        let without = MessageDecoder::decode_fields(&data, &msg, false).unwrap();
        assert_eq!(without["Gear"], SignalValue::Integer(3));
    }

    #[test]
    fn test_short_payload_is_error() {
        let msg = message(0x10, "Eight", vec![signal("S", 0, 8, ByteOrder::LittleEndian)]);
        let err = MessageDecoder::decode_fields(&[1, 2], &msg, true).unwrap_err();
        assert!(matches!(err, DecoderError::InvalidData(_)));
    }

    #[test]
    fn test_multiplexed_fields() {
        let mode = signal("Mode", 0, 8, ByteOrder::LittleEndian);
        let mut a = signal("SignalA", 8, 8, ByteOrder::LittleEndian);
        a.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".into(),
            multiplexer_values: vec![0],
        });
        let mut b = signal("SignalB", 8, 8, ByteOrder::LittleEndian);
        b.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".into(),
            multiplexer_values: vec![1],
        });
        let mut msg = message(0x200, "Mux", vec![mode, a, b]);
        msg.is_multiplexed = true;
        msg.multiplexer_signal = Some("Mode".into());

        let record = MessageDecoder::decode_fields(&[1, 42, 0, 0, 0, 0, 0, 0], &msg, true).unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Mode", "SignalB"]);
        assert_eq!(record["SignalB"], SignalValue::Integer(42));
    }

    #[test]
    fn test_decode_text_single_and_multi_line() {
        let mut temperature = signal("Temperature", 55, 16, ByteOrder::BigEndian);
        temperature.unit = Some("degK".into());
        let mut status = signal("Status", 0, 8, ByteOrder::LittleEndian);
        status.value_table = Some(HashMap::from([(0, "Idle".to_string())]));
        status.unit = Some("-".into());
        let msg = message(0x1F0, "ExampleMessage", vec![temperature, status]);

        let single = MessageDecoder::decode_text(&payload(), &msg, true, true).unwrap();
        assert_eq!(single, "ExampleMessage(Temperature: 7105 degK, Status: Idle)");

        let multi = MessageDecoder::decode_text(&payload(), &msg, true, false).unwrap();
        assert_eq!(
            multi,
            "ExampleMessage(\n    Temperature: 7105 degK,\n    Status: Idle\n)"
        );
    }
}

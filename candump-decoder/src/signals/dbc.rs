//! DBC file parser
//!
//! Parses Vector DBC files and converts them into our internal signal database format.

use crate::signals::database::{
    ByteOrder, MessageDefinition, MultiplexerInfo, SignalDefinition, ValueType,
};
use crate::types::{DecoderError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Bit 31 of a DBC message id marks an extended (29-bit) frame
const EXTENDED_ID_FLAG: u32 = 0x8000_0000;
const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Parse a DBC file and return message definitions
///
/// `encoding` selects how the file bytes are turned into text; `None` tries UTF-8
/// first and falls back to Latin-1.
pub fn parse_dbc_file(path: &Path, encoding: Option<&str>) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let dbc_content = decode_text(bytes, encoding)?;

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc")
        .to_string();

    let messages = parse_dbc_str(&dbc_content, &source_filename)?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Parse DBC text that is already in memory
pub fn parse_dbc_str(content: &str, source: &str) -> Result<Vec<MessageDefinition>> {
    let dbc = can_dbc::DBC::from_slice(content.as_bytes()).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to parse DBC file {}: {:?}", source, e))
    })?;

    dbc.messages()
        .iter()
        .map(|dbc_msg| convert_message(&dbc, dbc_msg, source))
        .collect()
}

/// Turn raw file bytes into text according to the requested encoding
fn decode_text(bytes: Vec<u8>, encoding: Option<&str>) -> Result<String> {
    let Some(encoding) = encoding else {
        return Ok(String::from_utf8(bytes).unwrap_or_else(|e| {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            latin1_to_string(e.as_bytes())
        }));
    };

    match encoding.to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" => String::from_utf8(bytes).map_err(|e| {
            DecoderError::DbcParseError(format!("File is not valid UTF-8: {}", e))
        }),
        // Windows-1252 differs from Latin-1 only in 0x80-0x9F, which DBC
        // identifiers never use.
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "cp1252" | "windows-1252" => {
            Ok(latin1_to_string(&bytes))
        }
        _ => Err(DecoderError::UnsupportedEncoding(encoding.to_string())),
    }
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
    source: &str,
) -> Result<MessageDefinition> {
    let raw_id = dbc_msg.message_id().0;
    let id = if raw_id & EXTENDED_ID_FLAG != 0 {
        raw_id & EXTENDED_ID_MASK
    } else {
        raw_id
    };

    let multiplexer_signal_name = dbc_msg
        .signals()
        .iter()
        .find(|sig| {
            matches!(
                sig.multiplexer_indicator(),
                can_dbc::MultiplexIndicator::Multiplexor
                    | can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(_)
            )
        })
        .map(|sig| sig.name().to_string());

    let is_multiplexed = dbc_msg.signals().iter().any(|sig| {
        !matches!(sig.multiplexer_indicator(), can_dbc::MultiplexIndicator::Plain)
    });

    let signals = dbc_msg
        .signals()
        .iter()
        .map(|dbc_sig| {
            let value_table = dbc
                .value_descriptions_for_signal(can_dbc::MessageId(raw_id), dbc_sig.name())
                .map(|descriptions| {
                    descriptions
                        .iter()
                        .map(|desc| (*desc.a() as i64, desc.b().to_string()))
                        .collect::<HashMap<_, _>>()
                });
            convert_signal(dbc_sig, multiplexer_signal_name.as_deref(), value_table)
        })
        .collect::<Result<Vec<_>>>()?;

    log::trace!(
        "Message {} (0x{:X}): {} signals",
        dbc_msg.message_name(),
        id,
        signals.len()
    );

    Ok(MessageDefinition {
        id,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        is_multiplexed,
        multiplexer_signal: multiplexer_signal_name,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexer_signal_name: Option<&str>,
    value_table: Option<HashMap<i64, String>>,
) -> Result<SignalDefinition> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let multiplexer_info = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value)
        | can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(switch_value) => {
            Some(MultiplexerInfo {
                multiplexer_signal: multiplexer_signal_name
                    .ok_or_else(|| {
                        DecoderError::InvalidSignalDefinition(format!(
                            "Multiplexed signal '{}' but no multiplexer found",
                            dbc_sig.name()
                        ))
                    })?
                    .to_string(),
                multiplexer_values: vec![switch_value],
            })
        }
        _ => None,
    };

    let length = *dbc_sig.signal_size();
    if !(1..=64).contains(&length) {
        return Err(DecoderError::InvalidSignalDefinition(format!(
            "signal '{}' has length {}, expected 1 to 64 bits",
            dbc_sig.name(),
            length
        )));
    }

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: length as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        value_table,
        multiplexer_info,
    })
}

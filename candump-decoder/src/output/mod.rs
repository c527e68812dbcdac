//! Output emitters
//!
//! - `human`: echo each line with the decoded message appended
//! - `sparse_csv`: one CSV row per frame against a header collected up front

pub mod human;
pub mod sparse_csv;

pub use human::{HumanReadableEmitter, HumanSummary, DECODE_SEPARATOR};
pub use sparse_csv::{CsvPhase, CsvSummary, FrozenHeader, SchemaMismatch, SparseCsvEmitter, TIMESTAMP_COLUMN};

#[cfg(test)]
pub(crate) mod tests {
    use crate::decoder::FrameDecoder;
    use crate::types::{DecodedRecord, DecoderError, Result, SignalValue};

    /// Frame id the stub treats as unknown
    pub(crate) const UNKNOWN_ID: u32 = 0x7FF;

    /// Decoder stand-in: payload bytes are `(ascii_key, value)` pairs, so
    /// `100#5801` decodes to `{X: 1}`.
    #[derive(Default)]
    pub(crate) struct StubDecoder;

    impl FrameDecoder for StubDecoder {
        fn decode_to_text(
            &self,
            frame_id: u32,
            data: &[u8],
            _decode_choices: bool,
            single_line: bool,
        ) -> Result<String> {
            if frame_id == UNKNOWN_ID {
                return Err(DecoderError::MessageNotFound(frame_id));
            }
            if single_line {
                Ok(format!("Frame{:X}(len: {})", frame_id, data.len()))
            } else {
                Ok(format!("Frame{:X}(\n    len: {}\n)", frame_id, data.len()))
            }
        }

        fn decode_to_fields(
            &self,
            frame_id: u32,
            data: &[u8],
            _decode_choices: bool,
        ) -> Result<DecodedRecord> {
            if frame_id == UNKNOWN_ID {
                return Err(DecoderError::MessageNotFound(frame_id));
            }
            Ok(data
                .chunks(2)
                .filter(|pair| pair.len() == 2)
                .map(|pair| {
                    (
                        (pair[0] as char).to_string(),
                        SignalValue::Integer(pair[1] as i64),
                    )
                })
                .collect())
        }
    }
}

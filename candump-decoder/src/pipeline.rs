//! Line-decoding pipeline
//!
//! Reads a capture line by line and feeds it to the human-readable or the sparse CSV
//! emitter. Lines end in `\n` or `\r\n`; bytes that are not valid UTF-8 are replaced
//! instead of aborting the stream.

use crate::config::DecodeConfig;
use crate::decoder::FrameDecoder;
use crate::output::{CsvSummary, HumanReadableEmitter, HumanSummary, SparseCsvEmitter};
use crate::types::Result;
use std::io::{BufRead, Write};

/// Reads lines with lossy UTF-8 conversion
pub struct LineReader<R: BufRead> {
    input: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buf: Vec::with_capacity(128),
        }
    }

    /// Next line without its terminator, or None at end of input
    pub fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.input.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// Decode a capture to human-readable text
///
/// Every input line is written to `output`, with the decoded message appended when
/// the line is a known frame. Stops after `config.end_at` lines when that is set.
pub fn decode_stream<R, W, D>(
    input: R,
    output: W,
    decoder: &D,
    config: &DecodeConfig,
) -> Result<HumanSummary>
where
    R: BufRead,
    W: Write,
    D: FrameDecoder + ?Sized,
{
    let mut reader = LineReader::new(input);
    let mut emitter =
        HumanReadableEmitter::new(decoder, output, config.decode_choices, config.single_line);
    let limit = config.line_limit();

    while let Some(line) = reader.next_line()? {
        emitter.process_line(&line)?;

        if limit.is_some_and(|end_at| emitter.summary().lines >= end_at) {
            log::debug!("Reached line limit {}", emitter.summary().lines);
            break;
        }
    }

    let summary = emitter.finish()?;
    log::info!(
        "Processed {} lines: {} decoded, {} not parsed, {} not decoded",
        summary.lines,
        summary.decoded,
        summary.unparsed,
        summary.undecoded
    );
    Ok(summary)
}

/// Decode a timestamped capture into a sparse CSV table written to `output`
pub fn decode_stream_to_csv<R, W, D>(
    input: R,
    output: W,
    decoder: &D,
    config: &DecodeConfig,
) -> Result<CsvSummary>
where
    R: BufRead,
    W: Write,
    D: FrameDecoder + ?Sized,
{
    let mut reader = LineReader::new(input);
    let mut emitter = SparseCsvEmitter::new(decoder, output, config)?;

    while !emitter.is_done() {
        match reader.next_line()? {
            Some(line) => emitter.process_line(&line)?,
            None => break,
        }
    }

    emitter.finish()
}

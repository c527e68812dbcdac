//! Human-readable output
//!
//! Every input line is echoed; lines that parse and decode get ` :: ` and the
//! decoded message appended.

use crate::decoder::FrameDecoder;
use crate::formats::FormatDetector;
use crate::types::{DecoderError, Result};
use std::io::Write;

/// Separator between the original line and the decoded text
pub const DECODE_SEPARATOR: &str = " :: ";

/// Counters for one human-readable run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HumanSummary {
    /// Lines read from the input
    pub lines: u64,
    /// Lines written with decoded text appended
    pub decoded: u64,
    /// Lines that did not parse as a frame
    pub unparsed: u64,
    /// Frames that parsed but could not be decoded
    pub undecoded: u64,
}

/// Writes one output line per input line, in input order
pub struct HumanReadableEmitter<'d, D: FrameDecoder + ?Sized, W: Write> {
    decoder: &'d D,
    output: W,
    detector: FormatDetector,
    decode_choices: bool,
    single_line: bool,
    summary: HumanSummary,
}

impl<'d, D: FrameDecoder + ?Sized, W: Write> HumanReadableEmitter<'d, D, W> {
    pub fn new(decoder: &'d D, output: W, decode_choices: bool, single_line: bool) -> Self {
        Self {
            decoder,
            output,
            detector: FormatDetector::new(),
            decode_choices,
            single_line,
            summary: HumanSummary::default(),
        }
    }

    /// Process one line (trailing newline already stripped)
    pub fn process_line(&mut self, line: &str) -> Result<()> {
        self.summary.lines += 1;
        let line_number = self.summary.lines;

        let frame = match self.detector.parse(line) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Line {} not decoded: {}", line_number, e);
                self.summary.unparsed += 1;
                return self.write_line(line, None);
            }
        };

        match self.decoder.decode_to_text(
            frame.frame_id,
            &frame.payload,
            self.decode_choices,
            self.single_line,
        ) {
            Ok(text) => {
                self.summary.decoded += 1;
                self.write_line(line, Some(&text))
            }
            Err(e) => {
                match e {
                    DecoderError::MessageNotFound(_) => log::debug!("Line {}: {}", line_number, e),
                    _ => log::warn!("Line {}: frame 0x{:X}: {}", line_number, frame.frame_id, e),
                }
                self.summary.undecoded += 1;
                self.write_line(line, None)
            }
        }
    }

    /// Write and flush one output line, so nothing is held back behind the input
    fn write_line(&mut self, line: &str, decoded: Option<&str>) -> Result<()> {
        match decoded {
            Some(text) => writeln!(self.output, "{}{}{}", line, DECODE_SEPARATOR, text)?,
            None => writeln!(self.output, "{}", line)?,
        }
        self.output.flush()?;
        Ok(())
    }

    pub fn summary(&self) -> HumanSummary {
        self.summary
    }

    /// Flush the output and return the run counters
    pub fn finish(mut self) -> Result<HumanSummary> {
        self.output.flush()?;
        Ok(self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::StubDecoder;
    use std::cell::RefCell;
    use std::io::BufWriter;
    use std::rc::Rc;

    fn emit(lines: &[&str], single_line: bool) -> (String, HumanSummary) {
        let decoder = StubDecoder::default();
        let mut out = Vec::new();
        let mut emitter = HumanReadableEmitter::new(&decoder, &mut out, true, single_line);
        for line in lines {
            emitter.process_line(line).unwrap();
        }
        let summary = emitter.finish().unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn test_decoded_line_keeps_original_text() {
        let line = "vcan0  1F0   [8]  00 00 00 00 00 00 1B C1";
        let (out, summary) = emit(&[line], true);
        assert_eq!(out, format!("{} :: Frame1F0(len: 8)\n", line));
        assert_eq!(summary.decoded, 1);
    }

    /// Writer whose contents stay readable while the emitter owns it
    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_each_line_is_flushed_before_the_next() {
        let decoder = StubDecoder::default();
        let sink = SharedSink::default();
        let buffered = BufWriter::with_capacity(8192, sink.clone());
        let mut emitter = HumanReadableEmitter::new(&decoder, buffered, true, true);

        emitter.process_line("vcan0  1F0   [1]  00").unwrap();
        assert_eq!(
            String::from_utf8(sink.0.borrow().clone()).unwrap(),
            "vcan0  1F0   [1]  00 :: Frame1F0(len: 1)\n"
        );

        emitter.process_line("garbage").unwrap();
        assert!(String::from_utf8(sink.0.borrow().clone())
            .unwrap()
            .ends_with("garbage\n"));
    }

    #[test]
    fn test_multi_line_text() {
        let (out, _) = emit(&["vcan0  1F0   [1]  00"], false);
        assert_eq!(out, "vcan0  1F0   [1]  00 :: Frame1F0(\n    len: 1\n)\n");
    }

    #[test]
    fn test_unparsed_and_unknown_pass_through() {
        let lines = [
            "garbage",
            "vcan0  7FF   [1]  00",
            "vcan0  1F0   [1]  00",
            "(1.0) vcan0 1F0#00",
        ];
        let (out, summary) = emit(&lines, true);
        let written: Vec<&str> = out.lines().collect();

        assert_eq!(written.len(), 4);
        assert_eq!(written[0], "garbage");
        assert_eq!(written[1], "vcan0  7FF   [1]  00");
        assert!(written[2].starts_with("vcan0  1F0   [1]  00 :: "));
        // Locked to candump notation; the -L line is not decoded
        assert_eq!(written[3], "(1.0) vcan0 1F0#00");

        assert_eq!(
            summary,
            HumanSummary {
                lines: 4,
                decoded: 1,
                unparsed: 2,
                undecoded: 1,
            }
        );
    }
}

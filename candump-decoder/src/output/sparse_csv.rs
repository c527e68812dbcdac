//! Sparse CSV output
//!
//! The column set of a CAN capture is only known after the frames have been seen,
//! but the CSV header has to be written before the first row. The emitter therefore
//! runs in phases:
//!
//! 1. **Collecting** (lines `1..=start_from`): decode frames and union their signal
//!    names into the column set. Nothing is written.
//! 2. **Header closed**: when the line counter reaches `start_from` the column set is
//!    frozen into a [`FrozenHeader`] (`Timestamp` first, then sorted names) and the
//!    header row is written. With `start_from == 0` this happens before line 1.
//! 3. **Draining**: every decoded frame becomes one row. Signals the header does not
//!    know about turn the row into an all-blank sentinel row.
//! 4. **Done**: the `end_at` line bound was reached; further lines are ignored.
//!
//! If the input ends while still collecting, no header and no rows are written:
//! there was not enough data to build a schema.
//!
//! Only the timestamped `candump -L` notation is accepted.

use crate::config::DecodeConfig;
use crate::decoder::FrameDecoder;
use crate::formats::NotationKind;
use crate::types::{DecodedRecord, ParsedFrame, Result};
use std::collections::BTreeSet;
use std::io::Write;

/// Synthetic leading column holding the frame timestamp
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// Column set frozen at the end of the collection window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenHeader {
    /// `Timestamp` followed by the signal names in lexicographic order
    columns: Vec<String>,
    /// Signal names, for membership checks
    known: BTreeSet<String>,
}

/// A record has fields the frozen header cannot represent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    /// Field names missing from the header, sorted
    pub unexpected: Vec<String>,
}

impl FrozenHeader {
    /// Freeze a collected column set
    pub fn freeze(mut collected: BTreeSet<String>) -> Self {
        collected.remove(TIMESTAMP_COLUMN);
        let columns = std::iter::once(TIMESTAMP_COLUMN.to_string())
            .chain(collected.iter().cloned())
            .collect();
        Self {
            columns,
            known: collected,
        }
    }

    /// All header columns, `Timestamp` first
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Check that every field of the record has a column
    ///
    /// A field named `Timestamp` always fits: the frame timestamp takes its place.
    pub fn check(&self, record: &DecodedRecord) -> std::result::Result<(), SchemaMismatch> {
        let unexpected: Vec<String> = record
            .keys()
            .filter(|key| key.as_str() != TIMESTAMP_COLUMN && !self.known.contains(*key))
            .cloned()
            .collect();

        if unexpected.is_empty() {
            Ok(())
        } else {
            Err(SchemaMismatch { unexpected })
        }
    }

    /// Build the row for a record; columns the record lacks stay blank
    pub fn row(
        &self,
        timestamp: Option<f64>,
        record: &DecodedRecord,
    ) -> std::result::Result<Vec<String>, SchemaMismatch> {
        self.check(record)?;

        Ok(self
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                if index == 0 {
                    timestamp.map(format_timestamp).unwrap_or_default()
                } else {
                    record.get(column).map(|v| v.to_string()).unwrap_or_default()
                }
            })
            .collect())
    }

    /// The all-blank sentinel row
    pub fn blank_row(&self) -> Vec<String> {
        vec![String::new(); self.columns.len()]
    }
}

fn format_timestamp(timestamp: f64) -> String {
    // Debug keeps the fractional part for whole seconds ("2.0", not "2")
    format!("{:?}", timestamp)
}

/// Emitter phase
#[derive(Debug, Clone, PartialEq)]
pub enum CsvPhase {
    /// Building the column set; nothing written yet
    Collecting(BTreeSet<String>),
    /// Header written; rows follow
    Draining(FrozenHeader),
    /// Line bound reached
    Done,
}

/// Counters for one CSV run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvSummary {
    /// Lines read from the input
    pub lines: u64,
    /// Lines that did not parse as a timestamped frame
    pub malformed: u64,
    /// Frames decoded during the collection window
    pub collected: u64,
    /// Header columns including `Timestamp`; None if the header was never written
    pub header_columns: Option<usize>,
    /// Data rows written, sentinel rows included
    pub rows_written: u64,
    /// All-blank rows written for unknown frames or unexpected columns
    pub sentinel_rows: u64,
}

impl CsvSummary {
    /// Rows that carry decoded data
    pub fn decoded_rows(&self) -> u64 {
        self.rows_written - self.sentinel_rows
    }
}

/// Writes decoded frames as a sparse CSV table
pub struct SparseCsvEmitter<'d, D: FrameDecoder + ?Sized, W: Write> {
    decoder: &'d D,
    writer: csv::Writer<W>,
    decode_choices: bool,
    start_from: u64,
    end_at: Option<u64>,
    line_counter: u64,
    phase: CsvPhase,
    summary: CsvSummary,
}

impl<'d, D: FrameDecoder + ?Sized, W: Write> SparseCsvEmitter<'d, D, W> {
    /// Create an emitter writing CSV to `output`
    ///
    /// With `start_from == 0` the (Timestamp-only) header is written immediately.
    pub fn new(decoder: &'d D, output: W, config: &DecodeConfig) -> Result<Self> {
        if config.header_window_too_short() {
            log::warn!(
                "--start should be at least {} to allow for CSV headers to be generated",
                crate::config::MIN_HEADER_WINDOW
            );
        }
        log::info!(
            "Collecting header data only from first {} messages",
            config.start_from
        );

        let writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(output);

        let mut emitter = Self {
            decoder,
            writer,
            decode_choices: config.decode_choices,
            start_from: config.start_from,
            end_at: config.line_limit(),
            line_counter: 0,
            phase: CsvPhase::Collecting(BTreeSet::new()),
            summary: CsvSummary::default(),
        };

        if emitter.start_from == 0 {
            emitter.close_header()?;
        }

        Ok(emitter)
    }

    pub fn phase(&self) -> &CsvPhase {
        &self.phase
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, CsvPhase::Done)
    }

    pub fn summary(&self) -> CsvSummary {
        self.summary
    }

    /// Process one line (trailing newline already stripped)
    pub fn process_line(&mut self, line: &str) -> Result<()> {
        if self.is_done() {
            return Ok(());
        }

        self.line_counter += 1;
        self.summary.lines = self.line_counter;

        match NotationKind::TimestampedHexConcatenated.parse(line) {
            Ok(frame) => self.handle_frame(frame)?,
            Err(e) => {
                log::warn!("Parse failed for line {}: {}", self.line_counter, e);
                self.summary.malformed += 1;
            }
        }

        if self.line_counter == self.start_from && matches!(self.phase, CsvPhase::Collecting(_)) {
            self.close_header()?;
        }

        if let Some(end_at) = self.end_at {
            if self.line_counter >= end_at {
                log::debug!("Reached line limit {}", end_at);
                self.phase = CsvPhase::Done;
            }
        }

        Ok(())
    }

    fn handle_frame(&mut self, frame: ParsedFrame) -> Result<()> {
        let decoded = self
            .decoder
            .decode_to_fields(frame.frame_id, &frame.payload, self.decode_choices);

        match &mut self.phase {
            CsvPhase::Collecting(columns) => match decoded {
                Ok(record) => {
                    columns.extend(record.into_keys());
                    self.summary.collected += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Line {}: frame 0x{:x} skipped while collecting headers: {}",
                        self.line_counter,
                        frame.frame_id,
                        e
                    );
                }
            },
            CsvPhase::Draining(header) => {
                let row = match decoded {
                    Ok(record) => match header.row(frame.timestamp, &record) {
                        Ok(row) => row,
                        Err(mismatch) => {
                            log::warn!(
                                "New or non-cyclic CAN message 0x{:x} {:?} not saved to CSV \
                                 (unexpected columns: {}). Set --start to a higher value to \
                                 include more messages in the CSV header",
                                frame.frame_id,
                                record,
                                mismatch.unexpected.join(", ")
                            );
                            self.summary.sentinel_rows += 1;
                            header.blank_row()
                        }
                    },
                    Err(e) => {
                        log::warn!(
                            "Line {}: frame 0x{:x} not saved to CSV: {}",
                            self.line_counter,
                            frame.frame_id,
                            e
                        );
                        self.summary.sentinel_rows += 1;
                        header.blank_row()
                    }
                };
                self.writer.write_record(&row)?;
                self.summary.rows_written += 1;
            }
            CsvPhase::Done => {}
        }

        Ok(())
    }

    /// Collecting → Draining: freeze the column set and write the header row
    fn close_header(&mut self) -> Result<()> {
        let CsvPhase::Collecting(columns) = std::mem::replace(&mut self.phase, CsvPhase::Done)
        else {
            return Ok(());
        };

        let header = FrozenHeader::freeze(columns);
        log::info!("Saving headers: {} columns in CSV", header.columns().len());
        self.writer.write_record(header.columns())?;
        self.summary.header_columns = Some(header.columns().len());
        self.phase = CsvPhase::Draining(header);
        log::info!("Decoding data.....");
        Ok(())
    }

    /// Flush the CSV output and return the run counters
    ///
    /// The "Decoded N messages" count is the number of rows written after the
    /// header, sentinel rows included. It differs from `lines - start_from` when
    /// malformed lines were skipped or input ended early.
    pub fn finish(mut self) -> Result<CsvSummary> {
        if let CsvPhase::Collecting(_) = self.phase {
            log::warn!(
                "Input ended after {} lines, before the {}-line header window closed; \
                 no CSV header or rows were written",
                self.line_counter,
                self.start_from
            );
        }
        self.writer.flush()?;
        log::info!("Finished. Decoded {} messages.", self.summary.rows_written);
        Ok(self.summary)
    }
}

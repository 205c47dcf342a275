use crate::error::{RelayError, Result};
use bytes::{Buf, BytesMut};

/// Payload that marks the end of the upstream stream
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_FIELD: &str = "data:";

/// One complete record of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRecord {
    /// Opaque payload of the record's `data:` lines
    Data(String),
    /// The upstream has finished producing output
    Sentinel,
}

/// Records extracted from one chunk.
///
/// When `error` is set, `records` holds everything that completed before the
/// failing record and the reassembler accepts no further input.
#[derive(Debug, Default)]
pub struct FrameBatch {
    pub records: Vec<EventRecord>,
    pub error: Option<RelayError>,
}

impl FrameBatch {
    /// All-or-nothing view, dropping the good records on failure
    pub fn into_result(self) -> Result<Vec<EventRecord>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.records),
        }
    }
}

/// Stateful splitter for a `text/event-stream` body.
///
/// Bytes are held until a blank line terminates a record, so records may be
/// split across any number of chunks and one chunk may carry many records.
/// UTF-8 is decoded per complete record, which keeps multi-byte characters
/// that straddle a chunk boundary intact.
pub struct FrameReassembler {
    buffer: BytesMut,
    max_pending_bytes: usize,
    /// Bytes of `buffer` already searched for a record boundary
    scanned: usize,
    /// Start of the line that `scanned` is currently inside
    line_start: usize,
    finished: bool,
    failed: bool,
}

impl FrameReassembler {
    pub fn new(max_pending_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_pending_bytes.min(8192)),
            max_pending_bytes,
            scanned: 0,
            line_start: 0,
            finished: false,
            failed: false,
        }
    }

    /// Feed new data and extract complete records in arrival order.
    ///
    /// After the sentinel or a failure every further byte is discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> FrameBatch {
        if self.finished || self.failed {
            if !chunk.is_empty() {
                tracing::debug!(bytes = chunk.len(), "Discarding bytes after end of stream");
            }
            return FrameBatch::default();
        }

        self.buffer.extend_from_slice(chunk);
        let mut batch = self.extract_records();

        if batch.error.is_none() && self.buffer.len() > self.max_pending_bytes {
            batch.error = Some(RelayError::FramingError(format!(
                "Pending record exceeds {} bytes without a delimiter",
                self.max_pending_bytes
            )));
        }

        if batch.error.is_some() {
            self.failed = true;
            self.reset();
        }

        batch
    }

    fn extract_records(&mut self) -> FrameBatch {
        let mut batch = FrameBatch::default();

        while let Some(end) = self.find_record_boundary() {
            let raw = self.buffer.split_to(end);
            self.scanned = 0;
            self.line_start = 0;

            let record = match Self::parse_record(&raw) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    batch.error = Some(e);
                    break;
                }
            };

            if record == EventRecord::Sentinel {
                let trailing = self.buffer.len();
                self.reset();
                self.finished = true;
                if trailing > 0 {
                    tracing::debug!(bytes = trailing, "Discarding bytes after sentinel");
                }
                batch.records.push(record);
                break;
            }

            batch.records.push(record);
        }

        batch
    }

    /// End offset (inclusive of the blank line) of the first complete record.
    ///
    /// Resumes from where the previous call stopped, so each byte is examined
    /// once no matter how the record was chunked.
    fn find_record_boundary(&mut self) -> Option<usize> {
        while self.scanned < self.buffer.len() {
            let i = self.scanned;
            self.scanned += 1;

            if self.buffer[i] != b'\n' {
                continue;
            }

            let line = &self.buffer[self.line_start..i];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                return Some(i + 1);
            }
            self.line_start = i + 1;
        }

        None
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.line_start = 0;
    }

    /// Parse one raw record. Records without a `data:` field (comments,
    /// keep-alives, stray blank lines) yield `None`.
    fn parse_record(raw: &[u8]) -> Result<Option<EventRecord>> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| RelayError::FramingError(format!("Record is not valid UTF-8: {}", e)))?;

        let mut payload: Option<String> = None;

        for line in text.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            // `event:`, `id:` and `retry:` carry nothing the relay needs
            let Some(value) = line.strip_prefix(DATA_FIELD) else {
                continue;
            };
            let value = value.strip_prefix(' ').unwrap_or(value);

            match payload.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => payload = Some(value.to_string()),
            }
        }

        Ok(payload.map(|p| {
            if p == DONE_SENTINEL {
                EventRecord::Sentinel
            } else {
                EventRecord::Data(p)
            }
        }))
    }

    /// Whether the sentinel has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes buffered but not yet resolved into a record
    pub fn pending_len(&self) -> usize {
        self.buffer.remaining()
    }
}

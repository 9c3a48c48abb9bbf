//! Newline framing over an unframed byte stream.
//!
//! Serial reads land at arbitrary boundaries: a chunk may hold half a
//! record, three records, or a record plus the first bytes of the next one.
//! [`LineFramer`] buffers across chunks and only ever hands out complete,
//! trimmed records.

/// Splits an incoming byte stream into newline-terminated records.
///
/// The carry-over buffer holds raw bytes rather than text because a chunk
/// boundary may fall inside a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every complete record it finishes.
    ///
    /// Records are trimmed of surrounding whitespace (including the `\r` of
    /// CRLF-terminated devices); empty records are discarded. The trailing
    /// partial segment stays buffered for the next call. Never fails:
    /// malformed bytes simply produce records that fail later stages.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let record = String::from_utf8_lossy(&line).trim().to_string();
            if !record.is_empty() {
                records.push(record);
            }
        }
        records
    }

    /// Bytes currently buffered waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

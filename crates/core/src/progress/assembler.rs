//! Line reassembly for chunked process output.

/// Longest line kept in the buffer before it is emitted unterminated (1 MiB).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Rebuilds newline-terminated lines from arbitrarily split byte chunks.
///
/// One assembler is used per output stream. Splitting happens on raw bytes
/// so a multi-byte UTF-8 sequence cut across two reads decodes correctly.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in order.
    ///
    /// Bytes after the last newline stay buffered until the next call or
    /// [`finish`](Self::finish).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        // Buffered bytes are known to contain no newline.
        let mut search_from = self.buf.len();
        self.buf.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buf[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            lines.push(decode_line(&self.buf[start..end]));
            start = end + 1;
            search_from = start;
        }
        self.buf.drain(..start);

        while self.buf.len() >= MAX_LINE_BYTES {
            let rest = self.buf.split_off(char_boundary(&self.buf, MAX_LINE_BYTES));
            lines.push(String::from_utf8_lossy(&self.buf).into_owned());
            self.buf = rest;
        }

        lines
    }

    /// Flush the trailing partial line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Some(line)
    }

    /// Number of bytes waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

/// Largest cut at or below `max` that does not split a UTF-8 sequence.
///
/// Only the last three bytes before `max` are inspected; invalid input is
/// cut at `max`.
fn char_boundary(buf: &[u8], max: usize) -> usize {
    let floor = max.saturating_sub(3);
    let Some(lead) = (floor..max).rev().find(|&i| buf[i] & 0xC0 != 0x80) else {
        return max;
    };
    let width = match buf[lead] {
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        b if b >= 0xC0 => 2,
        _ => 1,
    };
    if lead > 0 && lead + width > max {
        lead
    } else {
        max
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

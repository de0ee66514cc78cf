//! [`LineBuffer`] – newline framing over a byte stream.
//!
//! Serial reads return whatever bytes happen to be in the driver's buffer,
//! which may be half a line or several lines at once.  The buffer keeps the
//! partial tail between reads and only ever yields complete lines.

use tracing::warn;

/// Longest line accepted from the peer, in bytes, excluding the terminator.
pub const MAX_LINE_BYTES: usize = 4096;

/// Accumulates raw bytes and splits them into `\n`-terminated lines.
///
/// A line that exceeds the configured limit before its terminator arrives is
/// dropped in its entirety, including the tail that arrives later.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_bytes: usize,
    /// Set while the remainder of an overlong line is being thrown away.
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::with_capacity(256),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Append a chunk of bytes read from the device.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > self.max_line_bytes && !self.pending.contains(&b'\n') {
            if !self.discarding {
                warn!(
                    buffered = self.pending.len(),
                    limit = self.max_line_bytes,
                    "inbound line exceeds limit without terminator; discarding"
                );
            }
            self.pending.clear();
            self.discarding = true;
        }
    }

    /// Pop the next complete line, with `\n` and any trailing `\r` removed.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let end = self.pending.iter().position(|b| *b == b'\n')?;
            let mut raw: Vec<u8> = self.pending.drain(..=end).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            return Some(String::from_utf8_lossy(&raw).into_owned());
        }
    }

    /// Number of bytes held that do not yet form a complete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_nothing_until_terminator_arrives() {
        let mut buf = LineBuffer::default();
        buf.push(b"{\"om_temp\":3");
        assert!(buf.next_line().is_none());
        buf.push(b"2}\n");
        assert_eq!(buf.next_line().as_deref(), Some("{\"om_temp\":32}"));
        assert!(buf.next_line().is_none());
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn splits_multiple_lines_in_one_chunk() {
        let mut buf = LineBuffer::default();
        buf.push(b"MCU boot ok\r\n{}\npartial");
        assert_eq!(buf.next_line().as_deref(), Some("MCU boot ok"));
        assert_eq!(buf.next_line().as_deref(), Some("{}"));
        assert!(buf.next_line().is_none());
        assert_eq!(buf.pending_len(), "partial".len());
    }

    #[test]
    fn empty_line_is_returned_as_empty_string() {
        let mut buf = LineBuffer::default();
        buf.push(b"\r\n");
        assert_eq!(buf.next_line().as_deref(), Some(""));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let mut buf = LineBuffer::default();
        buf.push(&[b'o', b'k', 0xFF, b'\n']);
        let line = buf.next_line().expect("line");
        assert!(line.starts_with("ok"));
        assert!(line.contains('\u{FFFD}'));
    }

    #[test]
    fn overlong_line_is_dropped_including_its_tail() {
        let mut buf = LineBuffer::new(8);
        buf.push(b"0123456789");
        assert_eq!(buf.pending_len(), 0);
        buf.push(b"abc\n{}\n");
        // The tail of the runaway line is discarded, the next line survives.
        assert_eq!(buf.next_line().as_deref(), Some("{}"));
        assert!(buf.next_line().is_none());
    }
}

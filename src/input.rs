//! Byte stream to line splitting
use memchr::memchr2;

/// Splits fed bytes into normalized lines.
///
/// Every emitted line ends in exactly one `\n`, whatever ending the input
/// used. Invalid UTF-8 becomes U+FFFD and NUL becomes U+FFFD.
#[derive(Debug, Default)]
pub(crate) struct LineReader {
    /// Bytes of a line whose ending has not arrived yet.
    pending: Vec<u8>,
    /// The previous chunk ended in `\r`, so a leading `\n` belongs to it.
    last_was_cr: bool,
    /// No line has been emitted yet; a byte order mark is dropped.
    at_start: bool,
    total_bytes: usize,
}

impl LineReader {
    pub fn new() -> Self {
        LineReader {
            at_start: true,
            ..LineReader::default()
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Feed a chunk, calling `emit` for each completed line.
    pub fn feed(&mut self, mut bytes: &[u8], mut emit: impl FnMut(String)) {
        if bytes.is_empty() {
            return;
        }
        self.total_bytes += bytes.len();

        // Second half of a `\r\n` split across two feeds
        if self.last_was_cr && bytes.first() == Some(&b'\n') {
            bytes = &bytes[1..];
        }
        self.last_was_cr = false;

        while !bytes.is_empty() {
            let Some(eol) = memchr2(b'\n', b'\r', bytes) else {
                self.pending.extend_from_slice(bytes);
                break;
            };

            self.pending.extend_from_slice(&bytes[..eol]);
            let mut consumed = eol + 1;
            if bytes[eol] == b'\r' {
                if eol + 1 == bytes.len() {
                    self.last_was_cr = true;
                } else if bytes[eol + 1] == b'\n' {
                    consumed += 1;
                }
            }
            bytes = &bytes[consumed..];

            let line = self.take_line();
            emit(line);
        }
    }

    /// Flush a final line that had no line ending.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.take_line())
    }

    fn take_line(&mut self) -> String {
        let raw = std::mem::take(&mut self.pending);
        let mut line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        if self.at_start {
            self.at_start = false;
            if let Some(rest) = line.strip_prefix('\u{feff}') {
                line = rest.to_string();
            }
        }
        if line.contains('\0') {
            line = line.replace('\0', "\u{fffd}");
        }
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(chunks: &[&[u8]]) -> Vec<String> {
        let mut reader = LineReader::new();
        let mut out = Vec::new();
        for chunk in chunks {
            reader.feed(chunk, |line| out.push(line));
        }
        out.extend(reader.finish());
        out
    }

    #[test]
    fn test_mixed_line_endings() {
        assert_eq!(lines(&[b"a\nb\r\nc\rd"]), ["a\n", "b\n", "c\n", "d\n"]);
    }

    #[test]
    fn test_crlf_split_across_feeds() {
        assert_eq!(lines(&[b"a\r", b"\nb"]), ["a\n", "b\n"]);
        assert_eq!(lines(&[b"a\r", b"\r\n"]), ["a\n", "\n"]);
        assert_eq!(lines(&[b"a\r", b"", b"\nb\n"]), ["a\n", "b\n"]);
    }

    #[test]
    fn test_line_split_across_feeds() {
        assert_eq!(lines(&[b"he", b"llo\nwor", b"ld"]), ["hello\n", "world\n"]);
    }

    #[test]
    fn test_invalid_utf8_and_nul_replaced() {
        assert_eq!(lines(&[b"a\xffb\0c\n"]), ["a\u{fffd}b\u{fffd}c\n"]);
    }

    #[test]
    fn test_bom_dropped_only_at_start() {
        assert_eq!(
            lines(&["\u{feff}a\n\u{feff}b".as_bytes()]),
            ["a\n", "\u{feff}b\n"]
        );
    }
}

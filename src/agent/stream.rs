//! NDJSON line reader for the agent's stdout.
//!
//! Event lines routinely exceed buffered-line defaults (full assistant
//! messages with embedded file contents), so reading is uncapped. The
//! final line may arrive without a trailing newline when the subprocess
//! exits mid-flush; it is still a line.

use std::io::{self, BufRead};

/// Reads newline-delimited lines of unbounded length.
pub struct NdjsonReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: BufRead> NdjsonReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// The next line without its trailing newline, or None at EOF.
    /// I/O errors surface verbatim; lines read before the error have
    /// already been returned by earlier calls.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let read = self.inner.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        String::from_utf8(std::mem::take(&mut self.buf))
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn test_reads_lines_in_order() {
        let mut reader = NdjsonReader::new(Cursor::new("{\"a\":1}\n{\"b\":2}\n"));
        assert_eq!(reader.next_line().unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(reader.next_line().unwrap().unwrap(), "{\"b\":2}");
        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn test_final_line_without_newline() {
        let mut reader = NdjsonReader::new(Cursor::new("{\"a\":1}\n{\"b\":2}"));
        assert_eq!(reader.next_line().unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(reader.next_line().unwrap().unwrap(), "{\"b\":2}");
        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn test_accepts_very_long_lines() {
        // A line comfortably past any default token cap.
        let long = format!("{{\"text\":\"{}\"}}", "x".repeat(1024 * 1024));
        let input = format!("{}\nshort\n", long);
        let mut reader = NdjsonReader::new(Cursor::new(input));
        assert_eq!(reader.next_line().unwrap().unwrap().len(), long.len());
        assert_eq!(reader.next_line().unwrap().unwrap(), "short");
    }

    #[test]
    fn test_strips_carriage_return() {
        let mut reader = NdjsonReader::new(Cursor::new("line\r\n"));
        assert_eq!(reader.next_line().unwrap().unwrap(), "line");
    }

    /// A reader that yields some data, then fails.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
        failed: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                if self.failed {
                    return Ok(0);
                }
                self.failed = true;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream died"));
            }
            Ok(n)
        }
    }

    #[test]
    fn test_error_surfaces_after_received_lines() {
        let reader = FailingReader {
            data: Cursor::new(b"first\nsecond\n".to_vec()),
            failed: false,
        };
        let mut reader = NdjsonReader::new(io::BufReader::new(reader));
        assert_eq!(reader.next_line().unwrap().unwrap(), "first");
        assert_eq!(reader.next_line().unwrap().unwrap(), "second");
        let err = reader.next_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}

use std::str;

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/* == Encode trait == */

pub trait Encode {
    fn encode<B: BufMut>(&self, buf: &mut B);
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Received bytes are not valid UTF-8: {0:02x?}")]
    InvalidUtf8(Vec<u8>),

    #[error("Line exceeds {0} bytes without a terminator")]
    LineTooLong(usize),
}

/* == Trait extensions == */

pub trait BufMutExt: BufMut {
    /// Writes the text followed by the `\n` line terminator.
    fn put_line(&mut self, text: &str) {
        self.put_slice(text.as_bytes());
        self.put_u8(LineBuffer::TERMINATOR);
    }
}

impl<T: BufMut> BufMutExt for T {}

/* == Line buffer == */

/// Accumulates raw bytes from a stream and yields complete `\n`-terminated lines.
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub const TERMINATOR: u8 = b'\n';
    pub const MAX_LINE: usize = 4096;

    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(Self::MAX_LINE),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Pops the next complete line, trimmed of surrounding whitespace
    /// (including a `\r` left by CRLF peers). Returns `None` until a
    /// terminator has been received.
    pub fn next_line(&mut self) -> Option<Result<String, DecodeError>> {
        let Some(end) = self.buf.iter().position(|&b| b == Self::TERMINATOR) else {
            if self.buf.len() > Self::MAX_LINE {
                self.buf.clear();
                return Some(Err(DecodeError::LineTooLong(Self::MAX_LINE)));
            }

            return None;
        };

        let line = self.buf.split_to(end + 1);
        let line = &line[..end];

        Some(match str::from_utf8(line) {
            Ok(text) => Ok(text.trim().to_owned()),
            Err(_) => Err(DecodeError::InvalidUtf8(line.to_vec())),
        })
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut lines = LineBuffer::new();

        lines.extend(b"status:led=on,fa");
        assert_eq!(lines.next_line(), None);

        lines.extend(b"n=128\r\nhello,25");
        assert_eq!(
            lines.next_line(),
            Some(Ok("status:led=on,fan=128".to_owned()))
        );
        assert_eq!(lines.next_line(), None);

        lines.extend(b"0,ms\n\n");
        assert_eq!(lines.next_line(), Some(Ok("hello,250,ms".to_owned())));
        assert_eq!(lines.next_line(), Some(Ok(String::new())));
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn test_invalid_utf8_does_not_poison_buffer() {
        let mut lines = LineBuffer::new();

        lines.extend(&[0xff, 0xfe, b'\n']);
        lines.extend(b"ERROR\n");

        assert_eq!(
            lines.next_line(),
            Some(Err(DecodeError::InvalidUtf8(vec![0xff, 0xfe])))
        );
        assert_eq!(lines.next_line(), Some(Ok("ERROR".to_owned())));
    }

    #[test]
    fn test_unterminated_line_is_discarded() {
        let mut lines = LineBuffer::new();

        lines.extend(&[b'x'; LineBuffer::MAX_LINE + 1]);

        assert_eq!(
            lines.next_line(),
            Some(Err(DecodeError::LineTooLong(LineBuffer::MAX_LINE)))
        );

        lines.extend(b"ok\n");
        assert_eq!(lines.next_line(), Some(Ok("ok".to_owned())));
    }

    #[test]
    fn test_put_line() {
        let mut buf = Vec::new();
        buf.put_line("LED_ON");
        assert_eq!(buf, b"LED_ON\n");
    }
}

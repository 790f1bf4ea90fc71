//! Streaming exact-substring matcher used to spot command echoes and prompts.
//!
//! The matcher is fed one byte at a time. While a candidate match is in
//! progress its bytes are held back; if the candidate breaks, the bytes that
//! can no longer be part of any match are released to the caller, in stream
//! order, so that an echoing caller reproduces everything except the pattern.

use std::io::{Read, Write};

use tracing::trace;

use crate::error::{Error, Result};
use crate::transport::Connection;

/// Working state of one wait: the pattern and how much of it has been seen.
#[derive(Debug, Clone)]
pub struct PatternMatcher<'p> {
    pattern: &'p [u8],
    // fallback[i]: length of the longest proper prefix of pattern[..=i]
    // that is also its suffix.
    fallback: Vec<usize>,
    cursor: usize,
}

impl<'p> PatternMatcher<'p> {
    pub fn new(pattern: &'p [u8]) -> Self {
        let mut fallback = vec![0; pattern.len()];
        let mut k = 0;
        for i in 1..pattern.len() {
            while k > 0 && pattern[i] != pattern[k] {
                k = fallback[k - 1];
            }
            if pattern[i] == pattern[k] {
                k += 1;
            }
            fallback[i] = k;
        }
        Self {
            pattern,
            fallback,
            cursor: 0,
        }
    }

    /// Number of consecutively matched pattern bytes.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.pattern.len()
    }

    /// Consumes one byte and returns `true` once the whole pattern has been
    /// seen. Bytes that turn out not to belong to the match are appended to
    /// `released`.
    pub fn feed(&mut self, byte: u8, released: &mut Vec<u8>) -> bool {
        if self.is_complete() {
            return true;
        }
        loop {
            if byte == self.pattern[self.cursor] {
                self.cursor += 1;
                return self.is_complete();
            }
            if self.cursor == 0 {
                released.push(byte);
                return false;
            }
            let keep = self.fallback[self.cursor - 1];
            released.extend_from_slice(&self.pattern[..self.cursor - keep]);
            self.cursor = keep;
        }
    }
}

/// Reads from `conn` until `pattern` has just been observed.
///
/// With `echo` set, every byte that is not part of the match is forwarded to
/// it, including bytes of a partial match that later broke. The pattern
/// itself is never forwarded. Without `echo` those bytes are discarded.
pub fn wait_for<P: Read + Write>(
    conn: &mut Connection<P>,
    pattern: &[u8],
    mut echo: Option<&mut dyn Write>,
) -> Result<()> {
    let mut matcher = PatternMatcher::new(pattern);
    let mut released = Vec::new();
    while !matcher.is_complete() {
        let byte = conn.read_byte()?;
        matcher.feed(byte, &mut released);
        if released.is_empty() {
            continue;
        }
        if let Some(out) = echo.as_deref_mut() {
            out.write_all(&released).map_err(Error::Echo)?;
        }
        released.clear();
    }
    if let Some(out) = echo {
        out.flush().map_err(Error::Echo)?;
    }
    trace!(pattern = %String::from_utf8_lossy(pattern), "pattern matched");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn conn(input: &[u8]) -> Connection<Cursor<Vec<u8>>> {
        Connection::new(Cursor::new(input.to_vec()), "test")
    }

    fn first_match_end(stream: &[u8], pattern: &[u8]) -> Option<usize> {
        stream
            .windows(pattern.len())
            .position(|w| w == pattern)
            .map(|start| start + pattern.len())
    }

    #[test]
    fn broken_partial_prompt_is_echoed() {
        let mut conn = conn(b"chch> ");
        let mut out = Vec::new();
        wait_for(&mut conn, b"ch> ", Some(&mut out)).unwrap();
        assert_eq!(out, b"ch");
        assert!(matches!(conn.read_byte(), Err(Error::Timeout)));
    }

    #[test]
    fn response_text_is_forwarded_without_prompt() {
        let mut conn = conn(b"1.0.0\r\nch> ");
        let mut out = Vec::new();
        wait_for(&mut conn, b"ch> ", Some(&mut out)).unwrap();
        assert_eq!(out, b"1.0.0\r\n");
    }

    #[test]
    fn silent_wait_stops_right_after_the_pattern() {
        let mut conn = conn(b"noise pause\r\nrest");
        wait_for(&mut conn, b"pause", None).unwrap();
        wait_for(&mut conn, b"\r\n", None).unwrap();
        assert_eq!(conn.read_byte().unwrap(), b'r');
    }

    #[test]
    fn overlapping_prefix_is_not_lost() {
        let mut conn = conn(b"aaab");
        let mut out = Vec::new();
        wait_for(&mut conn, b"aab", Some(&mut out)).unwrap();
        assert_eq!(out, b"a");
    }

    #[test]
    fn missing_pattern_times_out() {
        let mut conn = conn(b"capture\r");
        assert!(matches!(
            wait_for(&mut conn, b"capture\r\n", None),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn empty_pattern_matches_without_reading() {
        let mut conn = conn(b"x");
        wait_for(&mut conn, b"", None).unwrap();
        assert_eq!(conn.read_byte().unwrap(), b'x');
    }

    #[test]
    fn feed_tracks_cursor() {
        let mut matcher = PatternMatcher::new(b"\r\n");
        let mut released = Vec::new();
        assert!(!matcher.feed(b'\r', &mut released));
        assert_eq!(matcher.cursor(), 1);
        assert!(!matcher.feed(b'x', &mut released));
        assert_eq!(matcher.cursor(), 0);
        assert_eq!(released, b"\rx");
        assert!(!matcher.feed(b'\r', &mut released));
        assert!(matcher.feed(b'\n', &mut released));
        assert!(matcher.is_complete());
    }

    proptest! {
        #[test]
        fn silent_wait_succeeds_iff_pattern_present(
            pattern in prop::collection::vec(prop::sample::select(b"ab>".to_vec()), 1..5),
            stream in prop::collection::vec(prop::sample::select(b"ab>".to_vec()), 0..40),
        ) {
            let mut conn = conn(&stream);
            let found = wait_for(&mut conn, &pattern, None).is_ok();
            prop_assert_eq!(found, first_match_end(&stream, &pattern).is_some());
        }

        #[test]
        fn echo_plus_pattern_reconstructs_consumed_prefix(
            pattern in prop::collection::vec(prop::sample::select(b"ab>".to_vec()), 1..5),
            stream in prop::collection::vec(prop::sample::select(b"ab>".to_vec()), 0..40),
        ) {
            let end = first_match_end(&stream, &pattern);
            prop_assume!(end.is_some());
            let end = end.unwrap();

            let mut conn = conn(&stream);
            let mut out = Vec::new();
            wait_for(&mut conn, &pattern, Some(&mut out)).unwrap();
            out.extend_from_slice(&pattern);
            prop_assert_eq!(&out[..], &stream[..end]);
        }
    }
}

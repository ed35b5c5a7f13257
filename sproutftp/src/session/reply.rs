//! # Reply
//!
//! Assembles control channel lines into a [`Response`].
//!
//! A reply is `DDD text` on a single line, or opens with `DDD-text` and runs until a line
//! starting with the same `DDD` followed by a space.

use crate::types::{FtpError, FtpResult, Response};

/// Builds one reply out of the lines read from the control channel
#[derive(Debug)]
pub(crate) struct ReplyBuilder {
    code: u32,
    lines: Vec<String>,
    complete: bool,
}

impl ReplyBuilder {
    /// Start a reply from its first line. Fails if the line doesn't begin with a 3-digit code
    pub(crate) fn new(first_line: &str) -> FtpResult<Self> {
        let (code, separator, text) = Self::split_line(first_line).ok_or_else(|| {
            FtpError::ProtocolError(format!("malformed reply line {first_line:?}"))
        })?;
        Ok(Self {
            code,
            lines: vec![text.to_string()],
            complete: separator != Some('-'),
        })
    }

    /// Feed a line following the first one
    pub(crate) fn feed(&mut self, line: &str) {
        match Self::split_line(line) {
            Some((code, separator, text)) if code == self.code && separator != Some('-') => {
                self.lines.push(text.to_string());
                self.complete = true;
            }
            Some((code, Some('-'), text)) if code == self.code => {
                self.lines.push(text.to_string());
            }
            // intermediate lines may be free text; keep leading spaces
            _ => self.lines.push(line.to_string()),
        }
    }

    /// Whether the closing line has been seen
    pub(crate) fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn build(self) -> Response {
        Response::new(self.code, self.lines.join("\n"))
    }

    /// Split a reply line into code, separator and text
    fn split_line(line: &str) -> Option<(u32, Option<char>, &str)> {
        let code = line.get(0..3)?;
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let code = code.parse::<u32>().ok()?;
        if !(100..600).contains(&code) {
            return None;
        }
        let mut rest = line[3..].chars();
        match rest.next() {
            None => Some((code, None, "")),
            Some(sep @ (' ' | '-')) => Some((code, Some(sep), &line[4..])),
            Some(_) => None,
        }
    }
}

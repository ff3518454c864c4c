//! Response parsing and display
//!
//! Splits a raw modem reply into lines and renders it, stripping or
//! highlighting the command echo when the modem repeats the command.

use crate::protocol::RawResponse;

const ECHO_PREFIX: &str = "AT";
const SENT_MARKER: &str = "<  ";
const RECEIVED_MARKER: &str = ">  ";

/// A reply split into lines
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    /// Lines in arrival order, without line terminators
    pub lines: Vec<String>,
    /// True when the first line echoes the sent command
    pub echoed: bool,
}

impl ParsedResponse {
    /// Split `text` on line feeds
    ///
    /// Trailing `\r` characters are removed from each line, and the empty segment left
    /// after a final line feed is dropped.
    pub fn parse(text: &str) -> Self {
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        if text.ends_with('\n') || text.is_empty() {
            lines.pop();
        }

        let echoed = lines.len() > 1 && lines[0].trim().starts_with(ECHO_PREFIX);
        Self { lines, echoed }
    }

    /// The echoed command line, if any
    pub fn echo(&self) -> Option<&str> {
        self.echoed.then(|| self.lines[0].as_str())
    }

    /// Lines after the echo, or every line when there is no echo
    pub fn body(&self) -> &[String] {
        if self.echoed {
            &self.lines[1..]
        } else {
            &self.lines
        }
    }
}

/// Render a raw reply for display
///
/// Every emitted line ends in `\n`. With `verbose` the echo is shown with a
/// `<` marker, followed by a blank line and the body lines marked with `>`.
/// Without `verbose` the echo is dropped. A reply without an echo is printed
/// as received in both modes.
pub fn render(raw: &RawResponse, verbose: bool) -> String {
    let parsed = ParsedResponse::parse(&raw.text);
    let mut out = String::with_capacity(raw.text.len() + 16);

    match parsed.echo() {
        Some(echo) if verbose => {
            push_line(&mut out, SENT_MARKER, echo);
            out.push('\n');
            for line in parsed.body() {
                push_line(&mut out, RECEIVED_MARKER, line);
            }
        }
        _ => {
            for line in parsed.body() {
                push_line(&mut out, "", line);
            }
        }
    }
    out
}

fn push_line(out: &mut String, marker: &str, line: &str) {
    out.push_str(marker);
    out.push_str(line);
    out.push('\n');
}

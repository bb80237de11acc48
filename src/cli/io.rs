//! Line-delimited JSON over arbitrary readers and writers
//!
//! - Input: one JSON object per line, blank lines skipped
//! - Output: one JSON object per line, flushed after each
//! - UTF-8 only

use std::io::{BufRead, Write};

use super::errors::CliResult;
use crate::api::Response;

/// Next non-blank request line, or `None` at EOF
pub fn read_request<R: BufRead>(input: &mut R) -> CliResult<Option<String>> {
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
}

/// Write a response as one line
pub fn write_response<W: Write>(output: &mut W, response: &Response) -> CliResult<()> {
    writeln!(output, "{}", response.to_json())?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_skips_blank_lines() {
        let mut input = Cursor::new("\n  \n{\"op\":\"sweep\"}\n\n");
        assert_eq!(
            read_request(&mut input).unwrap().as_deref(),
            Some("{\"op\":\"sweep\"}")
        );
        assert_eq!(read_request(&mut input).unwrap(), None);
    }

    #[test]
    fn test_write_response_is_one_line() {
        let mut out = Vec::new();
        write_response(&mut out, &Response::ok()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.starts_with("{\"status\":\"ok\""));
    }
}

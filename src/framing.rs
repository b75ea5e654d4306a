//! Line framing for incremental HTTP bodies
//!
//! Network chunks split lines (and UTF-8 sequences) arbitrarily. Bytes are
//! buffered until a `\n` arrives, so a line is only decoded once complete.

/// Accumulates raw bytes and hands out complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without the
    /// terminator (`\n` or `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush a trailing line that was never terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let mut rest = std::mem::take(&mut self.pending);
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Server-Sent Events decoder yielding the `data` payload of each event.
///
/// Consecutive `data:` lines of one event are joined with `\n`; a blank
/// line dispatches the event. Comments and other fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        for line in self.lines.push(chunk) {
            self.accept_line(&line, &mut events);
        }
        events
    }

    /// Dispatch whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        let mut events = Vec::new();
        if let Some(line) = self.lines.finish() {
            self.accept_line(&line, &mut events);
        }
        events.extend(self.data.take());
        events.into_iter().next()
    }

    fn accept_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            events.extend(self.data.take());
            return;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let fragment = rest.strip_prefix(' ').unwrap_or(rest);
            match &mut self.data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(fragment);
                }
                None => self.data = Some(fragment.to_string()),
            }
        }
    }
}

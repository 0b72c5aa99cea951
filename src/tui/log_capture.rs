//! Log capture for TUI mode
//!
//! A bounded line buffer that implements `MakeWriter`, so tracing output
//! lands in memory instead of on the alternate screen.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// Lines kept before the oldest are dropped.
const CAPACITY: usize = 500;

/// Thread-safe ring of captured log lines. Clones share the same ring.
#[derive(Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: String) {
        // A poisoned lock still holds usable lines; logging must not panic.
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() >= CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Take every buffered line, oldest first.
    pub fn drain(&self) -> Vec<String> {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.drain(..).collect()
    }
}

/// Collects bytes from one tracing event and pushes whole lines.
pub struct LineWriter {
    target: LogBuffer,
    pending: Vec<u8>,
}

impl LineWriter {
    fn push_complete_lines(&mut self) {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]).into_owned();
            self.target.push(text);
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.push_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.target.push(text);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = Write::flush(self);
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            target: self.clone(),
            pending: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_buffer() {
        let buf = LogBuffer::new();
        buf.push("one".to_string());
        buf.push("two".to_string());
        assert_eq!(buf.drain(), vec!["one", "two"]);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn test_oldest_lines_dropped_at_capacity() {
        let buf = LogBuffer::new();
        for i in 0..CAPACITY + 20 {
            buf.push(format!("line {}", i));
        }
        let lines = buf.drain();
        assert_eq!(lines.len(), CAPACITY);
        assert_eq!(lines[0], "line 20");
    }

    #[test]
    fn test_writer_splits_lines_and_flushes_tail_on_drop() {
        let buf = LogBuffer::new();
        {
            let mut writer = buf.make_writer();
            write!(writer, "first\nsecond\npart").unwrap();
            assert_eq!(buf.drain(), vec!["first", "second"]);
        }
        assert_eq!(buf.drain(), vec!["part"]);
    }
}

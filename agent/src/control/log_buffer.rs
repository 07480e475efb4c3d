//! Backing store for the `/log` control endpoint: a bounded ring buffer fed
//! by a second `tracing-subscriber` `fmt` layer writing through this as an
//! `io::Write` sink (see `crate::logging::init`).

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

const CAPACITY: usize = 500;

struct Inner {
    lines: VecDeque<String>,
    /// A line's `write()` calls may arrive split across several fragments
    /// (one `tracing` event's `Arguments` formatting routinely does this);
    /// buffered here until a `\n` completes it.
    partial: String,
}

#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<Inner>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        LogBuffer { inner: Arc::new(Mutex::new(Inner { lines: VecDeque::with_capacity(CAPACITY), partial: String::new() })) }
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().unwrap().lines.iter().cloned().collect()
    }

    fn push_line(guard: &mut Inner, line: &str) {
        if line.is_empty() {
            return;
        }
        if guard.lines.len() >= CAPACITY {
            guard.lines.pop_front();
        }
        guard.lines.push_back(line.to_string());
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock().unwrap();
        guard.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = guard.partial.find('\n') {
            let line = guard.partial[..pos].to_string();
            Self::push_line(&mut guard, &line);
            guard.partial.drain(..=pos);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn caps_at_capacity_dropping_oldest() {
        let mut buffer = LogBuffer::new();
        for i in 0..(CAPACITY + 10) {
            writeln!(buffer, "line {i}").unwrap();
        }
        let lines = buffer.lines();
        assert_eq!(lines.len(), CAPACITY);
        assert_eq!(lines.first().unwrap(), &format!("line {}", 10));
    }
}

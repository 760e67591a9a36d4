//! Output surfaces the renderer can draw on.

use console::Term;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// A line-oriented output device with in-place erase.
pub trait Screen: Send + 'static {
    /// Erase the last `count` printed lines, leaving the cursor at the start
    /// of the first erased line.
    fn erase_lines(&mut self, count: usize) -> io::Result<()>;

    fn print_line(&mut self, line: &str) -> io::Result<()>;

    /// Print without a trailing newline (streamed response text).
    fn print_inline(&mut self, text: &str) -> io::Result<()>;

    fn present(&mut self) -> io::Result<()>;
}

impl Screen for Term {
    fn erase_lines(&mut self, count: usize) -> io::Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.clear_last_lines(count)
    }

    fn print_line(&mut self, line: &str) -> io::Result<()> {
        self.write_line(line)
    }

    fn print_inline(&mut self, text: &str) -> io::Result<()> {
        self.write_str(text)
    }

    fn present(&mut self) -> io::Result<()> {
        self.flush()
    }
}

#[derive(Debug, Default)]
struct Recording {
    lines: Vec<String>,
    partial: String,
    presents: usize,
}

/// Shared in-memory screen. Clones draw on the same recording.
///
/// Erasing more lines than are on record is an error, so any line
/// accounting mistake in the renderer surfaces immediately.
#[derive(Debug, Clone, Default)]
pub struct MemoryScreen {
    inner: Arc<Mutex<Recording>>,
}

impl MemoryScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed lines currently on screen, styling stripped.
    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .lines
            .iter()
            .map(|line| console::strip_ansi_codes(line).into_owned())
            .collect()
    }

    /// Everything on screen including an unterminated last line.
    pub fn text(&self) -> String {
        let recording = self.inner.lock();
        let mut text = String::new();
        for line in &recording.lines {
            text.push_str(&console::strip_ansi_codes(line));
            text.push('\n');
        }
        text.push_str(&console::strip_ansi_codes(&recording.partial));
        text
    }

    pub fn presents(&self) -> usize {
        self.inner.lock().presents
    }
}

impl Screen for MemoryScreen {
    fn erase_lines(&mut self, count: usize) -> io::Result<()> {
        let mut recording = self.inner.lock();
        if count > recording.lines.len() {
            return Err(io::Error::other(format!(
                "erase of {count} lines with only {} on screen",
                recording.lines.len()
            )));
        }
        let keep = recording.lines.len() - count;
        recording.lines.truncate(keep);
        Ok(())
    }

    fn print_line(&mut self, line: &str) -> io::Result<()> {
        let mut recording = self.inner.lock();
        let mut full = std::mem::take(&mut recording.partial);
        full.push_str(line);
        recording.lines.push(full);
        Ok(())
    }

    fn print_inline(&mut self, text: &str) -> io::Result<()> {
        let mut recording = self.inner.lock();
        // Embedded newlines complete lines, like a terminal would.
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            recording.partial.push_str(first);
        }
        for part in parts {
            let done = std::mem::replace(&mut recording.partial, part.to_string());
            recording.lines.push(done);
        }
        Ok(())
    }

    fn present(&mut self) -> io::Result<()> {
        self.inner.lock().presents += 1;
        Ok(())
    }
}

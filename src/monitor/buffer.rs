// restorectl/src/monitor/buffer.rs
use crate::config::OutputConfig;

/// Append-only text accumulator that keeps only the newest `max_length` characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    content: String,
    chars: usize,
    truncated: bool,
    max_length: usize,
    truncate: bool,
}

impl OutputBuffer {
    pub fn new(config: OutputConfig) -> Self {
        OutputBuffer {
            content: String::new(),
            chars: 0,
            truncated: false,
            max_length: config.max_length,
            truncate: config.truncate,
        }
    }

    pub fn append(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.content.push_str(delta);
        self.chars += delta.chars().count();

        if self.truncate && self.chars > self.max_length {
            let excess = self.chars - self.max_length;
            let cut = self
                .content
                .char_indices()
                .nth(excess)
                .map_or(self.content.len(), |(index, _)| index);
            self.content.drain(..cut);
            self.chars = self.max_length;
            self.truncated = true;
        }
    }

    pub fn reset(&mut self) {
        self.content.clear();
        self.chars = 0;
        self.truncated = false;
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }

    /// Whether data has ever been dropped since the last reset.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

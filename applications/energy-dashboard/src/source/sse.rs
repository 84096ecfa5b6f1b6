//! Incremental decoder for the live stream body.
//!
//! Accepts Server-Sent Events framing (`data:` lines terminated by a blank
//! line) and bare newline-delimited JSON objects.

use crate::error::ApiError;

/// Upper bound on bytes held for one unfinished line or event
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    data_len: usize,
    limit: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            data: Vec::new(),
            data_len: 0,
            limit,
        }
    }

    /// Feed a body chunk; returns every message completed by it.
    ///
    /// Fails once a line or an event grows past the limit without ending.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ApiError> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if let Some(message) = self.process_line(line) {
                messages.push(message);
            }
            if self.data_len > self.limit {
                return Err(self.overflow());
            }
        }

        if self.buffer.len() > self.limit {
            return Err(self.overflow());
        }
        Ok(messages)
    }

    fn overflow(&mut self) -> ApiError {
        self.buffer.clear();
        self.data.clear();
        self.data_len = 0;
        ApiError::Stream(format!("live feed message exceeds {} bytes", self.limit))
    }

    fn push_data(&mut self, value: &str) {
        self.data_len += value.len() + 1;
        self.data.push(value.to_string());
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let message = self.data.join("\n");
            self.data.clear();
            self.data_len = 0;
            return Some(message);
        }

        if line.starts_with(':') {
            return None;
        }

        if let Some(value) = line.strip_prefix("data:") {
            self.push_data(value.strip_prefix(' ').unwrap_or(value));
            return None;
        }

        if line == "data" {
            self.push_data("");
            return None;
        }

        if self.data.is_empty() && line.starts_with('{') {
            return Some(line.to_string());
        }

        // event:, id:, retry: and unknown fields
        None
    }
}

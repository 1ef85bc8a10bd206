//! Newline-delimited JSON consumer over any async reader.
//!
//! Used for stdin and file input by the worker binary. Each non-blank line
//! is one message; its id is the 1-based line number.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::Mutex;

use crate::consumer::{QueueConsumer, QueueMessage};
use crate::error::QueueError;

struct LineState<R> {
    lines: Lines<R>,
    line_no: u64,
    exhausted: bool,
}

/// Reads one message per line.
pub struct LineConsumer<R> {
    state: Mutex<LineState<R>>,
}

impl<R: AsyncBufRead + Unpin + Send> LineConsumer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            state: Mutex::new(LineState {
                lines: reader.lines(),
                line_no: 0,
                exhausted: false,
            }),
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> LineState<R> {
    /// Next non-blank line, or `None` at end of input.
    async fn next_message(&mut self) -> Result<Option<QueueMessage>, QueueError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(QueueMessage::new(format!("line-{}", self.line_no), line)));
        }
        self.exhausted = true;
        Ok(None)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> QueueConsumer for LineConsumer<R> {
    async fn poll_batch(&self, max_messages: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut state = self.state.lock().await;
        if state.exhausted {
            return Err(QueueError::Closed);
        }

        let mut batch = match state.next_message().await? {
            Some(msg) => vec![msg],
            None => return Err(QueueError::Closed),
        };

        // Take whatever else is already buffered without waiting for more input.
        while batch.len() < max_messages && !state.exhausted {
            match tokio::time::timeout(Duration::ZERO, state.next_message()).await {
                Ok(Ok(Some(msg))) => batch.push(msg),
                Ok(Ok(None)) | Err(_) => break,
                Ok(Err(e)) => return Err(e),
            }
        }

        Ok(batch)
    }
}

//! Micro-batch accumulator for inbound items.
//!
//! Items are buffered until either the size threshold or the time window
//! is reached, whichever comes first. The stream matcher snapshots the
//! collection cache once per flushed batch.

use std::time::{Duration, Instant};

/// Accumulates items into size- and time-bounded batches.
pub struct MicroBatcher<T> {
    buffer: Vec<T>,
    max_size: usize,
    max_wait: Duration,
    batch_started: Option<Instant>,
}

impl<T> MicroBatcher<T> {
    /// - `max_size`: flush once this many items are buffered (minimum 1).
    /// - `max_wait`: flush once this long has passed since the first item
    ///   of the current batch arrived.
    pub fn new(max_size: usize, max_wait: Duration) -> Self {
        let max_size = max_size.max(1);
        Self {
            buffer: Vec::with_capacity(max_size),
            max_size,
            max_wait,
            batch_started: None,
        }
    }

    /// Add items to the current batch; the timer starts on the first item.
    pub fn push(&mut self, items: impl IntoIterator<Item = T>) {
        let before = self.buffer.len();
        self.buffer.extend(items);
        if self.batch_started.is_none() && self.buffer.len() > before {
            self.batch_started = Some(Instant::now());
        }
    }

    pub fn should_flush(&self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        self.buffer.len() >= self.max_size || self.remaining_wait() == Some(Duration::ZERO)
    }

    /// Time left before the current batch is due, or `None` when empty.
    pub fn remaining_wait(&self) -> Option<Duration> {
        self.batch_started
            .map(|started| self.max_wait.saturating_sub(started.elapsed()))
    }

    /// Take every buffered item and reset the timer.
    pub fn flush(&mut self) -> Vec<T> {
        self.batch_started = None;
        std::mem::take(&mut self.buffer)
    }

    /// Flush only if a threshold is met.
    pub fn try_flush(&mut self) -> Option<Vec<T>> {
        if self.should_flush() {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Room left before the size threshold.
    pub fn capacity_left(&self) -> usize {
        self.max_size.saturating_sub(self.buffer.len())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("entity-{i}")).collect()
    }

    #[test]
    fn test_flush_on_size() {
        let mut batcher = MicroBatcher::new(3, Duration::from_secs(60));
        batcher.push(ids(3));
        assert!(batcher.should_flush());
        assert_eq!(batcher.capacity_left(), 0);
    }

    #[test]
    fn test_waits_below_size() {
        let mut batcher = MicroBatcher::new(5, Duration::from_secs(60));
        batcher.push(ids(2));
        assert!(!batcher.should_flush());
        assert!(batcher.try_flush().is_none());
        assert_eq!(batcher.capacity_left(), 3);
    }

    #[test]
    fn test_flush_on_timeout() {
        let mut batcher = MicroBatcher::new(100, Duration::from_millis(10));
        batcher.push(ids(1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(batcher.should_flush());
        assert_eq!(batcher.remaining_wait(), Some(Duration::ZERO));
    }

    #[test]
    fn test_flush_resets_state() {
        let mut batcher = MicroBatcher::new(2, Duration::from_secs(60));
        batcher.push(ids(3));
        let flushed = batcher.try_flush().unwrap();
        assert_eq!(flushed.len(), 3);
        assert!(batcher.is_empty());
        assert!(batcher.remaining_wait().is_none());
    }

    #[test]
    fn test_empty_push_does_not_start_timer() {
        let mut batcher: MicroBatcher<String> = MicroBatcher::new(5, Duration::from_millis(1));
        batcher.push(Vec::new());
        std::thread::sleep(Duration::from_millis(5));
        assert!(!batcher.should_flush());
    }

    #[test]
    fn test_pushes_accumulate_in_order() {
        let mut batcher = MicroBatcher::new(10, Duration::from_secs(60));
        batcher.push(ids(2));
        batcher.push(["late".to_string()]);
        assert_eq!(batcher.len(), 3);
        assert_eq!(batcher.flush(), vec!["entity-0", "entity-1", "late"]);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let mut batcher = MicroBatcher::new(0, Duration::from_secs(60));
        batcher.push([1u8]);
        assert!(batcher.should_flush());
    }
}

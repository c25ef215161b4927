use std::collections::VecDeque;

use crate::models::CanonicalEvent;

/// Bounded, append-only feed. The oldest entry is evicted when full.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<CanonicalEvent>,
    capacity: usize,
    appended: u64,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            appended: 0,
        }
    }

    pub fn push(&mut self, event: CanonicalEvent) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
        self.appended += 1;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total events ever appended, including evicted and cleared ones
    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalEvent> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<CanonicalEvent> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: i64) -> CanonicalEvent {
        CanonicalEvent::new(n, "message", n.to_string())
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let max_logs = 5;
        let mut buffer = LogBuffer::new(max_logs);
        for n in 0..(max_logs as i64 + 3) {
            buffer.push(numbered(n));
        }

        assert_eq!(buffer.len(), max_logs);
        let kept: Vec<i64> = buffer.iter().map(|e| e.timestamp).collect();
        assert_eq!(kept, vec![3, 4, 5, 6, 7]);
        assert_eq!(buffer.appended(), 8);
    }

    #[test]
    fn test_clear() {
        let mut buffer = LogBuffer::new(3);
        buffer.push(numbered(1));
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.appended(), 1);
        buffer.push(numbered(2));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        let mut buffer = LogBuffer::new(0);
        buffer.push(numbered(1));
        buffer.push(numbered(2));
        assert_eq!(buffer.to_vec(), vec![numbered(2)]);
    }
}

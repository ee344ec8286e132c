use std::collections::VecDeque;

use serde::Serialize;

/// Recently recognized frames, most recent first. Pushing past capacity
/// evicts the oldest entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: VecDeque<String>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push_front(&mut self, image_url: String) {
        self.entries.push_front(image_url);
        self.entries.truncate(self.capacity);
    }

    pub fn front(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent_first_and_evicts_oldest() {
        let mut history = HistoryBuffer::new(5);
        for n in 1..=7 {
            history.push_front(format!("f{n}.jpg"));
            assert!(history.len() <= 5);
        }
        assert_eq!(
            history.to_vec(),
            vec!["f7.jpg", "f6.jpg", "f5.jpg", "f4.jpg", "f3.jpg"]
        );
        assert_eq!(history.front(), Some("f7.jpg"));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut history = HistoryBuffer::new(0);
        history.push_front("a".into());
        history.push_front("b".into());
        assert_eq!(history.to_vec(), vec!["b"]);
    }
}

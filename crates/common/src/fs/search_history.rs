use std::collections::VecDeque;

pub const SEARCH_HISTORY_CAPACITY: usize = 10;

/// Recency list of distinct search patterns, oldest first.
///
/// Not synchronized; owners wrap it in a lock when shared.
#[derive(Debug, Clone)]
pub struct SearchHistory {
    capacity: usize,
    patterns: VecDeque<String>,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::with_capacity(SEARCH_HISTORY_CAPACITY)
    }
}

impl SearchHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            patterns: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Record `pattern` unless it is already present. Evicts the oldest
    /// pattern once the capacity is exceeded.
    pub fn append(&mut self, pattern: &str) {
        if self.patterns.iter().any(|p| p == pattern) {
            return;
        }
        self.patterns.push_back(pattern.to_string());
        while self.patterns.len() > self.capacity {
            self.patterns.pop_front();
        }
    }

    pub fn all(&self) -> Vec<String> {
        self.patterns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_not_reappended() {
        let mut history = SearchHistory::default();
        for _ in 0..5 {
            history.append("*.py");
        }
        assert_eq!(history.all(), vec!["*.py".to_string()]);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut history = SearchHistory::default();
        for i in 0..11 {
            history.append(&format!("pattern-{i}"));
        }
        let all = history.all();
        assert_eq!(all.len(), SEARCH_HISTORY_CAPACITY);
        assert_eq!(all.first().map(String::as_str), Some("pattern-1"));
        assert_eq!(all.last().map(String::as_str), Some("pattern-10"));
    }

    #[test]
    fn test_duplicate_keeps_original_position() {
        let mut history = SearchHistory::default();
        history.append("a");
        history.append("b");
        history.append("a");
        assert_eq!(history.all(), vec!["a".to_string(), "b".to_string()]);
    }
}

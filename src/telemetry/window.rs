//! Fixed-capacity FIFO buffer.

use std::collections::VecDeque;

/// Keeps the most recent `capacity` values; pushing at capacity evicts the
/// oldest.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// Creates an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `value`, returning the evicted oldest value if the window was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    /// Values oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RollingWindow<T> {
    /// Copies the values out, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_capacity() {
        let mut window = RollingWindow::new(3);
        for value in 0..10 {
            window.push(value);
            assert!(window.len() <= 3);
        }
        assert_eq!(window.to_vec(), vec![7, 8, 9]);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut window = RollingWindow::new(60);
        for value in 0..60 {
            assert_eq!(window.push(value), None);
        }
        assert_eq!(window.push(60), Some(0));
        assert_eq!(window.len(), 60);
        assert_eq!(window.oldest(), Some(&1));
        assert_eq!(window.latest(), Some(&60));
        assert!(!window.iter().any(|v| *v == 0));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut window = RollingWindow::new(0);
        window.push("a");
        window.push("b");
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.to_vec(), vec!["b"]);
    }

    #[test]
    fn clear_empties() {
        let mut window = RollingWindow::new(2);
        window.push(1.5_f32);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.latest(), None);
    }
}

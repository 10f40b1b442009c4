use std::collections::VecDeque;

/// Bounded in-memory buffer that keeps the most recent items
///
/// Once the buffer grows past `capacity` it is trimmed in one step down
/// to the newest `trim_to` items, so trimming does not happen on every push.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    trim_to: usize,
}

impl<T: Clone> RollingBuffer<T> {
    /// Create a new buffer
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of items held before trimming
    /// * `trim_to` - Number of newest items kept after a trim (clamped to `capacity`)
    pub fn new(capacity: usize, trim_to: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            trim_to: trim_to.min(capacity),
        }
    }

    /// Append an item, trimming the oldest items when over capacity
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);

        if self.items.len() > self.capacity {
            let excess = self.items.len() - self.trim_to;
            self.items.drain(..excess);
        }
    }

    /// All items, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// The `n` most recent items, oldest first
    pub fn recent(&self, n: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).cloned().collect()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

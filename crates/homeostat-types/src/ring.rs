// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Fixed-Capacity Ring Buffer
// ─────────────────────────────────────────────────────────────────────
//! Sliding window with index wraparound.
//!
//! Storage is allocated once at construction; `push` is O(1) and evicts
//! the oldest element once the window is full. Iteration always runs
//! oldest → newest.

use serde::{Serialize, Serializer};

use crate::error::{HomeostatError, HomeostatResult};

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    // Index of the oldest element once the buffer has wrapped.
    head: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> HomeostatResult<Self> {
        if capacity == 0 {
            return Err(HomeostatError::InvalidParameter(
                "ring buffer capacity must be >= 1".to_string(),
            ));
        }
        Ok(Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        })
    }

    /// Append a value, returning the evicted oldest value when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
            return None;
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], value);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    /// Element `i` positions after the oldest one.
    pub fn get(&self, i: usize) -> Option<&T> {
        if i >= self.slots.len() {
            return None;
        }
        Some(&self.slots[(self.head + i) % self.slots.len()])
    }

    /// Most recently pushed element.
    pub fn last(&self) -> Option<&T> {
        match self.slots.len() {
            0 => None,
            n => self.get(n - 1),
        }
    }

    /// Oldest → newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// The `n` most recent elements, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        let skip = self.slots.len().saturating_sub(n);
        self.iter().skip(skip)
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: Serialize> Serialize for RingBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

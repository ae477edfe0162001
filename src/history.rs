//! Fixed-capacity ring buffer of past writes

use crate::{constants::HISTORY_CAPACITY, error::FeedError, types::HistoryEntry};

/// Last `HISTORY_CAPACITY` writes of an instance
///
/// Slots are addressed by absolute index `0..HISTORY_CAPACITY`. Once full,
/// each write overwrites the oldest slot. Unwritten slots hold
/// `HistoryEntry::default()`.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    slots: [HistoryEntry; HISTORY_CAPACITY],
    cursor: usize,
    count: usize,
    total_writes: u64,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| HistoryEntry::default()),
            cursor: 0,
            count: 0,
            total_writes: 0,
        }
    }

    /// Stores `entry` at the cursor and advances it
    pub fn push(&mut self, entry: HistoryEntry) {
        self.slots[self.cursor] = entry;
        self.cursor = (self.cursor + 1) % HISTORY_CAPACITY;
        if self.count < HISTORY_CAPACITY {
            self.count += 1;
        }
        self.total_writes += 1;
    }

    /// Returns the slot at `index`
    pub fn get(&self, index: usize) -> Result<&HistoryEntry, FeedError> {
        self.slots
            .get(index)
            .ok_or(FeedError::HistoryIndexOutOfRange {
                index,
                capacity: HISTORY_CAPACITY,
            })
    }

    /// Most recent write, if any
    pub fn latest(&self) -> Option<&HistoryEntry> {
        if self.count == 0 {
            return None;
        }
        Some(&self.slots[(self.cursor + HISTORY_CAPACITY - 1) % HISTORY_CAPACITY])
    }

    /// Number of populated slots, `min(total_writes, HISTORY_CAPACITY)`
    pub fn count(&self) -> usize {
        self.count
    }

    /// Writes since creation, uncapped
    pub fn total_writes(&self) -> u64 {
        self.total_writes
    }

    /// Populated entries, oldest first
    pub fn entries(&self) -> Vec<&HistoryEntry> {
        let start = if self.count < HISTORY_CAPACITY {
            0
        } else {
            self.cursor
        };
        (0..self.count)
            .map(|offset| &self.slots[(start + offset) % HISTORY_CAPACITY])
            .collect()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u64) -> HistoryEntry {
        HistoryEntry {
            data: n.to_le_bytes().to_vec(),
            timestamp: n as i64,
        }
    }

    #[test]
    fn test_count_caps_at_capacity() {
        let mut buffer = HistoryBuffer::new();
        assert_eq!(buffer.count(), 0);
        assert!(buffer.latest().is_none());

        for n in 1..=250u64 {
            buffer.push(entry(n));
            assert_eq!(buffer.count(), (n as usize).min(HISTORY_CAPACITY));
            assert_eq!(buffer.total_writes(), n);
            // Latest write lives at (total_writes - 1) mod capacity
            let slot = ((n - 1) % HISTORY_CAPACITY as u64) as usize;
            assert_eq!(buffer.get(slot).unwrap(), &entry(n));
            assert_eq!(buffer.latest(), Some(&entry(n)));
        }
    }

    #[test]
    fn test_wraparound_overwrites_oldest() {
        let mut buffer = HistoryBuffer::new();
        for n in 0..(HISTORY_CAPACITY as u64 + 1) {
            buffer.push(entry(n));
        }

        assert_eq!(buffer.get(0).unwrap(), &entry(HISTORY_CAPACITY as u64));
        assert_eq!(buffer.get(1).unwrap(), &entry(1));

        let entries = buffer.entries();
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries[0], &entry(1));
        assert_eq!(entries[HISTORY_CAPACITY - 1], &entry(HISTORY_CAPACITY as u64));
    }

    #[test]
    fn test_unwritten_slots_are_default() {
        let mut buffer = HistoryBuffer::new();
        buffer.push(entry(1));
        assert_eq!(buffer.get(1).unwrap(), &HistoryEntry::default());
        assert_eq!(buffer.get(HISTORY_CAPACITY - 1).unwrap(), &HistoryEntry::default());
    }

    #[test]
    fn test_index_out_of_range() {
        let buffer = HistoryBuffer::new();
        assert_eq!(
            buffer.get(HISTORY_CAPACITY),
            Err(FeedError::HistoryIndexOutOfRange {
                index: HISTORY_CAPACITY,
                capacity: HISTORY_CAPACITY,
            })
        );
    }
}

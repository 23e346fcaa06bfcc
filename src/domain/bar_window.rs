//! Fixed-capacity rolling window of bars.
//!
//! Bars are kept in chronological order. Pushing past capacity evicts the
//! oldest bar. Stored bars are never reordered or mutated.
//!
//! Storage is a `Vec` read from a moving start offset. Evicted bars are
//! compacted away in one batch once they fill a whole capacity, so a push is
//! amortised O(1) and the live bars are always one contiguous slice.

use crate::domain::bar::Bar;
use crate::domain::error::TraderError;

#[derive(Debug, Clone)]
pub struct BarWindow {
    capacity: usize,
    bars: Vec<Bar>,
    /// Index of the oldest live bar in `bars`.
    start: usize,
}

impl BarWindow {
    /// Capacity is clamped to at least one bar.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            bars: Vec::with_capacity(2 * capacity),
            start: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bars.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<&Bar> {
        self.snapshot().last()
    }

    /// Append a bar. The timestamp must be strictly after the last stored bar.
    ///
    /// Returns the evicted bar, if any.
    pub fn push(&mut self, bar: Bar) -> Result<Option<Bar>, TraderError> {
        if !bar.is_finite() {
            return Err(TraderError::InvalidBar {
                timestamp: bar.timestamp,
            });
        }
        if let Some(last) = self.last() {
            if bar.timestamp <= last.timestamp {
                return Err(TraderError::OutOfOrderBar {
                    timestamp: bar.timestamp,
                    last: last.timestamp,
                });
            }
        }

        self.bars.push(bar);
        if self.len() <= self.capacity {
            return Ok(None);
        }
        let evicted = self.bars[self.start];
        self.start += 1;
        if self.start >= self.capacity {
            self.bars.drain(..self.start);
            self.start = 0;
        }
        Ok(Some(evicted))
    }

    /// Borrow the stored bars, oldest first.
    pub fn snapshot(&self) -> &[Bar] {
        &self.bars[self.start..]
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.start = 0;
    }
}

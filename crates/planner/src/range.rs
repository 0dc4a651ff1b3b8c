//! Half-open batch ranges.

use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

/// Entity indices `[start, end)` submitted as one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchRange {
    /// First index, inclusive.
    pub start: usize,
    /// Last index, exclusive.
    pub end: usize,
}

impl BatchRange {
    /// Creates a range. `start` must not exceed `end`.
    pub const fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Number of entities in the range.
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the range holds no entities.
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The range as slice indices.
    pub const fn indices(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

//! Lazy batch planning.

use std::iter::FusedIterator;

use crate::{BatchRange, PlanError};

/// Plans `[resume_cursor, entity_count)` into ranges of `batch_size`.
pub fn plan(entity_count: usize, batch_size: usize, resume_cursor: usize) -> Result<Batches, PlanError> {
    BatchPlanner::new(batch_size).plan(entity_count, resume_cursor)
}

/// Batch planner for a single migration stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlanner {
    batch_size: usize,
    end: Option<usize>,
}

impl BatchPlanner {
    /// Creates a planner with a fixed batch size.
    pub const fn new(batch_size: usize) -> Self {
        Self { batch_size, end: None }
    }

    /// Stops planning at `end` even if the collection is longer.
    pub const fn with_end(mut self, end: Option<usize>) -> Self {
        self.end = end;
        self
    }

    /// Returns the configured batch size.
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Plans the ranges still to submit, starting exactly at `resume_cursor`.
    pub fn plan(&self, entity_count: usize, resume_cursor: usize) -> Result<Batches, PlanError> {
        if self.batch_size == 0 {
            return Err(PlanError::ZeroBatchSize);
        }
        let count = self.end.map_or(entity_count, |end| end.min(entity_count));
        if resume_cursor > count {
            return Err(PlanError::CursorPastEnd { cursor: resume_cursor, count });
        }
        Ok(Batches { next: resume_cursor, end: count, batch_size: self.batch_size })
    }
}

/// Iterator over planned batch ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batches {
    next: usize,
    end: usize,
    batch_size: usize,
}

impl Batches {
    /// Number of batches not yet yielded.
    pub const fn remaining(&self) -> usize {
        (self.end - self.next).div_ceil(self.batch_size)
    }

    /// Entities covered by the batches not yet yielded.
    pub const fn remaining_entities(&self) -> usize {
        self.end - self.next
    }
}

impl Iterator for Batches {
    type Item = BatchRange;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.batch_size).min(self.end);
        self.next = end;
        Some(BatchRange::new(start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Batches {}

impl FusedIterator for Batches {}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn resume_mid_collection() {
        let batches: Vec<_> = plan(155, 2, 100).unwrap().collect();
        assert_eq!(batches.len(), 28);
        assert_eq!(batches.first(), Some(&BatchRange::new(100, 102)));
        assert_eq!(batches.last(), Some(&BatchRange::new(154, 155)));
        assert_eq!(batches.last().unwrap().len(), 1);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(6)]
    #[case(7)]
    #[case(8)]
    #[case(70)]
    fn ranges_tile_the_collection(#[case] count: usize) {
        let batch_size = 7;
        let batches = plan(count, batch_size, 0).unwrap();
        assert_eq!(batches.len(), count.div_ceil(batch_size));

        let mut cursor = 0;
        for range in batches {
            assert_eq!(range.start, cursor);
            assert!(range.len() >= 1 && range.len() <= batch_size);
            cursor = range.end;
        }
        assert_eq!(cursor, count);
    }

    #[test]
    fn cursor_at_end_yields_nothing() {
        let mut batches = plan(10, 3, 10).unwrap();
        assert_eq!(batches.remaining(), 0);
        assert_eq!(batches.next(), None);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert_eq!(plan(10, 0, 0), Err(PlanError::ZeroBatchSize));
    }

    #[test]
    fn cursor_past_end_is_rejected() {
        assert_eq!(plan(10, 3, 11), Err(PlanError::CursorPastEnd { cursor: 11, count: 10 }));
    }

    #[test]
    fn end_bound_clips_the_collection() {
        let planner = BatchPlanner::new(4).with_end(Some(10));
        let batches: Vec<_> = planner.plan(100, 2).unwrap().collect();
        assert_eq!(
            batches,
            vec![BatchRange::new(2, 6), BatchRange::new(6, 10)]
        );
        assert_eq!(
            planner.plan(100, 11),
            Err(PlanError::CursorPastEnd { cursor: 11, count: 10 })
        );
        // An end bound past the collection has no effect.
        let batches = BatchPlanner::new(4).with_end(Some(1_000)).plan(5, 0).unwrap();
        assert_eq!(batches.remaining_entities(), 5);
    }

    #[test]
    fn remaining_counts_down() {
        let mut batches = plan(10, 4, 0).unwrap();
        assert_eq!(batches.len(), 3);
        batches.next();
        assert_eq!(batches.len(), 2);
        batches.next();
        batches.next();
        assert_eq!(batches.len(), 0);
        assert_eq!(batches.next(), None);
    }
}

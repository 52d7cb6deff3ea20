//! Reception accounting for multi-block payloads.
//!
//! A fixed-capacity bitmap marks which blocks of the current payload
//! have arrived. Duplicate arrivals are absorbed without disturbing the
//! counters, completion is O(1) via a maintained count, and gap lookup
//! scans circularly so low-index blocks are not perpetually re-requested
//! ahead of high-index ones.

use crate::protocol::{Error, MAX_BLOCKS, Result};

const WORDS: usize = MAX_BLOCKS / 64;

/// Fixed-capacity set of received block indices.
#[derive(Debug, Clone)]
pub struct ReceptionBitmap {
    words: [u64; WORDS],
    received: u16,
    total: u16,
}

impl ReceptionBitmap {
    /// Create an empty bitmap expecting `total` blocks.
    ///
    /// `total` must not exceed [`MAX_BLOCKS`]; block geometry is
    /// validated before it reaches this layer.
    #[must_use]
    pub fn new(total: u16) -> Self {
        debug_assert!(usize::from(total) <= MAX_BLOCKS);
        Self {
            words: [0; WORDS],
            received: 0,
            total,
        }
    }

    /// Clear all reception state and start expecting `total` blocks.
    ///
    /// Called whenever the payload identifier changes: blocks only
    /// belong to one logical payload, so prior progress is discarded.
    pub fn reset(&mut self, total: u16) {
        debug_assert!(usize::from(total) <= MAX_BLOCKS);
        self.words = [0; WORDS];
        self.received = 0;
        self.total = total;
    }

    /// Mark `index` as received, returning whether it was already set.
    ///
    /// Duplicate delivery from the unreliable link must not corrupt the
    /// count, so a second mark of the same index mutates nothing.
    pub fn mark_received(&mut self, index: u16) -> Result<bool> {
        if index >= self.total {
            return Err(Error::OutOfRange {
                index,
                total: self.total,
            });
        }
        let word = usize::from(index) / 64;
        let bit = 1u64 << (usize::from(index) % 64);
        if self.words[word] & bit != 0 {
            return Ok(true);
        }
        self.words[word] |= bit;
        self.received += 1;
        Ok(false)
    }

    /// Whether every block in `[0, total)` has been marked.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.received == self.total
    }

    /// Blocks still missing.
    #[must_use]
    pub const fn remaining(&self) -> u16 {
        self.total - self.received
    }

    /// Blocks received so far.
    #[must_use]
    pub const fn received(&self) -> u16 {
        self.received
    }

    /// Declared total block count.
    #[must_use]
    pub const fn total(&self) -> u16 {
        self.total
    }

    /// First unset index scanning circularly from `after + 1`.
    ///
    /// Returns `None` when complete (or empty). The circular start keeps
    /// retry requests fair across the whole index range.
    #[must_use]
    pub fn next_missing(&self, after: u16) -> Option<u16> {
        if self.total == 0 || self.is_complete() {
            return None;
        }
        let total = u32::from(self.total);
        let after = u32::from(after) % total;
        for step in 1..=total {
            let index = ((after + step) % total) as u16;
            let word = usize::from(index) / 64;
            let bit = 1u64 << (usize::from(index) % 64);
            if self.words[word] & bit == 0 {
                return Some(index);
            }
        }
        None
    }

    /// Whether `index` has been marked received.
    #[must_use]
    pub fn contains(&self, index: u16) -> bool {
        if index >= self.total {
            return false;
        }
        self.words[usize::from(index) / 64] & (1u64 << (usize::from(index) % 64)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn duplicate_marks_count_once() {
        let mut bitmap = ReceptionBitmap::new(8);
        assert!(!bitmap.mark_received(3).unwrap());
        assert!(bitmap.mark_received(3).unwrap());
        assert_eq!(bitmap.received(), 1);
        assert_eq!(bitmap.remaining(), 7);
    }

    #[test]
    fn out_of_range_mark_fails_without_mutation() {
        let mut bitmap = ReceptionBitmap::new(4);
        bitmap.mark_received(0).unwrap();
        let err = bitmap.mark_received(4).unwrap_err();
        assert_eq!(err, Error::OutOfRange { index: 4, total: 4 });
        assert_eq!(bitmap.received(), 1);
        assert!(!bitmap.contains(3));
    }

    #[test]
    fn circular_scan_wraps_past_received_blocks() {
        let mut bitmap = ReceptionBitmap::new(5);
        for index in [0, 2, 4] {
            bitmap.mark_received(index).unwrap();
        }
        // Scanning from the end wraps to 1, skipping the already-set 0.
        assert_eq!(bitmap.next_missing(4), Some(1));
        assert_eq!(bitmap.next_missing(1), Some(3));
    }

    #[test]
    fn completion_survives_duplicate_after_finish() {
        let mut bitmap = ReceptionBitmap::new(3);
        for index in [2, 0, 1] {
            bitmap.mark_received(index).unwrap();
        }
        assert!(bitmap.is_complete());
        assert!(bitmap.mark_received(0).unwrap());
        assert!(bitmap.is_complete());
        assert_eq!(bitmap.received(), 3);
        assert_eq!(bitmap.next_missing(0), None);
    }

    #[test]
    fn reset_discards_progress() {
        let mut bitmap = ReceptionBitmap::new(4);
        bitmap.mark_received(1).unwrap();
        bitmap.reset(9);
        assert_eq!(bitmap.received(), 0);
        assert_eq!(bitmap.total(), 9);
        assert!(!bitmap.contains(1));
    }

    #[test]
    fn empty_bitmap_is_trivially_complete() {
        let bitmap = ReceptionBitmap::new(0);
        assert!(bitmap.is_complete());
        assert_eq!(bitmap.next_missing(0), None);
    }

    #[test]
    fn spans_multiple_words() {
        let mut bitmap = ReceptionBitmap::new(200);
        for index in 0..200 {
            if index != 130 {
                bitmap.mark_received(index).unwrap();
            }
        }
        assert!(!bitmap.is_complete());
        assert_eq!(bitmap.next_missing(64), Some(130));
        bitmap.mark_received(130).unwrap();
        assert!(bitmap.is_complete());
    }

    proptest! {
        #[test]
        fn marking_is_idempotent(indices in proptest::collection::vec(0u16..32, 1..64)) {
            let mut bitmap = ReceptionBitmap::new(32);
            let mut seen = std::collections::HashSet::new();
            for index in indices {
                let already = bitmap.mark_received(index).unwrap();
                prop_assert_eq!(already, !seen.insert(index));
            }
            prop_assert_eq!(usize::from(bitmap.received()), seen.len());
        }

        #[test]
        fn complete_iff_all_indices_marked(order in Just(()).prop_flat_map(|()| {
            (1u16..48).prop_flat_map(|total| {
                proptest::collection::vec(0u16..total, 0..96).prop_map(move |v| (total, v))
            })
        })) {
            let (total, marks) = order;
            let mut bitmap = ReceptionBitmap::new(total);
            for index in &marks {
                bitmap.mark_received(*index).unwrap();
            }
            let distinct: std::collections::HashSet<_> = marks.into_iter().collect();
            prop_assert_eq!(bitmap.is_complete(), distinct.len() == usize::from(total));
            prop_assert_eq!(bitmap.remaining(), total - distinct.len() as u16);
        }
    }
}

//! Order key allocation.
//!
//! Order keys are plain `f64` values spaced by a fixed gap. A reorder
//! renumbers the affected column from scratch, so keys stay evenly spaced
//! in practice; [`OrderKeys::order_between`] covers the one place a key is
//! squeezed between two neighbours instead.

use lotion_proto::board::ORDER_GAP;

/// Allocates order keys with a fixed spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderKeys {
    gap: f64,
}

impl Default for OrderKeys {
    fn default() -> Self {
        Self { gap: ORDER_GAP }
    }
}

impl OrderKeys {
    /// Creates an allocator with the given spacing.
    ///
    /// Non-finite or non-positive gaps fall back to the default.
    #[must_use]
    pub fn new(gap: f64) -> Self {
        if gap.is_finite() && gap > 0.0 {
            Self { gap }
        } else {
            tracing::warn!(gap, "invalid order gap, using default");
            Self::default()
        }
    }

    /// Spacing between consecutive keys.
    #[must_use]
    pub const fn gap(&self) -> f64 {
        self.gap
    }

    /// Key for a new item appended after `existing`.
    ///
    /// Returns `max(existing) + gap`, or `gap` when `existing` is empty.
    #[must_use]
    pub fn next_order_for_append(&self, existing: impl IntoIterator<Item = f64>) -> f64 {
        existing.into_iter().reduce(f64::max).unwrap_or(0.0) + self.gap
    }

    /// Keys `gap, 2*gap, ..., count*gap`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sequential_orders(&self, count: usize) -> Vec<f64> {
        (1..=count).map(|i| i as f64 * self.gap).collect()
    }

    /// Key strictly between `before` and `after`.
    ///
    /// Either side may be open. Returns `None` once the two neighbours are
    /// so close that no distinct `f64` lies between them; the caller must
    /// renumber the column with [`sequential_orders`](Self::sequential_orders).
    #[must_use]
    pub fn order_between(&self, before: Option<f64>, after: Option<f64>) -> Option<f64> {
        let key = match (before, after) {
            (None, None) => self.gap,
            (Some(lo), None) => lo + self.gap,
            (None, Some(hi)) => hi - self.gap,
            (Some(lo), Some(hi)) => lo + (hi - lo) / 2.0,
        };
        let above = before.is_none_or(|lo| key > lo);
        let below = after.is_none_or(|hi| key < hi);
        (key.is_finite() && above && below).then_some(key)
    }
}

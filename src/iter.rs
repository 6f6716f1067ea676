//! The pass iterator of the bottom-up merge loop.
//!
//! The merge levels only operate on powers of two, but the input length
//! rarely is one. Instead of padding, the iterator scales the power-of-two
//! level back onto the real length with a fractional accumulator: each pass
//! tiles `[0, size)` exactly with runs whose lengths differ by at most one.

use crate::ops::Range;

pub(crate) struct PassIterator {
    size: usize,
    denominator: usize,
    numerator: usize,
    decimal: usize,
    numerator_step: usize,
    decimal_step: usize,
}

impl PassIterator {
    /// `min_level` is the smallest run length of the finest pass. The runs
    /// emitted at that level are `min_level..=2 * min_level` long.
    pub(crate) fn new(size: usize, min_level: usize) -> Self {
        let power_of_two = floor_power_of_two(size);
        let denominator = power_of_two / min_level;

        let mut iter = PassIterator {
            size,
            denominator,
            numerator: 0,
            decimal: 0,
            numerator_step: size % denominator,
            decimal_step: size / denominator,
        };
        iter.begin();
        iter
    }

    /// Rewind to the start of the array for another pass over this level.
    pub(crate) fn begin(&mut self) {
        self.numerator = 0;
        self.decimal = 0;
    }

    pub(crate) fn next_range(&mut self) -> Range {
        let start = self.decimal;

        self.decimal += self.decimal_step;
        self.numerator += self.numerator_step;
        if self.numerator >= self.denominator {
            self.numerator -= self.denominator;
            self.decimal += 1;
        }

        Range::new(start, self.decimal)
    }

    pub(crate) fn finished(&self) -> bool {
        self.decimal >= self.size
    }

    /// Double the run length. Returns false once a single run would cover
    /// the whole array, i.e. the sort is complete.
    pub(crate) fn next_level(&mut self) -> bool {
        self.decimal_step += self.decimal_step;
        self.numerator_step += self.numerator_step;
        if self.numerator_step >= self.denominator {
            self.numerator_step -= self.denominator;
            self.decimal_step += 1;
        }

        self.decimal_step < self.size
    }

    /// The current nominal run length.
    pub(crate) fn length(&self) -> usize {
        self.decimal_step
    }
}

/// Largest power of two `<= value`.
fn floor_power_of_two(value: usize) -> usize {
    debug_assert!(value != 0);
    1 << value.ilog2()
}

//! The four merge primitives. Which one runs is decided per merge by the
//! driver, based on what working space happens to be available: the external
//! cache, the second internal buffer, or nothing at all.

use std::cmp::Ordering::{self, Less};

use crate::cache::Cache;
use crate::ops::{block_swap, rotate, Range};
use crate::search::{binary_first, binary_last};

/// Two-pointer merge of `from[a]` and `from[b]` into the disjoint output
/// `into`. Ties go to `a`, which is what keeps every other layer stable.
pub(crate) fn merge_into<T: Copy, F>(from: &[T], a: Range, b: Range, into: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    debug_assert!(a.len() > 0 && b.len() > 0);
    debug_assert!(into.len() == a.len() + b.len());

    let mut a_index = a.start;
    let mut b_index = b.start;
    let mut insert = 0;

    loop {
        if cmp(&from[b_index], &from[a_index]) != Less {
            into[insert] = from[a_index];
            a_index += 1;
            insert += 1;
            if a_index == a.end {
                into[insert..].copy_from_slice(&from[b_index..b.end]);
                break;
            }
        } else {
            into[insert] = from[b_index];
            b_index += 1;
            insert += 1;
            if b_index == b.end {
                into[insert..].copy_from_slice(&from[a_index..a.end]);
                break;
            }
        }
    }
}

/// Merge where the left run has already been parked in the front of the
/// cache. The freed-up left region absorbs the output; consumed B slots are
/// swapped over rather than copied, so they only ever hold elements the
/// array already owned.
pub(crate) fn merge_external<T, C, F>(arr: &mut [T], a: Range, b: Range, cache: &C, cmp: &mut F)
where
    C: Cache<T>,
    F: FnMut(&T, &T) -> Ordering,
{
    debug_assert!(a.end == b.start);

    let mut a_count = 0;
    let mut b_index = b.start;
    let mut insert = a.start;

    if a.len() > 0 && b.len() > 0 {
        loop {
            if cmp(&arr[b_index], cache.get(a_count)) != Less {
                cache.store(a_count, &mut arr[insert..insert + 1]);
                a_count += 1;
                insert += 1;
                if a_count == a.len() {
                    break;
                }
            } else {
                arr.swap(insert, b_index);
                b_index += 1;
                insert += 1;
                if b_index == b.end {
                    break;
                }
            }
        }
    }

    // the rest of the cached run goes straight after the merged output
    let remaining = a.len() - a_count;
    cache.store(a_count, &mut arr[insert..insert + remaining]);
}

/// Merge using `buffer`, a range of the array itself whose ordering is
/// allowed to be scrambled. The caller has swapped the left run into
/// `buffer` beforehand; every step swaps rather than copies, so the
/// buffer's contents survive, just permuted.
pub(crate) fn merge_internal<T, F>(arr: &mut [T], a: Range, b: Range, buffer: Range, cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut a_count = 0;
    let mut b_count = 0;
    let mut insert = 0;

    if a.len() > 0 && b.len() > 0 {
        loop {
            if cmp(&arr[b.start + b_count], &arr[buffer.start + a_count]) != Less {
                arr.swap(a.start + insert, buffer.start + a_count);
                a_count += 1;
                insert += 1;
                if a_count >= a.len() {
                    break;
                }
            } else {
                arr.swap(a.start + insert, b.start + b_count);
                b_count += 1;
                insert += 1;
                if b_count >= b.len() {
                    break;
                }
            }
        }
    }

    block_swap(arr, buffer.start + a_count, a.start + insert, a.len() - a_count);
}

/// Buffer-free merge: binary search where the head of A belongs in B,
/// rotate A there, skip the equal prefix, repeat.
///
/// Quadratic in general, but the driver only reaches for it when fewer than
/// sqrt(|A|) unique values exist, which bounds the rotations and makes it
/// O(n) amortised over the pass.
pub(crate) fn merge_in_place<T, C, F>(
    arr: &mut [T],
    mut a: Range,
    mut b: Range,
    cache: &mut C,
    cmp: &mut F,
) where
    C: Cache<T>,
    F: FnMut(&T, &T) -> Ordering,
{
    if a.len() == 0 || b.len() == 0 {
        return;
    }

    loop {
        // where the first item of A has to be inserted into B
        let mid = binary_first(arr, &arr[a.start], b, cmp);

        // rotate A into place
        let amount = mid - a.end;
        rotate(arr, a.len(), Range::new(a.start, mid), cache);
        if b.end == mid {
            break;
        }

        b.start = mid;
        a = Range::new(a.start + amount, b.start);
        let skipped = binary_last(arr, &arr[a.start], a, cmp);

        // a comparator that orders an element strictly before itself can pin
        // both boundaries; bail out instead of spinning
        if amount == 0 && skipped == a.start {
            break;
        }

        a.start = skipped;
        if a.len() == 0 {
            break;
        }
    }
}

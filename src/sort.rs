//! The sort driver: sorting networks for the finest runs, then bottom-up
//! merge passes that pick a strategy per level. Levels shorter than the
//! cache merge through it; longer levels run the block-rolling merge with
//! internal buffers pulled out of the array itself.

use std::cmp::Ordering::{self, Less};

use crate::cache::Cache;
use crate::iter::PassIterator;
use crate::merge::{merge_external, merge_in_place, merge_internal};
use crate::ops::{block_swap, insertion_sort, rotate, rotate_in_place, Range};
use crate::search::{
    binary_first, find_first_backward, find_first_forward, find_last_backward, find_last_forward,
};

/// How one internal buffer was assembled: the subarray it came from, how
/// many unique values were gathered, and which edge they were pulled to.
#[derive(Clone, Copy, Default)]
struct Pull {
    range: Range,
    from: usize,
    to: usize,
    count: usize,
}

pub(crate) fn sort_with_cache<T, C, F>(arr: &mut [T], cache: &mut C, cmp: &mut F)
where
    C: Cache<T>,
    F: FnMut(&T, &T) -> Ordering,
{
    let len = arr.len();

    if len < 4 {
        if len == 3 {
            if cmp(&arr[1], &arr[0]) == Less {
                arr.swap(0, 1);
            }
            if cmp(&arr[2], &arr[1]) == Less {
                arr.swap(1, 2);
                if cmp(&arr[1], &arr[0]) == Less {
                    arr.swap(0, 1);
                }
            }
        } else if len == 2 {
            if cmp(&arr[1], &arr[0]) == Less {
                arr.swap(0, 1);
            }
        }
        return;
    }

    // sort runs of 4-8 items with the stabilised networks
    let mut iterator = PassIterator::new(len, 4);
    while !iterator.finished() {
        let range = iterator.next_range();
        sort_network(arr, range, cmp);
    }
    if len < 8 {
        return;
    }

    // merge runs of 8-15, 16-31, 32-63, ... until a single run remains.
    // `<` rather than `<=`: run lengths can exceed the nominal level by one.
    loop {
        if iterator.length() < cache.capacity() {
            if (iterator.length() + 1) * 4 <= cache.capacity() && iterator.length() * 4 <= len {
                merge_cached_double(arr, &mut iterator, cache, cmp);
                // two levels were merged at once
                iterator.next_level();
            } else {
                merge_cached(arr, &mut iterator, cache, cmp);
            }
        } else {
            block_merge_pass(arr, &mut iterator, cache, cmp);
        }

        #[cfg(debug_assertions)]
        assert_level_sorted(arr, &mut iterator, cmp);

        if !iterator.next_level() {
            break;
        }
    }
}

const NETWORK_4: [(usize, usize); 5] = [(0, 1), (2, 3), (0, 2), (1, 3), (1, 2)];
const NETWORK_5: [(usize, usize); 9] = [
    (0, 1),
    (3, 4),
    (2, 4),
    (2, 3),
    (1, 4),
    (0, 3),
    (0, 2),
    (1, 3),
    (1, 2),
];
const NETWORK_6: [(usize, usize); 12] = [
    (1, 2),
    (4, 5),
    (0, 2),
    (3, 5),
    (0, 1),
    (3, 4),
    (2, 5),
    (0, 3),
    (1, 4),
    (2, 4),
    (1, 3),
    (2, 3),
];
const NETWORK_7: [(usize, usize); 16] = [
    (1, 2),
    (3, 4),
    (5, 6),
    (0, 2),
    (3, 5),
    (4, 6),
    (0, 1),
    (4, 5),
    (2, 6),
    (0, 4),
    (1, 5),
    (0, 3),
    (2, 5),
    (1, 3),
    (2, 4),
    (2, 3),
];
const NETWORK_8: [(usize, usize); 19] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (1, 2),
    (5, 6),
    (0, 4),
    (3, 7),
    (1, 5),
    (2, 6),
    (1, 4),
    (3, 6),
    (2, 4),
    (3, 5),
    (3, 4),
];

/// Bose-Nelson compare-exchange schedules. The networks themselves are
/// unstable, so each exchange also consults `order`, the permutation the
/// run has undergone so far: equal elements only swap when doing so
/// restores their original order.
fn sort_network<T, F>(arr: &mut [T], range: Range, cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    let schedule: &[(usize, usize)] = match range.len() {
        4 => &NETWORK_4,
        5 => &NETWORK_5,
        6 => &NETWORK_6,
        7 => &NETWORK_7,
        8 => &NETWORK_8,
        _ => return,
    };

    let mut order: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];
    for &(x, y) in schedule {
        let left = range.start + x;
        let right = range.start + y;

        if cmp(&arr[right], &arr[left]) == Less
            || (order[x] > order[y] && cmp(&arr[left], &arr[right]) != Less)
        {
            arr.swap(left, right);
            order.swap(x, y);
        }
    }
}

/// One pair at a time: park A in the cache and merge it back over A+B.
fn merge_cached<T, C, F>(arr: &mut [T], iterator: &mut PassIterator, cache: &mut C, cmp: &mut F)
where
    C: Cache<T>,
    F: FnMut(&T, &T) -> Ordering,
{
    iterator.begin();
    while !iterator.finished() {
        let a = iterator.next_range();
        let b = iterator.next_range();

        if cmp(&arr[b.end - 1], &arr[a.start]) == Less {
            // fully reversed: a rotation is the whole merge
            rotate(arr, a.len(), Range::new(a.start, b.end), cache);
        } else if cmp(&arr[b.start], &arr[a.end - 1]) == Less {
            cache.load(0, &arr[a.start..a.end]);
            merge_external(arr, a, b, cache, cmp);
        }
        // otherwise the pair is already in order
    }
}

/// Four runs at a time: merge both pairs into the cache, then merge the two
/// cached halves back into the array. Finishes two levels per pass.
fn merge_cached_double<T, C, F>(
    arr: &mut [T],
    iterator: &mut PassIterator,
    cache: &mut C,
    cmp: &mut F,
) where
    C: Cache<T>,
    F: FnMut(&T, &T) -> Ordering,
{
    iterator.begin();
    while !iterator.finished() {
        let mut a1 = iterator.next_range();
        let b1 = iterator.next_range();
        let mut a2 = iterator.next_range();
        let b2 = iterator.next_range();

        if cmp(&arr[b1.end - 1], &arr[a1.start]) == Less {
            // reversed: the runs swap places on their way into the cache
            cache.load(b1.len(), &arr[a1.start..a1.end]);
            cache.load(0, &arr[b1.start..b1.end]);
        } else if cmp(&arr[b1.start], &arr[a1.end - 1]) == Less {
            cache.merge_load(0, arr, a1, b1, cmp);
        } else {
            // A1 and B1 already chain; if A2 and B2 do as well, and B1 into
            // A2, there is nothing to do for this quadruple
            if cmp(&arr[b2.start], &arr[a2.end - 1]) != Less
                && cmp(&arr[a2.start], &arr[b1.end - 1]) != Less
            {
                continue;
            }

            cache.load(0, &arr[a1.start..a1.end]);
            cache.load(a1.len(), &arr[b1.start..b1.end]);
        }
        a1 = Range::new(a1.start, b1.end);

        if cmp(&arr[b2.end - 1], &arr[a2.start]) == Less {
            cache.load(a1.len() + b2.len(), &arr[a2.start..a2.end]);
            cache.load(a1.len(), &arr[b2.start..b2.end]);
        } else if cmp(&arr[b2.start], &arr[a2.end - 1]) == Less {
            cache.merge_load(a1.len(), arr, a2, b2, cmp);
        } else {
            cache.load(a1.len(), &arr[a2.start..a2.end]);
            cache.load(a1.len() + a2.len(), &arr[b2.start..b2.end]);
        }
        a2 = Range::new(a2.start, b2.end);

        // both pairs now live merged in the cache; fold them back
        let a3 = Range::new(0, a1.len());
        let b3 = Range::new(a1.len(), a1.len() + a2.len());

        if cmp(cache.get(b3.end - 1), cache.get(a3.start)) == Less {
            let split = a1.start + a2.len();
            cache.store(a3.start, &mut arr[split..split + a3.len()]);
            cache.store(b3.start, &mut arr[a1.start..a1.start + b3.len()]);
        } else if cmp(cache.get(b3.start), cache.get(a3.end - 1)) == Less {
            cache.merge_store(a3, b3, &mut arr[a1.start..a1.start + a3.len() + b3.len()], cmp);
        } else {
            let split = a1.start + a1.len();
            cache.store(a3.start, &mut arr[a1.start..a1.start + a3.len()]);
            cache.store(b3.start, &mut arr[split..split + b3.len()]);
        }
    }
}

/// One full level of block-rolling merges:
///
/// 1. find up to two internal buffers of unique values and pull them to the
///    edges of their donor subarrays,
/// 2. merge every (A, B) pair through the block-rolling procedure,
/// 3. re-sort the scrambled second buffer and rotate both buffers back to
///    where their values belong.
fn block_merge_pass<T, C, F>(arr: &mut [T], iterator: &mut PassIterator, cache: &mut C, cmp: &mut F)
where
    C: Cache<T>,
    F: FnMut(&T, &T) -> Ordering,
{
    let mut block_size = (iterator.length() as f64).sqrt() as usize;
    let mut buffer_size = iterator.length() / block_size + 1;

    let mut buffer1 = Range::new(0, 0);
    let mut buffer2 = Range::new(0, 0);
    let mut pull: [Pull; 2] = [Pull::default(); 2];
    let mut pull_index = 0;

    // ideally one subarray donates 2*buffer_size unique values, which splits
    // into both buffers. With a cache big enough to hold a whole block the
    // second buffer is never needed; and when two buffers cannot fit in one
    // subarray they have to come from different ones.
    let mut find = buffer_size + buffer_size;
    let mut find_separately = false;

    if block_size <= cache.capacity() {
        find = buffer_size;
    } else if find > iterator.length() {
        find = buffer_size;
        find_separately = true;
    }

    // if not even one buffer of buffer_size unique values exists, the
    // largest partial buffer is taken and every merge of the pass degrades
    // to the in-place variant
    iterator.begin();
    while !iterator.finished() {
        let a = iterator.next_range();
        let b = iterator.next_range();

        // walk A forward over the first occurrence of each unique value;
        // these would be pulled out to the front of A
        let mut last = a.start;
        let mut count = 1;
        while count < find {
            let next = find_last_forward(arr, &arr[last], Range::new(last + 1, a.end), cmp, find - count);
            if next == a.end {
                break;
            }
            last = next;
            count += 1;
        }
        let index = last;

        if count >= buffer_size {
            pull[pull_index] = Pull {
                range: Range::new(a.start, b.end),
                count,
                from: index,
                to: a.start,
            };
            pull_index = 1;

            if count == buffer_size + buffer_size {
                // one subarray covers both buffers
                buffer1 = Range::new(a.start, a.start + buffer_size);
                buffer2 = Range::new(a.start + buffer_size, a.start + count);
                break;
            } else if find == buffer_size + buffer_size {
                // enough for the first buffer; keep looking for the second
                buffer1 = Range::new(a.start, a.start + count);
                find = buffer_size;
            } else if block_size <= cache.capacity() {
                // the only buffer needed
                buffer1 = Range::new(a.start, a.start + count);
                break;
            } else if find_separately {
                buffer1 = Range::new(a.start, a.start + count);
                find_separately = false;
            } else {
                buffer2 = Range::new(a.start, a.start + count);
                break;
            }
        } else if pull_index == 0 && count > buffer1.len() {
            // the largest partial buffer so far
            buffer1 = Range::new(a.start, a.start + count);
            pull[pull_index] = Pull {
                range: Range::new(a.start, b.end),
                count,
                from: index,
                to: a.start,
            };
        }

        // walk B backward the same way; these would be pulled to B's end
        let mut last = b.end - 1;
        let mut count = 1;
        while count < find {
            let next = find_first_backward(arr, &arr[last], Range::new(b.start, last), cmp, find - count);
            if next == b.start {
                break;
            }
            last = next - 1;
            count += 1;
        }
        let index = last;

        if count >= buffer_size {
            pull[pull_index] = Pull {
                range: Range::new(a.start, b.end),
                count,
                from: index,
                to: b.end,
            };
            pull_index = 1;

            if count == buffer_size + buffer_size {
                buffer1 = Range::new(b.end - count, b.end - buffer_size);
                buffer2 = Range::new(b.end - buffer_size, b.end);
                break;
            } else if find == buffer_size + buffer_size {
                buffer1 = Range::new(b.end - count, b.end);
                find = buffer_size;
            } else if block_size <= cache.capacity() {
                buffer1 = Range::new(b.end - count, b.end);
                break;
            } else if find_separately {
                buffer1 = Range::new(b.end - count, b.end);
                find_separately = false;
            } else {
                // if the first buffer came out of this pair's A, its
                // redistribution has to stop short of this second buffer
                if pull[0].range.start == a.start {
                    pull[0].range.end -= pull[1].count;
                }
                buffer2 = Range::new(b.end - count, b.end);
                break;
            }
        } else if pull_index == 0 && count > buffer1.len() {
            buffer1 = Range::new(b.end - count, b.end);
            pull[pull_index] = Pull {
                range: Range::new(a.start, b.end),
                count,
                from: index,
                to: b.end,
            };
        }
    }

    // pull the unique values out to the edges, one gallop-plus-rotate per
    // value, keeping everything around them in order
    for p in 0..2 {
        let length = pull[p].count;

        if pull[p].to < pull[p].from {
            // to the front of an A subarray
            let mut index = pull[p].from;
            for count in 1..length {
                index = find_first_backward(
                    arr,
                    &arr[index - 1],
                    Range::new(pull[p].to, pull[p].from - (count - 1)),
                    cmp,
                    length - count,
                );
                let range = Range::new(index + 1, pull[p].from + 1);
                rotate(arr, range.len() - count, range, cache);
                pull[p].from = index + count;
            }
        } else if pull[p].to > pull[p].from {
            // to the back of a B subarray
            let mut index = pull[p].from + 1;
            for count in 1..length {
                index = find_last_forward(
                    arr,
                    &arr[index],
                    Range::new(index, pull[p].to),
                    cmp,
                    length - count,
                );
                let range = Range::new(pull[p].from, index - 1);
                rotate(arr, count, range, cache);
                pull[p].from = index - 1 - count;
            }
        }
    }

    // the buffers that were actually found dictate the block size; buffer1
    // must be able to tag every full A block of the level
    buffer_size = buffer1.len();
    block_size = iterator.length() / buffer_size + 1;
    debug_assert!((iterator.length() + 1) / block_size <= buffer_size);

    iterator.begin();
    while !iterator.finished() {
        let mut a = iterator.next_range();
        let mut b = iterator.next_range();

        // exclude any part of A or B the internal buffers occupy
        let start = a.start;
        if start == pull[0].range.start {
            if pull[0].from > pull[0].to {
                a.start += pull[0].count;

                // with tiny subarrays the buffer can swallow its donor whole
                if a.len() == 0 {
                    continue;
                }
            } else if pull[0].from < pull[0].to {
                b.end -= pull[0].count;
                if b.len() == 0 {
                    continue;
                }
            }
        }
        if start == pull[1].range.start {
            if pull[1].from > pull[1].to {
                a.start += pull[1].count;
                if a.len() == 0 {
                    continue;
                }
            } else if pull[1].from < pull[1].to {
                b.end -= pull[1].count;
                if b.len() == 0 {
                    continue;
                }
            }
        }

        if cmp(&arr[b.end - 1], &arr[a.start]) == Less {
            // fully reversed
            rotate(arr, a.len(), Range::new(a.start, b.end), cache);
        } else if cmp(&arr[a.end], &arr[a.end - 1]) == Less {
            roll_blocks(arr, a, b, buffer1, buffer2, block_size, cache, cmp);
        }
        // otherwise already in order
    }

    // the second buffer is now a scrambled permutation of its unique values
    insertion_sort(arr, buffer2, cmp);

    // redistribute: the inverse of the pull, one value at a time with a
    // shrinking uniqueness hint
    for p in 0..2 {
        let mut unique = pull[p].count * 2;

        if pull[p].from > pull[p].to {
            // pulled to the left edge, drip back to the right
            let mut buffer = Range::new(pull[p].range.start, pull[p].range.start + pull[p].count);
            while buffer.len() > 0 {
                let index = find_first_forward(
                    arr,
                    &arr[buffer.start],
                    Range::new(buffer.end, pull[p].range.end),
                    cmp,
                    unique,
                );
                let amount = index - buffer.end;
                rotate(arr, buffer.len(), Range::new(buffer.start, index), cache);
                buffer.start += amount + 1;
                buffer.end += amount;
                unique -= 2;
            }
        } else if pull[p].from < pull[p].to {
            // pulled to the right edge, drip back to the left
            let mut buffer = Range::new(pull[p].range.end - pull[p].count, pull[p].range.end);
            while buffer.len() > 0 {
                let index = find_last_backward(
                    arr,
                    &arr[buffer.end - 1],
                    Range::new(pull[p].range.start, buffer.start),
                    cmp,
                    unique,
                );
                let amount = buffer.start - index;
                rotate(arr, amount, Range::new(index, buffer.end), cache);
                buffer.start -= amount;
                buffer.end -= amount + 1;
                unique -= 2;
            }
        }
    }
}

/// Merge one (A, B) pair by rolling A's blocks through B.
///
/// A's full blocks are tagged by swapping their first element with a value
/// from `buffer1`; the distinct tags both identify the minimum block at
/// each step and keep equal-keyed blocks in their original order. Each
/// dropped block is merged with the B values that follow it using whatever
/// working space exists.
#[allow(clippy::too_many_arguments)]
fn roll_blocks<T, C, F>(
    arr: &mut [T],
    a: Range,
    b: Range,
    buffer1: Range,
    buffer2: Range,
    block_size: usize,
    cache: &mut C,
    cmp: &mut F,
) where
    C: Cache<T>,
    F: FnMut(&T, &T) -> Ordering,
{
    // the uneven head of A, followed by whole blocks
    let mut block_a = Range::new(a.start, a.end);
    let first_a = Range::new(a.start, a.start + block_a.len() % block_size);

    // tag each full A block
    let mut index_a = buffer1.start;
    let mut index = first_a.end;
    while index < block_a.end {
        arr.swap(index_a, index);
        index_a += 1;
        index += block_size;
    }

    let mut last_a = first_a;
    let mut last_b = Range::new(0, 0);
    let mut block_b = Range::new(b.start, b.start + block_size.min(b.len()));
    block_a.start += first_a.len();
    index_a = buffer1.start;

    // park the uneven head where its merge will expect it
    if last_a.len() <= cache.capacity() {
        cache.load(0, &arr[last_a.start..last_a.end]);
    } else if buffer2.len() > 0 {
        block_swap(arr, last_a.start, buffer2.start, last_a.len());
    }

    if block_a.len() > 0 {
        loop {
            // drop the minimum A block once the previous B block reaches
            // it, or once B runs out of blocks
            if (last_b.len() > 0 && cmp(&arr[last_b.end - 1], &arr[index_a]) != Less)
                || block_b.len() == 0
            {
                // where the previous B block splits around the drop
                let b_split = binary_first(arr, &arr[index_a], last_b, cmp);
                let b_remaining = last_b.end - b_split;

                // select the minimum A block by its tag
                let mut min_a = block_a.start;
                let mut find_a = min_a + block_size;
                while find_a < block_a.end {
                    if cmp(&arr[find_a], &arr[min_a]) == Less {
                        min_a = find_a;
                    }
                    find_a += block_size;
                }
                block_swap(arr, block_a.start, min_a, block_size);

                // give the dropped block its first element back
                arr.swap(block_a.start, index_a);
                index_a += 1;

                // merge the previous A block with the B values after it
                if last_a.len() <= cache.capacity() {
                    merge_external(arr, last_a, Range::new(last_a.end, b_split), cache, cmp);
                } else if buffer2.len() > 0 {
                    merge_internal(arr, last_a, Range::new(last_a.end, b_split), buffer2, cmp);
                } else {
                    merge_in_place(arr, last_a, Range::new(last_a.end, b_split), cache, cmp);
                }

                if buffer2.len() > 0 || block_size <= cache.capacity() {
                    // park the dropped block, then block swap the B
                    // remainder into place; the slots left behind hold
                    // either buffer2 or copies nothing depends on anymore
                    if block_size <= cache.capacity() {
                        cache.load(0, &arr[block_a.start..block_a.start + block_size]);
                    } else {
                        block_swap(arr, block_a.start, buffer2.start, block_size);
                    }
                    block_swap(
                        arr,
                        b_split,
                        block_a.start + block_size - b_remaining,
                        b_remaining,
                    );
                } else {
                    // no second buffer to trade through, rotate instead;
                    // whatever the cache held has been merged already
                    rotate(
                        arr,
                        block_a.start - b_split,
                        Range::new(b_split, block_a.start + block_size),
                        cache,
                    );
                }

                last_a = Range::new(
                    block_a.start - b_remaining,
                    block_a.start - b_remaining + block_size,
                );
                last_b = Range::new(last_a.end, last_a.end + b_remaining);

                block_a.start += block_size;
                if block_a.len() == 0 {
                    break;
                }
            } else if block_b.len() < block_size {
                // the final, uneven B block goes in front of the remaining
                // A blocks whole. Rotating through the cache is off the
                // table here, the cache may still hold the parked head.
                rotate_in_place(
                    arr,
                    block_b.start - block_a.start,
                    Range::new(block_a.start, block_b.end),
                );

                last_b = Range::new(block_a.start, block_a.start + block_b.len());
                block_a.start += block_b.len();
                block_a.end += block_b.len();
                block_b.end = block_b.start;
            } else {
                // roll the leftmost A block past the next B block
                block_swap(arr, block_a.start, block_b.start, block_size);
                last_b = Range::new(block_a.start, block_a.start + block_size);

                block_a.start += block_size;
                block_a.end += block_size;
                block_b.start += block_size;
                block_b.end = (block_b.end + block_size).min(b.end);
            }
        }
    }

    // merge the last dropped block with what remains of B
    if last_a.len() <= cache.capacity() {
        merge_external(arr, last_a, Range::new(last_a.end, b.end), cache, cmp);
    } else if buffer2.len() > 0 {
        merge_internal(arr, last_a, Range::new(last_a.end, b.end), buffer2, cmp);
    } else {
        merge_in_place(arr, last_a, Range::new(last_a.end, b.end), cache, cmp);
    }
}

/// Debug builds re-check the pass postcondition: every merged pair of this
/// level is sorted before the level doubles.
#[cfg(debug_assertions)]
fn assert_level_sorted<T, F>(arr: &[T], iterator: &mut PassIterator, cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    iterator.begin();
    while !iterator.finished() {
        let a = iterator.next_range();
        let b = iterator.next_range();

        for index in a.start + 1..b.end {
            debug_assert!(
                cmp(&arr[index - 1], &arr[index]) != std::cmp::Ordering::Greater,
                "merge level left elements out of order"
            );
        }
    }
}

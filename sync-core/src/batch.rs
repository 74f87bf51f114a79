//! Batch planning for mutations.
//!
//! A mutation's save list and delete list are chunked independently at the
//! current batch size, then paired in lockstep: batch `n` carries the `n`-th
//! save chunk and the `n`-th delete chunk, either of which may be empty once
//! its list runs out.
//!
//! ```text
//! saves:   [s0 s1 s2 s3 s4]   size 2 → [s0 s1] [s2 s3] [s4]
//! deletes: [d0 d1 d2]                → [d0 d1] [d2]
//! batches:  #0 {s0 s1 | d0 d1}  #1 {s2 s3 | d2}  #2 {s4 | -}
//! ```

use std::slice::Chunks;

/// Default number of items per save chunk and per delete chunk.
pub const DEFAULT_BATCH_SIZE: usize = 400;

/// One atomic unit of a mutation.
#[derive(Debug, PartialEq, Eq)]
pub struct Batch<'a, S, D> {
    /// Position of this batch in the plan, starting at 0.
    pub index: usize,
    /// Records to save in this batch.
    pub saves: &'a [S],
    /// Identifiers to delete in this batch.
    pub deletes: &'a [D],
}

impl<S, D> Batch<'_, S, D> {
    /// Total items in the batch.
    pub fn len(&self) -> usize {
        self.saves.len() + self.deletes.len()
    }

    /// True when the batch carries nothing (never produced by a plan).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Iterator over the lockstep batches of a mutation.
#[derive(Debug)]
pub struct BatchPlan<'a, S, D> {
    saves: Chunks<'a, S>,
    deletes: Chunks<'a, D>,
    batch_size: usize,
    next_index: usize,
}

impl<'a, S, D> BatchPlan<'a, S, D> {
    /// Plan batches over the full input lists. A zero size is treated as 1.
    pub fn new(saves: &'a [S], deletes: &'a [D], batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            saves: saves.chunks(batch_size),
            deletes: deletes.chunks(batch_size),
            batch_size,
            next_index: 0,
        }
    }

    /// Batch size this plan chunks at.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<'a, S, D> Iterator for BatchPlan<'a, S, D> {
    type Item = Batch<'a, S, D>;

    fn next(&mut self) -> Option<Self::Item> {
        let saves = self.saves.next();
        let deletes = self.deletes.next();
        if saves.is_none() && deletes.is_none() {
            return None;
        }

        let batch = Batch {
            index: self.next_index,
            saves: saves.unwrap_or(&[]),
            deletes: deletes.unwrap_or(&[]),
        };
        self.next_index += 1;
        Some(batch)
    }
}

/// Number of batches a plan will produce.
pub fn batch_count(save_count: usize, delete_count: usize, batch_size: usize) -> usize {
    let batch_size = batch_size.max(1);
    save_count
        .div_ceil(batch_size)
        .max(delete_count.div_ceil(batch_size))
}

/// Halve a batch size after an overflow. `None` when it cannot shrink further.
pub fn shrink(batch_size: usize) -> Option<usize> {
    if batch_size <= 1 {
        None
    } else {
        Some(batch_size / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    // ===========================================
    // Chunking
    // ===========================================

    #[test]
    fn save_only_plan_has_ceil_batches() {
        for (n, size) in [(1, 400), (400, 400), (401, 400), (9, 4), (10, 3), (7, 1)] {
            let saves = items(n);
            let plan: Vec<_> = BatchPlan::<usize, usize>::new(&saves, &[], size).collect();
            assert_eq!(plan.len(), n.div_ceil(size), "n={} size={}", n, size);
            assert_eq!(plan.len(), batch_count(n, 0, size));
        }
    }

    #[test]
    fn every_item_appears_exactly_once_in_order() {
        let saves = items(23);
        let flattened: Vec<usize> = BatchPlan::<usize, usize>::new(&saves, &[], 5)
            .flat_map(|batch| batch.saves.to_vec())
            .collect();
        assert_eq!(flattened, saves);
    }

    #[test]
    fn saves_and_deletes_pair_in_lockstep() {
        let saves = items(5);
        let deletes = vec!['a', 'b', 'c'];

        let plan: Vec<_> = BatchPlan::new(&saves, &deletes, 2).collect();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].saves, &[0, 1]);
        assert_eq!(plan[0].deletes, &['a', 'b']);
        assert_eq!(plan[1].saves, &[2, 3]);
        assert_eq!(plan[1].deletes, &['c']);
        assert_eq!(plan[2].saves, &[4]);
        assert!(plan[2].deletes.is_empty());
        assert_eq!(
            plan.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn delete_list_longer_than_save_list() {
        let saves = items(1);
        let deletes = items(6);

        let plan: Vec<_> = BatchPlan::new(&saves, &deletes, 2).collect();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].len(), 3);
        assert!(plan[1].saves.is_empty());
        assert_eq!(plan[2].deletes, &[4, 5]);
    }

    #[test]
    fn empty_inputs_produce_no_batches() {
        let plan: Vec<_> = BatchPlan::<usize, usize>::new(&[], &[], 10).collect();
        assert!(plan.is_empty());
        assert_eq!(batch_count(0, 0, 10), 0);
    }

    #[test]
    fn zero_batch_size_is_treated_as_one() {
        let saves = items(3);
        let plan = BatchPlan::<usize, usize>::new(&saves, &[], 0);
        assert_eq!(plan.batch_size(), 1);
        assert_eq!(plan.count(), 3);
    }

    // ===========================================
    // Shrinking
    // ===========================================

    #[test]
    fn shrink_halves_with_floor() {
        assert_eq!(shrink(400), Some(200));
        assert_eq!(shrink(9), Some(4));
        assert_eq!(shrink(2), Some(1));
        assert_eq!(shrink(1), None);
        assert_eq!(shrink(0), None);
    }

    #[test]
    fn nine_items_at_shrunk_size_take_three_batches() {
        let saves = items(9);
        let size = shrink(9).unwrap();
        assert_eq!(BatchPlan::<usize, usize>::new(&saves, &[], size).count(), 3);
    }
}

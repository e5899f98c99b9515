//! # Boundary-Crossing Packing
//!
//! A tighter packer that lets fields straddle a word boundary when that
//! avoids padding. The storage engine reads and writes such fields with a
//! two-word split.
//!
//! ## Algorithm
//!
//! Candidates are kept ascending, so the widest sits at the end of the list.
//! Unions wider than a word are held in a separate list. Then, repeatedly:
//!
//! 1. If the current bucket reached 64 bits, open a new one that starts with
//!    whatever overflow the last placement carried past the boundary.
//! 2. If the bucket is empty (the cursor is word aligned) and a large union
//!    is pending, place the largest one there.
//! 3. Otherwise scan from the smallest candidate upward for one that fills
//!    the remaining room exactly.
//! 4. Failing that, take the widest remaining candidate and let it cross.
//! 5. When only large unions remain and the cursor is unaligned, they are
//!    placed at the cursor.
//!
//! The result never contains interior padding: every bucket but the last is
//! exactly full. The heuristic is greedy and makes no optimality claim about
//! how many fields end up crossing.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use eyre::Result;
use tracing::trace;

use crate::compiler::bucket::Bucket;
use crate::compiler::candidate::{descending_order, Candidate};
use crate::compiler::{Packer, Strategy};
use crate::config::WORD_BITS;

#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryCrossing;

impl Packer for BoundaryCrossing {
    fn strategy(&self) -> Strategy {
        Strategy::BoundaryCrossing
    }

    fn pack<'b>(&self, arena: &'b Bump, candidates: &[Candidate]) -> Result<BumpVec<'b, Bucket>> {
        let mut ascending = descending_order(candidates);
        ascending.reverse();
        let (mut large, mut small): (Vec<usize>, Vec<usize>) = ascending
            .into_iter()
            .partition(|&i| candidates[i].bits > WORD_BITS);

        let mut buckets = BumpVec::new_in(arena);
        buckets.push(Bucket::default());

        while !small.is_empty() || !large.is_empty() {
            let current = buckets.len() - 1;

            if buckets[current].is_full() {
                let overflow = buckets[current].size - WORD_BITS;
                buckets[current].size = WORD_BITS;
                buckets.push(Bucket::carrying(overflow));
                continue;
            }

            let bucket = &mut buckets[current];
            if bucket.size == 0 {
                if let Some(idx) = large.pop() {
                    trace!(name = %candidates[idx].name, "large union placed on word boundary");
                    bucket.place(idx, candidates[idx].bits);
                    continue;
                }
            }

            let room = bucket.room();
            let next = match small.iter().position(|&i| candidates[i].bits == room) {
                Some(pos) => small.remove(pos),
                None => match small.pop() {
                    Some(idx) => idx,
                    None => match large.pop() {
                        Some(idx) => idx,
                        None => break,
                    },
                },
            };
            bucket.place(next, candidates[next].bits);
        }

        while let Some(last) = buckets.last_mut() {
            if last.size <= WORD_BITS {
                break;
            }
            let overflow = last.size - WORD_BITS;
            last.size = WORD_BITS;
            buckets.push(Bucket::carrying(overflow));
        }

        if buckets.len() == 1 && buckets[0].slots.is_empty() {
            buckets.clear();
        }
        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bucket::total_bits;
    use crate::schema::{FieldId, StructureId};

    fn field(i: u32, bits: u32) -> Candidate {
        Candidate::field(FieldId(i), bits, format!("f{}", i))
    }

    #[test]
    fn small_fields_pack_widest_first_when_nothing_fits_exactly() {
        let arena = Bump::new();
        let cands = vec![field(0, 1), field(1, 20), field(2, 8)];
        let buckets = BoundaryCrossing.pack(&arena, &cands).unwrap();

        assert_eq!(buckets.len(), 1);
        let placed: Vec<(Option<usize>, u32)> =
            buckets[0].slots.iter().map(|s| (s.candidate, s.offset)).collect();
        assert_eq!(placed, vec![(Some(1), 0), (Some(2), 20), (Some(0), 28)]);
    }

    #[test]
    fn exact_fit_is_preferred_over_widest() {
        let arena = Bump::new();
        let cands = vec![field(0, 40), field(1, 40), field(2, 24)];
        let buckets = BoundaryCrossing.pack(&arena, &cands).unwrap();

        assert_eq!(buckets[0].size, 64);
        let first: Vec<Option<usize>> = buckets[0].slots.iter().map(|s| s.candidate).collect();
        assert_eq!(first, vec![Some(0), Some(2)]);
        assert_eq!(total_bits(&buckets), 104);
    }

    #[test]
    fn fields_cross_instead_of_padding() {
        let arena = Bump::new();
        let cands = vec![field(0, 40), field(1, 40), field(2, 40)];
        let buckets = BoundaryCrossing.pack(&arena, &cands).unwrap();

        assert_eq!(total_bits(&buckets), 120);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].slots[1].offset, 40);
        assert_eq!(buckets[1].size, 56);
    }

    #[test]
    fn large_union_lands_on_a_word_boundary() {
        let arena = Bump::new();
        let cands = vec![
            field(0, 10),
            Candidate::union(StructureId(1), 100, "u".into()),
        ];
        let buckets = BoundaryCrossing.pack(&arena, &cands).unwrap();

        assert_eq!(buckets[0].slots[0].candidate, Some(1));
        assert_eq!(buckets[0].slots[0].offset, 0);
        assert_eq!(total_bits(&buckets), 110);
        for bucket in buckets.iter() {
            assert!(bucket.size <= WORD_BITS);
        }
    }

    #[test]
    fn nothing_to_pack_yields_no_buckets() {
        let arena = Bump::new();
        let buckets = BoundaryCrossing.pack(&arena, &[]).unwrap();
        assert!(buckets.is_empty());
    }
}

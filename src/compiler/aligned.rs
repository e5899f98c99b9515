//! # Word-Aligned Packing
//!
//! First-Fit-Decreasing bin packing into 64-bit buckets. No field ever
//! straddles a word boundary, so the storage engine only needs single-word
//! masking for layouts produced here.
//!
//! ## Algorithm
//!
//! 1. Sort candidates by width descending (natural-name tie break).
//! 2. Every union wider than a word gets a dedicated run of
//!    `ceil(bits / 64)` buckets: the first holds the union, the rest hold
//!    placeholders. These runs are laid down before anything else.
//! 3. Each remaining candidate goes into the first bucket with enough room;
//!    if none has room, a new bucket is opened.
//!
//! Placeholders only consume what the union needs, so the tail of a large
//! union's last bucket stays open for small fields in step 3. Padding is
//! checked when the buckets are materialized.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use eyre::Result;
use tracing::trace;

use crate::compiler::bucket::Bucket;
use crate::compiler::candidate::{descending_order, Candidate};
use crate::compiler::{Packer, Strategy};
use crate::config::WORD_BITS;

#[derive(Debug, Clone, Copy, Default)]
pub struct WordAligned;

impl Packer for WordAligned {
    fn strategy(&self) -> Strategy {
        Strategy::WordAligned
    }

    fn pack<'b>(&self, arena: &'b Bump, candidates: &[Candidate]) -> Result<BumpVec<'b, Bucket>> {
        let order = descending_order(candidates);
        let mut buckets = BumpVec::new_in(arena);

        for &idx in order.iter().filter(|&&i| candidates[i].bits > WORD_BITS) {
            let cand = &candidates[idx];
            let mut first = Bucket::default();
            first.place(idx, WORD_BITS);
            buckets.push(first);

            let mut remaining = cand.bits - WORD_BITS;
            while remaining > 0 {
                let take = remaining.min(WORD_BITS);
                let mut filler = Bucket::default();
                filler.placeholder(take);
                buckets.push(filler);
                remaining -= take;
            }
            trace!(name = %cand.name, bits = cand.bits, "reserved dedicated buckets");
        }

        for &idx in order.iter().filter(|&&i| candidates[i].bits <= WORD_BITS) {
            let bits = candidates[idx].bits;
            match buckets.iter_mut().find(|b| b.room() >= bits) {
                Some(bucket) => {
                    bucket.place(idx, bits);
                }
                None => {
                    let mut bucket = Bucket::default();
                    bucket.place(idx, bits);
                    buckets.push(bucket);
                }
            }
        }

        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::candidate::Unit;
    use crate::schema::{FieldId, StructureId};

    fn field(i: u32, bits: u32) -> Candidate {
        Candidate::field(FieldId(i), bits, format!("f{}", i))
    }

    #[test]
    fn small_fields_share_one_bucket_widest_first() {
        let arena = Bump::new();
        let cands = vec![field(0, 1), field(1, 20), field(2, 8)];
        let buckets = WordAligned.pack(&arena, &cands).unwrap();

        assert_eq!(buckets.len(), 1);
        let placed: Vec<(Option<usize>, u32)> =
            buckets[0].slots.iter().map(|s| (s.candidate, s.offset)).collect();
        assert_eq!(placed, vec![(Some(1), 0), (Some(2), 20), (Some(0), 28)]);
        assert_eq!(buckets[0].size, 29);
    }

    #[test]
    fn first_fit_backfills_earlier_buckets() {
        let arena = Bump::new();
        let cands = vec![field(0, 40), field(1, 40), field(2, 20)];
        let buckets = WordAligned.pack(&arena, &cands).unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].size, 60);
        assert_eq!(buckets[1].size, 40);
    }

    #[test]
    fn large_union_gets_dedicated_buckets_before_small_fields() {
        let arena = Bump::new();
        let cands = vec![
            field(0, 30),
            Candidate::union(StructureId(1), 90, "u".into()),
        ];
        let buckets = WordAligned.pack(&arena, &cands).unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].slots[0].candidate, Some(1));
        assert!(matches!(cands[1].unit, Unit::Union(_)));
        assert_eq!(buckets[1].slots[0].candidate, None);
        assert_eq!(buckets[1].slots[0].bits, 26);
        assert_eq!(buckets[1].slots[1].candidate, Some(0));
        assert_eq!(buckets[1].slots[1].offset, 26);
        assert_eq!(buckets[1].size, 56);
    }

    #[test]
    fn no_slot_crosses_a_word() {
        let arena = Bump::new();
        let cands: Vec<Candidate> = (0..20).map(|i| field(i, 7 + (i * 5) % 50)).collect();
        let buckets = WordAligned.pack(&arena, &cands).unwrap();
        for bucket in buckets.iter() {
            for slot in &bucket.slots {
                assert!(slot.offset + slot.bits <= WORD_BITS);
            }
        }
    }
}

//! # Packing Candidates
//!
//! A candidate is one atomic unit the packers place: either a single packed
//! field or a whole union block whose width was learned by compiling the
//! union on its own first.
//!
//! ## Ordering
//!
//! Candidates sort by width descending. Ties break on the qualified name
//! using natural order, so array-like siblings `item[2]` and `item[10]`
//! order by their numeric index rather than lexically.

use std::cmp::Ordering;

use crate::schema::{FieldId, StructureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    Field(FieldId),
    Union(StructureId),
}

#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub unit: Unit,
    pub bits: u32,
    pub name: String,
}

impl Candidate {
    pub fn field(id: FieldId, bits: u32, name: String) -> Self {
        Self {
            unit: Unit::Field(id),
            bits,
            name,
        }
    }

    pub fn union(id: StructureId, bits: u32, name: String) -> Self {
        Self {
            unit: Unit::Union(id),
            bits,
            name,
        }
    }
}

/// Widest first; ties by natural name order.
pub(crate) fn descending(a: &Candidate, b: &Candidate) -> Ordering {
    b.bits
        .cmp(&a.bits)
        .then_with(|| natural_cmp(&a.name, &b.name))
}

/// Indices of `candidates` in descending packing order.
pub(crate) fn descending_order(candidates: &[Candidate]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| descending(&candidates[a], &candidates[b]));
    order
}

/// Compares names treating runs of ASCII digits as numbers.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.as_bytes();
    let mut b = b.as_bytes();
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (na, rest_a) = split_digits(a);
                let (nb, rest_b) = split_digits(b);
                let ord = compare_digit_runs(na, nb);
                if ord != Ordering::Equal {
                    return ord;
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(x), Some(y)) => {
                let ord = x.cmp(y);
                if ord != Ordering::Equal {
                    return ord;
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let end = s.iter().position(|c| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let trim = |s: &[u8]| -> usize { s.iter().position(|c| *c != b'0').unwrap_or(s.len()) };
    let a_sig = &a[trim(a)..];
    let b_sig = &b[trim(b)..];
    a_sig
        .len()
        .cmp(&b_sig.len())
        .then_with(|| a_sig.cmp(b_sig))
        .then_with(|| a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_order_compares_indices_numerically() {
        assert_eq!(natural_cmp("item[2]", "item[10]"), Ordering::Less);
        assert_eq!(natural_cmp("item[10]", "item[9]"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "b"), Ordering::Less);
        assert_eq!(natural_cmp("a1", "a1"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
    }

    #[test]
    fn leading_zeros_only_break_exact_ties() {
        assert_eq!(natural_cmp("x007", "x7"), Ordering::Greater);
        assert_eq!(natural_cmp("x007", "x8"), Ordering::Less);
    }

    #[test]
    fn descending_sorts_by_width_then_name() {
        let cands = vec![
            Candidate::field(FieldId(0), 8, "b".into()),
            Candidate::field(FieldId(1), 20, "z".into()),
            Candidate::field(FieldId(2), 8, "a".into()),
            Candidate::field(FieldId(3), 1, "c".into()),
        ];
        assert_eq!(descending_order(&cands), vec![1, 2, 0, 3]);
    }
}

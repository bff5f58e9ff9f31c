//! Sparse column representations.
//!
//! A column is a set of [`ColumnEntry`]s with pairwise distinct rows and
//! non-zero coefficients; the additive identity never appears. Every mutating
//! operation takes the field operators of the owning matrix, so columns carry
//! no arithmetic state of their own.
//!
//! Three interchangeable backends are provided: [`VecColumn`] (sorted vector,
//! good default), [`SetColumn`] (ordered map, cheap random mutation) and
//! [`HeapColumn`] (lazy heap, cheap repeated addition).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use itertools::{
    merge_join_by,
    EitherOrBoth::{Both, Left, Right},
};

use crate::fields::FieldOperators;
use crate::RowIndex;

mod heap;
mod set;
mod vector;

pub use heap::HeapColumn;
pub use set::SetColumn;
pub use vector::VecColumn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnEntry<E> {
    pub row: RowIndex,
    pub coeff: E,
}

impl<E> ColumnEntry<E> {
    pub fn new(row: RowIndex, coeff: E) -> Self {
        ColumnEntry { row, coeff }
    }
}

pub trait Column<F: FieldOperators>: Clone {
    fn new() -> Self;

    /// Build from entries with strictly ascending rows.
    fn from_sorted(
        ops: &F,
        entries: impl IntoIterator<Item = ColumnEntry<F::Element>>,
    ) -> Self;

    /// Canonical content: ascending rows, coalesced coefficients.
    fn entries(&self, ops: &F) -> Vec<ColumnEntry<F::Element>>;

    fn is_non_zero(&self, ops: &F, row: RowIndex) -> bool;
    fn is_empty(&self, ops: &F) -> bool;
    /// The maximal row carrying a non-zero coefficient.
    fn pivot(&self, ops: &F) -> Option<RowIndex>;
    fn pivot_coeff(&self, ops: &F) -> Option<F::Element>;

    fn clear(&mut self);
    fn clear_row(&mut self, ops: &F, row: RowIndex);
    /// Relabel row `i` as `mapping[i]` (a permutation of the row space).
    fn reorder(&mut self, ops: &F, mapping: &[RowIndex]);
    fn swap_rows(&mut self, ops: &F, r1: RowIndex, r2: RowIndex);

    /// `self += other`
    fn add(&mut self, ops: &F, other: &Self);
    /// `self = coeff * self + other`
    fn multiply_target_and_add(&mut self, ops: &F, coeff: F::Element, other: &Self);
    /// `self += coeff * other`
    fn multiply_source_and_add(&mut self, ops: &F, coeff: F::Element, other: &Self);
    /// `self *= coeff`
    fn scale(&mut self, ops: &F, coeff: F::Element);

    /// Dense residue prefix of length `length`; absent entries are 0.
    fn get_content(&self, ops: &F, length: usize) -> Vec<u64> {
        let mut content = vec![0; length];
        for entry in self.entries(ops) {
            if entry.row < length {
                content[entry.row] = ops.value_of(entry.coeff);
            }
        }
        content
    }

    fn eq_column(&self, ops: &F, other: &Self) -> bool {
        self.entries(ops) == other.entries(ops)
    }

    /// Hash of the canonical content, used for column compression.
    fn content_hash(&self, ops: &F) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.entries(ops).hash(&mut hasher);
        hasher.finish()
    }
}

/// `target_coeff * target + source_coeff * source` over sorted slices.
/// A coefficient of `None` means "leave the side unscaled".
pub(crate) fn merge_scaled<F: FieldOperators>(
    ops: &F,
    target: &[ColumnEntry<F::Element>],
    target_coeff: Option<F::Element>,
    source: &[ColumnEntry<F::Element>],
    source_coeff: Option<F::Element>,
) -> Vec<ColumnEntry<F::Element>> {
    let scale = |coeff: F::Element, by: Option<F::Element>| match by {
        None => Some(coeff),
        Some(c) => ops.mul(coeff, c),
    };
    merge_join_by(target, source, |t, s| t.row.cmp(&s.row))
        .filter_map(|pair| match pair {
            Left(t) => Some(t.row).zip(scale(t.coeff, target_coeff)),
            Right(s) => Some(s.row).zip(scale(s.coeff, source_coeff)),
            Both(t, s) => {
                let lhs = scale(t.coeff, target_coeff);
                let rhs = scale(s.coeff, source_coeff);
                let sum = match (lhs, rhs) {
                    (Some(a), Some(b)) => ops.add(a, b),
                    (one, other) => one.or(other),
                };
                Some(t.row).zip(sum)
            }
        })
        .map(|(row, coeff)| ColumnEntry { row, coeff })
        .collect()
}

//! Sorted-vector column.

use std::fmt::Debug;

use crate::fields::FieldOperators;
use crate::RowIndex;

use super::{merge_scaled, Column, ColumnEntry};

/// Entries kept in a `Vec` sorted by ascending row. Addition is a linear
/// merge; random access is a binary search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecColumn<E> {
    entries: Vec<ColumnEntry<E>>,
}

impl<E> Default for VecColumn<E> {
    fn default() -> Self {
        VecColumn {
            entries: Vec::new(),
        }
    }
}

impl<E> VecColumn<E> {
    fn position_of(&self, row: RowIndex) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&row, |e| e.row)
    }
}

impl<F> Column<F> for VecColumn<F::Element>
where
    F: FieldOperators,
{
    fn new() -> Self {
        Self::default()
    }

    fn from_sorted(
        _ops: &F,
        entries: impl IntoIterator<Item = ColumnEntry<F::Element>>,
    ) -> Self {
        VecColumn {
            entries: entries.into_iter().collect(),
        }
    }

    fn entries(&self, _ops: &F) -> Vec<ColumnEntry<F::Element>> {
        self.entries.clone()
    }

    fn is_non_zero(&self, _ops: &F, row: RowIndex) -> bool {
        self.position_of(row).is_ok()
    }

    fn is_empty(&self, _ops: &F) -> bool {
        self.entries.is_empty()
    }

    fn pivot(&self, _ops: &F) -> Option<RowIndex> {
        self.entries.last().map(|e| e.row)
    }

    fn pivot_coeff(&self, _ops: &F) -> Option<F::Element> {
        self.entries.last().map(|e| e.coeff)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn clear_row(&mut self, _ops: &F, row: RowIndex) {
        if let Ok(pos) = self.position_of(row) {
            self.entries.remove(pos);
        }
    }

    fn reorder(&mut self, _ops: &F, mapping: &[RowIndex]) {
        for entry in &mut self.entries {
            entry.row = mapping[entry.row];
        }
        self.entries.sort_unstable_by_key(|e| e.row);
    }

    fn swap_rows(&mut self, _ops: &F, r1: RowIndex, r2: RowIndex) {
        for entry in &mut self.entries {
            if entry.row == r1 {
                entry.row = r2;
            } else if entry.row == r2 {
                entry.row = r1;
            }
        }
        self.entries.sort_unstable_by_key(|e| e.row);
    }

    fn add(&mut self, ops: &F, other: &Self) {
        self.entries = merge_scaled(ops, &self.entries, None, &other.entries, None);
    }

    fn multiply_target_and_add(&mut self, ops: &F, coeff: F::Element, other: &Self) {
        self.entries = merge_scaled(ops, &self.entries, Some(coeff), &other.entries, None);
    }

    fn multiply_source_and_add(&mut self, ops: &F, coeff: F::Element, other: &Self) {
        self.entries = merge_scaled(ops, &self.entries, None, &other.entries, Some(coeff));
    }

    fn scale(&mut self, ops: &F, coeff: F::Element) {
        self.entries = self
            .entries
            .iter()
            .filter_map(|e| {
                ops.mul(e.coeff, coeff)
                    .map(|coeff| ColumnEntry::new(e.row, coeff))
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{PrimeField, Z2};

    fn col_z2(rows: &[usize]) -> VecColumn<crate::fields::Z2One> {
        Column::<Z2>::from_sorted(
            &Z2,
            rows.iter().map(|&r| ColumnEntry::new(r, crate::fields::Z2One)),
        )
    }

    #[test]
    fn test_add_is_self_inverse_mod_2() {
        let ops = Z2;
        let mut a = col_z2(&[0, 3, 5]);
        let b = a.clone();
        a.add(&ops, &b);
        assert!(a.is_empty(&ops));
    }

    #[test]
    fn test_pivot_and_content() {
        let ops = Z2;
        let a = col_z2(&[1, 4]);
        assert_eq!(a.pivot(&ops), Some(4));
        assert_eq!(a.get_content(&ops, 6), vec![0, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn test_multiply_and_add_mod_3() {
        let ops = PrimeField::new(3).unwrap();
        let el = |v: i64| ops.from_value(v).unwrap();
        let mut a: VecColumn<_> = Column::<PrimeField>::from_sorted(
            &ops,
            vec![ColumnEntry::new(0, el(1)), ColumnEntry::new(2, el(2))],
        );
        let b = Column::<PrimeField>::from_sorted(
            &ops,
            vec![ColumnEntry::new(1, el(1)), ColumnEntry::new(2, el(2))],
        );
        a.multiply_target_and_add(&ops, el(2), &b);
        // 2*(1,0,2) + (0,1,2) = (2,1,6) = (2,1,0)
        assert_eq!(a.get_content(&ops, 3), vec![2, 1, 0]);
    }

    #[test]
    fn test_swap_rows_resorts() {
        let ops = Z2;
        let mut a = col_z2(&[1, 2, 7]);
        a.swap_rows(&ops, 2, 9);
        assert_eq!(a.get_content(&ops, 10), vec![0, 1, 0, 0, 0, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn test_reorder() {
        let ops = Z2;
        let mut a = col_z2(&[0, 2]);
        // rotate rows 0 -> 1 -> 2 -> 0
        a.reorder(&ops, &[1, 2, 0]);
        assert_eq!(a.get_content(&ops, 3), vec![1, 1, 0]);
    }
}

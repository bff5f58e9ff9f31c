//! Ordered-map column.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::fields::FieldOperators;
use crate::RowIndex;

use super::{Column, ColumnEntry};

/// Entries kept in a `BTreeMap` keyed by row. Mutating a single entry is
/// logarithmic, which suits workloads dominated by `zero_entry`-style edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetColumn<E> {
    entries: BTreeMap<RowIndex, E>,
}

impl<E> Default for SetColumn<E> {
    fn default() -> Self {
        SetColumn {
            entries: BTreeMap::new(),
        }
    }
}

impl<E: Copy> SetColumn<E> {
    fn accumulate<F>(&mut self, ops: &F, row: RowIndex, coeff: E)
    where
        F: FieldOperators<Element = E>,
    {
        match self.entries.remove(&row) {
            None => {
                self.entries.insert(row, coeff);
            }
            Some(existing) => {
                if let Some(sum) = ops.add(existing, coeff) {
                    self.entries.insert(row, sum);
                }
            }
        }
    }
}

impl<F> Column<F> for SetColumn<F::Element>
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
        SetColumn {
            entries: entries.into_iter().map(|e| (e.row, e.coeff)).collect(),
        }
    }

    fn entries(&self, _ops: &F) -> Vec<ColumnEntry<F::Element>> {
        self.entries
            .iter()
            .map(|(&row, &coeff)| ColumnEntry { row, coeff })
            .collect()
    }

    fn is_non_zero(&self, _ops: &F, row: RowIndex) -> bool {
        self.entries.contains_key(&row)
    }

    fn is_empty(&self, _ops: &F) -> bool {
        self.entries.is_empty()
    }

    fn pivot(&self, _ops: &F) -> Option<RowIndex> {
        self.entries.last_key_value().map(|(&row, _)| row)
    }

    fn pivot_coeff(&self, _ops: &F) -> Option<F::Element> {
        self.entries.last_key_value().map(|(_, &coeff)| coeff)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn clear_row(&mut self, _ops: &F, row: RowIndex) {
        self.entries.remove(&row);
    }

    fn reorder(&mut self, _ops: &F, mapping: &[RowIndex]) {
        self.entries = self
            .entries
            .iter()
            .map(|(&row, &coeff)| (mapping[row], coeff))
            .collect();
    }

    fn swap_rows(&mut self, _ops: &F, r1: RowIndex, r2: RowIndex) {
        let e1 = self.entries.remove(&r1);
        let e2 = self.entries.remove(&r2);
        if let Some(coeff) = e1 {
            self.entries.insert(r2, coeff);
        }
        if let Some(coeff) = e2 {
            self.entries.insert(r1, coeff);
        }
    }

    fn add(&mut self, ops: &F, other: &Self) {
        for (&row, &coeff) in &other.entries {
            self.accumulate(ops, row, coeff);
        }
    }

    fn multiply_target_and_add(&mut self, ops: &F, coeff: F::Element, other: &Self) {
        self.scale(ops, coeff);
        self.add(ops, other);
    }

    fn multiply_source_and_add(&mut self, ops: &F, coeff: F::Element, other: &Self) {
        for (&row, &source) in &other.entries {
            if let Some(scaled) = ops.mul(source, coeff) {
                self.accumulate(ops, row, scaled);
            }
        }
    }

    fn scale(&mut self, ops: &F, coeff: F::Element) {
        self.entries = self
            .entries
            .iter()
            .filter_map(|(&row, &e)| ops.mul(e, coeff).map(|c| (row, c)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{PrimeField, Z2, Z2One};

    #[test]
    fn test_add_cancels() {
        let ops = Z2;
        let mut a: SetColumn<Z2One> = Column::<Z2>::from_sorted(
            &ops,
            [0, 1, 4].map(|r| ColumnEntry::new(r, Z2One)),
        );
        let b = Column::<Z2>::from_sorted(&ops, [1, 2].map(|r| ColumnEntry::new(r, Z2One)));
        a.add(&ops, &b);
        assert_eq!(a.get_content(&ops, 5), vec![1, 0, 1, 0, 1]);
        assert_eq!(a.pivot(&ops), Some(4));
    }

    #[test]
    fn test_clear_row() {
        let ops = Z2;
        let mut a: SetColumn<Z2One> =
            Column::<Z2>::from_sorted(&ops, [2, 3].map(|r| ColumnEntry::new(r, Z2One)));
        a.clear_row(&ops, 3);
        assert_eq!(a.pivot(&ops), Some(2));
        a.clear_row(&ops, 2);
        assert!(a.is_empty(&ops));
    }

    #[test]
    fn test_multiply_source_and_add_mod_7() {
        let ops = PrimeField::new(7).unwrap();
        let el = |v: i64| ops.from_value(v).unwrap();
        let mut a: SetColumn<_> = Column::<PrimeField>::from_sorted(
            &ops,
            vec![ColumnEntry::new(0, el(3))],
        );
        let b = Column::<PrimeField>::from_sorted(
            &ops,
            vec![ColumnEntry::new(0, el(2)), ColumnEntry::new(1, el(5))],
        );
        a.multiply_source_and_add(&ops, el(2), &b);
        // 3 + 2*2 = 7 = 0; 0 + 2*5 = 10 = 3
        assert_eq!(a.get_content(&ops, 2), vec![0, 3]);
    }
}

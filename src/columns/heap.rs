//! Lazy binary-heap column.

use std::collections::{BinaryHeap, BTreeMap};
use std::fmt::Debug;

use crate::fields::FieldOperators;
use crate::RowIndex;

use super::{Column, ColumnEntry};

/// Heap entries are ordered by row alone; coefficients of equal rows are
/// coalesced lazily.
#[derive(Debug, Clone)]
struct HeapEntry<E>(ColumnEntry<E>);

impl<E> PartialEq for HeapEntry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.0.row == other.0.row
    }
}

impl<E> Eq for HeapEntry<E> {}

impl<E> PartialOrd for HeapEntry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for HeapEntry<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.row.cmp(&other.0.row)
    }
}

/// Additions push the source entries onto a max-heap and defer cancellation
/// until the content is demanded, which makes long chains of additions cheap.
/// The buffer is compacted once it outgrows twice its last canonical size.
#[derive(Debug, Clone)]
pub struct HeapColumn<E> {
    heap: BinaryHeap<HeapEntry<E>>,
    compacted_len: usize,
}

impl<E> Default for HeapColumn<E> {
    fn default() -> Self {
        HeapColumn {
            heap: BinaryHeap::new(),
            compacted_len: 0,
        }
    }
}

impl<E: Copy> HeapColumn<E> {
    fn net<F>(&self, ops: &F) -> BTreeMap<RowIndex, E>
    where
        F: FieldOperators<Element = E>,
    {
        let mut net: BTreeMap<RowIndex, Option<E>> = BTreeMap::new();
        for entry in &self.heap {
            net.entry(entry.0.row)
                .and_modify(|acc| {
                    *acc = match *acc {
                        None => Some(entry.0.coeff),
                        Some(existing) => ops.add(existing, entry.0.coeff),
                    }
                })
                .or_insert(Some(entry.0.coeff));
        }
        net.into_iter()
            .filter_map(|(row, coeff)| Some(row).zip(coeff))
            .collect()
    }

    fn compact<F>(&mut self, ops: &F)
    where
        F: FieldOperators<Element = E>,
    {
        let net = self.net(ops);
        self.heap = net
            .into_iter()
            .map(|(row, coeff)| HeapEntry(ColumnEntry { row, coeff }))
            .collect();
        self.compacted_len = self.heap.len();
    }

    fn maybe_compact<F>(&mut self, ops: &F)
    where
        F: FieldOperators<Element = E>,
    {
        if self.heap.len() > 2 * self.compacted_len.max(8) {
            self.compact(ops);
        }
    }
}

impl<F> Column<F> for HeapColumn<F::Element>
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
        let heap: BinaryHeap<_> = entries.into_iter().map(HeapEntry).collect();
        let compacted_len = heap.len();
        HeapColumn {
            heap,
            compacted_len,
        }
    }

    fn entries(&self, ops: &F) -> Vec<ColumnEntry<F::Element>> {
        self.net(ops)
            .into_iter()
            .map(|(row, coeff)| ColumnEntry { row, coeff })
            .collect()
    }

    fn is_non_zero(&self, ops: &F, row: RowIndex) -> bool {
        let mut acc: Option<F::Element> = None;
        for entry in &self.heap {
            if entry.0.row == row {
                acc = match acc {
                    None => Some(entry.0.coeff),
                    Some(existing) => ops.add(existing, entry.0.coeff),
                };
            }
        }
        acc.is_some()
    }

    fn is_empty(&self, ops: &F) -> bool {
        self.heap.is_empty() || self.net(ops).is_empty()
    }

    fn pivot(&self, ops: &F) -> Option<RowIndex> {
        self.net(ops).last_key_value().map(|(&row, _)| row)
    }

    fn pivot_coeff(&self, ops: &F) -> Option<F::Element> {
        self.net(ops).last_key_value().map(|(_, &coeff)| coeff)
    }

    fn clear(&mut self) {
        self.heap.clear();
        self.compacted_len = 0;
    }

    fn clear_row(&mut self, _ops: &F, row: RowIndex) {
        self.heap.retain(|entry| entry.0.row != row);
    }

    fn reorder(&mut self, _ops: &F, mapping: &[RowIndex]) {
        self.heap = self
            .heap
            .iter()
            .map(|entry| {
                HeapEntry(ColumnEntry {
                    row: mapping[entry.0.row],
                    coeff: entry.0.coeff,
                })
            })
            .collect();
    }

    fn swap_rows(&mut self, _ops: &F, r1: RowIndex, r2: RowIndex) {
        self.heap = self
            .heap
            .iter()
            .map(|entry| {
                let row = if entry.0.row == r1 {
                    r2
                } else if entry.0.row == r2 {
                    r1
                } else {
                    entry.0.row
                };
                HeapEntry(ColumnEntry {
                    row,
                    coeff: entry.0.coeff,
                })
            })
            .collect();
    }

    fn add(&mut self, ops: &F, other: &Self) {
        for entry in other.entries(ops) {
            self.heap.push(HeapEntry(entry));
        }
        self.maybe_compact(ops);
    }

    fn multiply_target_and_add(&mut self, ops: &F, coeff: F::Element, other: &Self) {
        self.scale(ops, coeff);
        self.add(ops, other);
    }

    fn multiply_source_and_add(&mut self, ops: &F, coeff: F::Element, other: &Self) {
        for entry in other.entries(ops) {
            if let Some(scaled) = ops.mul(entry.coeff, coeff) {
                self.heap.push(HeapEntry(ColumnEntry {
                    row: entry.row,
                    coeff: scaled,
                }));
            }
        }
        self.maybe_compact(ops);
    }

    fn scale(&mut self, ops: &F, coeff: F::Element) {
        self.heap = self
            .heap
            .iter()
            .filter_map(|entry| {
                ops.mul(entry.0.coeff, coeff)
                    .map(|c| HeapEntry(ColumnEntry::new(entry.0.row, c)))
            })
            .collect();
    }
}

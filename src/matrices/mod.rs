//! Matrix layers: base container, `R = D·U` decomposition and chain matrix,
//! plus the pieces they share (barcode, row support).

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::columns::{Column, ColumnEntry};
use crate::fields::FieldOperators;
use crate::{ColIndex, Pos, RowIndex};

pub mod base;
pub mod chain;
pub mod overlay;
pub mod ru;
#[cfg(test)]
mod tests;

// ======== Barcode ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bar {
    pub dimension: usize,
    pub birth: Pos,
    /// `None` for an essential (still open) class.
    pub death: Option<Pos>,
}

/// Bars indexed by their endpoint positions.
///
/// Every position of the filtration is an endpoint of exactly one bar, so a
/// single map from positions to bars serves births and deaths alike. Vine
/// swaps only ever exchange the endpoints sitting at two adjacent positions.
#[derive(Debug, Clone, Default)]
pub struct Barcode {
    bars: Vec<Bar>,
    endpoint_to_bar: FxHashMap<Pos, usize>,
}

impl Barcode {
    /// Bars sorted by dimension, then birth, then death.
    pub fn bars(&self) -> Vec<Bar> {
        let mut bars = self.bars.clone();
        bars.sort_unstable();
        bars
    }

    pub fn bar_at(&self, endpoint: Pos) -> Option<&Bar> {
        self.endpoint_to_bar.get(&endpoint).map(|&idx| &self.bars[idx])
    }

    pub(crate) fn open(&mut self, dimension: usize, birth: Pos) {
        self.endpoint_to_bar.insert(birth, self.bars.len());
        self.bars.push(Bar {
            dimension,
            birth,
            death: None,
        });
    }

    pub(crate) fn close(&mut self, birth: Pos, death: Pos) {
        if let Some(&idx) = self.endpoint_to_bar.get(&birth) {
            self.bars[idx].death = Some(death);
            self.endpoint_to_bar.insert(death, idx);
        }
    }

    /// Forget the endpoint at `pos`: a death reopens its bar, a birth removes
    /// the (necessarily open) bar. Used when the last position is removed.
    pub(crate) fn drop_endpoint(&mut self, pos: Pos) {
        let Some(idx) = self.endpoint_to_bar.remove(&pos) else {
            return;
        };
        if self.bars[idx].death == Some(pos) {
            self.bars[idx].death = None;
            return;
        }
        debug_assert_eq!(self.bars[idx].birth, pos);
        debug_assert_eq!(self.bars[idx].death, None);
        self.bars.swap_remove(idx);
        if idx < self.bars.len() {
            // rebind the endpoints of the bar that moved into the hole
            let moved = self.bars[idx];
            self.endpoint_to_bar.insert(moved.birth, idx);
            if let Some(death) = moved.death {
                self.endpoint_to_bar.insert(death, idx);
            }
        }
    }

    /// Exchange whatever endpoints sit at `p1` and `p2` between their bars.
    pub(crate) fn transpose_endpoints(&mut self, p1: Pos, p2: Pos) {
        let b1 = self.endpoint_to_bar.get(&p1).copied();
        let b2 = self.endpoint_to_bar.get(&p2).copied();
        if let Some(idx) = b1 {
            self.relabel(idx, p1, p2);
        }
        if let Some(idx) = b2 {
            self.relabel(idx, p2, p1);
        }
        match (b1, b2) {
            (Some(i1), Some(i2)) => {
                self.endpoint_to_bar.insert(p1, i2);
                self.endpoint_to_bar.insert(p2, i1);
            }
            (Some(i1), None) => {
                self.endpoint_to_bar.remove(&p1);
                self.endpoint_to_bar.insert(p2, i1);
            }
            (None, Some(i2)) => {
                self.endpoint_to_bar.remove(&p2);
                self.endpoint_to_bar.insert(p1, i2);
            }
            (None, None) => {}
        }
    }

    fn relabel(&mut self, idx: usize, from: Pos, to: Pos) {
        let bar = &mut self.bars[idx];
        if bar.death == Some(from) {
            bar.death = Some(to);
        } else {
            debug_assert_eq!(bar.birth, from);
            bar.birth = to;
        }
    }
}

// ======== Row support ========================================

/// Which columns touch each row. Maintained by the matrix layer: mutations go
/// through an unlink / mutate / relink cycle so the index never holds stale
/// entries. Replaces intrusive per-entry row lists with plain index sets.
#[derive(Debug, Clone, Default)]
pub struct RowSupport {
    rows: FxHashMap<RowIndex, BTreeSet<ColIndex>>,
}

impl RowSupport {
    pub(crate) fn link(&mut self, col: ColIndex, rows: impl IntoIterator<Item = RowIndex>) {
        for row in rows {
            self.rows.entry(row).or_default().insert(col);
        }
    }

    pub(crate) fn unlink(&mut self, col: ColIndex, rows: impl IntoIterator<Item = RowIndex>) {
        for row in rows {
            if let Some(set) = self.rows.get_mut(&row) {
                set.remove(&col);
                if set.is_empty() {
                    self.rows.remove(&row);
                }
            }
        }
    }

    pub(crate) fn columns_on(&self, row: RowIndex) -> impl Iterator<Item = ColIndex> + '_ {
        self.rows.get(&row).into_iter().flatten().copied()
    }

    pub(crate) fn has_row(&self, row: RowIndex) -> bool {
        self.rows.contains_key(&row)
    }

    /// Swap the buckets of two rows (the columns themselves are relabelled by
    /// the caller).
    pub(crate) fn swap_rows(&mut self, r1: RowIndex, r2: RowIndex) {
        let s1 = self.rows.remove(&r1);
        let s2 = self.rows.remove(&r2);
        if let Some(set) = s1 {
            self.rows.insert(r2, set);
        }
        if let Some(set) = s2 {
            self.rows.insert(r1, set);
        }
    }

    pub(crate) fn erase_row(&mut self, row: RowIndex) {
        self.rows.remove(&row);
    }
}

// ======== Boundary input =====================================

/// Turn user-facing `(row, value)` pairs into sorted non-zero entries.
pub(crate) fn boundary_entries<F: FieldOperators>(
    ops: &F,
    boundary: &[(RowIndex, i64)],
) -> Vec<ColumnEntry<F::Element>> {
    let mut entries: Vec<_> = boundary
        .iter()
        .filter_map(|&(row, value)| Some(row).zip(ops.from_value(value)))
        .map(|(row, coeff)| ColumnEntry::new(row, coeff))
        .collect();
    entries.sort_unstable_by_key(|e| e.row);
    entries
}

/// `column(ops, row)` lookup used by `get_row` implementations.
pub(crate) fn row_entries<'a, F, C>(
    ops: &'a F,
    support: &'a RowSupport,
    row: RowIndex,
    column: impl Fn(ColIndex) -> &'a C + 'a,
) -> Vec<(ColIndex, F::Element)>
where
    F: FieldOperators,
    C: Column<F> + 'a,
{
    support
        .columns_on(row)
        .filter_map(|col| {
            column(col)
                .entries(ops)
                .into_iter()
                .find(|e| e.row == row)
                .map(|e| (col, e.coeff))
        })
        .collect()
}

#[cfg(test)]
mod barcode_tests {
    use super::*;

    #[test]
    fn test_open_close_and_reopen() {
        let mut barcode = Barcode::default();
        barcode.open(0, 0);
        barcode.open(0, 1);
        barcode.close(1, 2);
        assert_eq!(
            barcode.bars(),
            vec![
                Bar { dimension: 0, birth: 0, death: None },
                Bar { dimension: 0, birth: 1, death: Some(2) },
            ]
        );
        barcode.drop_endpoint(2);
        assert_eq!(barcode.bar_at(1).unwrap().death, None);
    }

    #[test]
    fn test_drop_open_bar() {
        let mut barcode = Barcode::default();
        barcode.open(0, 0);
        barcode.open(1, 1);
        barcode.drop_endpoint(1);
        assert_eq!(barcode.bars().len(), 1);
        assert!(barcode.bar_at(1).is_none());
    }

    #[test]
    fn test_transpose_mixed_endpoints() {
        let mut barcode = Barcode::default();
        barcode.open(0, 0);
        barcode.open(0, 1);
        barcode.close(0, 2);
        // birth at 1, death at 2
        barcode.transpose_endpoints(1, 2);
        assert_eq!(barcode.bar_at(2).map(|b| b.birth), Some(2));
        assert_eq!(barcode.bar_at(1).and_then(|b| b.death), Some(1));
    }
}

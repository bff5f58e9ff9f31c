//! Reduced boundary decomposition `R = D·U`.
//!
//! Columns are indexed by filtration position. `R` starts as the boundary
//! matrix `D` and is reduced on insertion; `U` starts as the identity and
//! records every column operation, so the decomposition holds at all times.
//! Keeping `U` is what makes vineyard updates and representative cycles
//! possible.
//!
//! Rows of both matrices are position indices as well; a vine swap physically
//! transposes the two columns and the two rows of `R` and `U`.

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::columns::{Column, ColumnEntry, VecColumn};
use crate::fields::FieldOperators;
use crate::{ColIndex, Pos, RowIndex, VineaError};

use super::{boundary_entries, row_entries, Bar, Barcode, RowSupport};

pub struct RuMatrix<F, C = VecColumn<<F as FieldOperators>::Element>>
where
    F: FieldOperators,
    C: Column<F>,
{
    ops: F,
    r: Vec<C>,
    u: Vec<C>,
    dimensions: Vec<usize>,
    // pivot row -> column owning it; the owner is the death of the row's bar
    pivot_to_column: FxHashMap<RowIndex, ColIndex>,
    barcode: Barcode,
    r_rows: RowSupport,
    u_rows: RowSupport,
    cycles: FxHashMap<Pos, Vec<ColumnEntry<F::Element>>>,
}

impl<F, C> RuMatrix<F, C>
where
    F: FieldOperators,
    C: Column<F>,
{
    pub fn new(ops: F) -> Self {
        RuMatrix {
            ops,
            r: Vec::new(),
            u: Vec::new(),
            dimensions: Vec::new(),
            pivot_to_column: FxHashMap::default(),
            barcode: Barcode::default(),
            r_rows: RowSupport::default(),
            u_rows: RowSupport::default(),
            cycles: FxHashMap::default(),
        }
    }

    pub fn ops(&self) -> &F {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    pub fn dimension(&self, pos: Pos) -> Result<usize, VineaError> {
        self.dimensions
            .get(pos)
            .copied()
            .ok_or(VineaError::ColumnNotFound(pos))
    }

    pub fn max_dimension(&self) -> Option<usize> {
        self.dimensions.iter().copied().max()
    }

    pub fn barcode(&self) -> Vec<Bar> {
        self.barcode.bars()
    }

    pub fn bar_at(&self, endpoint: Pos) -> Option<&Bar> {
        self.barcode.bar_at(endpoint)
    }

    /// Append and reduce a boundary column; rows are current positions. The
    /// dimension is one less than the entry count (0 for an empty boundary).
    pub fn insert_boundary(&mut self, boundary: &[(Pos, i64)]) -> Result<Pos, VineaError> {
        let dim = boundary.len().saturating_sub(1);
        self.insert_boundary_in_dimension(boundary, dim)
    }

    pub fn insert_boundary_in_dimension(
        &mut self,
        boundary: &[(Pos, i64)],
        dimension: usize,
    ) -> Result<Pos, VineaError> {
        let pos = self.r.len();
        let mut r_col = C::from_sorted(&self.ops, boundary_entries(&self.ops, boundary));
        let mut u_col = C::from_sorted(
            &self.ops,
            std::iter::once(ColumnEntry::new(pos, self.ops.one())),
        );

        while let Some(pivot) = r_col.pivot(&self.ops) {
            let Some(&owner) = self.pivot_to_column.get(&pivot) else {
                break;
            };
            let coeff = self.reducing_coeff(&r_col, owner)?;
            r_col.multiply_source_and_add(&self.ops, coeff, &self.r[owner]);
            u_col.multiply_source_and_add(&self.ops, coeff, &self.u[owner]);
            if r_col.pivot(&self.ops) == Some(pivot) {
                // the pivot resisted elimination (multi-field zero divisor)
                return Err(VineaError::NonInvertible(self.ops.characteristic()));
            }
        }

        match r_col.pivot(&self.ops) {
            Some(pivot) => {
                debug!("column {pos} reduced with pivot {pivot}");
                self.pivot_to_column.insert(pivot, pos);
                self.barcode.close(pivot, pos);
            }
            None => {
                debug!("column {pos} reduced to zero, class born");
                self.barcode.open(dimension, pos);
            }
        }

        self.r_rows
            .link(pos, r_col.entries(&self.ops).iter().map(|e| e.row));
        self.u_rows
            .link(pos, u_col.entries(&self.ops).iter().map(|e| e.row));
        self.r.push(r_col);
        self.u.push(u_col);
        self.dimensions.push(dimension);
        Ok(pos)
    }

    pub fn get_column(&self, pos: Pos) -> Result<&C, VineaError> {
        self.r.get(pos).ok_or(VineaError::ColumnNotFound(pos))
    }

    pub fn get_column_u(&self, pos: Pos) -> Result<&C, VineaError> {
        self.u.get(pos).ok_or(VineaError::ColumnNotFound(pos))
    }

    pub fn get_row(&self, row: RowIndex) -> Result<Vec<(ColIndex, F::Element)>, VineaError> {
        if !self.r_rows.has_row(row) {
            return Err(VineaError::RowNotFound(row));
        }
        Ok(row_entries(&self.ops, &self.r_rows, row, |c| &self.r[c]))
    }

    pub fn get_pivot(&self, pos: Pos) -> Result<Option<RowIndex>, VineaError> {
        Ok(self.get_column(pos)?.pivot(&self.ops))
    }

    /// The column currently owning `row` as its pivot, if any.
    pub fn column_with_pivot(&self, row: RowIndex) -> Option<ColIndex> {
        self.pivot_to_column.get(&row).copied()
    }

    pub fn is_zero_column(&self, pos: Pos) -> Result<bool, VineaError> {
        Ok(self.get_column(pos)?.is_empty(&self.ops))
    }

    // ======== Vine swaps =====================================

    /// Transpose the faces at positions `i` and `i + 1`, updating the
    /// decomposition and the barcode. The caller guarantees the transposed
    /// filtration is still valid (no face/coface pair is swapped).
    pub fn vine_swap(&mut self, i: Pos) -> Result<(), VineaError> {
        if i + 1 >= self.r.len() {
            return Err(VineaError::NonAdjacentSwap(i, i + 1));
        }
        let positive_i = self.r[i].is_empty(&self.ops);
        let positive_i1 = self.r[i + 1].is_empty(&self.ops);
        match (positive_i, positive_i1) {
            (true, true) => self.swap_positive_positive(i),
            (false, false) => self.swap_negative_negative(i),
            (true, false) => self.swap_positive_negative(i),
            (false, true) => self.swap_negative_positive(i),
        }
    }

    fn swap_positive_positive(&mut self, i: Pos) -> Result<(), VineaError> {
        trace!("vine swap at {i}: positive/positive");
        if let Some(e) = self.u_entry(i, i + 1) {
            // a U-only addition zeroes U[i][i+1]; R columns are zero anyway
            let coeff = self.u_elimination_coeff(e, i)?;
            self.add_multiple_u_only(coeff, i, i + 1);
        }
        let k = self.pivot_to_column.get(&i).copied();
        let l = self.pivot_to_column.get(&(i + 1)).copied();
        let l_has_i = l.is_some_and(|l| self.r[l].is_non_zero(&self.ops, i));
        match (k, l) {
            (Some(k), Some(l)) if l_has_i => {
                if k < l {
                    // clear R[i][l] with column k before transposing
                    let coeff = self.r_elimination_coeff(l, i, k)?;
                    self.add_multiple(coeff, k, l);
                    self.transpose_positions(i);
                    self.swap_pivot_rows(i, i + 1);
                    self.barcode.transpose_endpoints(i, i + 1);
                } else {
                    // transpose first, then clear the pivot conflict with l;
                    // the pairing is untouched
                    self.transpose_positions(i);
                    let coeff = self.r_elimination_coeff(k, i + 1, l)?;
                    self.add_multiple(coeff, l, k);
                }
            }
            (None, Some(_)) if l_has_i => {
                // l keeps its pivot at the larger position; nothing pairs here
                self.transpose_positions(i);
            }
            _ => {
                self.transpose_positions(i);
                self.swap_pivot_rows(i, i + 1);
                self.barcode.transpose_endpoints(i, i + 1);
            }
        }
        Ok(())
    }

    fn swap_negative_negative(&mut self, i: Pos) -> Result<(), VineaError> {
        trace!("vine swap at {i}: negative/negative");
        let (Some(r1), Some(r2)) = (self.r[i].pivot(&self.ops), self.r[i + 1].pivot(&self.ops))
        else {
            return Ok(());
        };
        if let Some(e) = self.u_entry(i, i + 1) {
            let coeff = self.u_elimination_coeff(e, i)?;
            self.add_multiple(coeff, i, i + 1);
            if r1 < r2 {
                self.transpose_positions(i);
                self.swap_pivot_values(r1, r2);
                self.barcode.transpose_endpoints(i, i + 1);
            } else {
                // the addition moved the pivot conflict onto r1; transpose,
                // then a second addition restores reducedness
                self.transpose_positions(i);
                let coeff = self.r_elimination_coeff(i + 1, r1, i)?;
                self.add_multiple(coeff, i, i + 1);
                self.pivot_to_column.insert(r1, i);
                self.pivot_to_column.insert(r2, i + 1);
            }
        } else {
            self.transpose_positions(i);
            self.swap_pivot_values(r1, r2);
            self.barcode.transpose_endpoints(i, i + 1);
        }
        Ok(())
    }

    fn swap_positive_negative(&mut self, i: Pos) -> Result<(), VineaError> {
        trace!("vine swap at {i}: positive/negative");
        debug_assert_ne!(self.r[i + 1].pivot(&self.ops), Some(i), "face/coface swap");
        if let Some(e) = self.u_entry(i, i + 1) {
            let coeff = self.u_elimination_coeff(e, i)?;
            self.add_multiple_u_only(coeff, i, i + 1);
        }
        let r2 = self.r[i + 1].pivot(&self.ops);
        self.transpose_positions(i);
        self.swap_pivot_rows(i, i + 1);
        if let Some(r2) = r2 {
            self.pivot_to_column.insert(r2, i);
        }
        self.barcode.transpose_endpoints(i, i + 1);
        Ok(())
    }

    fn swap_negative_positive(&mut self, i: Pos) -> Result<(), VineaError> {
        trace!("vine swap at {i}: negative/positive");
        let r1 = self.r[i].pivot(&self.ops);
        if let Some(e) = self.u_entry(i, i + 1) {
            // the two classes interact: after the transposition the death
            // transfers to the other face and the barcode stays put
            let coeff = self.u_elimination_coeff(e, i)?;
            self.add_multiple(coeff, i, i + 1);
            self.transpose_positions(i);
            let pivot = self.r[i].pivot(&self.ops).ok_or_else(|| {
                VineaError::NonInvertible(self.ops.characteristic())
            })?;
            let coeff = self.r_elimination_coeff(i + 1, pivot, i)?;
            self.add_multiple(coeff, i, i + 1);
            debug_assert!(self.r[i + 1].is_empty(&self.ops));
            if let Some(r1) = r1 {
                self.pivot_to_column.insert(r1, i);
            }
        } else {
            self.transpose_positions(i);
            self.swap_pivot_rows(i, i + 1);
            if let Some(r1) = r1 {
                self.pivot_to_column.insert(r1, i + 1);
            }
            self.barcode.transpose_endpoints(i, i + 1);
        }
        Ok(())
    }

    /// Physically swap columns and rows `i`, `i + 1` of both `R` and `U`.
    /// Pivot bookkeeping is left to the caller.
    fn transpose_positions(&mut self, i: Pos) {
        self.unlink(i);
        self.unlink(i + 1);
        self.r.swap(i, i + 1);
        self.u.swap(i, i + 1);
        self.dimensions.swap(i, i + 1);
        // relabel rows i and i+1 in every column touching them, then swap
        // the two row buckets wholesale
        let mut affected: Vec<ColIndex> = self
            .r_rows
            .columns_on(i)
            .chain(self.r_rows.columns_on(i + 1))
            .collect();
        affected.sort_unstable();
        affected.dedup();
        for col in affected {
            self.r[col].swap_rows(&self.ops, i, i + 1);
        }
        self.r_rows.swap_rows(i, i + 1);
        let mut affected: Vec<ColIndex> = self
            .u_rows
            .columns_on(i)
            .chain(self.u_rows.columns_on(i + 1))
            .collect();
        affected.sort_unstable();
        affected.dedup();
        for col in affected {
            self.u[col].swap_rows(&self.ops, i, i + 1);
        }
        self.u_rows.swap_rows(i, i + 1);
        // the two swapped columns are unlinked, so the loops above missed
        // them; their own entries (the U diagonals in particular) relabel too
        for col in [i, i + 1] {
            self.r[col].swap_rows(&self.ops, i, i + 1);
            self.u[col].swap_rows(&self.ops, i, i + 1);
        }
        self.link(i);
        self.link(i + 1);
    }

    /// Rows `r1` and `r2` exchange their owning columns in the pivot map.
    fn swap_pivot_rows(&mut self, r1: RowIndex, r2: RowIndex) {
        let a = self.pivot_to_column.remove(&r1);
        let b = self.pivot_to_column.remove(&r2);
        if let Some(owner) = a {
            self.pivot_to_column.insert(r2, owner);
        }
        if let Some(owner) = b {
            self.pivot_to_column.insert(r1, owner);
        }
    }

    /// Rows `r1` and `r2` keep their identity but their owners swapped place.
    fn swap_pivot_values(&mut self, r1: RowIndex, r2: RowIndex) {
        let a = self.pivot_to_column.get(&r1).copied();
        let b = self.pivot_to_column.get(&r2).copied();
        if let (Some(a), Some(b)) = (a, b) {
            self.pivot_to_column.insert(r1, b);
            self.pivot_to_column.insert(r2, a);
        }
    }

    // ======== Removal ========================================

    /// Remove the column at the last position. An open bar born there
    /// disappears; a death there reopens its bar.
    pub fn remove_last(&mut self) -> Result<(), VineaError> {
        let pos = self
            .r
            .len()
            .checked_sub(1)
            .ok_or(VineaError::ColumnNotFound(0))?;
        if let Some(pivot) = self.r[pos].pivot(&self.ops) {
            self.pivot_to_column.remove(&pivot);
        }
        self.barcode.drop_endpoint(pos);
        self.unlink(pos);
        self.r.pop();
        self.u.pop();
        self.dimensions.pop();
        self.cycles.clear();
        Ok(())
    }

    // ======== Representative cycles ==========================

    /// Recompute the cycle representatives. A position with a zero `R`
    /// column is a cycle, and its `U` column spells it out: `D·u = 0`.
    pub fn update_representative_cycles(&mut self) {
        self.cycles.clear();
        for pos in 0..self.r.len() {
            if self.r[pos].is_empty(&self.ops) {
                self.cycles.insert(pos, self.u[pos].entries(&self.ops));
            }
        }
    }

    /// Representative of the class born at `bar.birth`. Call
    /// [`update_representative_cycles`](Self::update_representative_cycles)
    /// after any mutation first.
    pub fn representative_cycle(
        &self,
        bar: &Bar,
    ) -> Result<&[ColumnEntry<F::Element>], VineaError> {
        self.cycles
            .get(&bar.birth)
            .map(Vec::as_slice)
            .ok_or(VineaError::ColumnNotFound(bar.birth))
    }

    /// All current representatives, ordered by birth position.
    pub fn representative_cycles(&self) -> Vec<&[ColumnEntry<F::Element>]> {
        let mut cycles: Vec<_> = self
            .cycles
            .iter()
            .map(|(&birth, cycle)| (birth, cycle.as_slice()))
            .collect();
        cycles.sort_unstable_by_key(|&(birth, _)| birth);
        cycles.into_iter().map(|(_, cycle)| cycle).collect()
    }

    // ======== Internals ======================================

    /// Coefficient `c` such that adding `c * r[owner]` cancels the pivot of
    /// `col`.
    fn reducing_coeff(&self, col: &C, owner: ColIndex) -> Result<F::Element, VineaError> {
        let non_invertible = || VineaError::NonInvertible(self.ops.characteristic());
        let e = col.pivot_coeff(&self.ops).ok_or_else(non_invertible)?;
        let b = self.r[owner].pivot_coeff(&self.ops).ok_or_else(non_invertible)?;
        let inv = self.ops.inverse(b)?;
        self.ops
            .mul(self.ops.negate(e), inv)
            .ok_or_else(non_invertible)
    }

    /// Coefficient clearing `R[row][target]` with column `source` (whose
    /// pivot sits at `row`).
    fn r_elimination_coeff(
        &self,
        target: ColIndex,
        row: RowIndex,
        source: ColIndex,
    ) -> Result<F::Element, VineaError> {
        let non_invertible = || VineaError::NonInvertible(self.ops.characteristic());
        let e = self
            .entry_of(&self.r[target], row)
            .ok_or_else(non_invertible)?;
        let b = self
            .entry_of(&self.r[source], row)
            .ok_or_else(non_invertible)?;
        let inv = self.ops.inverse(b)?;
        self.ops
            .mul(self.ops.negate(e), inv)
            .ok_or_else(non_invertible)
    }

    /// Coefficient clearing `U[i][i+1]` with column `i` (unit diagonal).
    fn u_elimination_coeff(&self, e: F::Element, i: Pos) -> Result<F::Element, VineaError> {
        let non_invertible = || VineaError::NonInvertible(self.ops.characteristic());
        let diag = self.entry_of(&self.u[i], i).ok_or_else(non_invertible)?;
        let inv = self.ops.inverse(diag)?;
        self.ops
            .mul(self.ops.negate(e), inv)
            .ok_or_else(non_invertible)
    }

    fn entry_of(&self, col: &C, row: RowIndex) -> Option<F::Element> {
        col.entries(&self.ops)
            .into_iter()
            .find(|entry| entry.row == row)
            .map(|entry| entry.coeff)
    }

    fn u_entry(&self, row: RowIndex, col: ColIndex) -> Option<F::Element> {
        self.entry_of(&self.u[col], row)
    }

    /// `r[target] += c * r[source]` mirrored on `U`.
    fn add_multiple(&mut self, coeff: F::Element, source: ColIndex, target: ColIndex) {
        let source_r = self.r[source].clone();
        let source_u = self.u[source].clone();
        self.r_rows.unlink(
            target,
            self.r[target].entries(&self.ops).iter().map(|e| e.row),
        );
        self.r[target].multiply_source_and_add(&self.ops, coeff, &source_r);
        self.r_rows.link(
            target,
            self.r[target].entries(&self.ops).iter().map(|e| e.row),
        );
        self.u_rows.unlink(
            target,
            self.u[target].entries(&self.ops).iter().map(|e| e.row),
        );
        self.u[target].multiply_source_and_add(&self.ops, coeff, &source_u);
        self.u_rows.link(
            target,
            self.u[target].entries(&self.ops).iter().map(|e| e.row),
        );
    }

    /// `u[target] += c * u[source]`, leaving `R` alone.
    fn add_multiple_u_only(&mut self, coeff: F::Element, source: ColIndex, target: ColIndex) {
        let source_u = self.u[source].clone();
        self.u_rows.unlink(
            target,
            self.u[target].entries(&self.ops).iter().map(|e| e.row),
        );
        self.u[target].multiply_source_and_add(&self.ops, coeff, &source_u);
        self.u_rows.link(
            target,
            self.u[target].entries(&self.ops).iter().map(|e| e.row),
        );
    }

    fn unlink(&mut self, col: ColIndex) {
        self.r_rows
            .unlink(col, self.r[col].entries(&self.ops).iter().map(|e| e.row));
        self.u_rows
            .unlink(col, self.u[col].entries(&self.ops).iter().map(|e| e.row));
    }

    fn link(&mut self, col: ColIndex) {
        self.r_rows
            .link(col, self.r[col].entries(&self.ops).iter().map(|e| e.row));
        self.u_rows
            .link(col, self.u[col].entries(&self.ops).iter().map(|e| e.row));
    }
}

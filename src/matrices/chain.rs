//! Chain matrix: a compatible basis of the chain complex.
//!
//! Every column is a chain, identified by its pivot: the face id whose
//! position is maximal among the rows of the column. Pivots and columns are
//! in bijection at all times. Columns come in three roles: `F` (essential
//! cycles), `G` (cycles closed by a later chain) and `H` (chains whose
//! boundary is their paired `G` column).
//!
//! Rows are stable face identifiers; vine swaps only permute the positions
//! attached to the ids, never the stored columns' row indices.

use std::collections::BTreeMap;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::columns::{Column, ColumnEntry, VecColumn};
use crate::fields::FieldOperators;
use crate::{ColIndex, Pos, RowIndex, VineaError};

use super::{boundary_entries, row_entries, Bar, Barcode, RowSupport};

struct ChainColumn<C> {
    column: C,
    pivot: RowIndex,
    paired_with: Option<ColIndex>,
    dimension: usize,
}

pub struct ChainMatrix<F, C = VecColumn<<F as FieldOperators>::Element>>
where
    F: FieldOperators,
    C: Column<F>,
{
    ops: F,
    columns: FxHashMap<ColIndex, ChainColumn<C>>,
    next_index: ColIndex,
    next_id: RowIndex,
    pivot_to_column: FxHashMap<RowIndex, ColIndex>,
    pivot_to_position: FxHashMap<RowIndex, Pos>,
    position_to_pivot: Vec<RowIndex>,
    dimension_counts: Vec<usize>,
    barcode: Barcode,
    rows: Option<RowSupport>,
    // positions compared through these when deciding dependent swaps
    birth_cmp: Box<dyn Fn(Pos, Pos) -> bool>,
    death_cmp: Box<dyn Fn(Pos, Pos) -> bool>,
    cycles: FxHashMap<Pos, Vec<ColumnEntry<F::Element>>>,
}

impl<F, C> ChainMatrix<F, C>
where
    F: FieldOperators,
    C: Column<F>,
{
    pub fn new(ops: F) -> Self {
        ChainMatrix {
            ops,
            columns: FxHashMap::default(),
            next_index: 0,
            next_id: 0,
            pivot_to_column: FxHashMap::default(),
            pivot_to_position: FxHashMap::default(),
            position_to_pivot: Vec::new(),
            dimension_counts: Vec::new(),
            barcode: Barcode::default(),
            rows: None,
            birth_cmp: Box::new(|a, b| a < b),
            death_cmp: Box::new(|a, b| a < b),
            cycles: FxHashMap::default(),
        }
    }

    /// Enable `get_row`. Must be chosen before any insertion.
    pub fn with_row_access(mut self) -> Self {
        self.rows = Some(RowSupport::default());
        self
    }

    /// Override the positional birth/death orders used to resolve dependent
    /// vine swaps (e.g. to compare underlying filtration values).
    pub fn with_comparators(
        mut self,
        birth: impl Fn(Pos, Pos) -> bool + 'static,
        death: impl Fn(Pos, Pos) -> bool + 'static,
    ) -> Self {
        self.birth_cmp = Box::new(birth);
        self.death_cmp = Box::new(death);
        self
    }

    pub fn ops(&self) -> &F {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.position_to_pivot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position_to_pivot.is_empty()
    }

    pub fn barcode(&self) -> Vec<Bar> {
        self.barcode.bars()
    }

    pub fn bar_at(&self, endpoint: Pos) -> Option<&Bar> {
        self.barcode.bar_at(endpoint)
    }

    pub fn position_of(&self, id: RowIndex) -> Result<Pos, VineaError> {
        self.pivot_to_position
            .get(&id)
            .copied()
            .ok_or(VineaError::ColumnNotFound(id))
    }

    pub fn id_at_position(&self, pos: Pos) -> Result<RowIndex, VineaError> {
        self.position_to_pivot
            .get(pos)
            .copied()
            .ok_or(VineaError::ColumnNotFound(pos))
    }

    pub fn dimension(&self, id: RowIndex) -> Result<usize, VineaError> {
        Ok(self.record(id)?.dimension)
    }

    pub fn max_dimension(&self) -> Option<usize> {
        self.dimension_counts
            .iter()
            .rposition(|&count| count > 0)
    }

    /// The chain whose pivot is `id`.
    pub fn get_column(&self, id: RowIndex) -> Result<&C, VineaError> {
        Ok(&self.record(id)?.column)
    }

    pub fn is_paired(&self, id: RowIndex) -> Result<bool, VineaError> {
        Ok(self.record(id)?.paired_with.is_some())
    }

    pub fn get_row(&self, row: RowIndex) -> Result<Vec<(ColIndex, F::Element)>, VineaError> {
        let support = self.rows.as_ref().ok_or(VineaError::RowAccessDisabled)?;
        if !support.has_row(row) {
            return Err(VineaError::RowNotFound(row));
        }
        Ok(row_entries(&self.ops, support, row, |c| {
            &self.columns[&c].column
        }))
    }

    // ======== Insertion ======================================

    /// Insert the boundary of the next face; rows are face ids. The face id
    /// is allocated consecutively and returned.
    pub fn insert_boundary(&mut self, boundary: &[(RowIndex, i64)]) -> Result<RowIndex, VineaError> {
        let id = self.next_id;
        let dim = boundary.len().saturating_sub(1);
        self.insert_boundary_in_dimension(id, boundary, dim)?;
        Ok(id)
    }

    /// Insert with an explicit face id; ids must be strictly increasing.
    pub fn insert_boundary_with_id(
        &mut self,
        id: RowIndex,
        boundary: &[(RowIndex, i64)],
    ) -> Result<(), VineaError> {
        let dim = boundary.len().saturating_sub(1);
        self.insert_boundary_in_dimension(id, boundary, dim)
    }

    pub fn insert_boundary_in_dimension(
        &mut self,
        id: RowIndex,
        boundary: &[(RowIndex, i64)],
        dimension: usize,
    ) -> Result<(), VineaError> {
        if id < self.next_id || self.pivot_to_position.contains_key(&id) {
            return Err(VineaError::DuplicateId(id));
        }
        let pos = self.position_to_pivot.len();

        // express the boundary in the current cycle basis
        let mut working: BTreeMap<RowIndex, F::Element> = BTreeMap::new();
        for entry in boundary_entries(&self.ops, boundary) {
            working.insert(entry.row, entry.coeff);
        }
        let mut chains_in_h: Vec<(ColIndex, F::Element)> = Vec::new();
        let mut chains_in_f: Vec<(ColIndex, F::Element)> = Vec::new();

        while let Some((&row, &e)) = working.last_key_value() {
            let owner = self
                .pivot_to_column
                .get(&row)
                .copied()
                .ok_or(VineaError::RowNotFound(row))?;
            let coeff = self.cancel_coeff(e, self.entry_of(owner, row))?;
            let entries = self.columns[&owner].column.entries(&self.ops);
            accumulate(&self.ops, &mut working, coeff, &entries);
            if working.last_key_value().map(|(&r, _)| r) == Some(row) {
                return Err(VineaError::NonInvertible(self.ops.characteristic()));
            }
            match self.columns[&owner].paired_with {
                // a closed cycle: remember its bounding chain
                Some(partner) => chains_in_h.push((partner, coeff)),
                // an essential cycle: remember it with the opposite sign
                None => chains_in_f.push((owner, self.ops.negate(coeff))),
            }
        }

        // the new chain is the face plus the bounding chains consumed above
        let mut new_chain: BTreeMap<RowIndex, F::Element> = BTreeMap::new();
        new_chain.insert(id, self.ops.one());
        for &(h, coeff) in &chains_in_h {
            let entries = self.columns[&h].column.entries(&self.ops);
            accumulate(&self.ops, &mut new_chain, coeff, &entries);
        }
        debug_assert_eq!(new_chain.last_key_value().map(|(&r, _)| r), Some(id));
        let column = C::from_sorted(
            &self.ops,
            new_chain
                .into_iter()
                .map(|(row, coeff)| ColumnEntry::new(row, coeff)),
        );

        // the other consumed cycles have strictly smaller pivots, so the
        // combination below keeps fp's pivot iff scaling by fp_coeff keeps
        // its coefficient non-zero; check before touching any state
        if let Some(&(fp, fp_coeff)) = chains_in_f.first() {
            let fp_pivot = self.columns[&fp].pivot;
            let kept = self
                .entry_of(fp, fp_pivot)
                .and_then(|b| self.ops.mul(fp_coeff, b));
            if kept.is_none() {
                return Err(VineaError::NonInvertible(self.ops.characteristic()));
            }
        }

        self.position_to_pivot.push(id);
        self.pivot_to_position.insert(id, pos);
        self.next_id = id + 1;

        let paired_with = match chains_in_f.first().copied() {
            None => {
                debug!("face {id} opens a class in dimension {dimension}");
                self.barcode.open(dimension, pos);
                None
            }
            Some((fp, fp_coeff)) => {
                // the first essential cycle consumed owns the youngest birth;
                // it absorbs the others and becomes the new column's partner
                let birth = self.pivot_to_position[&self.columns[&fp].pivot];
                debug!("face {id} closes the class born at position {birth}");
                self.mutate(fp, |ops, col| col.scale(ops, fp_coeff));
                for &(f, coeff) in &chains_in_f[1..] {
                    let source = self.columns[&f].column.clone();
                    self.mutate(fp, |ops, col| {
                        col.multiply_source_and_add(ops, coeff, &source)
                    });
                }
                let fp_pivot = self.columns[&fp].pivot;
                debug_assert!(self.columns[&fp].column.is_non_zero(&self.ops, fp_pivot));
                self.barcode.close(birth, pos);
                Some(fp)
            }
        };

        let index = self.next_index;
        self.next_index += 1;
        if let Some(rows) = &mut self.rows {
            rows.link(index, column.entries(&self.ops).iter().map(|e| e.row));
        }
        if let Some(fp) = paired_with {
            if let Some(record) = self.columns.get_mut(&fp) {
                record.paired_with = Some(index);
            }
        }
        self.columns.insert(
            index,
            ChainColumn {
                column,
                pivot: id,
                paired_with,
                dimension,
            },
        );
        self.pivot_to_column.insert(id, index);
        if self.dimension_counts.len() <= dimension {
            self.dimension_counts.resize(dimension + 1, 0);
        }
        self.dimension_counts[dimension] += 1;
        self.cycles.clear();
        Ok(())
    }

    // ======== Column operations ==============================

    /// `target += source` (columns named by their pivots). If the addition
    /// cancels the target's pivot, target and source exchange pivot
    /// ownership and pairing, keeping the pivot bijection intact.
    pub fn add_to(&mut self, source: RowIndex, target: RowIndex) -> Result<(), VineaError> {
        let source_idx = self.column_index(source)?;
        let target_idx = self.column_index(target)?;
        let source_col = self.columns[&source_idx].column.clone();
        self.mutate(target_idx, |ops, col| col.add(ops, &source_col));
        self.restore_pivot(source_idx, target_idx);
        Ok(())
    }

    /// `target += value * source`, with the same pivot bookkeeping.
    pub fn multiply_source_and_add_to(
        &mut self,
        value: i64,
        source: RowIndex,
        target: RowIndex,
    ) -> Result<(), VineaError> {
        let coeff = self.ops.from_value(value).ok_or(VineaError::ZeroScaling)?;
        let source_idx = self.column_index(source)?;
        let target_idx = self.column_index(target)?;
        let source_col = self.columns[&source_idx].column.clone();
        self.mutate(target_idx, |ops, col| {
            col.multiply_source_and_add(ops, coeff, &source_col)
        });
        self.restore_pivot(source_idx, target_idx);
        Ok(())
    }

    /// `target = value * target + source`, with the same pivot bookkeeping.
    pub fn multiply_target_and_add_to(
        &mut self,
        value: i64,
        target: RowIndex,
        source: RowIndex,
    ) -> Result<(), VineaError> {
        let coeff = self.ops.from_value(value).ok_or(VineaError::ZeroScaling)?;
        let source_idx = self.column_index(source)?;
        let target_idx = self.column_index(target)?;
        let source_col = self.columns[&source_idx].column.clone();
        self.mutate(target_idx, |ops, col| {
            col.multiply_target_and_add(ops, coeff, &source_col)
        });
        self.restore_pivot(source_idx, target_idx);
        Ok(())
    }

    /// `column *= value`; the pivot cannot cancel, so no bookkeeping moves.
    pub fn scale_column(&mut self, id: RowIndex, value: i64) -> Result<(), VineaError> {
        let coeff = self.ops.from_value(value).ok_or(VineaError::ZeroScaling)?;
        let index = self.column_index(id)?;
        self.mutate(index, |ops, col| col.scale(ops, coeff));
        Ok(())
    }

    // ======== Vine swaps =====================================

    /// Transpose the faces `id1` and `id2`, which must sit at adjacent
    /// positions. Returns the id now at the larger position. The caller
    /// guarantees the transposed order is still a valid filtration.
    pub fn vine_swap(&mut self, id1: RowIndex, id2: RowIndex) -> Result<RowIndex, VineaError> {
        let (first, second) = self.adjacent(id1, id2)?;
        let c2 = self.column_index(second)?;
        if !self.columns[&c2].column.is_non_zero(&self.ops, first) {
            trace!("independent vine swap of {first} and {second}");
            let p = self.pivot_to_position[&first];
            self.transpose_ids(first, second);
            self.barcode.transpose_endpoints(p, p + 1);
            return Ok(first);
        }
        self.dependent_swap(first, second)?;
        Ok(first)
    }

    /// Like [`vine_swap`](Self::vine_swap) when the caller already knows the
    /// two chains interact; the triviality test is skipped.
    pub fn vine_swap_with_z_eq_1_case(
        &mut self,
        id1: RowIndex,
        id2: RowIndex,
    ) -> Result<RowIndex, VineaError> {
        let (first, second) = self.adjacent(id1, id2)?;
        self.dependent_swap(first, second)?;
        Ok(first)
    }

    fn dependent_swap(&mut self, first: RowIndex, second: RowIndex) -> Result<(), VineaError> {
        let c1 = self.column_index(first)?;
        let c2 = self.column_index(second)?;
        let p = self.pivot_to_position[&first];
        let negative_1 = self.is_negative(c1);
        let negative_2 = self.is_negative(c2);
        let partners = (self.columns[&c1].paired_with).zip(self.columns[&c2].paired_with);

        // Either the later chain sheds the earlier pivot and the two bars
        // trade endpoints, or the earlier chain sheds it and the two columns
        // trade pivots while the barcode stays put.
        let (cancel_from_second, exchange_partners) = match (negative_1, negative_2) {
            (false, false) => match partners {
                // two closed cycles: their bounding chains follow the update
                Some((h1, h2)) => {
                    let d1 = self.pivot_to_position[&self.columns[&h1].pivot];
                    let d2 = self.pivot_to_position[&self.columns[&h2].pivot];
                    ((self.death_cmp)(d1, d2), true)
                }
                None => match (
                    self.columns[&c1].paired_with.is_some(),
                    self.columns[&c2].paired_with.is_some(),
                ) {
                    (true, false) => (true, false),
                    (false, true) => (false, false),
                    // two essential cycles: the younger birth keeps its spot
                    _ => ((self.birth_cmp)(p, p + 1), false),
                },
            },
            (false, true) => (true, false),
            (true, false) => (false, false),
            // two bounding chains: their cycles follow the update
            (true, true) => {
                let (g1, g2) = partners.ok_or(VineaError::ColumnNotFound(first))?;
                let b1 = self.pivot_to_position[&self.columns[&g1].pivot];
                let b2 = self.pivot_to_position[&self.columns[&g2].pivot];
                ((self.birth_cmp)(b1, b2), true)
            }
        };

        // coefficients of the shared row: `a` at col1's own pivot, `z` in col2
        let a = self.entry_of(c1, first);
        let z = self.entry_of(c2, first);

        if cancel_from_second {
            trace!("dependent vine swap of {first} and {second}: endpoints transpose");
            let coeff = self.cancel_coeff(z.ok_or(VineaError::RowNotFound(first))?, a)?;
            if exchange_partners {
                if let Some((p1, p2)) = partners {
                    self.add_scaled(coeff, p1, p2);
                }
            }
            self.add_scaled(coeff, c1, c2);
            debug_assert!(!self.columns[&c2].column.is_non_zero(&self.ops, first));
            self.transpose_ids(first, second);
            self.barcode.transpose_endpoints(p, p + 1);
        } else {
            trace!("dependent vine swap of {first} and {second}: pivots exchange");
            let coeff = self.cancel_coeff(
                a.ok_or(VineaError::RowNotFound(first))?,
                z,
            )?;
            if exchange_partners {
                if let Some((p1, p2)) = partners {
                    self.add_scaled(coeff, p2, p1);
                }
            }
            self.add_scaled(coeff, c2, c1);
            debug_assert!(!self.columns[&c1].column.is_non_zero(&self.ops, first));
            self.swap_chain_pivots(c1, c2);
            self.transpose_ids(first, second);
        }
        Ok(())
    }

    // ======== Removal ========================================

    /// Remove the chain at the maximal position. An open bar born there
    /// disappears; a death there reopens its bar and unpairs its partner.
    pub fn remove_last(&mut self) -> Result<(), VineaError> {
        let pos = self
            .position_to_pivot
            .len()
            .checked_sub(1)
            .ok_or(VineaError::ColumnNotFound(0))?;
        let id = self.position_to_pivot[pos];
        let index = self.column_index(id)?;
        let Some(record) = self.columns.remove(&index) else {
            return Err(VineaError::ColumnNotFound(id));
        };
        if let Some(partner) = record.paired_with {
            if let Some(partner_record) = self.columns.get_mut(&partner) {
                partner_record.paired_with = None;
            }
        }
        self.barcode.drop_endpoint(pos);
        self.pivot_to_column.remove(&id);
        self.pivot_to_position.remove(&id);
        self.position_to_pivot.pop();
        self.dimension_counts[record.dimension] -= 1;
        if let Some(rows) = &mut self.rows {
            rows.unlink(index, record.column.entries(&self.ops).iter().map(|e| e.row));
            rows.erase_row(id);
        }
        self.cycles.clear();
        Ok(())
    }

    /// Remove a face with no cofaces in the matrix: vine it to the last
    /// position, then remove it there.
    pub fn remove_maximal_face(&mut self, id: RowIndex) -> Result<(), VineaError> {
        let mut pos = self.position_of(id)?;
        let last = self.position_to_pivot.len() - 1;
        while pos < last {
            let other = self.position_to_pivot[pos + 1];
            self.vine_swap(id, other)?;
            pos += 1;
        }
        self.remove_last()
    }

    // ======== Representative cycles ==========================

    /// Recompute the cycle representatives: every `F` or `G` column is the
    /// cycle of the class born at its pivot's position.
    pub fn update_representative_cycles(&mut self) {
        self.cycles.clear();
        for record in self.columns.values() {
            let own = self.pivot_to_position[&record.pivot];
            let is_birth = match record.paired_with {
                None => true,
                Some(partner) => {
                    own < self.pivot_to_position[&self.columns[&partner].pivot]
                }
            };
            if is_birth {
                self.cycles.insert(own, record.column.entries(&self.ops));
            }
        }
    }

    /// Representative of the class born at `bar.birth`; rows are face ids.
    /// Call [`update_representative_cycles`](Self::update_representative_cycles)
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

    fn record(&self, id: RowIndex) -> Result<&ChainColumn<C>, VineaError> {
        self.columns
            .get(self.pivot_to_column.get(&id).ok_or(VineaError::ColumnNotFound(id))?)
            .ok_or(VineaError::ColumnNotFound(id))
    }

    fn column_index(&self, id: RowIndex) -> Result<ColIndex, VineaError> {
        self.pivot_to_column
            .get(&id)
            .copied()
            .ok_or(VineaError::ColumnNotFound(id))
    }

    /// Order the two ids by position and check adjacency.
    fn adjacent(&self, id1: RowIndex, id2: RowIndex) -> Result<(RowIndex, RowIndex), VineaError> {
        let p1 = self.position_of(id1)?;
        let p2 = self.position_of(id2)?;
        let (first, second, lo, hi) = if p1 < p2 {
            (id1, id2, p1, p2)
        } else {
            (id2, id1, p2, p1)
        };
        if hi != lo + 1 {
            return Err(VineaError::NonAdjacentSwap(lo, hi));
        }
        Ok((first, second))
    }

    /// A chain is negative when it bounds: paired, with its pivot later than
    /// its partner's.
    fn is_negative(&self, index: ColIndex) -> bool {
        let record = &self.columns[&index];
        match record.paired_with {
            None => false,
            Some(partner) => {
                self.pivot_to_position[&record.pivot]
                    > self.pivot_to_position[&self.columns[&partner].pivot]
            }
        }
    }

    fn entry_of(&self, index: ColIndex, row: RowIndex) -> Option<F::Element> {
        self.columns[&index]
            .column
            .entries(&self.ops)
            .into_iter()
            .find(|entry| entry.row == row)
            .map(|entry| entry.coeff)
    }

    /// Coefficient `c` with `e + c * b = 0`.
    fn cancel_coeff(
        &self,
        e: F::Element,
        b: Option<F::Element>,
    ) -> Result<F::Element, VineaError> {
        let non_invertible = || VineaError::NonInvertible(self.ops.characteristic());
        let b = b.ok_or_else(non_invertible)?;
        let inv = self.ops.inverse(b)?;
        self.ops
            .mul(self.ops.negate(e), inv)
            .ok_or_else(non_invertible)
    }

    /// `columns[target] += c * columns[source]`, raw.
    fn add_scaled(&mut self, coeff: F::Element, source: ColIndex, target: ColIndex) {
        let source_col = self.columns[&source].column.clone();
        self.mutate(target, |ops, col| {
            col.multiply_source_and_add(ops, coeff, &source_col)
        });
    }

    /// Exchange pivot ownership and positions stay as they are; used when an
    /// addition moved a pivot from one chain to the other.
    fn swap_chain_pivots(&mut self, c1: ColIndex, c2: ColIndex) {
        let p1 = self.columns[&c1].pivot;
        let p2 = self.columns[&c2].pivot;
        if let Some(record) = self.columns.get_mut(&c1) {
            record.pivot = p2;
        }
        if let Some(record) = self.columns.get_mut(&c2) {
            record.pivot = p1;
        }
        self.pivot_to_column.insert(p1, c2);
        self.pivot_to_column.insert(p2, c1);
    }

    /// Transpose the positions of two ids at adjacent positions.
    fn transpose_ids(&mut self, first: RowIndex, second: RowIndex) {
        let p1 = self.pivot_to_position[&first];
        let p2 = self.pivot_to_position[&second];
        self.position_to_pivot.swap(p1, p2);
        self.pivot_to_position.insert(first, p2);
        self.pivot_to_position.insert(second, p1);
    }

    /// After a raw addition the target may have lost its pivot to the
    /// source; exchange identities when that happens.
    fn restore_pivot(&mut self, source: ColIndex, target: ColIndex) {
        let pivot = self.columns[&target].pivot;
        if !self.columns[&target].column.is_non_zero(&self.ops, pivot) {
            self.swap_chain_pivots(source, target);
            let paired_1 = self.columns[&source].paired_with;
            let paired_2 = self.columns[&target].paired_with;
            if let Some(record) = self.columns.get_mut(&source) {
                record.paired_with = paired_2;
            }
            if let Some(record) = self.columns.get_mut(&target) {
                record.paired_with = paired_1;
            }
            if let Some(partner) = self.columns[&source].paired_with {
                if let Some(record) = self.columns.get_mut(&partner) {
                    record.paired_with = Some(source);
                }
            }
            if let Some(partner) = self.columns[&target].paired_with {
                if let Some(record) = self.columns.get_mut(&partner) {
                    record.paired_with = Some(target);
                }
            }
        }
    }

    fn mutate(&mut self, index: ColIndex, f: impl FnOnce(&F, &mut C)) {
        if let Some(rows) = &mut self.rows {
            if let Some(record) = self.columns.get(&index) {
                rows.unlink(
                    index,
                    record.column.entries(&self.ops).iter().map(|e| e.row),
                );
            }
        }
        if let Some(record) = self.columns.get_mut(&index) {
            f(&self.ops, &mut record.column);
        }
        if let Some(rows) = &mut self.rows {
            if let Some(record) = self.columns.get(&index) {
                rows.link(
                    index,
                    record.column.entries(&self.ops).iter().map(|e| e.row),
                );
            }
        }
    }
}

/// `working += coeff * entries`, in place.
fn accumulate<F: FieldOperators>(
    ops: &F,
    working: &mut BTreeMap<RowIndex, F::Element>,
    coeff: F::Element,
    entries: &[ColumnEntry<F::Element>],
) {
    for entry in entries {
        let Some(scaled) = ops.mul(entry.coeff, coeff) else {
            continue;
        };
        match working.remove(&entry.row) {
            None => {
                working.insert(entry.row, scaled);
            }
            Some(existing) => {
                if let Some(sum) = ops.add(existing, scaled) {
                    working.insert(entry.row, sum);
                }
            }
        }
    }
}

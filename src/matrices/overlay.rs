//! Id-addressed overlay for the position-indexed decomposition.
//!
//! [`RuMatrix`] speaks filtration positions, which shift under vine swaps
//! and removals. The overlay keeps a bijection between stable face ids and
//! current positions and translates every call, so faces can be addressed
//! by the same id over the whole lifetime of the vineyard.

use log::trace;
use rustc_hash::FxHashMap;

use crate::columns::{Column, ColumnEntry, VecColumn};
use crate::fields::FieldOperators;
use crate::{ColIndex, Pos, RowIndex, VineaError};

use super::ru::RuMatrix;
use super::Bar;

pub struct IdOverlay<F, C = VecColumn<<F as FieldOperators>::Element>>
where
    F: FieldOperators,
    C: Column<F>,
{
    matrix: RuMatrix<F, C>,
    id_to_position: FxHashMap<RowIndex, Pos>,
    position_to_id: Vec<RowIndex>,
    next_id: RowIndex,
}

impl<F, C> IdOverlay<F, C>
where
    F: FieldOperators,
    C: Column<F>,
{
    pub fn new(ops: F) -> Self {
        IdOverlay {
            matrix: RuMatrix::new(ops),
            id_to_position: FxHashMap::default(),
            position_to_id: Vec::new(),
            next_id: 0,
        }
    }

    pub fn ops(&self) -> &F {
        self.matrix.ops()
    }

    pub fn len(&self) -> usize {
        self.position_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position_to_id.is_empty()
    }

    pub fn position_of(&self, id: RowIndex) -> Result<Pos, VineaError> {
        self.id_to_position
            .get(&id)
            .copied()
            .ok_or(VineaError::ColumnNotFound(id))
    }

    pub fn id_at_position(&self, pos: Pos) -> Result<RowIndex, VineaError> {
        self.position_to_id
            .get(pos)
            .copied()
            .ok_or(VineaError::ColumnNotFound(pos))
    }

    pub fn dimension(&self, id: RowIndex) -> Result<usize, VineaError> {
        self.matrix.dimension(self.position_of(id)?)
    }

    pub fn max_dimension(&self) -> Option<usize> {
        self.matrix.max_dimension()
    }

    /// Bars are positional; translate endpoints through
    /// [`id_at_position`](Self::id_at_position) when ids are wanted.
    pub fn barcode(&self) -> Vec<Bar> {
        self.matrix.barcode()
    }

    pub fn bar_at(&self, endpoint: Pos) -> Option<&Bar> {
        self.matrix.bar_at(endpoint)
    }

    /// Insert the boundary of the next face, rows given as face ids. The id
    /// is allocated consecutively and returned.
    pub fn insert_boundary(&mut self, boundary: &[(RowIndex, i64)]) -> Result<RowIndex, VineaError> {
        let id = self.next_id;
        let dim = boundary.len().saturating_sub(1);
        self.insert_boundary_in_dimension(id, boundary, dim)?;
        Ok(id)
    }

    /// Insert with an explicit, previously unused face id.
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
        if self.id_to_position.contains_key(&id) {
            return Err(VineaError::DuplicateId(id));
        }
        let translated = boundary
            .iter()
            .map(|&(row, value)| Ok((self.position_of(row)?, value)))
            .collect::<Result<Vec<_>, VineaError>>()?;
        let pos = self
            .matrix
            .insert_boundary_in_dimension(&translated, dimension)?;
        debug_assert_eq!(pos, self.position_to_id.len());
        self.id_to_position.insert(id, pos);
        self.position_to_id.push(id);
        self.next_id = self.next_id.max(id + 1);
        Ok(())
    }

    /// The reduced column of the face `id`; rows are positions.
    pub fn get_column(&self, id: RowIndex) -> Result<&C, VineaError> {
        self.matrix.get_column(self.position_of(id)?)
    }

    /// The row of the face `id` across the reduced matrix.
    pub fn get_row(&self, id: RowIndex) -> Result<Vec<(ColIndex, F::Element)>, VineaError> {
        self.matrix.get_row(self.position_of(id)?)
    }

    pub fn is_zero_column(&self, id: RowIndex) -> Result<bool, VineaError> {
        self.matrix.is_zero_column(self.position_of(id)?)
    }

    /// Transpose two faces at adjacent positions. Returns the id now at the
    /// larger position (the one that was earlier before the swap).
    pub fn vine_swap(&mut self, id1: RowIndex, id2: RowIndex) -> Result<RowIndex, VineaError> {
        let p1 = self.position_of(id1)?;
        let p2 = self.position_of(id2)?;
        let (lo, hi) = if p1 < p2 { (p1, p2) } else { (p2, p1) };
        if hi != lo + 1 {
            return Err(VineaError::NonAdjacentSwap(lo, hi));
        }
        trace!("vine swap of faces {id1} and {id2} at positions {lo}, {hi}");
        self.matrix.vine_swap(lo)?;
        let first = self.position_to_id[lo];
        let second = self.position_to_id[hi];
        self.position_to_id.swap(lo, hi);
        self.id_to_position.insert(first, hi);
        self.id_to_position.insert(second, lo);
        Ok(first)
    }

    /// Remove the face at the maximal position.
    pub fn remove_last(&mut self) -> Result<(), VineaError> {
        let id = self
            .position_to_id
            .last()
            .copied()
            .ok_or(VineaError::ColumnNotFound(0))?;
        self.matrix.remove_last()?;
        self.position_to_id.pop();
        self.id_to_position.remove(&id);
        Ok(())
    }

    /// Remove a face with no cofaces in the matrix: vine it to the last
    /// position, then remove it there.
    pub fn remove_maximal_face(&mut self, id: RowIndex) -> Result<(), VineaError> {
        let mut pos = self.position_of(id)?;
        let last = self.position_to_id.len() - 1;
        while pos < last {
            let other = self.position_to_id[pos + 1];
            self.vine_swap(id, other)?;
            pos += 1;
        }
        self.remove_last()
    }

    pub fn update_representative_cycles(&mut self) {
        self.matrix.update_representative_cycles();
    }

    /// Representative of the class born at `bar.birth`; rows are positions.
    pub fn representative_cycle(
        &self,
        bar: &Bar,
    ) -> Result<&[ColumnEntry<F::Element>], VineaError> {
        self.matrix.representative_cycle(bar)
    }

    /// All current representatives, ordered by birth position.
    pub fn representative_cycles(&self) -> Vec<&[ColumnEntry<F::Element>]> {
        self.matrix.representative_cycles()
    }
}

//! Plain boundary-matrix container.
//!
//! No reduction, no barcode: just position-indexed columns with the full set
//! of column operations, optional row access and optional column compression.
//! Useful as a staging area and for building custom algorithms on top.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::columns::{Column, VecColumn};
use crate::fields::FieldOperators;
use crate::{ColIndex, RowIndex, VineaError};

use super::{boundary_entries, row_entries, RowSupport};

pub struct BaseMatrix<F, C = VecColumn<<F as FieldOperators>::Element>>
where
    F: FieldOperators,
    C: Column<F>,
{
    ops: F,
    // Rc so that compressed duplicates share storage; mutation is copy-on-write
    columns: Vec<Rc<C>>,
    dimensions: Vec<usize>,
    rows: Option<RowSupport>,
    compression: Option<FxHashMap<u64, Vec<ColIndex>>>,
    hashes: Vec<u64>,
}

impl<F, C> BaseMatrix<F, C>
where
    F: FieldOperators,
    C: Column<F>,
{
    pub fn new(ops: F) -> Self {
        BaseMatrix {
            ops,
            columns: Vec::new(),
            dimensions: Vec::new(),
            rows: None,
            compression: None,
            hashes: Vec::new(),
        }
    }

    /// Enable `get_row` / `swap_rows`. Must be chosen before any insertion.
    pub fn with_row_access(mut self) -> Self {
        self.rows = Some(RowSupport::default());
        self
    }

    /// Share the storage of identical columns. Must be chosen before any
    /// insertion.
    pub fn with_compression(mut self) -> Self {
        self.compression = Some(FxHashMap::default());
        self
    }

    pub fn ops(&self) -> &F {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn dimension(&self, col: ColIndex) -> Result<usize, VineaError> {
        self.dimensions
            .get(col)
            .copied()
            .ok_or(VineaError::ColumnNotFound(col))
    }

    pub fn max_dimension(&self) -> Option<usize> {
        self.dimensions.iter().copied().max()
    }

    /// Append a boundary column; its dimension is one less than its entry
    /// count (0 for an empty boundary).
    pub fn insert_boundary(&mut self, boundary: &[(RowIndex, i64)]) -> ColIndex {
        let dim = boundary.len().saturating_sub(1);
        self.insert_column(boundary, dim)
    }

    pub fn insert_column(&mut self, boundary: &[(RowIndex, i64)], dimension: usize) -> ColIndex {
        let entries = boundary_entries(&self.ops, boundary);
        let column = C::from_sorted(&self.ops, entries);
        let col = self.columns.len();
        if let Some(rows) = &mut self.rows {
            rows.link(col, column.entries(&self.ops).iter().map(|e| e.row));
        }
        let hash = column.content_hash(&self.ops);
        self.columns.push(Rc::new(column));
        self.dimensions.push(dimension);
        self.hashes.push(hash);
        self.attach_to_bucket(col);
        col
    }

    pub fn get_column(&self, col: ColIndex) -> Result<&C, VineaError> {
        self.columns
            .get(col)
            .map(|rc| rc.as_ref())
            .ok_or(VineaError::ColumnNotFound(col))
    }

    pub fn get_row(&self, row: RowIndex) -> Result<Vec<(ColIndex, F::Element)>, VineaError> {
        let support = self.rows.as_ref().ok_or(VineaError::RowAccessDisabled)?;
        if !support.has_row(row) {
            return Err(VineaError::RowNotFound(row));
        }
        Ok(row_entries(&self.ops, support, row, |c| {
            self.columns[c].as_ref()
        }))
    }

    pub fn get_pivot(&self, col: ColIndex) -> Result<Option<RowIndex>, VineaError> {
        Ok(self.get_column(col)?.pivot(&self.ops))
    }

    pub fn is_zero_column(&self, col: ColIndex) -> Result<bool, VineaError> {
        Ok(self.get_column(col)?.is_empty(&self.ops))
    }

    pub fn is_zero_entry(&self, col: ColIndex, row: RowIndex) -> Result<bool, VineaError> {
        Ok(!self.get_column(col)?.is_non_zero(&self.ops, row))
    }

    pub fn zero_column(&mut self, col: ColIndex) -> Result<(), VineaError> {
        self.mutate(col, |_, column| column.clear())
    }

    pub fn zero_entry(&mut self, col: ColIndex, row: RowIndex) -> Result<(), VineaError> {
        self.mutate(col, |ops, column| column.clear_row(ops, row))
    }

    /// `target += source`
    pub fn add_to(&mut self, source: ColIndex, target: ColIndex) -> Result<(), VineaError> {
        let source = self.cloned_column(source)?;
        self.mutate(target, |ops, column| column.add(ops, &source))
    }

    /// `target = value * target + source`
    pub fn multiply_target_and_add(
        &mut self,
        value: i64,
        target: ColIndex,
        source: ColIndex,
    ) -> Result<(), VineaError> {
        let coeff = self.ops.from_value(value).ok_or(VineaError::ZeroScaling)?;
        let source = self.cloned_column(source)?;
        self.mutate(target, |ops, column| {
            column.multiply_target_and_add(ops, coeff, &source)
        })
    }

    /// `target += value * source`
    pub fn multiply_source_and_add(
        &mut self,
        value: i64,
        target: ColIndex,
        source: ColIndex,
    ) -> Result<(), VineaError> {
        let coeff = self.ops.from_value(value).ok_or(VineaError::ZeroScaling)?;
        let source = self.cloned_column(source)?;
        self.mutate(target, |ops, column| {
            column.multiply_source_and_add(ops, coeff, &source)
        })
    }

    pub fn scale_column(&mut self, col: ColIndex, value: i64) -> Result<(), VineaError> {
        let coeff = self.ops.from_value(value).ok_or(VineaError::ZeroScaling)?;
        self.mutate(col, |ops, column| column.scale(ops, coeff))
    }

    /// Debug-level transposition of two columns (indices, dimensions, row
    /// support and compression buckets follow).
    pub fn swap_columns(&mut self, c1: ColIndex, c2: ColIndex) -> Result<(), VineaError> {
        if c1.max(c2) >= self.columns.len() {
            return Err(VineaError::ColumnNotFound(c1.max(c2)));
        }
        if c1 == c2 {
            return Ok(());
        }
        if let Some(rows) = &mut self.rows {
            rows.unlink(c1, self.columns[c1].entries(&self.ops).iter().map(|e| e.row));
            rows.unlink(c2, self.columns[c2].entries(&self.ops).iter().map(|e| e.row));
        }
        self.detach_from_bucket(c1);
        self.detach_from_bucket(c2);
        self.columns.swap(c1, c2);
        self.dimensions.swap(c1, c2);
        self.hashes.swap(c1, c2);
        if let Some(rows) = &mut self.rows {
            rows.link(c1, self.columns[c1].entries(&self.ops).iter().map(|e| e.row));
            rows.link(c2, self.columns[c2].entries(&self.ops).iter().map(|e| e.row));
        }
        self.attach_to_bucket(c1);
        self.attach_to_bucket(c2);
        Ok(())
    }

    /// Debug-level transposition of two rows across all columns.
    pub fn swap_rows(&mut self, r1: RowIndex, r2: RowIndex) -> Result<(), VineaError> {
        if r1 == r2 {
            return Ok(());
        }
        let affected: Vec<ColIndex> = match &self.rows {
            Some(rows) => {
                let mut cols: Vec<_> =
                    rows.columns_on(r1).chain(rows.columns_on(r2)).collect();
                cols.sort_unstable();
                cols.dedup();
                cols
            }
            None => (0..self.columns.len()).collect(),
        };
        for col in affected {
            self.mutate(col, |ops, column| column.swap_rows(ops, r1, r2))?;
        }
        Ok(())
    }

    fn cloned_column(&self, col: ColIndex) -> Result<C, VineaError> {
        Ok(self.get_column(col)?.clone())
    }

    fn mutate(
        &mut self,
        col: ColIndex,
        f: impl FnOnce(&F, &mut C),
    ) -> Result<(), VineaError> {
        if col >= self.columns.len() {
            return Err(VineaError::ColumnNotFound(col));
        }
        self.detach_from_bucket(col);
        if let Some(rows) = &mut self.rows {
            rows.unlink(col, self.columns[col].entries(&self.ops).iter().map(|e| e.row));
        }
        f(&self.ops, Rc::make_mut(&mut self.columns[col]));
        if let Some(rows) = &mut self.rows {
            rows.link(col, self.columns[col].entries(&self.ops).iter().map(|e| e.row));
        }
        self.hashes[col] = self.columns[col].content_hash(&self.ops);
        self.attach_to_bucket(col);
        Ok(())
    }

    /// Register `col` in its content bucket, sharing storage with an equal
    /// column when one exists.
    fn attach_to_bucket(&mut self, col: ColIndex) {
        let Some(buckets) = &mut self.compression else {
            return;
        };
        let bucket = buckets.entry(self.hashes[col]).or_default();
        let twin = bucket
            .iter()
            .copied()
            .find(|&other| self.columns[other].eq_column(&self.ops, &self.columns[col]));
        if let Some(other) = twin {
            self.columns[col] = Rc::clone(&self.columns[other]);
        }
        bucket.push(col);
    }

    fn detach_from_bucket(&mut self, col: ColIndex) {
        if let Some(buckets) = &mut self.compression {
            if let Some(bucket) = buckets.get_mut(&self.hashes[col]) {
                bucket.retain(|&c| c != col);
                if bucket.is_empty() {
                    buckets.remove(&self.hashes[col]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::fields::Z2;

    fn z2_matrix() -> BaseMatrix<Z2> {
        BaseMatrix::new(Z2).with_row_access()
    }

    fn edge(a: usize, b: usize) -> Vec<(usize, i64)> {
        vec![(a, 1), (b, 1)]
    }

    #[test]
    fn test_insert_and_access() {
        let mut m = z2_matrix();
        let c0 = m.insert_boundary(&[]);
        let c1 = m.insert_boundary(&edge(0, 1));
        assert_eq!(m.dimension(c0).unwrap(), 0);
        assert_eq!(m.dimension(c1).unwrap(), 1);
        assert!(m.is_zero_column(c0).unwrap());
        assert_eq!(m.get_pivot(c1).unwrap(), Some(1));
        assert_eq!(m.get_row(1).unwrap().len(), 1);
        assert!(m.get_row(7).is_err());
    }

    #[test]
    fn test_zeroing() {
        let mut m = z2_matrix();
        let c = m.insert_boundary(&edge(0, 2));
        m.zero_entry(c, 2).unwrap();
        assert_eq!(m.get_pivot(c).unwrap(), Some(0));
        m.zero_column(c).unwrap();
        assert!(m.is_zero_column(c).unwrap());
        assert!(m.get_row(0).is_err());
    }

    #[test]
    fn test_add_and_swap() {
        let mut m = z2_matrix();
        let c0 = m.insert_boundary(&edge(0, 1));
        let c1 = m.insert_boundary(&edge(1, 2));
        m.add_to(c0, c1).unwrap();
        assert_eq!(m.get_column(c1).unwrap().get_content(&Z2, 3), vec![1, 0, 1]);
        m.swap_columns(c0, c1).unwrap();
        assert_eq!(m.get_pivot(c0).unwrap(), Some(2));
        m.swap_rows(0, 2).unwrap();
        assert_eq!(m.get_pivot(c0).unwrap(), Some(2));
        assert_eq!(m.get_pivot(c1).unwrap(), Some(2));
    }

    #[test]
    fn test_zero_scaling_rejected() {
        let mut m = z2_matrix();
        let c = m.insert_boundary(&edge(0, 1));
        assert_eq!(m.scale_column(c, 2), Err(VineaError::ZeroScaling));
    }

    #[test]
    fn test_compression_shares_storage() {
        let mut m: BaseMatrix<Z2> = BaseMatrix::new(Z2).with_compression();
        let c0 = m.insert_boundary(&edge(0, 1));
        let c1 = m.insert_boundary(&edge(0, 1));
        assert!(Rc::ptr_eq(&m.columns[c0], &m.columns[c1]));
        // diverge one copy; the other must keep its content
        m.zero_entry(c1, 1).unwrap();
        assert_eq!(m.get_pivot(c0).unwrap(), Some(1));
        assert_eq!(m.get_pivot(c1).unwrap(), Some(0));
    }
}

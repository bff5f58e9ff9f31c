//! Sparse matrix structures for persistent homology.
//!
//! The building blocks are field operator objects ([`fields`]), interchangeable
//! sparse column representations ([`columns`]) and the matrix layers on top of
//! them ([`matrices`]): a plain base container, an `R = D·U` decomposition with
//! vineyard updates, and a chain (compatible basis) matrix. All of them produce
//! barcodes and representative cycles and support removal of maximal faces.
//!
//! Coefficients follow a "zero is absence" convention: a column entry always
//! carries a non-zero field element, and the additive identity is expressed by
//! the entry not being there. Over `Z2` this makes an entry a bare row index.

pub mod columns;
pub mod fields;
pub mod matrices;

pub use columns::{Column, ColumnEntry};
pub use fields::FieldOperators;
pub use matrices::{Bar, Barcode};

/// Row of a matrix. For chain matrices this is a stable face identifier.
pub type RowIndex = usize;
/// Column of a matrix.
pub type ColIndex = usize;
/// Position in the current filtration order. Vine swaps permute positions.
pub type Pos = usize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VineaError {
    #[error("column identifier {0} is already in use")]
    DuplicateId(usize),
    #[error("no column with identifier {0}")]
    ColumnNotFound(usize),
    #[error("no row with index {0}")]
    RowNotFound(usize),
    #[error("element has no multiplicative inverse modulo {0}")]
    NonInvertible(u64),
    #[error("{0} is not prime")]
    InvalidCharacteristic(u64),
    #[error("no prime in the interval [{min}, {max}]")]
    EmptyCharacteristicRange { min: u64, max: u64 },
    #[error("product of characteristics overflows u64")]
    CharacteristicOverflow,
    #[error("scaling a column by the additive identity is not allowed here")]
    ZeroScaling,
    #[error("vine swap requires faces at adjacent positions, got {0} and {1}")]
    NonAdjacentSwap(usize, usize),
    #[error("row access is disabled for this matrix")]
    RowAccessDisabled,
}

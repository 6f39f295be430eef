use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Error type returned by sparse matrix assembly operations.
pub enum SparseFormatError {
    /// Matrix dimension fields and/or array lengths are incompatible
    #[error("Matrix dimension fields and/or array lengths are incompatible")]
    IncompatibleDimension,
    /// Data is not sorted by row index within each column
    #[error("Data is not sorted by row index within each column")]
    BadRowOrdering,
    #[error("Row value {row} exceeds the matrix row dimension {m}")]
    /// Row value exceeds the matrix row dimension
    BadRowval { row: usize, m: usize },
    #[error("Column value {col} exceeds the matrix column dimension {n}")]
    /// Column value exceeds the matrix column dimension
    BadColval { col: usize, n: usize },
    #[error("Bad column pointer values")]
    /// Matrix column pointer values are defective
    BadColptr,
    #[error("Matrix is not square")]
    /// A symmetric operation was requested on a rectangular matrix
    NotSquare,
}

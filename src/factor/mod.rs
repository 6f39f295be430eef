//! Numeric LDL' factorization of sparse symmetric matrices.
//!
//! [`SymmetricFactorization`] owns the matrix, runs one of the symbolic
//! orderings from [`crate::ordering`] and then factors the permuted
//! matrix with a parallel left-looking kernel.   Pivots are passed
//! through a [`PivotPolicy`] before use, so that singular or wrongly
//! signed pivots are repaired rather than reported as failures.

mod error;
pub use error::*;
mod numeric;
pub use numeric::*;
mod pivot;
pub use pivot::*;
mod readiness;
pub(crate) use readiness::*;
mod solve;
mod workspace;
pub use workspace::*;

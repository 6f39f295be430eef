//! KKT system assemblies built on the symmetric factorization.
//!
//! [`BlendedKKT`] partitions the primal variables of an interior point
//! system into an augmented block and a simple block that is eliminated
//! into normal equations, then factors the merged system with signed
//! regularization.   [`IndefiniteSolver`] factors a caller supplied
//! symmetric matrix directly and refines its solutions.

mod blended;
pub use blended::*;
mod indefinite;
pub use indefinite::*;
mod partition;
pub use partition::*;

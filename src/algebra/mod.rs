//! Sparse storage and vector math used by the factorization engine.
//!
//! All symmetric matrices are held in standard compressed sparse column
//! format ([`CscMatrix`]).  The factorization works on the lower triangle,
//! while inputs may be supplied as a lower, upper or full triangle.

mod error_types;
pub use error_types::*;
mod extended;
pub use extended::*;
mod floats;
pub use floats::*;
mod math_traits;
pub use math_traits::*;
mod matrix_traits;
pub use matrix_traits::*;
mod matrix_types;
pub use matrix_types::*;
mod vecmath;
pub use vecmath::*;

mod csc;
pub use csc::*;

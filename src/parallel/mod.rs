//! Minimal index-addressed task dispatcher used by the parallel phases
//! of ordering, factorization and KKT assembly, plus the cancellation
//! check polled by those phases.

mod abort;
pub use abort::*;
mod dispatcher;
pub use dispatcher::*;
mod shared;
pub(crate) use shared::*;

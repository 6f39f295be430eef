//! __symfact__ is a sparse symmetric indefinite factorization engine for
//! the linear systems that arise inside interior point methods.
//!
//! It factors a symmetric, possibly indefinite matrix as
//!
//! $$
//! P A P^\top = L D L^\top
//! $$
//!
//! with $L$ lower triangular, $D$ diagonal with entries $\pm 1$ and $P$ a
//! fill reducing permutation.   The expensive symbolic phase runs once per
//! sparsity pattern, after which values can be refilled and refactored
//! any number of times.
//!
//! ## Features
//!
//! * __Orderings__: a greedy local fill minimization with supernode
//! detection and a dense window shortcut, approximate minimum degree via
//! the [`amd`](https://crates.io/crates/amd) crate, or the natural order.
//!
//! * __Parallel numeric factorization__: a left looking column algorithm
//! run across worker threads, with results that do not depend on the
//! number of threads.
//!
//! * __Pivot repair__: pluggable pivot policies, with threshold and signed
//! regularization policies provided.   Every repaired pivot is logged.
//!
//! * __KKT assembly__: interior point systems in which eliminable variables
//! are folded into normal equations, and a direct indefinite solver with
//! iterative refinement.
//!
//! ## Example
//!
//! ```
//! use symfact::algebra::*;
//! use symfact::factor::SymmetricFactorization;
//! use symfact::settings::FactorSettings;
//!
//! // lower triangle of [[4,1,0],[1,4,1],[0,1,4]]
//! let A = CscMatrix::new(
//!     3,
//!     3,
//!     vec![0, 2, 4, 5],
//!     vec![0, 1, 1, 2, 2],
//!     vec![4., 1., 4., 1., 4.],
//! );
//!
//! let mut ws = SymmetricFactorization::new(&A, FactorSettings::default()).unwrap();
//! ws.factorize(true).unwrap();
//! ws.cholesky().unwrap();
//!
//! let mut x = vec![5., 6., 5.];
//! ws.solve(&mut x).unwrap();
//! assert!(x.iter().all(|&v| (v - 1.0_f64).abs() < 1e-12));
//! ```
//!
//! # License
//!
//! Licensed under Apache License, Version 2.0.

//Rust hates greek characters
#![allow(confusable_idents)]

pub mod algebra;
pub mod factor;
pub mod kkt;
pub mod ordering;
pub mod parallel;
pub mod settings;
pub mod timers;

#[cfg(feature = "serde")]
pub mod io;

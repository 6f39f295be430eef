//! Symbolic ordering strategies.
//!
//! Each strategy takes the lower triangular pattern of a symmetric
//! matrix in caller ("outer") numbering and produces a fill reducing
//! permutation together with the predicted pattern of the factor in
//! permuted ("inner") numbering.

use crate::algebra::FloatT;
use crate::factor::FactorError;
use crate::parallel::{AbortCheck, ParallelDispatcher};
use crate::settings::{FactorSettings, FactorizationMethod};
use enum_dispatch::*;

mod amd;
pub use self::amd::*;
mod localfill;
pub use localfill::*;
mod pattern;
pub use pattern::*;

/// Bijective map between outer and inner variable numbering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    inner_to_outer: Vec<usize>,
    outer_to_inner: Vec<usize>,
}

impl Permutation {
    /// Construct from the `inner_to_outer` direction.   Fails if the
    /// input is not a permutation of `0..n`.
    pub fn new(inner_to_outer: Vec<usize>) -> Result<Self, FactorError> {
        let outer_to_inner = _invperm(&inner_to_outer)?;
        Ok(Self {
            inner_to_outer,
            outer_to_inner,
        })
    }

    /// Construct from both directions, checking that they are inverses
    pub fn from_pair(
        inner_to_outer: Vec<usize>,
        outer_to_inner: Vec<usize>,
    ) -> Result<Self, FactorError> {
        let perm = Self {
            inner_to_outer,
            outer_to_inner,
        };
        if perm.is_valid() {
            Ok(perm)
        } else {
            Err(FactorError::InvalidPermutation)
        }
    }

    pub fn identity(n: usize) -> Self {
        Self {
            inner_to_outer: (0..n).collect(),
            outer_to_inner: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner_to_outer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner_to_outer.is_empty()
    }

    pub fn inner_to_outer(&self) -> &[usize] {
        &self.inner_to_outer
    }

    pub fn outer_to_inner(&self) -> &[usize] {
        &self.outer_to_inner
    }

    /// True if both directions are mutual inverses
    pub fn is_valid(&self) -> bool {
        let n = self.inner_to_outer.len();
        self.outer_to_inner.len() == n
            && self
                .inner_to_outer
                .iter()
                .enumerate()
                .all(|(i, &o)| o < n && self.outer_to_inner[o] == i)
    }

    /// Gather into inner order: `x[inner] = b[outer]`
    pub fn permute<T: Copy>(&self, x: &mut [T], b: &[T]) {
        _permute(x, b, &self.inner_to_outer);
    }

    /// Scatter back to outer order: `x[outer] = b[inner]`
    pub fn ipermute<T: Copy>(&self, x: &mut [T], b: &[T]) {
        _ipermute(x, b, &self.inner_to_outer);
    }
}

// Construct an inverse permutation from a permutation
fn _invperm(p: &[usize]) -> Result<Vec<usize>, FactorError> {
    let mut b = vec![usize::MAX; p.len()];

    for (i, &j) in p.iter().enumerate() {
        if j < p.len() && b[j] == usize::MAX {
            b[j] = i;
        } else {
            return Err(FactorError::InvalidPermutation);
        }
    }
    Ok(b)
}

// internal permutation and inverse permutation
// functions that require no memory allocations

fn _permute<T: Copy>(x: &mut [T], b: &[T], p: &[usize]) {
    std::iter::zip(p, x).for_each(|(p, x)| *x = b[*p]);
}

fn _ipermute<T: Copy>(x: &mut [T], b: &[T], p: &[usize]) {
    std::iter::zip(p, b).for_each(|(p, b)| x[*p] = *b);
}

/// Lower triangular symmetric pattern in outer numbering, plus
/// optional per-column pivot handicaps.
#[derive(Debug, Clone, Copy)]
pub struct SymbolicInput<'a> {
    pub n: usize,
    pub colptr: &'a [usize],
    pub rowval: &'a [usize],
    pub handicaps: Option<&'a [i8]>,
}

impl<'a> SymbolicInput<'a> {
    pub fn new(n: usize, colptr: &'a [usize], rowval: &'a [usize]) -> Self {
        Self {
            n,
            colptr,
            rowval,
            handicaps: None,
        }
    }

    pub fn with_handicaps(mut self, handicaps: Option<&'a [i8]>) -> Self {
        self.handicaps = handicaps;
        self
    }

    pub(crate) fn handicap(&self, col: usize) -> i8 {
        self.handicaps.map_or(0, |h| h[col])
    }
}

/// Result of the symbolic phase: permutation, predicted factor pattern
/// and the start of the dense tail.
///
/// The pattern is lower triangular in inner numbering, with each
/// column's diagonal stored first and rows ascending.   Every column at
/// or beyond `first_dense` is fully dense, so that the slot of row `i`
/// in such a column `j` is `colptr[j] + (i - j)`.
#[derive(Debug, Clone)]
pub struct SymbolicPlan {
    pub perm: Permutation,
    pub colptr: Vec<usize>,
    pub rowval: Vec<usize>,
    pub first_dense: usize,
}

impl SymbolicPlan {
    pub fn n(&self) -> usize {
        self.perm.len()
    }

    pub fn nnz(&self) -> usize {
        self.colptr[self.n()]
    }

    pub fn column(&self, col: usize) -> &[usize] {
        &self.rowval[self.colptr[col]..self.colptr[col + 1]]
    }
}

#[enum_dispatch]
pub trait SymbolicOrdering {
    /// short strategy name for diagnostics
    fn name(&self) -> &'static str;

    /// Compute the permutation and the predicted factor pattern
    fn order(&self, input: &SymbolicInput, abort: &AbortCheck)
        -> Result<SymbolicPlan, FactorError>;
}

/// Ordering strategies selectable at construction time
#[enum_dispatch(SymbolicOrdering)]
#[derive(Debug, Clone)]
pub enum OrderingStrategy {
    ApproximateMinDegree(AmdOrdering),
    LocalFill(LocalFillOrdering),
    Natural(NaturalOrdering),
}

impl OrderingStrategy {
    /// Pick the strategy for an `n` column system.   Without fill-in
    /// planning the natural ordering is used.
    pub fn from_settings<T: FloatT>(
        settings: &FactorSettings<T>,
        plan_fill_in: bool,
        n: usize,
    ) -> Self {
        if !plan_fill_in {
            return NaturalOrdering::new(settings.dense_window_threshold).into();
        }
        let method = match settings.factorization_method {
            FactorizationMethod::Automatic if n <= settings.automatic_localfill_limit => {
                FactorizationMethod::LocalFill
            }
            FactorizationMethod::Automatic => FactorizationMethod::ApproximateMinDegree,
            other => other,
        };
        match method {
            FactorizationMethod::LocalFill => LocalFillOrdering {
                dense_window_threshold: settings.dense_window_threshold,
                max_column_pattern: settings.max_column_pattern,
                dispatcher: ParallelDispatcher::new(
                    settings.thread_count(),
                    settings.parallel_threshold,
                ),
            }
            .into(),
            _ => AmdOrdering {
                dense_scale: settings.amd_dense_scale,
                dense_window_threshold: settings.dense_window_threshold,
            }
            .into(),
        }
    }
}

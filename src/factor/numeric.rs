#![allow(non_snake_case)]

use super::{ColumnStates, FactorError, PerturbationLog, PivotPolicy};
use crate::algebra::*;
use crate::ordering::SymbolicPlan;
use crate::parallel::{AbortCheck, ParallelDispatcher, RunState, SharedSlice};
use std::iter::zip;

// columns between abort polls
const POLL_INTERVAL: usize = 16;

/// Numeric factor `A = L*D*L'` of a symmetrically permuted matrix.
///
/// `L` is lower triangular in inner numbering with the diagonal stored
/// first in each column, and `D = diag(d)` with `d[j]` in `{+1,-1}`.
/// The diagonal of `L` is not unit: `L[j,j] = sqrt(|pivot_j|)`.
#[derive(Debug, Clone)]
pub struct LdlFactor<T> {
    pub L: CscMatrix<T>,
    /// row-wise index of the pattern of `L`
    pub Lt: TransposeIndex,
    pub d: Vec<i8>,
    /// first column of the fully dense trailing block
    pub first_dense: usize,
    // per-column cursors for the row order forward solve
    pub(crate) cursor: Vec<usize>,
    // rough operation count, used to pick serial or parallel runs
    work_units: usize,
}

impl<T: FloatT> LdlFactor<T> {
    /// Allocate a factor over the predicted pattern of `plan`
    pub fn new(plan: &SymbolicPlan) -> Self {
        let n = plan.n();
        let L = CscMatrix::new(
            n,
            n,
            plan.colptr.clone(),
            plan.rowval.clone(),
            vec![T::zero(); plan.nnz()],
        );
        let Lt = TransposeIndex::from_pattern(n, &L.colptr, &L.rowval);
        let work_units = L
            .colptr
            .windows(2)
            .map(|c| (c[1] - c[0]) * (c[1] - c[0]))
            .sum();

        Self {
            L,
            Lt,
            d: vec![1; n],
            first_dense: plan.first_dense,
            cursor: vec![0; n],
            work_units,
        }
    }

    pub fn n(&self) -> usize {
        self.L.n
    }

    pub fn nnz(&self) -> usize {
        self.L.nnz()
    }

    /// Number of positive entries in `D`
    pub fn positive_inertia(&self) -> usize {
        self.d.iter().filter(|&&s| s > 0).count()
    }

    /// Factor in place.   On entry `L.nzval` holds the values of the
    /// permuted input at their factor slots, with zeros elsewhere.
    pub(crate) fn refactor(
        &mut self,
        pivot: &dyn PivotPolicy<T>,
        log: &PerturbationLog<T>,
        dispatcher: &ParallelDispatcher,
        abort: &AbortCheck,
    ) -> Result<(), FactorError> {
        let n = self.n();
        let kernel = ColumnKernel {
            Lp: &self.L.colptr,
            Li: &self.L.rowval,
            Lt: &self.Lt,
            first_dense: self.first_dense,
            Lx: SharedSlice::new(&mut self.L.nzval),
            d: SharedSlice::new(&mut self.d),
            states: ColumnStates::new(n),
            pivot,
            log,
        };

        dispatcher.run(
            n,
            self.work_units,
            || vec![T::zero(); n],
            |work, j, run| {
                if j % POLL_INTERVAL == 0 && abort.should_abort() {
                    return Err(FactorError::Timeout);
                }
                kernel.states.begin(j);
                // Safety: column j is written only by this task, and
                // earlier columns are read only once published
                unsafe { kernel.factor_column(j, work, run)? };
                kernel.states.publish(j);
                Ok(())
            },
        )?;
        Ok(())
    }
}

// Shared state of one numeric factorization run
struct ColumnKernel<'a, T> {
    Lp: &'a [usize],
    Li: &'a [usize],
    Lt: &'a TransposeIndex,
    first_dense: usize,
    Lx: SharedSlice<'a, T>,
    d: SharedSlice<'a, i8>,
    states: ColumnStates,
    pivot: &'a dyn PivotPolicy<T>,
    log: &'a PerturbationLog<T>,
}

impl<T: FloatT> ColumnKernel<'_, T> {
    // Left looking update and scaling of column j.   `work` is a zeroed
    // dense vector of length n and is left zeroed on success.
    unsafe fn factor_column(&self, j: usize, work: &mut [T], run: &RunState) -> Result<(), FactorError> {
        let (f, l) = (self.Lp[j], self.Lp[j + 1]);
        let out = self.Lx.slice_mut(f..l);

        if j >= self.first_dense {
            // full column, so row i sits at offset i - j
            self.cmod(j, out, j, run)?;
        } else {
            let rows = &self.Li[f..l];
            for (&i, &v) in zip(rows, out.iter()) {
                work[i] = v;
            }
            let updated = self.cmod(j, work, 0, run);
            for (&i, v) in zip(rows, out.iter_mut()) {
                *v = work[i];
                work[i] = T::zero();
            }
            updated?;
        }

        // the diagonal is stored first
        let pivot = self.pivot.repair(j, out[0], self.log);
        let negative = pivot < T::zero();
        let s = pivot.abs().sqrt();
        let denom = if negative { -s } else { s };

        out[0] = s;
        let mut finite = s.is_finite();
        for v in out[1..].iter_mut() {
            *v /= denom;
            finite &= v.is_finite();
        }
        self.d.set(j, if negative { -1 } else { 1 });

        if finite {
            Ok(())
        } else {
            Err(FactorError::NumericalBreakdown { column: j })
        }
    }

    // acc[i - offset] -= d[k] * L[j,k] * L[i,k] for every column k < j
    // with an entry in row j, over the rows i >= j of column k
    unsafe fn cmod(&self, j: usize, acc: &mut [T], offset: usize, run: &RunState) -> Result<(), FactorError> {
        let row = self.Lt.row(j);
        // the last entry of row j is the diagonal
        for &k in &row[..row.len() - 1] {
            if !self.states.wait_ready(k, run) {
                // another task failed first and its error is the one
                // reported, so the value here is discarded
                return Err(FactorError::WorkerPanicked);
            }
            let (kf, kl) = (self.Lp[k], self.Lp[k + 1]);
            let p = if k >= self.first_dense {
                kf + (j - k)
            } else {
                kf + self.Li[kf..kl].partition_point(|&r| r < j)
            };

            let colk = self.Lx.slice(p..kl);
            let ljk = colk[0];
            let scale = if self.d.get(k) < 0 { -ljk } else { ljk };

            for (&i, &lik) in zip(&self.Li[p..kl], colk) {
                acc[i - offset] -= scale * lik;
            }
        }
        Ok(())
    }
}

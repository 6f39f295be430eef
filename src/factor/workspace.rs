#![allow(non_snake_case)]

use super::*;
use crate::algebra::*;
use crate::ordering::*;
use crate::parallel::{AbortCheck, AbortFn, ParallelDispatcher};
use crate::settings::FactorSettings;
use crate::timers::*;
use log::{debug, warn};
use std::iter::zip;

/// Symmetric factorization workspace.
///
/// Holds a symmetric matrix together with its symbolic analysis and
/// numeric factor.   The symbolic phase ([`factorize`](Self::factorize))
/// runs once per pattern.   Values may then be refilled and the matrix
/// refactored ([`cholesky`](Self::cholesky)) any number of times against
/// the fixed pattern.
///
/// The input may hold the lower triangle, the upper triangle or both.
/// When both are present only the lower triangle is used, and value
/// updates addressed to strictly upper entries are ignored.
pub struct SymmetricFactorization<T: FloatT> {
    settings: FactorSettings<T>,
    // lower triangle of the input in outer numbering, and the map from
    // input slots into it (usize::MAX for ignored entries)
    lower: CscMatrix<T>,
    input_to_lower: Vec<usize>,
    // symbolic results
    plan: Option<SymbolicPlan>,
    factor: Option<LdlFactor<T>>,
    lower_to_factor: Vec<usize>,
    // numeric state
    pivot: Box<dyn PivotPolicy<T>>,
    perturbations: PerturbationLog<T>,
    factored: bool,
    abort: Option<AbortFn>,
    handicaps: Option<Vec<i8>>,
    timers: Timers,
    work: Vec<T>,
}

impl<T: FloatT> std::fmt::Debug for SymmetricFactorization<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricFactorization")
            .field("n", &self.n())
            .field("nnz", &self.lower.nnz())
            .field("factor_nnz", &self.factor_nnz())
            .field("factored", &self.factored)
            .finish()
    }
}

impl<T: FloatT> SymmetricFactorization<T> {
    pub fn new(matrix: &CscMatrix<T>, settings: FactorSettings<T>) -> Result<Self, FactorError> {
        settings.validate()?;
        if !matrix.is_square() {
            return Err(SparseFormatError::NotSquare.into());
        }
        matrix.check_format()?;

        let (lower, input_to_lower) = matrix.symmetric_lower();
        let pivot = Box::new(ThresholdPivot::new(&settings));
        let n = lower.n;

        Ok(Self {
            settings,
            lower,
            input_to_lower,
            plan: None,
            factor: None,
            lower_to_factor: Vec::new(),
            pivot,
            perturbations: PerturbationLog::new(),
            factored: false,
            abort: None,
            handicaps: None,
            timers: Timers::default(),
            work: vec![T::zero(); n],
        })
    }

    /// Replace the pivot repair policy
    pub fn with_pivot_policy(mut self, policy: Box<dyn PivotPolicy<T>>) -> Self {
        self.set_pivot_policy(policy);
        self
    }

    pub fn set_pivot_policy(&mut self, mut policy: Box<dyn PivotPolicy<T>>) {
        if let Some(plan) = &self.plan {
            policy.prepare(&plan.perm);
        }
        self.pivot = policy;
        self.factored = false;
    }

    /// Caller supplied cancellation predicate, polled during ordering
    /// and numeric factorization alongside the `time_limit` setting.
    pub fn set_abort(&mut self, abort: Option<AbortFn>) {
        self.abort = abort;
    }

    /// Per-column ordering handicaps in outer numbering.   Larger values
    /// push a column later in LocalFill orderings.
    pub fn set_handicaps(&mut self, handicaps: Option<Vec<i8>>) -> Result<(), FactorError> {
        if handicaps.as_ref().is_some_and(|h| h.len() != self.n()) {
            return Err(FactorError::IncompatibleDimension);
        }
        self.handicaps = handicaps;
        Ok(())
    }

    pub fn n(&self) -> usize {
        self.lower.n
    }

    pub fn settings(&self) -> &FactorSettings<T> {
        &self.settings
    }

    fn abort_check(&self) -> AbortCheck {
        AbortCheck::new(self.abort.clone(), self.settings.time_limit)
    }

    // -----------------------------------------------------
    // symbolic phase
    // -----------------------------------------------------

    /// Symbolic analysis.   Computes the ordering (a fill reducing one if
    /// `plan_fill_in`, otherwise the natural order) and commits the
    /// pattern of the factor.   Invalidates any previous numeric factor.
    pub fn factorize(&mut self, plan_fill_in: bool) -> Result<(), FactorError> {
        self.factored = false;
        self.plan = None;
        self.factor = None;
        self.timers.reset();

        let out = timeit! {self.timers => "symbolic"; self.symbolic(plan_fill_in)};
        if let Err(e) = &out {
            warn!("symbolic factorization failed: {e}");
        }
        out
    }

    fn symbolic(&mut self, plan_fill_in: bool) -> Result<(), FactorError> {
        let n = self.n();
        let abort = self.abort_check();
        let strategy = OrderingStrategy::from_settings(&self.settings, plan_fill_in, n);
        let input = SymbolicInput::new(n, &self.lower.colptr, &self.lower.rowval)
            .with_handicaps(self.handicaps.as_deref());

        let plan = timeit!(self.timers => "ordering"; strategy.order(&input, &abort))?;
        debug!(
            "{} ordering: n = {}, input nnz = {}, factor nnz = {}, first dense column = {}",
            strategy.name(),
            n,
            self.lower.nnz(),
            plan.nnz(),
            plan.first_dense
        );

        self.lower_to_factor = _map_to_factor(&self.lower, &plan)?;
        self.pivot.prepare(&plan.perm);
        self.factor = Some(LdlFactor::new(&plan));
        self.plan = Some(plan);
        Ok(())
    }

    // -----------------------------------------------------
    // numeric phase
    // -----------------------------------------------------

    /// Numeric factorization of the current values.   Repeated calls
    /// with unchanged values give identical factors.
    pub fn cholesky(&mut self) -> Result<(), FactorError> {
        self.factored = false;
        let abort = self.abort_check();
        let dispatcher =
            ParallelDispatcher::new(self.settings.thread_count(), self.settings.parallel_threshold);

        let factor = self.factor.as_mut().ok_or(FactorError::NotFactorized)?;

        // reload input values into the factor storage
        factor.L.nzval.fill(T::zero());
        for (&dest, &v) in zip(&self.lower_to_factor, &self.lower.nzval) {
            factor.L.nzval[dest] = v;
        }
        self.perturbations.clear();

        let out = timeit! {self.timers => "numeric";
            factor.refactor(self.pivot.as_ref(), &self.perturbations, &dispatcher, &abort)
        };

        match out {
            Ok(()) => {
                self.factored = true;
                if !self.perturbations.is_empty() {
                    warn!("{} pivots perturbed", self.perturbations.len());
                }
                if self.settings.verbose {
                    self.print_summary();
                }
                Ok(())
            }
            Err(e) => {
                warn!("numeric factorization failed: {e}");
                Err(e)
            }
        }
    }

    // -----------------------------------------------------
    // solves
    // -----------------------------------------------------

    /// Solves `A*x = y` in place
    pub fn solve(&mut self, y: &mut [T]) -> Result<(), FactorError> {
        if !self.factored {
            return Err(FactorError::NotFactorized);
        }
        if y.len() != self.n() {
            return Err(FactorError::IncompatibleDimension);
        }
        let (Some(factor), Some(plan)) = (self.factor.as_mut(), self.plan.as_ref()) else {
            return Err(FactorError::NotFactorized);
        };
        let work = &mut self.work;

        timeit! {self.timers => "solve";
            plan.perm.permute(work, y);
            factor.solve_inner(work);
            plan.perm.ipermute(y, work);
        }
        Ok(())
    }

    /// Solves `L*y = b` in place, with `b` in inner numbering
    pub fn forward_solve(&mut self, x: &mut [T]) -> Result<(), FactorError> {
        self.factored_mut(x.len())?.forward_solve(x);
        Ok(())
    }

    /// Solves `D*z = y` in place, with `y` in inner numbering
    pub fn diagonal_solve(&mut self, x: &mut [T]) -> Result<(), FactorError> {
        self.factored_mut(x.len())?.diagonal_solve(x);
        Ok(())
    }

    /// Solves `L'*x = z` in place, with `z` in inner numbering
    pub fn backward_solve(&mut self, x: &mut [T]) -> Result<(), FactorError> {
        self.factored_mut(x.len())?.backward_solve(x);
        Ok(())
    }

    fn factored_mut(&mut self, len: usize) -> Result<&mut LdlFactor<T>, FactorError> {
        if len != self.n() {
            return Err(FactorError::IncompatibleDimension);
        }
        match self.factor.as_mut() {
            Some(factor) if self.factored => Ok(factor),
            _ => Err(FactorError::NotFactorized),
        }
    }

    // -----------------------------------------------------
    // value refills.   Indices address the slots of the matrix
    // passed to `new`.   A refactor is needed afterwards.
    // -----------------------------------------------------

    /// Replace every value of the input matrix
    pub fn set_values(&mut self, values: &[T]) -> Result<(), FactorError> {
        if values.len() != self.input_to_lower.len() {
            return Err(FactorError::IncompatibleDimension);
        }
        let nzval = &mut self.lower.nzval;
        for (&dest, &v) in zip(&self.input_to_lower, values) {
            if dest != usize::MAX {
                nzval[dest] = v;
            }
        }
        self.factored = false;
        Ok(())
    }

    pub fn update_values(&mut self, indices: &[usize], values: &[T]) {
        assert_eq!(indices.len(), values.len());
        let nzval = &mut self.lower.nzval;
        for (&idx, &v) in zip(indices, values) {
            let dest = self.input_to_lower[idx];
            if dest != usize::MAX {
                nzval[dest] = v;
            }
        }
        self.factored = false;
    }

    pub fn scale_values(&mut self, indices: &[usize], scale: T) {
        let nzval = &mut self.lower.nzval;
        for &idx in indices {
            let dest = self.input_to_lower[idx];
            if dest != usize::MAX {
                nzval[dest] *= scale;
            }
        }
        self.factored = false;
    }

    pub fn offset_values(&mut self, indices: &[usize], offset: T, signs: &[i8]) {
        assert_eq!(indices.len(), signs.len());
        let nzval = &mut self.lower.nzval;
        for (&idx, &sign) in zip(indices, signs) {
            let dest = self.input_to_lower[idx];
            if dest != usize::MAX {
                if sign < 0 {
                    nzval[dest] -= offset;
                } else if sign > 0 {
                    nzval[dest] += offset;
                }
            }
        }
        self.factored = false;
    }

    // -----------------------------------------------------
    // diagnostics
    // -----------------------------------------------------

    pub fn is_factored(&self) -> bool {
        self.factored
    }

    /// Repaired pivots of the last numeric factorization, by inner column
    pub fn perturbations(&mut self) -> Vec<Perturbation<T>> {
        self.perturbations.sorted()
    }

    pub fn perturbation_count(&self) -> usize {
        self.perturbations.len()
    }

    /// Number of positive pivots, or zero before a successful factorization
    pub fn positive_inertia(&self) -> usize {
        match &self.factor {
            Some(factor) if self.factored => factor.positive_inertia(),
            _ => 0,
        }
    }

    /// Stored entries in `L`, zero before the symbolic phase
    pub fn factor_nnz(&self) -> usize {
        self.factor.as_ref().map_or(0, |f| f.nnz())
    }

    pub fn first_dense_column(&self) -> Option<usize> {
        self.plan.as_ref().map(|p| p.first_dense)
    }

    pub fn permutation(&self) -> Option<&Permutation> {
        self.plan.as_ref().map(|p| &p.perm)
    }

    /// Signs of `D` in inner numbering
    pub fn diagonal_factor(&self) -> &[i8] {
        self.factor.as_ref().map_or(&[][..], |f| f.d.as_slice())
    }

    /// The numeric factor, if the last factorization succeeded
    pub fn factor(&self) -> Option<&LdlFactor<T>> {
        self.factor.as_ref().filter(|_| self.factored)
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    fn print_summary(&self) {
        println!("symmetric factorization");
        println!("  dimension        : {}", self.n());
        println!("  input nnz        : {}", self.lower.nnz());
        println!("  factor nnz       : {}", self.factor_nnz());
        if let Some(j) = self.first_dense_column() {
            println!("  dense tail       : {} columns", self.n() - j);
        }
        println!("  positive pivots  : {}", self.positive_inertia());
        println!("  perturbed pivots : {}", self.perturbation_count());
        self.timers.print();
    }
}

// Slot in the factor of every entry of the outer lower triangle
fn _map_to_factor<T: FloatT>(lower: &CscMatrix<T>, plan: &SymbolicPlan) -> Result<Vec<usize>, FactorError> {
    let o2i = plan.perm.outer_to_inner();
    let mut map = vec![0; lower.nnz()];

    for col in 0..lower.n {
        for k in lower.colptr[col]..lower.colptr[col + 1] {
            let (r, c) = (o2i[lower.rowval[k]], o2i[col]);
            let (i, j) = (r.max(c), r.min(c));
            let (f, l) = (plan.colptr[j], plan.colptr[j + 1]);
            let idx = plan.rowval[f..l].binary_search(&i).map_err(|_| {
                FactorError::Ordering(format!("factor pattern is missing entry ({i},{j})"))
            })?;
            map[k] = f + idx;
        }
    }
    Ok(map)
}

#[cfg(test)]
#[path = "test.rs"]
mod test;

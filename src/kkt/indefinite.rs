#![allow(non_snake_case)]

use crate::algebra::*;
use crate::factor::*;
use crate::settings::FactorSettings;
use log::trace;

/// Direct solver for a general symmetric indefinite matrix.
///
/// Wraps a [`SymmetricFactorization`] with the threshold pivot policy,
/// and follows each solve with iterative refinement against the
/// unfactored matrix when enabled in the settings.
#[derive(Debug)]
pub struct IndefiniteSolver<T: FloatT> {
    // the matrix as supplied, for residuals
    K: CscMatrix<T>,
    ws: SymmetricFactorization<T>,

    refine_enable: bool,
    reltol: T,
    abstol: T,
    max_iter: u32,
    stop_ratio: T,
    refine_steps: u32,

    x: Vec<T>,
    e: Vec<T>,
    dx: Vec<T>,
}

impl<T: FloatT> IndefiniteSolver<T> {
    /// `K` may hold the lower, upper or full triangle
    pub fn new(K: &CscMatrix<T>, settings: FactorSettings<T>) -> Result<Self, FactorError> {
        let refine_enable = settings.iterative_refinement_enable;
        let reltol = settings.iterative_refinement_reltol;
        let abstol = settings.iterative_refinement_abstol;
        let max_iter = settings.iterative_refinement_max_iter;
        let stop_ratio = settings.iterative_refinement_stop_ratio;

        let policy = Box::new(ThresholdPivot::new(&settings));
        let ws = SymmetricFactorization::new(K, settings)?.with_pivot_policy(policy);
        let n = K.n;

        Ok(Self {
            K: K.clone(),
            ws,
            refine_enable,
            reltol,
            abstol,
            max_iter,
            stop_ratio,
            refine_steps: 0,
            x: vec![T::zero(); n],
            e: vec![T::zero(); n],
            dx: vec![T::zero(); n],
        })
    }

    /// Symbolic and numeric factorization of the current values
    pub fn factor(&mut self, plan_fill_in: bool) -> Result<(), FactorError> {
        self.ws.factorize(plan_fill_in)?;
        self.ws.cholesky()
    }

    /// Replace every value of the matrix and refactor against the
    /// existing symbolic analysis
    pub fn refactor_with(&mut self, values: &[T]) -> Result<(), FactorError> {
        if values.len() != self.K.nnz() {
            return Err(FactorError::IncompatibleDimension);
        }
        self.K.nzval.copy_from(values);
        self.ws.set_values(values)?;
        self.ws.cholesky()
    }

    /// Solves `K*x = b`.   Returns `Ok(false)` if the solution or its
    /// refinement residual is not finite.
    pub fn solve(&mut self, x: &mut [T], b: &[T]) -> Result<bool, FactorError> {
        if x.len() != self.K.n || b.len() != self.K.n {
            return Err(FactorError::IncompatibleDimension);
        }
        self.refine_steps = 0;
        self.x.copy_from(b);
        self.ws.solve(&mut self.x)?;

        let is_success = if self.refine_enable {
            self.iterative_refinement(b)?
        } else {
            self.x.is_finite()
        };

        if is_success {
            x.copy_from(&self.x);
        }
        Ok(is_success)
    }

    /// Refinement steps accepted or tried during the last solve
    pub fn refine_steps(&self) -> u32 {
        self.refine_steps
    }

    pub fn workspace(&self) -> &SymmetricFactorization<T> {
        &self.ws
    }

    pub fn workspace_mut(&mut self) -> &mut SymmetricFactorization<T> {
        &mut self.ws
    }

    fn iterative_refinement(&mut self, b: &[T]) -> Result<bool, FactorError> {
        let K = &self.K;
        let normb = b.norm_inf();

        //compute the initial error
        let mut norme = _get_refine_error(&mut self.e, b, K, &self.x);

        for _ in 0..self.max_iter {
            // bail on numerical error
            if !norme.is_finite() {
                return Ok(false);
            }

            if norme <= (self.abstol + self.reltol * normb) {
                //within tolerance.  Exit
                break;
            }

            let lastnorme = norme;
            self.refine_steps += 1;

            //make a refinement
            self.dx.copy_from(&self.e);
            self.ws.solve(&mut self.dx)?;

            //prospective solution is x + dx
            self.dx.axpby(T::one(), &self.x, T::one());
            norme = _get_refine_error(&mut self.e, b, K, &self.dx);
            trace!("refinement step {}: residual {:e}", self.refine_steps, norme);

            let improved_ratio = lastnorme / norme;
            if improved_ratio < self.stop_ratio {
                //insufficient improvement.  Exit
                if improved_ratio > T::one() {
                    std::mem::swap(&mut self.x, &mut self.dx);
                }
                break;
            }
            std::mem::swap(&mut self.x, &mut self.dx);
        }
        //NB: "success" means only that we had a finite valued result
        Ok(self.x.is_finite())
    }
}

//  computes e = b - Kξ, overwriting the first argument
//  and returning its norm
fn _get_refine_error<T: FloatT>(e: &mut [T], b: &[T], K: &CscMatrix<T>, ξ: &[T]) -> T {
    e.copy_from(b);
    K.sym().symv(e, ξ, -T::one(), T::one());
    e.norm_inf()
}

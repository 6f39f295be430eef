#![allow(non_snake_case)]

use super::{VariableFlags, VariablePartition};
use crate::algebra::*;
use crate::factor::*;
use crate::parallel::{ParallelDispatcher, SharedSlice};
use crate::settings::FactorSettings;
use log::debug;
use std::iter::zip;

// ordering handicap for the row block, so that primal columns of
// equal score are eliminated first
const ROW_HANDICAP: i8 = 2;

/// Interior point KKT system with simple variables eliminated.
///
/// The full system in primal variables `x` and rows `y` is
/// ```text
/// [Q + D_x    A' ] [dx]   [rx]
/// [   A     -D_r ] [dy] = [ry]
/// ```
/// with `D_x = diag(x_ratio)` and `D_r = diag(1/row_ratio)`.   Variables
/// in the simple block have a positive diagonal `D_s` and no quadratic
/// coupling, so they are eliminated into the row block and the factored
/// system is
/// ```text
/// [Q_aa + D_a        .           ]
/// [   A_a     -(A_s D_s⁻¹ A_s' + D_r)]
/// ```
/// stored as its lower triangle.   The pattern and its symbolic
/// factorization are fixed at construction.   Each call to
/// [`set_blended_values`](Self::set_blended_values) only refills values
/// and refactors.
pub struct BlendedKKT<T: FloatT> {
    partition: VariablePartition,
    m: usize,

    // partial matrices, columns renumbered through the partition
    A_aug: CscMatrix<T>,
    A_simple: CscMatrix<T>,
    A_simple_t: CscMatrix<T>,
    // lower triangle of Q on the augmented block, with every diagonal
    // entry present, and the slots of those diagonals
    Q_aug: CscMatrix<T>,
    Q_aug_diag: Vec<usize>,
    // diagonal of Q over all primal variables
    Q_diag: Vec<T>,

    // lower pattern of A_s D_s⁻¹ A_s' with full diagonal
    P: CscMatrix<T>,
    P_diag: Vec<usize>,

    // assembled lower triangle and the block to K slot maps
    K: CscMatrix<T>,
    map_Q: Vec<usize>,
    map_A: Vec<usize>,
    map_P: Vec<usize>,

    // current simple block diagonal
    D_simple: Vec<T>,
    regularize_delta: T,
    dispatcher: ParallelDispatcher,
    ws: SymmetricFactorization<T>,

    rhs: Vec<T>,
    work_simple: Vec<T>,
}

impl<T: FloatT> BlendedKKT<T> {
    /// Partition the variables, assemble the reduced pattern and run its
    /// symbolic factorization.   `A` is `m x n`.   `Q` is `n x n` in any
    /// triangle storage, and `unbounded` marks variables without bounds.
    pub fn new(
        A: &CscMatrix<T>,
        Q: Option<&CscMatrix<T>>,
        unbounded: &[bool],
        settings: FactorSettings<T>,
    ) -> Result<Self, FactorError> {
        settings.validate()?;
        A.check_format()?;
        let (n, m) = (A.n, A.m);
        if unbounded.len() != n || Q.is_some_and(|Q| Q.m != n || Q.n != n) {
            return Err(FactorError::IncompatibleDimension);
        }

        let Qlower = match Q {
            Some(Q) => {
                Q.check_format()?;
                Q.symmetric_lower().0
            }
            None => CscMatrix::spalloc(n, n, 0),
        };
        let flags = VariableFlags::detect(Some(&Qlower), unbounded);
        let partition = VariablePartition::new(A, &flags, settings.allow_normal);
        let (aug, simple) = (&partition.augmented, &partition.simple);
        let na = aug.len();

        debug!(
            "blended KKT: {} augmented and {} simple variables, {} rows",
            na,
            simple.len(),
            m
        );

        let A_aug = A.select_columns(aug);
        let A_simple = A.select_columns(simple);
        let A_simple_t = A_simple.transpose();
        let (Q_aug, Q_aug_diag) = Qlower.select_principal(aug).with_full_diagonal();
        let Q_diag = (0..n).map(|j| Qlower.at(j, j)).collect();
        let (P, P_diag) = _product_pattern(&A_simple, &A_simple_t);

        // assemble the lower triangle [Q_aug .; A_aug P]
        let dim = na + m;
        let mut K = CscMatrix::spalloc(dim, dim, Q_aug.nnz() + A_aug.nnz() + P.nnz());
        let mut map_Q = vec![0; Q_aug.nnz()];
        let mut map_A = vec![0; A_aug.nnz()];
        let mut map_P = vec![0; P.nnz()];

        K.colptr.fill(0);
        K.colcount_block(&Q_aug, 0);
        K.colcount_block(&A_aug, 0);
        K.colcount_block(&P, na);
        K.colcount_to_colptr();
        K.fill_block(&Q_aug, &mut map_Q, 0, 0);
        K.fill_block(&A_aug, &mut map_A, na, 0);
        K.fill_block(&P, &mut map_P, na, na);
        K.backshift_colptrs();

        let mut signs = vec![1_i8; dim];
        signs[na..].fill(-1);
        let mut handicaps = vec![0_i8; dim];
        handicaps[na..].fill(ROW_HANDICAP);

        let dispatcher = ParallelDispatcher::new(settings.thread_count(), settings.parallel_threshold);
        let regularize_delta = settings.regularize_delta;
        let policy = Box::new(SignedRegularization::from_settings(signs, &settings));
        let mut ws = SymmetricFactorization::new(&K, settings)?.with_pivot_policy(policy);
        ws.set_handicaps(Some(handicaps))?;
        ws.factorize(true)?;

        let nsimple = simple.len();
        Ok(Self {
            partition,
            m,
            A_aug,
            A_simple,
            A_simple_t,
            Q_aug,
            Q_aug_diag,
            Q_diag,
            P,
            P_diag,
            K,
            map_Q,
            map_A,
            map_P,
            D_simple: vec![T::one(); nsimple],
            regularize_delta,
            dispatcher,
            ws,
            rhs: vec![T::zero(); dim],
            work_simple: vec![T::zero(); nsimple],
        })
    }

    pub fn partition(&self) -> &VariablePartition {
        &self.partition
    }

    /// Dimension of the factored system
    pub fn dim(&self) -> usize {
        self.K.n
    }

    /// The underlying factorization, for diagnostics
    pub fn workspace(&self) -> &SymmetricFactorization<T> {
        &self.ws
    }

    /// Refill the system from the current complementarity ratios and
    /// refactor.   `x_ratio` (length `n`) is `z/x` per variable, zero
    /// for free variables.   `row_ratio` (length `m`) is `z/s` per row,
    /// infinite for equality rows.   A zero row ratio is treated as a
    /// row with no effective constraint and gets a large `D_r`.
    pub fn set_blended_values(&mut self, x_ratio: &[T], row_ratio: &[T]) -> Result<(), FactorError> {
        if x_ratio.len() != self.partition.nvars() || row_ratio.len() != self.m {
            return Err(FactorError::IncompatibleDimension);
        }

        for (d, &j) in zip(&mut self.D_simple, &self.partition.simple) {
            *d = T::max(self.Q_diag[j] + x_ratio[j], self.regularize_delta);
        }
        self.update_product()?;

        let Kx = &mut self.K.nzval;
        for (&dest, &v) in zip(&self.map_Q, &self.Q_aug.nzval) {
            Kx[dest] = v;
        }
        for (&slot, &j) in zip(&self.Q_aug_diag, &self.partition.augmented) {
            Kx[self.map_Q[slot]] += x_ratio[j];
        }
        for (&dest, &v) in zip(&self.map_A, &self.A_aug.nzval) {
            Kx[dest] = v;
        }
        for (&dest, &v) in zip(&self.map_P, &self.P.nzval) {
            Kx[dest] = -v;
        }
        for (&slot, &r) in zip(&self.P_diag, row_ratio) {
            Kx[self.map_P[slot]] -= _row_diagonal(r, self.regularize_delta);
        }

        self.ws.set_values(&self.K.nzval)?;
        self.ws.cholesky()
    }

    // values of A_s D_s⁻¹ A_s', one task per column
    fn update_product(&mut self) -> Result<(), FactorError> {
        let m = self.m;
        let (As, AsT, Ds) = (&self.A_simple, &self.A_simple_t, &self.D_simple);
        let (Pp, Pi) = (&self.P.colptr, &self.P.rowval);
        let Px = SharedSlice::new(&mut self.P.nzval);
        let work_units = Pi.len() + As.nnz();

        self.dispatcher.run(
            m,
            work_units,
            || vec![T::zero(); m],
            |acc, j, _| {
                for (k, ajk) in AsT.column_iter(j) {
                    let s = ajk / Ds[k];
                    for (i, aik) in As.column_iter_from(k, j) {
                        acc[i] += s * aik;
                    }
                }
                let rng = Pp[j]..Pp[j + 1];
                // Safety: each task writes only its own column
                let out = unsafe { Px.slice_mut(rng.clone()) };
                for (v, &i) in zip(out, &Pi[rng]) {
                    *v = acc[i];
                    acc[i] = T::zero();
                }
                Ok::<(), FactorError>(())
            },
        )?;
        Ok(())
    }

    /// Solve the full system for `(dx, dy)`, recovering the simple
    /// variables from the reduced solution.
    pub fn solve(&mut self, rhs_x: &[T], rhs_y: &[T], dx: &mut [T], dy: &mut [T]) -> Result<(), FactorError> {
        let n = self.partition.nvars();
        if rhs_x.len() != n || dx.len() != n || rhs_y.len() != self.m || dy.len() != self.m {
            return Err(FactorError::IncompatibleDimension);
        }
        let (aug, simple) = (&self.partition.augmented, &self.partition.simple);
        let na = aug.len();

        // reduced right hand side [r_a; r_y - A_s D_s⁻¹ r_s]
        for (r, &j) in zip(&mut self.rhs, aug) {
            *r = rhs_x[j];
        }
        for ((w, &j), &d) in zip(zip(&mut self.work_simple, simple), &self.D_simple) {
            *w = rhs_x[j] / d;
        }
        let ry = &mut self.rhs[na..];
        ry.copy_from(rhs_y);
        self.A_simple.gemv(ry, &self.work_simple, -T::one(), T::one());

        self.ws.solve(&mut self.rhs)?;

        for (&r, &j) in zip(&self.rhs, aug) {
            dx[j] = r;
        }
        dy.copy_from(&self.rhs[na..]);

        // dx_s = D_s⁻¹ (r_s - A_s' dy)
        for (w, &j) in zip(&mut self.work_simple, simple) {
            *w = rhs_x[j];
        }
        self.A_simple.t().gemv(&mut self.work_simple, dy, -T::one(), T::one());
        for ((&w, &j), &d) in zip(zip(&self.work_simple, simple), &self.D_simple) {
            dx[j] = w / d;
        }
        Ok(())
    }
}

// D_r entry for a row with complementarity ratio r
fn _row_diagonal<T: FloatT>(r: T, delta: T) -> T {
    if r.is_infinite() {
        T::zero()
    } else if r > T::zero() {
        r.recip()
    } else {
        delta.recip()
    }
}

// Lower pattern of As*As' with every diagonal present.   Returns the
// pattern with zero values and the slot of each diagonal entry.
fn _product_pattern<T: FloatT>(As: &CscMatrix<T>, AsT: &CscMatrix<T>) -> (CscMatrix<T>, Vec<usize>) {
    let m = As.m;
    let mut mark = vec![usize::MAX; m];
    let mut colptr = Vec::with_capacity(m + 1);
    let mut rowval = Vec::new();
    let mut diag = Vec::with_capacity(m);

    colptr.push(0);
    for j in 0..m {
        let start = rowval.len();
        mark[j] = j;
        rowval.push(j);
        for (k, _) in AsT.column_iter(j) {
            for (i, _) in As.column_iter_from(k, j + 1) {
                if mark[i] != j {
                    mark[i] = j;
                    rowval.push(i);
                }
            }
        }
        // the diagonal is the smallest row, so it stays first
        rowval[start..].sort_unstable();
        diag.push(start);
        colptr.push(rowval.len());
    }
    let nnz = rowval.len();
    (CscMatrix::new(m, m, colptr, rowval, vec![T::zero(); nnz]), diag)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::FactorSettingsBuilder;

    // Q upper triangle, 5 x 5
    //  [2  .  .5 .3 . ]
    //  [   .  .  .  . ]
    //  [      1  .  . ]
    //  [         1.5 .]
    //  [             3]
    fn test_Q() -> CscMatrix<f64> {
        CscMatrix::new(
            5,
            5,
            vec![0, 1, 1, 3, 5, 6],
            vec![0, 0, 2, 0, 3, 4],
            vec![2., 0.5, 1., 0.3, 1.5, 3.],
        )
    }

    // A = [1  2  .  .  1 ]
    //     [.  1 -1  .  3 ]
    //     [-1 .  . .5  1 ]
    fn test_A() -> CscMatrix<f64> {
        CscMatrix::new(
            3,
            5,
            vec![0, 2, 4, 5, 6, 9],
            vec![0, 2, 0, 1, 1, 2, 0, 1, 2],
            vec![1., -1., 2., 1., -1., 0.5, 1., 3., 1.],
        )
    }

    const UNBOUNDED: [bool; 5] = [false, false, false, true, false];

    // infinity norm of the full system residual
    fn kkt_residual(
        x_ratio: &[f64],
        row_ratio: &[f64],
        dx: &[f64],
        dy: &[f64],
        rx: &[f64],
        ry: &[f64],
    ) -> f64 {
        let (Q, A) = (test_Q(), test_A());
        let mut r1 = vec![0.; 5];
        Q.sym().symv(&mut r1, dx, 1., 0.);
        A.t().gemv(&mut r1, dy, 1., 1.);
        let mut r2 = vec![0.; 3];
        A.gemv(&mut r2, dx, 1., 0.);

        let e1 = (0..5).map(|j| (r1[j] + x_ratio[j] * dx[j] - rx[j]).abs());
        let e2 = (0..3).map(|i| (r2[i] - _row_diagonal(row_ratio[i], 2e-7) * dy[i] - ry[i]).abs());
        e1.chain(e2).fold(0., f64::max)
    }

    fn solve_system(kkt: &mut BlendedKKT<f64>, rx: &[f64], ry: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut dx = vec![0.; 5];
        let mut dy = vec![0.; 3];
        kkt.solve(rx, ry, &mut dx, &mut dy).unwrap();
        (dx, dy)
    }

    #[test]
    fn test_blended_partition_and_solve() {
        let mut kkt = BlendedKKT::new(&test_A(), Some(&test_Q()), &UNBOUNDED, FactorSettings::default()).unwrap();

        assert_eq!(kkt.partition().augmented, vec![0, 2, 3]);
        assert_eq!(kkt.partition().simple, vec![1, 4]);
        assert_eq!(kkt.dim(), 6);

        let x_ratio = [0.5, 2.0, 1.0, 0.0, 0.7];
        let row_ratio = [1.0, f64::INFINITY, 4.0];
        kkt.set_blended_values(&x_ratio, &row_ratio).unwrap();

        // quasidefinite, so no regularization is needed
        assert_eq!(kkt.workspace().perturbation_count(), 0);
        assert_eq!(kkt.workspace().positive_inertia(), 3);

        let rx = [1., -2., 0.5, 3., 1.];
        let ry = [0.25, -1., 2.];
        let (dx, dy) = solve_system(&mut kkt, &rx, &ry);
        assert!(kkt_residual(&x_ratio, &row_ratio, &dx, &dy, &rx, &ry) < 1e-10);
    }

    #[test]
    fn test_blended_refill_keeps_pattern() {
        let mut kkt = BlendedKKT::new(&test_A(), Some(&test_Q()), &UNBOUNDED, FactorSettings::default()).unwrap();
        let rx = [1., 1., 1., 1., 1.];
        let ry = [1., 1., 1.];

        kkt.set_blended_values(&[1., 1., 1., 1., 1.], &[1., 1., 1.]).unwrap();
        let nnz = kkt.workspace().factor_nnz();
        let perm = kkt.workspace().permutation().cloned();

        for scale in [1e-3, 0.1, 10., 1e3] {
            let x_ratio = [scale, 2. * scale, scale, 0., scale];
            let row_ratio = [scale, f64::INFINITY, 1. / scale];
            kkt.set_blended_values(&x_ratio, &row_ratio).unwrap();
            assert_eq!(kkt.workspace().factor_nnz(), nnz);
            assert_eq!(kkt.workspace().permutation().cloned(), perm);

            let (dx, dy) = solve_system(&mut kkt, &rx, &ry);
            assert!(kkt_residual(&x_ratio, &row_ratio, &dx, &dy, &rx, &ry) < 1e-8);
        }
    }

    #[test]
    fn test_blended_without_normal_equations() {
        let settings = FactorSettingsBuilder::default().allow_normal(false).build().unwrap();
        let mut kkt = BlendedKKT::new(&test_A(), Some(&test_Q()), &UNBOUNDED, settings).unwrap();
        assert!(kkt.partition().simple.is_empty());
        assert_eq!(kkt.dim(), 8);

        // an equality row would have a zero diagonal here
        let x_ratio = [0.5, 2.0, 1.0, 0.0, 0.7];
        let row_ratio = [1.0, 2.0, 4.0];
        kkt.set_blended_values(&x_ratio, &row_ratio).unwrap();
        assert_eq!(kkt.workspace().perturbation_count(), 0);

        let rx = [1., -2., 0.5, 3., 1.];
        let ry = [0.25, -1., 2.];
        let (dx, dy) = solve_system(&mut kkt, &rx, &ry);
        assert!(kkt_residual(&x_ratio, &row_ratio, &dx, &dy, &rx, &ry) < 1e-10);
    }

    #[test]
    fn test_blended_thread_count_invariant() {
        let x_ratio = [0.5, 2.0, 1.0, 0.0, 0.7];
        let row_ratio = [1.0, f64::INFINITY, 4.0];
        let rx = [1., -2., 0.5, 3., 1.];
        let ry = [0.25, -1., 2.];

        let mut results = Vec::new();
        for threads in [1, 3] {
            let settings = FactorSettingsBuilder::default()
                .max_threads(threads)
                .parallel_threshold(0)
                .build()
                .unwrap();
            let mut kkt = BlendedKKT::new(&test_A(), Some(&test_Q()), &UNBOUNDED, settings).unwrap();
            kkt.set_blended_values(&x_ratio, &row_ratio).unwrap();
            results.push(solve_system(&mut kkt, &rx, &ry));
        }
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_product_pattern() {
        // As = [1 .]
        //      [. 1]
        //      [1 1]
        let As = CscMatrix::new(3, 2, vec![0, 2, 4], vec![0, 2, 1, 2], vec![1., 1., 1., 1.]);
        let (P, diag) = _product_pattern(&As, &As.transpose());
        assert_eq!(P.colptr, vec![0, 2, 4, 5]);
        assert_eq!(P.rowval, vec![0, 2, 1, 2, 2]);
        assert_eq!(diag, vec![0, 2, 4]);
    }

    #[test]
    fn test_blended_bad_dimensions() {
        let A = test_A();
        assert!(matches!(
            BlendedKKT::new(&A, Some(&test_Q()), &[false; 4], FactorSettings::default()),
            Err(FactorError::IncompatibleDimension)
        ));

        let mut kkt = BlendedKKT::new(&A, None, &[false; 5], FactorSettings::default()).unwrap();
        assert_eq!(kkt.partition().simple.len(), 5);
        assert!(matches!(
            kkt.set_blended_values(&[1.; 5], &[1.; 2]),
            Err(FactorError::IncompatibleDimension)
        ));
    }
}

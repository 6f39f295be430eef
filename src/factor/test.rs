use super::*;
use crate::algebra::{CscMatrix, FloatT, SymMatrixVectorMultiply, VectorMath};
use crate::settings::{FactorSettingsBuilder, FactorizationMethod};
use std::iter::zip;

// tests for the factorization workspace.   Configured as a submodule
// of the workspace to reach its internals.

fn test_matrix_3x3() -> CscMatrix<f64> {
    // A =
    //[ 4.0   1.0    ⋅ ]
    //[ 1.0   4.0   1.0]
    //[  ⋅    1.0   4.0]
    // held as the lower triangle
    CscMatrix::new(
        3,
        3,
        vec![0, 2, 4, 5],
        vec![0, 1, 1, 2, 2],
        vec![4., 1., 4., 1., 4.],
    )
}

// lower triangle of a shifted 2d laplacian on an nx by ny grid,
// with diagonal `diag`
fn grid_laplacian(nx: usize, ny: usize, diag: f64) -> CscMatrix<f64> {
    let n = nx * ny;
    let mut colptr = vec![0];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let c = j * nx + i;
            rowval.push(c);
            nzval.push(diag);
            if i + 1 < nx {
                rowval.push(c + 1);
                nzval.push(-1.);
            }
            if j + 1 < ny {
                rowval.push(c + nx);
                nzval.push(-1.);
            }
            colptr.push(rowval.len());
        }
    }
    CscMatrix::new(n, n, colptr, rowval, nzval)
}

fn residual_norm<T: FloatT>(A: &CscMatrix<T>, x: &[T], b: &[T]) -> T {
    let mut r = b.to_vec();
    A.sym().symv(&mut r, x, T::one(), -T::one());
    r.norm_inf()
}

fn settings_with_threads(threads: u32) -> crate::settings::FactorSettings<f64> {
    FactorSettingsBuilder::default()
        .max_threads(threads)
        .parallel_threshold(0)
        .build()
        .unwrap()
}

#[test]
fn test_solve_3x3_natural() {
    let A = test_matrix_3x3();
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    ws.factorize(false).unwrap();
    ws.cholesky().unwrap();

    let b = vec![1., 2., 3.];
    let mut x = b.clone();
    ws.solve(&mut x).unwrap();

    assert!(residual_norm(&A, &x, &b) < 1e-9);
    assert_eq!(ws.positive_inertia(), 3);
    assert_eq!(ws.perturbation_count(), 0);
    assert_eq!(ws.permutation().unwrap(), &Permutation::identity(3));
}

#[test]
fn test_storage_forms_agree() {
    let lower = test_matrix_3x3();
    let upper = lower.transpose();
    let full = CscMatrix::new(
        3,
        3,
        vec![0, 2, 5, 7],
        vec![0, 1, 0, 1, 2, 1, 2],
        vec![4., 1., 1., 4., 1., 1., 4.],
    );

    let b = vec![1., -2., 0.5];
    let mut solutions = Vec::new();
    for M in [&lower, &upper, &full] {
        let mut ws = SymmetricFactorization::new(M, Default::default()).unwrap();
        ws.factorize(true).unwrap();
        ws.cholesky().unwrap();
        let mut x = b.clone();
        ws.solve(&mut x).unwrap();
        solutions.push(x);
    }
    assert!(solutions[0].norm_inf_diff(&solutions[1]) < 1e-12);
    assert!(solutions[0].norm_inf_diff(&solutions[2]) < 1e-12);
}

#[test]
fn test_factor_reconstructs_matrix() {
    // L*D*L' should reproduce the permuted matrix exactly in pattern
    // and closely in value
    let A = grid_laplacian(4, 3, 4.5);
    let n = A.n;
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    ws.factorize(true).unwrap();
    ws.cholesky().unwrap();

    let factor = ws.factor().unwrap();
    let o2i = ws.permutation().unwrap().outer_to_inner().to_vec();
    let L = &factor.L;

    let mut dense = vec![vec![0.; n]; n];
    for k in 0..n {
        let dk = factor.d[k] as f64;
        for (i, lik) in L.column_iter(k) {
            for (j, ljk) in L.column_iter(k) {
                dense[i][j] += lik * dk * ljk;
            }
        }
    }
    for col in 0..n {
        for row in 0..n {
            let expected = A.sym().at(row, col);
            let got = dense[o2i[row]][o2i[col]];
            assert!((expected - got).abs() < 1e-12);
        }
    }
}

#[test]
fn test_cholesky_is_repeatable() {
    let A = grid_laplacian(6, 5, 4.0);
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    ws.factorize(true).unwrap();

    ws.cholesky().unwrap();
    let first = ws.factor().unwrap().L.nzval.clone();
    ws.cholesky().unwrap();
    let second = ws.factor().unwrap().L.nzval.clone();

    assert_eq!(first, second);
}

#[test]
fn test_thread_count_bit_identical() {
    // indefinite, so both signs appear in D
    let A = grid_laplacian(12, 10, 0.5);
    let b: Vec<f64> = (0..A.n).map(|i| (i as f64).sin()).collect();

    let mut results = Vec::new();
    for threads in [1, 2, 4, 7] {
        let mut ws = SymmetricFactorization::new(&A, settings_with_threads(threads)).unwrap();
        ws.factorize(true).unwrap();
        ws.cholesky().unwrap();
        let mut x = b.clone();
        ws.solve(&mut x).unwrap();
        let bits: Vec<u64> = ws.factor().unwrap().L.nzval.iter().map(|v| v.to_bits()).collect();
        results.push((bits, x, ws.diagonal_factor().to_vec()));
    }
    for r in &results[1..] {
        assert_eq!(r.0, results[0].0);
        assert_eq!(r.1, results[0].1);
        assert_eq!(r.2, results[0].2);
    }
    assert!(results[0].1.is_finite());
}

#[test]
fn test_dense_tail_matches_sparse() {
    let A = grid_laplacian(5, 5, 4.0);
    let b = vec![1.; A.n];

    let mut solutions = Vec::new();
    for threshold in [1.0, 0.0] {
        let settings = FactorSettingsBuilder::default()
            .dense_window_threshold(threshold)
            .factorization_method(FactorizationMethod::LocalFill)
            .build()
            .unwrap();
        let mut ws = SymmetricFactorization::new(&A, settings).unwrap();
        ws.factorize(true).unwrap();
        ws.cholesky().unwrap();
        let mut x = b.clone();
        ws.solve(&mut x).unwrap();
        solutions.push((x, ws.first_dense_column().unwrap()));
    }
    // a zero threshold makes every column dense
    assert_eq!(solutions[1].1, 0);
    assert!(solutions[0].0.norm_inf_diff(&solutions[1].0) < 1e-10);
}

#[test]
fn test_singular_pivot_repaired() {
    // [[1,1],[1,1]] is singular.  The second pivot cancels exactly
    let A = CscMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![1., 1., 1.]);
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    ws.factorize(false).unwrap();
    ws.cholesky().unwrap();

    let perturbations = ws.perturbations();
    assert_eq!(perturbations.len(), 1);
    assert_eq!(perturbations[0].index, 1);
    assert_eq!(perturbations[0].original, 0.);
    assert_eq!(perturbations[0].replacement, 1e-30);

    let mut x = vec![1., 2.];
    ws.solve(&mut x).unwrap();
    assert!(x.is_finite());
}

#[test]
fn test_signed_regularization_inertia() {
    // quasidefinite [[2, 1],[1, -3]] with the expected signs
    let A = CscMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![2., 1., -3.]);
    let settings = crate::settings::FactorSettings::<f64>::default();
    let policy = SignedRegularization::from_settings(vec![1, -1], &settings);
    let mut ws = SymmetricFactorization::new(&A, settings)
        .unwrap()
        .with_pivot_policy(Box::new(policy));
    ws.factorize(true).unwrap();
    ws.cholesky().unwrap();

    assert_eq!(ws.positive_inertia(), 1);
    assert_eq!(ws.perturbation_count(), 0);

    // a wrongly signed block gets regularized
    ws.update_values(&[2], &[0.5]);
    ws.cholesky().unwrap();
    assert_eq!(ws.perturbation_count(), 1);
    assert_eq!(ws.positive_inertia(), 1);
}

#[test]
fn test_not_factorized() {
    let A = test_matrix_3x3();
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    assert!(matches!(ws.cholesky(), Err(FactorError::NotFactorized)));

    let mut x = vec![1., 2., 3.];
    assert!(matches!(ws.solve(&mut x), Err(FactorError::NotFactorized)));

    ws.factorize(false).unwrap();
    assert!(matches!(ws.solve(&mut x), Err(FactorError::NotFactorized)));
    assert!(matches!(ws.forward_solve(&mut x), Err(FactorError::NotFactorized)));

    ws.cholesky().unwrap();
    let mut short = vec![1., 2.];
    assert!(matches!(ws.solve(&mut short), Err(FactorError::IncompatibleDimension)));

    // refilling values invalidates the factor until the next cholesky
    ws.scale_values(&[0], 2.0);
    assert!(matches!(ws.solve(&mut x), Err(FactorError::NotFactorized)));
}

#[test]
fn test_value_refills() {
    let A = test_matrix_3x3();
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    ws.factorize(true).unwrap();

    // diagonal slots of the lower storage
    let diag = [0, 2, 4];
    ws.update_values(&diag, &[2., 2., 2.]);
    ws.scale_values(&diag, 2.0);
    ws.offset_values(&diag, 1.0, &[1, -1, 1]);
    ws.cholesky().unwrap();

    let mut expected = A.clone();
    expected.nzval = vec![5., 1., 3., 1., 5.];

    let b = vec![1., 2., 3.];
    let mut x = b.clone();
    ws.solve(&mut x).unwrap();
    assert!(residual_norm(&expected, &x, &b) < 1e-12);

    ws.set_values(&[4., 1., 4., 1., 4.]).unwrap();
    ws.cholesky().unwrap();
    let mut x = b.clone();
    ws.solve(&mut x).unwrap();
    assert!(residual_norm(&A, &x, &b) < 1e-12);

    assert!(matches!(
        ws.set_values(&[1.]),
        Err(FactorError::IncompatibleDimension)
    ));
}

#[test]
fn test_staged_solves_compose() {
    let A = grid_laplacian(3, 4, 4.0);
    let n = A.n;
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    ws.factorize(true).unwrap();
    ws.cholesky().unwrap();

    let b: Vec<f64> = (0..n).map(|i| i as f64 - 2.0).collect();
    let mut x = b.clone();
    ws.solve(&mut x).unwrap();

    let perm = ws.permutation().unwrap().clone();
    let mut y = vec![0.; n];
    perm.permute(&mut y, &b);
    ws.forward_solve(&mut y).unwrap();
    ws.diagonal_solve(&mut y).unwrap();
    ws.backward_solve(&mut y).unwrap();
    let mut z = vec![0.; n];
    perm.ipermute(&mut z, &y);

    assert!(zip(&x, &z).all(|(a, b)| a == b));
}

#[test]
fn test_time_limit() {
    let A = grid_laplacian(4, 4, 4.0);
    let settings = FactorSettingsBuilder::default().time_limit(0.0).build().unwrap();
    let mut ws = SymmetricFactorization::new(&A, settings).unwrap();
    assert!(matches!(ws.factorize(true), Err(FactorError::Timeout)));
    assert!(matches!(ws.cholesky(), Err(FactorError::NotFactorized)));
}

#[test]
fn test_abort_predicate() {
    use std::sync::Arc;
    let A = grid_laplacian(4, 4, 4.0);
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    ws.factorize(true).unwrap();

    ws.set_abort(Some(Arc::new(|| true)));
    assert!(matches!(ws.cholesky(), Err(FactorError::Timeout)));
    assert!(!ws.is_factored());

    ws.set_abort(None);
    ws.cholesky().unwrap();
    assert!(ws.is_factored());
}

#[test]
fn test_numerical_breakdown() {
    let A = CscMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![1., f64::INFINITY, 1.]);
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    ws.factorize(false).unwrap();
    let out = ws.cholesky();
    match out {
        Err(FactorError::WorkerFailure(inner)) => {
            assert!(matches!(*inner, FactorError::NumericalBreakdown { column: 0 }))
        }
        _ => panic!("expected a numerical breakdown"),
    }
    assert_eq!(ws.positive_inertia(), 0);
}

#[test]
fn test_bad_inputs() {
    let rect = CscMatrix::<f64>::spalloc(2, 3, 0);
    assert!(matches!(
        SymmetricFactorization::new(&rect, Default::default()),
        Err(FactorError::Format(_))
    ));

    let A = test_matrix_3x3();
    let mut ws = SymmetricFactorization::new(&A, Default::default()).unwrap();
    assert!(matches!(
        ws.set_handicaps(Some(vec![0; 2])),
        Err(FactorError::IncompatibleDimension)
    ));
    assert!(ws.set_handicaps(Some(vec![0, 2, 0])).is_ok());
}

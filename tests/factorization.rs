#![allow(non_snake_case)]

use std::collections::BTreeMap;
use symfact::{algebra::*, factor::*, settings::*};

// small deterministic generator for test data
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    // uniform on [0,1)
    fn uniform(&mut self) -> f64 {
        self.next() as f64 / (1u64 << 31) as f64
    }
}

// Lower triangle of a random diagonally dominant matrix.   Diagonals of
// the first `npos` columns are positive and the rest negative, so the
// result is quasidefinite (and positive definite if npos == n).
fn random_quasidefinite(n: usize, npos: usize, density: f64, seed: u64) -> CscMatrix<f64> {
    let mut rng = Lcg(seed);
    let mut entries = BTreeMap::new();
    let mut rowsum = vec![0.0; n];

    for j in 0..n {
        for i in (j + 1)..n {
            if rng.uniform() < density {
                let v = 2.0 * rng.uniform() - 1.0;
                entries.insert((j, i), v);
                rowsum[i] += f64::abs(v);
                rowsum[j] += f64::abs(v);
            }
        }
    }

    let mut triplets: Vec<_> = entries.into_iter().map(|((j, i), v)| (i, j, v)).collect();
    for (j, s) in rowsum.iter().enumerate() {
        let d = 1.0 + s;
        triplets.push((j, j, if j < npos { d } else { -d }));
    }
    CscMatrix::from_triplets(n, n, &triplets, DuplicatePolicy::KeepFirst).unwrap()
}

fn residual_norm(A: &CscMatrix<f64>, x: &[f64], b: &[f64]) -> f64 {
    let mut r = b.to_vec();
    A.sym().symv(&mut r, x, 1.0, -1.0);
    r.norm_inf()
}

fn settings(method: FactorizationMethod, threads: u32) -> FactorSettings<f64> {
    FactorSettingsBuilder::default()
        .factorization_method(method)
        .max_threads(threads)
        .parallel_threshold(0)
        .build()
        .unwrap()
}

fn factor_and_solve(A: &CscMatrix<f64>, settings: FactorSettings<f64>, plan_fill_in: bool) -> (Vec<f64>, SymmetricFactorization<f64>) {
    let mut ws = SymmetricFactorization::new(A, settings).unwrap();
    ws.factorize(plan_fill_in).unwrap();
    ws.cholesky().unwrap();

    let mut x = rhs(A.n);
    ws.solve(&mut x).unwrap();
    (x, ws)
}

fn rhs(n: usize) -> Vec<f64> {
    (0..n).map(|i| 1.0 + (i % 7) as f64).collect()
}

#[test]
fn test_spd_round_trip_every_ordering() {
    let A = random_quasidefinite(60, 60, 0.08, 1);
    let b = rhs(60);

    for method in [
        FactorizationMethod::Automatic,
        FactorizationMethod::ApproximateMinDegree,
        FactorizationMethod::LocalFill,
    ] {
        let (x, ws) = factor_and_solve(&A, settings(method, 1), true);
        assert!(residual_norm(&A, &x, &b) < 1e-9, "{method:?}");
        assert_eq!(ws.positive_inertia(), 60);
        assert_eq!(ws.perturbation_count(), 0);
    }

    let (x, ws) = factor_and_solve(&A, settings(FactorizationMethod::Automatic, 1), false);
    assert!(residual_norm(&A, &x, &b) < 1e-9);
    assert_eq!(ws.permutation().unwrap().inner_to_outer(), (0..60).collect::<Vec<_>>());
}

#[test]
fn test_permutation_is_bijection() {
    let A = random_quasidefinite(80, 40, 0.05, 2);

    for method in [FactorizationMethod::ApproximateMinDegree, FactorizationMethod::LocalFill] {
        let (_, ws) = factor_and_solve(&A, settings(method, 2), true);
        let perm = ws.permutation().unwrap();
        let (i2o, o2i) = (perm.inner_to_outer(), perm.outer_to_inner());

        assert_eq!(i2o.len(), 80);
        for i in 0..80 {
            assert_eq!(o2i[i2o[i]], i);
            assert_eq!(i2o[o2i[i]], i);
        }
    }
}

#[test]
fn test_refactor_is_idempotent() {
    let A = random_quasidefinite(50, 30, 0.1, 3);
    let mut ws = SymmetricFactorization::new(&A, settings(FactorizationMethod::LocalFill, 3)).unwrap();
    ws.factorize(true).unwrap();

    ws.cholesky().unwrap();
    let first = ws.factor().unwrap().clone();
    ws.cholesky().unwrap();
    let second = ws.factor().unwrap();

    assert_eq!(first.L.nzval, second.L.nzval);
    assert_eq!(first.d, second.d);
}

#[test]
fn test_thread_count_does_not_change_results() {
    let A = random_quasidefinite(120, 70, 0.04, 4);
    let b = rhs(120);

    let (x1, ws1) = factor_and_solve(&A, settings(FactorizationMethod::LocalFill, 1), true);
    assert!(residual_norm(&A, &x1, &b) < 1e-9);
    assert_eq!(ws1.positive_inertia(), 70);

    for threads in [2, 4, 8] {
        let (x, ws) = factor_and_solve(&A, settings(FactorizationMethod::LocalFill, threads), true);
        assert_eq!(ws.permutation(), ws1.permutation());
        assert_eq!(ws.factor().unwrap().L.nzval, ws1.factor().unwrap().L.nzval);
        assert_eq!(x, x1);
    }
}

#[test]
fn test_small_indefinite_system() {
    // [[2,1,0],[1,-3,1],[0,1,2]] stored upper
    let A = CscMatrix::new(
        3,
        3,
        vec![0, 1, 3, 5],
        vec![0, 0, 1, 1, 2],
        vec![2., 1., -3., 1., 2.],
    );
    let b = rhs(3);
    let (x, ws) = factor_and_solve(&A, FactorSettings::default(), true);
    assert!(residual_norm(&A, &x, &b) < 1e-12);
    assert_eq!(ws.positive_inertia(), 2);
}

#[test]
fn test_zero_pivot_is_perturbed() {
    // [[1,1],[1,1]] is singular, and its second pivot is exactly zero
    let A = CscMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![1., 1., 1.]);
    let mut ws = SymmetricFactorization::new(&A, FactorSettings::default()).unwrap();
    ws.factorize(false).unwrap();
    ws.cholesky().unwrap();

    let perturbed = ws.perturbations();
    assert_eq!(perturbed.len(), 1);
    assert_eq!(perturbed[0].index, 1);
    assert_eq!(perturbed[0].original, 0.0);
    assert_eq!(perturbed[0].replacement, 1e-30);

    let mut x = vec![2., 2.];
    ws.solve(&mut x).unwrap();
    assert!(x.iter().all(|v| f64::is_finite(*v)));
}

#[test]
fn test_interior_zero_pivot_stays_finite() {
    // lower triangle of [[1,1,0],[1,1,1],[0,1,2]].   The second pivot is
    // exactly zero and the third column still depends on it.
    let A = CscMatrix::new(
        3,
        3,
        vec![0, 2, 4, 5],
        vec![0, 1, 1, 2, 2],
        vec![1., 1., 1., 1., 2.],
    );
    let mut ws = SymmetricFactorization::new(&A, FactorSettings::default()).unwrap();
    ws.factorize(false).unwrap();
    ws.cholesky().unwrap();

    let perturbed = ws.perturbations();
    assert_eq!(perturbed.len(), 1);
    assert_eq!(perturbed[0].index, 1);
    assert_eq!(perturbed[0].original, 0.0);

    let L = &ws.factor().unwrap().L;
    assert!(L.nzval.iter().all(|v| f64::is_finite(*v)));

    let mut x = vec![1., 2., 3.];
    ws.solve(&mut x).unwrap();
    assert!(x.iter().all(|v| f64::is_finite(*v)));
}

#[test]
fn test_supernodes_create_no_fill() {
    // ten dense 3x3 blocks on the variables {k, k+10, k+20}
    let n = 30;
    let mut triplets = Vec::new();
    for k in 0..10 {
        let vars = [k, k + 10, k + 20];
        for (a, &i) in vars.iter().enumerate() {
            triplets.push((i, i, 4.0));
            for &j in &vars[..a] {
                triplets.push((i, j, 1.0));
            }
        }
    }
    let A = CscMatrix::from_triplets(n, n, &triplets, DuplicatePolicy::KeepFirst).unwrap();

    let (x, ws) = factor_and_solve(&A, settings(FactorizationMethod::LocalFill, 1), true);
    assert!(residual_norm(&A, &x, &rhs(n)) < 1e-12);
    assert_eq!(ws.factor_nnz(), A.nnz());

    // block members land next to each other
    let o2i = ws.permutation().unwrap().outer_to_inner();
    for k in 0..10 {
        let mut pos = [o2i[k], o2i[k + 10], o2i[k + 20]];
        pos.sort();
        assert_eq!(pos[2] - pos[0], 2);
    }
}

#[test]
fn test_zero_dense_window_is_fully_dense() {
    let A = random_quasidefinite(25, 25, 0.1, 5);
    let settings = FactorSettingsBuilder::default()
        .factorization_method(FactorizationMethod::LocalFill)
        .dense_window_threshold(0.0)
        .build()
        .unwrap();

    let (x, ws) = factor_and_solve(&A, settings, true);
    assert_eq!(ws.first_dense_column(), Some(0));
    assert_eq!(ws.factor_nnz(), 25 * 26 / 2);
    assert!(residual_norm(&A, &x, &rhs(25)) < 1e-9);
}

#[test]
fn test_refill_then_refactor() {
    let A = random_quasidefinite(40, 40, 0.1, 6);
    let mut ws = SymmetricFactorization::new(&A, FactorSettings::default()).unwrap();
    ws.factorize(true).unwrap();
    ws.cholesky().unwrap();

    // scale every value, as an interior point iteration would refill them
    let mut B = A.clone();
    B.nzval.iter_mut().for_each(|v| *v *= 3.0);
    ws.set_values(&B.nzval).unwrap();
    assert!(!ws.is_factored());
    ws.cholesky().unwrap();

    let b = rhs(40);
    let mut x = b.clone();
    ws.solve(&mut x).unwrap();
    assert!(residual_norm(&B, &x, &b) < 1e-9);
}

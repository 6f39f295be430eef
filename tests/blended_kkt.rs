#![allow(non_snake_case)]

use symfact::{algebra::*, kkt::*, settings::*};

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn uniform(&mut self) -> f64 {
        self.next() as f64 / (1u64 << 31) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() as usize) % n
    }
}

struct Problem {
    A: CscMatrix<f64>,
    Q: CscMatrix<f64>,
    unbounded: Vec<bool>,
}

// An m x n constraint matrix with a few entries per column and one dense
// column, and a Q holding a diagonal on every third variable plus a few
// couplings.   Unbounded variables always carry a diagonal term.
fn random_problem(m: usize, n: usize, seed: u64) -> Problem {
    let mut rng = Lcg(seed);

    let mut triplets = Vec::new();
    for j in 0..n - 1 {
        for _ in 0..2 {
            triplets.push((rng.below(m), j, 2.0 * rng.uniform() - 1.0));
        }
    }
    for i in 0..m {
        triplets.push((i, n - 1, 1.0));
        // every row touches a variable that is never coupled, so the
        // reduced row block is definite even for equality rows
        triplets.push((i, 6 * (i % ((n - 1) / 6)) + 1, 1.0));
    }
    let A = CscMatrix::from_triplets(m, n, &triplets, DuplicatePolicy::Sum).unwrap();

    let mut qtrip = Vec::new();
    let mut unbounded = vec![false; n];
    for j in (0..n).step_by(3) {
        qtrip.push((j, j, 1.0 + rng.uniform()));
        unbounded[j] = j % 2 == 0;
    }
    for j in (0..n - 6).step_by(12) {
        // upper triangle coupling between two diagonal carrying variables
        qtrip.push((j, j + 6, 0.1));
    }
    let Q = CscMatrix::from_triplets(n, n, &qtrip, DuplicatePolicy::KeepFirst).unwrap();

    Problem { A, Q, unbounded }
}

fn row_diagonal(r: f64) -> f64 {
    if r.is_infinite() {
        0.0
    } else {
        1.0 / r
    }
}

fn kkt_residual(p: &Problem, x_ratio: &[f64], row_ratio: &[f64], dx: &[f64], dy: &[f64], rx: &[f64], ry: &[f64]) -> f64 {
    let (m, n) = (p.A.m, p.A.n);
    let mut r1 = vec![0.; n];
    p.Q.sym().symv(&mut r1, dx, 1., 0.);
    p.A.t().gemv(&mut r1, dy, 1., 1.);
    let mut r2 = vec![0.; m];
    p.A.gemv(&mut r2, dx, 1., 0.);

    let e1 = (0..n).map(|j| (r1[j] + x_ratio[j] * dx[j] - rx[j]).abs());
    let e2 = (0..m).map(|i| (r2[i] - row_diagonal(row_ratio[i]) * dy[i] - ry[i]).abs());
    e1.chain(e2).fold(0., f64::max)
}

fn ratios(m: usize, n: usize, scale: f64) -> (Vec<f64>, Vec<f64>) {
    let x_ratio = (0..n).map(|j| scale * (1.0 + (j % 5) as f64)).collect();
    let row_ratio = (0..m)
        .map(|i| if i % 4 == 0 { f64::INFINITY } else { scale * (1.0 + (i % 3) as f64) })
        .collect();
    (x_ratio, row_ratio)
}

fn settings(threads: u32, allow_normal: bool) -> FactorSettings<f64> {
    FactorSettingsBuilder::default()
        .max_threads(threads)
        .parallel_threshold(0)
        .allow_normal(allow_normal)
        .build()
        .unwrap()
}

#[test]
fn test_blended_interior_point_iterations() {
    let (m, n) = (40, 90);
    let p = random_problem(m, n, 11);
    let mut kkt = BlendedKKT::new(&p.A, Some(&p.Q), &p.unbounded, settings(2, true)).unwrap();

    // the dense column and every coupled variable stay augmented
    let part = kkt.partition().clone();
    assert!(part.augmented.contains(&(n - 1)));
    assert!(part.augmented.contains(&0) && part.augmented.contains(&6));
    assert!(!part.simple.is_empty());

    let rx: Vec<f64> = (0..n).map(|j| (j % 3) as f64 - 1.0).collect();
    let ry: Vec<f64> = (0..m).map(|i| 0.5 * (i % 5) as f64).collect();
    let mut dx = vec![0.; n];
    let mut dy = vec![0.; m];

    let nnz = kkt.workspace().factor_nnz();
    for scale in [1e2, 1.0, 1e-2] {
        let (x_ratio, row_ratio) = ratios(m, n, scale);
        kkt.set_blended_values(&x_ratio, &row_ratio).unwrap();
        assert_eq!(kkt.workspace().factor_nnz(), nnz);
        assert_eq!(kkt.workspace().perturbation_count(), 0);
        assert_eq!(kkt.workspace().positive_inertia(), part.augmented.len());

        kkt.solve(&rx, &ry, &mut dx, &mut dy).unwrap();
        let res = kkt_residual(&p, &x_ratio, &row_ratio, &dx, &dy, &rx, &ry);
        assert!(res < 1e-8, "scale {scale}: residual {res}");
    }
}

#[test]
fn test_blended_matches_augmented_only() {
    let (m, n) = (25, 50);
    let p = random_problem(m, n, 12);
    // without elimination an equality row has a zero diagonal, so keep
    // every row ratio finite
    let (x_ratio, _) = ratios(m, n, 1.0);
    let row_ratio: Vec<f64> = (0..m).map(|i| 1.0 + (i % 3) as f64).collect();
    let rx = vec![1.0; n];
    let ry = vec![-1.0; m];

    let mut solutions = Vec::new();
    for allow_normal in [true, false] {
        let mut kkt = BlendedKKT::new(&p.A, Some(&p.Q), &p.unbounded, settings(1, allow_normal)).unwrap();
        kkt.set_blended_values(&x_ratio, &row_ratio).unwrap();
        let mut dx = vec![0.; n];
        let mut dy = vec![0.; m];
        kkt.solve(&rx, &ry, &mut dx, &mut dy).unwrap();
        solutions.push((dx, dy));
    }

    let (a, b) = (&solutions[0], &solutions[1]);
    let diff = a.0.norm_inf_diff(&b.0).max(a.1.norm_inf_diff(&b.1));
    assert!(diff < 1e-8);
}

#[test]
fn test_blended_thread_count_invariant() {
    let (m, n) = (60, 150);
    let p = random_problem(m, n, 13);
    let (x_ratio, row_ratio) = ratios(m, n, 0.5);
    let rx = vec![1.0; n];
    let ry = vec![0.25; m];

    let mut reference: Option<(Vec<f64>, Vec<f64>)> = None;
    for threads in [1, 2, 6] {
        let mut kkt = BlendedKKT::new(&p.A, Some(&p.Q), &p.unbounded, settings(threads, true)).unwrap();
        kkt.set_blended_values(&x_ratio, &row_ratio).unwrap();
        let mut dx = vec![0.; n];
        let mut dy = vec![0.; m];
        kkt.solve(&rx, &ry, &mut dx, &mut dy).unwrap();

        match &reference {
            None => reference = Some((dx, dy)),
            Some((rdx, rdy)) => {
                assert_eq!(&dx, rdx);
                assert_eq!(&dy, rdy);
            }
        }
    }
}

#![allow(non_snake_case)]

use crate::algebra::*;
use crate::ordering::Permutation;
use crate::settings::FactorSettings;
use std::sync::Mutex;

/// A single repaired pivot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perturbation<T> {
    /// inner (permuted) column index
    pub index: usize,
    /// pivot value before repair
    pub original: T,
    /// pivot value used by the factorization
    pub replacement: T,
}

/// Record of repaired pivots.   Workers append concurrently, so entries
/// are kept in arrival order and sorted by column when read back.
#[derive(Debug, Default)]
pub struct PerturbationLog<T> {
    entries: Mutex<Vec<Perturbation<T>>>,
}

impl<T: Copy> PerturbationLog<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, index: usize, original: T, replacement: T) {
        let entry = Perturbation {
            index,
            original,
            replacement,
        };
        match self.entries.lock() {
            Ok(mut v) => v.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    pub fn clear(&mut self) {
        self.entries_mut().clear();
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(v) => v.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries ordered by column
    pub fn sorted(&mut self) -> Vec<Perturbation<T>> {
        let v = self.entries_mut();
        v.sort_by_key(|p| p.index);
        v.clone()
    }

    fn entries_mut(&mut self) -> &mut Vec<Perturbation<T>> {
        match self.entries.get_mut() {
            Ok(v) => v,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Pivot repair policy applied to every pivot during numeric
/// factorization.  `repair` receives the inner column index and must
/// return a nonzero finite value, recording any change in `log`.
pub trait PivotPolicy<T: FloatT>: Send + Sync {
    /// Called once the symbolic permutation is fixed.
    fn prepare(&mut self, _perm: &Permutation) {}

    fn repair(&self, column: usize, pivot: T, log: &PerturbationLog<T>) -> T;
}

/// Replaces NaN pivots by a large magnitude and near-zero pivots by a
/// small magnitude of the same sign.
#[derive(Debug, Clone)]
pub struct ThresholdPivot<T> {
    pub tolerance: T,
    pub tiny_replacement: T,
    pub nan_replacement: T,
}

impl<T: FloatT> ThresholdPivot<T> {
    pub fn new(settings: &FactorSettings<T>) -> Self {
        Self {
            tolerance: settings.pivot_tolerance,
            tiny_replacement: settings.pivot_tiny_replacement,
            nan_replacement: settings.pivot_nan_replacement,
        }
    }
}

impl<T: FloatT> Default for ThresholdPivot<T> {
    fn default() -> Self {
        Self::new(&FactorSettings::default())
    }
}

impl<T: FloatT> PivotPolicy<T> for ThresholdPivot<T> {
    fn repair(&self, column: usize, pivot: T, log: &PerturbationLog<T>) -> T {
        let out = if pivot.is_nan() {
            self.nan_replacement
        } else if pivot.abs() < self.tolerance || pivot == T::zero() {
            if pivot.is_sign_negative() {
                -self.tiny_replacement
            } else {
                self.tiny_replacement
            }
        } else {
            return pivot;
        };
        log.record(column, pivot, out);
        out
    }
}

/// Dynamic regularization toward an expected pivot sign.  Any pivot
/// whose signed value falls below `eps` is replaced by `delta` with
/// the expected sign.
#[derive(Debug, Clone)]
pub struct SignedRegularization<T> {
    // expected signs in outer (caller) ordering
    Dsigns: Vec<i8>,
    // the same, in inner ordering
    inner_signs: Vec<i8>,
    pub eps: T,
    pub delta: T,
}

impl<T: FloatT> SignedRegularization<T> {
    pub fn new(Dsigns: Vec<i8>, eps: T, delta: T) -> Self {
        let inner_signs = Dsigns.clone();
        Self {
            Dsigns,
            inner_signs,
            eps,
            delta,
        }
    }

    pub fn from_settings(Dsigns: Vec<i8>, settings: &FactorSettings<T>) -> Self {
        Self::new(Dsigns, settings.regularize_eps, settings.regularize_delta)
    }

    /// expected sign for an inner column
    pub fn sign(&self, column: usize) -> i8 {
        self.inner_signs[column]
    }
}

impl<T: FloatT> PivotPolicy<T> for SignedRegularization<T> {
    fn prepare(&mut self, perm: &Permutation) {
        perm.permute(&mut self.inner_signs, &self.Dsigns);
    }

    fn repair(&self, column: usize, pivot: T, log: &PerturbationLog<T>) -> T {
        let sign = if self.inner_signs[column] < 0 {
            -T::one()
        } else {
            T::one()
        };
        if pivot.is_nan() || pivot * sign < self.eps {
            let out = self.delta * sign;
            log.record(column, pivot, out);
            out
        } else {
            pivot
        }
    }
}

#[test]
fn test_threshold_pivot() {
    let policy = ThresholdPivot::<f64>::default();
    let mut log = PerturbationLog::new();

    assert_eq!(policy.repair(0, 2.0, &log), 2.0);
    assert_eq!(policy.repair(1, -3.0, &log), -3.0);
    assert!(log.is_empty());

    assert_eq!(policy.repair(4, 0.0, &log), 1e-30);
    assert_eq!(policy.repair(2, -1e-40, &log), -1e-30);
    assert_eq!(policy.repair(3, f64::NAN, &log), 1e32);

    let entries = log.sorted();
    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries.iter().map(|p| p.index).collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
    assert!(entries[1].original.is_nan());
}

#[test]
fn test_signed_regularization() {
    let mut policy = SignedRegularization::new(vec![1, -1, 1], 1e-13, 2e-7);
    // inner order reverses the outer one
    let perm = Permutation::new(vec![2, 1, 0]).unwrap();
    policy.prepare(&perm);
    assert_eq!(policy.sign(1), -1);

    let log = PerturbationLog::new();
    assert_eq!(policy.repair(0, 5.0, &log), 5.0);
    // wrong sign for a negative column
    assert_eq!(policy.repair(1, 1.0, &log), -2e-7);
    assert_eq!(policy.repair(2, 0.0, &log), 2e-7);
    assert_eq!(log.len(), 2);
}

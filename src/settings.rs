use crate::algebra::*;
use derive_builder::Builder;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Hard upper bound on the number of factorization workers
pub const MAX_WORKER_THREADS: usize = 64;

/// Error type returned by settings validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// An error attributable to one of the fields
    #[error("Bad value for field \"{0}\"")]
    BadFieldValue(&'static str),
}

/// Symbolic ordering strategy used when fill-in planning is requested
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FactorizationMethod {
    /// LocalFill for small systems, approximate minimum degree otherwise
    #[default]
    Automatic,
    /// approximate minimum degree ordering
    ApproximateMinDegree,
    /// greedy local fill minimization
    LocalFill,
}

/// Settings for [`SymmetricFactorization`](crate::factor::SymmetricFactorization)
/// and the KKT assemblies built on it.
#[derive(Builder, Debug, Clone)]
#[builder(build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = "T: Serialize + DeserializeOwned"))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FactorSettings<T: FloatT> {
    ///pattern density (relative to the remaining columns) at which
    ///ordering stops and the tail is treated as one dense block
    #[builder(default = "0.8")]
    pub dense_window_threshold: f64,

    ///ordering strategy
    #[builder(default = "FactorizationMethod::Automatic")]
    pub factorization_method: FactorizationMethod,

    ///largest system for which `Automatic` selects LocalFill
    #[builder(default = "5000")]
    pub automatic_localfill_limit: usize,

    ///AMD dense row threshold multiplier
    #[builder(default = "1.0")]
    pub amd_dense_scale: f64,

    ///allow KKT assembly to eliminate simple variables
    #[builder(default = "true")]
    pub allow_normal: bool,

    ///maximum worker threads.
    ///choosing 0 lets the solver choose for itself
    #[builder(default = "0")]
    pub max_threads: u32,

    ///estimated work below which parallel phases run on the calling thread
    #[builder(default = "4096")]
    pub parallel_threshold: usize,

    ///maximum run time (seconds) for a single ordering or factorization
    #[builder(default = "f64::INFINITY")]
    pub time_limit: f64,

    ///largest reduced column pattern accepted by LocalFill below
    ///the dense window
    #[builder(default = "1 << 24")]
    pub max_column_pattern: usize,

    ///pivot magnitude below which a pivot is replaced
    #[builder(default = "(1e-30).as_T()")]
    pub pivot_tolerance: T,

    ///replacement magnitude for tiny pivots
    #[builder(default = "(1e-30).as_T()")]
    pub pivot_tiny_replacement: T,

    ///replacement magnitude for NaN pivots
    #[builder(default = "(1e+32).as_T()")]
    pub pivot_nan_replacement: T,

    ///signed regularization threshold
    #[builder(default = "(1e-13).as_T()")]
    pub regularize_eps: T,

    ///signed regularization shift
    #[builder(default = "(2e-7).as_T()")]
    pub regularize_delta: T,

    ///direct solve with iterative refinement
    #[builder(default = "true")]
    pub iterative_refinement_enable: bool,

    ///iterative refinement relative tolerance
    #[builder(default = "(1e-13).as_T()")]
    pub iterative_refinement_reltol: T,

    ///iterative refinement absolute tolerance
    #[builder(default = "(1e-12).as_T()")]
    pub iterative_refinement_abstol: T,

    ///iterative refinement maximum iterations
    #[builder(default = "10")]
    pub iterative_refinement_max_iter: u32,

    ///iterative refinement stalling tolerance
    #[builder(default = "(5.0).as_T()")]
    pub iterative_refinement_stop_ratio: T,

    ///verbose printing
    #[builder(default = "false")]
    pub verbose: bool,
}

impl<T> Default for FactorSettings<T>
where
    T: FloatT,
{
    fn default() -> FactorSettings<T> {
        FactorSettingsBuilder::<T>::default().build().unwrap()
    }
}

impl<T> FactorSettings<T>
where
    T: FloatT,
{
    /// Checks that numerical fields hold usable values
    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_dense_window_threshold(self.dense_window_threshold)?;
        validate_pivot_values(
            self.pivot_tolerance,
            self.pivot_tiny_replacement,
            self.pivot_nan_replacement,
        )?;
        if self.regularize_delta <= T::zero() {
            return Err(SettingsError::BadFieldValue("regularize_delta"));
        }
        if self.time_limit.is_nan() || self.time_limit < 0.0 {
            return Err(SettingsError::BadFieldValue("time_limit"));
        }
        Ok(())
    }

    /// Number of workers for parallel phases.   A zero `max_threads`
    /// means `min(64, available parallelism)`.
    pub fn thread_count(&self) -> usize {
        let cap = match self.max_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n as usize,
        };
        cap.clamp(1, MAX_WORKER_THREADS)
    }
}

// pre build checker (for auto-validation when using the builder)

impl From<SettingsError> for FactorSettingsBuilderError {
    fn from(e: SettingsError) -> Self {
        FactorSettingsBuilderError::ValidationError(e.to_string())
    }
}

/// Automatic pre-build settings validation
impl<T> FactorSettingsBuilder<T>
where
    T: FloatT,
{
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(v) = self.dense_window_threshold {
            validate_dense_window_threshold(v)?;
        }
        let defaults = |v: Option<T>, d: f64| v.unwrap_or_else(|| d.as_T());
        validate_pivot_values(
            defaults(self.pivot_tolerance, 1e-30),
            defaults(self.pivot_tiny_replacement, 1e-30),
            defaults(self.pivot_nan_replacement, 1e32),
        )?;
        if let Some(v) = self.regularize_delta {
            if v <= T::zero() {
                return Err(SettingsError::BadFieldValue("regularize_delta"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------
// individual validation functions go here
// ---------------------------------------------------------

fn validate_dense_window_threshold(v: f64) -> Result<(), SettingsError> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(SettingsError::BadFieldValue("dense_window_threshold"))
    }
}

fn validate_pivot_values<T: FloatT>(tol: T, tiny: T, nan: T) -> Result<(), SettingsError> {
    if !(tol >= T::zero()) {
        return Err(SettingsError::BadFieldValue("pivot_tolerance"));
    }
    if !(tiny > T::zero()) || !tiny.is_finite() {
        return Err(SettingsError::BadFieldValue("pivot_tiny_replacement"));
    }
    if !(nan > T::zero()) || !nan.is_finite() {
        return Err(SettingsError::BadFieldValue("pivot_nan_replacement"));
    }
    Ok(())
}

#[test]
fn test_settings_validate() {
    let settings = FactorSettings::<f64>::default();
    assert!(settings.validate().is_ok());
    assert_eq!(settings.dense_window_threshold, 0.8);
    assert_eq!(settings.factorization_method, FactorizationMethod::Automatic);

    // fail on out of range window
    assert!(FactorSettingsBuilder::<f64>::default()
        .dense_window_threshold(1.5)
        .build()
        .is_err());

    // zero is a legal window
    assert!(FactorSettingsBuilder::<f64>::default()
        .dense_window_threshold(0.0)
        .build()
        .is_ok());

    assert!(FactorSettingsBuilder::<f64>::default()
        .pivot_tiny_replacement(0.0)
        .build()
        .is_err());
}

#[test]
fn test_settings_thread_count() {
    let mut settings = FactorSettings::<f64>::default();
    assert!((1..=MAX_WORKER_THREADS).contains(&settings.thread_count()));

    settings.max_threads = 3;
    assert_eq!(settings.thread_count(), 3);

    settings.max_threads = 1000;
    assert_eq!(settings.thread_count(), MAX_WORKER_THREADS);
}

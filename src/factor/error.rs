use crate::algebra::SparseFormatError;
use crate::parallel::DispatchError;
use crate::settings::SettingsError;
use thiserror::Error;

/// Error codes returnable from ordering and factorization operations

#[derive(Error, Debug)]
pub enum FactorError {
    #[error("Time limit reached")]
    Timeout,
    #[error(
        "Model too large: column {column} has a reduced pattern of {pattern} entries \
         with {remaining} columns still unordered"
    )]
    ModelTooLarge {
        column: usize,
        pattern: usize,
        remaining: usize,
    },
    #[error("Factorization worker failed: {0}")]
    WorkerFailure(Box<FactorError>),
    #[error("Factorization worker panicked")]
    WorkerPanicked,
    #[error("Non-finite values produced in column {column}")]
    NumericalBreakdown { column: usize },
    #[error("Ordering failed: {0}")]
    Ordering(String),
    #[error("Invalid permutation vector")]
    InvalidPermutation,
    #[error("Matrix has not been factorized")]
    NotFactorized,
    #[error("Matrix dimension fields are incompatible")]
    IncompatibleDimension,
    #[error(transparent)]
    Format(#[from] SparseFormatError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

// Timeouts observed inside workers surface unwrapped, since the
// caller treats them the same way wherever they were raised.
impl From<DispatchError<FactorError>> for FactorError {
    fn from(e: DispatchError<FactorError>) -> Self {
        match e {
            DispatchError::Task(FactorError::Timeout) => FactorError::Timeout,
            DispatchError::Task(inner) => FactorError::WorkerFailure(Box::new(inner)),
            DispatchError::Panicked => FactorError::WorkerPanicked,
        }
    }
}

#[test]
fn test_dispatch_error_conversion() {
    let e: FactorError = DispatchError::Task(FactorError::Timeout).into();
    assert!(matches!(e, FactorError::Timeout));

    let e: FactorError = DispatchError::Task(FactorError::NumericalBreakdown { column: 3 }).into();
    match e {
        FactorError::WorkerFailure(inner) => {
            assert!(matches!(*inner, FactorError::NumericalBreakdown { column: 3 }))
        }
        _ => panic!("expected a wrapped worker failure"),
    }

    let e: FactorError = DispatchError::Panicked.into();
    assert!(matches!(e, FactorError::WorkerPanicked));
}

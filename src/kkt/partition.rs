#![allow(non_snake_case)]

use crate::algebra::*;

// smallest linear column count that always counts as dense
const MIN_DENSE_COLUMN: usize = 16;
// multiple of the average column count that counts as dense
const DENSE_COLUMN_RATIO: f64 = 10.0;

/// Structural properties of one primal variable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableFlags {
    /// no finite bound, so no barrier term on its diagonal
    pub unbounded: bool,
    /// has a quadratic term coupling it to another variable
    pub off_diagonal_quadratic: bool,
    /// has a quadratic term on its own diagonal
    pub diagonal_quadratic: bool,
}

impl VariableFlags {
    /// Flags for every variable from the structure of `Q` (any
    /// triangle storage) and the caller's unbounded markers.
    pub fn detect<T: FloatT>(Q: Option<&CscMatrix<T>>, unbounded: &[bool]) -> Vec<VariableFlags> {
        let mut flags: Vec<VariableFlags> = unbounded
            .iter()
            .map(|&unbounded| VariableFlags {
                unbounded,
                ..Default::default()
            })
            .collect();

        if let Some(Q) = Q {
            assert_eq!(Q.n, flags.len());
            for col in 0..Q.n {
                for (row, _) in Q.column_iter(col) {
                    if row == col {
                        flags[col].diagonal_quadratic = true;
                    } else {
                        flags[col].off_diagonal_quadratic = true;
                        flags[row].off_diagonal_quadratic = true;
                    }
                }
            }
        }
        flags
    }

    /// True if the variable can be eliminated through a positive
    /// diagonal, i.e. it has no quadratic coupling and is either bounded
    /// or carries its own quadratic term.
    pub fn eliminable(&self) -> bool {
        !self.off_diagonal_quadratic && !(self.unbounded && !self.diagonal_quadratic)
    }
}

/// Split of the primal variables into an augmented block, kept in the
/// factored system, and a simple block eliminated into the row block.
/// Both index lists are ascending and map partial to primal indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePartition {
    pub augmented: Vec<usize>,
    pub simple: Vec<usize>,
}

impl VariablePartition {
    pub fn new<T: FloatT>(A: &CscMatrix<T>, flags: &[VariableFlags], allow_normal: bool) -> Self {
        assert_eq!(A.n, flags.len());
        let dense = dense_column_threshold(A);

        let (simple, augmented): (Vec<usize>, Vec<usize>) = (0..A.n).partition(|&j| {
            allow_normal && flags[j].eliminable() && A.count_column_slots(j) < dense
        });
        Self { augmented, simple }
    }

    pub fn nvars(&self) -> usize {
        self.augmented.len() + self.simple.len()
    }
}

/// Linear column count at or above which a variable is kept augmented
pub fn dense_column_threshold<T: FloatT>(A: &CscMatrix<T>) -> usize {
    if A.n == 0 {
        return MIN_DENSE_COLUMN;
    }
    let avg = A.nnz() as f64 / A.n as f64;
    MIN_DENSE_COLUMN.max((DENSE_COLUMN_RATIO * avg).ceil() as usize)
}

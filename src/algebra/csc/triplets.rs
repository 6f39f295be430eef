use crate::algebra::{CscMatrix, FloatT, SparseFormatError};

/// Rule for merging repeated `(row, col)` entries when assembling
/// a matrix from triplets.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DuplicatePolicy {
    /// keep the value that appeared first in the input
    #[default]
    KeepFirst,
    /// keep the value that appeared last in the input
    KeepLast,
    /// add all repeated values together
    Sum,
}

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// Assemble an `m x n` matrix from unordered `(row, col, value)`
    /// triplets.   Entries are sorted by column and then row, and repeated
    /// positions are merged according to `policy`.
    ///
    /// ```
    /// # use symfact::algebra::{CscMatrix, DuplicatePolicy};
    /// let A = CscMatrix::from_triplets(
    ///     2, 2,
    ///     &[(1, 0, 3.0), (0, 0, 1.0), (1, 0, 5.0)],
    ///     DuplicatePolicy::Sum,
    /// ).unwrap();
    /// assert_eq!(A.at(1, 0), 8.0);
    /// ```
    pub fn from_triplets(
        m: usize,
        n: usize,
        triplets: &[(usize, usize, T)],
        policy: DuplicatePolicy,
    ) -> Result<Self, SparseFormatError> {
        for &(row, col, _) in triplets {
            if row >= m {
                return Err(SparseFormatError::BadRowval { row, m });
            }
            if col >= n {
                return Err(SparseFormatError::BadColval { col, n });
            }
        }

        // stable sort, so input order survives within duplicate runs
        let mut order: Vec<usize> = (0..triplets.len()).collect();
        order.sort_by_key(|&k| (triplets[k].1, triplets[k].0));

        let mut colptr = vec![0; n + 1];
        let mut rowval = Vec::with_capacity(triplets.len());
        let mut nzval = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for k in order {
            let (row, col, v) = triplets[k];
            if last == Some((row, col)) {
                if let Some(prev) = nzval.last_mut() {
                    match policy {
                        DuplicatePolicy::KeepFirst => {}
                        DuplicatePolicy::KeepLast => *prev = v,
                        DuplicatePolicy::Sum => *prev += v,
                    }
                }
                continue;
            }
            rowval.push(row);
            nzval.push(v);
            colptr[col + 1] += 1;
            last = Some((row, col));
        }

        for col in 0..n {
            colptr[col + 1] += colptr[col];
        }

        Ok(CscMatrix::new(m, n, colptr, rowval, nzval))
    }

    /// Triplet listing of the stored entries, in column order
    pub fn to_triplets(&self) -> Vec<(usize, usize, T)> {
        let mut out = Vec::with_capacity(self.nnz());
        for col in 0..self.n {
            out.extend(self.column_iter(col).map(|(row, v)| (row, col, v)));
        }
        out
    }
}

#[test]
fn test_from_triplets_policies() {
    let trips = [(2, 1, 1.0), (0, 0, 4.0), (2, 1, 2.0), (1, 0, 3.0), (2, 1, 4.0)];

    let A = CscMatrix::from_triplets(3, 2, &trips, DuplicatePolicy::KeepFirst).unwrap();
    assert_eq!(A.colptr, vec![0, 2, 3]);
    assert_eq!(A.rowval, vec![0, 1, 2]);
    assert_eq!(A.at(2, 1), 1.0);

    let A = CscMatrix::from_triplets(3, 2, &trips, DuplicatePolicy::KeepLast).unwrap();
    assert_eq!(A.at(2, 1), 4.0);

    let A = CscMatrix::from_triplets(3, 2, &trips, DuplicatePolicy::Sum).unwrap();
    assert_eq!(A.at(2, 1), 7.0);
    assert!(A.check_format().is_ok());
}

#[test]
fn test_from_triplets_out_of_range() {
    let err = CscMatrix::from_triplets(2, 2, &[(2, 0, 1.0)], DuplicatePolicy::default());
    assert_eq!(err, Err(SparseFormatError::BadRowval { row: 2, m: 2 }));

    let err = CscMatrix::from_triplets(2, 2, &[(0, 5, 1.0)], DuplicatePolicy::default());
    assert_eq!(err, Err(SparseFormatError::BadColval { col: 5, n: 2 }));
}

#[test]
fn test_from_triplets_empty_columns() {
    let A = CscMatrix::<f64>::from_triplets(3, 4, &[(1, 2, 1.0)], DuplicatePolicy::Sum).unwrap();
    assert_eq!(A.colptr, vec![0, 0, 0, 1, 1]);
    assert_eq!(A.to_triplets(), vec![(1, 2, 1.0)]);
}

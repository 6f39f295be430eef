use crate::algebra::{CscMatrix, FloatT};

/// Row-wise view of the pattern of a [`CscMatrix`].
///
/// For each row `i`, `colval[rowptr[i]..rowptr[i+1]]` lists in ascending
/// order the columns holding a structural entry in that row.  No values
/// are duplicated.  The index must be rebuilt whenever the column
/// pattern of the source changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransposeIndex {
    pub rowptr: Vec<usize>,
    pub colval: Vec<usize>,
}

impl TransposeIndex {
    /// Build from a column pattern with `m` rows.   Single counting sort:
    /// tally per-row counts, prefix sum, then scatter column indices
    /// while advancing per-row write cursors.
    pub fn from_pattern(m: usize, colptr: &[usize], rowval: &[usize]) -> Self {
        let n = colptr.len() - 1;
        let nnz = colptr[n];

        // tally
        let mut rowptr = vec![0; m + 1];
        for &row in &rowval[..nnz] {
            rowptr[row] += 1;
        }

        // prefix sum into start-of-range form
        let mut acc = 0;
        for p in rowptr.iter_mut() {
            let count = *p;
            *p = acc;
            acc += count;
        }

        // scatter with per-row write cursors.  Visiting columns in
        // increasing order keeps each row's column list ascending
        let mut colval = vec![0; nnz];
        for col in 0..n {
            for &row in &rowval[colptr[col]..colptr[col + 1]] {
                colval[rowptr[row]] = col;
                rowptr[row] += 1;
            }
        }

        // cursors now hold end-of-range positions.  Restore starts
        rowptr.rotate_right(1);
        rowptr[0] = 0;

        Self { rowptr, colval }
    }

    pub fn new<T: FloatT>(A: &CscMatrix<T>) -> Self {
        Self::from_pattern(A.m, &A.colptr, &A.rowval)
    }

    /// number of rows indexed
    pub fn nrows(&self) -> usize {
        self.rowptr.len() - 1
    }

    /// ascending list of columns with an entry in `row`
    pub fn row(&self, row: usize) -> &[usize] {
        &self.colval[self.rowptr[row]..self.rowptr[row + 1]]
    }
}

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// Allocates the explicit transpose of the matrix
    pub fn transpose(&self) -> Self {
        let idx = TransposeIndex::new(self);

        // same scatter as the index build, carrying values along
        let mut next = idx.rowptr[0..self.m].to_vec();
        let mut nzval = vec![T::zero(); self.nnz()];
        for col in 0..self.n {
            for (row, v) in self.column_iter(col) {
                nzval[next[row]] = v;
                next[row] += 1;
            }
        }

        CscMatrix::new(self.n, self.m, idx.rowptr, idx.colval, nzval)
    }
}

#[test]
fn test_transpose_index() {
    // pattern
    // [x . x]
    // [x x .]
    // [. x x]
    let colptr = vec![0, 2, 4, 6];
    let rowval = vec![0, 1, 1, 2, 0, 2];
    let idx = TransposeIndex::from_pattern(3, &colptr, &rowval);

    assert_eq!(idx.rowptr, vec![0, 2, 4, 6]);
    assert_eq!(idx.row(0), &[0, 2]);
    assert_eq!(idx.row(1), &[0, 1]);
    assert_eq!(idx.row(2), &[1, 2]);
}

#[test]
fn test_transpose_index_empty_rows() {
    let idx = TransposeIndex::from_pattern(4, &[0, 1, 1], &[3]);
    assert_eq!(idx.rowptr, vec![0, 0, 0, 0, 1]);
    assert_eq!(idx.row(3), &[0]);
    assert!(idx.row(1).is_empty());
}

#[test]
fn test_csc_transpose() {
    let A = CscMatrix::new(
        2,
        3,
        vec![0, 1, 3, 4],
        vec![0, 0, 1, 1],
        vec![1., 2., 3., 4.],
    );
    let At = A.transpose();
    assert_eq!((At.m, At.n), (3, 2));
    assert_eq!(At.colptr, vec![0, 2, 4]);
    assert_eq!(At.rowval, vec![0, 1, 1, 2]);
    assert_eq!(At.nzval, vec![1., 2., 3., 4.]);
    assert_eq!(At.transpose(), A);
}

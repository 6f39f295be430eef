#![allow(non_snake_case)]

use crate::algebra::{
    Adjoint, CscMatrix, FloatT, MatrixShape, MatrixTriangle, ShapedMatrix, SparseFormatError,
    Symmetric,
};

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// `CscMatrix` constructor.
    ///
    /// # Panics
    /// Makes rudimentary dimensional compatibility checks and panics on
    /// failure.   This constructor does __not__
    /// ensure that rows indices are all in bounds or that data is arranged
    /// such that entries within each column appear in order of increasing
    /// row index.   Use [`check_format`](CscMatrix::check_format) for that.
    ///

    pub fn new(m: usize, n: usize, colptr: Vec<usize>, rowval: Vec<usize>, nzval: Vec<T>) -> Self {
        assert_eq!(rowval.len(), nzval.len());
        assert_eq!(colptr.len(), n + 1);
        assert_eq!(colptr[n], rowval.len());
        CscMatrix {
            m,
            n,
            colptr,
            rowval,
            nzval,
        }
    }

    /// allocate space for a sparse matrix with `nnz` elements
    ///
    /// To make an m x n matrix of zeros, use
    /// ```
    /// # use symfact::algebra::CscMatrix;
    /// # let m = 3;
    /// # let n = 4;
    /// let A : CscMatrix<f64> = CscMatrix::spalloc(m,n,0);
    /// ```

    pub fn spalloc(m: usize, n: usize, nnz: usize) -> Self {
        let mut colptr = vec![0; n + 1];
        let rowval = vec![0; nnz];
        let nzval = vec![T::zero(); nnz];
        colptr[n] = nnz;

        CscMatrix::new(m, n, colptr, rowval, nzval)
    }

    /// Identity matrix of size `n`
    pub fn identity(n: usize) -> Self {
        let colptr = (0usize..=n).collect();
        let rowval = (0usize..n).collect();
        let nzval = vec![T::one(); n];

        CscMatrix::new(n, n, colptr, rowval, nzval)
    }

    /// number of nonzeros
    pub fn nnz(&self) -> usize {
        self.colptr[self.n]
    }

    /// transpose
    pub fn t(&self) -> Adjoint<'_, Self> {
        Adjoint { src: self }
    }

    /// symmetric view
    pub fn sym(&self) -> Symmetric<'_, Self> {
        Symmetric { src: self }
    }

    /// number of stored slots in column `col`
    pub fn count_column_slots(&self, col: usize) -> usize {
        self.colptr[col + 1] - self.colptr[col]
    }

    /// Iterator over the `(row, value)` pairs stored in column `col`
    pub fn column_iter(&self, col: usize) -> ColumnIter<'_, T> {
        let rng = self.colptr[col]..self.colptr[col + 1];
        ColumnIter {
            rows: &self.rowval[rng.clone()],
            vals: &self.nzval[rng],
            pos: 0,
        }
    }

    /// Iterator over the `(row, value)` pairs stored in column `col`
    /// with `row >= min_row`.  The start position is located by binary
    /// search over the sorted row index run of the column.
    pub fn column_iter_from(&self, col: usize, min_row: usize) -> ColumnIter<'_, T> {
        let mut it = self.column_iter(col);
        it.pos = it.rows.partition_point(|&r| r < min_row);
        it
    }

    /// Position within `rowval`/`nzval` of the entry (row,col),
    /// or `None` if it is not a structural nonzero.
    pub fn slot_of(&self, row: usize, col: usize) -> Option<usize> {
        let first = self.colptr[col];
        let last = self.colptr[col + 1];
        self.rowval[first..last]
            .binary_search(&row)
            .ok()
            .map(|idx| first + idx)
    }

    /// Returns the value at the given (row,col) index as an Option.
    /// Returns None if the given index is not a structural nonzero.
    ///
    /// # Panics
    /// Panics if the given index is out of bounds.
    pub fn get_entry(&self, idx: (usize, usize)) -> Option<T> {
        let (row, col) = idx;
        assert!(row < self.nrows() && col < self.ncols());
        self.slot_of(row, col).map(|k| self.nzval[k])
    }

    /// Value at (row,col), with structural zeros reported as zero
    pub fn at(&self, row: usize, col: usize) -> T {
        self.get_entry((row, col)).unwrap_or_else(T::zero)
    }

    /// Check that matrix data is correctly formatted.
    pub fn check_format(&self) -> Result<(), SparseFormatError> {
        if self.rowval.len() != self.nzval.len() {
            return Err(SparseFormatError::IncompatibleDimension);
        }

        if self.colptr.is_empty()
            || (self.colptr.len() - 1) != self.n
            || self.colptr[self.n] != self.rowval.len()
        {
            return Err(SparseFormatError::IncompatibleDimension);
        }

        //check for colptr monotonicity
        if self.colptr.windows(2).any(|c| c[0] > c[1]) {
            return Err(SparseFormatError::BadColptr);
        }

        //check for rowval monotonicity within each column
        for col in 0..self.n {
            let rng = self.colptr[col]..self.colptr[col + 1];
            if self.rowval[rng].windows(2).any(|c| c[0] >= c[1]) {
                return Err(SparseFormatError::BadRowOrdering);
            }
        }
        //check for row values out of bounds
        if let Some(&row) = self.rowval.iter().find(|&&r| r >= self.m) {
            return Err(SparseFormatError::BadRowval { row, m: self.m });
        }

        Ok(())
    }

    /// True if the matrix is upper triangular
    pub fn is_triu(&self) -> bool {
        // check lower triangle for any structural entries, regardless
        // of the values that may be assigned to them
        (0..self.n).all(|col| {
            let rows = &self.rowval[self.colptr[col]..self.colptr[col + 1]];
            rows.iter().all(|&row| row <= col)
        })
    }

    /// True if the matrix is lower triangular
    pub fn is_tril(&self) -> bool {
        (0..self.n).all(|col| {
            let rows = &self.rowval[self.colptr[col]..self.colptr[col + 1]];
            rows.iter().all(|&row| row >= col)
        })
    }

    /// Allocates a new matrix containing only entries from the upper triangular part
    pub fn to_triu(&self) -> Self {
        self.select_triangle(MatrixTriangle::Triu)
    }

    /// Allocates a new matrix containing only entries from the lower triangular part
    pub fn to_tril(&self) -> Self {
        self.select_triangle(MatrixTriangle::Tril)
    }

    fn select_triangle(&self, tri: MatrixTriangle) -> Self {
        assert_eq!(self.m, self.n);
        let keep = |row: usize, col: usize| match tri {
            MatrixTriangle::Triu => row <= col,
            MatrixTriangle::Tril => row >= col,
        };

        let mut colptr = vec![0; self.n + 1];
        let mut rowval = Vec::with_capacity(self.nnz());
        let mut nzval = Vec::with_capacity(self.nnz());

        for col in 0..self.n {
            for (row, v) in self.column_iter(col) {
                if keep(row, col) {
                    rowval.push(row);
                    nzval.push(v);
                }
            }
            colptr[col + 1] = rowval.len();
        }
        CscMatrix::new(self.m, self.n, colptr, rowval, nzval)
    }

    /// Select a subset of the columns of a sparse matrix.  Returns the
    /// reduced matrix in the order the columns are given in `cols`.
    pub fn select_columns(&self, cols: &[usize]) -> Self {
        let nnz = cols.iter().map(|&c| self.count_column_slots(c)).sum();
        let mut colptr = Vec::with_capacity(cols.len() + 1);
        let mut rowval = Vec::with_capacity(nnz);
        let mut nzval = Vec::with_capacity(nnz);

        colptr.push(0);
        for &col in cols {
            let rng = self.colptr[col]..self.colptr[col + 1];
            rowval.extend_from_slice(&self.rowval[rng.clone()]);
            nzval.extend_from_slice(&self.nzval[rng]);
            colptr.push(rowval.len());
        }
        CscMatrix::new(self.m, cols.len(), colptr, rowval, nzval)
    }

    /// Select the principal submatrix with rows and columns given
    /// by `index`, renumbered in the order given.  `index` must be
    /// increasing.
    pub fn select_principal(&self, index: &[usize]) -> Self {
        debug_assert!(index.windows(2).all(|w| w[0] < w[1]));
        let mut remap = vec![usize::MAX; self.m];
        for (new, &old) in index.iter().enumerate() {
            remap[old] = new;
        }

        let mut colptr = Vec::with_capacity(index.len() + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        colptr.push(0);
        for &col in index {
            for (row, v) in self.column_iter(col) {
                if remap[row] != usize::MAX {
                    rowval.push(remap[row]);
                    nzval.push(v);
                }
            }
            colptr.push(rowval.len());
        }
        CscMatrix::new(index.len(), index.len(), colptr, rowval, nzval)
    }
}

impl<T> ShapedMatrix for CscMatrix<T> {
    fn nrows(&self) -> usize {
        self.m
    }
    fn ncols(&self) -> usize {
        self.n
    }
    fn size(&self) -> (usize, usize) {
        (self.m, self.n)
    }
    fn shape(&self) -> MatrixShape {
        MatrixShape::N
    }
    fn is_square(&self) -> bool {
        self.m == self.n
    }
}

impl<T> Symmetric<'_, CscMatrix<T>>
where
    T: FloatT,
{
    /// Value at (row,col) of the symmetric matrix.  Entries are looked
    /// up in the stored triangle first, then in the mirrored position.
    pub fn at(&self, row: usize, col: usize) -> T {
        let A = self.src;
        A.get_entry((row, col))
            .or_else(|| A.get_entry((col, row)))
            .unwrap_or_else(T::zero)
    }
}

/// Iterator over the `(row, value)` pairs of a single matrix column
pub struct ColumnIter<'a, T> {
    rows: &'a [usize],
    vals: &'a [T],
    pos: usize,
}

impl<T: Copy> Iterator for ColumnIter<'_, T> {
    type Item = (usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        let r = *self.rows.get(self.pos)?;
        let v = self.vals[self.pos];
        self.pos += 1;
        Some((r, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rem = self.rows.len().saturating_sub(self.pos);
        (rem, Some(rem))
    }
}

impl<T: Copy> ExactSizeIterator for ColumnIter<'_, T> {}

#[cfg(test)]
fn test_matrix_5x6() -> CscMatrix<f64> {
    // A =
    //[ ⋅   4.0    ⋅    ⋅   12.0]
    //[1.0  5.0    ⋅    ⋅     ⋅ ]
    //[ ⋅   6.0    ⋅    ⋅   13.0]
    //[2.0  7.0  10.0   ⋅     ⋅ ]
    //[ ⋅   8.0  11.0   ⋅   14.0]
    //[3.0  9.0    ⋅    ⋅     ⋅ ]

    CscMatrix::new(
        6,                                                                 // m
        5,                                                                 // n
        vec![0, 3, 9, 11, 11, 14],                                         // colptr
        vec![1, 3, 5, 0, 1, 2, 3, 4, 5, 3, 4, 0, 2, 4],                    // rowval
        vec![1., 2., 3., 4., 5., 6., 7., 8., 9., 10., 11., 12., 13., 14.], // nzval
    )
}

#[test]
fn test_csc_get_entry() {
    let A = test_matrix_5x6();

    assert_eq!(A.get_entry((1, 0)).unwrap(), 1.);
    assert_eq!(A.get_entry((5, 0)).unwrap(), 3.);
    assert_eq!(A.get_entry((0, 1)).unwrap(), 4.);
    assert_eq!(A.get_entry((3, 1)).unwrap(), 7.);
    assert_eq!(A.get_entry((4, 2)).unwrap(), 11.);
    assert_eq!(A.get_entry((4, 4)).unwrap(), 14.);

    assert!(A.get_entry((0, 0)).is_none());
    assert!(A.get_entry((2, 2)).is_none());
    assert!(A.get_entry((1, 3)).is_none());
    assert_eq!(A.at(3, 4), 0.);
}

#[test]
fn test_csc_column_iter_seek() {
    let A = test_matrix_5x6();

    assert_eq!(A.count_column_slots(1), 6);
    assert_eq!(A.count_column_slots(3), 0);

    let all: Vec<_> = A.column_iter(0).collect();
    assert_eq!(all, vec![(1, 1.), (3, 2.), (5, 3.)]);

    let tail: Vec<_> = A.column_iter_from(1, 3).collect();
    assert_eq!(tail, vec![(3, 7.), (4, 8.), (5, 9.)]);

    // seek to a row that is not stored
    let tail: Vec<_> = A.column_iter_from(0, 2).collect();
    assert_eq!(tail, vec![(3, 2.), (5, 3.)]);

    assert_eq!(A.column_iter_from(4, 6).count(), 0);
}

#[test]
fn test_csc_symmetric_at() {
    // lower triangle of [[4,1,0],[1,4,1],[0,1,4]]
    let L = CscMatrix::new(
        3,
        3,
        vec![0, 2, 4, 5],
        vec![0, 1, 1, 2, 2],
        vec![4., 1., 4., 1., 4.],
    );
    let S = L.sym();
    assert_eq!(S.at(0, 1), 1.);
    assert_eq!(S.at(1, 0), 1.);
    assert_eq!(S.at(2, 0), 0.);
    assert_eq!(S.at(2, 2), 4.);
}

#[test]
fn test_csc_triangles() {
    let L = CscMatrix::new(
        3,
        3,
        vec![0, 2, 4, 5],
        vec![0, 1, 1, 2, 2],
        vec![4., 1., 4., 1., 4.],
    );
    assert!(L.is_tril());
    assert!(!L.is_triu());
    assert_eq!(L.to_triu().nnz(), 3);
    assert_eq!(L.to_tril(), L);
    assert!(L.check_format().is_ok());

    let mut bad = L.clone();
    bad.rowval.swap(0, 1);
    assert_eq!(bad.check_format(), Err(SparseFormatError::BadRowOrdering));
}

//---------------------------------------------------------
// low-level internal utilities for counting / filling entries
// in block partitioned sparse matrices.
//---------------------------------------------------------

use crate::algebra::{CscMatrix, FloatT};

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    // increment the self.colptr by the number of nonzeros in M
    pub(crate) fn colcount_block(&mut self, M: &CscMatrix<T>, initcol: usize) {
        for i in 0..M.n {
            self.colptr[initcol + i] += M.colptr[i + 1] - M.colptr[i];
        }
    }

    // populate values from M using the self.colptr as indicator of
    // next fill location in each row.
    pub(crate) fn fill_block(
        &mut self,
        M: &CscMatrix<T>,
        MtoKKT: &mut [usize],
        initrow: usize,
        initcol: usize,
    ) {
        for i in 0..M.n {
            for j in M.colptr[i]..M.colptr[i + 1] {
                let (Mrow, Mval) = (M.rowval[j], M.nzval[j]);
                let (row, col) = (Mrow + initrow, i + initcol);

                let dest = self.colptr[col];
                self.rowval[dest] = row;
                self.nzval[dest] = Mval;
                self.colptr[col] += 1;
                MtoKKT[j] = dest;
            }
        }
    }

    pub(crate) fn colcount_to_colptr(&mut self) {
        let mut currentptr = 0;
        for p in &mut self.colptr {
            let count = *p;
            *p = currentptr;
            currentptr += count;
        }
    }

    pub(crate) fn backshift_colptrs(&mut self) {
        self.colptr.rotate_right(1);
        self.colptr[0] = 0;
    }

    /// Number of columns with a structural diagonal entry
    pub fn count_diagonal_entries(&self) -> usize {
        (0..self.n.min(self.m))
            .filter(|&col| self.slot_of(col, col).is_some())
            .count()
    }

    /// Returns a copy of a square matrix with a structural entry placed on
    /// every missing diagonal position.  Also returns, for each column, the
    /// slot index of its diagonal entry in the new matrix.
    pub(crate) fn with_full_diagonal(&self) -> (CscMatrix<T>, Vec<usize>) {
        assert_eq!(self.m, self.n);
        let n = self.n;
        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::with_capacity(self.nnz() + n);
        let mut nzval = Vec::with_capacity(self.nnz() + n);
        let mut diag = vec![0; n];

        colptr.push(0);
        for col in 0..n {
            let mut placed = false;
            for (row, v) in self.column_iter(col) {
                if !placed && row >= col {
                    if row != col {
                        diag[col] = rowval.len();
                        rowval.push(col);
                        nzval.push(T::zero());
                    } else {
                        diag[col] = rowval.len();
                    }
                    placed = true;
                }
                rowval.push(row);
                nzval.push(v);
            }
            if !placed {
                diag[col] = rowval.len();
                rowval.push(col);
                nzval.push(T::zero());
            }
            colptr.push(rowval.len());
        }
        (CscMatrix::new(n, n, colptr, rowval, nzval), diag)
    }

    /// Lower triangle of a symmetric matrix given in any storage form.
    /// If any strictly lower entries are present the strictly upper part
    /// is ignored, otherwise the upper triangle is mirrored.  Also returns
    /// a map from each source slot to its slot in the output, with
    /// `usize::MAX` marking ignored entries.
    pub(crate) fn symmetric_lower(&self) -> (CscMatrix<T>, Vec<usize>) {
        assert_eq!(self.m, self.n);
        let has_lower = (0..self.n).any(|col| {
            self.colptr[col] < self.colptr[col + 1] && self.rowval[self.colptr[col + 1] - 1] > col
        });

        let keep = |row: usize, col: usize| {
            if has_lower {
                row >= col
            } else {
                row <= col
            }
        };

        // count entries per output column.   Upper entries mirror
        // into the column given by their row index
        let n = self.n;
        let mut L = CscMatrix::<T>::spalloc(n, n, 0);
        L.colptr.fill(0);
        for col in 0..n {
            for (row, _) in self.column_iter(col) {
                if keep(row, col) {
                    L.colptr[row.min(col)] += 1;
                }
            }
        }
        L.colcount_to_colptr();
        let nnz = L.colptr[n];
        L.rowval.resize(nnz, 0);
        L.nzval.resize(nnz, T::zero());

        // scattering by increasing source column keeps the rows of each
        // output column ascending in both cases
        let mut map = vec![usize::MAX; self.nnz()];
        let mut next = L.colptr[0..n].to_vec();
        if has_lower {
            for col in 0..n {
                for k in self.colptr[col]..self.colptr[col + 1] {
                    let row = self.rowval[k];
                    if row >= col {
                        let dest = next[col];
                        L.rowval[dest] = row;
                        L.nzval[dest] = self.nzval[k];
                        map[k] = dest;
                        next[col] += 1;
                    }
                }
            }
        } else {
            for col in 0..n {
                for k in self.colptr[col]..self.colptr[col + 1] {
                    let row = self.rowval[k];
                    if row <= col {
                        let dest = next[row];
                        L.rowval[dest] = col;
                        L.nzval[dest] = self.nzval[k];
                        map[k] = dest;
                        next[row] += 1;
                    }
                }
            }
        }
        (L, map)
    }
}

#[test]
fn test_symmetric_lower_from_upper() {
    // upper triangle of [[4,1,0],[1,4,1],[0,1,4]]
    let U = CscMatrix::new(
        3,
        3,
        vec![0, 1, 3, 5],
        vec![0, 0, 1, 1, 2],
        vec![4., 1., 4., 1., 4.],
    );
    let (L, map) = U.symmetric_lower();
    assert_eq!(L.colptr, vec![0, 2, 4, 5]);
    assert_eq!(L.rowval, vec![0, 1, 1, 2, 2]);
    assert!(L.is_tril());
    for (k, &dest) in map.iter().enumerate() {
        assert_eq!(L.nzval[dest], U.nzval[k]);
    }
}

#[test]
fn test_symmetric_lower_from_full() {
    let F = CscMatrix::new(
        2,
        2,
        vec![0, 2, 4],
        vec![0, 1, 0, 1],
        vec![2., -1., -1., 2.],
    );
    let (L, map) = F.symmetric_lower();
    assert_eq!(L.nnz(), 3);
    assert_eq!(map[2], usize::MAX);
    assert_eq!(L.rowval, vec![0, 1, 1]);
}

#[test]
fn test_with_full_diagonal() {
    // [[.,.],[1,.]] stored lower
    let A = CscMatrix::new(2, 2, vec![0, 1, 1], vec![1], vec![1.]);
    let (D, diag) = A.with_full_diagonal();
    assert_eq!(D.rowval, vec![0, 1, 1]);
    assert_eq!(diag, vec![0, 2]);
    assert_eq!(D.count_diagonal_entries(), 2);
}

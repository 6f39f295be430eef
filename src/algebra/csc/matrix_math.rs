use crate::algebra::*;

impl<T: FloatT> MatrixVectorMultiply for CscMatrix<T> {
    type T = T;

    fn gemv(&self, y: &mut [T], x: &[T], a: T, b: T) {
        _csc_axpby_N(self, y, x, a, b);
    }
}

impl<T: FloatT> MatrixVectorMultiply for Adjoint<'_, CscMatrix<T>> {
    type T = T;

    fn gemv(&self, y: &mut [T], x: &[T], a: T, b: T) {
        _csc_axpby_T(self.src, y, x, a, b);
    }
}

impl<T: FloatT> SymMatrixVectorMultiply for Symmetric<'_, CscMatrix<T>> {
    type T = T;

    fn symv(&self, y: &mut [T], x: &[T], a: T, b: T) {
        _csc_symv(self.src, y, x, a, b);
    }
}

fn _scale_y<T: FloatT>(y: &mut [T], b: T) {
    if b == T::zero() {
        y.fill(T::zero());
    } else if b == T::one() {
    } else if b == -T::one() {
        y.negate();
    } else {
        y.scale(b);
    }
}

// symmetric multiply.  If the data holds any strictly lower entries
// then strictly upper entries are ignored, so that full storage is
// not counted twice.
#[allow(non_snake_case)]
fn _csc_symv<T: FloatT>(A: &CscMatrix<T>, y: &mut [T], x: &[T], a: T, b: T) {
    assert!(x.len() == A.n);
    assert!(y.len() == A.n);
    assert!(A.n == A.m);

    _scale_y(y, b);

    let has_lower = !A.is_triu();

    for (col, &xcol) in x.iter().enumerate() {
        for (row, Aij) in A.column_iter(col) {
            if has_lower && row < col {
                continue;
            }
            y[row] += a * Aij * xcol;

            if row != col {
                //don't double up on the diagonal
                y[col] += a * Aij * x[row];
            }
        }
    }
}

// sparse matrix-vector multiply, no transpose
#[allow(non_snake_case)]
fn _csc_axpby_N<T: FloatT>(A: &CscMatrix<T>, y: &mut [T], x: &[T], a: T, b: T) {
    //first do the b*y part
    _scale_y(y, b);

    // if a is zero, we're done
    if a == T::zero() {
        return;
    }

    assert_eq!(x.len(), A.n);
    assert_eq!(y.len(), A.m);

    //y += A*x
    for (j, &xj) in x.iter().enumerate() {
        for (row, Aij) in A.column_iter(j) {
            y[row] += a * Aij * xj;
        }
    }
}

// sparse matrix-vector multiply, transposed
#[allow(non_snake_case)]
fn _csc_axpby_T<T: FloatT>(A: &CscMatrix<T>, y: &mut [T], x: &[T], a: T, b: T) {
    //first do the b*y part
    _scale_y(y, b);

    // if a is zero, we're done
    if a == T::zero() {
        return;
    }

    assert_eq!(x.len(), A.m);
    assert_eq!(y.len(), A.n);

    //y += A'*x
    for (j, yj) in y.iter_mut().enumerate() {
        let dot = A
            .column_iter(j)
            .fold(T::zero(), |acc, (row, Aij)| acc + Aij * x[row]);
        *yj += a * dot;
    }
}

#[test]
fn test_gemv_and_transpose() {
    // A = [1 . 2]
    //     [. 3 4]
    let A = CscMatrix::new(2, 3, vec![0, 1, 2, 4], vec![0, 1, 0, 1], vec![1., 3., 2., 4.]);

    let mut y = vec![1., 1.];
    A.gemv(&mut y, &[1., 1., 1.], 1., -1.);
    assert_eq!(y, vec![2., 6.]);

    let mut z = vec![0.; 3];
    A.t().gemv(&mut z, &[1., 2.], 2., 0.);
    assert_eq!(z, vec![2., 12., 20.]);
}

#[test]
fn test_symv_any_storage() {
    // [[4,1],[1,3]] held three ways
    let lower = CscMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![4., 1., 3.]);
    let upper = CscMatrix::new(2, 2, vec![0, 1, 3], vec![0, 0, 1], vec![4., 1., 3.]);
    let full = CscMatrix::new(2, 2, vec![0, 2, 4], vec![0, 1, 0, 1], vec![4., 1., 1., 3.]);

    for M in [&lower, &upper, &full] {
        let mut y = vec![0.; 2];
        M.sym().symv(&mut y, &[1., 2.], 1., 0.);
        assert_eq!(y, vec![6., 7.]);
    }
}

use super::{FloatT, VectorMath};
use itertools::izip;
use std::iter::zip;

impl<T: FloatT> VectorMath for [T] {
    type T = T;
    fn copy_from(&mut self, src: &[T]) -> &mut Self {
        self.copy_from_slice(src);
        self
    }

    fn scalarop(&mut self, op: impl Fn(T) -> T) -> &mut Self {
        for x in &mut *self {
            *x = op(*x);
        }
        self
    }

    fn scale(&mut self, c: T) -> &mut Self {
        self.scalarop(|x| x * c)
    }

    fn negate(&mut self) -> &mut Self {
        self.scalarop(|x| -x)
    }

    // Returns infinity norm, ignoring NaNs
    fn norm_inf(&self) -> T {
        let mut out = T::zero();
        for v in self.iter().map(|v| v.abs()) {
            out = if v > out { v } else { out };
        }
        out
    }

    fn norm_inf_diff(&self, b: &[T]) -> T {
        zip(self, b).fold(T::zero(), |acc, (x, y)| T::max(acc, T::abs(*x - *y)))
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|&x| T::is_finite(x))
    }

    fn axpby(&mut self, a: T, x: &[T], b: T) -> &mut Self {
        assert_eq!(self.len(), x.len());

        for (y, x) in izip!(&mut *self, x) {
            *y = a * (*x) + b * (*y);
        }
        self
    }
}

#[test]
fn test_vecmath_norms() {
    let x = [1., -4., 3.];
    let y = [1., 1., 1.];
    assert_eq!(x.norm_inf(), 4.);
    assert_eq!(x.norm_inf_diff(&y), 5.);
    let mut z = x;
    z.scale(-2.);
    assert_eq!(z, [-2., 8., -6.]);
    assert!(x.is_finite());
    assert!(![1., f64::NAN].is_finite());
}

#[test]
fn test_vecmath_axpby() {
    let mut y = vec![1., 2., 3.];
    y.axpby(2., &[1., 1., 1.], -1.);
    assert_eq!(y, vec![1., 0., -1.]);
}

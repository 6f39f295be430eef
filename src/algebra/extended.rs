use super::FloatT;

/// Running sum held as an unevaluated pair `whole + fraction`.
///
/// Each addition is split with an error-free two-sum so that rounding
/// error from the leading term is carried in `fraction` rather than
/// lost.  Used by the triangular solves, where long accumulations of
/// `L[i,k]*x[k]` products are prone to cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtendedSum<T> {
    whole: T,
    fraction: T,
}

impl<T> ExtendedSum<T>
where
    T: FloatT,
{
    pub fn new(init: T) -> Self {
        Self {
            whole: init,
            fraction: T::zero(),
        }
    }

    #[inline]
    pub fn add(&mut self, v: T) {
        let s = self.whole + v;
        let bp = s - self.whole;
        let err = (self.whole - (s - bp)) + (v - bp);
        self.whole = s;
        self.fraction += err;
    }

    #[inline]
    pub fn sub(&mut self, v: T) {
        self.add(-v);
    }

    /// Adds the product `a*b`.
    #[inline]
    pub fn add_product(&mut self, a: T, b: T) {
        // the product error term is second order for the solves
        // and is not tracked separately
        self.add(a * b);
    }

    #[inline]
    pub fn value(&self) -> T {
        self.whole + self.fraction
    }
}

#[test]
fn test_extended_sum_cancellation() {
    // 1e16 + 1 - 1e16 loses the 1 in plain f64 arithmetic
    let plain = (1e16_f64 + 1.0) - 1e16;
    assert_eq!(plain, 0.0);

    let mut s = ExtendedSum::new(1e16_f64);
    s.add(1.0);
    s.sub(1e16);
    assert_eq!(s.value(), 1.0);
}

#[test]
fn test_extended_sum_many_terms() {
    let mut s = ExtendedSum::new(0.0_f64);
    for _ in 0..10 {
        s.add(0.1);
    }
    assert!((s.value() - 1.0).abs() <= f64::EPSILON);
}

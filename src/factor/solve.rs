#![allow(non_snake_case)]

use super::LdlFactor;
use crate::algebra::*;

// Triangular and diagonal solves against a numeric factor, in inner
// numbering.   Long accumulations use a compensated sum.

impl<T: FloatT> LdlFactor<T> {
    /// Solves `L*y = b` in place, visiting `L` row by row.
    pub fn forward_solve(&mut self, x: &mut [T]) {
        assert_eq!(x.len(), self.n());
        let n = self.n();
        let (Lp, Lx) = (&self.L.colptr, &self.L.nzval);

        // Rows are visited in increasing order, so the next unread entry
        // of each column is always the one in the current row.
        // cursor[k] points at the last entry of column k consumed so far
        self.cursor.copy_from_slice(&Lp[..n]);

        for j in 0..n {
            let row = self.Lt.row(j);
            let mut s = ExtendedSum::new(x[j]);
            for &k in &row[..row.len() - 1] {
                self.cursor[k] += 1;
                s.add_product(-Lx[self.cursor[k]], x[k]);
            }
            x[j] = s.value() / Lx[Lp[j]];
        }
    }

    /// Solves `D*z = y` in place
    pub fn diagonal_solve(&self, x: &mut [T]) {
        assert_eq!(x.len(), self.n());
        for (xi, &di) in x.iter_mut().zip(&self.d) {
            if di < 0 {
                *xi = -*xi;
            }
        }
    }

    /// Solves `L'*x = z` in place
    pub fn backward_solve(&self, x: &mut [T]) {
        assert_eq!(x.len(), self.n());
        let L = &self.L;

        for j in (0..x.len()).rev() {
            let (f, l) = (L.colptr[j], L.colptr[j + 1]);
            let mut s = ExtendedSum::new(x[j]);
            for p in (f + 1)..l {
                s.add_product(-L.nzval[p], x[L.rowval[p]]);
            }
            x[j] = s.value() / L.nzval[f];
        }
    }

    /// Solves `L*D*L'*x = b` in place
    pub fn solve_inner(&mut self, x: &mut [T]) {
        self.forward_solve(x);
        self.diagonal_solve(x);
        self.backward_solve(x);
    }
}

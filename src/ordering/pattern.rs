#![allow(non_snake_case)]

use super::{Permutation, SymbolicInput, SymbolicPlan};
use crate::algebra::TransposeIndex;

const UNKNOWN: usize = usize::MAX;

/// Factor pattern for a fixed permutation, from the elimination tree.
///
/// Returns `(colptr, rowval)` of the lower triangular factor in inner
/// numbering with the diagonal first in each column.
pub fn etree_pattern(input: &SymbolicInput, perm: &Permutation) -> (Vec<usize>, Vec<usize>) {
    let n = input.n;
    let (rowptr, rowcols) = inner_strict_rows(input, perm);

    // compute the elimination tree and the column counts of L.  The
    // nodes visited from row j are exactly the columns with L[j,k] != 0
    let mut etree = vec![UNKNOWN; n];
    let mut Lnz = vec![0usize; n];
    let mut work = vec![UNKNOWN; n];

    for j in 0..n {
        work[j] = j;
        for &k in &rowcols[rowptr[j]..rowptr[j + 1]] {
            let mut i = k;
            while work[i] != j {
                if etree[i] == UNKNOWN {
                    etree[i] = j;
                }
                Lnz[i] += 1;
                work[i] = j;
                i = etree[i];
            }
        }
    }

    // colptr with one extra slot per column for the diagonal
    let mut colptr = vec![0; n + 1];
    for i in 0..n {
        colptr[i + 1] = colptr[i] + Lnz[i] + 1;
    }
    let mut rowval = vec![0; colptr[n]];
    let mut next = colptr[0..n].to_vec();
    for (i, nx) in next.iter_mut().enumerate() {
        rowval[*nx] = i;
        *nx += 1;
    }

    // second traversal places rows.  Rows arrive in increasing order
    work.fill(UNKNOWN);
    for j in 0..n {
        work[j] = j;
        for &k in &rowcols[rowptr[j]..rowptr[j + 1]] {
            let mut i = k;
            while work[i] != j {
                rowval[next[i]] = j;
                next[i] += 1;
                work[i] = j;
                i = etree[i];
            }
        }
    }

    (colptr, rowval)
}

// For each inner row j, the inner columns k < j holding an input entry
// in that row (the strict upper pattern of the permuted matrix, by
// column).  Duplicated entries from full storage are harmless.
fn inner_strict_rows(input: &SymbolicInput, perm: &Permutation) -> (Vec<usize>, Vec<usize>) {
    let n = input.n;
    let o2i = perm.outer_to_inner();

    let mut colptr = vec![0; n + 1];
    let mut rowval = Vec::with_capacity(input.rowval.len());

    // build the permuted strict lower pattern by column, then transpose
    let mut cols: Vec<Vec<usize>> = vec![Vec::new(); n];
    for col in 0..n {
        for &row in &input.rowval[input.colptr[col]..input.colptr[col + 1]] {
            let (ir, ic) = (o2i[row], o2i[col]);
            if ir != ic {
                cols[ir.min(ic)].push(ir.max(ic));
            }
        }
    }
    for (c, rows) in cols.iter_mut().enumerate() {
        rows.sort_unstable();
        rows.dedup();
        rowval.extend_from_slice(rows);
        colptr[c + 1] = rowval.len();
    }
    let idx = TransposeIndex::from_pattern(n, &colptr, &rowval);
    (idx.rowptr, idx.colval)
}

/// Start of the dense tail: the smallest `j` such that every column
/// from `j` on has a pattern length of at least `threshold` times the
/// number of columns remaining at that point.
pub fn detect_dense_tail(colptr: &[usize], threshold: f64) -> usize {
    let n = colptr.len() - 1;
    let mut first = n;
    while first > 0 {
        let j = first - 1;
        let len = (colptr[j + 1] - colptr[j]) as f64;
        if len >= threshold * ((n - j) as f64) {
            first = j;
        } else {
            break;
        }
    }
    first
}

/// Replace every column at or beyond `first_dense` by a full lower
/// triangular column.
pub fn densify_tail(colptr: &[usize], rowval: &[usize], first_dense: usize) -> (Vec<usize>, Vec<usize>) {
    let n = colptr.len() - 1;
    let head = colptr[first_dense];
    let tail = n - first_dense;
    let mut out_colptr = colptr[..=first_dense].to_vec();
    let mut out_rowval = Vec::with_capacity(head + tail * (tail + 1) / 2);
    out_rowval.extend_from_slice(&rowval[..head]);
    for j in first_dense..n {
        out_rowval.extend(j..n);
        out_colptr.push(out_rowval.len());
    }
    (out_colptr, out_rowval)
}

/// Elimination tree pattern plus dense tail detection, for orderings
/// that only produce a permutation.
pub fn plan_from_permutation(input: &SymbolicInput, perm: Permutation, threshold: f64) -> SymbolicPlan {
    let (colptr, rowval) = etree_pattern(input, &perm);
    let first_dense = detect_dense_tail(&colptr, threshold);
    let (colptr, rowval) = densify_tail(&colptr, &rowval, first_dense);
    SymbolicPlan {
        perm,
        colptr,
        rowval,
        first_dense,
    }
}

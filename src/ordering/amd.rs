use super::*;
use log::debug;

/// Approximate minimum degree ordering from the `amd` crate.  The
/// factor pattern is then derived from the elimination tree.
#[derive(Debug, Clone)]
pub struct AmdOrdering {
    /// multiplier on the default AMD dense row threshold
    pub dense_scale: f64,
    pub dense_window_threshold: f64,
}

impl SymbolicOrdering for AmdOrdering {
    fn name(&self) -> &'static str {
        "amd"
    }

    fn order(&self, input: &SymbolicInput, abort: &AbortCheck) -> Result<SymbolicPlan, FactorError> {
        if abort.should_abort() {
            return Err(FactorError::Timeout);
        }
        let perm = _get_amd_ordering(input, self.dense_scale)?;
        if abort.should_abort() {
            return Err(FactorError::Timeout);
        }
        let plan = plan_from_permutation(input, perm, self.dense_window_threshold);
        debug!(
            "amd ordering: n = {}, factor nnz = {}, first dense column = {}",
            input.n,
            plan.nnz(),
            plan.first_dense
        );
        Ok(plan)
    }
}

fn _get_amd_ordering(input: &SymbolicInput, amd_dense_scale: f64) -> Result<Permutation, FactorError> {
    if input.n == 0 {
        return Ok(Permutation::identity(0));
    }

    // computes a permutation for A using AMD default parameters,
    // with a scaled dense row threshold
    let mut control = ::amd::Control::default();
    control.dense *= amd_dense_scale;
    let (perm, iperm, _info) = ::amd::order(input.n, input.colptr, input.rowval, &control)
        .map_err(|status| FactorError::Ordering(format!("amd: {status:?}")))?;
    Permutation::from_pair(perm, iperm)
}

/// Identity ordering.   Used when fill-in planning is disabled.
#[derive(Debug, Clone)]
pub struct NaturalOrdering {
    pub dense_window_threshold: f64,
}

impl NaturalOrdering {
    pub fn new(dense_window_threshold: f64) -> Self {
        Self {
            dense_window_threshold,
        }
    }
}

impl SymbolicOrdering for NaturalOrdering {
    fn name(&self) -> &'static str {
        "natural"
    }

    fn order(&self, input: &SymbolicInput, abort: &AbortCheck) -> Result<SymbolicPlan, FactorError> {
        if abort.should_abort() {
            return Err(FactorError::Timeout);
        }
        let perm = Permutation::identity(input.n);
        Ok(plan_from_permutation(input, perm, self.dense_window_threshold))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_amd_ordering_arrow() {
        // arrow matrix with the hub at column 0.   AMD should push
        // the hub to the end (or just before its last leaf), leaving
        // no fill
        let colptr = vec![0, 5, 6, 7, 8, 9];
        let rowval = vec![0, 1, 2, 3, 4, 1, 2, 3, 4];
        let input = SymbolicInput::new(5, &colptr, &rowval);

        let plan = AmdOrdering {
            dense_scale: 1.0,
            dense_window_threshold: 1.0,
        }
        .order(&input, &AbortCheck::never())
        .unwrap();

        assert!(plan.perm.is_valid());
        assert!(plan.perm.outer_to_inner()[0] >= 3);
        assert_eq!(plan.nnz(), 9);
    }

    #[test]
    fn test_natural_ordering_timeout() {
        let colptr = vec![0, 1];
        let rowval = vec![0];
        let input = SymbolicInput::new(1, &colptr, &rowval);
        let out = NaturalOrdering::new(0.8).order(&input, &AbortCheck::new(None, 0.0));
        assert!(matches!(out, Err(FactorError::Timeout)));
    }
}

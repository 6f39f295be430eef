use super::*;
use crate::parallel::SharedSlice;
use log::{debug, trace};
use std::collections::BTreeSet;

/// Handicap value asking the ordering to double a column's score
/// instead of adding a fixed offset.
pub const HANDICAP_SENTINEL: i8 = i8::MAX;

// columns scored per elimination round
const BATCH_SIZE: usize = 256;
// weight of the degree (or fill) term relative to the handicap
const DEGREE_WEIGHT: i64 = 8;
// eliminations between abort polls
const POLL_INTERVAL: usize = 16;

// fill markers.  Nonnegative values are valid fill estimates
const STALE: i64 = -1;
const DEFERRED: i64 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Default,
    Taken,
    Super,
}

// One column of the elimination graph.  Super columns are absorbed
// into a representative and never appear in any `rows` list.
#[derive(Debug, Clone)]
struct SymbolicColumn {
    rows: Vec<usize>,
    members: Vec<usize>,
    fill: i64,
    stage: Stage,
    handicap: i8,
    degree: usize,
    key: i64,
}

impl SymbolicColumn {
    fn weight(&self) -> usize {
        1 + self.members.len()
    }

    fn handicap_term(&self) -> i64 {
        if self.handicap == HANDICAP_SENTINEL {
            self.degree as i64 * DEGREE_WEIGHT
        } else {
            self.handicap as i64
        }
    }

    fn score(&self) -> i64 {
        self.degree as i64 * DEGREE_WEIGHT + self.handicap_term()
    }

    fn elimination_cost(&self) -> i64 {
        self.fill * DEGREE_WEIGHT + self.handicap_term()
    }
}

// generation stamped membership marker
struct Marker {
    marks: Vec<u32>,
    generation: u32,
}

impl Marker {
    fn new(n: usize) -> Self {
        Self {
            marks: vec![0; n],
            generation: 0,
        }
    }

    fn next(&mut self) {
        if self.generation == u32::MAX {
            self.marks.fill(0);
            self.generation = 0;
        }
        self.generation += 1;
    }

    fn mark(&mut self, i: usize) {
        self.marks[i] = self.generation;
    }

    fn is_marked(&self, i: usize) -> bool {
        self.marks[i] == self.generation
    }
}

/// Greedy ordering that eliminates the column adding the least fill
/// to its neighbourhood, with columns of identical closed neighbourhoods
/// merged into supernodes.   Ordering stops once the best remaining
/// column is dense relative to the columns left, and the remainder is
/// placed last as a dense block.
#[derive(Debug, Clone)]
pub struct LocalFillOrdering {
    pub dense_window_threshold: f64,
    /// largest reduced pattern tolerated below the dense window
    pub max_column_pattern: usize,
    pub dispatcher: ParallelDispatcher,
}

impl LocalFillOrdering {
    /// Single threaded ordering with no pattern limit
    pub fn new(dense_window_threshold: f64) -> Self {
        Self {
            dense_window_threshold,
            max_column_pattern: usize::MAX,
            dispatcher: ParallelDispatcher::new(1, usize::MAX),
        }
    }
}

impl SymbolicOrdering for LocalFillOrdering {
    fn name(&self) -> &'static str {
        "localfill"
    }

    fn order(&self, input: &SymbolicInput, abort: &AbortCheck) -> Result<SymbolicPlan, FactorError> {
        let mut search = FillSearch::new(input, self);
        search.run(abort)?;
        let plan = search.into_plan()?;
        debug!(
            "localfill ordering: n = {}, factor nnz = {}, first dense column = {}",
            input.n,
            plan.nnz(),
            plan.first_dense
        );
        Ok(plan)
    }
}

struct FillSearch<'a> {
    params: &'a LocalFillOrdering,
    n: usize,
    cols: Vec<SymbolicColumn>,
    priority: BTreeSet<(i64, usize)>,
    // elimination order and the factor pattern (outer rows, diagonal
    // excluded) of every column ordered before the dense tail
    order: Vec<usize>,
    patterns: Vec<Vec<usize>>,
    first_dense: usize,
    remaining: usize,
    marker: Marker,
}

impl<'a> FillSearch<'a> {
    fn new(input: &SymbolicInput, params: &'a LocalFillOrdering) -> Self {
        let n = input.n;

        // symmetric adjacency without the diagonal
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        for col in 0..n {
            for &row in &input.rowval[input.colptr[col]..input.colptr[col + 1]] {
                if row != col {
                    adj[row].push(col);
                    adj[col].push(row);
                }
            }
        }
        for a in adj.iter_mut() {
            a.sort_unstable();
            a.dedup();
        }

        let mut cols: Vec<SymbolicColumn> = (0..n)
            .map(|c| SymbolicColumn {
                rows: Vec::new(),
                members: Vec::new(),
                fill: STALE,
                stage: Stage::Default,
                handicap: input.handicap(c),
                degree: 0,
                key: 0,
            })
            .collect();

        // columns with equal closed neighbourhoods and handicaps form a
        // supernode, represented by its smallest index
        let closed: Vec<Vec<usize>> = adj
            .iter()
            .enumerate()
            .map(|(c, a)| {
                let mut v = a.clone();
                let pos = v.partition_point(|&x| x < c);
                v.insert(pos, c);
                v
            })
            .collect();
        let mut idx: Vec<usize> = (0..n).collect();
        idx.sort_by(|&a, &b| {
            closed[a]
                .cmp(&closed[b])
                .then(cols[a].handicap.cmp(&cols[b].handicap))
                .then(a.cmp(&b))
        });

        let mut rep_of: Vec<usize> = (0..n).collect();
        let mut start = 0;
        while start < n {
            let rep = idx[start];
            let mut end = start + 1;
            while end < n
                && closed[idx[end]] == closed[rep]
                && cols[idx[end]].handicap == cols[rep].handicap
            {
                end += 1;
            }
            for &m in &idx[start + 1..end] {
                rep_of[m] = rep;
                cols[m].stage = Stage::Super;
            }
            cols[rep].members = idx[start + 1..end].to_vec();
            start = end;
        }
        drop(closed);

        for c in 0..n {
            if cols[c].stage == Stage::Default {
                let mut rows: Vec<usize> =
                    adj[c].iter().map(|&v| rep_of[v]).filter(|&r| r != c).collect();
                rows.sort_unstable();
                rows.dedup();
                cols[c].rows = rows;
            }
        }

        let weights: Vec<usize> = cols.iter().map(|c| c.weight()).collect();
        let mut priority = BTreeSet::new();
        for (c, col) in cols.iter_mut().enumerate() {
            if col.stage == Stage::Default {
                col.degree = col.rows.iter().map(|&u| weights[u]).sum();
                col.key = col.score();
                priority.insert((col.key, c));
            }
        }

        Self {
            params,
            n,
            cols,
            priority,
            order: Vec::with_capacity(n),
            patterns: Vec::with_capacity(n),
            first_dense: n,
            remaining: n,
            marker: Marker::new(n),
        }
    }

    fn run(&mut self, abort: &AbortCheck) -> Result<(), FactorError> {
        let mut next_poll = 0;
        let mut rounds = 0usize;

        while self.remaining > 0 {
            if self.order.len() >= next_poll {
                if abort.should_abort() {
                    return Err(FactorError::Timeout);
                }
                next_poll = self.order.len() + POLL_INTERVAL;
            }

            self.reduce_front(BATCH_SIZE)?;
            let batch: Vec<usize> = self
                .priority
                .iter()
                .take(BATCH_SIZE)
                .map(|&(_, c)| c)
                .collect();
            let Some(&best) = batch.first() else {
                break;
            };

            let density = (self.cols[best].degree + self.cols[best].weight()) as f64
                / self.remaining as f64;
            if density >= self.params.dense_window_threshold {
                trace!(
                    "localfill: dense window at {} with {} columns remaining",
                    self.order.len(),
                    self.remaining
                );
                break;
            }

            self.estimate_batch(&batch)?;

            let zero_fill: Vec<usize> = batch
                .iter()
                .copied()
                .filter(|&c| {
                    self.cols[c].fill == 0 && self.cols[c].handicap != HANDICAP_SENTINEL
                })
                .collect();

            trace!(
                "localfill round {}: {} remaining, {} zero fill candidates",
                rounds,
                self.remaining,
                zero_fill.len()
            );

            if zero_fill.is_empty() {
                let pick = batch
                    .iter()
                    .copied()
                    .min_by_key(|&c| (self.cols[c].elimination_cost(), c));
                if let Some(c) = pick {
                    self.eliminate(c)?;
                }
            } else {
                for c in zero_fill {
                    self.eliminate(c)?;
                }
            }
            rounds += 1;
        }

        if self.remaining > 0 {
            self.take_dense_tail();
        }
        Ok(())
    }

    fn rescore(&mut self, c: usize) {
        let col = &mut self.cols[c];
        self.priority.remove(&(col.key, c));
        col.key = col.score();
        self.priority.insert((col.key, c));
    }

    // Keys of deferred columns are upper bounds, so reduce until the
    // leading `count` candidates are all exact.
    fn reduce_front(&mut self, count: usize) -> Result<(), FactorError> {
        loop {
            let pending: Vec<usize> = self
                .priority
                .iter()
                .take(count)
                .map(|&(_, c)| c)
                .filter(|&c| self.cols[c].fill == DEFERRED)
                .collect();
            if pending.is_empty() {
                return Ok(());
            }
            for c in pending {
                self.reduce(c)?;
            }
        }
    }

    fn reduce(&mut self, c: usize) -> Result<(), FactorError> {
        let mut rows = std::mem::take(&mut self.cols[c].rows);
        rows.sort_unstable();
        rows.dedup();
        rows.retain(|&u| u != c && self.cols[u].stage == Stage::Default);
        let degree: usize = rows.iter().map(|&u| self.cols[u].weight()).sum();

        if rows.len() > self.params.max_column_pattern {
            let density = (degree + self.cols[c].weight()) as f64 / self.remaining as f64;
            if density < self.params.dense_window_threshold {
                return Err(FactorError::ModelTooLarge {
                    column: c,
                    pattern: rows.len(),
                    remaining: self.remaining,
                });
            }
        }

        let col = &mut self.cols[c];
        col.rows = rows;
        col.degree = degree;
        col.fill = STALE;
        self.rescore(c);
        Ok(())
    }

    fn estimate_batch(&mut self, batch: &[usize]) -> Result<(), FactorError> {
        let stale: Vec<usize> = batch
            .iter()
            .copied()
            .filter(|&c| self.cols[c].fill < 0)
            .collect();
        if stale.is_empty() {
            return Ok(());
        }

        // membership tests need reduced neighbour lists
        let mut deferred: Vec<usize> = stale
            .iter()
            .flat_map(|&c| self.cols[c].rows.iter().copied())
            .filter(|&t| self.cols[t].fill == DEFERRED)
            .collect();
        deferred.sort_unstable();
        deferred.dedup();
        for t in deferred {
            self.reduce(t)?;
        }

        let work: usize = stale
            .iter()
            .map(|&c| {
                self.cols[c]
                    .rows
                    .iter()
                    .map(|&t| self.cols[t].rows.len())
                    .sum::<usize>()
            })
            .sum();

        let mut fills = vec![0i64; stale.len()];
        if self.params.dispatcher.is_parallel(stale.len(), work) {
            let cols = &self.cols;
            let n = self.n;
            let out = SharedSlice::new(&mut fills);
            self.params.dispatcher.run(
                stale.len(),
                work,
                || Marker::new(n),
                |marker, i, _| {
                    // each task writes only its own slot
                    unsafe { out.set(i, estimate_fill(cols, stale[i], marker)) };
                    Ok::<(), FactorError>(())
                },
            )?;
        } else {
            for (f, &c) in fills.iter_mut().zip(&stale) {
                *f = estimate_fill(&self.cols, c, &mut self.marker);
            }
        }

        for (&c, &f) in stale.iter().zip(&fills) {
            self.cols[c].fill = f;
        }
        Ok(())
    }

    fn eliminate(&mut self, c: usize) -> Result<(), FactorError> {
        if self.cols[c].fill == DEFERRED {
            self.reduce(c)?;
        }
        let rows = std::mem::take(&mut self.cols[c].rows);
        let members = self.cols[c].members.clone();
        let wc = self.cols[c].weight();

        self.priority.remove(&(self.cols[c].key, c));
        self.cols[c].stage = Stage::Taken;
        for &m in &members {
            self.cols[m].stage = Stage::Taken;
        }
        self.remaining -= wc;

        // rows of the factor: later members of the group, then every
        // neighbouring supernode in full
        let mut external = Vec::new();
        for &u in &rows {
            external.push(u);
            external.extend_from_slice(&self.cols[u].members);
        }
        let group: Vec<usize> = std::iter::once(c).chain(members.iter().copied()).collect();
        for (k, &g) in group.iter().enumerate() {
            let mut pattern = group[k + 1..].to_vec();
            pattern.extend_from_slice(&external);
            self.order.push(g);
            self.patterns.push(pattern);
        }

        // the neighbourhood becomes a clique.  New rows are appended
        // unreduced and the degree is an upper bound until reduction
        let wsum: usize = rows.iter().map(|&u| self.cols[u].weight()).sum();
        for &t in &rows {
            let wt = self.cols[t].weight();
            let col = &mut self.cols[t];
            col.rows.extend(rows.iter().copied().filter(|&u| u != t));
            col.degree = (col.degree + wsum).saturating_sub(wt + wc);
            col.fill = DEFERRED;
            self.rescore(t);
        }

        // fill estimates of the next ring out are no longer valid
        for &t in &rows {
            for k in 0..self.cols[t].rows.len() {
                let u = self.cols[t].rows[k];
                if self.cols[u].stage == Stage::Default && self.cols[u].fill >= 0 {
                    self.cols[u].fill = STALE;
                }
            }
        }
        Ok(())
    }

    fn take_dense_tail(&mut self) {
        self.first_dense = self.order.len();
        for c in 0..self.n {
            if self.cols[c].stage == Stage::Default {
                self.cols[c].stage = Stage::Taken;
                self.order.push(c);
                self.order.extend_from_slice(&self.cols[c].members);
            }
        }
        self.priority.clear();
        self.remaining = 0;
    }

    fn into_plan(self) -> Result<SymbolicPlan, FactorError> {
        let n = self.n;
        let first_dense = self.first_dense;
        let perm = Permutation::new(self.order)?;
        let o2i = perm.outer_to_inner();

        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::new();
        colptr.push(0);
        for (j, pattern) in self.patterns.iter().enumerate() {
            rowval.push(j);
            let start = rowval.len();
            rowval.extend(pattern.iter().map(|&o| o2i[o]));
            rowval[start..].sort_unstable();
            colptr.push(rowval.len());
        }
        for j in first_dense..n {
            rowval.extend(j..n);
            colptr.push(rowval.len());
        }

        Ok(SymbolicPlan {
            perm,
            colptr,
            rowval,
            first_dense,
        })
    }
}

// Weighted count of the fill created by eliminating `c`: for each
// neighbour `t`, the weight of the neighbours of `c` not yet adjacent
// to `t`, times the weight of `t`.
fn estimate_fill(cols: &[SymbolicColumn], c: usize, marker: &mut Marker) -> i64 {
    let rows = &cols[c].rows;
    if rows.len() < 2 {
        return 0;
    }
    let total: usize = rows.iter().map(|&u| cols[u].weight()).sum();

    marker.next();
    for &u in rows {
        marker.mark(u);
    }
    let log2 = |len: usize| (usize::BITS - len.leading_zeros()) as usize;

    let mut fill = 0i64;
    for &t in rows {
        let adj = &cols[t].rows;
        let present: usize = if rows.len() * log2(adj.len()) < adj.len() {
            rows.iter()
                .filter(|&&u| u != t && adj.binary_search(&u).is_ok())
                .map(|&u| cols[u].weight())
                .sum()
        } else {
            adj.iter()
                .filter(|&&v| marker.is_marked(v))
                .map(|&v| cols[v].weight())
                .sum()
        };
        let wt = cols[t].weight();
        let missing = total.saturating_sub(wt + present);
        fill += (wt * missing) as i64;
    }
    fill
}

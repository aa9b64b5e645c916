//! Constraint extraction and simulated annealing over vertex permutations
//! (C9): builds the `(prefix, incoming-vertex-set)` constraint matrix from
//! the raw graph, then anneals a permutation that minimises the number of
//! column runs, tightening the R2R queries the forked matcher issues.
//!
//! This runs *before* [`crate::gfmi::GraphFmIndex::build`] — it operates on
//! the [`Graph`] directly and produces a permutation that feeds construction,
//! per the data-flow note in the system overview.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use rand::Rng;

use crate::graph::{Graph, VertexId};

/// A single `(σ, V(σ))` constraint: prefix `σ` and the union of
/// incoming-neighbour vertex ids at every walk fragment currently carrying
/// that prefix.
pub type Constraint = (Vec<u8>, HashSet<VertexId>);

#[derive(Clone, Copy)]
struct Cursor {
    head: VertexId,
    offset: usize,
}

/// Enumerates every constraint reachable within `depth` characters.
///
/// `multiple_vertex_span` controls whether a walk fragment that exhausts its
/// current vertex's label continues into the vertex's out-neighbours (`true`)
/// or is simply dropped (`false`). Recursion is always bounded by `depth`
/// regardless of cycles in the graph.
pub fn extract_constraints(
    graph: &Graph,
    depth: usize,
    multiple_vertex_span: bool,
) -> Vec<Constraint> {
    let mut out = Vec::new();
    if depth == 0 {
        return out;
    }

    let initial: Vec<Cursor> = (0..graph.num_vertices())
        .map(|v| Cursor { head: v, offset: 0 })
        .collect();
    recurse(graph, initial, Vec::new(), depth, multiple_vertex_span, &mut out);
    out
}

fn recurse(
    graph: &Graph,
    cursors: Vec<Cursor>,
    prefix: Vec<u8>,
    depth_remaining: usize,
    multiple_vertex_span: bool,
    out: &mut Vec<Constraint>,
) {
    if depth_remaining == 0 || cursors.is_empty() {
        return;
    }

    let mut buckets: HashMap<u8, Vec<Cursor>> = HashMap::new();
    for &c in &cursors {
        let byte = graph.label(c.head)[c.offset];
        buckets.entry(byte).or_default().push(c);
    }

    for (byte, bucket) in buckets {
        let mut constraint_set = HashSet::new();
        for c in &bucket {
            constraint_set.extend(graph.in_neighbours(c.head).iter().copied());
        }

        let mut new_prefix = Vec::with_capacity(prefix.len() + 1);
        new_prefix.push(byte);
        new_prefix.extend_from_slice(&prefix);
        out.push((new_prefix.clone(), constraint_set));

        let mut next_cursors = Vec::new();
        for c in &bucket {
            let label_len = graph.label(c.head).len();
            if c.offset + 1 < label_len {
                next_cursors.push(Cursor {
                    head: c.head,
                    offset: c.offset + 1,
                });
            } else if multiple_vertex_span {
                for &w in graph.out_neighbours(c.head) {
                    next_cursors.push(Cursor { head: w, offset: 0 });
                }
            }
        }

        recurse(
            graph,
            next_cursors,
            new_prefix,
            depth_remaining - 1,
            multiple_vertex_span,
            out,
        );
    }
}

/// The binary constraint matrix `M[v][j] = 1 iff v in V(sigma_j)`, stored
/// column-major (one `Vec<bool>` of length `num_vertices` per constraint) so
/// that a run-count scan over a column in permutation order is a contiguous
/// walk through `perm`, indexing into each column.
#[derive(Debug, Clone)]
pub struct ConstraintMatrix {
    num_vertices: usize,
    columns: Vec<Vec<bool>>,
}

impl ConstraintMatrix {
    pub fn from_constraints(num_vertices: usize, constraints: &[Constraint]) -> Self {
        let columns = constraints
            .iter()
            .map(|(_, set)| {
                let mut col = vec![false; num_vertices];
                for &v in set {
                    col[v] = true;
                }
                col
            })
            .collect();
        ConstraintMatrix {
            num_vertices,
            columns,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Total run-count cost of `perm` (the permutation objective): for each
/// column, the number of maximal runs of `1`s when the column is read in
/// permutation order.
pub fn total_cost(matrix: &ConstraintMatrix, perm: &[VertexId]) -> u64 {
    matrix
        .columns
        .iter()
        .map(|col| {
            let mut runs = 0u64;
            let mut prev = false;
            for &v in perm {
                let bit = col[v];
                if bit && !prev {
                    runs += 1;
                }
                prev = bit;
            }
            runs
        })
        .sum()
}

fn run_start_with(bit_at: impl Fn(usize) -> bool, p: usize) -> bool {
    bit_at(p) && (p == 0 || !bit_at(p - 1))
}

/// The change in total cost from swapping permutation positions `i1` and
/// `i2`, computed per column using only the cells whose run-start status can
/// possibly change: `{i1, i1+1, i2, i2+1}`. Matches the "four neighbouring
/// rows" incremental update the sampler relies on to stay cheap per step.
fn cost_delta(matrix: &ConstraintMatrix, perm: &[VertexId], i1: usize, i2: usize) -> i64 {
    let n = perm.len();
    let mut positions = vec![i1, i2];
    if i1 + 1 < n {
        positions.push(i1 + 1);
    }
    if i2 + 1 < n {
        positions.push(i2 + 1);
    }
    positions.sort_unstable();
    positions.dedup();

    let mut delta = 0i64;
    for col in &matrix.columns {
        if col[perm[i1]] == col[perm[i2]] {
            continue;
        }

        let bit_before = |i: usize| col[perm[i]];
        let bit_after = |i: usize| {
            if i == i1 {
                col[perm[i2]]
            } else if i == i2 {
                col[perm[i1]]
            } else {
                col[perm[i]]
            }
        };

        for &p in &positions {
            let before = run_start_with(bit_before, p) as i64;
            let after = run_start_with(bit_after, p) as i64;
            delta += after - before;
        }
    }
    delta
}

#[derive(Debug, Clone, Copy)]
pub struct AnnealConfig {
    pub initial_temperature: f64,
    pub cooling_factor: f64,
    pub min_temperature: f64,
    /// Scales the Boltzmann-style acceptance probability `exp((cur-next) /
    /// (temperature * scale))`.
    pub scale: f64,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 100.0,
            cooling_factor: 0.999,
            min_temperature: 1e-3,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnealResult {
    pub best_permutation: Vec<VertexId>,
    pub best_cost: u64,
    pub iterations: u64,
}

/// Anneals `initial_permutation` against `matrix` until the temperature
/// drops below `config.min_temperature` or `deadline` passes, whichever
/// comes first. `best_cost` is non-increasing over the run by construction.
pub fn anneal(
    matrix: &ConstraintMatrix,
    initial_permutation: Vec<VertexId>,
    config: AnnealConfig,
    deadline: Instant,
    rng: &mut impl Rng,
) -> AnnealResult {
    let mut perm = initial_permutation;
    let mut cur_cost = total_cost(matrix, &perm);
    let mut best_permutation = perm.clone();
    let mut best_cost = cur_cost;
    let mut temperature = config.initial_temperature;
    let mut iterations = 0u64;

    while temperature >= config.min_temperature && Instant::now() < deadline && perm.len() >= 2 {
        let i1 = rng.random_range(0..perm.len());
        let mut i2 = rng.random_range(0..perm.len());
        while i2 == i1 {
            i2 = rng.random_range(0..perm.len());
        }

        let delta = cost_delta(matrix, &perm, i1, i2);
        let accept = delta < 0
            || rng.random::<f64>() < (-delta as f64 / (temperature * config.scale)).exp();

        if accept {
            perm.swap(i1, i2);
            cur_cost = (cur_cost as i64 + delta).max(0) as u64;
            if cur_cost < best_cost {
                best_cost = cur_cost;
                best_permutation = perm.clone();
            }
        }

        temperature *= config.cooling_factor;
        iterations += 1;
    }

    log::debug!(
        "annealing finished after {} iterations: best_cost={}",
        iterations,
        best_cost
    );

    AnnealResult {
        best_permutation,
        best_cost,
        iterations,
    }
}

//! Builder-style configuration for a full index build: the GFMI's own
//! parameters ([`GfmiConfig`]), plus the two optional companion artefacts
//! built from it — the FM-table cache and an annealed permutation.

use crate::anneal::{self, AnnealConfig, ConstraintMatrix};
use crate::error::Result;
use crate::gfmi::{GfmiConfig, GraphFmIndex};
use crate::graph::{Graph, VertexId};

use std::time::Instant;

use rand::Rng;

/// Configures and runs a full build: optionally anneal a permutation first,
/// then construct the [`GraphFmIndex`] and, optionally, its FM-table cache.
#[derive(Clone)]
pub struct IndexBuildConfig {
    gfmi: GfmiConfig,
    cache_depth: Option<usize>,
    anneal: Option<AnnealSettings>,
}

#[derive(Clone)]
struct AnnealSettings {
    constraint_depth: usize,
    multiple_vertex_span: bool,
    config: AnnealConfig,
    deadline_millis: u64,
}

impl IndexBuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reserved-byte alphabet and FM-index sampling rates used for
    /// the graph FM-index itself. See [`GfmiConfig`] for field meanings.
    pub fn gfmi_config(self, gfmi: GfmiConfig) -> Self {
        Self { gfmi, ..self }
    }

    /// Builds an FM-table cache of the given depth alongside the index. The
    /// default is no cache.
    pub fn cache_depth(self, cache_depth: usize) -> Self {
        Self {
            cache_depth: Some(cache_depth),
            ..self
        }
    }

    /// Anneals a permutation from the graph's own constraint structure before
    /// construction, instead of using the identity permutation or a
    /// caller-supplied one. `constraint_depth` bounds how far constraint
    /// extraction looks ahead; `deadline_millis` bounds annealing's wall
    /// clock budget.
    pub fn anneal_permutation(
        self,
        constraint_depth: usize,
        multiple_vertex_span: bool,
        config: AnnealConfig,
        deadline_millis: u64,
    ) -> Self {
        Self {
            anneal: Some(AnnealSettings {
                constraint_depth,
                multiple_vertex_span,
                config,
                deadline_millis,
            }),
            ..self
        }
    }

    /// Runs the configured build. `permutation` is used verbatim unless
    /// [`anneal_permutation`](Self::anneal_permutation) was configured, in
    /// which case it seeds the annealer's initial state (falling back to the
    /// identity permutation when `None`).
    pub fn build(
        self,
        graph: Graph,
        permutation: Option<Vec<VertexId>>,
        rng: &mut impl Rng,
    ) -> Result<(GraphFmIndex, Option<crate::cache::Cache>)> {
        let permutation = match &self.anneal {
            Some(settings) => {
                let constraints = anneal::extract_constraints(
                    &graph,
                    settings.constraint_depth,
                    settings.multiple_vertex_span,
                );
                let matrix = ConstraintMatrix::from_constraints(graph.num_vertices(), &constraints);
                let initial = permutation.unwrap_or_else(|| (0..graph.num_vertices()).collect());
                let deadline =
                    Instant::now() + std::time::Duration::from_millis(settings.deadline_millis);
                let result = anneal::anneal(&matrix, initial, settings.config, deadline, rng);
                Some(result.best_permutation)
            }
            None => permutation,
        };

        let gfmi = GraphFmIndex::build(graph, permutation, self.gfmi)?;

        let cache = match self.cache_depth {
            Some(depth) => Some(crate::cache::Cache::build(
                &gfmi,
                depth,
                self.gfmi.rank_sample_rate,
                self.gfmi.isa_sample_rate,
            )?),
            None => None,
        };

        Ok((gfmi, cache))
    }
}

impl Default for IndexBuildConfig {
    fn default() -> Self {
        Self {
            gfmi: GfmiConfig::default(),
            cache_depth: None,
            anneal: None,
        }
    }
}

//! The decoder (C10): translates suffix-array rows of a [`GraphFmIndex`]
//! back into concrete `(vertex_id, offset)` origins.
//!
//! Holds only a shared, non-owning reference to the GFMI (per the ownership
//! note in §3) — decoding never mutates the index and many decoders may
//! share one GFMI across threads.

use rayon::prelude::*;

use crate::fmindex::Interval;
use crate::gfmi::GraphFmIndex;
use crate::graph::VertexId;
use crate::matcher::Fork;

/// Where a matched occurrence begins: vertex `vid`, `offset` bytes into its
/// label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub vid: VertexId,
    pub offset: u64,
}

pub struct Decoder<'a> {
    gfmi: &'a GraphFmIndex,
}

impl<'a> Decoder<'a> {
    pub fn new(gfmi: &'a GraphFmIndex) -> Self {
        Decoder { gfmi }
    }

    /// Decodes every row in `interval`, in parallel across the interval's SA
    /// positions as described in §5.
    pub fn decode_interval(&self, interval: Interval) -> Vec<Origin> {
        (interval.lo..interval.hi)
            .into_par_iter()
            .filter_map(|row| self.decode_row(row))
            .collect()
    }

    pub fn decode_row(&self, row: u64) -> Option<Origin> {
        let pos = self.gfmi.sa(Interval {
            lo: row,
            hi: row + 1,
        });
        let text_pos = *pos.first()?;
        self.gfmi
            .locate_label(text_pos)
            .map(|(vid, offset)| Origin { vid, offset })
    }

    /// Decodes every leaf fork's SA interval.
    pub fn decode_forks(&self, forks: &[Fork]) -> Vec<Origin> {
        forks
            .iter()
            .flat_map(|f| self.decode_interval(f.interval()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfmi::GfmiConfig;
    use crate::graph::Graph;
    use crate::matcher::search;

    fn scenario_a() -> GraphFmIndex {
        let mut g = Graph::new();
        let v0 = g.add_vertex(*b"ACCGTA").unwrap();
        let v1 = g.add_vertex(*b"ACGTTA").unwrap();
        let v2 = g.add_vertex(*b"GTTATA").unwrap();
        let v3 = g.add_vertex(*b"CCGTTA").unwrap();
        g.add_edge(v0, v1).unwrap();
        g.add_edge(v0, v2).unwrap();
        g.add_edge(v1, v3).unwrap();
        g.add_edge(v2, v3).unwrap();
        GraphFmIndex::build(
            g,
            None,
            GfmiConfig {
                rank_sample_rate: 2,
                isa_sample_rate: 2,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn decode_of_crossing_match_lands_in_the_upstream_vertex() {
        let gfmi = scenario_a();
        let result = search(&gfmi, b"TAC", None, None);
        let decoder = Decoder::new(&gfmi);
        let origins = decoder.decode_forks(&result.leaf_forks);

        assert_eq!(origins.len(), 1);
        // "TAC" starts at offset 4 of v0's label "ACCGTA" (the 'T').
        assert_eq!(origins[0], Origin { vid: 0, offset: 4 });
    }

    #[test]
    fn decode_of_single_vertex_match_is_consistent_with_label() {
        let gfmi = scenario_a();
        let result = search(&gfmi, b"CCGTA", None, None);
        let decoder = Decoder::new(&gfmi);
        let origins = decoder.decode_forks(&result.leaf_forks);

        assert_eq!(origins, vec![Origin { vid: 0, offset: 1 }]);
    }
}

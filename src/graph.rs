//! String-labelled directed graph: the input to index construction.

use std::collections::HashMap;

use crate::error::{GfmiError, Result};

/// Vertex id. Vertices are numbered densely in `0..graph.num_vertices()`.
pub type VertexId = usize;

/// The five byte values reserved by the linearisation under
/// [`GfmiConfig::default`](crate::gfmi::GfmiConfig::default)'s delimiters. A
/// `Graph` is not tied to any one `GfmiConfig`, so this is only a baseline
/// sanity check for the common case; a build with non-default `c0`/`c1`/
/// `a0`/`a1` re-validates every label against its own reserved bytes in
/// [`GraphFmIndex::build`](crate::gfmi::GraphFmIndex::build), which is the
/// authoritative check.
pub const RESERVED_BYTES: [u8; 5] = [b'(', b')', b',', b'.', 0];

/// A set of vertices with labels and directed edges between them.
///
/// The graph exclusively owns its vertices and labels; building a
/// [`crate::gfmi::GraphFmIndex`] consumes it.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    labels: Vec<Vec<u8>>,
    out_edges: Vec<Vec<VertexId>>,
    in_edges: Vec<Vec<VertexId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex with the given label, returning its id.
    ///
    /// The label must be non-empty and free of the default reserved bytes
    /// ([`RESERVED_BYTES`]). Building with a non-default [`GfmiConfig`](crate::gfmi::GfmiConfig)
    /// re-validates against that build's actual reserved bytes.
    pub fn add_vertex(&mut self, label: impl Into<Vec<u8>>) -> Result<VertexId> {
        let label = label.into();
        if label.is_empty() {
            return Err(GfmiError::malformed("vertex label must be non-empty"));
        }
        if label.iter().any(|b| RESERVED_BYTES.contains(b)) {
            return Err(GfmiError::malformed(
                "vertex label contains a reserved byte",
            ));
        }

        let id = self.labels.len();
        self.labels.push(label);
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        Ok(id)
    }

    /// Adds a directed edge `src -> dst`. Both endpoints must already exist.
    pub fn add_edge(&mut self, src: VertexId, dst: VertexId) -> Result<()> {
        if src >= self.labels.len() || dst >= self.labels.len() {
            return Err(GfmiError::malformed(format!(
                "edge ({src}, {dst}) references an unknown vertex"
            )));
        }
        self.out_edges[src].push(dst);
        self.in_edges[dst].push(src);
        Ok(())
    }

    pub fn num_vertices(&self) -> usize {
        self.labels.len()
    }

    pub fn label(&self, v: VertexId) -> &[u8] {
        &self.labels[v]
    }

    pub fn out_neighbours(&self, v: VertexId) -> &[VertexId] {
        &self.out_edges[v]
    }

    pub fn in_neighbours(&self, v: VertexId) -> &[VertexId] {
        &self.in_edges[v]
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    /// Every byte value occurring across all labels, used to size alphabets
    /// during FM-index construction.
    pub fn distinct_label_bytes(&self) -> Vec<u8> {
        let mut seen = [false; 256];
        for label in &self.labels {
            for &b in label {
                seen[b as usize] = true;
            }
        }
        (0u16..256)
            .filter(|&b| seen[b as usize])
            .map(|b| b as u8)
            .collect()
    }

    /// Brute-force enumeration of every walk of total label length exactly
    /// `k`, starting at every vertex and every in-label offset, used by the
    /// test suite and by the k-mer spectrum collaborator to sanity-check the
    /// indexed count against ground truth.
    pub fn kmer_spectrum(&self, k: usize) -> HashMap<Vec<u8>, usize> {
        let mut spectrum = HashMap::new();
        if k == 0 {
            return spectrum;
        }

        for v in 0..self.num_vertices() {
            for offset in 0..self.labels[v].len() {
                self.collect_kmers_from(v, offset, k, Vec::new(), &mut spectrum);
            }
        }

        spectrum
    }

    fn collect_kmers_from(
        &self,
        v: VertexId,
        offset: usize,
        k: usize,
        mut acc: Vec<u8>,
        out: &mut HashMap<Vec<u8>, usize>,
    ) {
        let label = &self.labels[v];
        let remaining_in_label = label.len() - offset;
        let take = remaining_in_label.min(k - acc.len());
        acc.extend_from_slice(&label[offset..offset + take]);

        if acc.len() == k {
            *out.entry(acc).or_insert(0) += 1;
            return;
        }

        for &next in &self.out_edges[v] {
            self.collect_kmers_from(next, 0, k, acc.clone(), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dag() -> Graph {
        let mut g = Graph::new();
        let v0 = g.add_vertex(*b"ACCGTA").unwrap();
        let v1 = g.add_vertex(*b"ACGTTA").unwrap();
        let v2 = g.add_vertex(*b"GTTATA").unwrap();
        let v3 = g.add_vertex(*b"CCGTTA").unwrap();
        g.add_edge(v0, v1).unwrap();
        g.add_edge(v0, v2).unwrap();
        g.add_edge(v1, v3).unwrap();
        g.add_edge(v2, v3).unwrap();
        g
    }

    #[test]
    fn rejects_reserved_bytes_in_label() {
        let mut g = Graph::new();
        assert!(g.add_vertex(*b"AC(GT").is_err());
    }

    #[test]
    fn rejects_empty_label() {
        let mut g = Graph::new();
        assert!(g.add_vertex(Vec::new()).is_err());
    }

    #[test]
    fn rejects_edge_to_unknown_vertex() {
        let mut g = Graph::new();
        let v0 = g.add_vertex(*b"ACGT").unwrap();
        assert!(g.add_edge(v0, 99).is_err());
    }

    #[test]
    fn kmer_spectrum_counts_single_vertex_kmers() {
        let g = linear_dag();
        let spectrum = g.kmer_spectrum(2);
        assert_eq!(spectrum.get(b"AC".as_slice()).copied().unwrap_or(0), 2);
    }

    #[test]
    fn kmer_spectrum_crosses_edges() {
        let g = linear_dag();
        // "TAC" occurs crossing v0 -> v1 ("...GTA" + "ACG...")
        let spectrum = g.kmer_spectrum(3);
        assert_eq!(spectrum.get(b"TAC".as_slice()).copied().unwrap_or(0), 1);
    }
}

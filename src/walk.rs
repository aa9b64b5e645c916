//! Walk enumeration (C10): given a decoded `(vid, offset)` origin, walks a
//! compactly encoded copy of the graph to reconstruct every full
//! vertex-chain walk consistent with a query string.
//!
//! The encoding mirrors the `gine` binary layout (§6): labels are packed at
//! `⌈log₂|Σ|⌉` bits per character, independent of the main index's alphabet
//! (this one never carries the graph's reserved bytes). This is a
//! read-only, construction-time snapshot of the graph, kept separately from
//! the GFMI so that decode-time walking does not depend on the permutation
//! or the FM-index at all.

use crate::bitstream::{Bitstream, bits_for_range};
use crate::graph::{Graph, VertexId};

struct EncodedVertex {
    label_len: u64,
    out_neighbours: Vec<VertexId>,
    packed_label: Bitstream,
}

/// A graph re-encoded for label-byte random access, with no other structure
/// attached.
pub struct EncodedGraph {
    alphabet: Vec<u8>,
    encoding_of: [u8; 256],
    char_width: usize,
    vertices: Vec<EncodedVertex>,
}

impl EncodedGraph {
    pub fn build(graph: &Graph) -> Self {
        let alphabet = graph.distinct_label_bytes();
        let mut encoding_of = [255u8; 256];
        for (e, &b) in alphabet.iter().enumerate() {
            encoding_of[b as usize] = e as u8;
        }
        let char_width = bits_for_range(alphabet.len().max(1)).max(1);

        let vertices = (0..graph.num_vertices())
            .map(|v| {
                let label = graph.label(v);
                let mut bits = Bitstream::with_bit_capacity(label.len() * char_width);
                for (i, &b) in label.iter().enumerate() {
                    bits.write(i * char_width, encoding_of[b as usize] as u64, char_width);
                }
                bits.fit((label.len() * char_width).div_ceil(64) * 64);
                EncodedVertex {
                    label_len: label.len() as u64,
                    out_neighbours: graph.out_neighbours(v).to_vec(),
                    packed_label: bits,
                }
            })
            .collect();

        EncodedGraph {
            alphabet,
            encoding_of,
            char_width,
            vertices,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn label_len(&self, v: VertexId) -> u64 {
        self.vertices[v].label_len
    }

    pub fn out_neighbours(&self, v: VertexId) -> &[VertexId] {
        &self.vertices[v].out_neighbours
    }

    pub fn label_byte(&self, v: VertexId, offset: u64) -> u8 {
        let code = self.vertices[v]
            .packed_label
            .read(offset as usize * self.char_width, self.char_width) as u8;
        self.alphabet[code as usize]
    }

    pub fn encode(&self, byte: u8) -> Option<u8> {
        let e = self.encoding_of[byte as usize];
        if e == 255 { None } else { Some(e) }
    }
}

/// A walk: the sequence of vertices visited, each paired with the in-label
/// offset at which it was entered.
pub type Walk = Vec<(VertexId, u64)>;

/// Enumerates every walk, starting at `(origin_vid, origin_offset)`, whose
/// concatenated labels match `query` exactly. Forks one continuation per
/// outgoing edge whenever a vertex's label is exhausted before the query is.
pub fn enumerate_walks(
    genc: &EncodedGraph,
    origin_vid: VertexId,
    origin_offset: u64,
    query: &[u8],
) -> Vec<Walk> {
    let mut results = Vec::new();
    walk_from(
        genc,
        origin_vid,
        origin_offset,
        query,
        0,
        vec![(origin_vid, origin_offset)],
        &mut results,
    );
    results
}

fn walk_from(
    genc: &EncodedGraph,
    vid: VertexId,
    offset: u64,
    query: &[u8],
    query_pos: usize,
    current_walk: Walk,
    out: &mut Vec<Walk>,
) {
    let label_len = genc.label_len(vid);
    let mut o = offset;
    let mut qp = query_pos;

    while qp < query.len() {
        if o >= label_len {
            let neighbours = genc.out_neighbours(vid);
            if neighbours.is_empty() {
                return;
            }
            for &next in neighbours {
                let mut walk = current_walk.clone();
                walk.push((next, 0));
                walk_from(genc, next, 0, query, qp, walk, out);
            }
            return;
        }
        if genc.label_byte(vid, o) != query[qp] {
            return;
        }
        o += 1;
        qp += 1;
    }

    out.push(current_walk);
}

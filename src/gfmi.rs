//! The graph FM-index (GFMI): an FM-index over a permuted graph linearisation,
//! paired with the R2R translation structure that turns an SA interval
//! sitting in the c_0 bucket into the incoming-neighbour SA intervals of the
//! c_1 bucket one vertex earlier.
//!
//! Construction follows §4.4: generate codewords, linearise, build the inner
//! FM-index, argsort the two reserved-byte buckets, then build the R2R from
//! the in-adjacency of the graph. The graph itself is not retained past
//! `build` — only the permutation, `bwt_to_vid`, the FM-index and the R2R
//! survive, matching the ownership rule in §3.

use std::collections::HashMap;

use crate::bitstream::{Bitstream, bits_for_range};
use crate::error::{GfmiError, Result};
use crate::fmindex::{FmIndex, Interval};
use crate::graph::{Graph, VertexId};
use crate::r2r::{Imt, IvInterval, Oimt};

pub const DEFAULT_C0: u8 = b'(';
pub const DEFAULT_C1: u8 = b')';
pub const DEFAULT_A0: u8 = b',';
pub const DEFAULT_A1: u8 = b'.';

/// Reserved-byte alphabet and FM-index sampling parameters for a build.
#[derive(Debug, Clone, Copy)]
pub struct GfmiConfig {
    pub c0: u8,
    pub c1: u8,
    pub a0: u8,
    pub a1: u8,
    pub rank_sample_rate: usize,
    pub isa_sample_rate: usize,
    pub with_oracle: bool,
}

impl Default for GfmiConfig {
    fn default() -> Self {
        Self {
            c0: DEFAULT_C0,
            c1: DEFAULT_C1,
            a0: DEFAULT_A0,
            a1: DEFAULT_A1,
            rank_sample_rate: 32,
            isa_sample_rate: 32,
            with_oracle: true,
        }
    }
}

/// The boundary of a single vertex's label within the linearisation, kept
/// around after construction so that the decoder can turn an SA position
/// that lands mid-label back into `(vid, offset)`.
#[derive(Debug, Clone, Copy)]
struct LabelSpan {
    vid: VertexId,
    start: u64,
    len: u64,
}

#[derive(Debug)]
pub struct GraphFmIndex {
    config: GfmiConfig,
    num_vertices: usize,
    permutation: Vec<VertexId>,
    inverse_permutation: Vec<usize>,
    bwt_to_vid: Vec<VertexId>,
    fmi: FmIndex,
    r2r: Imt,
    oracle_r2r: Option<Oimt>,
    // indexed by vid, sorted by `start`; used by the decoder.
    label_spans: Vec<LabelSpan>,
}

impl GraphFmIndex {
    /// Builds a GFMI from `graph`, consuming it. `permutation[i]` is the
    /// vertex placed at linearisation position `i`; `None` uses the identity
    /// permutation.
    pub fn build(
        graph: Graph,
        permutation: Option<Vec<VertexId>>,
        config: GfmiConfig,
    ) -> Result<Self> {
        if config.c0 >= config.c1 {
            return Err(GfmiError::malformed("c_0 must be strictly less than c_1"));
        }

        let num_vertices = graph.num_vertices();
        let reserved = [config.c0, config.c1, config.a0, config.a1, 0];
        for v in 0..num_vertices {
            if graph.label(v).iter().any(|b| reserved.contains(b)) {
                return Err(GfmiError::malformed(
                    "vertex label contains one of this build's reserved bytes (c_0, c_1, a_0, a_1, or the terminator)",
                ));
            }
        }
        log::debug!(
            "building graph FM-index over {} vertices (oracle = {})",
            num_vertices,
            config.with_oracle
        );
        let permutation = match permutation {
            Some(p) => p,
            None => (0..num_vertices).collect(),
        };
        if permutation.len() != num_vertices {
            return Err(GfmiError::malformed(
                "permutation cardinality must equal the number of vertices",
            ));
        }
        let mut inverse_permutation = vec![usize::MAX; num_vertices];
        for (i, &v) in permutation.iter().enumerate() {
            if v >= num_vertices || inverse_permutation[v] != usize::MAX {
                return Err(GfmiError::malformed("permutation is not a bijection"));
            }
            inverse_permutation[v] = i;
        }

        let codeword_bits = bits_for_range(num_vertices.max(1));

        // linearise: S = concat_i [c0, L(pi[i]), c1, codeword(i)]
        let mut s = Vec::new();
        let mut position_of_c0 = vec![0u64; num_vertices];
        let mut position_of_c1 = vec![0u64; num_vertices];
        let mut label_start = vec![0u64; num_vertices];
        let mut label_len = vec![0u64; num_vertices];

        for i in 0..num_vertices {
            let v = permutation[i];
            position_of_c0[i] = s.len() as u64;
            s.push(config.c0);
            label_start[v] = s.len() as u64;
            let label = graph.label(v);
            label_len[v] = label.len() as u64;
            s.extend_from_slice(label);
            position_of_c1[i] = s.len() as u64;
            s.push(config.c1);
            for bit in (0..codeword_bits).rev() {
                let set = (i >> bit) & 1 == 1;
                s.push(if set { config.a1 } else { config.a0 });
            }
        }

        let fmi = FmIndex::build(&s, config.rank_sample_rate, config.isa_sample_rate)?;

        // reverse lookup: text position of a c0/c1 byte -> linearisation index i
        let mut c0_pos_to_i: HashMap<u64, usize> = HashMap::with_capacity(num_vertices);
        let mut c1_pos_to_i: HashMap<u64, usize> = HashMap::with_capacity(num_vertices);
        for i in 0..num_vertices {
            c0_pos_to_i.insert(position_of_c0[i], i);
            c1_pos_to_i.insert(position_of_c1[i], i);
        }

        // c_0 bucket: BWT rows 1..=num_vertices
        let mut bwt_to_vid = vec![0usize; num_vertices];
        for k in 0..num_vertices {
            let row = 1 + k as u64;
            let text_pos = fmi.sa_at(row);
            let i = *c0_pos_to_i
                .get(&text_pos)
                .ok_or_else(|| GfmiError::logic("c_0 bucket row did not land on a c_0 byte"))?;
            bwt_to_vid[k] = permutation[i];
        }

        // c_1 bucket: BWT rows (V+1)..=(2V), relative rank by linearisation index i
        let mut c1_text_to_bwt = vec![0usize; num_vertices];
        for k in 0..num_vertices {
            let row = (num_vertices as u64) + 1 + k as u64;
            let text_pos = fmi.sa_at(row);
            let i = *c1_pos_to_i
                .get(&text_pos)
                .ok_or_else(|| GfmiError::logic("c_1 bucket row did not land on a c_1 byte"))?;
            c1_text_to_bwt[i] = k;
        }

        // R2R: for c_0-bucket key k (vertex bwt_to_vid[k]), the relative c_1-bucket
        // ranks of its incoming neighbours.
        let mut per_key_intervals: Vec<Vec<IvInterval>> = vec![Vec::new(); num_vertices];
        let mut per_key_tagged: Vec<Vec<(IvInterval, u8)>> = vec![Vec::new(); num_vertices];
        for k in 0..num_vertices {
            let vid = bwt_to_vid[k];
            for &u in graph.in_neighbours(vid) {
                let i_u = inverse_permutation[u];
                let relative_rank = c1_text_to_bwt[i_u] as u64;
                per_key_intervals[k].push(IvInterval::new(relative_rank, relative_rank));
                if config.with_oracle {
                    let abs_row = (num_vertices as u64) + 1 + relative_rank;
                    let enc_last_char = fmi.get(abs_row);
                    per_key_tagged[k].push((IvInterval::new(relative_rank, relative_rank), enc_last_char));
                }
            }
        }

        let r2r = Imt::build(per_key_intervals);
        let oracle_r2r = if config.with_oracle {
            Some(Oimt::build(per_key_tagged, fmi.alphabet_size()))
        } else {
            None
        };

        let mut label_spans: Vec<LabelSpan> = (0..num_vertices)
            .map(|v| LabelSpan {
                vid: v,
                start: label_start[v],
                len: label_len[v],
            })
            .collect();
        label_spans.sort_by_key(|s| s.start);
        log::debug!(
            "graph FM-index built: bwt_length={}, fmi alphabet size={}",
            fmi.bwt_length(),
            fmi.alphabet_size()
        );

        Ok(GraphFmIndex {
            config,
            num_vertices,
            permutation,
            inverse_permutation,
            bwt_to_vid,
            fmi,
            r2r,
            oracle_r2r,
            label_spans,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn config(&self) -> GfmiConfig {
        self.config
    }

    pub fn bwt_length(&self) -> u64 {
        self.fmi.bwt_length()
    }

    pub fn permutation(&self) -> &[VertexId] {
        &self.permutation
    }

    pub fn inverse_permutation(&self) -> &[usize] {
        &self.inverse_permutation
    }

    pub fn bwt_to_vid(&self, c0_rank: usize) -> VertexId {
        self.bwt_to_vid[c0_rank]
    }

    pub(crate) fn fmi(&self) -> &FmIndex {
        &self.fmi
    }

    pub(crate) fn label_spans(&self) -> &[LabelSpan] {
        &self.label_spans
    }

    /// Encodes `byte` against the inner FM-index's alphabet.
    pub fn encode(&self, byte: u8) -> Option<u8> {
        self.fmi.encode(byte)
    }

    /// Every indexed byte except the five reserved separator/codeword/
    /// terminator values, used by cache construction (C8) and constraint
    /// extraction (C9) to enumerate genuine label characters.
    pub fn non_reserved_alphabet(&self) -> Vec<u8> {
        self.fmi
            .alphabet()
            .iter()
            .copied()
            .filter(|&b| {
                b != self.config.c0
                    && b != self.config.c1
                    && b != self.config.a0
                    && b != self.config.a1
                    && b != 0
            })
            .collect()
    }

    /// LF-steps `interval` at `byte`, returning the new SA interval (empty if
    /// `byte` does not precede any suffix in `interval`).
    pub fn advance(&self, byte: u8, interval: Interval) -> Interval {
        match self.fmi.encode(byte) {
            Some(symbol) => self.fmi.lf_step(symbol, interval),
            None => Interval::empty(),
        }
    }

    /// The SA interval that prepending `byte` to `interval`'s suffix would
    /// produce, without otherwise touching `interval`. Used with `byte =
    /// c_0` to test whether the current candidate walk reaches a vertex
    /// boundary.
    pub fn precedence_range(&self, interval: Interval, byte: u8) -> Interval {
        self.advance(byte, interval)
    }

    pub fn c0(&self) -> u8 {
        self.config.c0
    }

    pub fn c1(&self) -> u8 {
        self.config.c1
    }

    /// Translates a c_0-relative SA range (as produced by `precedence_range(.,
    /// c_0)`) into the R2R's `[a, b]` key range.
    pub fn c0_interval_to_r2r_keys(&self, interval: Interval) -> Option<(usize, usize)> {
        if interval.is_empty() {
            return None;
        }
        let a = interval.lo.checked_sub(1)? as usize;
        let b = interval.hi.checked_sub(2)? as usize;
        if a > b { None } else { Some((a, b)) }
    }

    /// Queries the plain R2R (unconditional union over incoming neighbours).
    pub fn query_r2r(&self, a: usize, b: usize, max_intervals: Option<usize>) -> Vec<IvInterval> {
        self.r2r.query(a, b, max_intervals)
    }

    /// Queries the oracle R2R for encoding `c`, if built.
    pub fn query_oracle_r2r(
        &self,
        a: usize,
        b: usize,
        c: u8,
        max_intervals: Option<usize>,
    ) -> Option<Vec<IvInterval>> {
        self.oracle_r2r
            .as_ref()
            .map(|o| o.query(a, b, c, max_intervals))
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle_r2r.is_some()
    }

    /// Converts a relative `[lo, hi]` c_1-bucket interval (as stored by the
    /// R2R) into the absolute, half-open SA interval of the full FM-index.
    pub fn relative_c1_to_sa_interval(&self, iv: IvInterval) -> Interval {
        let base = self.num_vertices as u64 + 1;
        Interval {
            lo: base + iv.lo,
            hi: base + 1 + iv.hi,
        }
    }

    pub fn count(&self, pattern: &[u8]) -> u64 {
        self.fmi.count(pattern)
    }

    /// Recovers the text positions covered by `interval`.
    pub fn sa(&self, interval: Interval) -> Vec<u64> {
        self.fmi.sa(interval)
    }

    /// Finds the vertex whose label body contains text position `pos`
    /// (i.e. `start <= pos < start + len`), along with the in-label offset.
    /// Returns `None` if `pos` does not fall strictly inside a label (it may
    /// land on a reserved byte or codeword instead).
    pub fn locate_label(&self, pos: u64) -> Option<(VertexId, u64)> {
        let idx = self
            .label_spans
            .partition_point(|span| span.start <= pos)
            .checked_sub(1)?;
        let span = self.label_spans[idx];
        if pos < span.start + span.len {
            Some((span.vid, pos - span.start))
        } else {
            None
        }
    }

    /// Serialises the GFMI to the `gini` binary layout: header, permutation
    /// table, `bwt_to_vid` table, the inner FM-index blob, then the IMT's
    /// per-key interval lists.
    pub fn serialise(&self) -> Bitstream {
        let mut bs = Bitstream::new();
        let mut pos = 64; // reserve total-bit-length header

        bs.write(pos, self.config.c0 as u64, 40);
        pos += 40;
        bs.write(pos, self.config.c1 as u64, 40);
        pos += 40;
        bs.write(pos, self.num_vertices as u64, 40);
        pos += 40;

        for &v in &self.permutation {
            bs.write(pos, v as u64, 40);
            pos += 40;
        }
        for &v in &self.bwt_to_vid {
            bs.write(pos, v as u64, 40);
            pos += 40;
        }

        let fmi_bits = self.fmi.serialise();
        bs.write(pos, fmi_bits.len_bits() as u64, 64);
        pos += 64;
        bs.append(&fmi_bits);
        pos += fmi_bits.len_bits();
        pos = pos.div_ceil(64) * 64;

        let leaf_intervals = self.r2r.leaf_intervals();
        let imt_bits_start = pos;
        bs.write(pos, 0, 64); // patched below
        pos += 64;
        for key_intervals in &leaf_intervals {
            bs.write(pos, key_intervals.len() as u64, 32);
            pos += 32;
            for iv in key_intervals {
                bs.write(pos, iv.lo, 40);
                pos += 40;
                bs.write(pos, iv.hi, 40);
                pos += 40;
            }
        }
        bs.write(imt_bits_start, (pos - imt_bits_start - 64) as u64, 64);

        bs.fit(pos.div_ceil(64) * 64);
        bs.write(0, pos as u64, 64);
        bs
    }

    /// Deserialises a GFMI previously written by [`Self::serialise`]. The
    /// oracle R2R is rebuilt from the FM-index rather than persisted, since
    /// it's a pure function of the plain IMT plus the inner FM-index.
    pub fn deserialise(bs: &Bitstream, with_oracle: bool) -> Result<Self> {
        let mut pos = 64usize;
        let c0 = bs.read(pos, 40) as u8;
        pos += 40;
        let c1 = bs.read(pos, 40) as u8;
        pos += 40;
        let num_vertices = bs.read(pos, 40) as usize;
        pos += 40;

        let mut permutation = Vec::with_capacity(num_vertices);
        for _ in 0..num_vertices {
            permutation.push(bs.read(pos, 40) as usize);
            pos += 40;
        }
        let mut bwt_to_vid = Vec::with_capacity(num_vertices);
        for _ in 0..num_vertices {
            bwt_to_vid.push(bs.read(pos, 40) as usize);
            pos += 40;
        }

        let mut inverse_permutation = vec![0usize; num_vertices];
        for (i, &v) in permutation.iter().enumerate() {
            inverse_permutation[v] = i;
        }

        let fmi_bit_length = bs.read(pos, 64) as usize;
        pos += 64;
        let fmi_words: Vec<u8> = (0..fmi_bit_length.div_ceil(64))
            .flat_map(|w| bs.read(pos + w * 64, 64).to_le_bytes())
            .collect();
        let fmi_bs = Bitstream::from_bytes(&fmi_words, fmi_bit_length);
        let fmi = FmIndex::deserialise(&fmi_bs)?;
        pos += fmi_bit_length;
        pos = pos.div_ceil(64) * 64;

        let _imt_bit_length = bs.read(pos, 64);
        pos += 64;
        let mut per_key_intervals = Vec::with_capacity(num_vertices);
        let mut per_key_tagged: Vec<Vec<(IvInterval, u8)>> = Vec::with_capacity(num_vertices);
        for _ in 0..num_vertices {
            let k = bs.read(pos, 32) as usize;
            pos += 32;
            let mut intervals = Vec::with_capacity(k);
            for _ in 0..k {
                let lo = bs.read(pos, 40);
                pos += 40;
                let hi = bs.read(pos, 40);
                pos += 40;
                intervals.push(IvInterval::new(lo, hi));
            }
            if with_oracle {
                let mut tagged = Vec::with_capacity(intervals.len());
                for iv in &intervals {
                    let abs_row = num_vertices as u64 + 1 + iv.lo;
                    tagged.push((*iv, fmi.get(abs_row)));
                }
                per_key_tagged.push(tagged);
            }
            per_key_intervals.push(intervals);
        }

        let r2r = Imt::build(per_key_intervals);
        let oracle_r2r = if with_oracle {
            Some(Oimt::build(per_key_tagged, fmi.alphabet_size()))
        } else {
            None
        };

        // label spans cannot be recovered from the serialised form alone
        // without re-walking the c_0/c_1 buckets; reconstruct them the same
        // way `build` does, from SA positions of the two reserved buckets.
        let mut label_start = vec![0u64; num_vertices];
        let mut label_len = vec![0u64; num_vertices];
        for k in 0..num_vertices {
            let row_c0 = 1 + k as u64;
            let row_c1 = num_vertices as u64 + 1 + k as u64;
            let pos_c0 = fmi.sa_at(row_c0);
            let pos_c1 = fmi.sa_at(row_c1);
            let vid = bwt_to_vid[k];
            label_start[vid] = pos_c0 + 1;
            label_len[vid] = pos_c1 - pos_c0 - 1;
        }
        let mut label_spans: Vec<LabelSpan> = (0..num_vertices)
            .map(|v| LabelSpan {
                vid: v,
                start: label_start[v],
                len: label_len[v],
            })
            .collect();
        label_spans.sort_by_key(|s| s.start);

        Ok(GraphFmIndex {
            config: GfmiConfig {
                c0,
                c1,
                a0: DEFAULT_A0,
                a1: DEFAULT_A1,
                rank_sample_rate: 0,
                isa_sample_rate: 0,
                with_oracle,
            },
            num_vertices,
            permutation,
            inverse_permutation,
            bwt_to_vid,
            fmi,
            r2r,
            oracle_r2r,
            label_spans,
        })
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

    fn test_config() -> GfmiConfig {
        GfmiConfig {
            rank_sample_rate: 2,
            isa_sample_rate: 2,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_bad_permutation_cardinality() {
        let g = linear_dag();
        let err = GraphFmIndex::build(g, Some(vec![0, 1]), test_config());
        assert!(err.is_err());
    }

    #[test]
    fn rejects_non_bijective_permutation() {
        let g = linear_dag();
        let err = GraphFmIndex::build(g, Some(vec![0, 0, 1, 2]), test_config());
        assert!(err.is_err());
    }

    #[test]
    fn rejects_label_containing_a_non_default_reserved_byte() {
        // 'X' is harmless under the default config, but this build chooses
        // 'X' as c_0, so a label containing it must be rejected before
        // linearisation rather than silently breaking the bucket invariant.
        let mut g = Graph::new();
        g.add_vertex(*b"ACXGT").unwrap();
        let config = GfmiConfig {
            c0: b'X',
            c1: b'Y',
            rank_sample_rate: 2,
            isa_sample_rate: 2,
            ..Default::default()
        };
        let err = GraphFmIndex::build(g, None, config);
        assert!(err.is_err());
    }

    #[test]
    fn identity_build_counts_single_vertex_substrings() {
        let g = linear_dag();
        let gfmi = GraphFmIndex::build(g, None, test_config()).unwrap();
        // "ACCG" occurs only within v0's own label
        assert_eq!(gfmi.count(b"ACCG"), 1);
    }

    #[test]
    fn bwt_to_vid_is_a_permutation_of_vertex_ids() {
        let g = linear_dag();
        let gfmi = GraphFmIndex::build(g, None, test_config()).unwrap();
        let mut seen: Vec<usize> = (0..gfmi.num_vertices())
            .map(|k| gfmi.bwt_to_vid(k))
            .collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn r2r_bucket_for_every_vertex_lists_its_in_degree_many_relative_ranks() {
        let g = linear_dag();
        let gfmi = GraphFmIndex::build(g.clone(), None, test_config()).unwrap();
        for k in 0..gfmi.num_vertices() {
            let vid = gfmi.bwt_to_vid(k);
            let expected_in_degree = g.in_neighbours(vid).len();
            let intervals = gfmi.query_r2r(k, k, None);
            let total: u64 = intervals.iter().map(|iv| iv.hi - iv.lo + 1).sum();
            assert_eq!(total as usize, expected_in_degree);
        }
    }

    #[test]
    fn locate_label_recovers_vertex_and_offset() {
        let g = linear_dag();
        let gfmi = GraphFmIndex::build(g, None, test_config()).unwrap();
        let interval = gfmi.fmi.backward_search(b"CCGTA");
        assert_eq!(interval.len(), 1);
        let pos = gfmi.sa(interval)[0];
        let (vid, offset) = gfmi.locate_label(pos).unwrap();
        assert_eq!(vid, 0);
        assert_eq!(offset, 1);
    }

    #[test]
    fn serialise_deserialise_round_trip_preserves_counts() {
        let g = linear_dag();
        let gfmi = GraphFmIndex::build(g, None, test_config()).unwrap();
        let bytes_bs = gfmi.serialise();
        let bytes = bytes_bs.serialise();
        let len_bits = bytes_bs.len_bits();
        let restored =
            GraphFmIndex::deserialise(&Bitstream::from_bytes(&bytes, len_bits), true).unwrap();

        assert_eq!(gfmi.count(b"ACGT"), restored.count(b"ACGT"));
        assert_eq!(gfmi.permutation(), restored.permutation());
        assert_eq!(gfmi.bwt_to_vid.clone(), restored.bwt_to_vid.clone());
    }
}

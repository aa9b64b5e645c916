//! The FM-table cache (C8): precomputed fork lists for every pattern suffix
//! up to a fixed depth, so that a query's tail can be resolved by a single
//! backwards search instead of replaying the forked BFS from scratch.
//!
//! Keys are built breadth-first from length 1 up to `depth`, each extension
//! running exactly one [`crate::matcher::step`] round — the same fork/merge/
//! advance primitive the live matcher uses — starting from the shorter key's
//! fork list. The final keys are concatenated behind `c_0` separators and
//! indexed by their own FM-index, so a lookup is a backwards search followed
//! by a `precedence_range(., c_0)` that anchors the match to a key boundary.

use std::collections::HashMap;

use crate::bitstream::Bitstream;
use crate::error::{GfmiError, Result};
use crate::fmindex::{FmIndex, Interval};
use crate::gfmi::GraphFmIndex;
use crate::matcher::{Fork, ForkKind, step};

#[derive(Debug)]
pub struct Cache {
    depth: usize,
    c0: u8,
    key_fmi: FmIndex,
    offsets: Vec<u64>,
    value_bits: Bitstream,
    n_entries: usize,
}

impl Cache {
    /// Builds a cache of `depth`, using `rank_sample_rate`/`isa_sample_rate`
    /// for the inner key-FMI.
    pub fn build(
        gfmi: &GraphFmIndex,
        depth: usize,
        rank_sample_rate: usize,
        isa_sample_rate: usize,
    ) -> Result<Self> {
        if depth == 0 {
            return Err(GfmiError::malformed("cache depth must be at least 1"));
        }

        let alphabet = gfmi.non_reserved_alphabet();
        let mut entries: Vec<(Vec<u8>, Vec<(u64, u64)>)> = Vec::new();
        let mut frontier: Vec<(Vec<u8>, Vec<(u64, u64)>)> = Vec::new();

        let full = Interval {
            lo: 0,
            hi: gfmi.bwt_length(),
        };
        for &c in &alphabet {
            let iv = gfmi.advance(c, full);
            if !iv.is_empty() {
                let key = vec![c];
                let forks = vec![(iv.lo, iv.hi)];
                entries.push((key.clone(), forks.clone()));
                frontier.push((key, forks));
            }
        }

        for _ in 1..depth {
            let mut next_frontier = Vec::new();
            for (sigma, fork_pairs) in &frontier {
                let active: Vec<Fork> = fork_pairs
                    .iter()
                    .map(|&(lo, hi)| Fork {
                        sa_lo: lo,
                        sa_hi: hi,
                        pos: 0,
                        kind: ForkKind::Cached,
                    })
                    .collect();

                for &c in &alphabet {
                    let (survivors, _dead) = step(gfmi, &active, c, None);
                    if survivors.is_empty() {
                        continue;
                    }
                    let pairs = compact_pairs(survivors.iter().map(|f| (f.sa_lo, f.sa_hi)).collect());

                    let mut sigma_prime = Vec::with_capacity(sigma.len() + 1);
                    sigma_prime.push(c);
                    sigma_prime.extend_from_slice(sigma);

                    entries.push((sigma_prime.clone(), pairs.clone()));
                    next_frontier.push((sigma_prime, pairs));
                }
            }
            frontier = next_frontier;
        }

        let n = entries.len();
        let mut concat = Vec::new();
        let mut position_of_c0 = Vec::with_capacity(n);
        for (key, _) in &entries {
            position_of_c0.push(concat.len() as u64);
            concat.push(gfmi.c0());
            concat.extend_from_slice(key);
        }

        let key_fmi = FmIndex::build(&concat, rank_sample_rate, isa_sample_rate)?;

        let mut c0_pos_to_entry: HashMap<u64, usize> = HashMap::with_capacity(n);
        for (i, &p) in position_of_c0.iter().enumerate() {
            c0_pos_to_entry.insert(p, i);
        }

        let mut bwt_to_entry = vec![0usize; n];
        for r in 0..n {
            let row = 1 + r as u64;
            let text_pos = key_fmi.sa_at(row);
            let e = *c0_pos_to_entry
                .get(&text_pos)
                .ok_or_else(|| GfmiError::logic("cache c_0 bucket row did not land on a key boundary"))?;
            bwt_to_entry[r] = e;
        }

        let mut value_bits = Bitstream::new();
        let mut offsets = vec![0u64; n];
        let mut pos = 0usize;
        for r in 0..n {
            offsets[r] = pos as u64;
            let e = bwt_to_entry[r];
            let forks = &entries[e].1;
            value_bits.write(pos, forks.len() as u64, 64);
            pos += 64;
            for &(lo, hi) in forks {
                value_bits.write(pos, lo, 64);
                pos += 64;
                value_bits.write(pos, hi, 64);
                pos += 64;
            }
        }
        value_bits.fit(pos.div_ceil(64) * 64);
        log::debug!("FM-table cache built: depth={}, n_entries={}", depth, n);

        Ok(Cache {
            depth,
            c0: gfmi.c0(),
            key_fmi,
            offsets,
            value_bits,
            n_entries: n,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn n_entries(&self) -> usize {
        self.n_entries
    }

    /// Looks up the precomputed fork list for suffix `s`. `pos` is the
    /// pattern index the returned forks should carry (the next character
    /// still to be matched by the live matcher); forks are tagged `Leaf`
    /// when `pos < 0` and `Main` otherwise, per §4.5's initial-state rule.
    pub fn lookup(&self, s: &[u8], pos: i64, max_forks: Option<usize>) -> Vec<Fork> {
        let raw = self.key_fmi.backward_search(s);
        if raw.is_empty() {
            return Vec::new();
        }
        let Some(c0_enc) = self.key_fmi.encode(self.c0) else {
            return Vec::new();
        };
        let anchored = self.key_fmi.lf_step(c0_enc, raw);
        if anchored.is_empty() || anchored.lo == 0 || anchored.lo > self.n_entries as u64 {
            return Vec::new();
        }

        let rank = (anchored.lo - 1) as usize;
        let mut read_pos = self.offsets[rank] as usize;
        let k = self.value_bits.read(read_pos, 64) as usize;
        read_pos += 64;

        let take = max_forks.unwrap_or(k).min(k);
        let kind = if pos < 0 { ForkKind::Leaf } else { ForkKind::Main };
        let mut out = Vec::with_capacity(take);
        for i in 0..k {
            let lo = self.value_bits.read(read_pos, 64);
            read_pos += 64;
            let hi = self.value_bits.read(read_pos, 64);
            read_pos += 64;
            if i < take {
                out.push(Fork {
                    sa_lo: lo,
                    sa_hi: hi,
                    pos,
                    kind,
                });
            }
        }
        out
    }

    /// Approximates the size-budget formula of §4.6: header fields, the
    /// offset table, the key-FMI blob and the value buffer.
    pub fn size_bits(&self) -> u64 {
        256 + self.key_fmi.serialise().len_bits() as u64
            + self.value_bits.len_bits() as u64
            + 64 * self.n_entries as u64
    }

    /// Serialises to the `ginc` binary layout: depth, entry count, the two
    /// blob bit-lengths, the offset table, then the key-FMI and value blobs.
    pub fn serialise(&self) -> Bitstream {
        let mut bs = Bitstream::new();
        let mut pos = 0;

        bs.write(pos, self.depth as u64, 64);
        pos += 64;
        bs.write(pos, self.n_entries as u64, 64);
        pos += 64;

        let key_fmi_bits = self.key_fmi.serialise();
        bs.write(pos, key_fmi_bits.len_bits() as u64, 64);
        pos += 64;
        bs.write(pos, self.value_bits.len_bits() as u64, 64);
        pos += 64;

        for &off in &self.offsets {
            bs.write(pos, off, 64);
            pos += 64;
        }

        bs.append(&key_fmi_bits);
        pos += key_fmi_bits.len_bits();
        bs.append(&self.value_bits);
        pos += self.value_bits.len_bits();

        bs.fit(pos.div_ceil(64) * 64);
        bs
    }

    pub fn deserialise(bs: &Bitstream, c0: u8) -> Result<Self> {
        let mut pos = 0usize;
        let depth = bs.read(pos, 64) as usize;
        pos += 64;
        let n_entries = bs.read(pos, 64) as usize;
        pos += 64;
        let key_fmi_bits = bs.read(pos, 64) as usize;
        pos += 64;
        let value_bits_len = bs.read(pos, 64) as usize;
        pos += 64;

        let mut offsets = Vec::with_capacity(n_entries);
        for _ in 0..n_entries {
            offsets.push(bs.read(pos, 64));
            pos += 64;
        }

        let fmi_bytes: Vec<u8> = (0..key_fmi_bits.div_ceil(64))
            .flat_map(|w| bs.read(pos + w * 64, 64).to_le_bytes())
            .collect();
        let key_fmi = FmIndex::deserialise(&Bitstream::from_bytes(&fmi_bytes, key_fmi_bits))?;
        pos += key_fmi_bits;

        let value_bytes: Vec<u8> = (0..value_bits_len.div_ceil(64))
            .flat_map(|w| bs.read(pos + w * 64, 64).to_le_bytes())
            .collect();
        let value_bits = Bitstream::from_bytes(&value_bytes, value_bits_len);

        Ok(Cache {
            depth,
            c0,
            key_fmi,
            offsets,
            value_bits,
            n_entries,
        })
    }
}

/// Sorts by low endpoint and merges any two half-open intervals `[a,b)`,
/// `[c,d)` with `c <= b` into `[a, max(b,d))`.
fn compact_pairs(mut pairs: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    pairs.sort_by_key(|&(lo, _)| lo);
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(pairs.len());
    for (lo, hi) in pairs {
        match merged.last_mut() {
            Some(last) if last.1 >= lo => {
                last.1 = last.1.max(hi);
            }
            _ => merged.push((lo, hi)),
        }
    }
    merged
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
    fn cache_entries_cover_every_non_reserved_character_at_depth_one() {
        let gfmi = scenario_a();
        let cache = Cache::build(&gfmi, 3, 2, 2).unwrap();
        assert!(cache.n_entries() >= gfmi.non_reserved_alphabet().len());
    }

    #[test]
    fn cached_and_cacheless_search_agree_on_occurrence_count() {
        let gfmi = scenario_a();
        let cache = Cache::build(&gfmi, 3, 2, 2).unwrap();

        for pattern in [b"TAC".as_slice(), b"CGTTA", b"GTTATACCGTTA"] {
            let without = search(&gfmi, pattern, None, None);
            let with = search(&gfmi, pattern, None, Some(&cache));
            assert_eq!(
                without.total_occurrences(),
                with.total_occurrences(),
                "pattern {:?}",
                String::from_utf8_lossy(pattern)
            );
        }
    }

    #[test]
    fn serialise_deserialise_round_trip_preserves_lookup() {
        let gfmi = scenario_a();
        let cache = Cache::build(&gfmi, 2, 2, 2).unwrap();
        let bytes_bs = cache.serialise();
        let bytes = bytes_bs.serialise();
        let len_bits = bytes_bs.len_bits();
        let restored = Cache::deserialise(&Bitstream::from_bytes(&bytes, len_bits), gfmi.c0()).unwrap();

        let alphabet = gfmi.non_reserved_alphabet();
        let c = alphabet[0];
        assert_eq!(
            cache.lookup(&[c], -1, None).len(),
            restored.lookup(&[c], -1, None).len()
        );
    }
}

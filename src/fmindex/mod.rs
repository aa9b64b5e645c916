//! FM-index over a packed Burrows-Wheeler transform with a block rank cache
//! and sparse ISA samples.
//!
//! This is the workhorse data structure shared by the graph FM-index ([`crate::gfmi`])
//! and the FM-table cache ([`crate::cache`]): both are plain FM-indices over
//! different texts (the graph linearisation, and the concatenated cache
//! keys respectively).

use crate::bitstream::{Bitstream, bits_for_range};
use crate::containers::construct_suffix_array;
use crate::error::{GfmiError, Result};

/// A half-open interval `[lo, hi)` into the suffix array / BWT rows of an
/// [`FmIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub lo: u64,
    pub hi: u64,
}

impl Interval {
    pub fn empty() -> Self {
        Interval { lo: 0, hi: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }

    pub fn len(&self) -> u64 {
        self.hi.saturating_sub(self.lo)
    }
}

#[derive(Debug, Clone)]
pub struct FmIndex {
    no_chars: u64,
    rank_sample_rate: usize,
    isa_sample_rate: usize,

    // alphabet: dense encoding 0..alphabet_size, encoding 0 reserved for the
    // text terminator that is implicitly appended before SA construction.
    alphabet: Vec<u8>,
    encoding_of: [u8; 256],
    bwt_char_width: usize,

    c_table: Vec<u64>,

    bwt_bits: Bitstream,
    block_rank_cache: Vec<u64>, // [block][symbol], cumulative count strictly before block start

    isa_samples: Vec<u64>,
    occ_bits: Bitstream,
    occ_popcount_prefix: Vec<u64>, // prefix popcount, one entry per 64-bit word, plus trailing total
}

impl FmIndex {
    /// Builds an FM-index over `text · \0`.
    ///
    /// `rank_sample_rate` controls the block size of the rank cache;
    /// `isa_sample_rate` controls the density of the sparse suffix array
    /// samples used to recover text positions during `locate`/`sa`.
    pub fn build(text: &[u8], rank_sample_rate: usize, isa_sample_rate: usize) -> Result<Self> {
        if rank_sample_rate == 0 || isa_sample_rate == 0 {
            return Err(GfmiError::malformed(
                "rank_sample_rate and isa_sample_rate must be positive",
            ));
        }

        let mut present = [false; 256];
        present[0] = true; // terminator
        for &b in text {
            present[b as usize] = true;
        }
        let alphabet: Vec<u8> = (0u16..256)
            .filter(|&b| present[b as usize])
            .map(|b| b as u8)
            .collect();

        let mut encoding_of = [255u8; 256];
        for (enc, &byte) in alphabet.iter().enumerate() {
            encoding_of[byte as usize] = enc as u8;
        }
        let alphabet_size = alphabet.len();
        let bwt_char_width = bits_for_range(alphabet_size).max(1);

        let sa = construct_suffix_array(text);
        let no_chars = sa.len() as u64;

        // BWT and frequency table (encoding -> occurrence count)
        let mut bwt = vec![0u8; sa.len()];
        let mut freq = vec![0u64; alphabet_size];
        for (i, &sa_val) in sa.iter().enumerate() {
            let sa_val = sa_val as usize;
            let preceding_byte = if sa_val == 0 { 0 } else { text[sa_val - 1] };
            let enc = encoding_of[preceding_byte as usize];
            bwt[i] = enc;
            freq[enc as usize] += 1;
        }

        let mut c_table = vec![0u64; alphabet_size + 1];
        for e in 0..alphabet_size {
            c_table[e + 1] = c_table[e] + freq[e];
        }

        // pack bwt characters
        let mut bwt_bits = Bitstream::with_bit_capacity(bwt.len() * bwt_char_width);
        for (i, &enc) in bwt.iter().enumerate() {
            bwt_bits.write(i * bwt_char_width, enc as u64, bwt_char_width);
        }
        bwt_bits.fit(bwt.len() * bwt_char_width);

        // block rank cache: cumulative counts strictly before each block start
        let n_blocks = bwt.len().div_ceil(rank_sample_rate);
        let mut block_rank_cache = vec![0u64; n_blocks * alphabet_size];
        let mut running = vec![0u64; alphabet_size];
        for block in 0..n_blocks {
            block_rank_cache[block * alphabet_size..(block + 1) * alphabet_size]
                .copy_from_slice(&running);
            let start = block * rank_sample_rate;
            let end = (start + rank_sample_rate).min(bwt.len());
            for &enc in &bwt[start..end] {
                running[enc as usize] += 1;
            }
        }

        // ISA samples + occupancy bitvector
        let mut occ_bits = Bitstream::with_bit_capacity(sa.len());
        let mut isa_samples = Vec::new();
        for (i, &sa_val) in sa.iter().enumerate() {
            if (sa_val as u64) % (isa_sample_rate as u64) == 0 {
                occ_bits.write(i, 1, 1);
                isa_samples.push(sa_val as u64);
            }
        }
        occ_bits.fit(sa.len());

        let n_words = sa.len().div_ceil(64);
        let mut occ_popcount_prefix = vec![0u64; n_words + 1];
        for w in 0..n_words {
            let width = (sa.len() - w * 64).min(64);
            let word_value = occ_bits.read(w * 64, width);
            occ_popcount_prefix[w + 1] = occ_popcount_prefix[w] + word_value.count_ones() as u64;
        }

        Ok(FmIndex {
            no_chars,
            rank_sample_rate,
            isa_sample_rate,
            alphabet,
            encoding_of,
            bwt_char_width,
            c_table,
            bwt_bits,
            block_rank_cache,
            isa_samples,
            occ_bits,
            occ_popcount_prefix,
        })
    }

    pub fn bwt_length(&self) -> u64 {
        self.no_chars
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet.len()
    }

    /// The distinct raw byte values indexed, in dense-encoding order (so
    /// `alphabet()[e]` decodes encoding `e`).
    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    /// Translate an input byte to its dense encoding, if present in the
    /// indexed alphabet.
    pub fn encode(&self, byte: u8) -> Option<u8> {
        let e = self.encoding_of[byte as usize];
        if e == 255 { None } else { Some(e) }
    }

    /// Returns the encoded BWT character at `pos`.
    pub fn get(&self, pos: u64) -> u8 {
        self.bwt_bits
            .read(pos as usize * self.bwt_char_width, self.bwt_char_width) as u8
    }

    /// Occurrences of `symbol` (dense encoding) in `bwt[0..=pos]`, inclusive.
    pub fn rank(&self, symbol: u8, pos: u64) -> u64 {
        let alphabet_size = self.alphabet.len();
        let block = pos as usize / self.rank_sample_rate;
        let cached = self.block_rank_cache[block * alphabet_size + symbol as usize];

        let block_start = block * self.rank_sample_rate;
        let scan_len = (pos as usize - block_start) + 1;

        let mut count = 0u64;
        for i in 0..scan_len {
            if self.get((block_start + i) as u64) == symbol {
                count += 1;
            }
        }

        cached + count
    }

    /// The LF-mapping step: for encoded character `e`, compute the new
    /// interval obtained by prepending `e` to the suffix represented by
    /// `interval`.
    pub fn lf_step(&self, symbol: u8, interval: Interval) -> Interval {
        if interval.is_empty() {
            return Interval::empty();
        }

        let base = self.c_table[symbol as usize];
        let rank_lo = if interval.lo > 0 {
            self.rank(symbol, interval.lo - 1)
        } else {
            0
        };
        let rank_hi = if interval.hi > 0 {
            self.rank(symbol, interval.hi - 1)
        } else {
            0
        };

        Interval {
            lo: base + rank_lo,
            hi: base + rank_hi,
        }
    }

    /// Backwards search for `pattern`, scanning right to left as is standard
    /// for FM-index backward search.
    pub fn backward_search(&self, pattern: &[u8]) -> Interval {
        let mut interval = Interval {
            lo: 0,
            hi: self.no_chars,
        };

        for &byte in pattern.iter().rev() {
            let Some(symbol) = self.encode(byte) else {
                return Interval::empty();
            };
            interval = self.lf_step(symbol, interval);
            if interval.is_empty() {
                return Interval::empty();
            }
        }

        interval
    }

    pub fn count(&self, pattern: &[u8]) -> u64 {
        self.backward_search(pattern).len()
    }

    /// Recovers the text position (`SA(i)`) for a single BWT row.
    pub fn sa_at(&self, mut i: u64) -> u64 {
        let mut steps = 0u64;

        while !self.occ_bit(i) {
            let symbol = self.get(i);
            i = self.lf_step(symbol, Interval { lo: i, hi: i + 1 }).lo;
            steps += 1;
        }

        let sample_index = self.occ_rank(i);
        self.isa_samples[sample_index as usize] + steps
    }

    /// Recovers every text position covered by `interval`.
    pub fn sa(&self, interval: Interval) -> Vec<u64> {
        (interval.lo..interval.hi).map(|i| self.sa_at(i)).collect()
    }

    fn occ_bit(&self, i: u64) -> bool {
        self.occ_bits.read(i as usize, 1) == 1
    }

    /// Number of set occupancy bits in `occ_bits[0..=i]`, used to find the
    /// position of `i`'s sample in `isa_samples`.
    fn occ_rank(&self, i: u64) -> u64 {
        let word = i as usize / 64;
        let prefix = self.occ_popcount_prefix[word];
        let within_word_bits = (i as usize % 64) + 1;
        let word_value = self.occ_bits.read(word * 64, 64);
        // only count bits [0, within_word_bits) of this word
        let mask = if within_word_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << within_word_bits) - 1
        };
        prefix + (word_value & mask).count_ones() as u64 - 1
    }

    /// Serialises the index to the binary layout described for the inner
    /// FM-index format: header, alphabet table, ISA sample block, then the
    /// chained rank-cache/BWT blocks.
    pub fn serialise(&self) -> Bitstream {
        let mut bs = Bitstream::new();
        let mut pos = 64; // reserve room for the total-bit-length header, patched at the end

        bs.write(pos, self.no_chars, 40);
        pos += 40;
        bs.write(pos, self.rank_sample_rate as u64, 40);
        pos += 40;
        bs.write(pos, self.isa_sample_rate as u64, 64);
        pos += 64;
        bs.write(pos, self.alphabet.len() as u64, 40);
        pos += 40;

        for (enc, &byte) in self.alphabet.iter().enumerate() {
            bs.write(pos, byte as u64, 40);
            pos += 40;
            bs.write(pos, enc as u64, 40);
            pos += 40;
        }

        // ISA sample block: packed SA values, then the occupancy bitvector
        bs.write(pos, self.isa_samples.len() as u64, 64);
        pos += 64;
        for &s in &self.isa_samples {
            bs.write(pos, s, 64);
            pos += 64;
        }
        for i in 0..self.no_chars {
            bs.write(pos, self.occ_bits.read(i as usize, 1), 1);
            pos += 1;
        }
        pos = pos.div_ceil(64) * 64; // word-align

        // rank-cache / BWT block chain
        let n_blocks = (self.no_chars as usize).div_ceil(self.rank_sample_rate);
        for block in 0..n_blocks {
            for e in 0..self.alphabet.len() {
                bs.write(pos, self.block_rank_cache[block * self.alphabet.len() + e], 40);
                pos += 40;
            }
            let start = block * self.rank_sample_rate;
            let end = (start + self.rank_sample_rate).min(self.no_chars as usize);
            for i in start..end {
                bs.write(pos, self.get(i as u64) as u64, self.bwt_char_width);
                pos += self.bwt_char_width;
            }
            // pad unused slots of the last, partially filled block
            for _ in end..start + self.rank_sample_rate {
                pos += self.bwt_char_width;
            }
        }

        bs.fit(pos.div_ceil(64) * 64);
        bs.write(0, pos as u64, 64);
        bs
    }

    pub fn deserialise(bs: &Bitstream) -> Result<Self> {
        let mut pos = 64usize;
        let no_chars = bs.read(pos, 40);
        pos += 40;
        let rank_sample_rate = bs.read(pos, 40) as usize;
        pos += 40;
        let isa_sample_rate = bs.read(pos, 64) as usize;
        pos += 64;
        let alphabet_size = bs.read(pos, 40) as usize;
        pos += 40;

        let mut alphabet = vec![0u8; alphabet_size];
        let mut encoding_of = [255u8; 256];
        for slot in alphabet.iter_mut() {
            let byte = bs.read(pos, 40) as u8;
            pos += 40;
            let enc = bs.read(pos, 40) as u8;
            pos += 40;
            *slot = byte;
            encoding_of[byte as usize] = enc;
        }
        let bwt_char_width = bits_for_range(alphabet_size).max(1);

        let n_samples = bs.read(pos, 64) as usize;
        pos += 64;
        let mut isa_samples = Vec::with_capacity(n_samples);
        for _ in 0..n_samples {
            isa_samples.push(bs.read(pos, 64));
            pos += 64;
        }

        let mut occ_bits = Bitstream::with_bit_capacity(no_chars as usize);
        for i in 0..no_chars as usize {
            occ_bits.write(i, bs.read(pos, 1), 1);
            pos += 1;
        }
        occ_bits.fit(no_chars as usize);
        pos = pos.div_ceil(64) * 64;

        let n_words = (no_chars as usize).div_ceil(64);
        let mut occ_popcount_prefix = vec![0u64; n_words + 1];
        for w in 0..n_words {
            let width = (no_chars as usize - w * 64).min(64);
            let word_value = occ_bits.read(w * 64, width);
            occ_popcount_prefix[w + 1] = occ_popcount_prefix[w] + word_value.count_ones() as u64;
        }

        let n_blocks = (no_chars as usize).div_ceil(rank_sample_rate);
        let mut block_rank_cache = vec![0u64; n_blocks * alphabet_size];
        let mut bwt_bits = Bitstream::with_bit_capacity(no_chars as usize * bwt_char_width);

        for block in 0..n_blocks {
            for e in 0..alphabet_size {
                block_rank_cache[block * alphabet_size + e] = bs.read(pos, 40);
                pos += 40;
            }
            let start = block * rank_sample_rate;
            let end = (start + rank_sample_rate).min(no_chars as usize);
            for i in start..end {
                let enc = bs.read(pos, bwt_char_width);
                pos += bwt_char_width;
                bwt_bits.write(i * bwt_char_width, enc, bwt_char_width);
            }
            for _ in end..start + rank_sample_rate {
                pos += bwt_char_width;
            }
        }
        bwt_bits.fit(no_chars as usize * bwt_char_width);

        // Reconstruct the C-table from the final block's cache (the running
        // count strictly before that block starts) plus a scan of just that
        // block's tail, rather than rescanning the whole packed BWT.
        let last_block = n_blocks - 1;
        let tail_start = last_block * rank_sample_rate;
        let mut freq = vec![0u64; alphabet_size];
        for i in tail_start..no_chars as usize {
            let enc = bwt_bits.read(i * bwt_char_width, bwt_char_width) as usize;
            freq[enc] += 1;
        }
        let mut c_table = vec![0u64; alphabet_size + 1];
        for e in 0..alphabet_size {
            let total = block_rank_cache[last_block * alphabet_size + e] + freq[e];
            c_table[e + 1] = c_table[e] + total;
        }

        Ok(FmIndex {
            no_chars,
            rank_sample_rate,
            isa_sample_rate,
            alphabet,
            encoding_of,
            bwt_char_width,
            c_table,
            bwt_bits,
            block_rank_cache,
            isa_samples,
            occ_bits,
            occ_popcount_prefix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground_truth_sa(text: &[u8]) -> Vec<u64> {
        let mut terminated: Vec<u8> = text.to_vec();
        terminated.push(0);
        let mut indices: Vec<u64> = (0..terminated.len() as u64).collect();
        indices.sort_by(|&a, &b| terminated[a as usize..].cmp(&terminated[b as usize..]));
        indices
    }

    #[test]
    fn count_matches_naive_substring_count() {
        let text = b"banana";
        let fmi = FmIndex::build(text, 2, 2).unwrap();
        assert_eq!(fmi.count(b"ana"), 2);
        assert_eq!(fmi.count(b"na"), 2);
        assert_eq!(fmi.count(b"xyz"), 0);
    }

    #[test]
    fn sa_round_trip_against_naive_construction() {
        let text = b"mississippi";
        let expected = ground_truth_sa(text);
        for rank_rate in [1usize, 3, 7] {
            for isa_rate in [1usize, 2, 5] {
                let fmi = FmIndex::build(text, rank_rate, isa_rate).unwrap();
                let full = fmi.sa(Interval {
                    lo: 0,
                    hi: fmi.bwt_length(),
                });
                assert_eq!(full, expected, "rank_rate={rank_rate} isa_rate={isa_rate}");
            }
        }
    }

    #[test]
    fn locate_positions_are_consistent_with_count() {
        let text = b"abracadabra";
        let fmi = FmIndex::build(text, 4, 3).unwrap();
        let interval = fmi.backward_search(b"abra");
        assert_eq!(interval.len(), 2);
        let mut positions = fmi.sa(interval);
        positions.sort();
        assert_eq!(positions, vec![0, 7]);
    }

    #[test]
    fn serialise_deserialise_round_trip() {
        let text = b"the quick brown fox jumps over the lazy dog";
        let fmi = FmIndex::build(text, 4, 4).unwrap();
        let bytes = fmi.serialise().serialise();
        let len_bits = fmi.serialise().len_bits();
        let restored = FmIndex::deserialise(&Bitstream::from_bytes(&bytes, len_bits)).unwrap();

        assert_eq!(fmi.count(b"the"), restored.count(b"the"));
        assert_eq!(fmi.count(b"fox"), restored.count(b"fox"));

        let interval = fmi.backward_search(b"o");
        let restored_interval = restored.backward_search(b"o");
        assert_eq!(fmi.sa(interval), restored.sa(restored_interval));
    }
}

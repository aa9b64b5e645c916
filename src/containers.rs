//! Thin wrappers around container primitives used throughout the index.
//!
//! The source toolkit this crate is modelled on carries its own dynamic
//! string, sortable vector, hash table, red-black map and min-heap types,
//! each parameterised by a function-pointer struct for comparison/hashing/
//! free/copy. In idiomatic Rust those are simply `Vec`, `HashMap`,
//! `BTreeMap` and `BinaryHeap<Reverse<_>>` with ordinary trait bounds, so
//! this module only adds the one primitive the standard library doesn't
//! supply directly: a parallel suffix array construction wrapper.

use libsais::ThreadCount;

/// Builds the suffix array of `text · \0` using `libsais`, run multi-threaded
/// across however many threads `rayon` reports for the current pool.
///
/// The returned array has length `text.len() + 1` and indexes into
/// `text · \0`, i.e. `sa[0]` is always the position of the appended
/// terminator.
pub fn construct_suffix_array(text: &[u8]) -> Vec<i64> {
    let mut terminated = Vec::with_capacity(text.len() + 1);
    terminated.extend_from_slice(text);
    terminated.push(0);

    let mut sa = vec![0i64; terminated.len()];

    libsais::SuffixArrayConstruction::for_text(&terminated)
        .in_borrowed_buffer(&mut sa)
        .multi_threaded(ThreadCount::fixed(
            rayon::current_num_threads()
                .try_into()
                .expect("number of threads should fit into u16"),
        ))
        .run()
        .expect("libsais suffix array construction");

    sa
}

/// Falls back to a naive O(n^2 log n) construction for tiny inputs or to
/// cross-check `libsais` in tests; never used on the main build path.
#[cfg(test)]
pub(crate) fn construct_suffix_array_naive(text: &[u8]) -> Vec<i64> {
    let mut terminated = Vec::with_capacity(text.len() + 1);
    terminated.extend_from_slice(text);
    terminated.push(0);

    let mut indices: Vec<i64> = (0..terminated.len() as i64).collect();
    indices.sort_by(|&a, &b| terminated[a as usize..].cmp(&terminated[b as usize..]));
    indices
}

//! The range-to-range (R2R) translation structure.
//!
//! An interval-merge tree (IMT) is a segment tree over keys `0..no_keys`,
//! where each key owns a (possibly empty) list of integer intervals. Every
//! internal node caches the pre-merged union of all intervals belonging to
//! keys in its subtree, so a range query over `[a, b]` only needs to gather
//! and k-way merge the O(log no_keys) node lists that exactly cover the
//! range.
//!
//! The oracle variant (OIMT) additionally partitions each node's interval
//! list by the dense encoding of the character immediately preceding the
//! corresponding incoming position, so a query that already knows the next
//! pattern character can skip unioning incompatible intervals.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// An inclusive integer interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IvInterval {
    pub lo: u64,
    pub hi: u64,
}

impl IvInterval {
    pub fn new(lo: u64, hi: u64) -> Self {
        Self { lo, hi }
    }
}

/// Sorts by low endpoint, then merges any two intervals `[a,b]`, `[c,d]`
/// with `b + 1 >= c` into `[a, max(b,d)]`.
pub fn compact(mut intervals: Vec<IvInterval>) -> Vec<IvInterval> {
    intervals.sort_by_key(|iv| iv.lo);

    let mut merged: Vec<IvInterval> = Vec::with_capacity(intervals.len());
    for next in intervals {
        match merged.last_mut() {
            Some(last) if last.hi + 1 >= next.lo => {
                last.hi = last.hi.max(next.hi);
            }
            _ => merged.push(next),
        }
    }
    merged
}

/// k-way merges already-sorted-by-`lo` interval lists (each individually
/// already compacted), preserving the adjacency-merge invariant across list
/// boundaries, stopping early once `max_intervals` results have been
/// emitted (`None` means unbounded).
fn multiway_merge(lists: Vec<Vec<IvInterval>>, max_intervals: Option<usize>) -> Vec<IvInterval> {
    #[derive(Eq, PartialEq)]
    struct HeapEntry {
        lo: u64,
        list_idx: usize,
        elem_idx: usize,
    }
    impl Ord for HeapEntry {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.lo.cmp(&other.lo)
        }
    }
    impl PartialOrd for HeapEntry {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut heap = BinaryHeap::new();
    for (list_idx, list) in lists.iter().enumerate() {
        if !list.is_empty() {
            heap.push(Reverse(HeapEntry {
                lo: list[0].lo,
                list_idx,
                elem_idx: 0,
            }));
        }
    }

    let mut out: Vec<IvInterval> = Vec::new();
    while let Some(Reverse(entry)) = heap.pop() {
        if let Some(limit) = max_intervals {
            if out.len() >= limit {
                break;
            }
        }

        let iv = lists[entry.list_idx][entry.elem_idx];
        match out.last_mut() {
            Some(last) if last.hi + 1 >= iv.lo => {
                last.hi = last.hi.max(iv.hi);
            }
            _ => out.push(iv),
        }

        let next_elem_idx = entry.elem_idx + 1;
        if next_elem_idx < lists[entry.list_idx].len() {
            heap.push(Reverse(HeapEntry {
                lo: lists[entry.list_idx][next_elem_idx].lo,
                list_idx: entry.list_idx,
                elem_idx: next_elem_idx,
            }));
        }
    }

    out
}

#[derive(Debug)]
struct ImtNode {
    lo: usize,
    hi: usize,
    left: Option<usize>,
    right: Option<usize>,
    intervals: Vec<IvInterval>,
}

/// A segment tree over `0..no_keys`, each node storing the pre-merged
/// interval list of its subtree.
#[derive(Debug)]
pub struct Imt {
    nodes: Vec<ImtNode>,
    root: usize,
    no_keys: usize,
}

impl Imt {
    /// Builds the tree from one (possibly empty) interval list per key.
    pub fn build(per_key_intervals: Vec<Vec<IvInterval>>) -> Self {
        let no_keys = per_key_intervals.len();
        let mut nodes = Vec::new();
        let root = if no_keys == 0 {
            nodes.push(ImtNode {
                lo: 0,
                hi: 0,
                left: None,
                right: None,
                intervals: Vec::new(),
            });
            0
        } else {
            Self::build_helper(0, no_keys - 1, &per_key_intervals, &mut nodes)
        };

        Imt {
            nodes,
            root,
            no_keys,
        }
    }

    fn build_helper(
        lo: usize,
        hi: usize,
        per_key_intervals: &[Vec<IvInterval>],
        nodes: &mut Vec<ImtNode>,
    ) -> usize {
        if lo == hi {
            let idx = nodes.len();
            nodes.push(ImtNode {
                lo,
                hi,
                left: None,
                right: None,
                intervals: compact(per_key_intervals[lo].clone()),
            });
            return idx;
        }

        let split = (lo + hi) / 2;
        let left = Self::build_helper(lo, split, per_key_intervals, nodes);
        let right = Self::build_helper(split + 1, hi, per_key_intervals, nodes);

        let merged = multiway_merge(
            vec![nodes[left].intervals.clone(), nodes[right].intervals.clone()],
            None,
        );

        let idx = nodes.len();
        nodes.push(ImtNode {
            lo,
            hi,
            left: Some(left),
            right: Some(right),
            intervals: merged,
        });
        idx
    }

    pub fn no_keys(&self) -> usize {
        self.no_keys
    }

    /// Union-merges the interval lists of all keys in `[a, b]`, capped at
    /// `max_intervals` intervals (`None` = unbounded).
    pub fn query(&self, a: usize, b: usize, max_intervals: Option<usize>) -> Vec<IvInterval> {
        if self.no_keys == 0 || a > b {
            return Vec::new();
        }
        let mut gathered = Vec::new();
        let mut count = 0usize;
        self.query_helper(self.root, a, b, max_intervals, &mut count, &mut gathered);
        multiway_merge(gathered, max_intervals)
    }

    fn query_helper(
        &self,
        node_idx: usize,
        lo: usize,
        hi: usize,
        max_intervals: Option<usize>,
        count: &mut usize,
        gathered: &mut Vec<Vec<IvInterval>>,
    ) {
        if let Some(limit) = max_intervals {
            if *count >= limit {
                return;
            }
        }

        let node = &self.nodes[node_idx];
        if lo == node.lo && hi == node.hi {
            *count += node.intervals.len();
            gathered.push(node.intervals.clone());
            return;
        }

        let split = (node.lo + node.hi) / 2;
        if hi <= split {
            self.query_helper(node.left.unwrap(), lo, hi, max_intervals, count, gathered);
        } else if lo > split {
            self.query_helper(node.right.unwrap(), lo, hi, max_intervals, count, gathered);
        } else {
            self.query_helper(node.left.unwrap(), lo, split, max_intervals, count, gathered);
            self.query_helper(node.right.unwrap(), split + 1, hi, max_intervals, count, gathered);
        }
    }

    /// Every key's compacted interval list, in key order — used for
    /// serialisation.
    pub fn leaf_intervals(&self) -> Vec<Vec<IvInterval>> {
        (0..self.no_keys)
            .map(|key| {
                self.nodes
                    .iter()
                    .find(|n| n.lo == key && n.hi == key)
                    .map(|n| n.intervals.clone())
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[derive(Debug)]
struct OimtNode {
    lo: usize,
    hi: usize,
    left: Option<usize>,
    right: Option<usize>,
    /// Per-dense-encoding pre-merged interval lists.
    buckets: Vec<Vec<IvInterval>>,
}

/// The oracle variant: each leaf's interval carries the dense encoding of
/// the BWT character preceding its incoming position, and each node
/// maintains one pre-merged list per encoding.
#[derive(Debug)]
pub struct Oimt {
    nodes: Vec<OimtNode>,
    root: usize,
    no_keys: usize,
    alphabet_size: usize,
}

impl Oimt {
    /// Builds the tree from one `(interval, last_char_encoding)` list per
    /// key.
    pub fn build(
        per_key_tagged_intervals: Vec<Vec<(IvInterval, u8)>>,
        alphabet_size: usize,
    ) -> Self {
        let no_keys = per_key_tagged_intervals.len();
        let mut nodes = Vec::new();
        let root = if no_keys == 0 {
            nodes.push(OimtNode {
                lo: 0,
                hi: 0,
                left: None,
                right: None,
                buckets: vec![Vec::new(); alphabet_size],
            });
            0
        } else {
            Self::build_helper(0, no_keys - 1, &per_key_tagged_intervals, alphabet_size, &mut nodes)
        };

        Oimt {
            nodes,
            root,
            no_keys,
            alphabet_size,
        }
    }

    fn build_helper(
        lo: usize,
        hi: usize,
        per_key: &[Vec<(IvInterval, u8)>],
        alphabet_size: usize,
        nodes: &mut Vec<OimtNode>,
    ) -> usize {
        if lo == hi {
            let mut per_char: Vec<Vec<IvInterval>> = vec![Vec::new(); alphabet_size];
            for &(iv, c) in &per_key[lo] {
                per_char[c as usize].push(iv);
            }
            for bucket in per_char.iter_mut() {
                *bucket = compact(std::mem::take(bucket));
            }

            let idx = nodes.len();
            nodes.push(OimtNode {
                lo,
                hi,
                left: None,
                right: None,
                buckets: per_char,
            });
            return idx;
        }

        let split = (lo + hi) / 2;
        let left = Self::build_helper(lo, split, per_key, alphabet_size, nodes);
        let right = Self::build_helper(split + 1, hi, per_key, alphabet_size, nodes);

        let mut merged = Vec::with_capacity(alphabet_size);
        for c in 0..alphabet_size {
            merged.push(multiway_merge(
                vec![
                    nodes[left].buckets[c].clone(),
                    nodes[right].buckets[c].clone(),
                ],
                None,
            ));
        }

        let idx = nodes.len();
        nodes.push(OimtNode {
            lo,
            hi,
            left: Some(left),
            right: Some(right),
            buckets: merged,
        });
        idx
    }

    /// Union-merges only the bucket for encoding `c` among keys in `[a, b]`.
    pub fn query(&self, a: usize, b: usize, c: u8, max_intervals: Option<usize>) -> Vec<IvInterval> {
        if self.no_keys == 0 || a > b {
            return Vec::new();
        }
        let mut gathered = Vec::new();
        let mut count = 0usize;
        self.query_helper(self.root, a, b, c, max_intervals, &mut count, &mut gathered);
        multiway_merge(gathered, max_intervals)
    }

    fn query_helper(
        &self,
        node_idx: usize,
        lo: usize,
        hi: usize,
        c: u8,
        max_intervals: Option<usize>,
        count: &mut usize,
        gathered: &mut Vec<Vec<IvInterval>>,
    ) {
        if let Some(limit) = max_intervals {
            if *count >= limit {
                return;
            }
        }

        let node = &self.nodes[node_idx];
        if lo == node.lo && hi == node.hi {
            *count += node.buckets[c as usize].len();
            gathered.push(node.buckets[c as usize].clone());
            return;
        }

        let split = (node.lo + node.hi) / 2;
        if hi <= split {
            self.query_helper(node.left.unwrap(), lo, hi, c, max_intervals, count, gathered);
        } else if lo > split {
            self.query_helper(node.right.unwrap(), lo, hi, c, max_intervals, count, gathered);
        } else {
            self.query_helper(node.left.unwrap(), lo, split, c, max_intervals, count, gathered);
            self.query_helper(
                node.right.unwrap(),
                split + 1,
                hi,
                c,
                max_intervals,
                count,
                gathered,
            );
        }
    }

    /// The union over all character buckets of a leaf equals the plain
    /// IMT's interval list for that key — used to check the OIMT invariant.
    pub fn leaf_union(&self, key: usize) -> Vec<IvInterval> {
        let node = self
            .nodes
            .iter()
            .find(|n| n.lo == key && n.hi == key)
            .expect("key in range");
        let lists: Vec<Vec<IvInterval>> = node.buckets.clone();
        multiway_merge(lists, None)
    }

    pub fn no_keys(&self) -> usize {
        self.no_keys
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }
}

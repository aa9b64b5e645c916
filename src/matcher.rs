//! The forked matcher (C7): a breadth-first, right-to-left pattern search
//! over a [`GraphFmIndex`] that forks across incoming edges whenever the
//! current candidate walk reaches a vertex boundary.
//!
//! The step loop follows §4.5 exactly: a fork phase that queries the R2R for
//! candidate continuations, a merge phase that compacts overlapping new
//! forks, and an advance phase that LF-steps every surviving fork (old and
//! new) by the pattern's next character, run in parallel with `rayon`.

use rayon::prelude::*;

use crate::cache::Cache;
use crate::fmindex::Interval;
use crate::gfmi::GraphFmIndex;

/// Advisory classification of a [`Fork`]; per §3, equality between forks is
/// defined purely on `sa_lo` and does not consider `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkKind {
    Root,
    Main,
    Leaf,
    Dead,
    Cached,
}

#[derive(Debug, Clone, Copy)]
pub struct Fork {
    pub sa_lo: u64,
    pub sa_hi: u64,
    pub pos: i64,
    pub kind: ForkKind,
}

impl PartialEq for Fork {
    fn eq(&self, other: &Self) -> bool {
        self.sa_lo == other.sa_lo
    }
}
impl Eq for Fork {}

impl Fork {
    pub fn interval(&self) -> Interval {
        Interval {
            lo: self.sa_lo,
            hi: self.sa_hi,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sa_hi <= self.sa_lo
    }

    pub fn occurrences(&self) -> u64 {
        self.sa_hi.saturating_sub(self.sa_lo)
    }

    fn with_interval(mut self, interval: Interval) -> Self {
        self.sa_lo = interval.lo;
        self.sa_hi = interval.hi;
        self
    }

    /// LF-steps this fork at `byte` and decrements `pos`, per the
    /// advance-fork primitive in §4.4.
    fn advance(mut self, gfmi: &GraphFmIndex, byte: u8) -> Self {
        let next = gfmi.advance(byte, self.interval());
        self.pos -= 1;
        if next.is_empty() {
            self.kind = ForkKind::Dead;
        } else if self.pos < 0 {
            self.kind = ForkKind::Leaf;
        }
        self.with_interval(next)
    }
}

/// The outcome of [`search`]: surviving exact matches and the dead ends
/// produced along the way, kept for diagnostics per §7.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub leaf_forks: Vec<Fork>,
    pub partial_forks: Vec<Fork>,
}

impl MatchResult {
    /// Total occurrence count across every leaf fork (testable invariant 1).
    pub fn total_occurrences(&self) -> u64 {
        self.leaf_forks.iter().map(Fork::occurrences).sum()
    }
}

/// `max_forks`: `None` means unbounded (the `-1` sentinel of the source
/// design); `Some(b)` caps the fork count per step at `b`.
pub fn search(
    gfmi: &GraphFmIndex,
    pattern: &[u8],
    max_forks: Option<usize>,
    cache: Option<&Cache>,
) -> MatchResult {
    let m = pattern.len();
    if m == 0 {
        return MatchResult::default();
    }

    let mut partial = Vec::new();
    let mut pos: i64;
    let mut active: Vec<Fork>;

    if let Some(cache) = cache {
        let depth = cache.depth();
        let take = m.min(depth);
        let suffix = &pattern[m - take..];
        pos = m as i64 - take as i64 - 1;
        active = cache.lookup(suffix, pos, max_forks);
        log::trace!(
            "cache lookup for last {} characters seeded {} forks",
            take,
            active.len()
        );
        if pos < 0 {
            for f in &mut active {
                f.kind = ForkKind::Leaf;
            }
        }
    } else {
        let root = Fork {
            sa_lo: 0,
            sa_hi: gfmi.bwt_length(),
            pos: m as i64 - 1,
            kind: ForkKind::Root,
        };
        let advanced = root.advance(gfmi, pattern[m - 1]);
        if advanced.is_empty() {
            partial.push(advanced);
            return MatchResult {
                leaf_forks: Vec::new(),
                partial_forks: partial,
            };
        }
        pos = advanced.pos;
        active = vec![advanced];
    }

    while pos >= 0 && !active.is_empty() {
        let byte = pattern[pos as usize];
        let (survivors, dead) = step(gfmi, &active, byte, max_forks);
        partial.extend(dead);
        active = survivors;
        pos -= 1;
    }

    active.sort_by_key(|f| f.sa_lo);
    MatchResult {
        leaf_forks: active,
        partial_forks: partial,
    }
}

/// Runs one fork/merge/advance round (§4.5 (a)-(c)) starting from `active`,
/// prepending `byte` as the next pattern character. Returns the surviving
/// forks (old and newly spawned, advanced) and the ones that died this
/// round. Shared between the matcher's main loop and FM-table cache
/// construction (C8), which seeds its BFS from the same primitive.
pub(crate) fn step(
    gfmi: &GraphFmIndex,
    active: &[Fork],
    byte: u8,
    max_forks: Option<usize>,
) -> (Vec<Fork>, Vec<Fork>) {
    let encoded = gfmi.encode(byte);

    // (a) fork phase
    let mut new_forks: Vec<Fork> = Vec::new();
    if let Some(encoded) = encoded {
        for f in active {
            let c0_range = gfmi.precedence_range(f.interval(), gfmi.c0());
            let Some((a, b)) = gfmi.c0_interval_to_r2r_keys(c0_range) else {
                continue;
            };
            let cap = max_forks.map(|budget| budget.saturating_sub(active.len() + new_forks.len()));
            if cap == Some(0) {
                continue;
            }

            let intervals = if gfmi.has_oracle() {
                gfmi.query_oracle_r2r(a, b, encoded, cap).unwrap_or_default()
            } else {
                gfmi.query_r2r(a, b, cap)
            };

            for iv in intervals {
                let sa = gfmi.relative_c1_to_sa_interval(iv);
                new_forks.push(Fork {
                    sa_lo: sa.lo,
                    sa_hi: sa.hi,
                    pos: f.pos,
                    kind: ForkKind::Main,
                });
            }
        }
    }

    // (b) merge phase: sort by sa_lo, merge overlapping/touching intervals
    new_forks.sort_by_key(|f| f.sa_lo);
    let mut merged: Vec<Fork> = Vec::with_capacity(new_forks.len());
    for f in new_forks {
        match merged.last_mut() {
            Some(last) if last.sa_hi >= f.sa_lo => {
                last.sa_hi = last.sa_hi.max(f.sa_hi);
            }
            _ => merged.push(f),
        }
    }

    // (c) advance phase: old forks and compacted new forks, in parallel
    let mut to_advance = active.to_vec();
    to_advance.extend(merged);

    let advanced: Vec<Fork> = to_advance
        .into_par_iter()
        .map(|f| f.advance(gfmi, byte))
        .collect();

    let mut survivors = Vec::with_capacity(advanced.len());
    let mut dead = Vec::new();
    for f in advanced {
        if f.kind == ForkKind::Dead {
            dead.push(f);
        } else {
            survivors.push(f);
        }
    }
    (survivors, dead)
}

//! End-to-end scenarios from the design: a handful of small, hand-built
//! graphs with known answers, plus randomised cache-parity and
//! serialisation round-trip checks.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use gfmi::bitstream::Bitstream;
use gfmi::cache::Cache;
use gfmi::decode::Decoder;
use gfmi::fmindex::{FmIndex, Interval};
use gfmi::gfmi::{GfmiConfig, GraphFmIndex};
use gfmi::graph::Graph;
use gfmi::matcher::search;

fn tight_config() -> GfmiConfig {
    GfmiConfig {
        rank_sample_rate: 1,
        isa_sample_rate: 1,
        ..Default::default()
    }
}

// Scenario A: linear four-vertex DAG.
#[test]
fn scenario_a_linear_dag_reports_one_crossing_match() {
    let mut g = Graph::new();
    let v0 = g.add_vertex(*b"ACCGTA").unwrap();
    let v1 = g.add_vertex(*b"ACGTTA").unwrap();
    let v2 = g.add_vertex(*b"GTTATA").unwrap();
    let v3 = g.add_vertex(*b"CCGTTA").unwrap();
    g.add_edge(v0, v1).unwrap();
    g.add_edge(v0, v2).unwrap();
    g.add_edge(v1, v3).unwrap();
    g.add_edge(v2, v3).unwrap();

    let gfmi = GraphFmIndex::build(g, None, tight_config()).unwrap();
    let result = search(&gfmi, b"TAC", None, None);

    // "...GTA|ACG..." crosses v0->v1 and contains "TAC"; "...ATA|CCG..."
    // crossing v2->v3 does not contain "TAC".
    assert_eq!(result.total_occurrences(), 1);

    let origins = Decoder::new(&gfmi).decode_forks(&result.leaf_forks);
    assert_eq!(origins.len(), 1);
    assert_eq!(origins[0].vid, v0);
    assert_eq!(origins[0].offset, 4);
}

// Scenario B: cycle.
#[test]
fn scenario_b_cycle_graph_one_exact_match_one_pruned_fork() {
    let mut g = Graph::new();
    let v0 = g.add_vertex(*b"AACG").unwrap();
    let v1 = g.add_vertex(*b"GGTA").unwrap();
    let v2 = g.add_vertex(*b"CGAA").unwrap();
    let v3 = g.add_vertex(*b"TTGATT").unwrap();
    g.add_edge(v0, v1).unwrap();
    g.add_edge(v1, v2).unwrap();
    g.add_edge(v2, v0).unwrap();
    g.add_edge(v2, v3).unwrap();

    let gfmi = GraphFmIndex::build(g, None, tight_config()).unwrap();
    let result = search(&gfmi, b"AACGGGTACGAATTGATT", None, None);

    assert_eq!(result.total_occurrences(), 1);
    // the v2 -> {v0, v3} branch forks; one side dies immediately.
    assert!(!result.partial_forks.is_empty());
}

// Scenario C: compressed DFA.
#[test]
fn scenario_c_compressed_dfa_single_match() {
    let mut g = Graph::new();
    let v0 = g.add_vertex(*b"AAAA").unwrap();
    let v1 = g.add_vertex(*b"CCCC").unwrap();
    let v2 = g.add_vertex(*b"GGGG").unwrap();
    let v3 = g.add_vertex(*b"TTTT").unwrap();
    g.add_edge(v0, v1).unwrap();
    g.add_edge(v1, v0).unwrap();
    g.add_edge(v2, v3).unwrap();
    g.add_edge(v3, v2).unwrap();
    g.add_edge(v1, v2).unwrap();
    g.add_edge(v2, v1).unwrap();

    let gfmi = GraphFmIndex::build(g, None, tight_config()).unwrap();
    let result = search(&gfmi, b"CCAAAACCCCGGGGTTTTGGGGCCCCA", None, None);
    assert_eq!(result.total_occurrences(), 1);
}

// Scenario D: cache parity against the cacheless matcher, over randomised
// patterns drawn from a moderately branchy graph.
#[test]
fn scenario_d_cache_parity_over_random_patterns() {
    let mut g = Graph::new();
    let labels: [&[u8]; 8] = [
        b"ACCGTACGGT",
        b"TTGGCATCGA",
        b"GGTACCATGG",
        b"CCAATGGCTA",
        b"ATGCATGCAT",
        b"GCTAGCTAGC",
        b"TACGTACGTA",
        b"CGATCGATCG",
    ];
    let vids: Vec<_> = labels.iter().map(|l| g.add_vertex(*l).unwrap()).collect();
    // a reasonably connected, cyclic adjacency so forks actually branch.
    let edges = [
        (0, 1),
        (0, 2),
        (1, 3),
        (2, 3),
        (3, 4),
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 0),
        (4, 0),
        (2, 5),
    ];
    for (a, b) in edges {
        g.add_edge(vids[a], vids[b]).unwrap();
    }

    let gfmi = GraphFmIndex::build(g, None, tight_config()).unwrap();
    let cache = Cache::build(&gfmi, 3, 1, 1).unwrap();
    let alphabet = gfmi.non_reserved_alphabet();

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..1000 {
        let len = rng.random_range(10..=30);
        let pattern: Vec<u8> = (0..len)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())])
            .collect();

        let without = search(&gfmi, &pattern, None, None);
        let with = search(&gfmi, &pattern, None, Some(&cache));
        assert_eq!(
            without.total_occurrences(),
            with.total_occurrences(),
            "cache/cacheless mismatch for pattern {:?}",
            String::from_utf8_lossy(&pattern)
        );
    }
}

// Scenario E: GFMI serialise/deserialise round-trip over randomised graphs.
// Scaled down from the design's V <= 10^3 / E <= 10^4 / label length <=
// 10^4 bounds so the test suite stays fast; the property being checked
// (serialise . deserialise == identity, observed via count parity and
// permutation/bwt_to_vid equality) does not depend on scale.
#[test]
fn scenario_e_serialise_round_trip_over_random_graphs() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for trial in 0..10 {
        let num_vertices = rng.random_range(2..=40);
        let max_label_len = rng.random_range(1..=20);

        let mut g = Graph::new();
        let alphabet = [b'A', b'C', b'G', b'T'];
        let mut vids = Vec::with_capacity(num_vertices);
        for _ in 0..num_vertices {
            let len = rng.random_range(1..=max_label_len);
            let label: Vec<u8> = (0..len)
                .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                .collect();
            vids.push(g.add_vertex(label).unwrap());
        }
        let num_edges = rng.random_range(0..=(num_vertices * 3));
        for _ in 0..num_edges {
            let a = vids[rng.random_range(0..num_vertices)];
            let b = vids[rng.random_range(0..num_vertices)];
            g.add_edge(a, b).unwrap();
        }

        let gfmi = GraphFmIndex::build(
            g,
            None,
            GfmiConfig {
                rank_sample_rate: 4,
                isa_sample_rate: 4,
                ..Default::default()
            },
        )
        .unwrap();

        let bits = gfmi.serialise();
        let bytes = bits.serialise();
        let restored =
            GraphFmIndex::deserialise(&Bitstream::from_bytes(&bytes, bits.len_bits()), true)
                .unwrap();

        assert_eq!(
            gfmi.permutation(),
            restored.permutation(),
            "trial {trial}: permutation mismatch"
        );
        assert_eq!(
            gfmi.inverse_permutation(),
            restored.inverse_permutation(),
            "trial {trial}: inverse permutation mismatch"
        );
        for pattern in [b"AC".as_slice(), b"GT", b"ACGT", b"A"] {
            assert_eq!(
                gfmi.count(pattern),
                restored.count(pattern),
                "trial {trial}: count mismatch for {:?}",
                String::from_utf8_lossy(pattern)
            );
        }
    }
}

// Scenario F: full-range `sa` enumeration equals the ground-truth suffix
// array, across a spread of rank/isa sample rates. Lengths scaled down from
// the design's 1024..65536 range for test wall-clock.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn scenario_f_sa_enumeration_matches_ground_truth(
        len in 200usize..2000,
        rank_rate_idx in 0usize..5,
        isa_rate_idx in 0usize..5,
        seed in any::<u64>(),
    ) {
        let rank_rates = [1usize, 4, 16, 64, 256];
        let isa_rates = [1usize, 4, 16, 64, 256];
        let rank_rate = rank_rates[rank_rate_idx];
        let isa_rate = isa_rates[isa_rate_idx];

        let mut rng = StdRng::seed_from_u64(seed);
        let alphabet = [b'A', b'C', b'G', b'T'];
        let text: Vec<u8> = (0..len)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())])
            .collect();

        let fmi = FmIndex::build(&text, rank_rate, isa_rate).unwrap();

        let mut terminated = text.clone();
        terminated.push(0);
        let mut expected: Vec<u64> = (0..terminated.len() as u64).collect();
        expected.sort_by(|&a, &b| terminated[a as usize..].cmp(&terminated[b as usize..]));

        let full = fmi.sa(Interval { lo: 0, hi: fmi.bwt_length() });
        prop_assert_eq!(full, expected);
    }
}

// Boundary: |V| = 1 degenerates to a plain FM-index backward search.
#[test]
fn boundary_single_vertex_graph_degenerates_to_plain_search() {
    let mut g = Graph::new();
    g.add_vertex(*b"ACGTACGT").unwrap();
    let gfmi = GraphFmIndex::build(g, None, tight_config()).unwrap();

    let result = search(&gfmi, b"ACGT", None, None);
    assert_eq!(result.total_occurrences(), gfmi.count(b"ACGT"));
    assert!(result.partial_forks.is_empty());
}

// Boundary: empty graph accepts construction and counts 0 for any pattern.
#[test]
fn boundary_empty_graph_counts_zero() {
    let g = Graph::new();
    let gfmi = GraphFmIndex::build(g, None, tight_config()).unwrap();
    assert_eq!(gfmi.num_vertices(), 0);
    assert_eq!(gfmi.count(b"A"), 0);
}

// Boundary: a pattern longer than every vertex label still produces every
// multi-vertex match.
#[test]
fn boundary_pattern_longer_than_every_label_still_matches() {
    let mut g = Graph::new();
    let v0 = g.add_vertex(*b"AC").unwrap();
    let v1 = g.add_vertex(*b"GT").unwrap();
    let v2 = g.add_vertex(*b"AC").unwrap();
    g.add_edge(v0, v1).unwrap();
    g.add_edge(v1, v2).unwrap();

    let gfmi = GraphFmIndex::build(g, None, tight_config()).unwrap();
    let result = search(&gfmi, b"ACGTAC", None, None);
    assert_eq!(result.total_occurrences(), 1);
}

// Testable invariant 2: cache vs cacheless agreement holds for every cache
// depth from 1 upward, not just one fixed depth.
#[test]
fn invariant_cache_parity_holds_across_depths() {
    let mut g = Graph::new();
    let v0 = g.add_vertex(*b"ACCGTA").unwrap();
    let v1 = g.add_vertex(*b"ACGTTA").unwrap();
    let v2 = g.add_vertex(*b"GTTATA").unwrap();
    let v3 = g.add_vertex(*b"CCGTTA").unwrap();
    g.add_edge(v0, v1).unwrap();
    g.add_edge(v0, v2).unwrap();
    g.add_edge(v1, v3).unwrap();
    g.add_edge(v2, v3).unwrap();

    let gfmi = GraphFmIndex::build(g, None, tight_config()).unwrap();
    let without = search(&gfmi, b"TAC", None, None).total_occurrences();

    for depth in 1..=4 {
        let cache = Cache::build(&gfmi, depth, 1, 1).unwrap();
        let with = search(&gfmi, b"TAC", None, Some(&cache)).total_occurrences();
        assert_eq!(without, with, "depth {depth}");
    }
}

// Testable invariant 3: the permutation only reshapes the fork tree, never
// the answer.
#[test]
fn invariant_permutation_does_not_change_counts() {
    let mut g = Graph::new();
    let v0 = g.add_vertex(*b"ACCGTA").unwrap();
    let v1 = g.add_vertex(*b"ACGTTA").unwrap();
    let v2 = g.add_vertex(*b"GTTATA").unwrap();
    let v3 = g.add_vertex(*b"CCGTTA").unwrap();
    g.add_edge(v0, v1).unwrap();
    g.add_edge(v0, v2).unwrap();
    g.add_edge(v1, v3).unwrap();
    g.add_edge(v2, v3).unwrap();

    let identity = GraphFmIndex::build(g.clone(), None, tight_config()).unwrap();
    let permuted =
        GraphFmIndex::build(g, Some(vec![2, 0, 3, 1]), tight_config()).unwrap();

    for pattern in [b"TAC".as_slice(), b"A", b"GTTATACCGTTA"] {
        let a = search(&identity, pattern, None, None).total_occurrences();
        let b = search(&permuted, pattern, None, None).total_occurrences();
        assert_eq!(a, b, "pattern {:?}", String::from_utf8_lossy(pattern));
    }
}

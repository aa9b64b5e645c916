/*! This library indexes string-labelled directed graphs for substring
 * search: given a query pattern, it finds every *walk* — a path through the
 * graph, possibly starting and ending mid-label — whose concatenated vertex
 * labels contain the pattern.
 *
 * The design follows the classic FM-index recipe (count / locate via
 * backward search over a Burrows-Wheeler-transformed text), generalised from
 * a single string to a graph: vertex labels are linearised into one text
 * with per-vertex delimiters, and a range-to-range translation structure
 * (the R2R) lets a backward search that reaches a vertex boundary fork into
 * the suffix-array ranges of every incoming neighbour, continuing the search
 * one vertex earlier. An optional FM-table cache precomputes short-suffix
 * forks so most queries resolve with one lookup instead of replaying the
 * fork/merge/advance loop from scratch. A separate simulated-annealing
 * permutation optimiser chooses a vertex ordering up front to keep the
 * number of disjoint ranges the R2R must merge per step small.
 *
 * ## Usage
 *
 * ```
 * use gfmi::{Graph, GfmiConfig, GraphFmIndex, matcher, Decoder};
 *
 * let mut graph = Graph::new();
 * let v0 = graph.add_vertex(*b"ACCGTA").unwrap();
 * let v1 = graph.add_vertex(*b"ACGTTA").unwrap();
 * graph.add_edge(v0, v1).unwrap();
 *
 * let config = GfmiConfig {
 *     rank_sample_rate: 2,
 *     isa_sample_rate: 2,
 *     ..Default::default()
 * };
 * let index = GraphFmIndex::build(graph, None, config).unwrap();
 *
 * let result = matcher::search(&index, b"TAC", None, None);
 * assert_eq!(result.total_occurrences(), 1);
 *
 * let decoder = Decoder::new(&index);
 * let origins = decoder.decode_forks(&result.leaf_forks);
 * assert_eq!(origins[0].vid, 0);
 * ```
 *
 * More detail on build configuration (including the FM-table cache and the
 * permutation annealer) lives in [`IndexBuildConfig`]; full-walk
 * reconstruction from a decoded origin lives in the [`walk`] module.
 */

pub mod anneal;
pub mod bitstream;
pub mod cache;
pub mod config;
pub mod containers;
pub mod decode;
pub mod error;
pub mod fmindex;
pub mod gfmi;
pub mod graph;
pub mod matcher;
pub mod r2r;
pub mod walk;

#[doc(inline)]
pub use anneal::{AnnealConfig, AnnealResult, ConstraintMatrix};
#[doc(inline)]
pub use config::IndexBuildConfig;
#[doc(inline)]
pub use decode::{Decoder, Origin};
#[doc(inline)]
pub use error::{GfmiError, Result};
#[doc(inline)]
pub use gfmi::{GfmiConfig, GraphFmIndex};
#[doc(inline)]
pub use graph::{Graph, VertexId};
#[doc(inline)]
pub use walk::{EncodedGraph, Walk, enumerate_walks};

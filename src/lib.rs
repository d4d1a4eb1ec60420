//! `topicrank`: global and topic-sensitive random-walk ranking over a weighted influence graph.
//!
//! Data flow:
//! - edge list -> [`InfluenceGraph`] (optionally symmetrized, then row-normalized)
//! - [`solve`] with a uniform teleport vector -> global rank
//! - [`allocate`] per-category teleport shares -> one personalized [`solve`] per category
//! - [`score`] de-trends each category rank against the global rank -> affinity scores
//!
//! [`RankingPipeline`] wires the steps together.
//!
//! Public invariants (must not drift):
//! - **Item order**: every vector is indexed by item id \(0..n-1\).
//! - **Dangling rows**: items with no outgoing weight keep all-zero transition rows. Their
//!   rank mass is not redistributed during iteration (this is not textbook PageRank).
//! - **Fixed work**: solves run exactly `iterations` rounds; there is no tolerance cutoff.
//! - **Determinism**: identical inputs + configs give bit-identical outputs, serial or parallel.

pub mod category;
pub mod graph;
pub mod pipeline;
pub mod score;
pub mod solver;
pub mod teleport;
pub mod topk;

pub use category::{CategoryRegistry, Item, ItemRoster, LABEL_DELIMITER, NO_CATEGORY};
pub use graph::{Edge, GraphDiagnostics, InfluenceGraph, WeightedGraphRef};
pub use pipeline::{CategoryFailure, PipelineConfig, Progress, RankingPipeline, RankingRow, RankingTable};
pub use score::{
    fit_affine, score, AffineFit, DegenerateFitPolicy, ScoringConfig, ZeroPredictionPolicy,
};
pub use solver::{solve, solve_run, solve_with_progress, uniform_teleport, SolveRun, SolverConfig};
pub use teleport::{allocate, category_teleport, TeleportPolicy, TeleportShare};
pub use topk::{normalize, top_k};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid edge {from} -> {to} (weight {weight}) for {item_count} items")]
    InvalidEdge {
        from: usize,
        to: usize,
        weight: f64,
        item_count: usize,
    },
    #[error("invalid teleport vector: {0}")]
    InvalidTeleport(String),
    #[error("damping factor must lie in (0, 1), got {0}")]
    InvalidDamping(f64),
    #[error("reference category {0:?} has no members")]
    MissingReferenceCategory(String),
    #[error("affine fit is degenerate: global rank has zero variance")]
    DegenerateFit,
    #[error("predicted category rank is zero at item {item}")]
    ZeroPrediction { item: usize },
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("category {0:?} has no members in its teleport set")]
    EmptyCategory(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

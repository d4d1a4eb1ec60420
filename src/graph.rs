//! Sparse weighted influence graph.
//!
//! Storage is CSR-style: each item owns a contiguous run of destinations and a matching run of
//! weights. The graph is built once from an edge list and never mutated afterwards;
//! [`InfluenceGraph::normalize_rows`] derives a new, row-stochastic copy.

use crate::{Error, Result};

/// A directed, weighted edge `source -> destination`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    pub source: usize,
    pub destination: usize,
    pub weight: f64,
}

impl Edge {
    pub fn new(source: usize, destination: usize, weight: f64) -> Self {
        Self { source, destination, weight }
    }
}

impl From<(usize, usize, f64)> for Edge {
    fn from((source, destination, weight): (usize, usize, f64)) -> Self {
        Self::new(source, destination, weight)
    }
}

/// A weighted graph view that can return **borrowed** neighbor + weight slices.
///
/// Requirements:
/// - `neighbors.len() == weights.len()`
/// - weights are non-negative
///
/// The solver reads weights as transition probabilities, so graphs handed to it should already be
/// row-normalized.
pub trait WeightedGraphRef {
    fn node_count(&self) -> usize;

    /// Return `(neighbors, weights)` for a node.
    fn neighbors_and_weights_ref(&self, node: usize) -> (&[usize], &[f64]);
}

/// Sanity-check numbers for a built graph.
///
/// Counts are over stored `(source, destination)` pairs, not over weight.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphDiagnostics {
    pub item_count: usize,
    pub edge_count: usize,
    /// `edge_count / (n * (n - 1))`; 0 for fewer than two items.
    pub density: f64,
    pub zero_in_items: usize,
    pub zero_out_items: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceGraph {
    offsets: Vec<usize>,
    targets: Vec<usize>,
    weights: Vec<f64>,
    symmetric: bool,
    normalized: bool,
}

impl InfluenceGraph {
    /// Build a graph over `item_count` items.
    ///
    /// Duplicate `(source, destination)` pairs are summed. With `symmetric`, the transpose is
    /// added before merging (`W + W^T`), so a self-loop's weight doubles.
    pub fn build(edges: &[Edge], item_count: usize, symmetric: bool) -> Result<Self> {
        let mut entries: Vec<(usize, usize, f64)> =
            Vec::with_capacity(if symmetric { edges.len() * 2 } else { edges.len() });
        for e in edges {
            if e.source >= item_count
                || e.destination >= item_count
                || !e.weight.is_finite()
                || e.weight < 0.0
            {
                return Err(Error::InvalidEdge {
                    from: e.source,
                    to: e.destination,
                    weight: e.weight,
                    item_count,
                });
            }
            entries.push((e.source, e.destination, e.weight));
            if symmetric {
                entries.push((e.destination, e.source, e.weight));
            }
        }

        // Stable sort: duplicates are summed in input order.
        entries.sort_by_key(|&(s, d, _)| (s, d));

        let mut offsets = vec![0usize; item_count + 1];
        let mut targets: Vec<usize> = Vec::with_capacity(entries.len());
        let mut weights: Vec<f64> = Vec::with_capacity(entries.len());
        let mut last: Option<(usize, usize)> = None;
        for (s, d, w) in entries {
            if last == Some((s, d)) {
                if let Some(acc) = weights.last_mut() {
                    *acc += w;
                }
                continue;
            }
            last = Some((s, d));
            targets.push(d);
            weights.push(w);
            offsets[s + 1] += 1;
        }
        for i in 0..item_count {
            offsets[i + 1] += offsets[i];
        }

        Ok(Self { offsets, targets, weights, symmetric, normalized: false })
    }

    /// Derive the row-stochastic transition matrix.
    ///
    /// Rows with positive weight sum are divided by that sum. Rows summing to exactly 0 stay
    /// all-zero: dangling items get no uniform redistribution here or in the solver.
    pub fn normalize_rows(&self) -> Self {
        let mut weights = self.weights.clone();
        for u in 0..self.item_count() {
            let row = &mut weights[self.offsets[u]..self.offsets[u + 1]];
            let total: f64 = row.iter().sum();
            if total > 0.0 {
                for w in row.iter_mut() {
                    *w /= total;
                }
            }
        }
        Self {
            offsets: self.offsets.clone(),
            targets: self.targets.clone(),
            weights,
            symmetric: self.symmetric,
            normalized: true,
        }
    }

    pub fn item_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of stored `(source, destination)` pairs.
    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Sum of outgoing weight. Raw or normalized depending on which graph it is called on;
    /// 0 for out-of-range items.
    pub fn out_degree(&self, item: usize) -> f64 {
        let (_, wts) = self.row(item);
        wts.iter().sum()
    }

    /// Sum of incoming weight. Scans every edge; meant for diagnostics only.
    pub fn in_degree(&self, item: usize) -> f64 {
        self.targets
            .iter()
            .zip(self.weights.iter())
            .filter(|(&v, _)| v == item)
            .map(|(_, &w)| w)
            .sum()
    }

    /// Number of stored outgoing edges.
    pub fn out_edge_count(&self, item: usize) -> usize {
        self.row(item).0.len()
    }

    /// Number of stored incoming edges for every item, in one pass.
    pub fn in_edge_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.item_count()];
        for &v in &self.targets {
            counts[v] += 1;
        }
        counts
    }

    pub fn diagnostics(&self) -> GraphDiagnostics {
        let n = self.item_count();
        let edge_count = self.edge_count();
        let density = if n < 2 {
            0.0
        } else {
            edge_count as f64 / (n as f64 * (n - 1) as f64)
        };
        let zero_in_items = self.in_edge_counts().iter().filter(|&&c| c == 0).count();
        let zero_out_items = (0..n).filter(|&u| self.out_edge_count(u) == 0).count();
        GraphDiagnostics { item_count: n, edge_count, density, zero_in_items, zero_out_items }
    }

    fn row(&self, item: usize) -> (&[usize], &[f64]) {
        if item >= self.item_count() {
            return (&[], &[]);
        }
        let range = self.offsets[item]..self.offsets[item + 1];
        (&self.targets[range.clone()], &self.weights[range])
    }
}

impl WeightedGraphRef for InfluenceGraph {
    fn node_count(&self) -> usize {
        self.item_count()
    }

    fn neighbors_and_weights_ref(&self, node: usize) -> (&[usize], &[f64]) {
        self.row(node)
    }
}

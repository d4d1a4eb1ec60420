//! Fixed-iteration random-walk solver (global and personalized PageRank).
//!
//! Each round computes
//! \[
//!   r_{t+1} = d \, r_t^\top P + (1 - d)\, t
//! \]
//! where \(P\) is the row-normalized transition matrix and \(t\) the teleport distribution.
//!
//! Dangling items (all-zero rows of \(P\)) push no mass forward: the surfer's mass on them is
//! dropped each round instead of being teleported. This keeps results comparable with earlier
//! runs of the same engine. The returned vector is L1-normalized once at the end; on graphs
//! without dangling items that is a no-op.

use crate::graph::WeightedGraphRef;
use crate::topk::normalize;
use crate::{Error, Result};

/// Allowed deviation of a teleport vector's sum from 1.
pub const TELEPORT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Probability of following an edge; `1 - damping_factor` is the teleport probability.
    pub damping_factor: f64,
    /// Exact number of power-iteration rounds. There is no early exit.
    pub iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { damping_factor: 0.75, iterations: 100 }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        // Written so that NaN fails too.
        if !(self.damping_factor > 0.0 && self.damping_factor < 1.0) {
            return Err(Error::InvalidDamping(self.damping_factor));
        }
        Ok(())
    }
}

/// Output of a solve plus run diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveRun {
    /// Rank vector, unit L1 mass.
    pub scores: Vec<f64>,
    pub iterations: usize,
    /// L1 distance between the last two iterates (0 when `iterations == 0`).
    pub diff_l1: f64,
    /// Mass lost to dangling items before the final normalization.
    pub leaked_mass: f64,
}

/// Uniform teleport distribution over `n` items.
pub fn uniform_teleport(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

pub fn solve<G: WeightedGraphRef>(
    graph: &G,
    config: SolverConfig,
    teleport: &[f64],
) -> Result<Vec<f64>> {
    Ok(solve_run(graph, config, teleport)?.scores)
}

pub fn solve_run<G: WeightedGraphRef>(
    graph: &G,
    config: SolverConfig,
    teleport: &[f64],
) -> Result<SolveRun> {
    solve_with_progress(graph, config, teleport, |_, _| {})
}

/// Like [`solve_run`], calling `progress(round, diff_l1)` after every round.
pub fn solve_with_progress<G, F>(
    graph: &G,
    config: SolverConfig,
    teleport: &[f64],
    mut progress: F,
) -> Result<SolveRun>
where
    G: WeightedGraphRef,
    F: FnMut(usize, f64),
{
    config.validate()?;
    let n = graph.node_count();
    validate_teleport(teleport, n)?;
    if n == 0 {
        return Ok(SolveRun { scores: Vec::new(), iterations: 0, diff_l1: 0.0, leaked_mass: 0.0 });
    }

    let d = config.damping_factor;
    let mut scores = teleport.to_vec();
    let mut next = vec![0.0; n];
    let mut diff_l1 = 0.0;

    for round in 0..config.iterations {
        for (x, &t) in next.iter_mut().zip(teleport) {
            *x = (1.0 - d) * t;
        }
        for (u, &r) in scores.iter().enumerate() {
            if r == 0.0 {
                continue;
            }
            let share = d * r;
            let (nbrs, wts) = graph.neighbors_and_weights_ref(u);
            for (&v, &w) in nbrs.iter().zip(wts) {
                next[v] += share * w;
            }
        }
        diff_l1 = scores.iter().zip(next.iter()).map(|(old, new)| (old - new).abs()).sum();
        std::mem::swap(&mut scores, &mut next);
        progress(round + 1, diff_l1);
    }

    let mass: f64 = scores.iter().sum();
    normalize(&mut scores);
    Ok(SolveRun { scores, iterations: config.iterations, diff_l1, leaked_mass: 1.0 - mass })
}

fn validate_teleport(teleport: &[f64], n: usize) -> Result<()> {
    if teleport.len() != n {
        return Err(Error::LengthMismatch { expected: n, actual: teleport.len() });
    }
    if n == 0 {
        return Ok(());
    }
    if teleport.iter().any(|&x| !x.is_finite() || x < 0.0) {
        return Err(Error::InvalidTeleport(
            "entries must be finite and non-negative".to_string(),
        ));
    }
    let sum: f64 = teleport.iter().sum();
    if (sum - 1.0).abs() > TELEPORT_TOLERANCE {
        return Err(Error::InvalidTeleport(format!("entries must sum to 1 (sum={sum})")));
    }
    Ok(())
}

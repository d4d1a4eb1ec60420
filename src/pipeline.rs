//! End-to-end ranking: graph -> global rank -> per-category rank -> affinity scores.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::category::{CategoryRegistry, ItemRoster};
use crate::graph::{Edge, GraphDiagnostics, InfluenceGraph};
use crate::score::{score, ScoringConfig};
use crate::solver::{solve, solve_with_progress, uniform_teleport, SolverConfig};
use crate::teleport::{allocate, category_teleport, TeleportPolicy, TeleportShare};
use crate::topk::top_k;
use crate::{Error, Result};

/// Categories left out of scoring unless configured otherwise.
pub const DEFAULT_IGNORED_CATEGORIES: [&str; 4] = ["IMAX", "Film-Noir", "Animation", "Documentary"];

/// Reference category of the proportional policy unless configured otherwise.
pub const DEFAULT_REFERENCE_CATEGORY: &str = "Thriller";

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Sets the per-item teleport share under [`TeleportPolicy::Proportional`].
    pub reference_category: String,
    pub ignored_categories: BTreeSet<String>,
    pub policy: TeleportPolicy,
    /// Damping of the global solve; `1 - damping_factor` is the global teleport probability.
    pub damping_factor: f64,
    pub iterations: usize,
    /// Add the transpose of the edge list before normalizing.
    pub symmetric: bool,
    pub scoring: ScoringConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_category: DEFAULT_REFERENCE_CATEGORY.to_string(),
            ignored_categories: DEFAULT_IGNORED_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            policy: TeleportPolicy::Proportional,
            damping_factor: 0.75,
            iterations: 100,
            symmetric: true,
            scoring: ScoringConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn teleport_probability(&self) -> f64 {
        1.0 - self.damping_factor
    }

    pub fn solver(&self) -> SolverConfig {
        SolverConfig { damping_factor: self.damping_factor, iterations: self.iterations }
    }

    pub fn validate(&self) -> Result<()> {
        self.solver().validate()?;
        self.scoring.validate()?;
        if self.policy == TeleportPolicy::Proportional
            && self.ignored_categories.contains(&self.reference_category)
        {
            return Err(Error::InvalidConfig(format!(
                "reference category {:?} is ignored",
                self.reference_category
            )));
        }
        Ok(())
    }
}

/// Progress events. Purely informational; never affects results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress<'a> {
    GlobalRound { round: usize, diff_l1: f64 },
    CategoryFinished { category: &'a str, finished: usize, total: usize },
}

/// A category whose scores could not be produced. The rest of the run is unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFailure {
    pub category: String,
    pub error: Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow<'a> {
    pub item: usize,
    pub global_rank: f64,
    pub affinity: Vec<(&'a str, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankingTable {
    pub global_rank: Vec<f64>,
    pub diagnostics: Option<GraphDiagnostics>,
    pub shares: BTreeMap<String, TeleportShare>,
    /// Raw personalized rank per solved category, including ones whose scoring failed.
    pub category_rank: BTreeMap<String, Vec<f64>>,
    pub affinity: BTreeMap<String, Vec<f64>>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub failures: Vec<CategoryFailure>,
}

impl RankingTable {
    pub fn item_count(&self) -> usize {
        self.global_rank.len()
    }

    /// Categories with an affinity column.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.affinity.keys().map(String::as_str)
    }

    pub fn row(&self, item: usize) -> Option<RankingRow<'_>> {
        let global_rank = *self.global_rank.get(item)?;
        let affinity = self.affinity.iter().map(|(c, s)| (c.as_str(), s[item])).collect();
        Some(RankingRow { item, global_rank, affinity })
    }

    /// Highest-affinity items of `category`, best first.
    pub fn top_k(&self, category: &str, k: usize) -> Option<Vec<(usize, f64)>> {
        self.affinity.get(category).map(|scores| top_k(scores, k))
    }

    pub fn failure(&self, category: &str) -> Option<&Error> {
        self.failures.iter().find(|f| f.category == category).map(|f| &f.error)
    }
}

/// One personalized solve: category, its teleport share, its teleport set.
type Job<'a> = (&'a String, &'a TeleportShare, &'a Vec<usize>);

/// Category, raw personalized rank, affinity scores (or why scoring failed).
type Solved = (String, Vec<f64>, Result<Vec<f64>>);

pub struct RankingPipeline {
    config: PipelineConfig,
    registry: Option<CategoryRegistry>,
}

impl RankingPipeline {
    /// Pipeline whose category vocabulary is discovered from the roster at run time.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, registry: None }
    }

    /// Pipeline with a fixed category vocabulary.
    pub fn with_registry(config: PipelineConfig, registry: CategoryRegistry) -> Self {
        Self { config, registry: Some(registry) }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, roster: &ItemRoster, edges: &[Edge]) -> Result<RankingTable> {
        self.run_with_progress(roster, edges, |_| {})
    }

    pub fn run_with_progress<P>(
        &self,
        roster: &ItemRoster,
        edges: &[Edge],
        progress: P,
    ) -> Result<RankingTable>
    where
        P: Fn(Progress<'_>) + Sync,
    {
        let config = &self.config;
        config.validate()?;
        let n = roster.len();

        let graph = InfluenceGraph::build(edges, n, config.symmetric)?;
        let diagnostics = graph.diagnostics();
        log::info!(
            "graph: {} items, {} edges, density {:.4}, {} items with no incoming edges, {} with no outgoing edges",
            diagnostics.item_count,
            diagnostics.edge_count,
            diagnostics.density,
            diagnostics.zero_in_items,
            diagnostics.zero_out_items
        );
        let transition = graph.normalize_rows();

        let global = solve_with_progress(
            &transition,
            config.solver(),
            &uniform_teleport(n),
            |round, diff_l1| progress(Progress::GlobalRound { round, diff_l1 }),
        )?;
        log::info!(
            "global rank done after {} rounds (last step {:.3e}, dangling loss {:.3e})",
            global.iterations,
            global.diff_l1,
            global.leaked_mass
        );

        let registry = match &self.registry {
            Some(r) => r.without(&config.ignored_categories),
            None => CategoryRegistry::discover(roster, &config.ignored_categories),
        };
        let members = registry.members(roster);
        let counts: BTreeMap<String, usize> =
            members.iter().map(|(c, m)| (c.clone(), m.len())).collect();
        let shares = allocate(
            &counts,
            config.teleport_probability(),
            config.policy,
            &config.reference_category,
        )?;
        for (category, share) in &shares {
            log::debug!(
                "teleport {category}: total {:.4}, per item {:.6}, {} members",
                share.total,
                share.per_item,
                share.members
            );
        }

        let mut failures: Vec<CategoryFailure> = members
            .keys()
            .filter(|c| !shares.contains_key(*c))
            .map(|c| CategoryFailure {
                category: c.clone(),
                error: Error::EmptyCategory(c.clone()),
            })
            .collect();

        let jobs: Vec<Job<'_>> = shares
            .iter()
            .filter_map(|(c, share)| members.get(c).map(|m| (c, share, m)))
            .collect();
        let total = jobs.len();
        let finished = AtomicUsize::new(0);

        let run_category = |job: &Job<'_>| -> Result<Solved> {
            let &(category, share, ids) = job;
            let teleport = category_teleport(ids, n)?;
            let solver = SolverConfig {
                damping_factor: share.damping_factor(),
                iterations: config.iterations,
            };
            let rank = solve(&transition, solver, &teleport)?;
            let scored = score(&global.scores, &rank, config.scoring);
            let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
            progress(Progress::CategoryFinished {
                category: category.as_str(),
                finished: done,
                total,
            });
            log::debug!("category {category} done ({done}/{total})");
            Ok((category.clone(), rank, scored))
        };

        #[cfg(feature = "parallel")]
        let solved: Result<Vec<_>> = {
            use rayon::prelude::*;
            jobs.par_iter().map(run_category).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let solved: Result<Vec<_>> = jobs.iter().map(run_category).collect();

        let mut table = RankingTable {
            diagnostics: Some(diagnostics),
            shares: shares.clone(),
            ..RankingTable::default()
        };
        for (category, rank, scored) in solved? {
            match scored {
                Ok(scores) => {
                    table.affinity.insert(category.clone(), scores);
                }
                Err(error) => failures.push(CategoryFailure { category: category.clone(), error }),
            }
            table.category_rank.insert(category, rank);
        }
        for failure in &failures {
            log::warn!("category {} not scored: {}", failure.category, failure.error);
        }
        failures.sort_by(|a, b| a.category.cmp(&b.category));
        table.failures = failures;
        table.global_rank = global.scores;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Item;
    use crate::score::DegenerateFitPolicy;

    fn two_pairs() -> (ItemRoster, Vec<Edge>) {
        let roster = ItemRoster::new(vec![
            Item::new(["A"]),
            Item::new(["A"]),
            Item::new(["B"]),
            Item::new(["B"]),
        ]);
        let edges = [(0, 1, 1.0), (1, 0, 1.0), (2, 3, 1.0), (3, 2, 1.0)]
            .into_iter()
            .map(Edge::from)
            .collect();
        (roster, edges)
    }

    fn uniform_config() -> PipelineConfig {
        PipelineConfig {
            policy: TeleportPolicy::Uniform,
            symmetric: false,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn default_config_matches_reference_run() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.teleport_probability(), 0.25);
        assert_eq!(cfg.reference_category, "Thriller");
        assert_eq!(cfg.policy, TeleportPolicy::Proportional);
        assert!(cfg.symmetric);
        assert_eq!(cfg.iterations, 100);
        assert!(cfg.ignored_categories.contains("IMAX"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn constant_global_rank_fails_each_category_but_not_the_run() {
        let (roster, edges) = two_pairs();
        let table = RankingPipeline::new(uniform_config()).run(&roster, &edges).unwrap();

        assert_eq!(table.global_rank, vec![0.25; 4]);
        assert_eq!(table.category_rank["A"], vec![0.5, 0.5, 0.0, 0.0]);
        assert_eq!(table.category_rank["B"], vec![0.0, 0.0, 0.5, 0.5]);
        assert!(table.affinity.is_empty());
        assert_eq!(table.failure("A"), Some(&Error::DegenerateFit));
        assert_eq!(table.failure("B"), Some(&Error::DegenerateFit));
    }

    #[test]
    fn mean_fallback_scores_members_above_non_members() {
        let (roster, edges) = two_pairs();
        let mut cfg = uniform_config();
        cfg.scoring.on_degenerate_fit = DegenerateFitPolicy::MeanFallback;
        let table = RankingPipeline::new(cfg).run(&roster, &edges).unwrap();

        assert_eq!(table.affinity["A"], vec![1.0, 1.0, -1.0, -1.0]);
        let row = table.row(2).unwrap();
        assert_eq!(row.global_rank, 0.25);
        assert_eq!(row.affinity, vec![("A", -1.0), ("B", 1.0)]);
        assert_eq!(table.top_k("A", 2), Some(vec![(0, 1.0), (1, 1.0)]));
        assert!(table.row(4).is_none());
    }

    #[test]
    fn empty_category_is_reported_not_fatal() {
        let (roster, edges) = two_pairs();
        let registry = CategoryRegistry::new(["A", "B", "C"]);
        let table =
            RankingPipeline::with_registry(uniform_config(), registry).run(&roster, &edges).unwrap();
        assert_eq!(table.failure("C"), Some(&Error::EmptyCategory("C".to_string())));
        assert!(!table.category_rank.contains_key("C"));
        assert!(table.category_rank.contains_key("A"));
    }

    #[test]
    fn invalid_edge_aborts_the_run() {
        let (roster, mut edges) = two_pairs();
        edges.push(Edge::new(0, 4, 1.0));
        let err = RankingPipeline::new(uniform_config()).run(&roster, &edges).unwrap_err();
        assert!(matches!(err, Error::InvalidEdge { to: 4, .. }));
    }

    #[test]
    fn proportional_policy_needs_reference_members() {
        let (roster, edges) = two_pairs();
        let cfg = PipelineConfig { symmetric: false, ..PipelineConfig::default() };
        let err = RankingPipeline::new(cfg).run(&roster, &edges).unwrap_err();
        assert_eq!(err, Error::MissingReferenceCategory("Thriller".to_string()));
    }

    #[test]
    fn oversized_proportional_share_fails_before_category_solves() {
        // Reference has 2 members, so with teleport probability 0.25 "Big" (8 members) gets a
        // total share of 1.
        let roster = ItemRoster::from_label_strings(
            (0..8).map(|i| if i < 2 { "Big|Small" } else { "Big" }),
        );
        let edges: Vec<Edge> = (0..8).map(|i| Edge::new(i, (i + 1) % 8, 1.0)).collect();
        let cfg = PipelineConfig {
            reference_category: "Small".to_string(),
            ..PipelineConfig::default()
        };
        let solved = AtomicUsize::new(0);
        let err = RankingPipeline::new(cfg)
            .run_with_progress(&roster, &edges, |event| {
                if let Progress::CategoryFinished { .. } = event {
                    solved.fetch_add(1, Ordering::Relaxed);
                }
            })
            .unwrap_err();
        let Error::InvalidConfig(msg) = err else { panic!("unexpected error: {err:?}") };
        assert!(msg.contains("\"Big\""), "{msg}");
        assert_eq!(solved.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn ignored_reference_is_a_config_error() {
        let cfg = PipelineConfig {
            reference_category: "IMAX".to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn progress_reports_every_round_and_category() {
        let (roster, edges) = two_pairs();
        let rounds = AtomicUsize::new(0);
        let categories = AtomicUsize::new(0);
        RankingPipeline::new(uniform_config())
            .run_with_progress(&roster, &edges, |event| match event {
                Progress::GlobalRound { .. } => {
                    rounds.fetch_add(1, Ordering::Relaxed);
                }
                Progress::CategoryFinished { total, .. } => {
                    assert_eq!(total, 2);
                    categories.fetch_add(1, Ordering::Relaxed);
                }
            })
            .unwrap();
        assert_eq!(rounds.load(Ordering::Relaxed), 100);
        assert_eq!(categories.load(Ordering::Relaxed), 2);
    }
}

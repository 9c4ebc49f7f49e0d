//! Chaining of the rounds.
//!
//! The driver holds no per-page state: it only decides which mapper runs in which round (the
//! [`RoundPlan`]) and feeds the materialized output of a round to the next one.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{ConfigError, JobConfig, RankConfig};
use crate::operator::{MapperKind, RankReducer, RoundMapper};
use crate::record::RankedPage;
use crate::substrate::{CancelToken, GroupingSubstrate, LocalSubstrate, MapStats, SubstrateError};

/// Rank mass lost in a round above which a warning about the dangling pages is logged.
const MASS_LOSS_WARNING: f64 = 1e-3;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("job cancelled before round {round}")]
    Cancelled { round: usize },
    #[error("round {round} failed: {source}")]
    Round {
        round: usize,
        #[source]
        source: SubstrateError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// True if the job stopped because its [`CancelToken`] was triggered.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            JobError::Cancelled { .. }
                | JobError::Round {
                    source: SubstrateError::Cancelled,
                    ..
                }
        )
    }
}

/// Format of the lines the job starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputKind {
    /// `page_id<TAB>outlinks`: the first round seeds the uniform initial rank.
    #[default]
    Raw,
    /// `page_id<TAB>rank<TAB>outlinks`, the output of a previous run: every round reads the ranks
    /// from its input.
    Ranked,
}

/// State of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// The given round (starting from 1) is the next one to run, with the mapper it uses.
    Round(usize, MapperKind),
    /// Every round has been completed.
    Done,
}

/// The sequencing table of a job: which mapper each round uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundPlan {
    mappers: Vec<MapperKind>,
}

impl RoundPlan {
    /// Build the plan for `iterations` rounds. With raw input the first round uses
    /// [`MapperKind::FirstRound`], every other round uses [`MapperKind::SubsequentRound`].
    pub fn new(iterations: usize, input: InputKind) -> Self {
        let mappers = (1..=iterations)
            .map(|round| match (round, input) {
                (1, InputKind::Raw) => MapperKind::FirstRound,
                _ => MapperKind::SubsequentRound,
            })
            .collect();
        Self { mappers }
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Mapper used by a round, `None` if the round is not part of the plan.
    pub fn mapper(&self, round: usize) -> Option<MapperKind> {
        round.checked_sub(1).and_then(|i| self.mappers.get(i)).copied()
    }

    pub fn start(&self) -> RoundState {
        self.advance(0)
    }

    /// State reached when `state` completes.
    pub fn next_state(&self, state: RoundState) -> RoundState {
        match state {
            RoundState::Round(round, _) => self.advance(round),
            RoundState::Done => RoundState::Done,
        }
    }

    fn advance(&self, completed: usize) -> RoundState {
        match self.mappers.get(completed) {
            Some(&kind) => RoundState::Round(completed + 1, kind),
            None => RoundState::Done,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, MapperKind)> + '_ {
        self.mappers.iter().enumerate().map(|(i, k)| (i + 1, *k))
    }
}

/// Summary of a completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundStats {
    pub round: usize,
    pub mapper: MapperKind,
    pub map: MapStats,
    /// Number of pages in the output of the round.
    pub pages_out: usize,
    /// Sum of the ranks in the output of the round.
    pub rank_out: f64,
    pub elapsed: Duration,
}

/// The materialized output of a round, handed to the observer of the job.
#[derive(Debug)]
pub struct RoundSnapshot<'a> {
    pub round: usize,
    /// Output lines, sorted by page id. They are the input of the next round.
    pub lines: &'a [String],
    pub stats: &'a RoundStats,
}

/// Result of a whole job.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Output of the last round, sorted by page id, with full precision ranks.
    pub pages: Vec<RankedPage>,
    /// Output of the last round encoded as `page_id<TAB>rank<TAB>outlinks` lines.
    pub lines: Vec<String>,
    pub rounds: Vec<RoundStats>,
}

impl RunReport {
    pub fn total_rank(&self) -> f64 {
        self.pages.iter().map(|p| p.state.rank).sum()
    }

    pub fn rank_of(&self, page_id: &str) -> Option<f64> {
        self.pages
            .binary_search_by(|p| p.page_id.as_str().cmp(page_id))
            .ok()
            .map(|i| self.pages[i].state.rank)
    }
}

type Observer<'a> = Box<dyn FnMut(&RoundSnapshot) + 'a>;

/// A PageRank job: runs the rounds of the [`RoundPlan`] one after the other on a
/// [`GroupingSubstrate`].
///
/// The output of a round is fully materialized, encoded as text lines, before the next round
/// starts, so the ranks read by a round are rounded to 6 decimal digits.
///
/// Pages without out-links do not forward their rank to anybody: the total rank mass decreases
/// at every round when the graph has dangling pages.
///
/// ## Example
///
/// ```
/// # use pagerank_mr::prelude::*;
/// let input = vec!["a\tb".to_string(), "b\ta".to_string()];
/// let config = RankConfig::new(2).iterations(5);
/// let report = PageRankJob::new(config, RuntimeConfig::local(2)).run(input).unwrap();
/// assert_eq!(report.lines, vec!["a\t0.500000\tb", "b\t0.500000\ta"]);
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PageRankJob<'a, S> {
    config: RankConfig,
    substrate: S,
    cancel: CancelToken,
    #[derivative(Debug = "ignore")]
    observer: Option<Observer<'a>>,
}

impl<'a> PageRankJob<'a, LocalSubstrate> {
    pub fn new(config: RankConfig, runtime: crate::config::RuntimeConfig) -> Self {
        Self::with_substrate(config, LocalSubstrate::new(runtime))
    }

    pub fn from_config(config: JobConfig) -> Self {
        Self::new(config.rank, config.runtime)
    }
}

impl<'a, S: GroupingSubstrate> PageRankJob<'a, S> {
    pub fn with_substrate(config: RankConfig, substrate: S) -> Self {
        Self {
            config,
            substrate,
            cancel: CancelToken::new(),
            observer: None,
        }
    }

    /// Token that can be used from another thread to abort the job.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Call `observer` with the output of every completed round.
    pub fn observe<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&RoundSnapshot) + 'a,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    /// Run the job on raw `page_id<TAB>outlinks` lines.
    pub fn run(&mut self, input: Vec<String>) -> Result<RunReport, JobError> {
        self.run_from(input, InputKind::Raw)
    }

    pub fn run_from(&mut self, input: Vec<String>, kind: InputKind) -> Result<RunReport, JobError> {
        self.config.validate()?;
        let plan = RoundPlan::new(self.config.iterations, kind);
        let reducer = RankReducer::new(&self.config);
        info!(
            "starting pagerank: {} pages, {} rounds, damping factor {}, {} input lines",
            self.config.num_pages,
            plan.len(),
            self.config.damping_factor,
            input.len()
        );

        let start = Instant::now();
        let mut lines = input;
        let mut pages = Vec::new();
        let mut rounds = Vec::with_capacity(plan.len());
        let mut state = plan.start();
        while let RoundState::Round(round, kind) = state {
            if self.cancel.is_cancelled() {
                return Err(JobError::Cancelled { round });
            }
            let (round_pages, stats) = self.run_round(round, kind, &lines, &reducer)?;
            lines = round_pages.iter().map(RankedPage::encode).collect();
            pages = round_pages;

            if let Some(observer) = self.observer.as_mut() {
                observer(&RoundSnapshot {
                    round,
                    lines: &lines,
                    stats: &stats,
                });
            }
            rounds.push(stats);
            state = plan.next_state(state);
        }

        info!("pagerank completed in {:?}", start.elapsed());
        Ok(RunReport {
            pages,
            lines,
            rounds,
        })
    }

    fn run_round(
        &self,
        round: usize,
        kind: MapperKind,
        input: &[String],
        reducer: &RankReducer,
    ) -> Result<(Vec<RankedPage>, RoundStats), JobError> {
        let start = Instant::now();
        let mapper = RoundMapper::new(kind, &self.config);
        let output = self
            .substrate
            .execute(input, &mapper, reducer, &self.cancel)
            .map_err(|source| JobError::Round { round, source })?;

        let mut pages = output.records;
        pages.sort_unstable_by(|a, b| a.page_id.cmp(&b.page_id));
        let stats = RoundStats {
            round,
            mapper: kind,
            map: output.map_stats,
            pages_out: pages.len(),
            rank_out: pages.iter().map(|p| p.state.rank).sum(),
            elapsed: start.elapsed(),
        };
        self.log_round(&stats);
        Ok((pages, stats))
    }

    /// True if the pages read by the first round are not `num_pages`. Pages that only appear as
    /// link targets are not counted.
    fn num_pages_mismatch(&self, stats: &RoundStats) -> bool {
        stats.round == 1 && stats.map.pages != self.config.num_pages
    }

    fn log_round(&self, stats: &RoundStats) {
        info!(
            "round {} ({:?}): {} pages in, {} pages out, rank mass {:.6} -> {:.6}, {:?}",
            stats.round,
            stats.mapper,
            stats.map.pages,
            stats.pages_out,
            stats.map.rank_in,
            stats.rank_out,
            stats.elapsed
        );
        if stats.map.skipped > 0 {
            debug!("round {}: skipped {} lines", stats.round, stats.map.skipped);
        }
        if self.num_pages_mismatch(stats) {
            warn!(
                "num_pages is {} but the input has {} pages",
                self.config.num_pages, stats.map.pages
            );
        }
        if stats.map.dangling > 0 && 1.0 - stats.rank_out > MASS_LOSS_WARNING {
            let level = if stats.round == 1 {
                log::Level::Warn
            } else {
                log::Level::Debug
            };
            log!(
                level,
                "round {}: {} dangling pages dropped {:.6} of rank mass",
                stats.round,
                stats.map.dangling,
                stats.map.rank_in - stats.map.forwarded
            );
        }
    }
}

/// Run a whole job on raw input lines with the given configuration.
pub fn pagerank(input: Vec<String>, config: JobConfig) -> Result<RunReport, JobError> {
    config.validate()?;
    PageRankJob::from_config(config).run(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    #[test]
    fn plan_from_raw_input() {
        let plan = RoundPlan::new(3, InputKind::Raw);
        assert_eq!(
            plan.iter().collect::<Vec<_>>(),
            vec![
                (1, MapperKind::FirstRound),
                (2, MapperKind::SubsequentRound),
                (3, MapperKind::SubsequentRound)
            ]
        );
        assert_eq!(plan.mapper(0), None);
        assert_eq!(plan.mapper(4), None);
    }

    #[test]
    fn plan_from_ranked_input() {
        let plan = RoundPlan::new(2, InputKind::Ranked);
        assert!(plan.iter().all(|(_, k)| k == MapperKind::SubsequentRound));
    }

    #[test]
    fn plan_states() {
        let plan = RoundPlan::new(2, InputKind::Raw);
        let mut state = plan.start();
        let mut visited = vec![];
        while let RoundState::Round(r, kind) = state {
            visited.push((r, kind));
            state = plan.next_state(state);
        }
        assert_eq!(
            visited,
            vec![(1, MapperKind::FirstRound), (2, MapperKind::SubsequentRound)]
        );
        assert_eq!(plan.next_state(RoundState::Done), RoundState::Done);
        assert_eq!(RoundPlan::new(0, InputKind::Raw).start(), RoundState::Done);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut job = PageRankJob::new(RankConfig::new(0), Default::default());
        assert!(matches!(job.run(vec![]), Err(JobError::Config(_))));
    }

    #[test]
    fn link_targets_do_not_count_as_input_pages() {
        let mut job = PageRankJob::new(RankConfig::new(2).iterations(1), RuntimeConfig::local(2));
        let report = job.run(vec!["a\tb,c".into(), "b\ta".into()]).unwrap();
        let stats = &report.rounds[0];
        assert_eq!(stats.map.pages, 2);
        assert_eq!(stats.pages_out, 3);
        assert!(!job.num_pages_mismatch(stats));

        let job = PageRankJob::new(RankConfig::new(3), RuntimeConfig::local(1));
        assert!(job.num_pages_mismatch(stats));
    }

    #[test]
    fn cancelled_before_start() {
        let mut job = PageRankJob::new(RankConfig::new(1), Default::default());
        job.cancel_token().cancel();
        let err = job.run(vec!["a\t".into()]).unwrap_err();
        assert!(matches!(err, JobError::Cancelled { round: 1 }));
        assert!(err.is_cancelled());
    }
}

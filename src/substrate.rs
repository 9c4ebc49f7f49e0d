//! Execution of a single round: run the mapper on every input line, group the emissions by key
//! and run the reducer once per key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{Builder, ScopedJoinHandle};

use thiserror::Error;

use crate::batcher::Batcher;
use crate::channel::bounded;
use crate::config::RuntimeConfig;
use crate::operator::{MapOutcome, Mapper, Reducer};
use crate::record::CodecError;
use crate::worker::{map_worker, reduce_worker};

/// Number of batches that can be queued for a reduce worker before the map workers block.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("the round has been cancelled")]
    Cancelled,
    #[error("cannot decode round input: {0}")]
    Codec(#[from] CodecError),
    #[error("worker {0} panicked")]
    WorkerPanicked(String),
    #[error("a reduce worker disconnected before the end of the round")]
    Disconnected,
    #[error("cannot spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Shared flag used to abort a running job.
///
/// Once cancelled, the running round stops at the next record and its partial output is
/// discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters collected by the map side of a round.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapStats {
    /// Lines given to the mapper.
    pub records_in: usize,
    /// Lines that did not describe a page.
    pub skipped: usize,
    /// Pages processed.
    pub pages: usize,
    /// Pages without out-links.
    pub dangling: usize,
    /// Sum of the ranks of the input pages.
    pub rank_in: f64,
    /// Rank mass emitted as contributions.
    pub forwarded: f64,
}

impl MapStats {
    pub(crate) fn record(&mut self, outcome: MapOutcome) {
        self.records_in += 1;
        match outcome {
            MapOutcome::Skipped => self.skipped += 1,
            MapOutcome::Page {
                dangling,
                rank,
                forwarded,
            } => {
                self.pages += 1;
                self.dangling += dangling as usize;
                self.rank_in += rank;
                self.forwarded += forwarded;
            }
        }
    }

    pub(crate) fn merge(&mut self, other: MapStats) {
        self.records_in += other.records_in;
        self.skipped += other.skipped;
        self.pages += other.pages;
        self.dangling += other.dangling;
        self.rank_in += other.rank_in;
        self.forwarded += other.forwarded;
    }
}

/// Everything produced by a completed round.
#[derive(Debug, Clone)]
pub struct RoundOutput<T> {
    /// One reducer output per key, in no particular order.
    pub records: Vec<T>,
    pub map_stats: MapStats,
}

/// Runs one map/reduce round.
///
/// An implementation must deliver all the values emitted for a key to exactly one reducer
/// invocation, and must return only once the whole round is completed: a failed or cancelled
/// round returns an error and no partial output.
pub trait GroupingSubstrate {
    fn execute<M, R>(
        &self,
        input: &[String],
        mapper: &M,
        reducer: &R,
        cancel: &CancelToken,
    ) -> Result<RoundOutput<R::Output>, SubstrateError>
    where
        M: Mapper,
        R: Reducer;
}

/// Runs the rounds in this process with a pool of map workers and a pool of reduce workers.
///
/// The input is split in contiguous chunks, one per map worker. The emissions are partitioned by
/// the hash of their key, so each reduce worker owns a disjoint set of keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSubstrate {
    config: RuntimeConfig,
}

impl LocalSubstrate {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

fn join<T>(
    name: String,
    handle: ScopedJoinHandle<'_, Result<T, SubstrateError>>,
) -> Result<T, SubstrateError> {
    match handle.join() {
        Ok(res) => res,
        Err(_) => Err(SubstrateError::WorkerPanicked(name)),
    }
}

impl GroupingSubstrate for LocalSubstrate {
    fn execute<M, R>(
        &self,
        input: &[String],
        mapper: &M,
        reducer: &R,
        cancel: &CancelToken,
    ) -> Result<RoundOutput<R::Output>, SubstrateError>
    where
        M: Mapper,
        R: Reducer,
    {
        let parallelism = self.config.parallelism.max(1);
        let batch_size = self.config.batch_size.max(1);
        let chunk_size = input.len().div_ceil(parallelism).max(1);

        std::thread::scope(|scope| {
            let (senders, receivers): (Vec<_>, Vec<_>) =
                (0..parallelism).map(|_| bounded(CHANNEL_CAPACITY)).unzip();

            let mut reducers = Vec::with_capacity(parallelism);
            for (id, receiver) in receivers.into_iter().enumerate() {
                let handle = Builder::new()
                    .name(format!("reduce-{id}"))
                    .spawn_scoped(scope, move || reduce_worker(id, receiver, reducer, cancel))
                    .map_err(SubstrateError::Spawn)?;
                reducers.push(handle);
            }

            let mut mappers = Vec::with_capacity(parallelism);
            for (id, lines) in input.chunks(chunk_size).enumerate() {
                let batcher = Batcher::new(senders.clone(), batch_size);
                let handle = Builder::new()
                    .name(format!("map-{id}"))
                    .spawn_scoped(scope, move || map_worker(id, lines, mapper, batcher, cancel))
                    .map_err(SubstrateError::Spawn)?;
                mappers.push(handle);
            }
            // the reduce workers stop when every map worker has dropped its senders
            drop(senders);

            let mut map_stats = MapStats::default();
            let mut first_error = None;
            for (id, handle) in mappers.into_iter().enumerate() {
                match join(format!("map-{id}"), handle) {
                    Ok(stats) => map_stats.merge(stats),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }

            let mut records = Vec::new();
            for (id, handle) in reducers.into_iter().enumerate() {
                match join(format!("reduce-{id}"), handle) {
                    Ok(mut out) => records.append(&mut out),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }

            match first_error {
                Some(e) => Err(e),
                None => Ok(RoundOutput { records, map_stats }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankConfig;
    use crate::operator::{FirstRoundMapper, RankReducer, SubsequentRoundMapper};
    use crate::record::{PageId, RoundValue};

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    /// Reducer that returns the key with every value it received.
    struct Collect;

    impl Reducer for Collect {
        type Output = (PageId, Vec<RoundValue>);

        fn reduce<I>(&self, key: PageId, values: I) -> Self::Output
        where
            I: IntoIterator<Item = RoundValue>,
        {
            (key, values.into_iter().collect())
        }
    }

    #[test]
    fn every_key_reduced_once() {
        let config = RankConfig::new(4);
        let input = lines(&["a\tb,c,d", "b\ta", "c\ta,a", "d\t"]);
        for parallelism in [1, 2, 3, 8] {
            let substrate = LocalSubstrate::new(RuntimeConfig {
                parallelism,
                batch_size: 1,
            });
            let out = substrate
                .execute(
                    &input,
                    &FirstRoundMapper::new(&config),
                    &Collect,
                    &CancelToken::new(),
                )
                .unwrap();
            let mut keys: Vec<_> = out.records.iter().map(|(k, _)| k.clone()).collect();
            keys.sort();
            assert_eq!(keys, vec!["a", "b", "c", "d"]);

            for (key, values) in &out.records {
                let topologies = values
                    .iter()
                    .filter(|v| matches!(v, RoundValue::Topology(_)))
                    .count();
                assert_eq!(topologies, 1, "key {key}");
                if key == "a" {
                    // one from b, two from c
                    assert_eq!(values.len(), 4);
                }
            }
            assert_eq!(out.map_stats.pages, 4);
            assert_eq!(out.map_stats.dangling, 1);
            assert!((out.map_stats.forwarded - 0.75).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_input() {
        let config = RankConfig::new(1);
        let out = LocalSubstrate::new(RuntimeConfig::local(3))
            .execute(
                &[],
                &FirstRoundMapper::new(&config),
                &RankReducer::new(&config),
                &CancelToken::new(),
            )
            .unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.map_stats, MapStats::default());
    }

    #[test]
    fn cancelled_round_has_no_output() {
        let config = RankConfig::new(2);
        let cancel = CancelToken::new();
        cancel.cancel();
        let res = LocalSubstrate::new(RuntimeConfig::local(2)).execute(
            &lines(&["a\tb", "b\ta"]),
            &FirstRoundMapper::new(&config),
            &RankReducer::new(&config),
            &cancel,
        );
        assert!(matches!(res, Err(SubstrateError::Cancelled)));
    }

    #[test]
    fn malformed_state_fails_the_round() {
        let config = RankConfig::new(2);
        let res = LocalSubstrate::new(RuntimeConfig::local(2)).execute(
            &lines(&["a\t0.5\tb", "b\tnot-a-rank\ta"]),
            &SubsequentRoundMapper,
            &RankReducer::new(&config),
            &CancelToken::new(),
        );
        assert!(matches!(res, Err(SubstrateError::Codec(_))));
    }
}

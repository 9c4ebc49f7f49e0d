#![allow(dead_code)] // not all tests use all the members

use log::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use pagerank_mr::record::RankedPage;
use pagerank_mr::RuntimeConfig;

/// Helper functions for running the integration tests.
pub struct TestHelper;

impl TestHelper {
    fn setup() {
        let _ = env_logger::Builder::new()
            .filter(None, log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }

    /// Run the test body once for each parallelism level, with small batches so that the
    /// emissions of a round are split in many messages.
    pub fn local_env<F: Fn(RuntimeConfig)>(body: F) {
        Self::setup();
        for parallelism in [1, 2, 4] {
            let config = RuntimeConfig {
                parallelism,
                batch_size: 3,
            };
            debug!("Running test with runtime: {:?}", config);
            body(config);
        }
    }

    /// Run the test body with a single worker, so that the order of the values reaching each key
    /// is deterministic.
    pub fn sequential_env<F: FnOnce(RuntimeConfig)>(body: F) {
        Self::setup();
        body(RuntimeConfig::local(1));
    }
}

pub fn lines(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

pub fn decode(lines: &[String]) -> Vec<RankedPage> {
    lines
        .iter()
        .map(|l| RankedPage::decode(l).unwrap())
        .collect()
}

pub fn assert_close(actual: f64, expected: f64, eps: f64) {
    assert!(
        (actual - expected).abs() <= eps,
        "expected {expected}, got {actual} (eps {eps})"
    );
}

/// Generate a random graph of `n` pages named `p0..p{n-1}` as raw input lines.
///
/// Every page has between `min_degree` and `max_degree` out-links, possibly repeated.
pub fn random_graph(n: usize, min_degree: usize, max_degree: usize, seed: u64) -> Vec<String> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let degree = rng.random_range(min_degree..=max_degree);
            let links: Vec<String> = (0..degree)
                .map(|_| format!("p{}", rng.random_range(0..n)))
                .collect();
            format!("p{i}\t{}", links.join(","))
        })
        .collect()
}

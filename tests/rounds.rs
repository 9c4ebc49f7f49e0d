use std::collections::HashMap;

use pagerank_mr::iteration::RoundStats;
use pagerank_mr::prelude::*;
use pagerank_mr::record::decode_raw;
use pagerank_mr::{sink, source};
use utils::{decode, lines, random_graph, TestHelper};

mod utils;

#[test]
fn outlinks_never_change() {
    TestHelper::local_env(|runtime| {
        let input = random_graph(60, 0, 4, 3);
        let expected: HashMap<_, _> = input.iter().filter_map(|l| decode_raw(l)).collect();

        let mut snapshots = vec![];
        let report = PageRankJob::new(RankConfig::new(60).iterations(6), runtime)
            .observe(|s| snapshots.push(s.lines.to_vec()))
            .run(input)
            .unwrap();
        assert_eq!(snapshots.len(), 6);

        for round in &snapshots {
            let pages = decode(round);
            assert_eq!(pages.len(), expected.len());
            for page in pages {
                assert_eq!(&page.state.outlinks, &expected[&page.page_id]);
            }
        }
        assert_eq!(report.lines, snapshots[5]);
    });
}

#[test]
fn observer_sees_every_round_in_order() {
    TestHelper::local_env(|runtime| {
        let mut seen: Vec<(usize, MapperKind)> = vec![];
        PageRankJob::new(RankConfig::new(2).iterations(4), runtime)
            .observe(|s| {
                assert_eq!(s.round, s.stats.round);
                seen.push((s.round, s.stats.mapper));
            })
            .run(lines(&["a\tb", "b\ta"]))
            .unwrap();
        assert_eq!(
            seen,
            vec![
                (1, MapperKind::FirstRound),
                (2, MapperKind::SubsequentRound),
                (3, MapperKind::SubsequentRound),
                (4, MapperKind::SubsequentRound),
            ]
        );
    });
}

#[test]
fn resuming_matches_a_single_run() {
    TestHelper::sequential_env(|runtime| {
        let input = random_graph(80, 0, 5, 11);
        let config = RankConfig::new(80);

        let full = PageRankJob::new(config.iterations(5), runtime)
            .run(input.clone())
            .unwrap();

        let first = PageRankJob::new(config.iterations(2), runtime)
            .run(input)
            .unwrap();
        let resumed = PageRankJob::new(config.iterations(3), runtime)
            .run_from(first.lines, InputKind::Ranked)
            .unwrap();

        assert!(resumed
            .rounds
            .iter()
            .all(|s| s.mapper == MapperKind::SubsequentRound));
        assert_eq!(resumed.lines, full.lines);
    });
}

#[test]
fn raw_lines_are_rejected_as_ranked_input() {
    TestHelper::sequential_env(|runtime| {
        let err = PageRankJob::new(RankConfig::new(2).iterations(1), runtime)
            .run_from(lines(&["a\tb", "b\ta"]), InputKind::Ranked)
            .unwrap_err();
        assert!(matches!(err, JobError::Round { round: 1, .. }));
    });
}

#[test]
fn cancelled_job_returns_no_output() {
    TestHelper::local_env(|runtime| {
        let job = PageRankJob::new(RankConfig::new(3).iterations(10), runtime);
        let token = job.cancel_token();
        let mut completed = vec![];
        let res = job
            .observe(|s| {
                completed.push(s.round);
                if s.round == 2 {
                    token.cancel();
                }
            })
            .run(lines(&["A\tB", "B\tC", "C\tA"]));
        let err = res.unwrap_err();
        assert!(err.is_cancelled());
        assert!(matches!(err, JobError::Cancelled { round: 3 }));
        assert_eq!(completed, vec![1, 2]);
    });
}

#[test]
fn round_stats_track_dangling_mass() {
    TestHelper::local_env(|runtime| {
        let report = PageRankJob::new(RankConfig::new(3).iterations(3), runtime)
            .run(lines(&["A\tB", "B\tC", "C\t"]))
            .unwrap();
        let stats: &[RoundStats] = &report.rounds;
        assert_eq!(stats.len(), 3);
        for s in stats {
            assert_eq!(s.map.dangling, 1);
            assert_eq!(s.pages_out, 3);
            assert!(s.map.forwarded < s.map.rank_in);
        }
        // mass only leaks out
        assert!(stats[1].rank_out < stats[0].rank_out);
        assert!(stats[2].rank_out < stats[1].rank_out);
    });
}

#[test]
fn file_round_trip() {
    TestHelper::sequential_env(|runtime| {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("graph.tsv");
        let output_path = dir.path().join("ranks.tsv");
        sink::write_lines(&input_path, ["A\tB", "", "B\tC", "C\tA"]).unwrap();

        let input = source::read_lines(&input_path).unwrap();
        let report = PageRankJob::new(RankConfig::new(3).iterations(4), runtime)
            .run(input)
            .unwrap();
        sink::write_lines(&output_path, &report.lines).unwrap();

        let pages = decode(&source::read_lines(&output_path).unwrap());
        assert_eq!(pages.len(), 3);
        for (page, expected) in pages.iter().zip(["B", "C", "A"]) {
            assert_eq!(page.state.outlinks, vec![expected]);
            assert_eq!(page.state.rank, 0.333333);
        }
    });
}

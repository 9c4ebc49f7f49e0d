//! PageRank computed as a chain of stateless map/reduce rounds.
//!
//! Every round reads one line per page, emits the page topology and the rank contributions of
//! its out-links, groups them by destination page and computes the new rank of each page:
//!
//! ```text
//! rank(p) = (1 - d) / num_pages + d * sum(rank(q) / |outlinks(q)|)   for each q linking to p
//! ```
//!
//! The rank of pages without out-links is not redistributed, so the total rank of a graph with
//! dangling pages drifts below 1.0 round after round.
//!
//! ## Example
//!
//! ```
//! use pagerank_mr::prelude::*;
//!
//! let input = ["a\tb", "b\tc", "c\t"].map(String::from).to_vec();
//! let config = JobConfig::new(RankConfig::new(3).iterations(1), RuntimeConfig::local(2));
//! let report = pagerank(input, config).unwrap();
//! assert_eq!(report.lines[0], "a\t0.050000\tb");
//! ```
#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod config;
pub mod iteration;
pub mod operator;
pub mod record;
pub mod sink;
pub mod source;
pub mod substrate;

mod batcher;
mod channel;
mod worker;

pub use config::{JobConfig, RankConfig, RuntimeConfig};
pub use iteration::{pagerank, JobError, PageRankJob, RunReport};

pub mod prelude {
    pub use crate::config::{JobConfig, RankConfig, RuntimeConfig};
    pub use crate::iteration::{
        pagerank, InputKind, JobError, PageRankJob, RoundPlan, RoundSnapshot, RoundState,
        RunReport,
    };
    pub use crate::operator::{Mapper, MapperKind, Reducer};
    pub use crate::record::{PageState, RankedPage};
    pub use crate::substrate::{CancelToken, GroupingSubstrate, LocalSubstrate};
}

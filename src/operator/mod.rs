//! The two units executed in every round: the mapper and the reducer.
//!
//! Both are pure: a mapper only sees one input line, a reducer only sees the values grouped under
//! one key. Which mapper runs in which round is decided by the
//! [`RoundPlan`](crate::iteration::RoundPlan).

pub use map::*;
pub use reduce::*;

mod map;
mod reduce;

use crate::record::{CodecError, PageId, RoundValue};

/// Destination of the `(key, value)` pairs produced by a mapper.
pub trait Emit {
    fn emit(&mut self, key: PageId, value: RoundValue);
}

impl Emit for Vec<(PageId, RoundValue)> {
    #[inline]
    fn emit(&mut self, key: PageId, value: RoundValue) {
        self.push((key, value));
    }
}

/// What a mapper did with one input line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapOutcome {
    /// The line did not describe a page and nothing was emitted.
    Skipped,
    /// A page was processed.
    Page {
        /// The page has no out-links: its rank was not forwarded to anybody.
        dangling: bool,
        /// Rank the page held when it entered the round.
        rank: f64,
        /// Total rank mass emitted as contributions.
        forwarded: f64,
    },
}

/// The map side of a round.
pub trait Mapper: Send + Sync {
    /// Process one input line, emitting the topology of the page and its contributions.
    fn map<E: Emit>(&self, line: &str, out: &mut E) -> Result<MapOutcome, CodecError>;
}

/// The reduce side of a round, invoked exactly once per key.
pub trait Reducer: Send + Sync {
    type Output: Send;

    fn reduce<I>(&self, key: PageId, values: I) -> Self::Output
    where
        I: IntoIterator<Item = RoundValue>;
}

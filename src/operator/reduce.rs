use crate::config::RankConfig;
use crate::operator::Reducer;
use crate::record::{PageId, PageState, RankedPage, RoundValue};

/// Reducer shared by every round.
///
/// The new rank of a page is `(1 - d) / num_pages + d * sum(contributions)`. The out-links come
/// from the topology record of the page; a key that only received contributions (a page that is
/// linked to but was never listed in the input) gets an empty out-link list.
#[derive(Debug, Clone, Copy)]
pub struct RankReducer {
    damping_factor: f64,
    teleport: f64,
}

impl RankReducer {
    pub fn new(config: &RankConfig) -> Self {
        Self {
            damping_factor: config.damping_factor,
            teleport: config.teleport(),
        }
    }
}

impl Reducer for RankReducer {
    type Output = RankedPage;

    fn reduce<I>(&self, key: PageId, values: I) -> RankedPage
    where
        I: IntoIterator<Item = RoundValue>,
    {
        let mut outlinks = None;
        let mut total_rank = 0.0;
        for value in values {
            match value {
                RoundValue::Topology(links) => {
                    if outlinks.is_some() {
                        warn!("page {key:?} received more than one topology record");
                    }
                    outlinks = Some(links);
                }
                RoundValue::Contribution(c) => total_rank += c,
            }
        }

        let rank = self.teleport + self.damping_factor * total_rank;
        RankedPage::new(key, PageState::new(rank, outlinks.unwrap_or_default()))
    }
}

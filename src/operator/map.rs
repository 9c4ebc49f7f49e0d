use crate::config::RankConfig;
use crate::operator::{Emit, MapOutcome, Mapper};
use crate::record::{decode_raw, CodecError, PageId, RankedPage, RoundValue};

/// Which mapper a round uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapperKind {
    /// Reads raw `page_id<TAB>outlinks` lines and seeds the uniform initial rank.
    FirstRound,
    /// Reads the `page_id<TAB>rank<TAB>outlinks` lines produced by the previous round.
    SubsequentRound,
}

/// Emit the topology of a page followed by one contribution per out-link.
///
/// Duplicated out-links receive one contribution each. A page without out-links emits only its
/// topology: its rank is lost for the next round.
fn emit_page<E: Emit>(
    page_id: PageId,
    rank: f64,
    outlinks: Vec<PageId>,
    out: &mut E,
) -> MapOutcome {
    if outlinks.is_empty() {
        out.emit(page_id, RoundValue::Topology(outlinks));
        return MapOutcome::Page {
            dangling: true,
            rank,
            forwarded: 0.0,
        };
    }

    let contribution = rank / outlinks.len() as f64;
    let mut forwarded = 0.0;
    for link in outlinks.iter() {
        out.emit(link.clone(), RoundValue::Contribution(contribution));
        forwarded += contribution;
    }
    out.emit(page_id, RoundValue::Topology(outlinks));
    MapOutcome::Page {
        dangling: false,
        rank,
        forwarded,
    }
}

/// Mapper of the first round: every page starts with rank `1 / num_pages`.
#[derive(Debug, Clone, Copy)]
pub struct FirstRoundMapper {
    initial_rank: f64,
}

impl FirstRoundMapper {
    pub fn new(config: &RankConfig) -> Self {
        Self {
            initial_rank: config.initial_rank(),
        }
    }
}

impl Mapper for FirstRoundMapper {
    fn map<E: Emit>(&self, line: &str, out: &mut E) -> Result<MapOutcome, CodecError> {
        match decode_raw(line) {
            Some((page_id, outlinks)) => Ok(emit_page(page_id, self.initial_rank, outlinks, out)),
            None => {
                trace!("skipping raw line {line:?}");
                Ok(MapOutcome::Skipped)
            }
        }
    }
}

/// Mapper of every round after the first: the rank comes from the previous round.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsequentRoundMapper;

impl Mapper for SubsequentRoundMapper {
    fn map<E: Emit>(&self, line: &str, out: &mut E) -> Result<MapOutcome, CodecError> {
        if line.trim().is_empty() {
            return Ok(MapOutcome::Skipped);
        }
        let page = RankedPage::decode(line)?;
        Ok(emit_page(page.page_id, page.state.rank, page.state.outlinks, out))
    }
}

/// A mapper selected at runtime by its [`MapperKind`].
#[derive(Debug, Clone, Copy)]
pub enum RoundMapper {
    First(FirstRoundMapper),
    Subsequent(SubsequentRoundMapper),
}

impl RoundMapper {
    pub fn new(kind: MapperKind, config: &RankConfig) -> Self {
        match kind {
            MapperKind::FirstRound => RoundMapper::First(FirstRoundMapper::new(config)),
            MapperKind::SubsequentRound => RoundMapper::Subsequent(SubsequentRoundMapper),
        }
    }

    pub fn kind(&self) -> MapperKind {
        match self {
            RoundMapper::First(_) => MapperKind::FirstRound,
            RoundMapper::Subsequent(_) => MapperKind::SubsequentRound,
        }
    }
}

impl Mapper for RoundMapper {
    #[inline]
    fn map<E: Emit>(&self, line: &str, out: &mut E) -> Result<MapOutcome, CodecError> {
        match self {
            RoundMapper::First(m) => m.map(line, out),
            RoundMapper::Subsequent(m) => m.map(line, out),
        }
    }
}

//! Line-oriented encoding of the records exchanged between rounds.
//!
//! Two kinds of lines exist:
//!
//! - raw input lines, `page_id<TAB>outlinks`, read only by the first round;
//! - page-state lines, `page_id<TAB>rank<TAB>outlinks`, produced by every round and read by the
//!   following one.
//!
//! In both cases `outlinks` is empty or a comma-separated list of page identifiers. Identifiers
//! must not contain tabs or commas: this is not validated.

use std::fmt::{Display, Write};

use thiserror::Error;

/// Separator between the fields of a line.
pub const FIELD_SEPARATOR: char = '\t';
/// Separator between the identifiers of an out-link list.
pub const OUTLINK_SEPARATOR: char = ',';

/// Identifier of a page.
pub type PageId = String;

/// Value emitted by a mapper, tagged with its kind.
///
/// Every page receives exactly one `Topology` per round (from its own mapper invocation) and any
/// number of `Contribution`s (one per incoming edge).
#[derive(Debug, Clone, PartialEq)]
pub enum RoundValue {
    /// The out-link list of the page, re-emitted so that the next round still knows it.
    Topology(Vec<PageId>),
    /// Rank mass forwarded by an in-neighbor.
    Contribution(f64),
}

/// Rank and out-links of a page at the end of a round.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub rank: f64,
    pub outlinks: Vec<PageId>,
}

/// A page together with its state, the unit of output of a round.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPage {
    pub page_id: PageId,
    pub state: PageState,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("missing {field} field in line {line:?}")]
    MissingField { field: &'static str, line: String },
    #[error("invalid rank {value:?} in line {line:?}")]
    InvalidRank { value: String, line: String },
}

/// Split an out-link field. An empty field is an empty list, not a list with an empty id.
pub fn decode_outlinks(field: &str) -> Vec<PageId> {
    if field.is_empty() {
        Vec::new()
    } else {
        field.split(OUTLINK_SEPARATOR).map(str::to_owned).collect()
    }
}

pub fn encode_outlinks(outlinks: &[PageId]) -> String {
    outlinks.join(&OUTLINK_SEPARATOR.to_string())
}

/// Parse a raw input line into its page id and out-links.
///
/// Surrounding whitespace, tabs included, is removed before splitting. Blank lines and lines
/// without a page id yield `None`: they are dropped without signaling any error.
pub fn decode_raw(line: &str) -> Option<(PageId, Vec<PageId>)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut fields = line.split(FIELD_SEPARATOR);
    let page_id = fields.next().filter(|id| !id.is_empty())?;
    let outlinks = fields.next().map(decode_outlinks).unwrap_or_default();
    Some((page_id.to_owned(), outlinks))
}

impl PageState {
    pub fn new(rank: f64, outlinks: Vec<PageId>) -> Self {
        Self { rank, outlinks }
    }

    /// Encode the value part of a page-state line: `"{rank:.6}\t{outlinks}"`.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        // writing to a String cannot fail
        let _ = write!(out, "{:.6}", self.rank);
        out.push(FIELD_SEPARATOR);
        out.push_str(&encode_outlinks(&self.outlinks));
    }

    /// Decode the value part of a page-state line, the inverse of [`PageState::encode`].
    pub fn decode(value: &str) -> Result<Self, CodecError> {
        let (rank, outlinks) = match value.split_once(FIELD_SEPARATOR) {
            Some((rank, outlinks)) => (rank, outlinks),
            None => (value, ""),
        };
        let rank = parse_rank(rank, value)?;
        Ok(Self {
            rank,
            outlinks: decode_outlinks(outlinks),
        })
    }

    pub fn is_dangling(&self) -> bool {
        self.outlinks.is_empty()
    }
}

fn parse_rank(field: &str, line: &str) -> Result<f64, CodecError> {
    let field = field.trim();
    if field.is_empty() {
        return Err(CodecError::MissingField {
            field: "rank",
            line: line.to_owned(),
        });
    }
    field.parse().map_err(|_| CodecError::InvalidRank {
        value: field.to_owned(),
        line: line.to_owned(),
    })
}

impl RankedPage {
    pub fn new(page_id: impl Into<PageId>, state: PageState) -> Self {
        Self {
            page_id: page_id.into(),
            state,
        }
    }

    /// Encode the full page-state line `page_id<TAB>rank<TAB>outlinks`.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.page_id.len() + 16);
        out.push_str(&self.page_id);
        out.push(FIELD_SEPARATOR);
        self.state.write_to(&mut out);
        out
    }

    /// Decode a full page-state line.
    pub fn decode(line: &str) -> Result<Self, CodecError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let (page_id, value) = line
            .split_once(FIELD_SEPARATOR)
            .ok_or_else(|| CodecError::MissingField {
                field: "rank",
                line: line.to_owned(),
            })?;
        if page_id.is_empty() {
            return Err(CodecError::MissingField {
                field: "page_id",
                line: line.to_owned(),
            });
        }
        Ok(Self {
            page_id: page_id.to_owned(),
            state: PageState::decode(value)?,
        })
    }
}

impl Display for RankedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

//! Reading the input of a job.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read every line of a text file, without the line terminators.
///
/// Blank lines are kept: the first-round mapper skips them.
pub fn read_lines<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let lines = read_from(BufReader::new(file))?;
    debug!("read {} lines from {}", lines.len(), path.display());
    Ok(lines)
}

/// Read every line from a reader, without the line terminators.
pub fn read_from<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    reader.lines().collect()
}

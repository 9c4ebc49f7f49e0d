//! Writing the output of a job.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write the lines to a file, one per line, replacing its content.
pub fn write_lines<P, I, S>(path: P, lines: I) -> std::io::Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let file = File::create(path)?;
    let count = write_to(BufWriter::new(file), lines)?;
    debug!("wrote {count} lines to {}", path.display());
    Ok(())
}

/// Write the lines to `writer`, one per line, and flush it. Returns the number of lines written.
pub fn write_to<W, I, S>(mut writer: W, lines: I) -> std::io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut count = 0;
    for line in lines {
        writer.write_all(line.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

//! Reading raw items from disk.
//!
//! JSON Lines input is parsed one record at a time so the reducer never sees
//! more than a single pending item. A JSON array has to be read whole.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use anyhow::anyhow;
use opmon_core::RawItem;

/// Lazily parsed JSON Lines records.
pub(crate) struct JsonLines<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = anyhow::Result<RawItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(anyhow!("failed to read line {}: {e}", self.line_no))),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(&line)
                    .map_err(|e| anyhow!("invalid item on line {}: {e}", self.line_no)),
            );
        }
    }
}

/// Items from one input, in file order.
pub(crate) enum Items<R> {
    Array(std::vec::IntoIter<RawItem>),
    Lines(JsonLines<R>),
}

impl<R: BufRead> Iterator for Items<R> {
    type Item = anyhow::Result<RawItem>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Array(items) => items.next().map(Ok),
            Self::Lines(lines) => lines.next(),
        }
    }
}

/// Skip leading whitespace. Returns whether a JSON array follows and how
/// many newlines were skipped.
fn peek_array<R: BufRead>(reader: &mut R) -> std::io::Result<(bool, usize)> {
    let mut newlines = 0;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok((false, newlines));
        }
        let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
        newlines += buf[..skip].iter().filter(|b| **b == b'\n').count();
        if skip < buf.len() {
            let opens_array = buf[skip] == b'[';
            reader.consume(skip);
            return Ok((opens_array, newlines));
        }
        let len = buf.len();
        reader.consume(len);
    }
}

/// Parse items from either a JSON array or JSON Lines.
///
/// Blank lines in JSON Lines input are skipped; a bad record is reported
/// with its line number when the iterator reaches it.
///
/// # Errors
///
/// Returns an error if the input cannot be read or a JSON array fails to
/// parse.
pub(crate) fn items_from_reader<R: BufRead>(mut reader: R) -> anyhow::Result<Items<R>> {
    let (is_array, skipped) =
        peek_array(&mut reader).map_err(|e| anyhow!("failed to read input: {e}"))?;
    if is_array {
        let items: Vec<RawItem> = serde_json::from_reader(reader)
            .map_err(|e| anyhow!("invalid JSON array of items: {e}"))?;
        return Ok(Items::Array(items.into_iter()));
    }
    Ok(Items::Lines(JsonLines {
        lines: reader.lines(),
        line_no: skipped,
    }))
}

/// Open an input file for streaming.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a JSON array fails to
/// parse.
pub(crate) fn open_items(path: &Path) -> anyhow::Result<Items<BufReader<File>>> {
    let file = File::open(path).map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    let items = items_from_reader(BufReader::new(file))?;
    let format = match items {
        Items::Array(_) => "json",
        Items::Lines(_) => "jsonl",
    };
    tracing::info!(path = %path.display(), format, "reading items");
    Ok(items)
}

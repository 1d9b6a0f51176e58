//! Run identifier sequencing from the tail of the existing log.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// First field of the header row.
pub const HEADER_SENTINEL: &str = "Iter";

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("failed to read log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("last line of {} is neither a header nor a data row: {line:?}", path.display())]
    MalformedLogTail { path: PathBuf, line: String },
}

/// Returns the run identifier for this execution.
///
/// An absent or empty log, or one whose last line is the header, starts at 1.
/// Otherwise the leading field of the last line is incremented.
pub fn next_run_id(path: &Path) -> Result<u64, SequenceError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Log does not exist yet, starting at run 1");
            return Ok(1);
        }
        Err(source) => {
            return Err(SequenceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let last = last_line(BufReader::new(file)).map_err(|source| SequenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match last {
        None => Ok(1),
        Some(line) => match parse_run_id(&line) {
            Some(RunTail::Header) => Ok(1),
            Some(RunTail::Run(id)) => id.checked_add(1).ok_or(SequenceError::MalformedLogTail {
                path: path.to_path_buf(),
                line,
            }),
            None => Err(SequenceError::MalformedLogTail {
                path: path.to_path_buf(),
                line,
            }),
        },
    }
}

/// What the leading field of a log line denotes.
#[derive(Debug, PartialEq, Eq)]
pub enum RunTail {
    Header,
    Run(u64),
}

/// Interprets the first comma-delimited field of a log line.
pub fn parse_run_id(line: &str) -> Option<RunTail> {
    let field = line.split(',').next().unwrap_or_default().trim().trim_matches('"');
    if field == HEADER_SENTINEL {
        return Some(RunTail::Header);
    }
    field.parse::<u64>().ok().map(RunTail::Run)
}

/// Streams `reader` and keeps only the last non-blank line.
fn last_line<R: BufRead>(mut reader: R) -> io::Result<Option<String>> {
    let mut buf = String::new();
    let mut last: Option<String> = None;
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        let line = buf.trim_end_matches(['\r', '\n']);
        if !line.trim().is_empty() {
            match last.as_mut() {
                Some(existing) => {
                    existing.clear();
                    existing.push_str(line);
                }
                None => last = Some(line.to_string()),
            }
        }
    }
    Ok(last)
}

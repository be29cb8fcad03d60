//! Offset tracking and line reading for appended log content

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::LogwatchError;

/// Upper bound on bytes consumed from one file in one cycle
pub const DEFAULT_MAX_READ_BYTES: u64 = 8 * 1024 * 1024;

/// Lines appended to a file since a recorded offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLines {
    /// Complete lines in file order, terminators stripped
    pub lines: Vec<String>,
    /// Byte offset immediately after the last complete line consumed
    pub new_offset: u64,
    /// The file shrank below the recorded offset and was re-read from 0
    pub rotated: bool,
    /// Bytes past `new_offset` left for a later call
    pub pending: u64,
}

/// Read every complete line appended to `path` since `last_offset`, up to
/// `DEFAULT_MAX_READ_BYTES`.
pub fn read_new_lines(path: &Path, last_offset: u64) -> crate::Result<NewLines> {
    read_new_lines_capped(path, last_offset, DEFAULT_MAX_READ_BYTES)
}

/// Read complete lines appended to `path` since `last_offset`, consuming at
/// most `max_bytes`.
///
/// A file smaller than `last_offset` has been truncated or rotated; reading
/// restarts at offset 0 and `rotated` is set. A trailing line without a `\n`
/// is left for the next call and not counted in `new_offset`, unless that
/// line alone is longer than `max_bytes`; it is then split at the cap so the
/// offset keeps moving.
pub fn read_new_lines_capped(
    path: &Path,
    last_offset: u64,
    max_bytes: u64,
) -> crate::Result<NewLines> {
    let unavailable = |source| LogwatchError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unavailable)?;
    let current_size = file.metadata().map_err(unavailable)?.len();

    let rotated = current_size < last_offset;
    let start = if rotated { 0 } else { last_offset };
    let available = current_size - start;
    let limit = available.min(max_bytes.max(1));

    file.seek(SeekFrom::Start(start)).map_err(unavailable)?;
    let mut reader = BufReader::new(file.take(limit));

    let mut lines = Vec::new();
    let mut consumed = 0u64;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).map_err(unavailable)?;
        if n == 0 {
            break;
        }
        match buf.strip_suffix(b"\n") {
            Some(line) => lines.push(decode_line(line)),
            None if consumed == 0 && limit < available => {
                lines.push(decode_line(&buf));
            }
            None => break,
        }
        consumed += n as u64;
    }

    let new_offset = start + consumed;
    tracing::trace!(
        "Read {:?}: size={}, start={}, consumed={}, lines={}",
        path,
        current_size,
        start,
        consumed,
        lines.len()
    );

    Ok(NewLines {
        lines,
        new_offset,
        rotated,
        pending: current_size - new_offset,
    })
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

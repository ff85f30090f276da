use crate::output::{replace_file, SinkError};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

pub fn append_with_rotation(path: &Path, block: &str, max_lines: usize) -> Result<(), SinkError> {
    let raw = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(source) => {
            return Err(SinkError::Write {
                path: path.display().to_string(),
                source,
            })
        }
    };
    let existing = String::from_utf8_lossy(&raw);

    let mut lines: Vec<&str> = existing.lines().collect();
    let before = lines.len();
    lines.extend(block.lines());
    let kept = rotate(&lines, max_lines);
    debug!(
        path = %path.display(),
        existing = before,
        kept = kept.len(),
        max_lines,
        "rotating health log"
    );

    let mut body = kept.join("\n");
    if !kept.is_empty() {
        body.push('\n');
    }
    replace_file(path, body.as_bytes())
}

// Keeps the newest `max_lines` lines. A block cut by the limit is dropped
// unless the newest block alone exceeds it.
pub fn rotate<'a>(lines: &[&'a str], max_lines: usize) -> Vec<&'a str> {
    if lines.len() <= max_lines {
        return lines.to_vec();
    }
    let start = lines.len() - max_lines;
    let tail = &lines[start..];
    if lines[start - 1].trim().is_empty() {
        return tail.to_vec();
    }
    match tail.iter().position(|l| l.trim().is_empty()) {
        Some(pos) if pos + 1 < tail.len() => tail[pos + 1..].to_vec(),
        _ => tail.to_vec(),
    }
}

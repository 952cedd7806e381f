//! Append-only transcript persistence.
//!
//! Chat turns are appended to a JSONL (JSON Lines) file with file locking,
//! matching the transcript's own semantics: it only ever grows, and no turn
//! is edited or retracted after the fact.

use crate::{ChatTurn, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Turn sink trait for persisting transcript turns
pub trait TurnSink {
    fn append(&mut self, turn: &ChatTurn) -> Result<()>;
}

/// JSONL-based transcript sink with file locking
pub struct JsonlTranscript {
    path: PathBuf,
}

impl JsonlTranscript {
    /// Create a new JSONL transcript for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TurnSink for JsonlTranscript {
    fn append(&mut self, turn: &ChatTurn) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(turn)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;
        Ok(())
    }
}

/// Read all turns from a transcript file
///
/// Unparseable lines are skipped with a warning so one bad line doesn't
/// discard the rest of the conversation.
pub fn read_turns(path: &Path) -> Result<Vec<ChatTurn>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut turns = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ChatTurn>(&line) {
            Ok(turn) => turns.push(turn),
            Err(e) => {
                tracing::warn!("Failed to parse transcript line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatRole;

    #[test]
    fn test_append_and_read_turns() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("chat.jsonl");

        let mut sink = JsonlTranscript::new(&path);
        sink.append(&ChatTurn::user("make week 3 easier")).unwrap();
        sink.append(&ChatTurn::model("Done, week 3 is now easier."))
            .unwrap();

        let turns = read_turns(&path).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[1].role, ChatRole::Model);
    }

    #[test]
    fn test_read_missing_transcript() {
        let temp_dir = tempfile::tempdir().unwrap();
        let turns = read_turns(&temp_dir.path().join("none.jsonl")).unwrap();
        assert!(turns.is_empty());
    }

    #[test]
    fn test_bad_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("chat.jsonl");

        let mut sink = JsonlTranscript::new(&path);
        sink.append(&ChatTurn::user("hello")).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "this is not json").unwrap();

        sink.append(&ChatTurn::model("hi")).unwrap();

        let turns = read_turns(&path).unwrap();
        assert_eq!(turns.len(), 2);
    }
}

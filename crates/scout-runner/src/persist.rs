// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use scout_core::Conversation;

/// Write `contents` to `path` through a temp file in the same directory, so
/// readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("creating dir {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("writing temp file for {}", path.display()))?;
    tmp.as_file().sync_all().ok();
    tmp.persist(path).with_context(|| format!("renaming temp file to {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "artifact written");
    Ok(())
}

/// Conversation as JSONL, one `{role, content}` object per line.
pub fn write_transcript(path: &Path, conversation: &Conversation) -> anyhow::Result<()> {
    write_atomic(path, &conversation.to_jsonl()).context("writing transcript")
}

#[cfg(test)]
mod tests {
    use scout_model::Message;

    use super::*;

    #[test]
    fn creates_parent_dirs_and_writes_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specs/nested/plan.md");
        write_atomic(&path, "# Plan\n\nno trailing newline").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Plan\n\nno trailing newline");
    }

    #[test]
    fn replaces_existing_file_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.md");
        write_atomic(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn transcript_is_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let mut c = Conversation::new();
        c.push(Message::system("sys"));
        c.push(Message::assistant("<final_answer>x</final_answer>"));
        write_transcript(&path, &c).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["role"], "assistant");
        assert_eq!(lines[1]["content"], "<final_answer>x</final_answer>");
    }
}

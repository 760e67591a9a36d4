//! Append-only JSONL conversation threads.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{validate_name, Message};

const MESSAGES_FILE: &str = "messages.jsonl";

/// Thread logs rooted at a `conversations/` directory.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn thread_path(&self, thread_id: &str) -> Result<PathBuf> {
        validate_name("thread id", thread_id)?;
        Ok(self.dir.join(thread_id).join(MESSAGES_FILE))
    }

    /// Load every message of a thread in append order. A thread that was
    /// never written is empty.
    pub fn load(&self, thread_id: &str) -> Result<Vec<Message>> {
        let path = self.thread_path(thread_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open thread {}", path.display()))?;
        let mut messages = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let message: Message = serde_json::from_str(line).with_context(|| {
                format!("Malformed message on line {} of {}", idx + 1, path.display())
            })?;
            messages.push(message);
        }
        Ok(messages)
    }

    /// Append one message to a thread, creating the thread on first write.
    pub fn append(&self, thread_id: &str, message: &Message) -> Result<()> {
        let path = self.thread_path(thread_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(message)
            .map_err(|e| anyhow::anyhow!("Failed to serialize message: {e}"))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open thread {}", path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Thread ids that have at least one stored message, sorted.
    pub fn threads(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().join(MESSAGES_FILE).is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Short random thread id.
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

//! Conversation transcript files under `~/.gpt_cmd/.convos/`.
//!
//! File name: `[<name>_]<YYYY-MM-DD_HH-MM-SS>.json`, where `<name>` is the
//! first conversation name the model assigned during the run. Each save
//! rewrites the whole file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use regex::Regex;
use tracing::debug;

use crate::core::types::Message;

/// Timestamp format used in transcript file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Longest model-assigned name kept in a file name. Leaves room for the
/// `_<timestamp>.json.tmp` suffix under the usual 255-byte file name limit.
pub const MAX_NAME_LEN: usize = 100;

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Where (and under which name) the transcript of one run is saved.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
    timestamp: String,
    name: Option<String>,
}

impl TranscriptStore {
    pub fn new(dir: &Path, started_at: DateTime<Local>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            timestamp: started_at.format(TIMESTAMP_FORMAT).to_string(),
            name: None,
        }
    }

    /// Record the model-assigned name unless one was already recorded.
    ///
    /// Names that sanitize to nothing are ignored.
    pub fn name_once(&mut self, raw: &str) {
        if self.name.is_some() {
            return;
        }
        if let Some(name) = sanitize_name(raw) {
            debug!(name = %name, "conversation name assigned");
            self.name = Some(name);
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> PathBuf {
        let file_name = match &self.name {
            Some(name) => format!("{name}_{}.json", self.timestamp),
            None => format!("{}.json", self.timestamp),
        };
        self.dir.join(file_name)
    }

    /// Write the full transcript as indented JSON, replacing any earlier save.
    pub fn save(&self, messages: &[Message]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create directory {}", self.dir.display()))?;
        let path = self.path();
        let mut buf = serde_json::to_string_pretty(messages).context("serialize transcript")?;
        buf.push('\n');
        write_atomic(&path, &buf)?;
        debug!(path = %path.display(), messages = messages.len(), "transcript saved");
        Ok(path)
    }
}

/// Read a saved transcript back.
pub fn load_transcript(path: &Path) -> Result<Vec<Message>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let messages =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(messages)
}

/// Make a model-supplied name safe to embed in a file name.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`, leading dots are dropped
/// and the result is cut to [`MAX_NAME_LEN`] bytes.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let replaced = UNSAFE_NAME_CHARS.replace_all(raw.trim(), "_");
    let name = replaced.trim_start_matches('.');
    // only ASCII is left, so any byte index is a char boundary
    let name = &name[..name.len().min(MAX_NAME_LEN)];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp transcript {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

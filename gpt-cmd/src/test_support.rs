//! Test-only scripted collaborators for driving the agent loop.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use chrono::{Local, TimeZone};
use tempfile::TempDir;

use crate::core::transcript::Transcript;
use crate::core::types::{CommandResult, Message};
use crate::io::completion::CompletionClient;
use crate::io::confirm::Confirmer;
use crate::io::process::CommandExecutor;
use crate::io::transcript::TranscriptStore;

/// Completion client that replays canned replies in order.
///
/// Every request's transcript is recorded. Running out of replies is an error,
/// standing in for a failed API call.
pub struct ScriptedClient {
    replies: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(str::to_string).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Transcripts sent so far, one per request.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.borrow().clone()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        self.requests.borrow_mut().push(messages.to_vec());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted client has no more replies"))
    }
}

/// Canned output for one command run.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub stdout: String,
    pub exit_code: i32,
}

/// Successful run printing `stdout`.
pub fn ok(stdout: &str) -> ScriptedRun {
    ScriptedRun {
        stdout: stdout.to_string(),
        exit_code: 0,
    }
}

/// Failed run printing `stdout`.
pub fn failed(stdout: &str, exit_code: i32) -> ScriptedRun {
    ScriptedRun {
        stdout: stdout.to_string(),
        exit_code,
    }
}

/// Executor that returns canned results in order and records what ran.
pub struct ScriptedExecutor {
    runs: RefCell<VecDeque<ScriptedRun>>,
    ran: RefCell<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            ran: RefCell::new(Vec::new()),
        }
    }

    pub fn ran(&self) -> Vec<String> {
        self.ran.borrow().clone()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn run(&self, command: &str) -> Result<CommandResult> {
        let run = self
            .runs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted executor has no result for {command:?}"))?;
        self.ran.borrow_mut().push(command.to_string());
        Ok(CommandResult {
            command: command.to_string(),
            stdout: run.stdout,
            exit_code: run.exit_code,
        })
    }
}

/// Confirmer that answers from a fixed list.
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    asked: Cell<u32>,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            asked: Cell::new(0),
        }
    }

    pub fn asked(&self) -> u32 {
        self.asked.get()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, _question: &str) -> Result<bool> {
        self.asked.set(self.asked.get() + 1);
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted confirmer has no more answers"))
    }
}

/// Temporary transcript directory with a fixed run-start time.
pub struct TempConvos {
    _temp: TempDir,
    dir: PathBuf,
}

impl TempConvos {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join(".convos");
        Ok(Self { _temp: temp, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store(&self) -> TranscriptStore {
        let started_at = Local
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .single()
            .unwrap_or_else(Local::now);
        TranscriptStore::new(&self.dir, started_at)
    }
}

/// Deterministic opening transcript for `goal`.
pub fn opening(goal: &str) -> Transcript {
    Transcript::start(
        "reply with json",
        format!("{goal}\nSystem info:\nOS: linux\nArchitecture: x86_64"),
    )
}

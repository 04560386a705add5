//! The agent loop: ask the model, run what it proposes, report back, repeat.
//!
//! Each turn sends the whole transcript to the [`CompletionClient`], appends the
//! raw reply, and acts on it:
//!
//! - a status ends the run (`success` or anything else),
//! - commands run in order behind a confirmation, stopping after the first
//!   non-zero exit, and their results become the next user message,
//! - a reply with neither is a protocol violation and ends the run.
//!
//! The loop has no iteration cap and no timeout. It never exits the process;
//! it returns a [`LoopOutcome`] and the caller maps it to an exit code.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::batch::{BatchProgress, BatchResults};
use crate::core::reply::{GoalStatus, ReplyAction, parse_reply};
use crate::core::transcript::Transcript;
use crate::core::types::{Message, Outcome};
use crate::io::completion::CompletionClient;
use crate::io::confirm::Confirmer;
use crate::io::console::Console;
use crate::io::process::CommandExecutor;
use crate::io::transcript::TranscriptStore;

pub const CONFIRM_QUESTION: &str = "OK to run command?";

#[derive(Debug, Clone, Default)]
pub struct LoopOptions {
    /// Run commands without asking for confirmation.
    pub skip_prompts: bool,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub outcome: Outcome,
    /// Number of completion requests made.
    pub turns: u32,
    pub transcript: Transcript,
    /// Where the transcript was saved, if saving succeeded.
    pub saved_to: Option<PathBuf>,
}

/// Why a run stopped before reaching an outcome.
enum Abort {
    /// The model could not be reached. Nothing is saved.
    Completion(anyhow::Error),
    /// A local failure after the run started.
    Local(anyhow::Error),
}

impl From<anyhow::Error> for Abort {
    fn from(err: anyhow::Error) -> Self {
        Self::Local(err)
    }
}

enum BatchEnd {
    Completed(BatchResults),
    Declined,
}

pub struct AgentLoop<'a, C, E, P, W: Write> {
    client: &'a C,
    executor: &'a E,
    confirmer: &'a P,
    console: &'a mut Console<W>,
    store: TranscriptStore,
    options: LoopOptions,
}

impl<'a, C, E, P, W> AgentLoop<'a, C, E, P, W>
where
    C: CompletionClient,
    E: CommandExecutor,
    P: Confirmer,
    W: Write,
{
    pub fn new(
        client: &'a C,
        executor: &'a E,
        confirmer: &'a P,
        console: &'a mut Console<W>,
        store: TranscriptStore,
        options: LoopOptions,
    ) -> Self {
        Self {
            client,
            executor,
            confirmer,
            console,
            store,
            options,
        }
    }

    /// Drive turns until the model reports a status, the user declines a
    /// command, or a reply violates the protocol.
    ///
    /// Errors from the completion client abort the run without saving. Any
    /// other error (console, confirmation, executor) saves the transcript
    /// before it propagates.
    #[instrument(skip_all, fields(skip_prompts = self.options.skip_prompts))]
    pub fn run(mut self, goal: &str, mut transcript: Transcript) -> Result<LoopOutcome> {
        let mut turns = 0u32;
        match self.drive(goal, &mut transcript, &mut turns) {
            Ok(outcome) => Ok(self.finish(outcome, turns, transcript)),
            Err(Abort::Completion(err)) => Err(err),
            Err(Abort::Local(err)) => {
                warn!(turn = turns, err = %format!("{err:#}"), "run interrupted");
                self.save(&transcript);
                Err(err)
            }
        }
    }

    fn drive(
        &mut self,
        goal: &str,
        transcript: &mut Transcript,
        turns: &mut u32,
    ) -> Result<Outcome, Abort> {
        self.console.goal(goal)?;

        loop {
            *turns += 1;
            self.console.turn_separator()?;

            let raw = self
                .client
                .complete(transcript.messages())
                .context("request completion")
                .map_err(Abort::Completion)?;
            let parsed = parse_reply(&raw);
            transcript.push(Message::assistant(raw));

            let reply = match parsed {
                Ok(reply) => reply,
                Err(err) => {
                    if let Some(name) = err.convo_file_name() {
                        self.store.name_once(name);
                    }
                    warn!(turn = *turns, err = %err, "protocol violation");
                    self.console.error(&format!("ERROR: {err}"))?;
                    return Ok(Outcome::ProtocolError);
                }
            };

            if let Some(name) = &reply.convo_file_name {
                self.store.name_once(name);
            }

            match reply.action {
                ReplyAction::Finish(status) => {
                    let outcome = match status {
                        GoalStatus::Success => {
                            self.console.success_banner()?;
                            Outcome::Success
                        }
                        GoalStatus::Failure => {
                            self.console.failure_banner()?;
                            Outcome::Failure
                        }
                    };
                    if let Some(context) = &reply.context {
                        self.console.final_context(context)?;
                    }
                    return Ok(outcome);
                }
                ReplyAction::Run(commands) => {
                    if let Some(context) = &reply.context {
                        self.console.batch_context(context)?;
                    }
                    match self.run_batch(&commands)? {
                        BatchEnd::Completed(results) => {
                            debug!(
                                turn = *turns,
                                proposed = commands.len(),
                                ran = results.results().len(),
                                "batch finished"
                            );
                            let message = results
                                .to_message()
                                .context("serialize command results")?;
                            transcript.push(message);
                        }
                        BatchEnd::Declined => {
                            info!(turn = *turns, "user declined command");
                            return Ok(Outcome::UserDeclined);
                        }
                    }
                }
            }
        }
    }

    fn save(&self, transcript: &Transcript) -> Option<PathBuf> {
        match self.store.save(transcript.messages()) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "failed to save transcript");
                None
            }
        }
    }

    fn run_batch(&mut self, commands: &[String]) -> Result<BatchEnd> {
        let mut batch = BatchResults::new();
        for (index, command) in commands.iter().enumerate() {
            if index > 0 {
                self.console.blank_line()?;
            }
            self.console.command(command)?;

            if !self.options.skip_prompts && !self.confirmer.confirm(CONFIRM_QUESTION)? {
                return Ok(BatchEnd::Declined);
            }

            let result = self
                .executor
                .run(command)
                .with_context(|| format!("run command {command:?}"))?;
            self.console.exit_code(result.exit_code)?;
            if !result.stdout.is_empty() {
                self.console.command_output(&result.stdout)?;
            }

            if batch.record(result) == BatchProgress::Stop {
                break;
            }
        }
        Ok(BatchEnd::Completed(batch))
    }

    /// Save the transcript (best effort) and build the outcome.
    fn finish(&self, outcome: Outcome, turns: u32, transcript: Transcript) -> LoopOutcome {
        let saved_to = self.save(&transcript);
        info!(?outcome, turns, messages = transcript.len(), "loop finished");
        LoopOutcome {
            outcome,
            turns,
            transcript,
            saved_to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CommandResult, Role};
    use crate::io::transcript::load_transcript;
    use crate::test_support::{
        ScriptedClient, ScriptedConfirmer, ScriptedExecutor, TempConvos, ok, opening,
    };

    struct Run {
        outcome: LoopOutcome,
        output: String,
    }

    fn run_with(
        client: &ScriptedClient,
        executor: &ScriptedExecutor,
        confirmer: &ScriptedConfirmer,
        convos: &TempConvos,
        options: LoopOptions,
    ) -> Result<Run> {
        let mut console = Console::new(Vec::new());
        let outcome = AgentLoop::new(
            client,
            executor,
            confirmer,
            &mut console,
            convos.store(),
            options,
        )
        .run("list files", opening("list files"))?;
        let output = String::from_utf8(console.into_inner()).expect("utf8");
        Ok(Run { outcome, output })
    }

    #[test]
    fn success_status_ends_run_and_saves() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(vec![r#"{"status":"success","context":"done"}"#]);
        let executor = ScriptedExecutor::new(Vec::new());
        let confirmer = ScriptedConfirmer::new(Vec::new());

        let run = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .expect("run");

        assert_eq!(run.outcome.outcome, Outcome::Success);
        assert_eq!(run.outcome.turns, 1);
        assert!(run.output.contains("Goal successfully achieved."));
        assert!(run.output.contains("done"));
        let saved = run.outcome.saved_to.expect("saved");
        assert_eq!(
            load_transcript(&saved).expect("load"),
            run.outcome.transcript.messages()
        );
    }

    #[test]
    fn failure_status_ends_run() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(vec![r#"{"status":"failure","context":"no disk"}"#]);
        let executor = ScriptedExecutor::new(Vec::new());
        let confirmer = ScriptedConfirmer::new(Vec::new());

        let run = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .expect("run");

        assert_eq!(run.outcome.outcome, Outcome::Failure);
        assert!(run.output.contains("Goal failed."));
        assert!(run.output.contains("no disk"));
    }

    #[test]
    fn commands_run_and_results_feed_next_turn() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(vec![
            r#"{"commands":["ls"],"context":"listing","convo-file-name":"list-files"}"#,
            r#"{"status":"success"}"#,
        ]);
        let executor = ScriptedExecutor::new(vec![ok("Cargo.toml\nsrc")]);
        let confirmer = ScriptedConfirmer::new(vec![true]);

        let run = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .expect("run");

        assert_eq!(run.outcome.outcome, Outcome::Success);
        assert_eq!(executor.ran(), vec!["ls"]);
        assert_eq!(confirmer.asked(), 1);
        assert!(run.output.contains("Context:"));
        assert!(run.output.contains("listing"));

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        let last = requests[1].last().expect("message");
        assert_eq!(last.role, Role::User);
        let results: Vec<CommandResult> = serde_json::from_str(&last.content).expect("results");
        assert_eq!(
            results,
            vec![CommandResult {
                command: "ls".to_string(),
                stdout: "Cargo.toml\nsrc".to_string(),
                exit_code: 0,
            }]
        );

        let saved = run.outcome.saved_to.expect("saved");
        let file_name = saved.file_name().expect("file name").to_string_lossy();
        assert!(file_name.starts_with("list-files_"), "{file_name}");
    }

    #[test]
    fn empty_reply_is_protocol_error() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(vec!["{}"]);
        let executor = ScriptedExecutor::new(Vec::new());
        let confirmer = ScriptedConfirmer::new(Vec::new());

        let run = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .expect("run");

        assert_eq!(run.outcome.outcome, Outcome::ProtocolError);
        assert!(run.output.contains("ERROR:"));
        assert!(run.outcome.saved_to.is_some());
        assert_eq!(run.outcome.transcript.len(), 3);
    }

    #[test]
    fn malformed_reply_is_protocol_error() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(vec!["I will now run ls"]);
        let executor = ScriptedExecutor::new(Vec::new());
        let confirmer = ScriptedConfirmer::new(Vec::new());

        let run = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .expect("run");

        assert_eq!(run.outcome.outcome, Outcome::ProtocolError);
        let last = run.outcome.transcript.messages().last().expect("message");
        assert_eq!(last, &Message::assistant("I will now run ls"));
    }

    #[test]
    fn declined_command_is_not_run() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(vec![r#"{"commands":["rm -rf target"]}"#]);
        let executor = ScriptedExecutor::new(Vec::new());
        let confirmer = ScriptedConfirmer::new(vec![false]);

        let run = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .expect("run");

        assert_eq!(run.outcome.outcome, Outcome::UserDeclined);
        assert!(executor.ran().is_empty());
        assert!(run.outcome.saved_to.is_some());
        // system, goal, assistant; no results message for the abandoned batch
        assert_eq!(run.outcome.transcript.len(), 3);
    }

    #[test]
    fn skip_prompts_never_asks() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(vec![
            r#"{"commands":["pwd","whoami"]}"#,
            r#"{"status":"success"}"#,
        ]);
        let executor = ScriptedExecutor::new(vec![ok("/home/dev"), ok("dev")]);
        let confirmer = ScriptedConfirmer::new(Vec::new());

        let run = run_with(
            &client,
            &executor,
            &confirmer,
            &convos,
            LoopOptions { skip_prompts: true },
        )
        .expect("run");

        assert_eq!(run.outcome.outcome, Outcome::Success);
        assert_eq!(confirmer.asked(), 0);
        assert_eq!(executor.ran(), vec!["pwd", "whoami"]);
    }

    #[test]
    fn confirmation_error_saves_before_propagating() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(vec![
            r#"{"commands":["ls"],"convo-file-name":"list-files"}"#,
        ]);
        let executor = ScriptedExecutor::new(Vec::new());
        let confirmer = ScriptedConfirmer::new(Vec::new());

        let err = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .err()
            .expect("error");

        assert!(format!("{err:#}").contains("no more answers"));
        assert!(executor.ran().is_empty());
        let saved = convos
            .dir()
            .join("list-files_2024-01-02_03-04-05.json");
        // system, goal, assistant
        assert_eq!(load_transcript(&saved).expect("load").len(), 3);
    }

    #[test]
    fn overlong_model_name_still_saves() {
        let convos = TempConvos::new().expect("convos");
        let reply = format!(
            r#"{{"status":"success","convo-file-name":"{}"}}"#,
            "a".repeat(300)
        );
        let client = ScriptedClient::new(vec![reply.as_str()]);
        let executor = ScriptedExecutor::new(Vec::new());
        let confirmer = ScriptedConfirmer::new(Vec::new());

        let run = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .expect("run");

        assert_eq!(run.outcome.outcome, Outcome::Success);
        let saved = run.outcome.saved_to.expect("saved");
        assert!(saved.is_file());
    }

    #[test]
    fn completion_error_aborts_without_saving() {
        let convos = TempConvos::new().expect("convos");
        let client = ScriptedClient::new(Vec::new());
        let executor = ScriptedExecutor::new(Vec::new());
        let confirmer = ScriptedConfirmer::new(Vec::new());

        let err = run_with(&client, &executor, &confirmer, &convos, LoopOptions::default())
            .err()
            .expect("error");

        assert!(format!("{err:#}").contains("request completion"));
        assert!(!convos.dir().exists());
    }
}

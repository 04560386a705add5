//! `gpt_cmd`: accomplish a goal by letting a language model run shell commands.
//!
//! Usage: `gpt_cmd <goal>`. Every proposed command is shown and confirmed
//! before it runs unless `GPT_CMD_DANGEROUSLY_SKIP_PROMPTS=true`. Transcripts
//! are saved under `~/.gpt_cmd/.convos/`.

use anyhow::Result;
use chrono::Local;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing::debug;

use gpt_cmd::agent::{AgentLoop, LoopOptions};
use gpt_cmd::exit_codes;
use gpt_cmd::io::completion::OpenAiClient;
use gpt_cmd::io::config::{ProjectPaths, RuntimeOptions};
use gpt_cmd::io::confirm::StdinConfirmer;
use gpt_cmd::io::console::Console;
use gpt_cmd::io::process::ShellExecutor;
use gpt_cmd::io::prompt::{PromptEngine, SystemInfo};
use gpt_cmd::io::transcript::TranscriptStore;
use gpt_cmd::logging;

const ENV_HELP: &str = "\
Environment vars:
  GPT_CMD_DANGEROUSLY_SKIP_PROMPTS [true]
  GPT_CMD_MODEL [string] (Default: gpt-4o)
  GPT_CMD_TOKEN [string]
  GPT_CMD_TOKEN_FILE_PATH [string] (Default: ~/OPENAI_TOKEN)
  GPT_CMD_API_BASE [string] (Default: https://api.openai.com/v1)";

#[derive(Parser, Debug)]
#[command(
    name = "gpt_cmd",
    about = "Accomplish a goal by letting a language model run shell commands",
    after_help = ENV_HELP
)]
struct Cli {
    /// What you want done, in plain words.
    #[arg(value_name = "GOAL", conflicts_with = "get_convos_dir")]
    goal: Option<String>,

    /// Print the directory where conversation transcripts are saved.
    #[arg(long)]
    get_convos_dir: bool,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::FAILURE
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return Ok(handle_parse_error(&err)),
    };

    let paths = ProjectPaths::from_home()?;
    if cli.get_convos_dir {
        println!("{}", paths.convos_dir.display());
        return Ok(exit_codes::OK);
    }

    let Some(goal) = cli.goal.filter(|goal| !goal.is_empty()) else {
        print_usage();
        return Ok(exit_codes::FAILURE);
    };

    let options = match RuntimeOptions::from_env(&paths) {
        Ok(options) => options,
        Err(err) => {
            println!("{}\n", format!("ERROR: {err:#}").bright_red());
            print_usage();
            return Ok(exit_codes::FAILURE);
        }
    };

    let transcript = PromptEngine::new().opening_transcript(
        &goal,
        &SystemInfo::current(),
        options.skip_prompts,
    )?;
    let client = OpenAiClient::new(&options)?;
    let executor = ShellExecutor::new();
    let confirmer = StdinConfirmer;
    let mut console = Console::stdout();
    let store = TranscriptStore::new(&paths.convos_dir, Local::now());

    let finished = AgentLoop::new(
        &client,
        &executor,
        &confirmer,
        &mut console,
        store,
        LoopOptions {
            skip_prompts: options.skip_prompts,
        },
    )
    .run(&goal, transcript)?;

    if let Some(path) = &finished.saved_to {
        debug!(path = %path.display(), "transcript saved");
    }
    Ok(exit_codes::for_outcome(finished.outcome))
}

/// `--help`/`-h` prints help and succeeds; any other parse problem prints usage and fails.
fn handle_parse_error(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp => {
            print_usage();
            exit_codes::OK
        }
        kind => {
            debug!(?kind, "invalid arguments");
            print_usage();
            exit_codes::FAILURE
        }
    }
}

fn print_usage() {
    println!("{}", Cli::command().render_help());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_goal() {
        let cli = Cli::try_parse_from(["gpt_cmd", "list files"]).expect("parse");
        assert_eq!(cli.goal.as_deref(), Some("list files"));
        assert!(!cli.get_convos_dir);
    }

    #[test]
    fn parse_get_convos_dir() {
        let cli = Cli::try_parse_from(["gpt_cmd", "--get-convos-dir"]).expect("parse");
        assert!(cli.get_convos_dir);
        assert_eq!(cli.goal, None);
    }

    #[test]
    fn help_flags_request_help() {
        for flag in ["--help", "-h"] {
            let err = Cli::try_parse_from(["gpt_cmd", flag]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
            assert_eq!(handle_parse_error(&err), exit_codes::OK);
        }
    }

    #[test]
    fn unknown_flag_and_extra_args_fail() {
        for args in [
            vec!["gpt_cmd", "--verbose"],
            vec!["gpt_cmd", "--version"],
            vec!["gpt_cmd", "one", "two"],
            vec!["gpt_cmd", "--get-convos-dir", "list files"],
        ] {
            let err = Cli::try_parse_from(args.iter().copied()).unwrap_err();
            assert_eq!(handle_parse_error(&err), exit_codes::FAILURE, "{args:?}");
        }
    }

    #[test]
    fn help_lists_environment_variables() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("GPT_CMD_DANGEROUSLY_SKIP_PROMPTS"));
        assert!(help.contains("GPT_CMD_TOKEN_FILE_PATH"));
    }
}

//! Parsing of the assistant's raw reply into a validated [`ModelReply`].
//!
//! The reply is checked in two steps: JSON Schema conformance, then typed
//! deserialization plus the "status or commands" invariant. Every failure is a
//! [`ParseError`]; the loop treats all of them as a protocol violation.

use std::fmt;
use std::sync::LazyLock;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::Value;

const MODEL_REPLY_SCHEMA: &str = include_str!("../../schemas/model_reply.schema.json");

static REPLY_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(MODEL_REPLY_SCHEMA).expect("model reply schema should be valid json");
    jsonschema::validator_for(&schema).expect("model reply schema should compile")
});

/// Terminal status declared by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    Success,
    /// Any non-empty status other than `"success"`.
    Failure,
}

impl GoalStatus {
    fn from_raw(raw: &str) -> Self {
        if raw == "success" {
            GoalStatus::Success
        } else {
            GoalStatus::Failure
        }
    }
}

/// What the loop should do with a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyAction {
    /// The model declared the goal finished.
    Finish(GoalStatus),
    /// Run these commands in order (never empty).
    Run(Vec<String>),
}

/// A validated model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub action: ReplyAction,
    pub context: Option<String>,
    pub convo_file_name: Option<String>,
}

/// Why a reply could not be turned into a [`ModelReply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not JSON at all.
    Malformed(String),
    /// JSON, but not the expected object shape.
    Invalid(Vec<String>),
    /// Well-formed, but with neither a status nor any commands.
    ///
    /// Keeps the conversation name so the transcript can still be saved under it.
    Empty { convo_file_name: Option<String> },
}

impl ParseError {
    pub fn convo_file_name(&self) -> Option<&str> {
        match self {
            ParseError::Empty { convo_file_name } => convo_file_name.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed(reason) => write!(f, "reply is not valid json: {reason}"),
            ParseError::Invalid(errors) => {
                write!(f, "reply has unexpected shape: {}", errors.join("; "))
            }
            ParseError::Empty { .. } => {
                write!(f, "no further commands and no success/failure status provided")
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawReply {
    commands: Option<Vec<String>>,
    context: Option<String>,
    #[serde(rename = "convo-file-name")]
    convo_file_name: Option<String>,
    status: Option<String>,
}

/// Parse the assistant's raw text.
///
/// A non-empty `status` wins over `commands` when both are present.
pub fn parse_reply(raw: &str) -> Result<ModelReply, ParseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| ParseError::Malformed(err.to_string()))?;

    let errors: Vec<String> = REPLY_VALIDATOR
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ParseError::Invalid(errors));
    }

    let reply: RawReply =
        serde_json::from_value(value).map_err(|err| ParseError::Invalid(vec![err.to_string()]))?;

    let context = non_empty(reply.context);
    let convo_file_name = non_empty(reply.convo_file_name);
    let commands = reply.commands.unwrap_or_default();

    let action = match reply.status.as_deref() {
        Some(status) if !status.is_empty() => ReplyAction::Finish(GoalStatus::from_raw(status)),
        _ if !commands.is_empty() => ReplyAction::Run(commands),
        _ => return Err(ParseError::Empty { convo_file_name }),
    };

    Ok(ModelReply {
        action,
        context,
        convo_file_name,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_batch_with_context() {
        let reply = parse_reply(r#"{"commands":["ls"],"context":"listing"}"#).expect("parse");
        assert_eq!(reply.action, ReplyAction::Run(vec!["ls".to_string()]));
        assert_eq!(reply.context.as_deref(), Some("listing"));
        assert_eq!(reply.convo_file_name, None);
    }

    #[test]
    fn success_status_is_terminal() {
        let reply = parse_reply(r#"{"status":"success","context":"done"}"#).expect("parse");
        assert_eq!(reply.action, ReplyAction::Finish(GoalStatus::Success));
        assert_eq!(reply.context.as_deref(), Some("done"));
    }

    #[test]
    fn any_other_status_is_failure() {
        for status in ["failure", "Success", "partial"] {
            let raw = format!(r#"{{"status":"{status}"}}"#);
            let reply = parse_reply(&raw).expect("parse");
            assert_eq!(reply.action, ReplyAction::Finish(GoalStatus::Failure), "{status}");
        }
    }

    #[test]
    fn status_wins_over_commands() {
        let reply = parse_reply(r#"{"status":"success","commands":["rm -rf build"]}"#)
            .expect("parse");
        assert_eq!(reply.action, ReplyAction::Finish(GoalStatus::Success));
    }

    #[test]
    fn empty_object_is_empty_error() {
        let err = parse_reply("{}").unwrap_err();
        assert_eq!(
            err,
            ParseError::Empty {
                convo_file_name: None
            }
        );
    }

    #[test]
    fn empty_status_and_commands_is_empty_error_keeping_name() {
        let err = parse_reply(r#"{"status":"","commands":[],"convo-file-name":"setup-repo"}"#)
            .unwrap_err();
        assert_eq!(err.convo_file_name(), Some("setup-repo"));
    }

    #[test]
    fn null_fields_are_treated_as_absent() {
        let reply = parse_reply(r#"{"commands":["pwd"],"context":null,"status":null}"#)
            .expect("parse");
        assert_eq!(reply.action, ReplyAction::Run(vec!["pwd".to_string()]));
        assert_eq!(reply.context, None);
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_reply("sure, run ls").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn wrong_shape_is_invalid() {
        let err = parse_reply(r#"{"commands":"ls"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Invalid(_)));

        let err = parse_reply(r#"["ls"]"#).unwrap_err();
        assert!(matches!(err, ParseError::Invalid(_)));
    }

    #[test]
    fn picks_up_convo_file_name() {
        let reply =
            parse_reply(r#"{"commands":["ls"],"convo-file-name":"list-files"}"#).expect("parse");
        assert_eq!(reply.convo_file_name.as_deref(), Some("list-files"));
    }
}

//! Opening messages sent to the model: system prompt and goal.

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::transcript::Transcript;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const GOAL_TEMPLATE: &str = include_str!("prompts/goal.md");

/// Host details appended to the goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
}

impl SystemInfo {
    /// Details of the machine this binary runs on.
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("goal", GOAL_TEMPLATE)
            .expect("goal template should be valid");
        Self { env }
    }

    pub fn render_system(&self, skip_prompts: bool) -> Result<String> {
        let template = self.env.get_template("system")?;
        Ok(template.render(context! { skip_prompts => skip_prompts })?)
    }

    pub fn render_goal(&self, goal: &str, info: &SystemInfo) -> Result<String> {
        let template = self.env.get_template("goal")?;
        Ok(template.render(context! {
            goal => goal,
            os => info.os.as_str(),
            arch => info.arch.as_str(),
        })?)
    }

    /// Build the transcript every run starts from.
    pub fn opening_transcript(
        &self,
        goal: &str,
        info: &SystemInfo,
        skip_prompts: bool,
    ) -> Result<Transcript> {
        let system = self.render_system(skip_prompts)?;
        let goal_message = self.render_goal(goal, info)?;
        debug!(
            system_bytes = system.len(),
            goal_bytes = goal_message.len(),
            "rendered opening messages"
        );
        Ok(Transcript::start(system, goal_message))
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

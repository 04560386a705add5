//! Runtime options resolved from the environment at startup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

pub const ENV_SKIP_PROMPTS: &str = "GPT_CMD_DANGEROUSLY_SKIP_PROMPTS";
pub const ENV_MODEL: &str = "GPT_CMD_MODEL";
pub const ENV_TOKEN: &str = "GPT_CMD_TOKEN";
pub const ENV_TOKEN_FILE_PATH: &str = "GPT_CMD_TOKEN_FILE_PATH";
pub const ENV_API_BASE: &str = "GPT_CMD_API_BASE";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TOKEN_FILE_NAME: &str = "OPENAI_TOKEN";

/// Per-user locations for project files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub home_dir: PathBuf,
    /// `~/.gpt_cmd`
    pub project_dir: PathBuf,
    /// `~/.gpt_cmd/.convos`
    pub convos_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(home_dir: &Path) -> Self {
        let project_dir = home_dir.join(".gpt_cmd");
        Self {
            home_dir: home_dir.to_path_buf(),
            convos_dir: project_dir.join(".convos"),
            project_dir,
        }
    }

    /// Resolve paths under the current user's home directory.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to resolve home directory"))?;
        Ok(Self::new(&home))
    }

    pub fn default_token_file(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_TOKEN_FILE_NAME)
    }
}

/// Options for one run of the loop.
#[derive(Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Run every command without asking.
    pub skip_prompts: bool,
    pub model: String,
    pub api_token: String,
    /// Chat completions base URL (without `/chat/completions`).
    pub api_base: String,
}

impl std::fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("skip_prompts", &self.skip_prompts)
            .field("model", &self.model)
            .field("api_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl RuntimeOptions {
    /// Resolve options from the process environment.
    pub fn from_env(paths: &ProjectPaths) -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok(), paths)
    }

    /// Resolve options through `lookup`, which returns `None` for unset variables.
    ///
    /// The token comes from `GPT_CMD_TOKEN`, else from the trimmed contents of the
    /// token file. An empty token after both is an error.
    pub fn resolve<F>(lookup: F, paths: &ProjectPaths) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let skip_prompts = lookup(ENV_SKIP_PROMPTS).as_deref() == Some("true");
        let model = lookup(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_base = lookup(ENV_API_BASE).unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut api_token = lookup(ENV_TOKEN).unwrap_or_default();
        if api_token.is_empty() {
            let token_path = lookup(ENV_TOKEN_FILE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| paths.default_token_file());
            api_token = read_token_file(&token_path);
        }

        let options = Self {
            skip_prompts,
            model,
            api_token,
            api_base,
        };
        options.validate()?;
        debug!(?options, "resolved runtime options");
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            return Err(anyhow!("unable to resolve an OpenAI token"));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("{ENV_MODEL} must not be empty"));
        }
        if self.api_base.trim().is_empty() {
            return Err(anyhow!("{ENV_API_BASE} must not be empty"));
        }
        Ok(())
    }
}

/// Read and trim a token file; a missing or unreadable file yields an empty token.
fn read_token_file(path: &Path) -> String {
    match fs::read_to_string(path).with_context(|| format!("read {}", path.display())) {
        Ok(contents) => contents.trim().to_string(),
        Err(err) => {
            debug!(err = %format!("{err:#}"), "token file unavailable");
            String::new()
        }
    }
}

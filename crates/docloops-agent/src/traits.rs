use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::AgentOutput;

/// Errors that can occur while running a backend agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to spawn agent process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("Agent exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),
}

/// Configuration for a single agent invocation
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Working directory for the agent process
    pub working_dir: PathBuf,
    /// Optional timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
    /// Model to use (if the agent supports it)
    pub model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
            model: None,
        }
    }
}

impl AgentConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }
}

/// Supported agent backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentType {
    ClaudeCode,
    OpenCode,
}

impl AgentType {
    /// Executable looked up on `PATH` when no explicit path is given
    pub fn default_binary(&self) -> &'static str {
        match self {
            AgentType::ClaudeCode => "claude",
            AgentType::OpenCode => "opencode",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentType::ClaudeCode => "Claude Code",
            AgentType::OpenCode => "OpenCode",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentType::ClaudeCode => write!(f, "claude-code"),
            AgentType::OpenCode => write!(f, "opencode"),
        }
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(AgentType::ClaudeCode),
            "opencode" | "open-code" => Ok(AgentType::OpenCode),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}

/// A text-generation backend driven through a command line agent.
///
/// Agents are stateless: every call to [`Agent::complete`] is a fresh,
/// non-interactive session that receives the whole prompt and returns the
/// generated text on stdout.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Human-readable name of the agent (e.g., "Claude Code", "OpenCode")
    fn name(&self) -> &str;

    fn agent_type(&self) -> AgentType;

    /// Run the prompt and capture the process output
    async fn complete(&self, prompt: &str, config: &AgentConfig)
        -> Result<AgentOutput, AgentError>;

    /// Check if the agent CLI is available on the system
    async fn is_available(&self) -> bool;

    fn binary_path(&self) -> &Path;
}

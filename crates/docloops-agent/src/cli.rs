use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, AgentType, ProcessSpawner};

/// An agent CLI run once per prompt in non-interactive mode.
///
/// Claude Code reads the prompt from stdin, so whole documents never hit
/// argv length limits. OpenCode only accepts it as a trailing argument.
pub struct CliAgent {
    agent_type: AgentType,
    binary_path: PathBuf,
}

impl CliAgent {
    pub fn new(agent_type: AgentType) -> Self {
        Self {
            agent_type,
            binary_path: PathBuf::from(agent_type.default_binary()),
        }
    }

    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = path.into();
        self
    }

    fn reads_stdin(&self) -> bool {
        matches!(self.agent_type, AgentType::ClaudeCode)
    }

    fn build_args<'a>(&self, prompt: &'a str, config: &'a AgentConfig) -> Vec<&'a str> {
        let mut args = match self.agent_type {
            AgentType::ClaudeCode => vec!["--print", "--output-format", "text"],
            AgentType::OpenCode => vec!["run"],
        };
        if let Some(model) = config.model.as_deref() {
            args.extend(["--model", model]);
        }
        if !self.reads_stdin() {
            // Prompts may start with '-'
            args.extend(["--", prompt]);
        }
        args
    }
}

#[async_trait]
impl Agent for CliAgent {
    fn name(&self) -> &str {
        self.agent_type.display_name()
    }

    fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .is_ok_and(|o| o.status.success())
    }

    async fn complete(
        &self,
        prompt: &str,
        config: &AgentConfig,
    ) -> Result<AgentOutput, AgentError> {
        debug!(agent = self.name(), prompt_len = prompt.len(), "Running agent");

        let args = self.build_args(prompt, config);
        let stdin = self.reads_stdin().then_some(prompt);
        ProcessSpawner::spawn(&self.binary_path, &args, stdin, config).await
    }
}

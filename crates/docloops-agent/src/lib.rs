//! # docloops-agent
//!
//! Command line text-generation backends used by the docloops evaluator and
//! improver. Each [`Agent`] runs one non-interactive prompt and returns the
//! captured output.

mod cli;
mod output;
mod spawner;
mod traits;

pub use cli::CliAgent;
pub use output::AgentOutput;
pub use spawner::ProcessSpawner;
pub use traits::{Agent, AgentConfig, AgentError, AgentType};

/// Create an agent by type, using the backend's default binary name
pub fn create_agent(agent_type: AgentType) -> Box<dyn Agent> {
    Box::new(CliAgent::new(agent_type))
}

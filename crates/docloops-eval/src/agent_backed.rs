use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use docloops_agent::{Agent, AgentConfig, AgentOutput};

use crate::model::{EvaluationResult, Metadata};
use crate::prompts::EvaluationPrompts;
use crate::response::{clean_rewrite, extract_json};
use crate::scorecard::ScoreCard;
use crate::traits::{EvaluationError, Evaluator, ImproveError, Improver};

/// Evaluator that asks a command line agent to score the document and
/// normalizes the answer through a [`ScoreCard`]
pub struct AgentEvaluator {
    agent: Arc<dyn Agent>,
    config: AgentConfig,
    scorecard: ScoreCard,
    name: String,
}

impl AgentEvaluator {
    pub fn new(agent: Arc<dyn Agent>, config: AgentConfig, scorecard: ScoreCard) -> Self {
        let name = format!("{} evaluator", agent.name());
        Self {
            agent,
            config,
            scorecard,
            name,
        }
    }
}

#[async_trait]
impl Evaluator for AgentEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(
        &self,
        content: &str,
        doc_type: &str,
        _metadata: &Metadata,
    ) -> Result<EvaluationResult, EvaluationError> {
        let prompt = EvaluationPrompts::build_evaluation_prompt(content, doc_type, &self.scorecard);
        debug!(prompt_len = prompt.len(), doc_type, "Running agent evaluation");

        let output = run(self.agent.as_ref(), &prompt, &self.config)
            .await
            .map_err(EvaluationError::Backend)?;

        let raw = extract_json(&output.stdout)?;
        Ok(self.scorecard.normalize(&raw))
    }
}

/// Improver that asks a command line agent for a full rewrite
pub struct AgentImprover {
    agent: Arc<dyn Agent>,
    config: AgentConfig,
    name: String,
}

impl AgentImprover {
    pub fn new(agent: Arc<dyn Agent>, config: AgentConfig) -> Self {
        let name = format!("{} improver", agent.name());
        Self { agent, config, name }
    }
}

#[async_trait]
impl Improver for AgentImprover {
    fn name(&self) -> &str {
        &self.name
    }

    async fn improve(
        &self,
        content: &str,
        evaluation: &EvaluationResult,
        focus_areas: &[String],
        _metadata: &Metadata,
    ) -> Result<String, ImproveError> {
        let prompt = EvaluationPrompts::build_improvement_prompt(content, evaluation, focus_areas);
        debug!(
            prompt_len = prompt.len(),
            focus_areas = focus_areas.len(),
            "Running agent improvement"
        );

        let output = run(self.agent.as_ref(), &prompt, &self.config)
            .await
            .map_err(ImproveError::Backend)?;

        let rewrite = clean_rewrite(&output.stdout);
        if rewrite.is_empty() {
            return Err(ImproveError::EmptyRewrite);
        }
        Ok(rewrite)
    }
}

async fn run(agent: &dyn Agent, prompt: &str, config: &AgentConfig) -> Result<AgentOutput, String> {
    let output = agent
        .complete(prompt, config)
        .await
        .map_err(|e| e.to_string())?;

    info!(
        agent = agent.name(),
        exit_code = output.exit_code,
        duration_secs = output.duration.as_secs_f64(),
        "Agent completed"
    );

    if !output.success() {
        return Err(format!(
            "{} exited with code {}: {}",
            agent.name(),
            output.exit_code,
            output.stderr_tail(5)
        ));
    }

    Ok(output)
}

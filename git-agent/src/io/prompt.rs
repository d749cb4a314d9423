//! System prompt builder.
//!
//! The template is bundled with the binary and rendered once at startup with
//! the operator's extra instructions. Rendering failures are fatal before the
//! agent loop starts.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const TEMPLATE_NAME: &str = "system";

/// Template engine wrapper around minijinja.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    /// Builder for the bundled system prompt.
    pub fn new() -> Result<Self> {
        Self::from_source(SYSTEM_TEMPLATE)
    }

    /// Builder for an arbitrary template source.
    pub fn from_source(source: &'static str) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(TEMPLATE_NAME, source)
            .context("parse system prompt template")?;
        Ok(Self { env })
    }

    /// Render the prompt with the given instructions, in order.
    ///
    /// Blank instructions are dropped.
    pub fn build(&self, instructions: &[String]) -> Result<String> {
        let instructions: Vec<&str> = instructions
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .context("load system prompt template")?;
        let rendered = template
            .render(context! { instructions => instructions })
            .context("render system prompt template")?;
        debug!(
            bytes = rendered.len(),
            instructions = instructions.len(),
            "rendered system prompt"
        );
        Ok(rendered)
    }
}

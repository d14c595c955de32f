//! `vigil generate` command implementation

use crate::config::VigilConfig;
use crate::context::VigilContext;
use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};
use serde::Serialize;
use vigil_kernel::{GenerateOptions, ModelGateway};

/// Arguments of a single generation
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub tier: Option<String>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    fn options(&self) -> GenerateOptions {
        let mut options = GenerateOptions::new();
        if let Some(system) = &self.system {
            options = options.with_system_prompt(system.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        if let Some(tier) = &self.tier {
            options = options.with_tier(tier.as_str());
        }
        if let Some(temperature) = self.temperature {
            options = options.with_temperature(temperature);
        }
        options
    }
}

#[derive(Debug, Serialize)]
struct GenerateOutput {
    model: String,
    tier: String,
    response: String,
}

/// Execute the `vigil generate` command
pub async fn run(config: VigilConfig, request: GenerateRequest, format: OutputFormat) -> CliResult<()> {
    let ctx = VigilContext::new(config)?;
    let options = request.options();

    let response = ctx.adaptive.generate(&request.prompt, &options).await?;

    match format {
        OutputFormat::Json => print_json(&GenerateOutput {
            model: ctx.ollama.active_model(),
            tier: request
                .tier
                .unwrap_or_else(|| ctx.tiers.current().to_string()),
            response,
        })?,
        OutputFormat::Text => println!("{response}"),
    }
    Ok(())
}

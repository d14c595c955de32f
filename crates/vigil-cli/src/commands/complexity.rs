//! `vigil complexity` command implementation

use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};
use colored::Colorize;
use vigil_foundation::quantization::estimate_complexity;

/// Execute the `vigil complexity` command
pub fn run(text: &str, format: OutputFormat) -> CliResult<()> {
    let score = estimate_complexity(text);

    match format {
        OutputFormat::Json => print_json(&score)?,
        OutputFormat::Text => {
            println!("Complexity: {}", format!("{:.3}", score.value()).yellow().bold());
            println!("  length:   {:.3}", score.length_factor);
            println!("  terms:    {:.3}", score.term_factor);
            println!("  symbols:  {:.3}", score.special_factor);
        }
    }
    Ok(())
}

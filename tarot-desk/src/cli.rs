// Command-line arguments.

use clap::{Parser, Subcommand};

use crate::llm::client::ModelInfo;

#[derive(Debug, Parser)]
#[command(version, about = "Tarot readings and stock sentiment in the terminal.")]
pub struct Cli {
    /// Log in with this nickname on startup
    #[arg(long)]
    pub nickname: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum Command {
    /// List the Gemini models this API key can use for content generation
    Models,
}

/// One model per line, with its display name when the listing has one.
pub fn format_model_list(models: &[ModelInfo]) -> String {
    models
        .iter()
        .map(|m| match &m.display_name {
            Some(display) => format!("{}  ({display})\n", m.name),
            None => format!("{}\n", m.name),
        })
        .collect()
}

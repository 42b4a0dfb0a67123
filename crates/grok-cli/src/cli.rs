//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use grok_core::ProviderKind;

/// Grok — profile-driven transcript analysis
#[derive(Parser, Debug)]
#[command(name = "grok", version, about = "Grok — profile-driven transcript analysis")]
pub struct Cli {
    /// Directory holding profile files (*.json, *.yaml)
    #[arg(long, global = true, env = "GROK_PROFILES_DIR")]
    pub profiles_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a profile against a transcript and print the result as JSON
    Run(RunArgs),

    /// Inspect and validate processing profiles
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Inspect model providers
    Providers {
        #[command(subcommand)]
        action: ProviderAction,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Profile ID (e.g. business_meeting)
    #[arg(long)]
    pub profile: String,

    /// Read the transcript from a file
    #[arg(long, conflicts_with = "text", required_unless_present = "text")]
    pub transcript_file: Option<PathBuf>,

    /// Transcript text given inline
    #[arg(long)]
    pub text: Option<String>,

    /// Route every step to this provider: local or remote
    #[arg(long)]
    pub force_provider: Option<ProviderKind>,

    /// Use this model for every step
    #[arg(long)]
    pub force_model: Option<String>,

    /// Temperature for every step (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Max tokens for every step
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// JSON file with a full override set (command-line flags win)
    #[arg(long)]
    pub overrides: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// List available profiles
    List,
    /// Show one profile with its execution order
    Show {
        /// Profile ID
        id: String,
    },
    /// Validate a profile file without running it
    Validate {
        /// Path to a .json / .yaml profile file
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProviderAction {
    /// Report health of every configured provider
    Status,
}

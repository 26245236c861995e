//! Command-line interface for phyto-match.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **diagnose**: Rank candidate diseases for an observation
//! - **kb**: Inspect and validate a knowledge base
//! - **fuzzy**: Compare two attribute values with the fuzzy rules
//!
//! ## Usage
//!
//! ```text
//! # Rank diseases for an observation
//! phyto-match diagnose --kb knowledge --observation leaf.json
//!
//! # Only consider diseases of roses, JSON output
//! phyto-match --format json diagnose --observation leaf.json --host Rosa
//!
//! # Check a knowledge base before deploying it
//! phyto-match kb validate --kb knowledge
//!
//! # Why does deep_black match black?
//! phyto-match fuzzy color deep_black black
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::types::Dimension;
use crate::knowledge::config::{default_fuzzy_dimensions, KnowledgeBaseConfig};

pub mod diagnose;
pub mod fuzzy;
pub mod kb;

#[derive(Parser)]
#[command(name = "phyto-match")]
#[command(version)]
#[command(about = "Match plant symptom observations against a disease knowledge base")]
#[command(
    long_about = "phyto-match scores a structured symptom observation against a knowledge base of plant diseases.\n\nEach candidate disease gets:\n- A weighted score built from exact and fuzzy feature matches\n- A confidence tier (confirmed, suspected, unlikely)\n- A per-feature reasoning trace"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank candidate diseases for an observation
    Diagnose(diagnose::DiagnoseArgs),

    /// Inspect the knowledge base
    Kb(kb::KbArgs),

    /// Compare two attribute values with the fuzzy rules
    Fuzzy(fuzzy::FuzzyArgs),
}

/// Where to find the knowledge base, shared by every command
#[derive(Args, Debug, Clone)]
pub struct KnowledgeArgs {
    /// Knowledge base root directory
    #[arg(long = "kb", global = true, default_value = "knowledge")]
    pub kb: PathBuf,

    /// Fuzzy rules directory (defaults to <kb>/fuzzy_rules)
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    /// Scoring weights file (defaults to <kb>/config/scoring_weights.json)
    #[arg(long, global = true)]
    pub weights: Option<PathBuf>,

    /// Warn about weight-sum violations instead of rejecting the knowledge base
    #[arg(long, global = true)]
    pub lenient_weights: bool,

    /// Also compare location and distribution with fuzzy rules
    #[arg(long, global = true)]
    pub fuzzy_all: bool,
}

impl KnowledgeArgs {
    #[must_use]
    pub fn config(&self) -> KnowledgeBaseConfig {
        let mut config =
            KnowledgeBaseConfig::from_root(&self.kb).with_strict_weights(!self.lenient_weights);
        if let Some(rules) = &self.rules {
            config = config.with_fuzzy_rules_dir(rules);
        }
        if let Some(weights) = &self.weights {
            config = config.with_scoring_weights(weights);
        }
        if self.fuzzy_all {
            let mut dimensions = default_fuzzy_dimensions();
            dimensions.extend([Dimension::Location, Dimension::Distribution]);
            config = config.with_fuzzy_dimensions(dimensions);
        }
        config
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

use clap::Args;

use crate::cli::{KnowledgeArgs, OutputFormat};
use crate::core::types::{Dimension, FuzzyKind, MatchKind};
use crate::matching::fuzzy::FuzzyMatchingEngine;

#[derive(Args)]
pub struct FuzzyArgs {
    #[command(flatten)]
    pub knowledge: KnowledgeArgs,

    /// Dimension or rule family (color, size, symptom, location, distribution,
    /// or any dimension id such as color_border)
    #[arg(required = true)]
    pub dimension: String,

    /// Observed value
    #[arg(required = true)]
    pub observed: String,

    /// Expected value(s); the best match wins
    #[arg(required = true, num_args = 1..)]
    pub expected: Vec<String>,
}

/// Execute fuzzy subcommand
///
/// # Errors
///
/// Returns an error if a rule file is present but invalid.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: FuzzyArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = args.knowledge.config();
    let engine = FuzzyMatchingEngine::from_dir(&config.fuzzy_rules_dir)?;

    let kind = FuzzyKind::parse(&args.dimension);
    if verbose {
        match kind {
            Some(kind) => eprintln!(
                "Using {kind} rules ({})",
                engine.rules().version(kind).unwrap_or("exact only")
            ),
            None => eprintln!(
                "'{}' has no fuzzy rules; comparing exactly",
                Dimension::parse(&args.dimension)
            ),
        }
    }

    let outcome = engine
        .rules()
        .best_match(kind, &args.observed, &args.expected);

    match format {
        OutputFormat::Text => {
            let label = match outcome.kind {
                MatchKind::Exact => "EXACT",
                MatchKind::Fuzzy => "FUZZY",
                MatchKind::None => "NO MATCH",
            };
            println!("{label} (score {:.2}): {}", outcome.score, outcome.reason);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;

use crate::cli::{KnowledgeArgs, OutputFormat};
use crate::core::observation::FeatureVector;
use crate::core::types::ConfidenceTier;
use crate::knowledge::manager::KnowledgeBaseManager;
use crate::matching::scoring::ScoredCandidate;

#[derive(Args)]
pub struct DiagnoseArgs {
    #[command(flatten)]
    pub knowledge: KnowledgeArgs,

    /// Observation file (JSON feature vector); use '-' for stdin
    #[arg(short, long, required = true)]
    pub observation: PathBuf,

    /// Restrict candidates to these host genera (repeatable)
    #[arg(long = "host")]
    pub hosts: Vec<String>,

    /// Number of candidates to show
    #[arg(short = 'n', long, default_value = "5")]
    pub top: usize,

    /// Score every disease instead of pre-filtering candidates
    #[arg(long)]
    pub all: bool,
}

/// Execute diagnose subcommand
///
/// # Errors
///
/// Returns an error if the knowledge base or the observation cannot be loaded.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: DiagnoseArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let observed = read_observation(&args.observation)?;
    let manager = KnowledgeBaseManager::open(args.knowledge.config())
        .with_context(|| format!("loading knowledge base {}", args.knowledge.kb.display()))?;

    let candidates = if args.all {
        manager.all_diseases()
    } else if !args.hosts.is_empty() {
        manager.get_diseases_by_hosts(&args.hosts)
    } else {
        manager.candidates_for(&observed)
    };

    if verbose {
        eprintln!(
            "Scoring {} of {} diseases",
            candidates.len(),
            manager.statistics().index.disease_count
        );
    }

    if candidates.is_empty() {
        eprintln!("No candidate diseases found.");
        return Ok(());
    }

    let mut ranked = manager.match_all_candidates(&observed, &candidates);
    ranked.truncate(args.top);

    match format {
        OutputFormat::Text => print_text_results(&ranked, verbose),
        OutputFormat::Json => print_json_results(&ranked)?,
    }

    Ok(())
}

fn read_observation(path: &Path) -> anyhow::Result<FeatureVector> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading observation from stdin")?;
        return serde_json::from_str(&text).context("parsing observation from stdin");
    }
    FeatureVector::load(path).with_context(|| format!("reading observation {}", path.display()))
}

fn print_text_results(ranked: &[ScoredCandidate], verbose: bool) {
    println!("\nTop {} candidate(s):\n", ranked.len());

    for (i, candidate) in ranked.iter().enumerate() {
        let disease = &candidate.disease;
        let score = &candidate.score;

        let marker = match score.confidence() {
            ConfidenceTier::Confirmed => "✓",
            ConfidenceTier::Suspected => "?",
            ConfidenceTier::Unlikely => " ",
        };

        println!(
            "{}. [{marker}] {} ({})",
            i + 1,
            disease.disease_name,
            disease.disease_id
        );
        println!(
            "   {} | score {:.1}% | major features {}/{}",
            score.confidence(),
            score.total() * 100.0,
            score.major_matched(),
            score.major_total()
        );
        if let Some(pathogen) = &disease.pathogen {
            println!("   Pathogen: {pathogen}");
        }

        if verbose {
            for line in candidate.reasoning.to_string().lines().skip(1) {
                println!("   {line}");
            }
        }
        println!();
    }
}

fn print_json_results(ranked: &[ScoredCandidate]) -> anyhow::Result<()> {
    let output: Vec<serde_json::Value> = ranked
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            serde_json::json!({
                "rank": i + 1,
                "disease_id": candidate.disease.disease_id,
                "disease_name": candidate.disease.disease_name,
                "pathogen": candidate.disease.pathogen,
                "score": candidate.score,
                "reasoning": candidate.reasoning,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

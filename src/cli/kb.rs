use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Subcommand};

use crate::cli::{KnowledgeArgs, OutputFormat};
use crate::core::disease::DiseaseDefinition;
use crate::knowledge::manager::KnowledgeBaseManager;

#[derive(Args)]
pub struct KbArgs {
    #[command(flatten)]
    pub knowledge: KnowledgeArgs,

    #[command(subcommand)]
    pub command: KbCommands,
}

#[derive(Subcommand)]
pub enum KbCommands {
    /// List all diseases in the knowledge base
    List,

    /// Show details of a specific disease
    Show {
        /// Disease ID
        #[arg(required = true)]
        id: String,
    },

    /// List diseases affecting any of the given host genera
    Hosts {
        /// Host genus (e.g., "Rosa"); several genera give the union
        #[arg(required = true, num_args = 1..)]
        genera: Vec<String>,
    },

    /// List diseases expecting a symptom type (and center color)
    Symptom {
        /// Symptom type (e.g., "necrosis_spot")
        #[arg(required = true)]
        symptom_type: String,

        /// Lesion center color to intersect with
        #[arg(long)]
        color: Option<String>,
    },

    /// Show knowledge base statistics
    Stats,

    /// Load everything and report problems
    Validate {
        /// Treat warnings as errors
        #[arg(long)]
        deny_warnings: bool,
    },
}

/// Execute kb subcommand
///
/// # Errors
///
/// Returns an error if the knowledge base cannot be loaded, or if a requested
/// disease does not exist.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: KbArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let manager = KnowledgeBaseManager::open(args.knowledge.config())
        .with_context(|| format!("loading knowledge base {}", args.knowledge.kb.display()))?;

    if verbose {
        eprintln!(
            "Loaded {} diseases from {}",
            manager.statistics().index.disease_count,
            args.knowledge.kb.display()
        );
    }

    match args.command {
        KbCommands::List => print_diseases(&manager.all_diseases(), format),
        KbCommands::Show { id } => run_show(&manager, &id, format),
        KbCommands::Hosts { genera } => {
            print_diseases(&manager.get_diseases_by_hosts(&genera), format)
        }
        KbCommands::Symptom {
            symptom_type,
            color,
        } => print_diseases(
            &manager.diseases_by_symptom(&symptom_type, color.as_deref()),
            format,
        ),
        KbCommands::Stats => run_stats(&manager, format),
        KbCommands::Validate { deny_warnings } => run_validate(&manager, deny_warnings, format),
    }
}

fn print_diseases(diseases: &[Arc<DiseaseDefinition>], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            if diseases.is_empty() {
                println!("No matching diseases.");
                return Ok(());
            }
            println!("{:<32} {:<36} HOSTS", "ID", "NAME");
            println!("{}", "-".repeat(90));
            for disease in diseases {
                println!(
                    "{:<32} {:<36} {}",
                    disease.disease_id,
                    truncate(&disease.disease_name, 36),
                    disease.host_plants.join(", ")
                );
            }
            println!("\n{} disease(s)", diseases.len());
        }
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = diseases
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "disease_id": d.disease_id,
                        "disease_name": d.disease_name,
                        "common_name_en": d.common_name_en,
                        "host_plants": d.host_plants,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn run_show(manager: &KnowledgeBaseManager, id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let disease = manager
        .get_disease_by_id(id)
        .ok_or_else(|| anyhow::anyhow!("Disease not found: {id}"))?;

    match format {
        OutputFormat::Text => {
            println!("Disease: {}", disease.disease_name);
            println!("ID: {}", disease.disease_id);
            if let Some(common) = &disease.common_name_en {
                println!("Common name: {common}");
            }
            if let Some(pathogen) = &disease.pathogen {
                println!("Pathogen: {pathogen}");
            }
            println!("Hosts: {}", disease.host_plants.join(", "));

            for (tier, group) in disease.feature_importance.tiers() {
                if group.is_empty() {
                    continue;
                }
                match group.weight {
                    Some(w) => println!("\n{tier} features (group weight {w:.2}):"),
                    None => println!("\n{tier} features:"),
                }
                for feature in &group.features {
                    println!(
                        "  {:<16} {:.2}  {}",
                        feature.dimension.as_str(),
                        feature.weight,
                        feature.expected_values.0.join(" | ")
                    );
                }
            }

            if !disease.typical_symptoms.is_empty() {
                println!("\nTypical symptoms:");
                for symptom in &disease.typical_symptoms {
                    println!("  - {symptom}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(disease.as_ref())?);
        }
    }
    Ok(())
}

fn run_stats(manager: &KnowledgeBaseManager, format: OutputFormat) -> anyhow::Result<()> {
    let stats = manager.statistics();

    match format {
        OutputFormat::Text => {
            println!("Diseases:          {}", stats.index.disease_count);
            println!("Host genera:       {}", stats.index.host_count);
            println!("Symptom types:     {}", stats.index.symptom_type_count);
            println!("Center colors:     {}", stats.index.center_color_count);
            println!("Border colors:     {}", stats.index.border_color_count);
            println!("Index entries:     {}", stats.index.index_entry_count);
            println!("Ontology version:  {}", stats.ontology_version);
            println!("Scoring weights:   {}", stats.scoring_weights_version);
            for (kind, version) in &stats.rule_versions {
                println!(
                    "{:<19}{}",
                    format!("{kind} rules:"),
                    version.as_deref().unwrap_or("(exact only)")
                );
            }
            println!("Fingerprint:       {}", stats.fingerprint);
            println!("Loaded at:         {}", stats.loaded_at);
            println!("Warnings:          {}", stats.warning_count);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

fn run_validate(
    manager: &KnowledgeBaseManager,
    deny_warnings: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let snapshot = manager.snapshot();
    let warnings = &snapshot.warnings;

    match format {
        OutputFormat::Text => {
            println!(
                "Knowledge base OK: {} diseases, fingerprint {}",
                snapshot.index.len(),
                snapshot.fingerprint
            );
            for warning in warnings {
                println!("  warning: {warning}");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": !(deny_warnings && !warnings.is_empty()),
                "disease_count": snapshot.index.len(),
                "fingerprint": snapshot.fingerprint,
                "warnings": warnings,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if deny_warnings && !warnings.is_empty() {
        anyhow::bail!("{} warning(s) found", warnings.len());
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

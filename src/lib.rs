//! # phyto-match
//!
//! A library for diagnosing plant diseases from structured symptom observations.
//!
//! An upstream extraction stage turns a photo into a feature vector: host genus,
//! symptom type, lesion colors, size, location and so on. Those values are rarely
//! spelled the way a disease reference spells them ("deep black" vs. "black",
//! "medium" vs. "small"), so exact comparison alone misses real matches.
//!
//! `phyto-match` scores the observation against a knowledge base of disease
//! definitions, using configurable fuzzy rules per attribute and a weighted,
//! tiered scoring model.
//!
//! ## Features
//!
//! - **Typed knowledge base**: disease, ontology and rule files validated at load time
//! - **Fuzzy matching**: color aliases, size tolerance, symptom synonyms, location
//!   and distribution groups, each with its own score
//! - **Weighted scoring**: major/minor/optional tiers and a completeness correction
//! - **Confidence tiers**: confirmed, suspected or unlikely, derived from score and
//!   major-feature coverage
//! - **Reasoning traces**: per-feature explanation of every score
//! - **Hot reload**: all-or-nothing snapshot swap that never disturbs readers
//!
//! ## Example
//!
//! ```rust,no_run
//! use phyto_match::{FeatureVector, KnowledgeBaseConfig, KnowledgeBaseManager};
//!
//! let manager = KnowledgeBaseManager::open(KnowledgeBaseConfig::from_root("knowledge")).unwrap();
//!
//! let observed: FeatureVector = serde_json::from_str(
//!     r#"{"host_genus": "Rosa", "symptom_type": "necrosis_spot",
//!         "color_center": "deep_black", "color_border": "yellow"}"#,
//! ).unwrap();
//!
//! for candidate in manager.diagnose(&observed).iter().take(3) {
//!     println!("{}: {} ({:.1}%)",
//!         candidate.disease.disease_name,
//!         candidate.score.confidence(),
//!         candidate.score.total() * 100.0
//!     );
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Disease, ontology and observation types
//! - [`knowledge`]: Loading, indexing and the knowledge base manager
//! - [`matching`]: Fuzzy matching, feature matching and scoring
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod core;
pub mod knowledge;
pub mod matching;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::disease::DiseaseDefinition;
pub use core::observation::FeatureVector;
pub use core::ontology::FeatureOntology;
pub use core::types::*;
pub use knowledge::{ErrorKind, KnowledgeBaseConfig, KnowledgeBaseManager, KnowledgeError};
pub use matching::{classify, DiagnosisScore, FuzzyMatchingEngine, ScoredCandidate};

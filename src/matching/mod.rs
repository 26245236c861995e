//! Fuzzy attribute matching and weighted diagnosis scoring.
//!
//! - [`fuzzy::FuzzyMatchingEngine`]: compares two values of one dimension
//!   using the typed tables in [`rules`]
//! - [`features::FeatureMatcher`]: compares an observation with every expected
//!   feature of a disease
//! - [`scoring::WeightedScorer`]: combines tiers, applies the completeness
//!   correction and ranks candidates
//!
//! ## Scoring
//!
//! Each feature contributes `match_score * weight` to its tier. Tiers are
//! summed by group weight (major 0.80, minor 0.15, optional 0.05 unless a
//! disease overrides them) and clamped to 1.0. The weight of a tier without
//! features is shared among the other tiers. The total is then multiplied by
//! the completeness factor and clamped again.
//!
//! ## Example
//!
//! ```rust,no_run
//! use phyto_match::{FeatureVector, KnowledgeBaseConfig, KnowledgeBaseManager};
//!
//! let manager = KnowledgeBaseManager::open(KnowledgeBaseConfig::from_root("knowledge")).unwrap();
//! let observed = FeatureVector::load("observation.json".as_ref()).unwrap();
//!
//! for candidate in manager.diagnose(&observed).iter().take(3) {
//!     println!("{}", candidate.reasoning.summary());
//! }
//! ```

pub mod features;
pub mod fuzzy;
pub mod reasoning;
pub mod rules;
pub mod scoring;

pub use fuzzy::{FuzzyMatch, FuzzyMatchingEngine, FuzzyRuleSet};
pub use scoring::{classify, DiagnosisScore, ScoredCandidate, WeightedScorer};

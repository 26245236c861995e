//! Knowledge base loading, indexing and lifecycle.
//!
//! - [`loader::KnowledgeLoader`]: reads disease and ontology files
//! - [`index::DiseaseIndex`]: host, symptom and color lookups over one disease set
//! - [`manager::KnowledgeBaseManager`]: the facade callers use, with
//!   all-or-nothing hot reload
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   diseases/*.json
//!   features/feature_ontology.json
//!   fuzzy_rules/{color,size,symptom,location,distribution}_rules.json
//!   config/scoring_weights.json
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod manager;

pub use config::KnowledgeBaseConfig;
pub use error::{ErrorKind, KnowledgeError};
pub use manager::{KnowledgeBaseManager, KnowledgeSnapshot, KnowledgeStatistics};

//! Core data types for plant disease diagnosis.
//!
//! - [`DiseaseDefinition`](disease::DiseaseDefinition): a disease with its expected
//!   feature values and tiered feature importance
//! - [`FeatureOntology`](ontology::FeatureOntology): dimension domains and the
//!   embedded fuzzy-matching bundle
//! - [`FeatureVector`](observation::FeatureVector): an observation supplied per call
//! - [`Dimension`](types::Dimension), [`ImportanceTier`](types::ImportanceTier),
//!   [`ConfidenceTier`](types::ConfidenceTier): shared classification types
//!
//! ## Dimensions
//!
//! | Kind | Dimensions |
//! |------|------------|
//! | Fixed | content_type, plant_category, host_genus, organ, completeness, has_abnormality |
//! | Free | symptom_type, color_center, color_border, location, size, distribution |
//! | Extension | anything else, looked up in the observation's `extra` map |
//!
//! Values are compared after [`normalize_value`](types::normalize_value).

pub mod disease;
pub mod observation;
pub mod ontology;
pub mod types;

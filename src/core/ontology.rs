use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::disease::DiseaseDefinition;
use crate::core::types::{normalize_value, Dimension};

/// Value domain of a dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    /// Closed set of values listed in the ontology
    Enum,
    Boolean,
    #[serde(alias = "string")]
    Text,
    #[serde(other)]
    Other,
}

/// Ontology entry for one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    #[serde(rename = "type")]
    pub value_type: DimensionType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    #[serde(default)]
    pub description: String,
}

impl DimensionSpec {
    /// Whether a value is inside this dimension's declared domain.
    /// Open domains accept everything.
    #[must_use]
    pub fn allows(&self, value: &str) -> bool {
        match self.value_type {
            DimensionType::Enum if !self.values.is_empty() => {
                let value = normalize_value(value);
                self.values.iter().any(|v| normalize_value(v) == value)
            }
            DimensionType::Boolean => matches!(normalize_value(value).as_str(), "true" | "false"),
            _ => true,
        }
    }
}

/// Fuzzy-matching bundle embedded in the ontology file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OntologyFuzzyRules {
    #[serde(default)]
    pub color_aliases: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub size_order: Vec<String>,

    #[serde(default)]
    pub size_tolerance: usize,

    #[serde(default)]
    pub synonym_mapping: BTreeMap<String, Vec<String>>,
}

/// The feature ontology: dimension domains plus the embedded fuzzy bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureOntology {
    pub version: String,

    pub dimensions: BTreeMap<Dimension, DimensionSpec>,

    #[serde(default)]
    pub fuzzy_matching: OntologyFuzzyRules,
}

impl FeatureOntology {
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn dimension(&self, dimension: &Dimension) -> Option<&DimensionSpec> {
        self.dimensions.get(dimension)
    }

    #[must_use]
    pub fn declares(&self, dimension: &Dimension) -> bool {
        self.dimensions.contains_key(dimension)
    }

    #[must_use]
    pub fn color_aliases(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fuzzy_matching.color_aliases
    }

    #[must_use]
    pub fn size_order(&self) -> &[String] {
        &self.fuzzy_matching.size_order
    }

    #[must_use]
    pub fn size_tolerance(&self) -> usize {
        self.fuzzy_matching.size_tolerance
    }

    #[must_use]
    pub fn synonym_mapping(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fuzzy_matching.synonym_mapping
    }

    /// Check the ontology is internally consistent
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.version.trim().is_empty() {
            return Err("ontology version is empty".to_string());
        }
        if self.dimensions.is_empty() {
            return Err("ontology declares no dimensions".to_string());
        }
        for (dimension, spec) in &self.dimensions {
            if spec.value_type == DimensionType::Enum && spec.values.is_empty() {
                return Err(format!(
                    "enum dimension '{dimension}' declares no values"
                ));
            }
        }
        let fuzzy = &self.fuzzy_matching;
        if !fuzzy.size_order.is_empty() && fuzzy.size_tolerance >= fuzzy.size_order.len() {
            return Err(format!(
                "size_tolerance {} must be smaller than the size scale ({} entries)",
                fuzzy.size_tolerance,
                fuzzy.size_order.len()
            ));
        }
        Ok(())
    }

    /// Report disease features the ontology does not know about.
    ///
    /// These are warnings only: the ontology documents the vocabulary while
    /// the rule tables decide how values compare.
    #[must_use]
    pub fn cross_check(&self, disease: &DiseaseDefinition) -> Vec<String> {
        let mut warnings = Vec::new();
        for (tier, group) in disease.feature_importance.tiers() {
            for feature in &group.features {
                let Some(spec) = self.dimension(&feature.dimension) else {
                    warnings.push(format!(
                        "disease '{}' {tier} feature uses undeclared dimension '{}'",
                        disease.disease_id, feature.dimension
                    ));
                    continue;
                };
                for value in feature.expected_values.iter() {
                    if !spec.allows(value) {
                        warnings.push(format!(
                            "disease '{}' expects '{value}' for '{}', outside the ontology domain",
                            disease.disease_id, feature.dimension
                        ));
                    }
                }
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ontology() -> FeatureOntology {
        serde_json::from_value(serde_json::json!({
            "version": "2.1",
            "dimensions": {
                "symptom_type": {
                    "type": "enum",
                    "values": ["necrosis_spot", "powdery_coating"],
                    "description": "Primary symptom"
                },
                "color_center": {"type": "string", "description": "Lesion center color"},
                "has_abnormality": {"type": "boolean"}
            },
            "fuzzy_matching": {
                "color_aliases": {"black": ["deep_black"]},
                "size_order": ["pinpoint", "small", "medium", "large"],
                "size_tolerance": 1,
                "synonym_mapping": {"necrosis_spot": ["necrotic_spot"]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let o = ontology();
        assert_eq!(o.version(), "2.1");
        assert!(o.declares(&Dimension::SymptomType));
        assert!(!o.declares(&Dimension::Size));
        assert_eq!(o.size_order().len(), 4);
        assert_eq!(o.size_tolerance(), 1);
        assert_eq!(o.color_aliases()["black"], vec!["deep_black".to_string()]);
        assert!(o.synonym_mapping().contains_key("necrosis_spot"));
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_domain_checks() {
        let o = ontology();
        let symptom = o.dimension(&Dimension::SymptomType).unwrap();
        assert!(symptom.allows("Necrosis Spot"));
        assert!(!symptom.allows("rust_pustule"));
        assert!(o.dimension(&Dimension::ColorCenter).unwrap().allows("anything"));
        assert!(o.dimension(&Dimension::HasAbnormality).unwrap().allows("true"));
        assert!(!o.dimension(&Dimension::HasAbnormality).unwrap().allows("maybe"));
    }

    #[test]
    fn test_validate_rejects_tolerance_beyond_scale() {
        let mut o = ontology();
        o.fuzzy_matching.size_tolerance = 4;
        assert!(o.validate().unwrap_err().contains("size_tolerance"));
    }

    #[test]
    fn test_validate_rejects_empty_enum() {
        let mut o = ontology();
        o.dimensions.get_mut(&Dimension::SymptomType).unwrap().values.clear();
        assert!(o.validate().unwrap_err().contains("declares no values"));
    }

    #[test]
    fn test_missing_dimensions_is_schema_error() {
        let result: Result<FeatureOntology, _> =
            serde_json::from_value(serde_json::json!({"version": "1.0"}));
        assert!(result.is_err());
    }
}

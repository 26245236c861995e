use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::observation::FeatureVector;
use crate::core::types::{normalize_value, Completeness, DiseaseId, Dimension, ImportanceTier};
use crate::matching::scoring::TierWeights;
use crate::utils::validation::{check_unit_interval, check_weight_sum, is_valid_identifier};

/// A single value or a list of values, as written in disease files.
///
/// `"symptom_type": "necrosis_spot"` and `"symptom_type": ["necrosis_spot"]`
/// are equivalent; booleans are accepted for flag dimensions.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
    Flag(bool),
}

/// Ordered list of expected values for one dimension
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct ValueList(pub Vec<String>);

impl From<OneOrMany> for ValueList {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => Self(vec![s]),
            OneOrMany::Many(v) => Self(v),
            OneOrMany::Flag(b) => Self(vec![b.to_string()]),
        }
    }
}

impl ValueList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

/// One expected attribute of a disease, with its weight inside its tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExpectation {
    pub dimension: Dimension,
    pub expected_values: ValueList,
    pub weight: f64,
}

/// A group of features sharing an importance tier
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportanceGroup {
    /// Group weight override; the scoring configuration supplies the default
    #[serde(rename = "_weight", default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(default)]
    pub features: Vec<FeatureExpectation>,
}

impl ImportanceGroup {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    fn feature_weight_sum(&self) -> f64 {
        self.features.iter().map(|f| f.weight).sum()
    }
}

/// Feature importance partitioned into major/minor/optional tiers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub major_features: ImportanceGroup,

    #[serde(default)]
    pub minor_features: ImportanceGroup,

    #[serde(default)]
    pub optional_features: ImportanceGroup,
}

impl FeatureImportance {
    #[must_use]
    pub fn group(&self, tier: ImportanceTier) -> &ImportanceGroup {
        match tier {
            ImportanceTier::Major => &self.major_features,
            ImportanceTier::Minor => &self.minor_features,
            ImportanceTier::Optional => &self.optional_features,
        }
    }

    /// Group weight used for scoring: the override, else the configured default
    #[must_use]
    pub fn effective_weight(&self, tier: ImportanceTier, defaults: &TierWeights) -> f64 {
        self.group(tier).weight.unwrap_or_else(|| defaults.get(tier))
    }

    /// Iterate tiers in precedence order
    pub fn tiers(&self) -> impl Iterator<Item = (ImportanceTier, &ImportanceGroup)> {
        ImportanceTier::ALL.into_iter().map(|t| (t, self.group(t)))
    }
}

/// Diagnosis rules carried through to callers untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagnosisRules {
    #[serde(default)]
    pub confirmed_rules: Vec<serde_json::Value>,

    #[serde(default)]
    pub suspected_rules: Vec<serde_json::Value>,
}

/// A disease in the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseDefinition {
    pub version: String,

    pub disease_id: DiseaseId,

    /// Primary display name
    pub disease_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name_en: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pathogen: Option<String>,

    /// Canonical expected values per dimension
    #[serde(default)]
    pub feature_vector: BTreeMap<Dimension, ValueList>,

    pub feature_importance: FeatureImportance,

    #[serde(default)]
    pub diagnosis_rules: DiagnosisRules,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub visual_descriptions: BTreeMap<String, String>,

    /// Host genera this disease affects
    #[serde(default)]
    pub host_plants: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub typical_symptoms: Vec<String>,
}

impl DiseaseDefinition {
    /// All values this disease expects for a dimension, de-duplicated after
    /// normalization, canonical feature vector first.
    #[must_use]
    pub fn expected_values(&self, dimension: &Dimension) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let from_vector = self
            .feature_vector
            .get(dimension)
            .into_iter()
            .flat_map(ValueList::iter);
        let from_importance = self
            .feature_importance
            .tiers()
            .flat_map(|(_, g)| g.features.iter())
            .filter(|f| &f.dimension == dimension)
            .flat_map(|f| f.expected_values.iter());

        for value in from_vector.chain(from_importance) {
            let normalized = normalize_value(value);
            if !normalized.is_empty() && !out.contains(&normalized) {
                out.push(normalized);
            }
        }
        out
    }

    /// Build the observation this disease would produce in a textbook case.
    ///
    /// For each dimension the first expected value of the highest-importance
    /// entry wins, falling back to the canonical feature vector.
    #[must_use]
    pub fn canonical_observation(&self) -> FeatureVector {
        let mut observation = FeatureVector {
            host_genus: self.host_plants.first().cloned(),
            completeness: Some(Completeness::Complete),
            has_abnormality: Some(true),
            ..FeatureVector::default()
        };

        for (dimension, values) in &self.feature_vector {
            if let Some(value) = values.first() {
                observation.set(dimension, value);
            }
        }

        // Walk tiers from least to most important so major entries overwrite
        for tier in ImportanceTier::ALL.iter().rev() {
            for feature in &self.feature_importance.group(*tier).features {
                if let Some(value) = feature.expected_values.first() {
                    observation.set(&feature.dimension, value);
                }
            }
        }

        observation
    }

    /// Check structural and weight invariants.
    ///
    /// Group weights are checked after merging any `_weight` overrides with
    /// `default_group_weights`. Returns the list of soft warnings on success.
    /// Weight invariants are hard errors when `strict_weights` is set and
    /// warnings otherwise.
    ///
    /// # Errors
    ///
    /// Returns a description of the first hard violation found.
    pub fn validate(
        &self,
        strict_weights: bool,
        default_group_weights: &TierWeights,
    ) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if !is_valid_identifier(self.disease_id.as_str()) {
            return Err(format!(
                "invalid disease_id '{}': expected lowercase letters, digits, '_', '-' or '.'",
                self.disease_id
            ));
        }
        if self.disease_name.trim().is_empty() {
            return Err(format!("disease '{}' has an empty disease_name", self.disease_id));
        }
        if self.version.trim().is_empty() {
            return Err(format!("disease '{}' has an empty version", self.disease_id));
        }
        if self.feature_importance.major_features.is_empty() {
            return Err(format!(
                "disease '{}' declares no major features",
                self.disease_id
            ));
        }
        if self.host_plants.is_empty() {
            warnings.push(format!(
                "disease '{}' lists no host plants and can only be reached by id",
                self.disease_id
            ));
        }
        if self.host_plants.iter().any(|h| h.trim().is_empty()) {
            return Err(format!("disease '{}' has an empty host plant entry", self.disease_id));
        }

        let mut weight_issues = Vec::new();

        for (tier, group) in self.feature_importance.tiers() {
            if let Some(w) = group.weight {
                if !w.is_finite() {
                    return Err(format!(
                        "disease '{}' {tier} group weight is not a number",
                        self.disease_id
                    ));
                }
                if let Some(issue) = check_unit_interval(w, &format!("{tier} group weight")) {
                    weight_issues.push(issue);
                }
            }

            let mut seen = Vec::new();
            for feature in &group.features {
                if feature.expected_values.0.is_empty()
                    || feature.expected_values.iter().all(|v| v.trim().is_empty())
                {
                    return Err(format!(
                        "disease '{}' {tier} feature '{}' has no expected values",
                        self.disease_id, feature.dimension
                    ));
                }
                if !feature.weight.is_finite() {
                    return Err(format!(
                        "disease '{}' {tier} feature '{}' weight is not a number",
                        self.disease_id, feature.dimension
                    ));
                }
                if let Some(issue) = check_unit_interval(
                    feature.weight,
                    &format!("{tier} feature '{}' weight", feature.dimension),
                ) {
                    weight_issues.push(issue);
                }
                if seen.contains(&&feature.dimension) {
                    warnings.push(format!(
                        "disease '{}' lists dimension '{}' twice in the {tier} tier",
                        self.disease_id, feature.dimension
                    ));
                }
                seen.push(&feature.dimension);
            }

            if !group.is_empty() {
                if let Some(issue) = check_weight_sum(
                    group.feature_weight_sum(),
                    1.0,
                    &format!("{tier} feature weights"),
                ) {
                    weight_issues.push(issue);
                }
            }
        }

        let importance = &self.feature_importance;
        if importance.tiers().any(|(_, g)| g.weight.is_some()) {
            let effective: f64 = ImportanceTier::ALL
                .into_iter()
                .map(|tier| importance.effective_weight(tier, default_group_weights))
                .sum();
            if let Some(issue) = check_weight_sum(effective, 1.0, "effective group weights") {
                weight_issues.push(issue);
            }
        }

        if let Some(first) = weight_issues.first() {
            if strict_weights {
                return Err(format!("disease '{}': {first}", self.disease_id));
            }
            warnings.extend(
                weight_issues
                    .into_iter()
                    .map(|issue| format!("disease '{}': {issue}", self.disease_id)),
            );
        }

        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "version": "1.0",
            "disease_id": "rose_black_spot",
            "disease_name": "Rose black spot",
            "common_name_en": "Black spot",
            "pathogen": "Diplocarpon rosae",
            "feature_vector": {
                "symptom_type": "necrosis_spot",
                "color_center": ["black"],
                "color_border": ["yellow", "light_yellow"],
                "has_abnormality": true
            },
            "feature_importance": {
                "major_features": {
                    "_weight": 0.8,
                    "features": [
                        {"dimension": "symptom_type", "expected_values": ["necrosis_spot"], "weight": 0.5},
                        {"dimension": "color_border", "expected_values": ["yellow", "light_yellow"], "weight": 0.5}
                    ]
                },
                "minor_features": {
                    "_weight": 0.15,
                    "features": [
                        {"dimension": "color_center", "expected_values": ["black"], "weight": 1.0}
                    ]
                }
            },
            "host_plants": ["Rosa"]
        })
    }

    fn sample() -> DiseaseDefinition {
        serde_json::from_value(sample_json()).unwrap()
    }

    #[test]
    fn test_parse_one_or_many_values() {
        let d = sample();
        assert_eq!(
            d.feature_vector[&Dimension::SymptomType].0,
            vec!["necrosis_spot".to_string()]
        );
        assert_eq!(d.feature_vector[&Dimension::HasAbnormality].0, vec!["true"]);
        assert!(d.feature_importance.optional_features.is_empty());
        assert_eq!(d.feature_importance.major_features.weight, Some(0.8));
    }

    #[test]
    fn test_expected_values_deduplicated() {
        let d = sample();
        assert_eq!(
            d.expected_values(&Dimension::ColorBorder),
            vec!["yellow".to_string(), "light_yellow".to_string()]
        );
        assert!(d.expected_values(&Dimension::Size).is_empty());
    }

    #[test]
    fn test_canonical_observation_prefers_major_values() {
        let d = sample();
        let obs = d.canonical_observation();
        assert_eq!(obs.symptom_type.as_deref(), Some("necrosis_spot"));
        assert_eq!(obs.color_border.as_deref(), Some("yellow"));
        assert_eq!(obs.color_center.as_deref(), Some("black"));
        assert_eq!(obs.host_genus.as_deref(), Some("Rosa"));
        assert_eq!(obs.completeness, Some(Completeness::Complete));
    }

    #[test]
    fn test_validate_ok() {
        let warnings = sample().validate(true, &TierWeights::default()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_weight_sum_strict_and_lenient() {
        let mut json = sample_json();
        json["feature_importance"]["major_features"]["features"][0]["weight"] =
            serde_json::json!(0.3);
        let d: DiseaseDefinition = serde_json::from_value(json).unwrap();

        let err = d.validate(true, &TierWeights::default()).unwrap_err();
        assert!(err.contains("major feature weights"), "{err}");

        let warnings = d.validate(false, &TierWeights::default()).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_validate_partial_group_override() {
        // Only major overridden: 0.9 + 0.15 + 0.05 from the defaults
        let mut json = sample_json();
        json["feature_importance"]["major_features"]["_weight"] = serde_json::json!(0.9);
        json["feature_importance"]["minor_features"]
            .as_object_mut()
            .unwrap()
            .remove("_weight");
        let d: DiseaseDefinition = serde_json::from_value(json).unwrap();

        let err = d.validate(true, &TierWeights::default()).unwrap_err();
        assert!(err.contains("effective group weights sum to 1.100"), "{err}");
        assert_eq!(d.validate(false, &TierWeights::default()).unwrap().len(), 1);

        // The same override is sound against defaults that leave room for it
        let roomy = TierWeights {
            major: 0.7,
            minor: 0.05,
            optional: 0.05,
        };
        assert!(d.validate(true, &roomy).unwrap().is_empty());
    }

    #[test]
    fn test_effective_weight_falls_back_to_defaults() {
        let d = sample();
        let defaults = TierWeights::default();
        let fi = &d.feature_importance;
        assert!((fi.effective_weight(ImportanceTier::Major, &defaults) - 0.8).abs() < 0.001);
        assert!((fi.effective_weight(ImportanceTier::Optional, &defaults) - 0.05).abs() < 0.001);
    }

    #[test]
    fn test_validate_rejects_missing_major() {
        let mut json = sample_json();
        json["feature_importance"]["major_features"]["features"] = serde_json::json!([]);
        let d: DiseaseDefinition = serde_json::from_value(json).unwrap();
        assert!(d
            .validate(false, &TierWeights::default())
            .unwrap_err()
            .contains("no major features"));
    }

    #[test]
    fn test_validate_rejects_bad_id() {
        let mut json = sample_json();
        json["disease_id"] = serde_json::json!("Rose Black Spot");
        let d: DiseaseDefinition = serde_json::from_value(json).unwrap();
        assert!(d
            .validate(true, &TierWeights::default())
            .unwrap_err()
            .contains("invalid disease_id"));
    }

    #[test]
    fn test_missing_required_field_fails_deserialization() {
        let mut json = sample_json();
        json.as_object_mut().unwrap().remove("feature_importance");
        assert!(serde_json::from_value::<DiseaseDefinition>(json).is_err());
    }
}

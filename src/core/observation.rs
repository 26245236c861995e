use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::types::{normalize_value, Completeness, Dimension};

/// A structured observation produced by the upstream extraction stage.
///
/// The core never mutates an observation; it is read once per diagnosis call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    // === Fixed classification dimensions ===
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_category: Option<String>,

    /// Host plant genus, used to pre-filter candidate diseases
    #[serde(default, alias = "genus", skip_serializing_if = "Option::is_none")]
    pub host_genus: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organ: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_abnormality: Option<bool>,

    // === Free symptom dimensions ===
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptom_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_center: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_border: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,

    /// Open extension map for dimensions outside the fixed set, keyed by
    /// normalized dimension name
    #[serde(
        default,
        alias = "extra_features",
        deserialize_with = "normalized_keys",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub extra: BTreeMap<String, String>,
}

/// Extension keys are dimension names: `"Leaf Texture"` is `leaf_texture`
fn normalized_keys<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| (normalize_value(&key), value))
        .collect())
}

impl FeatureVector {
    /// Load an observation from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid observation.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Observed value for a dimension; `None` when the observation is silent
    #[must_use]
    pub fn get(&self, dimension: &Dimension) -> Option<&str> {
        let value = match dimension {
            Dimension::ContentType => self.content_type.as_deref(),
            Dimension::PlantCategory => self.plant_category.as_deref(),
            Dimension::HostGenus => self.host_genus.as_deref(),
            Dimension::Organ => self.organ.as_deref(),
            Dimension::Completeness => self.completeness.map(Completeness::as_str),
            Dimension::HasAbnormality => {
                self.has_abnormality.map(|b| if b { "true" } else { "false" })
            }
            Dimension::SymptomType => self.symptom_type.as_deref(),
            Dimension::ColorCenter => self.color_center.as_deref(),
            Dimension::ColorBorder => self.color_border.as_deref(),
            Dimension::Location => self.location.as_deref(),
            Dimension::Size => self.size.as_deref(),
            Dimension::Distribution => self.distribution.as_deref(),
            Dimension::Other(name) => self.extra.get(&normalize_value(name)).map(String::as_str),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Set a dimension's value; used when building synthetic observations
    pub fn set(&mut self, dimension: &Dimension, value: &str) {
        let value = value.to_string();
        match dimension {
            Dimension::ContentType => self.content_type = Some(value),
            Dimension::PlantCategory => self.plant_category = Some(value),
            Dimension::HostGenus => self.host_genus = Some(value),
            Dimension::Organ => self.organ = Some(value),
            Dimension::Completeness => self.completeness = Some(Completeness::parse(&value)),
            Dimension::HasAbnormality => self.has_abnormality = value.parse().ok(),
            Dimension::SymptomType => self.symptom_type = Some(value),
            Dimension::ColorCenter => self.color_center = Some(value),
            Dimension::ColorBorder => self.color_border = Some(value),
            Dimension::Location => self.location = Some(value),
            Dimension::Size => self.size = Some(value),
            Dimension::Distribution => self.distribution = Some(value),
            Dimension::Other(name) => {
                self.extra.insert(normalize_value(name), value);
            }
        }
    }

    /// Completeness of the observation; unspecified counts as complete
    #[must_use]
    pub fn completeness(&self) -> Completeness {
        self.completeness.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_observation() {
        let obs: FeatureVector = serde_json::from_str(
            r#"{
                "content_type": "plant",
                "genus": "Rosa",
                "completeness": "partial",
                "has_abnormality": true,
                "symptom_type": "necrosis_spot",
                "color_center": "black",
                "extra_features": {"texture": "powdery"}
            }"#,
        )
        .unwrap();

        assert_eq!(obs.host_genus.as_deref(), Some("Rosa"));
        assert_eq!(obs.completeness(), Completeness::Partial);
        assert_eq!(obs.get(&Dimension::SymptomType), Some("necrosis_spot"));
        assert_eq!(obs.get(&Dimension::HasAbnormality), Some("true"));
        assert_eq!(obs.get(&Dimension::Completeness), Some("partial"));
        assert_eq!(
            obs.get(&Dimension::Other("texture".into())),
            Some("powdery")
        );
        assert_eq!(obs.get(&Dimension::Size), None);
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let obs = FeatureVector {
            color_border: Some("   ".to_string()),
            ..FeatureVector::default()
        };
        assert_eq!(obs.get(&Dimension::ColorBorder), None);
    }

    #[test]
    fn test_set_and_get() {
        let mut obs = FeatureVector::default();
        obs.set(&Dimension::Size, "small");
        obs.set(&Dimension::Completeness, "close_up");
        obs.set(&Dimension::Other("odor".into()), "musty");
        assert_eq!(obs.get(&Dimension::Size), Some("small"));
        assert_eq!(obs.completeness(), Completeness::CloseUp);
        assert_eq!(obs.extra.get("odor").map(String::as_str), Some("musty"));
    }

    #[test]
    fn test_completeness_spelling_variants() {
        for (text, expected) in [
            ("close-up", Completeness::CloseUp),
            ("Close Up", Completeness::CloseUp),
            ("Partial", Completeness::Partial),
        ] {
            let obs: FeatureVector =
                serde_json::from_value(serde_json::json!({"completeness": text})).unwrap();
            assert_eq!(obs.completeness(), expected, "{text}");
        }

        let mut obs = FeatureVector::default();
        obs.set(&Dimension::Completeness, "Close-Up");
        assert_eq!(obs.completeness(), Completeness::CloseUp);
    }

    #[test]
    fn test_extension_keys_normalized() {
        let obs: FeatureVector =
            serde_json::from_value(serde_json::json!({"extra": {"Leaf Texture": "waxy"}}))
                .unwrap();
        assert_eq!(obs.get(&Dimension::parse("leaf_texture")), Some("waxy"));
        assert_eq!(obs.get(&Dimension::parse("Leaf-Texture")), Some("waxy"));
        assert_eq!(
            obs.get(&Dimension::Other("Leaf Texture".to_string())),
            Some("waxy")
        );
    }

    #[test]
    fn test_default_completeness_is_complete() {
        assert_eq!(FeatureVector::default().completeness(), Completeness::Complete);
    }
}

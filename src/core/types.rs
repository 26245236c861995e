use serde::{Deserialize, Serialize};

/// Unique identifier for a disease in the knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiseaseId(pub String);

impl DiseaseId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DiseaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalize an attribute value for comparison.
///
/// Trims, lowercases and folds spaces and hyphens to underscores so that
/// `"Light Yellow"`, `"light-yellow"` and `"light_yellow"` compare equal.
#[must_use]
pub fn normalize_value(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// An observable attribute of a diseased plant.
///
/// The first six variants are the fixed classification dimensions every
/// observation carries; the next six are the free symptom dimensions. Any other
/// identifier used by a disease definition is kept as [`Dimension::Other`] and
/// resolved against the observation's extension map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Dimension {
    ContentType,
    PlantCategory,
    HostGenus,
    Organ,
    Completeness,
    HasAbnormality,
    SymptomType,
    ColorCenter,
    ColorBorder,
    Location,
    Size,
    Distribution,
    Other(String),
}

impl Dimension {
    /// Parse a dimension identifier (e.g. `"color_center"`)
    pub fn parse(s: &str) -> Self {
        match normalize_value(s).as_str() {
            "content_type" => Self::ContentType,
            "plant_category" => Self::PlantCategory,
            "host_genus" | "genus" => Self::HostGenus,
            "organ" => Self::Organ,
            "completeness" => Self::Completeness,
            "has_abnormality" => Self::HasAbnormality,
            "symptom_type" => Self::SymptomType,
            "color_center" => Self::ColorCenter,
            "color_border" => Self::ColorBorder,
            "location" => Self::Location,
            "size" => Self::Size,
            "distribution" => Self::Distribution,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ContentType => "content_type",
            Self::PlantCategory => "plant_category",
            Self::HostGenus => "host_genus",
            Self::Organ => "organ",
            Self::Completeness => "completeness",
            Self::HasAbnormality => "has_abnormality",
            Self::SymptomType => "symptom_type",
            Self::ColorCenter => "color_center",
            Self::ColorBorder => "color_border",
            Self::Location => "location",
            Self::Size => "size",
            Self::Distribution => "distribution",
            Self::Other(name) => name,
        }
    }

    /// The fuzzy rule table that governs this dimension, if any
    #[must_use]
    pub fn fuzzy_kind(&self) -> Option<FuzzyKind> {
        match self {
            Self::ColorCenter | Self::ColorBorder => Some(FuzzyKind::Color),
            Self::Size => Some(FuzzyKind::Size),
            Self::SymptomType => Some(FuzzyKind::Symptom),
            Self::Location => Some(FuzzyKind::Location),
            Self::Distribution => Some(FuzzyKind::Distribution),
            _ => None,
        }
    }
}

impl From<String> for Dimension {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Dimension> for String {
    fn from(d: Dimension) -> Self {
        d.as_str().to_string()
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The five attribute families the fuzzy engine knows how to compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyKind {
    Color,
    Size,
    Symptom,
    Location,
    Distribution,
}

impl FuzzyKind {
    pub const ALL: [FuzzyKind; 5] = [
        FuzzyKind::Color,
        FuzzyKind::Size,
        FuzzyKind::Symptom,
        FuzzyKind::Location,
        FuzzyKind::Distribution,
    ];

    /// Parse a dimension family name as typed on the command line
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_value(s).as_str() {
            "color" | "colour" => Some(Self::Color),
            "size" => Some(Self::Size),
            "symptom" | "symptom_type" => Some(Self::Symptom),
            "location" => Some(Self::Location),
            "distribution" => Some(Self::Distribution),
            _ => Dimension::parse(s).fuzzy_kind(),
        }
    }

    /// File name of the rule table for this family
    #[must_use]
    pub fn rules_file_name(self) -> &'static str {
        match self {
            Self::Color => "color_rules.json",
            Self::Size => "size_rules.json",
            Self::Symptom => "symptom_rules.json",
            Self::Location => "location_rules.json",
            Self::Distribution => "distribution_rules.json",
        }
    }
}

impl std::fmt::Display for FuzzyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Color => write!(f, "color"),
            Self::Size => write!(f, "size"),
            Self::Symptom => write!(f, "symptom"),
            Self::Location => write!(f, "location"),
            Self::Distribution => write!(f, "distribution"),
        }
    }
}

/// Importance tier of a diagnostic feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceTier {
    Major,
    Minor,
    Optional,
}

impl ImportanceTier {
    pub const ALL: [ImportanceTier; 3] = [
        ImportanceTier::Major,
        ImportanceTier::Minor,
        ImportanceTier::Optional,
    ];
}

impl std::fmt::Display for ImportanceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// How an observed value matched an expected value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    None,
}

impl MatchKind {
    #[must_use]
    pub fn is_match(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Fuzzy => write!(f, "fuzzy"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Three-valued diagnostic verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Unlikely,
    Suspected,
    Confirmed,
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unlikely => write!(f, "unlikely"),
            Self::Suspected => write!(f, "suspected"),
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// How much of the diagnostic subject was visible in the observation.
///
/// Read from free text the same way as every other observed value, so
/// `"close-up"`, `"Close Up"` and `"close_up"` are the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Completeness {
    #[default]
    Complete,
    Partial,
    CloseUp,
    /// Any value the extraction stage produced that we do not recognise
    Unknown,
}

impl Completeness {
    /// Parse a completeness level after normalization; unrecognised text is `Unknown`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match normalize_value(s).as_str() {
            "complete" | "full" => Self::Complete,
            "partial" => Self::Partial,
            "close_up" | "closeup" => Self::CloseUp,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::CloseUp => "close_up",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for Completeness {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl std::fmt::Display for Completeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value("  Light Yellow "), "light_yellow");
        assert_eq!(normalize_value("light-yellow"), "light_yellow");
        assert_eq!(normalize_value("black"), "black");
    }

    #[test]
    fn test_dimension_roundtrip_names() {
        assert_eq!(Dimension::parse("color_center"), Dimension::ColorCenter);
        assert_eq!(Dimension::parse("Genus"), Dimension::HostGenus);
        assert_eq!(
            Dimension::parse("texture"),
            Dimension::Other("texture".to_string())
        );
        assert_eq!(Dimension::Other("texture".into()).as_str(), "texture");

        let json = serde_json::to_string(&Dimension::ColorBorder).unwrap();
        assert_eq!(json, "\"color_border\"");
        let back: Dimension = serde_json::from_str("\"symptom_type\"").unwrap();
        assert_eq!(back, Dimension::SymptomType);
    }

    #[test]
    fn test_fuzzy_kind_mapping() {
        assert_eq!(Dimension::ColorCenter.fuzzy_kind(), Some(FuzzyKind::Color));
        assert_eq!(Dimension::ColorBorder.fuzzy_kind(), Some(FuzzyKind::Color));
        assert_eq!(Dimension::Organ.fuzzy_kind(), None);
        assert_eq!(FuzzyKind::parse("colour"), Some(FuzzyKind::Color));
        assert_eq!(FuzzyKind::parse("color_border"), Some(FuzzyKind::Color));
        assert_eq!(FuzzyKind::parse("organ"), None);
    }

    #[test]
    fn test_completeness_unknown_value() {
        let c: Completeness = serde_json::from_str("\"close_up\"").unwrap();
        assert_eq!(c, Completeness::CloseUp);
        let c: Completeness = serde_json::from_str("\"blurry\"").unwrap();
        assert_eq!(c, Completeness::Unknown);
    }

    #[test]
    fn test_completeness_spellings_normalized() {
        for text in ["close-up", "Close_Up", "close up", " CLOSE-UP "] {
            let c: Completeness = serde_json::from_value(serde_json::json!(text)).unwrap();
            assert_eq!(c, Completeness::CloseUp, "{text}");
        }
        assert_eq!(Completeness::parse("Partial"), Completeness::Partial);
        assert_eq!(Completeness::parse("Complete"), Completeness::Complete);

        // Serialized form stays canonical
        let json = serde_json::to_string(&Completeness::CloseUp).unwrap();
        assert_eq!(json, "\"close_up\"");
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceTier::Confirmed > ConfidenceTier::Suspected);
        assert!(ConfidenceTier::Suspected > ConfidenceTier::Unlikely);
    }
}

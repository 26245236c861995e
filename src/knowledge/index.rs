use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::core::disease::DiseaseDefinition;
use crate::core::types::{normalize_value, DiseaseId, Dimension};

/// Index sizes, for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStatistics {
    pub disease_count: usize,
    pub host_count: usize,
    pub symptom_type_count: usize,
    pub center_color_count: usize,
    pub border_color_count: usize,
    /// Total postings across the four lookup maps
    pub index_entry_count: usize,
}

/// Multi-key lookup over one immutable disease set.
///
/// Keys are normalized; postings hold positions into `diseases` in load order,
/// so every lookup returns diseases in a stable order.
#[derive(Debug, Default)]
pub struct DiseaseIndex {
    diseases: Vec<Arc<DiseaseDefinition>>,

    /// Index: disease ID -> position
    id_to_index: HashMap<DiseaseId, usize>,

    /// Index: host genus -> positions
    by_host: HashMap<String, Vec<usize>>,

    /// Index: symptom type -> positions
    by_symptom: HashMap<String, Vec<usize>>,

    /// Index: lesion center color -> positions
    by_center_color: HashMap<String, Vec<usize>>,

    /// Index: lesion border color -> positions
    by_border_color: HashMap<String, Vec<usize>>,
}

impl DiseaseIndex {
    /// Build every lookup structure in one pass over the diseases
    #[must_use]
    pub fn build(diseases: Vec<Arc<DiseaseDefinition>>) -> Self {
        let mut index = Self::default();
        for disease in diseases {
            index.add_disease(disease);
        }
        index
    }

    fn add_disease(&mut self, disease: Arc<DiseaseDefinition>) {
        let position = self.diseases.len();

        self.id_to_index.insert(disease.disease_id.clone(), position);

        let mut hosts: HashSet<String> = HashSet::new();
        for host in &disease.host_plants {
            let key = normalize_value(host);
            if hosts.insert(key.clone()) {
                self.by_host.entry(key).or_default().push(position);
            }
        }

        for value in disease.expected_values(&Dimension::SymptomType) {
            self.by_symptom.entry(value).or_default().push(position);
        }
        for value in disease.expected_values(&Dimension::ColorCenter) {
            self.by_center_color.entry(value).or_default().push(position);
        }
        for value in disease.expected_values(&Dimension::ColorBorder) {
            self.by_border_color.entry(value).or_default().push(position);
        }

        self.diseases.push(disease);
    }

    fn resolve(&self, positions: &[usize]) -> Vec<Arc<DiseaseDefinition>> {
        positions
            .iter()
            .map(|&idx| Arc::clone(&self.diseases[idx]))
            .collect()
    }

    /// All diseases in load order
    #[must_use]
    pub fn diseases(&self) -> &[Arc<DiseaseDefinition>] {
        &self.diseases
    }

    /// Get a disease by ID
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<DiseaseDefinition>> {
        self.id_to_index
            .get(&DiseaseId::new(id))
            .map(|&idx| &self.diseases[idx])
    }

    /// Diseases listing `genus` as a host; unknown genus yields an empty list
    #[must_use]
    pub fn by_host(&self, genus: &str) -> Vec<Arc<DiseaseDefinition>> {
        self.by_host
            .get(&normalize_value(genus))
            .map(|positions| self.resolve(positions))
            .unwrap_or_default()
    }

    /// De-duplicated union over several genera; first occurrence wins the position
    #[must_use]
    pub fn by_hosts<S: AsRef<str>>(&self, genera: &[S]) -> Vec<Arc<DiseaseDefinition>> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut positions = Vec::new();

        for genus in genera {
            if let Some(hits) = self.by_host.get(&normalize_value(genus.as_ref())) {
                for &idx in hits {
                    if seen.insert(idx) {
                        positions.push(idx);
                    }
                }
            }
        }

        self.resolve(&positions)
    }

    /// Coarse pre-filter: diseases expecting both this symptom type and this
    /// center color. Without a color only the symptom index is consulted.
    #[must_use]
    pub fn by_symptom(
        &self,
        symptom_type: &str,
        center_color: Option<&str>,
    ) -> Vec<Arc<DiseaseDefinition>> {
        let Some(symptom_hits) = self.by_symptom.get(&normalize_value(symptom_type)) else {
            return Vec::new();
        };

        let Some(color) = center_color else {
            return self.resolve(symptom_hits);
        };

        let color_hits: HashSet<usize> = self
            .by_center_color
            .get(&normalize_value(color))
            .map(|hits| hits.iter().copied().collect())
            .unwrap_or_default();

        let intersection: Vec<usize> = symptom_hits
            .iter()
            .copied()
            .filter(|idx| color_hits.contains(idx))
            .collect();

        self.resolve(&intersection)
    }

    /// Diseases expecting this border color
    #[must_use]
    pub fn by_border_color(&self, color: &str) -> Vec<Arc<DiseaseDefinition>> {
        self.by_border_color
            .get(&normalize_value(color))
            .map(|positions| self.resolve(positions))
            .unwrap_or_default()
    }

    /// Known host genera (normalized), sorted
    #[must_use]
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = self.by_host.keys().map(String::as_str).collect();
        hosts.sort_unstable();
        hosts
    }

    #[must_use]
    pub fn statistics(&self) -> IndexStatistics {
        let postings = |map: &HashMap<String, Vec<usize>>| map.values().map(Vec::len).sum::<usize>();
        IndexStatistics {
            disease_count: self.diseases.len(),
            host_count: self.by_host.len(),
            symptom_type_count: self.by_symptom.len(),
            center_color_count: self.by_center_color.len(),
            border_color_count: self.by_border_color.len(),
            index_entry_count: postings(&self.by_host)
                + postings(&self.by_symptom)
                + postings(&self.by_center_color)
                + postings(&self.by_border_color),
        }
    }

    /// Number of diseases in the index
    #[must_use]
    pub fn len(&self) -> usize {
        self.diseases.len()
    }

    /// Check if the index is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diseases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disease(id: &str, hosts: &[&str], symptom: &str, center: &str, border: &str) -> Arc<DiseaseDefinition> {
        let json = serde_json::json!({
            "version": "1.0",
            "disease_id": id,
            "disease_name": id,
            "feature_vector": {
                "symptom_type": symptom,
                "color_center": center,
                "color_border": border
            },
            "feature_importance": {
                "major_features": {
                    "features": [
                        {"dimension": "symptom_type", "expected_values": [symptom], "weight": 1.0}
                    ]
                }
            },
            "host_plants": hosts
        });
        Arc::new(serde_json::from_value(json).unwrap())
    }

    fn index() -> DiseaseIndex {
        DiseaseIndex::build(vec![
            disease("black_spot", &["Rosa"], "necrosis_spot", "black", "yellow"),
            disease("apple_scab", &["Malus", "Pyrus"], "necrosis_spot", "olive", "brown"),
            disease("powdery_mildew", &["Rosa", "Malus"], "powdery_coating", "white", "none"),
        ])
    }

    fn ids(diseases: &[Arc<DiseaseDefinition>]) -> Vec<&str> {
        diseases.iter().map(|d| d.disease_id.as_str()).collect()
    }

    #[test]
    fn test_by_host() {
        let index = index();
        assert_eq!(ids(&index.by_host("Rosa")), vec!["black_spot", "powdery_mildew"]);
        assert_eq!(ids(&index.by_host("rosa")), vec!["black_spot", "powdery_mildew"]);
        assert!(index.by_host("Quercus").is_empty());
    }

    #[test]
    fn test_by_hosts_union_first_occurrence() {
        let index = index();
        let union = index.by_hosts(&["Malus", "Rosa"]);
        assert_eq!(ids(&union), vec!["apple_scab", "powdery_mildew", "black_spot"]);

        // Equals the de-duplicated concatenation of the single lookups
        let mut expected: Vec<&str> = Vec::new();
        let malus = index.by_host("Malus");
        let rosa = index.by_host("Rosa");
        for id in ids(&malus).into_iter().chain(ids(&rosa)) {
            if !expected.contains(&id) {
                expected.push(id);
            }
        }
        assert_eq!(ids(&union), expected);

        assert!(index.by_hosts::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_by_symptom_intersection() {
        let index = index();
        assert_eq!(
            ids(&index.by_symptom("necrosis_spot", Some("black"))),
            vec!["black_spot"]
        );
        assert_eq!(
            ids(&index.by_symptom("necrosis_spot", None)),
            vec!["black_spot", "apple_scab"]
        );
        assert!(index.by_symptom("necrosis_spot", Some("white")).is_empty());
        assert!(index.by_symptom("wilting", None).is_empty());
    }

    #[test]
    fn test_get_and_border_lookup() {
        let index = index();
        assert!(index.get("apple_scab").is_some());
        assert!(index.get("missing").is_none());
        assert_eq!(ids(&index.by_border_color("Yellow")), vec!["black_spot"]);
    }

    #[test]
    fn test_statistics() {
        let stats = index().statistics();
        assert_eq!(stats.disease_count, 3);
        assert_eq!(stats.host_count, 3);
        assert_eq!(stats.symptom_type_count, 2);
        assert_eq!(stats.center_color_count, 3);
        assert_eq!(stats.border_color_count, 3);
        // 5 host postings + 3 symptom + 3 center + 3 border
        assert_eq!(stats.index_entry_count, 14);
    }

    #[test]
    fn test_duplicate_hosts_indexed_once() {
        let index = DiseaseIndex::build(vec![disease(
            "dup",
            &["Rosa", "rosa"],
            "necrosis_spot",
            "black",
            "yellow",
        )]);
        assert_eq!(index.by_host("Rosa").len(), 1);
    }
}

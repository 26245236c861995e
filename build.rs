use std::collections::HashSet;
use std::path::{Path, PathBuf};

const KNOWLEDGE_DIR: &str = "knowledge";

fn main() {
    let root = Path::new(KNOWLEDGE_DIR);
    validate_ontology_file(&root.join("features/feature_ontology.json"));
    validate_disease_dir(&root.join("diseases"));
    set_build_dependencies();
}

fn read_json(path: &Path) -> serde_json::Value {
    let contents = std::fs::read_to_string(path).unwrap_or_else(|e| {
        panic!(
            "\n\nKNOWLEDGE BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            path.display()
        );
    });

    serde_json::from_str(&contents).unwrap_or_else(|e| {
        panic!(
            "\n\nKNOWLEDGE BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            path.display()
        );
    })
}

fn validate_ontology_file(path: &Path) {
    assert!(
        path.exists(),
        "\n\nKNOWLEDGE BUILD ERROR: File not found\n\
         Path: {}\n\
         The sample knowledge base must ship a feature ontology.\n",
        path.display()
    );

    let ontology = read_json(path);
    assert!(
        ontology.get("dimensions").is_some_and(serde_json::Value::is_object),
        "\n\nKNOWLEDGE BUILD ERROR: Ontology must have a 'dimensions' object\n"
    );
}

fn disease_files(dir: &Path) -> Vec<PathBuf> {
    let entries = std::fs::read_dir(dir).unwrap_or_else(|e| {
        panic!(
            "\n\nKNOWLEDGE BUILD ERROR: Cannot read diseases directory\n\
             Path: {}\n\
             Error: {e}\n",
            dir.display()
        );
    });

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == "json"))
        .collect();
    files.sort();
    files
}

fn validate_disease_dir(dir: &Path) {
    let files = disease_files(dir);
    assert!(
        !files.is_empty(),
        "\n\nKNOWLEDGE BUILD ERROR: No disease files in {}\n",
        dir.display()
    );

    let mut ids = HashSet::new();
    let mut total_features = 0;

    for path in &files {
        let disease = read_json(path);
        let id = validate_disease_fields(&disease, path);
        assert!(
            ids.insert(id.clone()),
            "\n\nKNOWLEDGE BUILD ERROR: Duplicate disease_id '{id}'\n\
             Path: {}\n",
            path.display()
        );
        total_features += validate_disease_features(&disease, &id);
    }

    println!(
        "cargo:warning=Validated knowledge base: {} diseases, {total_features} weighted features",
        files.len()
    );
}

fn validate_disease_fields(disease: &serde_json::Value, path: &Path) -> String {
    for field in ["version", "disease_id", "disease_name", "feature_importance"] {
        assert!(
            disease.get(field).is_some(),
            "\n\nKNOWLEDGE BUILD ERROR: Missing '{field}' field\n\
             Path: {}\n",
            path.display()
        );
    }

    disease
        .get("disease_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            panic!(
                "\n\nKNOWLEDGE BUILD ERROR: 'disease_id' must be a string\n\
                 Path: {}\n",
                path.display()
            );
        })
}

fn validate_disease_features(disease: &serde_json::Value, id: &str) -> usize {
    let importance = &disease["feature_importance"];
    let mut count = 0;

    for tier in ["major_features", "minor_features", "optional_features"] {
        let Some(features) = importance
            .get(tier)
            .and_then(|g| g.get("features"))
            .and_then(|f| f.as_array())
        else {
            assert!(
                tier != "major_features",
                "\n\nKNOWLEDGE BUILD ERROR: Disease '{id}' has no major_features.features array\n"
            );
            continue;
        };

        for (index, feature) in features.iter().enumerate() {
            assert!(
                feature.get("dimension").is_some() && feature.get("expected_values").is_some(),
                "\n\nKNOWLEDGE BUILD ERROR: Disease '{id}' {tier} entry {index} needs 'dimension' and 'expected_values'\n"
            );
            let weight = feature.get("weight").and_then(serde_json::Value::as_f64);
            assert!(
                weight.is_some_and(|w| (0.0..=1.0).contains(&w)),
                "\n\nKNOWLEDGE BUILD ERROR: Disease '{id}' {tier} entry {index} weight must be in [0, 1]\n"
            );
        }
        count += features.len();
    }

    count
}

fn set_build_dependencies() {
    // Tell cargo to rerun if the sample knowledge base changes
    println!("cargo:rerun-if-changed={KNOWLEDGE_DIR}");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}

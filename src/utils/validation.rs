//! Centralized validation and helper functions.

/// Maximum size of a single knowledge file (guards against runaway inputs)
pub const MAX_KNOWLEDGE_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Maximum length of a disease identifier
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Allowed absolute deviation when checking that weights sum to a target
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Validate a knowledge-base identifier (disease ids).
///
/// Identifiers are lowercase ASCII letters, digits, `_`, `-` or `.`, must not
/// be empty and must not start with a `.`.
///
/// # Examples
///
/// ```
/// use phyto_match::utils::validation::is_valid_identifier;
///
/// assert!(is_valid_identifier("rose_black_spot"));
/// assert!(is_valid_identifier("apple-scab.v2"));
/// assert!(!is_valid_identifier("Rose Black Spot"));
/// assert!(!is_valid_identifier(""));
/// ```
#[must_use]
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_IDENTIFIER_LENGTH
        && !s.starts_with('.')
        && s.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' || c == '.'
        })
}

/// Check that a sum of weights is within tolerance of its target.
///
/// Returns a description of the violation, or None if the sum is acceptable.
#[must_use]
pub fn check_weight_sum(sum: f64, expected: f64, label: &str) -> Option<String> {
    if (sum - expected).abs() > WEIGHT_SUM_TOLERANCE {
        Some(format!("{label} sum to {sum:.3}, expected {expected:.3}"))
    } else {
        None
    }
}

/// Check that a weight or factor lies in `[0, 1]`.
///
/// Returns a description of the violation, or None if the value is acceptable.
#[must_use]
pub fn check_unit_interval(value: f64, label: &str) -> Option<String> {
    if (0.0..=1.0).contains(&value) {
        None
    } else {
        Some(format!("{label} is {value}, expected a value between 0 and 1"))
    }
}

/// Check a file is small enough to load.
///
/// Call this with the file length from metadata BEFORE reading it.
#[must_use]
pub fn check_file_size(len: u64) -> Option<String> {
    if len > MAX_KNOWLEDGE_FILE_SIZE {
        Some(format!(
            "File too large: {len} bytes exceeds maximum of {MAX_KNOWLEDGE_FILE_SIZE}"
        ))
    } else {
        None
    }
}

/// MD5 digest of a file's bytes as lowercase hex
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Compute a fingerprint over a set of per-file digests.
///
/// The fingerprint is computed by:
/// 1. Sorting the digests alphabetically
/// 2. Joining them with commas
/// 3. Computing MD5 of the concatenated string
///
/// Reloading unchanged files therefore yields the same fingerprint.
#[must_use]
pub fn compute_fingerprint(digests: &[String]) -> String {
    if digests.is_empty() {
        return String::new();
    }

    let mut sorted: Vec<&str> = digests.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let concatenated = sorted.join(",");
    content_digest(concatenated.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("tomato_early_blight"));
        assert!(is_valid_identifier("a1"));
        assert!(!is_valid_identifier(".hidden"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("UPPER"));
        assert!(!is_valid_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)));
    }

    #[test]
    fn test_check_weight_sum() {
        assert!(check_weight_sum(1.0, 1.0, "w").is_none());
        assert!(check_weight_sum(0.995, 1.0, "w").is_none());
        let msg = check_weight_sum(0.8, 1.0, "major feature weights").unwrap();
        assert!(msg.contains("major feature weights"));
        assert!(msg.contains("0.800"));
    }

    #[test]
    fn test_check_unit_interval() {
        assert!(check_unit_interval(0.0, "w").is_none());
        assert!(check_unit_interval(1.0, "w").is_none());
        assert!(check_unit_interval(1.2, "w").is_some());
        assert!(check_unit_interval(-0.1, "w").is_some());
    }

    #[test]
    fn test_check_file_size() {
        assert!(check_file_size(1024).is_none());
        assert!(check_file_size(MAX_KNOWLEDGE_FILE_SIZE + 1).is_some());
    }

    #[test]
    fn test_compute_fingerprint() {
        let a = vec!["bbb".to_string(), "aaa".to_string()];
        let b = vec!["aaa".to_string(), "bbb".to_string()];
        // Order-independent
        assert_eq!(compute_fingerprint(&a), compute_fingerprint(&b));
        assert_eq!(compute_fingerprint(&a).len(), 32);

        let c = vec!["aaa".to_string(), "ccc".to_string()];
        assert_ne!(compute_fingerprint(&a), compute_fingerprint(&c));

        assert_eq!(compute_fingerprint(&[]), "");
    }

    #[test]
    fn test_content_digest() {
        assert_eq!(content_digest(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}

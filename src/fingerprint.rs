//! Deterministic fingerprints and content hashes
//!
//! Fingerprints identify the same logical job or resume across runs; content
//! hashes cover the fields whose change requires downstream re-processing.

use serde_json::Value;
use sha2::{Digest, Sha256};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Canonical fingerprint of a job posting.
///
/// Formula: sha256(lowercase(company) | lowercase(title) | lowercase(location)),
/// with surrounding whitespace stripped from each part.
pub fn job_fingerprint(company: &str, title: &str, location_text: &str) -> String {
    let raw = format!(
        "{}|{}|{}",
        company.trim().to_lowercase(),
        title.trim().to_lowercase(),
        location_text.trim().to_lowercase()
    );
    sha256_hex(&raw)
}

/// Normalize raw scraper location data (dict, list, or string) to one string.
pub fn normalize_location(location: Option<&Value>) -> String {
    match location {
        Some(Value::Object(map)) => {
            let inner = map.get("city").or_else(|| map.get("country"));
            match inner {
                Some(Value::String(s)) => s.clone(),
                // Handle ["japan", "jp"]
                Some(Value::Array(items)) => items
                    .first()
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .to_string(),
                _ => "Unknown".to_string(),
            }
        }
        Some(Value::Array(items)) => items
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "Unknown".to_string(),
    }
}

/// Content hash covering the fields whose change requires re-extraction.
///
/// Covers (description, skills, title, company); 32 hex chars.
pub fn job_content_hash(
    description: &str,
    skills: &Value,
    title: &str,
    company: &str,
) -> String {
    let skills_json = canonical_json(skills);
    let content = format!("{}|{}|{}|{}", description, skills_json, title, company);
    sha256_hex(&content)[..32].to_string()
}

/// Fingerprint of a resume's canonical JSON representation.
///
/// Identical resume content always yields the same fingerprint regardless of
/// key ordering in the source file.
pub fn resume_fingerprint(resume: &Value) -> String {
    sha256_hex(&canonical_json(resume))
}

/// Serialize JSON with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut sorted = serde_json::Map::new();
                for key in keys {
                    sorted.insert(key.clone(), canonicalize(&map[key]));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
            other => other.clone(),
        }
    }
    canonicalize(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_fingerprint_is_deterministic_and_case_insensitive() {
        let a = job_fingerprint("Acme Corp", "Engineer", "Berlin");
        let b = job_fingerprint("acme corp", "ENGINEER", " berlin ");
        assert_eq!(a, b);
        assert_ne!(a, job_fingerprint("Acme Corp", "Engineer", "Munich"));
    }

    #[test]
    fn location_normalization_handles_all_shapes() {
        assert_eq!(
            normalize_location(Some(&json!({"city": "Tokyo", "country": "JP"}))),
            "Tokyo"
        );
        assert_eq!(
            normalize_location(Some(&json!({"country": ["japan", "jp"]}))),
            "japan"
        );
        assert_eq!(normalize_location(Some(&json!(["Osaka", "jp"]))), "Osaka");
        assert_eq!(normalize_location(Some(&json!("Remote"))), "Remote");
        assert_eq!(normalize_location(None), "Unknown");
    }

    #[test]
    fn content_hash_changes_iff_constituents_change() {
        let skills = json!(["python", "aws"]);
        let h1 = job_content_hash("desc", &skills, "Engineer", "Acme");
        let h2 = job_content_hash("desc", &skills, "Engineer", "Acme");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 32);

        assert_ne!(h1, job_content_hash("desc2", &skills, "Engineer", "Acme"));
        assert_ne!(
            h1,
            job_content_hash("desc", &json!(["python"]), "Engineer", "Acme")
        );
        assert_ne!(h1, job_content_hash("desc", &skills, "Sr Engineer", "Acme"));
        assert_ne!(h1, job_content_hash("desc", &skills, "Engineer", "Globex"));
    }

    #[test]
    fn resume_fingerprint_is_key_order_independent() {
        let a = json!({"profile": {"summary": "x", "skills": ["rust"]}});
        let b = json!({"profile": {"skills": ["rust"], "summary": "x"}});
        assert_eq!(resume_fingerprint(&a), resume_fingerprint(&b));

        let c = json!({"profile": {"summary": "y", "skills": ["rust"]}});
        assert_ne!(resume_fingerprint(&a), resume_fingerprint(&c));
    }
}

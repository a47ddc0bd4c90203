//! JSON schemas for the structured extraction calls
//!
//! Schemas are built as wrapped specs `{name, strict, schema}`;
//! `unwrap_schema_spec` peels the envelope so the request body always carries
//! the raw JSON Schema object.

use serde_json::{json, Value};

/// Unwrap a schema spec into (name, strict, raw schema).
///
/// Accepts either a wrapped spec `{name, strict, schema}` or a raw JSON
/// Schema object.
pub fn unwrap_schema_spec(spec: &Value) -> (String, bool, Value) {
    if let Some(obj) = spec.as_object() {
        if obj.contains_key("schema") && obj.contains_key("name") {
            let name = obj
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("extraction_response")
                .to_string();
            let strict = obj.get("strict").and_then(|v| v.as_bool()).unwrap_or(false);
            return (name, strict, obj["schema"].clone());
        }
    }
    ("extraction_response".to_string(), false, spec.clone())
}

/// Schema for requirement extraction from job descriptions
pub fn requirements_schema() -> Value {
    json!({
        "name": "job_requirements_extraction",
        "strict": true,
        "schema": {
            "type": "object",
            "properties": {
                "thought_process": {"type": ["string", "null"]},
                "job_summary": {"type": ["string", "null"]},
                "seniority_level": {"type": ["string", "null"]},
                "requires_degree": {"type": ["boolean", "null"]},
                "min_years_experience": {"type": ["number", "null"]},
                "salary_min": {"type": ["number", "null"]},
                "salary_max": {"type": ["number", "null"]},
                "currency": {"type": ["string", "null"]},
                "remote_policy": {
                    "type": "string",
                    "enum": ["Remote (Local)", "Remote (Global)", "Hybrid", "On-site", "Unspecified"]
                },
                "tech_stack": {"type": "array", "items": {"type": "string"}},
                "visa_sponsorship_available": {"type": ["boolean", "null"]},
                "requirements": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "req_type": {
                                "type": "string",
                                "enum": ["must_have", "nice_to_have"]
                            },
                            "text": {"type": "string"},
                            "related_skills": {"type": "array", "items": {"type": "string"}},
                            "category": {"type": ["string", "null"]},
                            "proficiency": {"type": ["string", "null"]},
                            "ordinal": {"type": "integer"}
                        },
                        "required": ["req_type", "text"]
                    }
                },
                "benefits": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "category": {
                                "type": "string",
                                "enum": ["health_insurance", "pension", "pto", "remote_work",
                                         "parental_leave", "learning_budget", "equipment",
                                         "wellness", "other"]
                            },
                            "text": {"type": "string"},
                            "ordinal": {"type": "integer"}
                        },
                        "required": ["text"]
                    }
                }
            },
            "required": ["requirements"]
        }
    })
}

/// Schema for the seven-facet extraction used by the Want score
pub fn facet_schema() -> Value {
    json!({
        "name": "job_facet_extraction",
        "strict": true,
        "schema": {
            "type": "object",
            "properties": {
                "remote_flexibility": {"type": "string"},
                "compensation": {"type": "string"},
                "learning_growth": {"type": "string"},
                "company_culture": {"type": "string"},
                "work_life_balance": {"type": "string"},
                "tech_stack": {"type": "string"},
                "visa_sponsorship": {"type": "string"}
            },
            "required": [
                "remote_flexibility", "compensation", "learning_growth",
                "company_culture", "work_life_balance", "tech_stack",
                "visa_sponsorship"
            ]
        }
    })
}

/// Schema for structured resume extraction
pub fn resume_schema() -> Value {
    json!({
        "name": "resume_extraction",
        "strict": true,
        "schema": {
            "type": "object",
            "properties": {
                "profile": {
                    "type": "object",
                    "properties": {
                        "summary": {
                            "type": ["object", "null"],
                            "properties": {
                                "text": {"type": ["string", "null"]},
                                "total_experience_years": {"type": ["number", "null"]}
                            }
                        },
                        "experience": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "company": {"type": ["string", "null"]},
                                    "title": {"type": ["string", "null"]},
                                    "start_date": {"type": ["string", "null"]},
                                    "end_date": {"type": ["string", "null"]},
                                    "is_current": {"type": "boolean"},
                                    "description": {"type": ["string", "null"]},
                                    "highlights": {"type": "array", "items": {"type": "string"}},
                                    "tech_keywords": {"type": "array", "items": {"type": "string"}},
                                    "years_value": {"type": ["number", "null"]}
                                }
                            }
                        },
                        "projects": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": ["string", "null"]},
                                    "description": {"type": ["string", "null"]},
                                    "highlights": {"type": "array", "items": {"type": "string"}},
                                    "technologies": {"type": "array", "items": {"type": "string"}},
                                    "url": {"type": ["string", "null"]}
                                }
                            }
                        },
                        "education": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "institution": {"type": ["string", "null"]},
                                    "degree": {"type": ["string", "null"]},
                                    "field_of_study": {"type": ["string", "null"]},
                                    "graduation_year": {"type": ["integer", "null"]},
                                    "description": {"type": ["string", "null"]},
                                    "highlights": {"type": "array", "items": {"type": "string"}}
                                }
                            }
                        },
                        "skills": {
                            "type": "object",
                            "properties": {
                                "all": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "name": {"type": "string"},
                                            "kind": {"type": ["string", "null"]},
                                            "proficiency": {"type": ["string", "null"]},
                                            "years_experience": {"type": ["number", "null"]}
                                        },
                                        "required": ["name"]
                                    }
                                }
                            }
                        }
                    },
                    "required": ["experience", "skills"]
                },
                "claimed_total_years": {"type": ["number", "null"]},
                "extraction": {
                    "type": ["object", "null"],
                    "properties": {
                        "confidence": {"type": ["number", "null"]},
                        "warnings": {"type": "array", "items": {"type": "string"}}
                    }
                }
            },
            "required": ["profile"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_spec_unwraps() {
        let (name, strict, schema) = unwrap_schema_spec(&requirements_schema());
        assert_eq!(name, "job_requirements_extraction");
        assert!(strict);
        assert_eq!(schema["type"], "object");
        assert!(schema.get("properties").is_some());
    }

    #[test]
    fn raw_schema_passes_through() {
        let raw = json!({"type": "object", "properties": {"x": {"type": "number"}}});
        let (name, strict, schema) = unwrap_schema_spec(&raw);
        assert_eq!(name, "extraction_response");
        assert!(!strict);
        assert_eq!(schema, raw);
    }

    #[test]
    fn facet_schema_covers_all_seven_keys() {
        let (_, _, schema) = unwrap_schema_spec(&facet_schema());
        let props = schema["properties"].as_object().unwrap();
        for key in crate::ai::types::FACET_KEYS {
            assert!(props.contains_key(key), "missing facet key {}", key);
        }
    }
}

//! Structured resume, section embedding, and evidence embedding queries

use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use crate::errors::DatabaseError;
use crate::repository::models::{ResumeEvidenceRow, ResumeSectionRow, StructuredResumeRow};
use crate::repository::JobRepository;
use crate::vectors::{decode_embedding, encode_embedding};

/// Payload for one coarse section embedding
#[derive(Debug, Clone)]
pub struct SectionEmbeddingPayload {
    pub section_type: String,
    pub section_index: i64,
    pub source_text: String,
    pub source_data: Option<Value>,
    pub embedding: Vec<f32>,
}

/// Payload for one evidence unit embedding
#[derive(Debug, Clone)]
pub struct EvidenceEmbeddingPayload {
    pub evidence_unit_id: String,
    pub source_text: String,
    pub source_section: String,
    pub tags: Option<Value>,
    pub embedding: Vec<f32>,
    pub years_value: Option<f64>,
    pub years_context: Option<String>,
    pub is_total_years_claim: bool,
}

impl<'a> JobRepository<'a> {
    pub fn get_structured_resume_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<StructuredResumeRow>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, resume_fingerprint, profile, total_experience_years,
                    extraction_confidence, extraction_warnings, created_at
             FROM structured_resume WHERE resume_fingerprint = ?",
        )?;
        Ok(stmt.query_row([fingerprint], resume_from_row).optional()?)
    }

    pub fn get_latest_resume_fingerprint(&self) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT resume_fingerprint FROM structured_resume ORDER BY id DESC LIMIT 1",
        )?;
        Ok(stmt.query_row([], |row| row.get(0)).optional()?)
    }

    pub fn save_structured_resume(
        &self,
        fingerprint: &str,
        profile: &Value,
        total_experience_years: Option<f64>,
        extraction_confidence: Option<f64>,
        extraction_warnings: &[String],
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT INTO structured_resume
                (resume_fingerprint, profile, total_experience_years,
                 extraction_confidence, extraction_warnings, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (resume_fingerprint) DO UPDATE SET
                profile = excluded.profile,
                total_experience_years = excluded.total_experience_years,
                extraction_confidence = excluded.extraction_confidence,
                extraction_warnings = excluded.extraction_warnings",
            params![
                fingerprint,
                profile.to_string(),
                total_experience_years,
                extraction_confidence,
                serde_json::to_string(extraction_warnings).unwrap_or_else(|_| "[]".to_string()),
                self.now()
            ],
        )?;
        Ok(())
    }

    /// Replace all section embeddings for a resume (delete-then-insert)
    pub fn replace_section_embeddings(
        &self,
        fingerprint: &str,
        sections: &[SectionEmbeddingPayload],
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "DELETE FROM resume_section_embedding WHERE resume_fingerprint = ?",
            [fingerprint],
        )?;
        for section in sections {
            self.conn().execute(
                "INSERT INTO resume_section_embedding
                    (resume_fingerprint, section_type, section_index,
                     source_text, source_data, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    fingerprint,
                    section.section_type,
                    section.section_index,
                    section.source_text,
                    section.source_data.as_ref().map(|v| v.to_string()),
                    encode_embedding(&section.embedding)
                ],
            )?;
        }
        Ok(())
    }

    /// Replace all evidence unit embeddings for a resume (delete-then-insert)
    pub fn replace_evidence_embeddings(
        &self,
        fingerprint: &str,
        units: &[EvidenceEmbeddingPayload],
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "DELETE FROM resume_evidence_embedding WHERE resume_fingerprint = ?",
            [fingerprint],
        )?;
        for unit in units {
            self.conn().execute(
                "INSERT INTO resume_evidence_embedding
                    (resume_fingerprint, evidence_unit_id, source_text, source_section,
                     tags, embedding, years_value, years_context, is_total_years_claim)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    fingerprint,
                    unit.evidence_unit_id,
                    unit.source_text,
                    unit.source_section,
                    unit.tags.as_ref().map(|v| v.to_string()),
                    encode_embedding(&unit.embedding),
                    unit.years_value,
                    unit.years_context,
                    unit.is_total_years_claim
                ],
            )?;
        }
        Ok(())
    }

    pub fn get_section_embeddings(
        &self,
        fingerprint: &str,
        section_type: Option<&str>,
    ) -> Result<Vec<ResumeSectionRow>, DatabaseError> {
        match section_type {
            Some(section_type) => {
                let mut stmt = self.conn().prepare(
                    "SELECT id, resume_fingerprint, section_type, section_index,
                            source_text, source_data, embedding
                     FROM resume_section_embedding
                     WHERE resume_fingerprint = ?1 AND section_type = ?2
                     ORDER BY section_index",
                )?;
                let rows = stmt.query_map(params![fingerprint, section_type], section_from_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            }
            None => {
                let mut stmt = self.conn().prepare(
                    "SELECT id, resume_fingerprint, section_type, section_index,
                            source_text, source_data, embedding
                     FROM resume_section_embedding
                     WHERE resume_fingerprint = ?1
                     ORDER BY section_type, section_index",
                )?;
                let rows = stmt.query_map(params![fingerprint], section_from_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            }
        }
    }

    pub fn get_evidence_embeddings(
        &self,
        fingerprint: &str,
    ) -> Result<Vec<ResumeEvidenceRow>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, resume_fingerprint, evidence_unit_id, source_text, source_section,
                    tags, embedding, years_value, years_context, is_total_years_claim
             FROM resume_evidence_embedding
             WHERE resume_fingerprint = ?
             ORDER BY id",
        )?;
        let rows = stmt.query_map([fingerprint], evidence_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Highest explicitly-stated years across the resume's experience
    /// sections; used by the experience-shortfall penalty.
    pub fn max_experience_years(&self, fingerprint: &str) -> Result<Option<f64>, DatabaseError> {
        let sections = self.get_section_embeddings(fingerprint, Some("experience"))?;
        let mut best: Option<f64> = None;
        for section in sections {
            let years = section
                .source_data
                .as_ref()
                .and_then(|d| d.get("years_value"))
                .and_then(|v| v.as_f64());
            if let Some(y) = years {
                best = Some(best.map_or(y, |b: f64| b.max(y)));
            }
        }
        Ok(best)
    }
}

fn resume_from_row(row: &Row) -> rusqlite::Result<StructuredResumeRow> {
    let profile: String = row.get(2)?;
    let warnings: Option<String> = row.get(5)?;
    Ok(StructuredResumeRow {
        id: row.get(0)?,
        resume_fingerprint: row.get(1)?,
        profile: serde_json::from_str(&profile).unwrap_or(Value::Null),
        total_experience_years: row.get(3)?,
        extraction_confidence: row.get(4)?,
        extraction_warnings: warnings
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        created_at: row.get(6)?,
    })
}

fn section_from_row(row: &Row) -> rusqlite::Result<ResumeSectionRow> {
    let source_data: Option<String> = row.get(5)?;
    let embedding: Vec<u8> = row.get(6)?;
    Ok(ResumeSectionRow {
        id: row.get(0)?,
        resume_fingerprint: row.get(1)?,
        section_type: row.get(2)?,
        section_index: row.get(3)?,
        source_text: row.get(4)?,
        source_data: source_data.and_then(|s| serde_json::from_str(&s).ok()),
        embedding: decode_embedding(&embedding),
    })
}

fn evidence_from_row(row: &Row) -> rusqlite::Result<ResumeEvidenceRow> {
    let tags: Option<String> = row.get(5)?;
    let embedding: Vec<u8> = row.get(6)?;
    Ok(ResumeEvidenceRow {
        id: row.get(0)?,
        resume_fingerprint: row.get(1)?,
        evidence_unit_id: row.get(2)?,
        source_text: row.get(3)?,
        source_section: row.get(4)?,
        tags: tags.and_then(|s| serde_json::from_str(&s).ok()),
        embedding: decode_embedding(&embedding),
        years_value: row.get(7)?,
        years_context: row.get(8)?,
        is_total_years_claim: row.get(9)?,
    })
}

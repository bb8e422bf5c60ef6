//! Core data models used throughout the pipeline.
//!
//! These types represent the statutory sections, embedded records, and
//! retrieval results that flow from XML parsing through to the answer.

use serde::{Deserialize, Serialize};

/// A single statutory section as produced by `lexrag parse`.
///
/// One NDJSON line per section. The `full_text` always starts with the
/// `§ {number} {title}` header line so the section reference survives
/// embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub law_abbr: String,
    pub section_number: String,
    pub section_title: String,
    pub full_text: String,
    pub source_uri: String,
    pub lang: String,
}

/// A section with its embedding attached, as produced by `lexrag embed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedSection {
    #[serde(flatten)]
    pub section: Section,
    pub embedding: Vec<f32>,
}

impl EmbeddedSection {
    /// Resume key: a section is identified by law + section number.
    pub fn key(&self) -> String {
        section_key(&self.section.law_abbr, &self.section.section_number)
    }
}

pub fn section_key(law_abbr: &str, section_number: &str) -> String {
    format!("{}-{}", law_abbr, section_number)
}

/// A section returned by nearest-neighbor retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedSection {
    pub section_number: String,
    pub section_title: String,
    pub full_text: String,
    /// Cosine similarity in [-1, 1]; `1 - distance` from pgvector's `<=>`.
    pub similarity: f64,
}

/// Citation entry in an answer (section reference plus similarity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub section_number: String,
    pub section_title: String,
    pub similarity: f64,
}

impl From<&RetrievedSection> for Citation {
    fn from(s: &RetrievedSection) -> Self {
        Citation {
            section_number: s.section_number.clone(),
            section_title: s.section_title.clone(),
            similarity: s.similarity,
        }
    }
}

//! Per-patient care protocols and complaint resolution.

pub mod criteria;

pub use criteria::*;

use std::path::Path;

use thiserror::Error;

use crate::models::Protocol;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to load protocols from {0}: {1}")]
    Load(String, String),

    #[error("Failed to parse protocols from {0}: {1}")]
    Parse(String, String),
}

/// Read-only lookup over clinician-authored protocols.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRepository {
    protocols: Vec<Protocol>,
}

impl ProtocolRepository {
    pub fn from_protocols(protocols: Vec<Protocol>) -> Self {
        Self { protocols }
    }

    /// Load protocols from a JSON array file.
    pub fn load(path: &Path) -> Result<Self, ProtocolError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::Load(path.display().to_string(), e.to_string()))?;
        let protocols: Vec<Protocol> = serde_json::from_str(&json)
            .map_err(|e| ProtocolError::Parse(path.display().to_string(), e.to_string()))?;
        tracing::info!(path = %path.display(), count = protocols.len(), "Loaded care protocols");
        Ok(Self { protocols })
    }

    /// Pick the protocol governing `chief_complaint` for a patient.
    ///
    /// An exact (case-insensitive) complaint match wins. Next comes a
    /// whole-word containment match in either direction, so "worsening
    /// headaches" finds "Headache"; among several, the longest protocol
    /// complaint wins and list order breaks ties. When nothing specific
    /// matches, or the complaint is blank or missing, the patient's general
    /// protocol applies.
    pub fn resolve(&self, patient_id: &str, chief_complaint: Option<&str>) -> Option<&Protocol> {
        let complaint = chief_complaint
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        let found = match complaint.as_deref() {
            Some(complaint) => self
                .specific_match(patient_id, complaint)
                .or_else(|| self.general(patient_id)),
            None => self.general(patient_id),
        };

        tracing::debug!(
            patient_id = %patient_id,
            complaint = complaint.as_deref().unwrap_or(""),
            resolved = found.is_some(),
            general = found.is_some_and(Protocol::is_general),
            "Protocol resolution"
        );
        found
    }

    fn general(&self, patient_id: &str) -> Option<&Protocol> {
        self.protocols
            .iter()
            .find(|p| p.patient_id == patient_id && p.is_general())
    }

    fn specific_match(&self, patient_id: &str, complaint: &str) -> Option<&Protocol> {
        let specific: Vec<(&Protocol, String)> = self
            .protocols
            .iter()
            .filter(|p| p.patient_id == patient_id)
            .filter_map(|p| {
                p.chief_complaint
                    .as_deref()
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty())
                    .map(|c| (p, c))
            })
            .collect();

        if let Some((p, _)) = specific.iter().find(|(_, c)| c == complaint) {
            return Some(*p);
        }

        let wanted = words(complaint);
        let mut best: Option<(&Protocol, usize)> = None;
        for (p, c) in &specific {
            let theirs = words(c);
            if !contains_words(&wanted, &theirs) && !contains_words(&theirs, &wanted) {
                continue;
            }
            if best.map_or(true, |(_, len)| c.len() > len) {
                best = Some((*p, c.len()));
            }
        }
        best.map(|(p, _)| p)
    }

    pub fn for_patient(&self, patient_id: &str) -> Vec<&Protocol> {
        self.protocols
            .iter()
            .filter(|p| p.patient_id == patient_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether `needle` occurs in `haystack` as a run of whole words. A plural
/// on the haystack side still matches ("headaches" contains "headache").
fn contains_words(haystack: &[&str], needle: &[&str]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|run| run.iter().zip(needle).all(|(h, n)| word_matches(h, n)))
}

fn word_matches(word: &str, wanted: &str) -> bool {
    word == wanted
        || word
            .strip_prefix(wanted)
            .is_some_and(|rest| rest == "s" || rest == "es")
}

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PatientProfile, ValidationError};

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Invalid patient profile: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to load patients from {0}: {1}")]
    Load(String, String),
}

/// Context handed to a conversation at its start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    pub profile: PatientProfile,
    pub current_regimen: Option<String>,
    pub ecog_score: Option<i32>,
    pub recent_concerns: Option<String>,
}

/// Patient profiles registered by the surrounding system.
#[derive(Debug, Clone, Default)]
pub struct PatientRegistry {
    profiles: BTreeMap<String, PatientProfile>,
}

impl PatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load profiles from a JSON array file.
    pub fn load(path: &Path) -> Result<Self, PatientError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PatientError::Load(path.display().to_string(), e.to_string()))?;
        let profiles: Vec<PatientProfile> = serde_json::from_str(&json)
            .map_err(|e| PatientError::Load(path.display().to_string(), e.to_string()))?;

        let mut registry = Self::new();
        for profile in profiles {
            registry.register(profile)?;
        }
        Ok(registry)
    }

    /// Add or replace a profile.
    pub fn register(&mut self, profile: PatientProfile) -> Result<(), PatientError> {
        profile.validate()?;
        tracing::debug!(patient_id = %profile.id, "Patient registered");
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn get(&self, patient_id: &str) -> Result<&PatientProfile, PatientError> {
        self.profiles
            .get(patient_id)
            .ok_or_else(|| PatientError::NotFound(patient_id.to_string()))
    }

    pub fn context(&self, patient_id: &str) -> Result<PatientContext, PatientError> {
        let profile = self.get(patient_id)?;
        Ok(PatientContext {
            current_regimen: profile.current_regimen.clone(),
            ecog_score: profile.ecog_score,
            recent_concerns: profile.concerns.clone(),
            profile: profile.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

//! Demographic profile completed once after user sign-up.

use serde::Serialize;

use super::ScholarshipValidationError;

/// Reservation category used for eligibility matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Caste {
    /// General category.
    General,
    /// Other backward classes.
    Obc,
    /// Scheduled castes.
    Sc,
    /// Scheduled tribes.
    St,
}

/// Payload for `PUT /user/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicProfile {
    caste: Caste,
    religion: String,
    education_level: String,
}

impl DemographicProfile {
    /// Validate the profile form; free-text fields must be non-blank.
    pub fn new(
        caste: Caste,
        religion: &str,
        education_level: &str,
    ) -> Result<Self, ScholarshipValidationError> {
        let religion = religion.trim();
        if religion.is_empty() {
            return Err(ScholarshipValidationError::EmptyField { field: "religion" });
        }
        let education_level = education_level.trim();
        if education_level.is_empty() {
            return Err(ScholarshipValidationError::EmptyField {
                field: "education level",
            });
        }
        Ok(Self {
            caste,
            religion: religion.to_owned(),
            education_level: education_level.to_owned(),
        })
    }
}

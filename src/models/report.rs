use crate::models::{SeverityLabel, SlaWindow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// A crime report submitted for severity assessment.
///
/// `crime_type` and `location` stay as raw strings here so that an unknown
/// value can be rejected with the list of accepted names.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CrimeReport {
    /// Type of crime committed
    pub crime_type: String,

    /// Location type of the incident
    pub location: String,

    /// Free-text description of the incident
    #[validate(length(min = 10, message = "description must be at least 10 characters"))]
    pub description: String,

    #[serde(default)]
    pub reporter_name: Option<String>,

    #[serde(default)]
    pub incident_datetime: Option<String>,
}

/// Keyword signals found in the description
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionFlags {
    pub has_weapon: bool,
    pub has_injury: bool,
    pub multiple_suspects: bool,
    pub involves_minor: bool,
    pub night_time: bool,
    pub threat_made: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalContext {
    pub historical_frequency: u8,
    pub base_crime_severity: u8,
    pub trend: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationContext {
    pub location: String,
    pub risk_index: u8,
}

/// Full severity assessment returned for a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityAssessment {
    pub case_id: String,
    pub reported_at: String,
    pub reporter_name: Option<String>,
    pub incident_datetime: Option<String>,

    // Input summary
    pub crime_type: String,
    pub location: String,
    pub description: String,

    // Prediction
    pub severity_label: SeverityLabel,
    pub severity_score_estimate: f64,
    pub confidence: f64,
    pub label_probabilities: BTreeMap<String, f64>,

    // Feature breakdown
    pub description_flags: DescriptionFlags,
    pub historical_context: HistoricalContext,
    pub location_context: LocationContext,

    pub model_used: String,
    pub recommendation: String,
    pub sla: SlaWindow,
}

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Predicted severity of a reported crime
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum SeverityLabel {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLabel {
    /// Labels from least to most severe
    pub const ALL: [SeverityLabel; 4] = [
        SeverityLabel::Low,
        SeverityLabel::Medium,
        SeverityLabel::High,
        SeverityLabel::Critical,
    ];

    /// Bucket a 1-100 severity score
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            SeverityLabel::Critical
        } else if score >= 60.0 {
            SeverityLabel::High
        } else if score >= 40.0 {
            SeverityLabel::Medium
        } else {
            SeverityLabel::Low
        }
    }

    /// Centre of the score band, used for the heuristic score estimate
    pub fn score_center(&self) -> f64 {
        match self {
            SeverityLabel::Low => 25.0,
            SeverityLabel::Medium => 50.0,
            SeverityLabel::High => 70.0,
            SeverityLabel::Critical => 90.0,
        }
    }

    /// Recommended response for this severity
    pub fn recommendation(&self) -> &'static str {
        match self {
            SeverityLabel::Critical => {
                "IMMEDIATE response required. Dispatch units now. Notify senior officers and relevant departments."
            }
            SeverityLabel::High => {
                "Priority response needed. Assign lead investigator. Begin evidence collection immediately."
            }
            SeverityLabel::Medium => {
                "Standard investigation protocol. Schedule follow-up within 24 hours."
            }
            SeverityLabel::Low => "Log incident and monitor. Assign for routine follow-up.",
        }
    }

    /// Hours an authority has to act before the case escalates
    pub fn sla_hours(&self) -> u32 {
        match self {
            SeverityLabel::Critical => 6,
            SeverityLabel::High => 12,
            SeverityLabel::Medium | SeverityLabel::Low => 24,
        }
    }

    /// Label names
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|l| l.to_string()).collect()
    }
}

/// Response-time window attached to a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaWindow {
    pub hours: u32,
    pub deadline: DateTime<Local>,
}

impl SlaWindow {
    pub fn starting_at(label: SeverityLabel, reported_at: DateTime<Local>) -> Self {
        let hours = label.sla_hours();
        Self {
            hours,
            deadline: reported_at + Duration::hours(i64::from(hours)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_score_boundaries() {
        assert_eq!(SeverityLabel::from_score(100.0), SeverityLabel::Critical);
        assert_eq!(SeverityLabel::from_score(80.0), SeverityLabel::Critical);
        assert_eq!(SeverityLabel::from_score(79.99), SeverityLabel::High);
        assert_eq!(SeverityLabel::from_score(60.0), SeverityLabel::High);
        assert_eq!(SeverityLabel::from_score(59.9), SeverityLabel::Medium);
        assert_eq!(SeverityLabel::from_score(40.0), SeverityLabel::Medium);
        assert_eq!(SeverityLabel::from_score(39.99), SeverityLabel::Low);
        assert_eq!(SeverityLabel::from_score(1.0), SeverityLabel::Low);
    }

    #[test]
    fn test_label_names() {
        assert_eq!(SeverityLabel::Critical.to_string(), "CRITICAL");
        assert_eq!(SeverityLabel::from_str("MEDIUM").unwrap(), SeverityLabel::Medium);
        assert_eq!(
            serde_json::to_string(&SeverityLabel::High).unwrap(),
            "\"HIGH\""
        );
    }

    #[test]
    fn test_sla_window() {
        let now = Local::now();
        let sla = SlaWindow::starting_at(SeverityLabel::Critical, now);
        assert_eq!(sla.hours, 6);
        assert_eq!(sla.deadline - now, Duration::hours(6));

        assert_eq!(SeverityLabel::High.sla_hours(), 12);
        assert_eq!(SeverityLabel::Low.sla_hours(), 24);
    }

    #[test]
    fn test_recommendations_differ() {
        let texts: std::collections::HashSet<_> =
            SeverityLabel::ALL.iter().map(|l| l.recommendation()).collect();
        assert_eq!(texts.len(), 4);
        assert!(SeverityLabel::Critical.recommendation().starts_with("IMMEDIATE"));
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Direction of the historical frequency of a crime type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

impl Trend {
    /// Numeric encoding used as a model feature
    pub fn as_feature(&self) -> i8 {
        match self {
            Trend::Increasing => 1,
            Trend::Stable => 0,
            Trend::Decreasing => -1,
        }
    }
}

/// Historical reference data for a crime type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrimeProfile {
    /// Baseline severity on a 1-100 scale
    pub base_severity: u8,

    /// Relative historical frequency (0-100)
    pub historical_freq: u8,

    /// Frequency trend
    pub trend: Trend,
}

/// Supported crime types
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
pub enum CrimeType {
    Theft,
    Assault,
    Burglary,
    Robbery,
    Vandalism,
    Fraud,
    #[serde(rename = "Drug Offense")]
    #[strum(serialize = "Drug Offense")]
    DrugOffense,
    Murder,
    #[serde(rename = "Sexual Assault")]
    #[strum(serialize = "Sexual Assault")]
    SexualAssault,
    Kidnapping,
}

impl CrimeType {
    pub const ALL: [CrimeType; 10] = [
        CrimeType::Theft,
        CrimeType::Assault,
        CrimeType::Burglary,
        CrimeType::Robbery,
        CrimeType::Vandalism,
        CrimeType::Fraud,
        CrimeType::DrugOffense,
        CrimeType::Murder,
        CrimeType::SexualAssault,
        CrimeType::Kidnapping,
    ];

    pub fn profile(&self) -> CrimeProfile {
        let (base_severity, historical_freq, trend) = match self {
            CrimeType::Theft => (42, 78, Trend::Increasing),
            CrimeType::Assault => (68, 45, Trend::Stable),
            CrimeType::Burglary => (61, 33, Trend::Decreasing),
            CrimeType::Robbery => (74, 22, Trend::Increasing),
            CrimeType::Vandalism => (28, 91, Trend::Stable),
            CrimeType::Fraud => (52, 55, Trend::Increasing),
            CrimeType::DrugOffense => (55, 67, Trend::Stable),
            CrimeType::Murder => (98, 4, Trend::Stable),
            CrimeType::SexualAssault => (91, 18, Trend::Stable),
            CrimeType::Kidnapping => (95, 6, Trend::Stable),
        };

        CrimeProfile {
            base_severity,
            historical_freq,
            trend,
        }
    }

    /// Display names in declaration order
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|c| c.to_string()).collect()
    }
}

/// Supported location types
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
pub enum Location {
    #[serde(rename = "Residential Area")]
    #[strum(serialize = "Residential Area")]
    ResidentialArea,
    #[serde(rename = "Commercial Zone")]
    #[strum(serialize = "Commercial Zone")]
    CommercialZone,
    #[serde(rename = "Public Transport Hub")]
    #[strum(serialize = "Public Transport Hub")]
    PublicTransportHub,
    #[serde(rename = "Park / Open Space")]
    #[strum(serialize = "Park / Open Space")]
    ParkOpenSpace,
    #[serde(rename = "Industrial Area")]
    #[strum(serialize = "Industrial Area")]
    IndustrialArea,
    #[serde(rename = "School / University")]
    #[strum(serialize = "School / University")]
    SchoolUniversity,
    #[serde(rename = "Night District")]
    #[strum(serialize = "Night District")]
    NightDistrict,
    #[serde(rename = "Highway / Remote Area")]
    #[strum(serialize = "Highway / Remote Area")]
    HighwayRemoteArea,
}

impl Location {
    pub const ALL: [Location; 8] = [
        Location::ResidentialArea,
        Location::CommercialZone,
        Location::PublicTransportHub,
        Location::ParkOpenSpace,
        Location::IndustrialArea,
        Location::SchoolUniversity,
        Location::NightDistrict,
        Location::HighwayRemoteArea,
    ];

    /// Risk index on a 0-100 scale
    pub fn risk_index(&self) -> u8 {
        match self {
            Location::ResidentialArea => 40,
            Location::CommercialZone => 55,
            Location::PublicTransportHub => 65,
            Location::ParkOpenSpace => 45,
            Location::IndustrialArea => 50,
            Location::SchoolUniversity => 70,
            Location::NightDistrict => 75,
            Location::HighwayRemoteArea => 60,
        }
    }

    /// Display names in declaration order
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|l| l.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_crime_type_names_round_trip() {
        for crime in CrimeType::ALL {
            assert_eq!(CrimeType::from_str(&crime.to_string()).unwrap(), crime);
        }
        assert_eq!(CrimeType::DrugOffense.to_string(), "Drug Offense");
        assert!(CrimeType::from_str("Jaywalking").is_err());
        assert!(CrimeType::from_str("theft").is_err());
    }

    #[test]
    fn test_crime_profiles() {
        let murder = CrimeType::Murder.profile();
        assert_eq!(murder.base_severity, 98);
        assert_eq!(murder.historical_freq, 4);
        assert_eq!(murder.trend, Trend::Stable);

        let burglary = CrimeType::Burglary.profile();
        assert_eq!(burglary.trend.as_feature(), -1);
        assert_eq!(CrimeType::Theft.profile().trend.as_feature(), 1);
    }

    #[test]
    fn test_location_risk() {
        assert_eq!(Location::NightDistrict.risk_index(), 75);
        assert_eq!(Location::ResidentialArea.risk_index(), 40);
        assert_eq!(
            Location::from_str("Park / Open Space").unwrap(),
            Location::ParkOpenSpace
        );
        assert_eq!(Location::names().len(), 8);
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&CrimeType::SexualAssault).unwrap();
        assert_eq!(json, "\"Sexual Assault\"");
        let loc: Location = serde_json::from_str("\"Highway / Remote Area\"").unwrap();
        assert_eq!(loc, Location::HighwayRemoteArea);
        assert_eq!(Trend::Decreasing.to_string(), "decreasing");
    }
}

use crate::error::{AppError, Result};
use crate::models::{CrimeType, DescriptionFlags, Location};
use ndarray::{Array1, Array2, Axis};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model input columns, in the order the feature vector is laid out
pub const FEATURE_COLUMNS: [&str; 12] = [
    "crime_type_enc",
    "location_enc",
    "historical_freq",
    "historical_trend",
    "base_crime_severity",
    "location_risk",
    "has_weapon",
    "has_injury",
    "multiple_suspects",
    "involves_minor",
    "night_time",
    "threat_made",
];

pub const N_FEATURES: usize = FEATURE_COLUMNS.len();

static WEAPON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"weapon|gun|knife|firearm|pistol|rifle|blade").unwrap());
static INJURY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"injur|blood|wound|hurt|hospitaliz|dead|death").unwrap());
static MULTIPLE_SUSPECTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"multiple|gang|group|several|two|three|four").unwrap());
static MINOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"child|minor|kid|teen|juvenile|underage|school student").unwrap()
});
static NIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"night|dark|midnight|2am|3am|late evening|after dark").unwrap()
});
static THREAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"threat|threaten|warn|intimidat|demand").unwrap());

impl DescriptionFlags {
    /// Scan a free-text description for keyword signals.
    ///
    /// Matching is case-insensitive and substring based, so "knives" does not
    /// match but "knife-point" does.
    pub fn extract(description: &str) -> Self {
        let desc = description.to_lowercase();
        Self {
            has_weapon: WEAPON.is_match(&desc),
            has_injury: INJURY.is_match(&desc),
            multiple_suspects: MULTIPLE_SUSPECTS.is_match(&desc),
            involves_minor: MINOR.is_match(&desc),
            night_time: NIGHT.is_match(&desc),
            threat_made: THREAT.is_match(&desc),
        }
    }

    /// Flags as 0/1 model features
    pub fn as_features(&self) -> [f64; 6] {
        [
            f64::from(u8::from(self.has_weapon)),
            f64::from(u8::from(self.has_injury)),
            f64::from(u8::from(self.multiple_suspects)),
            f64::from(u8::from(self.involves_minor)),
            f64::from(u8::from(self.night_time)),
            f64::from(u8::from(self.threat_made)),
        ]
    }
}

/// Maps category names to dense indices in sorted name order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the distinct values of `values`
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn transform(&self, value: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| AppError::Validation(format!("Unseen label: {}", value)))
    }

    pub fn inverse_transform(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| AppError::Prediction(format!("Class index {} out of range", index)))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

/// Standardizes features to zero mean and unit variance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(AppError::Training(
                "Cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Training("Failed to compute column means".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(AppError::Prediction(format!(
                "Scaler expects {} features, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean) / &self.scale)
    }

    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

/// Categorical encoders shared by training and serving
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    pub crime_encoder: LabelEncoder,
    pub location_encoder: LabelEncoder,
}

impl FeatureEncoder {
    /// Encoders covering every known crime type and location
    pub fn fit_reference() -> Self {
        Self {
            crime_encoder: LabelEncoder::fit(CrimeType::names()),
            location_encoder: LabelEncoder::fit(Location::names()),
        }
    }

    /// Build the twelve-feature row for one report
    pub fn encode(
        &self,
        crime_type: CrimeType,
        location: Location,
        flags: &DescriptionFlags,
    ) -> Result<[f64; N_FEATURES]> {
        let profile = crime_type.profile();
        let crime_enc = self.crime_encoder.transform(&crime_type.to_string())?;
        let location_enc = self.location_encoder.transform(&location.to_string())?;
        let flag_features = flags.as_features();

        let mut row = [0.0; N_FEATURES];
        row[0] = crime_enc as f64;
        row[1] = location_enc as f64;
        row[2] = f64::from(profile.historical_freq);
        row[3] = f64::from(profile.trend.as_feature());
        row[4] = f64::from(profile.base_severity);
        row[5] = f64::from(location.risk_index());
        row[6..].copy_from_slice(&flag_features);

        Ok(row)
    }
}

/// Stack feature rows into a matrix
pub fn rows_to_matrix(rows: &[[f64; N_FEATURES]]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Ok(Array2::from_shape_vec((rows.len(), N_FEATURES), flat)?)
}

/// Count of each distinct value, sorted by name
pub fn value_counts<'a, I>(values: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_description_flags() {
        let flags = DescriptionFlags::extract(
            "Suspect armed with KNIFE threatened multiple students at night",
        );
        assert!(flags.has_weapon);
        assert!(!flags.has_injury);
        assert!(flags.multiple_suspects);
        assert!(!flags.involves_minor);
        assert!(flags.night_time);
        assert!(flags.threat_made);
    }

    #[test]
    fn test_description_flags_substring_semantics() {
        let flags = DescriptionFlags::extract("A twofold increase in shoplifting");
        assert!(flags.multiple_suspects);

        let flags = DescriptionFlags::extract("The victim was hospitalized after the attack");
        assert!(flags.has_injury);

        let flags = DescriptionFlags::extract("A school student was approached");
        assert!(flags.involves_minor);

        let none = DescriptionFlags::extract("Graffiti on the wall of the store");
        assert_eq!(none, DescriptionFlags::default());
        assert_eq!(none.as_features(), [0.0; 6]);
    }

    #[test]
    fn test_label_encoder_sorted() {
        let enc = LabelEncoder::fit(["LOW", "MEDIUM", "HIGH", "CRITICAL", "LOW"]);
        assert_eq!(enc.classes(), &["CRITICAL", "HIGH", "LOW", "MEDIUM"]);
        assert_eq!(enc.transform("HIGH").unwrap(), 1);
        assert_eq!(enc.inverse_transform(3).unwrap(), "MEDIUM");
        assert!(enc.transform("SEVERE").is_err());
        assert!(enc.inverse_transform(4).is_err());
    }

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&x).unwrap();

        assert_eq!(scaler.mean(), &array![2.0, 5.0]);
        // Constant column keeps scale 1
        assert_eq!(scaler.scale()[1], 1.0);
        assert!((scaled[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((scaled[[1, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(scaled[[0, 1]], 0.0);

        let wrong = array![[1.0, 2.0, 3.0]];
        assert!(scaler.transform(&wrong).is_err());
    }

    #[test]
    fn test_encode_row_layout() {
        let encoder = FeatureEncoder::fit_reference();
        let flags = DescriptionFlags {
            has_weapon: true,
            threat_made: true,
            ..Default::default()
        };
        let row = encoder
            .encode(CrimeType::Burglary, Location::NightDistrict, &flags)
            .unwrap();

        // Burglary sorts second, Night District fourth
        assert_eq!(row[0], 1.0);
        assert_eq!(row[1], 3.0);
        assert_eq!(row[2], 33.0);
        assert_eq!(row[3], -1.0);
        assert_eq!(row[4], 61.0);
        assert_eq!(row[5], 75.0);
        assert_eq!(&row[6..], &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_value_counts() {
        let counts = value_counts(["HIGH", "LOW", "HIGH"]);
        assert_eq!(counts["HIGH"], 2);
        assert_eq!(counts["LOW"], 1);
    }
}

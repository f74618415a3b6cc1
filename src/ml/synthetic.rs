use crate::models::{CrimeType, DescriptionFlags, Location, SeverityLabel, Trend};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Standard deviation of the score noise
const NOISE_STD: f64 = 4.0;

/// One generated training row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrimeRecord {
    pub crime_type: CrimeType,
    pub location: Location,
    pub historical_freq: u8,
    pub historical_trend: Trend,
    pub base_crime_severity: u8,
    pub location_risk: u8,
    pub flags: DescriptionFlags,
    /// Clipped score rounded to two decimals
    pub severity_score: f64,
    pub severity_label: SeverityLabel,
}

/// Generate `n_samples` labelled crime records.
///
/// The same seed always yields the same records.
pub fn generate_dataset(n_samples: usize, seed: u64) -> Vec<CrimeRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_samples).map(|_| sample_record(&mut rng)).collect()
}

fn sample_record(rng: &mut StdRng) -> CrimeRecord {
    let crime_type = CrimeType::ALL[rng.gen_range(0..CrimeType::ALL.len())];
    let location = Location::ALL[rng.gen_range(0..Location::ALL.len())];
    let profile = crime_type.profile();
    let location_risk = location.risk_index();

    let flags = DescriptionFlags {
        has_weapon: rng.gen_bool(0.30),
        has_injury: rng.gen_bool(0.40),
        multiple_suspects: rng.gen_bool(0.35),
        involves_minor: rng.gen_bool(0.15),
        night_time: rng.gen_bool(0.45),
        threat_made: rng.gen_bool(0.40),
    };

    let indicator = |flag: bool| f64::from(u8::from(flag));
    let score = f64::from(profile.base_severity)
        + f64::from(profile.trend.as_feature()) * 8.0
        + f64::from(location_risk) * 0.25
        + indicator(flags.has_weapon) * 15.0
        + indicator(flags.has_injury) * 10.0
        + indicator(flags.multiple_suspects) * 10.0
        + indicator(flags.involves_minor) * 12.0
        + indicator(flags.night_time) * 5.0
        + indicator(flags.threat_made) * 7.0
        - f64::from(profile.historical_freq) / 100.0 * 6.0
        + standard_normal(rng) * NOISE_STD;
    let score = score.clamp(1.0, 100.0);

    CrimeRecord {
        crime_type,
        location,
        historical_freq: profile.historical_freq,
        historical_trend: profile.trend,
        base_crime_severity: profile.base_severity,
        location_risk,
        flags,
        severity_score: (score * 100.0).round() / 100.0,
        severity_label: SeverityLabel::from_score(score),
    }
}

/// Box-Muller transform
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Number of records per severity label
pub fn label_distribution(records: &[CrimeRecord]) -> BTreeMap<SeverityLabel, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.severity_label).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate_dataset(50, 42);
        let b = generate_dataset(50, 42);
        assert_eq!(a.len(), 50);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.crime_type, y.crime_type);
            assert_eq!(x.location, y.location);
            assert_eq!(x.flags, y.flags);
            assert_eq!(x.severity_score, y.severity_score);
        }

        let c = generate_dataset(50, 7);
        assert!(a
            .iter()
            .zip(&c)
            .any(|(x, y)| x.severity_score != y.severity_score));
    }

    #[test]
    fn test_records_are_consistent() {
        for record in generate_dataset(500, 1) {
            assert!((1.0..=100.0).contains(&record.severity_score));
            let profile = record.crime_type.profile();
            assert_eq!(record.base_crime_severity, profile.base_severity);
            assert_eq!(record.historical_freq, profile.historical_freq);
            assert_eq!(record.historical_trend, profile.trend);
            assert_eq!(record.location_risk, record.location.risk_index());

            // The label comes from the unrounded score, so only a score
            // within rounding distance of a band edge may disagree.
            let rounded_label = SeverityLabel::from_score(record.severity_score);
            if rounded_label != record.severity_label {
                let edge = [40.0, 60.0, 80.0]
                    .iter()
                    .any(|e| (record.severity_score - e).abs() <= 0.005);
                assert!(edge);
            }
        }
    }

    #[test]
    fn test_flag_rates_roughly_match() {
        let records = generate_dataset(5000, 42);
        let rate = |f: fn(&DescriptionFlags) -> bool| {
            records.iter().filter(|r| f(&r.flags)).count() as f64 / records.len() as f64
        };
        assert!((rate(|f| f.has_weapon) - 0.30).abs() < 0.03);
        assert!((rate(|f| f.involves_minor) - 0.15).abs() < 0.03);
        assert!((rate(|f| f.night_time) - 0.45).abs() < 0.03);
    }

    #[test]
    fn test_label_distribution_covers_all_labels() {
        let records = generate_dataset(2000, 42);
        let dist = label_distribution(&records);
        assert_eq!(dist.values().sum::<usize>(), 2000);
        for label in SeverityLabel::ALL {
            assert!(dist.get(&label).copied().unwrap_or(0) > 0, "{}", label);
        }
    }
}

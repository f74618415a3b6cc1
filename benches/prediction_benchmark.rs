//! Criterion benchmarks for the serving path
//!
//! Measures description scanning, feature encoding and a full prediction
//! against a small trained model.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crime_severity::config::TrainingConfig;
use crime_severity::ml::{
    CandidateParams, FeatureEncoder, ModelType, PredictionService, TrainingPipeline,
};
use crime_severity::models::{CrimeReport, CrimeType, DescriptionFlags, Location};

const DESCRIPTION: &str =
    "Two suspects with a knife threatened a teenager outside the station late at night";

fn bench_description_flags(c: &mut Criterion) {
    c.bench_function("description_flags_extract", |b| {
        b.iter(|| DescriptionFlags::extract(black_box(DESCRIPTION)));
    });
}

fn bench_feature_encoding(c: &mut Criterion) {
    let encoder = FeatureEncoder::fit_reference();
    let flags = DescriptionFlags::extract(DESCRIPTION);

    c.bench_function("feature_encode", |b| {
        b.iter(|| {
            encoder
                .encode(
                    black_box(CrimeType::Robbery),
                    black_box(Location::PublicTransportHub),
                    &flags,
                )
                .unwrap()
        });
    });
}

fn bench_predict(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        n_samples: 1000,
        cv_folds: 3,
        ..Default::default()
    };
    let params = CandidateParams {
        rf_trees: 50,
        ..Default::default()
    };

    let report = CrimeReport {
        crime_type: "Robbery".to_string(),
        location: "Public Transport Hub".to_string(),
        description: DESCRIPTION.to_string(),
        reporter_name: None,
        incident_datetime: None,
    };

    let mut group = c.benchmark_group("predict");
    for model_type in [ModelType::RandomForest, ModelType::LogisticRegression] {
        TrainingPipeline::new(config.clone(), dir.path())
            .with_candidate_params(params)
            .with_candidates(vec![model_type])
            .run()
            .unwrap();
        let service = PredictionService::from_dir(dir.path()).unwrap();

        group.bench_function(model_type.to_string(), |b| {
            b.iter(|| service.predict(black_box(&report)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_description_flags,
    bench_feature_encoding,
    bench_predict
);
criterion_main!(benches);

//! Fitting with the inversion fallback

use approx::assert_relative_eq;
use cisyn::data::MeasurementSet;
use cisyn::fit::{
    bootstrap_samples, fit_drug, BootstrapOptions, DoseResponseFitter, FitError, FitOptions,
    LogisticCurve, ModelType,
};

fn observed() -> MeasurementSet {
    MeasurementSet::from_pairs(&[
        (0.5, 0.08),
        (1.0, 0.15),
        (2.0, 0.24),
        (5.0, 0.41),
        (10.0, 0.55),
        (20.0, 0.7),
        (50.0, 0.86),
    ])
    .unwrap()
}

#[test]
fn test_log_linear_inversion_symmetry() {
    let fitter = DoseResponseFitter::new(FitOptions::default().without_bootstrap());
    let set = observed();

    let direct = fitter.estimate(&set, 0.5).unwrap();
    let inverted = fitter.estimate(&set.complemented(), 0.5).unwrap();

    assert_relative_eq!(-inverted.m, direct.m, epsilon = 1e-12);
    assert_relative_eq!(inverted.dm, direct.dm, max_relative = 1e-12);
    assert_eq!(inverted.point1.0, direct.point1.0);
    assert_eq!(inverted.point2.0, direct.point2.0);
    assert_relative_eq!(1.0 - inverted.point1.1, direct.point1.1, epsilon = 1e-12);
    assert_relative_eq!(1.0 - inverted.point2.1, direct.point2.1, epsilon = 1e-12);
}

#[test]
fn test_decreasing_response_fits_directly() {
    // A falling curve has a negative slope and needs no retry
    let set = MeasurementSet::from_pairs(&[(1.0, 0.9), (10.0, 0.5), (100.0, 0.1)]).unwrap();
    let report = fit_drug(&set, &FitOptions::default().without_bootstrap());
    let fit = report.fit().unwrap();
    assert!(fit.m < 0.0);
    assert!(!fit.inverted);
    assert_relative_eq!(fit.dm, 10.0, epsilon = 1e-9);
}

#[test]
fn test_identical_effects_fail_after_one_retry() {
    let set = MeasurementSet::from_pairs(&[(1.0, 0.4), (10.0, 0.4)]).unwrap();
    let report = fit_drug(&set, &FitOptions::default().without_bootstrap());

    assert!(!report.is_success());
    assert!(matches!(report.result, Err(FitError::Failure { .. })));
    assert_eq!(report.partial.attempts, 2);
    assert!(report.partial.inverted);
    assert!(report.partial.point1.is_some());
}

#[test]
fn test_two_parameter_logistic_recovers_curve() {
    let curve = LogisticCurve {
        model: ModelType::Logistic2,
        slope: 1.0,
        ec50: 10.0,
        lower: 0.0,
        upper: 1.0,
        asym: 1.0,
    };
    let pairs: Vec<(f64, f64)> = [1.0, 3.0, 10.0, 30.0, 100.0]
        .iter()
        .map(|&d| (d, curve.predict(d)))
        .collect();
    let set = MeasurementSet::from_pairs(&pairs).unwrap();
    let options = FitOptions::default()
        .with_model_type(ModelType::Logistic2)
        .without_bootstrap();

    let report = DoseResponseFitter::new(options).fit(&set, 0.5, None);
    let fit = report.fit().unwrap();
    assert!(!fit.inverted);
    assert_relative_eq!(fit.m, 1.0, epsilon = 1e-3);
    assert_relative_eq!(fit.dm, 10.0, epsilon = 1e-2);
    assert_relative_eq!(fit.gi50.unwrap(), 10.0, epsilon = 1e-2);
}

/// Rising response that levels off at 0.6
fn plateau() -> MeasurementSet {
    MeasurementSet::from_pairs(&[
        (0.5, 0.05),
        (1.0, 0.1),
        (2.0, 0.2),
        (5.0, 0.35),
        (10.0, 0.48),
        (20.0, 0.56),
        (50.0, 0.59),
        (100.0, 0.6),
    ])
    .unwrap()
}

#[test]
fn test_median_point_above_plateau_succeeds_inverted() {
    let options = FitOptions::default()
        .with_model_type(ModelType::Logistic3)
        .with_bootstrap(BootstrapOptions::default().with_samples(20).with_seed(5));
    let fitter = DoseResponseFitter::new(options.clone());
    let set = plateau();

    let report = fitter.fit(&set, 0.7, None);
    let fit = report.fit().unwrap();
    assert!(fit.inverted);
    assert!(report.partial.inverted);
    assert_eq!(report.partial.attempts, 2);
    assert!(fit.m > 0.0);
    assert!(fit.dm.is_finite() && fit.dm > 0.0);

    // Points and curve are both expressed for the effects as given
    let curve = fit.curve.as_ref().unwrap();
    assert_relative_eq!(fit.point1.1, curve.predict(fit.point1.0), epsilon = 1e-12);
    assert_relative_eq!(fit.point2.1, curve.predict(fit.point2.0), epsilon = 1e-12);
    assert_eq!(report.partial.curve.as_ref(), Some(curve));

    // Bootstrap slopes come from the complemented data with their sign flipped
    let complemented = set.complemented();
    let raw = fitter.estimate(&complemented, 1.0 - 0.7).unwrap();
    let expected = bootstrap_samples(&fitter, &complemented, 1.0 - 0.7, &raw, &options.bootstrap);
    assert!(!expected.is_empty());
    assert_eq!(fit.bootstrap_samples.len(), expected.len());
    for (&(m, dm), &(raw_m, raw_dm)) in fit.bootstrap_samples.iter().zip(&expected) {
        assert_eq!(m, -raw_m);
        assert_eq!(dm, raw_dm);
    }
}

#[test]
fn test_nonlinear_fit_persists_model() {
    let dir = std::env::temp_dir().join(format!("cisyn-fit-retry-{}", std::process::id()));
    let path = dir.join("0-blue-blue.model.json");
    let set = observed();
    let options = FitOptions::default()
        .with_model_type(ModelType::Logistic3)
        .without_bootstrap();

    let report = DoseResponseFitter::new(options).fit(&set, 0.5, Some(&path));
    let fit = report.fit().unwrap();
    assert_eq!(fit.model_path.as_deref(), Some(path.as_path()));

    let loaded = LogisticCurve::load(&path).unwrap();
    let curve = fit.curve.as_ref().unwrap();
    assert_eq!(loaded.model, ModelType::Logistic3);
    assert_relative_eq!(loaded.slope, curve.slope, max_relative = 1e-12);
    assert_relative_eq!(loaded.ec50, curve.ec50, max_relative = 1e-12);
    assert_relative_eq!(loaded.upper, curve.upper, max_relative = 1e-12);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_log_linear_fit_persists_nothing() {
    let dir = std::env::temp_dir().join(format!("cisyn-fit-ll-{}", std::process::id()));
    let path = dir.join("model.json");
    let fitter = DoseResponseFitter::new(FitOptions::default().without_bootstrap());
    let report = fitter.fit(&observed(), 0.5, Some(&path));
    assert!(report.fit().unwrap().model_path.is_none());
    assert!(!path.exists());
}

//! Combination index properties on fitted drugs

use approx::assert_relative_eq;
use cisyn::combination::{
    additive_dose, combination_index, effective_dose, random_ci, CiMode, CombinationTrial,
    MedianEffect, TrialSpec,
};
use cisyn::data::{CombinationId, MeasurementSet};
use cisyn::fit::{fit_drug, BootstrapOptions, DoseResponseFit, FitOptions, ModelType};

fn blue_set() -> MeasurementSet {
    MeasurementSet::from_pairs(&[(1.0, 0.1), (10.0, 0.5), (100.0, 0.9)]).unwrap()
}

fn red_set() -> MeasurementSet {
    MeasurementSet::from_pairs(&[(1.0, 0.2), (10.0, 0.5), (100.0, 0.8)]).unwrap()
}

fn fit(set: &MeasurementSet, options: &FitOptions) -> DoseResponseFit {
    fit_drug(set, options)
        .into_result()
        .expect("fit should succeed")
}

fn spec(model_type: ModelType, direct_ci: bool, doses: (f64, f64), effect: f64) -> TrialSpec {
    TrialSpec {
        combination: CombinationId::new("blue", "red"),
        blue_measurements: blue_set(),
        red_measurements: red_set(),
        blue_dose: doses.0,
        red_dose: doses.1,
        effect,
        fix_ratio: false,
        model_type,
        direct_ci,
        more_doses: Vec::new(),
        more_effects: Vec::new(),
    }
}

#[test]
fn test_median_doses_of_reference_drugs() {
    let options = FitOptions::default().without_bootstrap();
    let blue = fit(&blue_set(), &options);
    let red = fit(&red_set(), &options);

    assert_relative_eq!(blue.dm, 10.0, epsilon = 1e-9);
    assert_relative_eq!(red.dm, 10.0, epsilon = 1e-9);
    assert_relative_eq!(blue.effective_dose(0.5), blue.dm, epsilon = 1e-12);

    let ci = combination_index(10.0, 10.0, 0.5, (&blue).into(), (&red).into());
    assert_relative_eq!(ci, 2.0, epsilon = 1e-9);
}

#[test]
fn test_effective_dose_rises_with_effect() {
    let me = MedianEffect::new(0.9, 10.0);
    let doses: Vec<f64> = [0.1, 0.3, 0.5, 0.7, 0.9]
        .iter()
        .map(|&e| effective_dose(e, me.m, me.dm))
        .collect();
    assert!(doses.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_additive_gi50_of_fitted_drugs() {
    let options = FitOptions::default().without_bootstrap();
    let blue = MedianEffect::from(&fit(&blue_set(), &options));
    let red = MedianEffect::from(&fit(&red_set(), &options));

    let add = additive_dose(0.5, 1.0, 3.0, blue, red);
    assert_relative_eq!(
        combination_index(add.blue_dose, add.red_dose, 0.5, blue, red),
        1.0,
        epsilon = 1e-10
    );
    // Both drugs have Dm = 10, so any additive mixture at 50% totals 10
    assert_relative_eq!(add.total, 10.0, epsilon = 1e-8);
}

#[test]
fn test_bootstrap_ci_range_brackets_point_estimate() {
    let options = FitOptions::default().with_bootstrap(
        BootstrapOptions::default()
            .with_samples(200)
            .with_seed(42),
    );
    let blue = fit(&blue_set(), &options);
    let red = fit(&red_set(), &options);
    assert!(!blue.bootstrap_samples.is_empty());
    assert!(!red.bootstrap_samples.is_empty());

    let values = random_ci(5.0, 5.0, 0.5, &blue.bootstrap_samples, &red.bootstrap_samples);
    assert!(!values.is_empty());
    assert!(values.len() <= blue.bootstrap_samples.len().min(red.bootstrap_samples.len()));
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert!(values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_classical_trial() {
    let options = FitOptions::default().without_bootstrap();
    let trial = CombinationTrial::evaluate(
        spec(ModelType::LogLinear, true, (5.0, 5.0), 0.5),
        fit(&blue_set(), &options),
        fit(&red_set(), &options),
    )
    .unwrap();
    assert_eq!(trial.mode, CiMode::Classical);
    assert_relative_eq!(trial.ci.unwrap(), 1.0, epsilon = 1e-9);
    assert!(trial.fit_doses.is_none());
}

#[test]
fn test_direct_trial_on_two_parameter_logistic() {
    let options = FitOptions::default()
        .with_model_type(ModelType::Logistic2)
        .without_bootstrap();
    let trial = CombinationTrial::evaluate(
        spec(ModelType::Logistic2, true, (5.0, 5.0), 0.5),
        fit(&blue_set(), &options),
        fit(&red_set(), &options),
    )
    .unwrap();
    assert_eq!(trial.mode, CiMode::Direct);

    let (d1, d2) = trial.fit_doses.unwrap();
    assert_relative_eq!(d1, 10.0, epsilon = 1e-2);
    assert_relative_eq!(d2, 10.0, epsilon = 1e-2);
    assert_relative_eq!(trial.ci.unwrap(), 5.0 / d1 + 5.0 / d2, epsilon = 1e-12);
    assert_relative_eq!(trial.ci.unwrap(), 1.0, epsilon = 1e-2);
}

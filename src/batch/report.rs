//! Batch synergy report over a dose-response table

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::combination::{CombinationTrial, TrialSpec};
use crate::data::table::parse_effect;
use crate::data::{parse_dose_pair, CombinationId, DoseResponseTable, InputError, MeasurementSource};
use crate::error::SynergyError;
use crate::fit::{DoseResponseFitter, FitOptions, ModelType};

use super::scheduler::{BatchOutcome, BatchScheduler, SchedulerOptions};

/// Options for [run_report]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Model fitted to every drug (default: LogLinear)
    pub model_type: ModelType,
    /// Use the direct CI computation for nonlinear models (default: false)
    pub direct_ci: bool,
    /// Settings for the single-drug fits; the model type of each trial overrides theirs
    pub fit: FitOptions,
    pub scheduler: SchedulerOptions,
    /// Where nonlinear models are persisted (None = not persisted)
    pub artifact_dir: Option<PathBuf>,
}

impl ReportOptions {
    pub fn with_model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn with_direct_ci(mut self, direct_ci: bool) -> Self {
        self.direct_ci = direct_ci;
        self
    }

    pub fn with_fit_options(mut self, fit: FitOptions) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerOptions) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    fn model_path(&self, job_index: usize, drug: &str, role: &str) -> Option<PathBuf> {
        self.artifact_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-{}-{}.model.json", job_index, drug, role)))
    }
}

/// Derive one trial per measured dose pair of every combination in `table`
///
/// Trials whose inputs are invalid are skipped; their errors are returned next
/// to the trials that could be built.
pub fn build_trials(
    table: &DoseResponseTable,
    options: &ReportOptions,
) -> (Vec<TrialSpec>, Vec<InputError>) {
    let mut trials = Vec::new();
    let mut errors = Vec::new();
    for key in table.combinations() {
        let Some(treatment) = table.get(key) else {
            continue;
        };
        let combination: CombinationId = match key.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        };

        let measurements = table
            .get_measurements(&combination.blue)
            .and_then(|blue| Ok((blue, table.get_measurements(&combination.red)?)));
        let (blue_measurements, red_measurements) = match measurements {
            Ok(sets) => sets,
            Err(e) => {
                skip(e, &mut errors);
                continue;
            }
        };
        if treatment.doses.len() != treatment.effects.len() {
            skip(
                InputError::LengthMismatch {
                    treatment: key.to_string(),
                    doses: treatment.doses.len(),
                    effects: treatment.effects.len(),
                },
                &mut errors,
            );
            continue;
        }

        let more_doses: Vec<f64> = treatment
            .doses
            .iter()
            .filter_map(|token| parse_dose_pair(key, token).ok())
            .map(|(b, r)| b + r)
            .collect();
        let more_effects: Vec<f64> = treatment
            .effects
            .iter()
            .filter_map(|token| parse_effect(key, token).ok())
            .collect();

        for (dose_token, effect_token) in treatment.doses.iter().zip(&treatment.effects) {
            let parsed = parse_dose_pair(key, dose_token)
                .and_then(|doses| Ok((doses, parse_effect(key, effect_token)?)));
            let ((blue_dose, red_dose), effect) = match parsed {
                Ok(values) => values,
                Err(e) => {
                    skip(e, &mut errors);
                    continue;
                }
            };
            trials.push(TrialSpec {
                combination: combination.clone(),
                blue_measurements: blue_measurements.clone(),
                red_measurements: red_measurements.clone(),
                blue_dose,
                red_dose,
                effect,
                fix_ratio: false,
                model_type: options.model_type,
                direct_ci: options.direct_ci,
                more_doses: more_doses.clone(),
                more_effects: more_effects.clone(),
            });
        }
    }

    (trials, errors)
}

fn skip(e: InputError, errors: &mut Vec<InputError>) {
    tracing::warn!(error = %e, "Skipping trial");
    errors.push(e);
}

/// Fit both drugs of a trial and compute its combination index
///
/// Nonlinear models are persisted under the artifact directory with paths
/// unique to `job_index`.
pub fn run_trial(
    job_index: usize,
    spec: &TrialSpec,
    options: &ReportOptions,
) -> Result<CombinationTrial, SynergyError> {
    let fitter = DoseResponseFitter::new(options.fit.clone().with_model_type(spec.model_type));
    let median_point = spec.median_point();

    let blue_path = options.model_path(job_index, &spec.combination.blue, "blue");
    let blue = fitter
        .fit(&spec.blue_measurements, median_point, blue_path.as_deref())
        .into_result()?;
    let red_path = options.model_path(job_index, &spec.combination.red, "red");
    let red = fitter
        .fit(&spec.red_measurements, median_point, red_path.as_deref())
        .into_result()?;

    Ok(CombinationTrial::evaluate(spec.clone(), blue, red)?)
}

/// One line of the synergy report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub combination: String,
    /// `<blue_dose>-<red_dose>`
    pub doses: String,
    pub effect: f64,
    pub ci: Option<f64>,
    pub ci_low: Option<f64>,
    pub ci_high: Option<f64>,
}

impl From<&CombinationTrial> for ReportRow {
    fn from(trial: &CombinationTrial) -> Self {
        Self {
            combination: trial.spec.combination.to_string(),
            doses: trial.spec.doses_label(),
            effect: trial.spec.effect,
            ci: trial.ci,
            ci_low: trial.ci_low(),
            ci_high: trial.ci_high(),
        }
    }
}

/// Synergy summary built from the succeeded trials
#[derive(Debug, Clone)]
pub struct SynergyReport {
    /// Rows in submission order
    pub rows: Vec<ReportRow>,
    /// Inputs that could not be turned into trials
    pub skipped: Vec<InputError>,
    /// Every scheduled trial, including failed ones
    pub jobs: BatchOutcome<TrialSpec, CombinationTrial>,
}

impl SynergyReport {
    pub const HEADER: [&'static str; 6] =
        ["Combination", "Doses", "Effect", "CI", "CI low", "CI high"];

    /// Write the rows as tab-separated values with a header line
    pub fn write_tsv<W: io::Write>(&self, writer: W) -> Result<(), SynergyError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        let report_err = |e: csv::Error| SynergyError::Report(e.to_string());

        writer.write_record(Self::HEADER).map_err(report_err)?;
        for row in &self.rows {
            let fmt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
            writer
                .write_record([
                    row.combination.clone(),
                    row.doses.clone(),
                    row.effect.to_string(),
                    fmt(row.ci),
                    fmt(row.ci_low),
                    fmt(row.ci_high),
                ])
                .map_err(report_err)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_tsv_string(&self) -> Result<String, SynergyError> {
        let mut buf = Vec::new();
        self.write_tsv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| SynergyError::Report(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SynergyError> {
        let file = std::fs::File::create(path)?;
        self.write_tsv(io::BufWriter::new(file))
    }
}

/// Compute the synergy of every combination dose pair in `table`
pub fn run_report(
    table: &DoseResponseTable,
    options: &ReportOptions,
) -> Result<SynergyReport, SynergyError> {
    let (trials, skipped) = build_trials(table, options);
    tracing::info!(
        trials = trials.len(),
        skipped = skipped.len(),
        model = %options.model_type,
        "Built combination trials"
    );

    let inputs = trials
        .into_iter()
        .map(|spec| (spec.combination.to_string(), spec))
        .collect();
    let jobs = BatchScheduler::new(options.scheduler.clone())
        .run(inputs, |index, spec| run_trial(index, spec, options))?;

    let rows = jobs
        .succeeded()
        .filter_map(|job| job.output())
        .map(ReportRow::from)
        .collect();

    Ok(SynergyReport {
        rows,
        skipped,
        jobs,
    })
}

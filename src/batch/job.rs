use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::combination::CombinationTrial;
use crate::fit::{DoseResponseFit, FitReport};

/// Lifecycle of a scheduled job
///
/// `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single named result value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    Null,
    Flag(bool),
    Number(f64),
    Array(Vec<f64>),
    Pairs(Vec<(f64, f64)>),
}

impl InfoValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            InfoValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            InfoValue::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            InfoValue::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for InfoValue {
    fn from(v: f64) -> Self {
        InfoValue::Number(v)
    }
}

impl From<bool> for InfoValue {
    fn from(v: bool) -> Self {
        InfoValue::Flag(v)
    }
}

impl From<Vec<f64>> for InfoValue {
    fn from(v: Vec<f64>) -> Self {
        InfoValue::Array(v)
    }
}

impl From<Vec<(f64, f64)>> for InfoValue {
    fn from(v: Vec<(f64, f64)>) -> Self {
        InfoValue::Pairs(v)
    }
}

impl<T: Into<InfoValue>> From<Option<T>> for InfoValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(InfoValue::Null)
    }
}

/// Named results of a job, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobInfo(BTreeMap<String, InfoValue>);

impl JobInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<InfoValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(InfoValue::as_number)
    }

    pub fn array(&self, key: &str) -> Option<&[f64]> {
        self.get(key).and_then(InfoValue::as_array)
    }

    pub fn merge(&mut self, other: JobInfo) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn with_prefix(self, prefix: &str) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(k, v)| (format!("{}_{}", prefix, k), v))
                .collect(),
        )
    }
}

impl From<&DoseResponseFit> for JobInfo {
    fn from(fit: &DoseResponseFit) -> Self {
        let mut info = JobInfo::new();
        info.set("m", fit.m);
        info.set("dm", fit.dm);
        info.set("dose1", fit.point1.0);
        info.set("effect1", fit.point1.1);
        info.set("dose2", fit.point2.0);
        info.set("effect2", fit.point2.1);
        info.set("invert", fit.inverted);
        info.set("random_samples", fit.bootstrap_samples.clone());
        info.set("GI50", fit.gi50);
        info
    }
}

impl From<&FitReport> for JobInfo {
    /// Partial values are reported for failed fits
    fn from(report: &FitReport) -> Self {
        if let Some(fit) = report.fit() {
            return fit.into();
        }
        let p = &report.partial;
        let mut info = JobInfo::new();
        info.set("m", p.m);
        info.set("dm", p.dm);
        info.set("dose1", p.point1.map(|(d, _)| d));
        info.set("effect1", p.point1.map(|(_, e)| e));
        info.set("dose2", p.point2.map(|(d, _)| d));
        info.set("effect2", p.point2.map(|(_, e)| e));
        info.set("invert", p.inverted);
        info.set("random_samples", p.bootstrap_samples.clone());
        info.set("GI50", p.gi50);
        info.set("attempts", p.attempts as f64);
        info
    }
}

impl From<&CombinationTrial> for JobInfo {
    fn from(trial: &CombinationTrial) -> Self {
        let mut info = JobInfo::new();
        info.set("CI", trial.ci);
        info.set("random_CI", trial.random_ci.clone());
        info.set("GI50", trial.gi50);
        info.set("fit_dose_d1", trial.fit_doses.map(|(d, _)| d));
        info.set("fit_dose_d2", trial.fit_doses.map(|(_, d)| d));
        info.merge(JobInfo::from(&trial.blue).with_prefix("blue"));
        info.merge(JobInfo::from(&trial.red).with_prefix("red"));
        info
    }
}

/// Result of a unit of work that can describe itself to the scheduler
pub trait JobOutput {
    /// Named results recorded on the job
    fn info(&self) -> JobInfo {
        JobInfo::new()
    }

    /// Files written by the job
    fn artifacts(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

impl JobOutput for CombinationTrial {
    fn info(&self) -> JobInfo {
        self.into()
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        [&self.blue.model_path, &self.red.model_path]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

impl JobOutput for DoseResponseFit {
    fn info(&self) -> JobInfo {
        self.into()
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        self.model_path.iter().cloned().collect()
    }
}

/// A scheduled unit of work and its outcome
#[derive(Debug, Clone)]
pub struct Job<I, O> {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) input: I,
    pub(crate) status: JobStatus,
    pub(crate) output: Option<O>,
    pub(crate) error: Option<String>,
    pub(crate) info: JobInfo,
    pub(crate) artifacts: Vec<PathBuf>,
}

impl<I, O> Job<I, O> {
    pub fn new(index: usize, name: impl Into<String>, input: I) -> Self {
        Self {
            index,
            name: name.into(),
            input,
            status: JobStatus::Pending,
            output: None,
            error: None,
            info: JobInfo::new(),
            artifacts: Vec::new(),
        }
    }

    /// Position of the job in the submitted list
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    pub fn into_output(self) -> Option<O> {
        self.output
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn info(&self) -> &JobInfo {
        &self.info
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub(crate) fn start(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        self.status = JobStatus::Running;
    }

    pub(crate) fn succeed(&mut self, output: O)
    where
        O: JobOutput,
    {
        if self.status.is_terminal() {
            return;
        }
        self.info.merge(output.info());
        self.artifacts.extend(output.artifacts());
        self.output = Some(output);
        self.status = JobStatus::Succeeded;
    }

    pub(crate) fn fail(&mut self, error: String) {
        if self.status.is_terminal() {
            return;
        }
        self.error = Some(error);
        self.status = JobStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unit;
    impl JobOutput for Unit {}

    #[test]
    fn test_terminal_status_is_final() {
        let mut job: Job<(), Unit> = Job::new(0, "a", ());
        assert_eq!(job.status(), JobStatus::Pending);
        job.start();
        assert_eq!(job.status(), JobStatus::Running);
        job.fail("boom".to_string());
        job.succeed(Unit);
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error(), Some("boom"));
        assert!(job.output().is_none());
    }

    #[test]
    fn test_info_serializes_as_plain_map() {
        let mut info = JobInfo::new();
        info.set("CI", 0.8);
        info.set("random_CI", vec![0.5, 0.9]);
        info.set("invert", false);
        info.set("GI50", None::<f64>);
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(
            json,
            r#"{"CI":0.8,"GI50":null,"invert":false,"random_CI":[0.5,0.9]}"#
        );
        let back: JobInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.number("CI"), Some(0.8));
        assert_eq!(back.array("random_CI"), Some(&[0.5, 0.9][..]));
    }
}

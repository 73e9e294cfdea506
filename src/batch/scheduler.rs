use std::any::Any;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SynergyError;

use super::job::{Job, JobOutput, JobStatus};

/// Options for the batch scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    /// Maximum number of jobs running at once (default: 10)
    pub width: usize,
    /// Seed for the submission shuffle (None = random)
    pub seed: Option<u64>,
    /// Draw a progress bar on stderr (default: false)
    pub show_progress: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            width: 10,
            seed: None,
            show_progress: false,
        }
    }
}

impl SchedulerOptions {
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// All jobs of a batch after every one of them reached a terminal status
#[derive(Debug, Clone)]
pub struct BatchOutcome<I, O> {
    jobs: Vec<Job<I, O>>,
}

impl<I, O> BatchOutcome<I, O> {
    /// Every job, in submission order
    pub fn jobs(&self) -> &[Job<I, O>] {
        &self.jobs
    }

    /// Succeeded jobs, in submission order
    pub fn succeeded(&self) -> impl Iterator<Item = &Job<I, O>> {
        self.jobs
            .iter()
            .filter(|j| j.status() == JobStatus::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Job<I, O>> {
        self.jobs.iter().filter(|j| j.status() == JobStatus::Failed)
    }

    pub fn into_succeeded(self) -> Vec<Job<I, O>> {
        self.jobs
            .into_iter()
            .filter(|j| j.status() == JobStatus::Succeeded)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Runs independent jobs on a fixed-width rayon pool
///
/// The submission order is shuffled once before scheduling. A job that returns
/// an error or panics is marked failed without affecting the others.
#[derive(Debug, Clone, Default)]
pub struct BatchScheduler {
    options: SchedulerOptions,
}

impl BatchScheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Run `work` on every `(name, input)` and wait for all of them
    pub fn run<I, O, E, F>(
        &self,
        inputs: Vec<(String, I)>,
        work: F,
    ) -> Result<BatchOutcome<I, O>, SynergyError>
    where
        I: Send,
        O: JobOutput + Send,
        E: Display,
        F: Fn(usize, &I) -> Result<O, E> + Sync,
    {
        let mut jobs: Vec<Job<I, O>> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, (name, input))| Job::new(index, name, input))
            .collect();
        let total = jobs.len();

        let seed = self.options.seed.unwrap_or_else(|| rand::rng().random());
        jobs.shuffle(&mut StdRng::seed_from_u64(seed));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.width.max(1))
            .build()
            .map_err(|e| SynergyError::Scheduler(format!("failed to build thread pool: {}", e)))?;

        let progress = self.progress_bar(total);
        tracing::info!(jobs = total, width = self.options.width, "Starting batch");

        pool.install(|| {
            jobs.par_iter_mut().with_max_len(1).for_each(|job| {
                job.start();
                let index = job.index;
                match catch_unwind(AssertUnwindSafe(|| work(index, &job.input))) {
                    Ok(Ok(output)) => job.succeed(output),
                    Ok(Err(e)) => {
                        tracing::warn!(job = %job.name, error = %e, "Job failed");
                        job.fail(e.to_string());
                    }
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        tracing::warn!(job = %job.name, panic = %message, "Job panicked");
                        job.fail(format!("panicked: {}", message));
                    }
                }
                progress.inc(1);
            });
        });
        progress.finish_and_clear();

        jobs.sort_by_key(|j| j.index);
        let outcome = BatchOutcome { jobs };
        tracing::info!(
            jobs = total,
            succeeded = outcome.succeeded().count(),
            failed = outcome.failed().count(),
            "Batch finished"
        );
        Ok(outcome)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message("Processing jobs");
        bar
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Squared(usize);
    impl JobOutput for Squared {}

    fn inputs(n: usize) -> Vec<(String, usize)> {
        (0..n).map(|i| (format!("job-{}", i), i)).collect()
    }

    #[test]
    fn test_all_jobs_succeed_in_order() {
        let scheduler = BatchScheduler::new(SchedulerOptions::default().with_seed(1));
        let outcome = scheduler
            .run(inputs(25), |_, &i| Ok::<_, String>(Squared(i * i)))
            .unwrap();
        let values: Vec<usize> = outcome
            .succeeded()
            .map(|j| j.output().unwrap().0)
            .collect();
        assert_eq!(values, (0..25).map(|i| i * i).collect::<Vec<_>>());
        assert!(outcome.jobs().iter().all(|j| j.status().is_terminal()));
    }

    #[test]
    fn test_errors_and_panics_are_contained() {
        let scheduler = BatchScheduler::new(SchedulerOptions::default().with_width(3).with_seed(9));
        let outcome = scheduler
            .run(inputs(12), |_, &i| {
                if i % 4 == 1 {
                    panic!("job {} exploded", i);
                }
                if i % 4 == 3 {
                    return Err(format!("job {} refused", i));
                }
                Ok(Squared(i))
            })
            .unwrap();

        let ok: Vec<usize> = outcome.succeeded().map(|j| j.index()).collect();
        assert_eq!(ok, vec![0, 2, 4, 6, 8, 10]);
        assert_eq!(outcome.failed().count(), 6);
        let panicked = &outcome.jobs()[5];
        assert_eq!(panicked.status(), JobStatus::Failed);
        assert!(panicked.error().unwrap().contains("exploded"));
        assert_eq!(outcome.jobs()[7].error(), Some("job 7 refused"));
    }

    #[test]
    fn test_empty_batch() {
        let outcome = BatchScheduler::default()
            .run(Vec::<(String, ())>::new(), |_, _| Ok::<_, String>(Squared(0)))
            .unwrap();
        assert!(outcome.is_empty());
    }
}

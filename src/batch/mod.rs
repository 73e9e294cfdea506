//! Batch execution of independent synergy computations
//!
//! [BatchScheduler] runs any list of jobs on a dedicated rayon pool with a
//! bounded width. Failures (errors and panics) stay inside their job, and only
//! the succeeded jobs are used to build a [SynergyReport].

pub mod job;
pub mod report;
pub mod scheduler;

pub use job::{InfoValue, Job, JobInfo, JobOutput, JobStatus};
pub use report::{build_trials, run_report, run_trial, ReportOptions, ReportRow, SynergyReport};
pub use scheduler::{BatchOutcome, BatchScheduler, SchedulerOptions};

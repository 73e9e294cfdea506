pub mod batch;
pub mod combination;
pub mod data;
pub mod error;
pub mod fit;

pub use crate::batch::{run_report, BatchScheduler, ReportOptions, SynergyReport};
pub use crate::combination::{combination_index, CiMode, CombinationTrial, TrialSpec};
pub use crate::data::*;
pub use crate::fit::{fit_drug, DoseResponseFit, DoseResponseFitter, FitOptions, ModelType};
pub use error::SynergyError;

pub mod prelude {
    pub mod data {
        pub use crate::data::{
            CombinationId, DoseResponseTable, Measurement, MeasurementSet, MeasurementSource,
        };
    }
    pub mod fit {
        pub use crate::fit::{
            fit_drug, BootstrapOptions, DoseResponseFit, DoseResponseFitter, FitOptions,
            FitReport, LogisticCurve, ModelType, ResamplingScheme,
        };
    }
    pub mod batch {
        pub use crate::batch::{
            run_report, BatchScheduler, JobInfo, JobStatus, ReportOptions, SchedulerOptions,
            SynergyReport,
        };
    }

    pub use crate::combination::{
        additive_dose, combination_index, effective_dose, random_ci, CiMode, CombinationTrial,
        MedianEffect, TrialSpec,
    };
    pub use crate::data::*;
    pub use crate::error::SynergyError;
}

pub mod error;
pub mod measurement;
pub mod table;

pub use error::InputError;
pub use measurement::{Measurement, MeasurementSet};
pub use table::{parse_dose_pair, CombinationId, DoseResponseTable, MeasurementSource, Treatment};

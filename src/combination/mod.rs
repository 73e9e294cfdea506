//! Combination index of two single-drug fits
//!
//! Two modes are available, chosen by [CiMode::select]:
//!
//! - **Classical**: the closed-form Chou-Talalay index from `(m, dm)` of both drugs
//! - **Direct**: each nonlinear curve is inverted at the trial effect and the
//!   index is taken against those doses
//!
//! Bootstrap CI values and the additive GI50 always use the classical formula.
//!
//! ```rust
//! use cisyn::combination::{combination_index, MedianEffect};
//!
//! let blue = MedianEffect::new(1.0, 10.0);
//! let red = MedianEffect::new(0.8, 10.0);
//! let ci = combination_index(10.0, 10.0, 0.5, blue, red);
//! assert!((ci - 2.0).abs() < 1e-12);
//! ```

mod direct;
mod error;
mod index;
mod trial;

pub use direct::{direct_ci, fit_dose, DirectCi};
pub use error::CombinationError;
pub use index::{
    additive_dose, combination_index, effective_dose, random_ci, AdditiveDose, MedianEffect,
};
pub use trial::{CiMode, CombinationTrial, TrialSpec};

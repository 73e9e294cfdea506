use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::InputError;
use super::measurement::{Measurement, MeasurementSet};

/// Separator between the values of a multi-valued cell
pub const VALUE_SEPARATOR: char = '|';

/// Separator between drug names in a combination key and doses in a dose pair
pub const COMBINATION_SEPARATOR: char = '-';

/// Source of single-drug measurements
pub trait MeasurementSource {
    /// Look up the measurements recorded for `drug_id`
    fn get_measurements(&self, drug_id: &str) -> Result<MeasurementSet, InputError>;
}

/// A pair of drugs, written `<blue>-<red>`
///
/// A key without a separator names the same drug on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombinationId {
    pub blue: String,
    pub red: String,
}

impl CombinationId {
    pub fn new(blue: impl Into<String>, red: impl Into<String>) -> Self {
        Self {
            blue: blue.into(),
            red: red.into(),
        }
    }

    /// Whether a treatment key denotes a combination
    pub fn is_combination(key: &str) -> bool {
        key.contains(COMBINATION_SEPARATOR)
    }
}

impl FromStr for CombinationId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once(COMBINATION_SEPARATOR) {
            Some((blue, red)) => Self::new(blue, red),
            None => Self::new(s, s),
        })
    }
}

impl fmt::Display for CombinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.blue, COMBINATION_SEPARATOR, self.red)
    }
}

/// Raw dose and effect tokens for one treatment
///
/// Tokens are kept unparsed: combination doses are dose pairs such as `"1.5-3"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub doses: Vec<String>,
    pub effects: Vec<String>,
}

/// Parsed dose-response dataset: treatment key → (doses, effects)
///
/// Keys containing `-` are drug combinations, every other key is a single drug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoseResponseTable {
    keys: Vec<String>,
    treatments: HashMap<String, Treatment>,
}

impl DoseResponseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a treatment, keeping the position of an existing key
    pub fn insert(&mut self, key: impl Into<String>, treatment: Treatment) {
        let key = key.into();
        if !self.treatments.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.treatments.insert(key, treatment);
    }

    /// Insert numeric single-drug measurements
    pub fn with_drug(mut self, drug: impl Into<String>, doses: &[f64], effects: &[f64]) -> Self {
        self.insert(
            drug,
            Treatment {
                doses: doses.iter().map(|d| d.to_string()).collect(),
                effects: effects.iter().map(|e| e.to_string()).collect(),
            },
        );
        self
    }

    /// Insert combination measurements given as `(blue_dose, red_dose)` pairs
    pub fn with_combination(
        mut self,
        combination: &CombinationId,
        doses: &[(f64, f64)],
        effects: &[f64],
    ) -> Self {
        self.insert(
            combination.to_string(),
            Treatment {
                doses: doses
                    .iter()
                    .map(|(b, r)| format!("{}{}{}", b, COMBINATION_SEPARATOR, r))
                    .collect(),
                effects: effects.iter().map(|e| e.to_string()).collect(),
            },
        );
        self
    }

    pub fn get(&self, key: &str) -> Option<&Treatment> {
        self.treatments.get(key)
    }

    /// Treatment keys in insertion order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Combination keys in insertion order
    pub fn combinations(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .map(String::as_str)
            .filter(|k| CombinationId::is_combination(k))
    }

    /// Single-drug keys in insertion order
    pub fn drugs(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .map(String::as_str)
            .filter(|k| !CombinationId::is_combination(k))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Read a table from a tab-separated file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let file = std::fs::File::open(path.as_ref())
            .map_err(|e| InputError::Table(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_reader(file)
    }

    /// Read a table from tab-separated text
    ///
    /// The first line is a header (`#Treatment<TAB>Dose<TAB>Effect`). Every
    /// following line holds one treatment, with its doses and effects separated
    /// by `|`. Rows are stored unchecked; a row whose value counts differ is
    /// reported when its measurements are requested.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, InputError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut table = Self::new();
        for record in reader.records() {
            let record = record.map_err(|e| InputError::Table(e.to_string()))?;
            let key = match record.get(0).map(str::trim) {
                Some(key) if !key.is_empty() => key.to_string(),
                _ => continue,
            };
            let doses = split_values(record.get(1).unwrap_or_default());
            let effects = split_values(record.get(2).unwrap_or_default());
            table.insert(key, Treatment { doses, effects });
        }
        Ok(table)
    }
}

impl MeasurementSource for DoseResponseTable {
    fn get_measurements(&self, drug_id: &str) -> Result<MeasurementSet, InputError> {
        let treatment = self.get(drug_id).ok_or_else(|| InputError::UnknownTreatment {
            treatment: drug_id.to_string(),
        })?;
        if treatment.doses.len() != treatment.effects.len() {
            return Err(InputError::LengthMismatch {
                treatment: drug_id.to_string(),
                doses: treatment.doses.len(),
                effects: treatment.effects.len(),
            });
        }
        let measurements = treatment
            .doses
            .iter()
            .zip(&treatment.effects)
            .map(|(dose, effect)| {
                let dose = parse_dose(drug_id, dose)?;
                let effect = parse_effect(drug_id, effect)?;
                Measurement::new(dose, effect)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MeasurementSet::new(measurements))
    }
}

/// Split a `<blue>-<red>` dose token into its two doses
pub fn parse_dose_pair(treatment: &str, token: &str) -> Result<(f64, f64), InputError> {
    let invalid = || InputError::InvalidDose {
        treatment: treatment.to_string(),
        token: token.to_string(),
    };
    let (blue, red) = token.split_once(COMBINATION_SEPARATOR).ok_or_else(invalid)?;
    let blue = blue.trim().parse::<f64>().map_err(|_| invalid())?;
    let red = red.trim().parse::<f64>().map_err(|_| invalid())?;
    if !blue.is_finite() || !red.is_finite() || blue < 0.0 || red < 0.0 {
        return Err(invalid());
    }
    Ok((blue, red))
}

pub(crate) fn parse_dose(treatment: &str, token: &str) -> Result<f64, InputError> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| InputError::InvalidDose {
            treatment: treatment.to_string(),
            token: token.to_string(),
        })
}

pub(crate) fn parse_effect(treatment: &str, token: &str) -> Result<f64, InputError> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| InputError::InvalidEffect {
            treatment: treatment.to_string(),
            token: token.to_string(),
        })
}

fn split_values(cell: &str) -> Vec<String> {
    cell.split(VALUE_SEPARATOR)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

//! Parameter grids and their Cartesian-product enumeration.
//!
//! A [`ParameterGrid`] maps parameter names to ordered candidate values.
//! [`ParameterGrid::assignments`] walks the full Cartesian product with an
//! iterative odometer, visiting every combination exactly once in a
//! deterministic order (first-inserted parameter varies slowest). No
//! recursion, so grid depth is unbounded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::EvalError;

/// One candidate parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    /// Integer value, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(_) => None,
        }
    }

    /// Numeric value as `f64`; integers are widened.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One concrete point in the grid: a `name -> value` mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterAssignment {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterAssignment {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(ParamValue::as_int)
    }

    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).map(ParamValue::as_f64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn insert(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_string(), value);
    }
}

impl fmt::Display for ParameterAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// Ordered mapping of parameter names to non-empty candidate value lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterGrid {
    entries: Vec<(String, Vec<ParamValue>)>,
}

impl ParameterGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter with its ordered candidate values.
    ///
    /// Rejects empty value lists and duplicate names up front so a bad grid
    /// fails before any evaluation work starts.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        values: Vec<ParamValue>,
    ) -> Result<&mut Self, EvalError> {
        let name = name.into();
        if values.is_empty() {
            return Err(EvalError::EmptyValueList { name });
        }
        if self.entries.iter().any(|(n, _)| *n == name) {
            return Err(EvalError::DuplicateParam { name });
        }
        self.entries.push((name, values));
        Ok(self)
    }

    /// Convenience for integer-valued parameters.
    pub fn insert_ints(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = i64>,
    ) -> Result<&mut Self, EvalError> {
        self.insert(name, values.into_iter().map(ParamValue::Int).collect())
    }

    /// Convenience for float-valued parameters.
    pub fn insert_floats(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = f64>,
    ) -> Result<&mut Self, EvalError> {
        self.insert(name, values.into_iter().map(ParamValue::Float).collect())
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of assignments in the Cartesian product.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        self.entries
            .iter()
            .map(|(_, values)| values.len())
            .product()
    }

    /// Deterministic iterator over the full Cartesian product.
    #[must_use]
    pub fn assignments(&self) -> GridIter<'_> {
        GridIter {
            grid: self,
            indices: vec![0; self.entries.len()],
            exhausted: self.entries.is_empty(),
        }
    }
}

/// Iterative odometer over a grid's Cartesian product.
///
/// The last-inserted parameter advances fastest; carries ripple toward the
/// first. Yields `cardinality()` assignments, each exactly once.
pub struct GridIter<'a> {
    grid: &'a ParameterGrid,
    indices: Vec<usize>,
    exhausted: bool,
}

impl Iterator for GridIter<'_> {
    type Item = ParameterAssignment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let mut assignment = ParameterAssignment::default();
        for (slot, (name, values)) in self.indices.iter().zip(&self.grid.entries) {
            assignment.insert(name, values[*slot]);
        }

        // Advance the odometer.
        self.exhausted = true;
        for (slot, (_, values)) in self.indices.iter_mut().zip(&self.grid.entries).rev() {
            *slot += 1;
            if *slot < values.len() {
                self.exhausted = false;
                break;
            }
            *slot = 0;
        }

        Some(assignment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.exhausted {
            (0, Some(0))
        } else {
            // Upper bound only; counting remaining combinations exactly is
            // not needed anywhere.
            (1, Some(self.grid.cardinality()))
        }
    }
}

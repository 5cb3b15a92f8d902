//! One builder per problem family. Each turns validated input into a
//! [`Model`] plus a decoder mapping an optimal [`SolveResult`] back to a
//! domain-level plan.

pub mod assignment;
pub mod facility;
pub mod generic;
pub mod knapsack;
pub mod routing;
pub mod scheduling;

use std::time::Duration;

use optiform_solver::{MilpSolver, Model, ModelError, SolveResult, SolveStatus, VarId};
use thiserror::Error;

use crate::parser::ParseError;

/// Input dimensions that do not fit together
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{quantity}: expected {expected}, found {found}")]
pub struct ShapeError {
    pub quantity: String,
    pub expected: String,
    pub found: String,
}

impl ShapeError {
    pub fn new(quantity: impl Into<String>, expected: impl ToString, found: impl ToString) -> Self {
        Self {
            quantity: quantity.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Cannot decode a result with status {0}")]
    NotOptimal(SolveStatus),
    #[error("Solver returned no value for variable {0}")]
    MissingValue(String),
    #[error("Task {0} is not assigned to any machine")]
    Unassigned(usize),
}

/// What a solve produced, with the decoded plan only when optimal
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", content = "result", rename_all = "lowercase"))]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Optimal(T),
    Infeasible,
    Unbounded,
    Unknown(Option<String>),
}

impl<T> Outcome<T> {
    pub fn status(&self) -> SolveStatus {
        match self {
            Outcome::Optimal(_) => SolveStatus::Optimal,
            Outcome::Infeasible => SolveStatus::Infeasible,
            Outcome::Unbounded => SolveStatus::Unbounded,
            Outcome::Unknown(_) => SolveStatus::Unknown,
        }
    }

    pub fn optimal(self) -> Option<T> {
        match self {
            Outcome::Optimal(plan) => Some(plan),
            _ => None,
        }
    }
}

type Decoder<T> = Box<dyn Fn(&SolveResult) -> Result<T, DecodeError>>;

/// A complete model together with the decoder for its solutions
pub struct Built<T> {
    model: Model,
    decoder: Decoder<T>,
}

impl<T> Built<T> {
    pub(crate) fn new(model: Model, decoder: impl Fn(&SolveResult) -> Result<T, DecodeError> + 'static) -> Self {
        Self {
            model,
            decoder: Box::new(decoder),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Decode an optimal result. Any other status is rejected.
    pub fn decode(&self, result: &SolveResult) -> Result<T, DecodeError> {
        if !result.is_optimal() {
            return Err(DecodeError::NotOptimal(result.status()));
        }
        (self.decoder)(result)
    }

    /// Solve with `solver`, decoding only when the status is optimal.
    /// The model is consumed.
    pub fn solve<S: MilpSolver>(self, solver: &S, time_limit: Option<Duration>) -> Result<Outcome<T>, DecodeError> {
        let result = solver.solve(&self.model, time_limit);
        tracing::debug!(model = self.model.name(), status = %result.status(), "solve finished");
        match result.status() {
            SolveStatus::Optimal => self.decode(&result).map(Outcome::Optimal),
            SolveStatus::Infeasible => Ok(Outcome::Infeasible),
            SolveStatus::Unbounded => Ok(Outcome::Unbounded),
            SolveStatus::Unknown => Ok(Outcome::Unknown(result.message().map(str::to_string))),
        }
    }
}

impl<T> std::fmt::Debug for Built<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Built").field("model", &self.model).finish_non_exhaustive()
    }
}

/// A binary decision counts as taken only when the solver reports exactly 1.
///
/// Values such as `0.999999997` are not taken; backends are expected to
/// return integral values for binary variables.
pub(crate) fn is_selected(result: &SolveResult, var: VarId) -> bool {
    result.value(var) == Some(1.0)
}

pub(crate) fn value_of(result: &SolveResult, var: VarId, name: impl Fn() -> String) -> Result<f64, DecodeError> {
    result.value(var).ok_or_else(|| DecodeError::MissingValue(name()))
}

pub(crate) fn objective_of(result: &SolveResult) -> Result<f64, DecodeError> {
    result
        .objective_value()
        .ok_or(DecodeError::NotOptimal(result.status()))
}

pub(crate) fn check_len(quantity: &str, expected: usize, found: usize) -> Result<(), ShapeError> {
    if expected == found {
        Ok(())
    } else {
        Err(ShapeError::new(quantity, expected, found))
    }
}

/// Every row of `matrix` must exist and hold exactly `cols` entries
pub(crate) fn check_matrix(name: &str, matrix: &[Vec<f64>], rows: usize, cols: usize) -> Result<(), ShapeError> {
    check_len(&format!("{} rows", name), rows, matrix.len())?;
    for (i, row) in matrix.iter().enumerate() {
        check_len(&format!("{} row {} columns", name, i), cols, row.len())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiform_solver::Model;

    #[test]
    fn test_decode_rejects_non_optimal() {
        let built = Built::new(Model::new("empty"), |_| Ok(()));
        assert_eq!(
            built.decode(&SolveResult::infeasible()),
            Err(DecodeError::NotOptimal(SolveStatus::Infeasible))
        );
        assert_eq!(built.decode(&SolveResult::optimal(0.0, vec![])), Ok(()));
    }

    #[test]
    fn test_exact_threshold_on_near_integral_values() {
        let mut model = Model::new("t");
        let a = model.add_binary("a").unwrap();
        let b = model.add_binary("b").unwrap();
        let result = SolveResult::optimal(1.0, vec![0.999999997, 1.0]);

        // Exact equality: a near-one value is not decoded as selected
        assert!(!is_selected(&result, a));
        assert!(is_selected(&result, b));
    }

    #[test]
    fn test_shape_helpers() {
        assert!(check_matrix("costs", &[vec![1.0, 2.0], vec![3.0, 4.0]], 2, 2).is_ok());
        let err = check_matrix("costs", &[vec![1.0, 2.0], vec![3.0]], 2, 2).unwrap_err();
        assert_eq!(err, ShapeError::new("costs row 1 columns", 2, 1));
        assert_eq!(err.to_string(), "costs row 1 columns: expected 2, found 1");
    }
}

use std::fmt;

use crate::model::VarId;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// An optimal solution was found
    Optimal,
    /// No assignment satisfies all constraints
    Infeasible,
    /// The objective can improve without limit
    Unbounded,
    /// The solver failed, hit a limit, or could not decide
    Unknown,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// The outcome of a solve attempt.
///
/// Objective value and variable values are present if and only if the status
/// is [`SolveStatus::Optimal`]; the constructors are the only way to build one.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    status: SolveStatus,
    objective_value: Option<f64>,
    values: Option<Vec<f64>>,
    message: Option<String>,
}

impl SolveResult {
    /// `values[i]` is the value of the variable declared `i`-th
    pub fn optimal(objective_value: f64, values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            objective_value: Some(objective_value),
            values: Some(values),
            message: None,
        }
    }

    pub fn infeasible() -> Self {
        Self::without_values(SolveStatus::Infeasible, None)
    }

    pub fn unbounded() -> Self {
        Self::without_values(SolveStatus::Unbounded, None)
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::without_values(SolveStatus::Unknown, Some(reason.into()))
    }

    fn without_values(status: SolveStatus, message: Option<String>) -> Self {
        Self {
            status,
            objective_value: None,
            values: None,
            message,
        }
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn objective_value(&self) -> Option<f64> {
        self.objective_value
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.as_ref()?.get(var.index()).copied()
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    /// Why the solver gave up, for [`SolveStatus::Unknown`]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

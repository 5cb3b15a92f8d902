mod branch;
mod model;
mod simplex;
mod solution;

use std::time::Duration;

pub use branch::BranchAndBound;
pub use model::{
    Bounds, Constraint, Domain, IndexLabel, LinearExpr, Model, ModelError, Objective, ObjectiveSense, Rule, Sense,
    VarId, Variable,
};
pub use simplex::Simplex;
pub use solution::{SolveResult, SolveStatus};

/// Boundary to a MILP/LP backend.
///
/// Implementations must report limits, crashes and any other failure as
/// [`SolveStatus::Unknown`], never as an optimum they cannot vouch for.
/// When `time_limit` is exceeded the result is `Unknown`.
pub trait MilpSolver {
    fn solve(&self, model: &Model, time_limit: Option<Duration>) -> SolveResult;
}

impl<S: MilpSolver + ?Sized> MilpSolver for &S {
    fn solve(&self, model: &Model, time_limit: Option<Duration>) -> SolveResult {
        (**self).solve(model, time_limit)
    }
}

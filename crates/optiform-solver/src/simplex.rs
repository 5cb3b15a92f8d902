use std::time::{Duration, Instant};

use crate::MilpSolver;
use crate::model::{Bounds, Model, ObjectiveSense, Sense};
use crate::solution::SolveResult;

/// Outcome of solving the continuous relaxation of a model
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Relaxation {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
    Limit(String),
}

/// Two-phase tableau simplex for linear programs.
///
/// Solves only models without integer or binary variables; wrap it in
/// [`crate::BranchAndBound`] for mixed-integer models.
#[derive(Debug, Clone)]
pub struct Simplex {
    /// Maximum pivots per solve before giving up
    max_iterations: usize,
    /// Tolerance for pivot and reduced-cost comparisons
    tolerance: f64,
    /// Largest residual artificial value accepted as feasible
    feasibility_tolerance: f64,
}

impl Default for Simplex {
    fn default() -> Self {
        Self {
            max_iterations: 50_000,
            tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
        }
    }
}

impl Simplex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.feasibility_tolerance = tol;
        self
    }

    /// Solve the relaxation of `model` with `bounds` replacing the declared
    /// variable bounds (one entry per variable).
    pub(crate) fn relax(&self, model: &Model, bounds: &[Bounds], deadline: Option<Instant>) -> Relaxation {
        let Some(form) = StandardForm::build(model, bounds, self.feasibility_tolerance) else {
            return Relaxation::Infeasible;
        };

        let mut tableau = Tableau::build(&form);
        let mut iterations = 0;

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau, &mut iterations, deadline) {
                Phase::Optimal => {}
                Phase::Unbounded => return Relaxation::Infeasible,
                Phase::Limit(reason) => return Relaxation::Limit(reason),
            }
            if !self.artificials_cleared(&tableau) {
                return Relaxation::Infeasible;
            }
            self.drive_out_artificials(&mut tableau);
            tableau.restore_objective(self.tolerance);
        }

        // Phase 2: Optimize, never letting an artificial re-enter
        let exclude_from = tableau.n_vars + tableau.n_slack;
        match self.run(&mut tableau, exclude_from, &mut iterations, deadline) {
            Phase::Optimal => {}
            Phase::Unbounded => return Relaxation::Unbounded,
            Phase::Limit(reason) => return Relaxation::Limit(reason),
        }

        let values = form.values(&tableau.column_values());
        let objective = model.objective().expr.evaluate(&values);
        Relaxation::Optimal { values, objective }
    }

    fn phase1(&self, tableau: &mut Tableau, iterations: &mut usize, deadline: Option<Instant>) -> Phase {
        // Auxiliary objective: maximize -sum(artificials)
        let obj_row = tableau.obj_row();
        let n_cols = tableau.n_cols();
        let art_start = tableau.n_vars + tableau.n_slack;

        tableau.saved_objective = tableau.data[obj_row].clone();
        for j in 0..n_cols {
            tableau.data[obj_row][j] = 0.0;
        }
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[obj_row][j] = -1.0;
        }

        // Make objective row consistent with basic artificial variables
        for i in 0..obj_row {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[obj_row][j] += tableau.data[i][j];
                }
            }
        }

        self.run(tableau, n_cols - 1, iterations, deadline)
    }

    fn artificials_cleared(&self, tableau: &Tableau) -> bool {
        let art_start = tableau.n_vars + tableau.n_slack;
        let rhs_col = tableau.n_cols() - 1;
        (0..tableau.obj_row()).all(|i| {
            tableau.basic_vars[i] < art_start || tableau.data[i][rhs_col].abs() <= self.feasibility_tolerance
        })
    }

    /// Pivot zero-level artificials out of the basis. Rows where that is
    /// impossible are redundant and stay inert during phase 2.
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let art_start = tableau.n_vars + tableau.n_slack;
        for i in 0..tableau.obj_row() {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            if let Some(j) = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance) {
                tableau.pivot(i, j);
            }
        }
    }

    fn run(
        &self,
        tableau: &mut Tableau,
        exclude_from: usize,
        iterations: &mut usize,
        deadline: Option<Instant>,
    ) -> Phase {
        loop {
            let Some(pivot_col) = self.find_pivot_column(tableau, exclude_from) else {
                return Phase::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                return Phase::Unbounded;
            };
            if *iterations >= self.max_iterations {
                return Phase::Limit(format!("simplex iteration limit of {} reached", self.max_iterations));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Phase::Limit("time limit exceeded".to_string());
            }
            *iterations += 1;
            tableau.pivot(pivot_row, pivot_col);
        }
    }

    /// Bland's rule: the lowest-index column that improves the objective
    fn find_pivot_column(&self, tableau: &Tableau, exclude_from: usize) -> Option<usize> {
        let obj_row = tableau.obj_row();
        (0..exclude_from).find(|&j| tableau.data[obj_row][j] > self.tolerance)
    }

    /// Minimum ratio test, ties broken by the lowest basic variable index
    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let rhs_col = tableau.n_cols() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..tableau.obj_row() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            let better = match min_row {
                None => true,
                Some(row) => {
                    ratio < min_ratio - self.tolerance
                        || ((ratio - min_ratio).abs() <= self.tolerance
                            && tableau.basic_vars[i] < tableau.basic_vars[row])
                }
            };
            if better {
                min_ratio = ratio;
                min_row = Some(i);
            }
        }

        min_row
    }
}

impl MilpSolver for Simplex {
    fn solve(&self, model: &Model, time_limit: Option<Duration>) -> SolveResult {
        if model.has_integral_variables() {
            return SolveResult::unknown("model has integer or binary variables; the simplex solves only its relaxation");
        }
        let bounds: Vec<Bounds> = model.variables().iter().map(|v| v.bounds).collect();
        let deadline = time_limit.map(|limit| Instant::now() + limit);
        match self.relax(model, &bounds, deadline) {
            Relaxation::Optimal { values, objective } => SolveResult::optimal(objective, values),
            Relaxation::Infeasible => SolveResult::infeasible(),
            Relaxation::Unbounded => SolveResult::unbounded(),
            Relaxation::Limit(reason) => SolveResult::unknown(reason),
        }
    }
}

enum Phase {
    Optimal,
    Unbounded,
    Limit(String),
}

/// A column of the standard form: contributes `sign * y` to variable `var`
struct Column {
    var: usize,
    sign: f64,
}

struct Row {
    coefficients: Vec<f64>,
    op: Sense,
    rhs: f64,
}

/// The model rewritten over non-negative columns.
///
/// Each variable is `offset + sum(sign * column)`: shifted by a finite lower
/// bound, reflected through a finite upper bound, or split when free.
struct StandardForm {
    columns: Vec<Column>,
    offsets: Vec<f64>,
    rows: Vec<Row>,
    objective: Vec<f64>,
    maximize: bool,
}

impl StandardForm {
    /// Returns `None` when some variable has an empty bound interval
    fn build(model: &Model, bounds: &[Bounds], tolerance: f64) -> Option<Self> {
        let n = model.num_variables();
        let mut columns = Vec::new();
        let mut offsets = vec![0.0; n];
        let mut columns_of: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut caps = Vec::new();

        for (var, b) in bounds.iter().enumerate().take(n) {
            match (b.lower, b.upper) {
                (Some(lower), Some(upper)) => {
                    if lower > upper + tolerance {
                        return None;
                    }
                    offsets[var] = lower;
                    caps.push((columns.len(), (upper - lower).max(0.0)));
                    columns_of[var].push(columns.len());
                    columns.push(Column { var, sign: 1.0 });
                }
                (Some(lower), None) => {
                    offsets[var] = lower;
                    columns_of[var].push(columns.len());
                    columns.push(Column { var, sign: 1.0 });
                }
                (None, Some(upper)) => {
                    offsets[var] = upper;
                    columns_of[var].push(columns.len());
                    columns.push(Column { var, sign: -1.0 });
                }
                (None, None) => {
                    columns_of[var].push(columns.len());
                    columns.push(Column { var, sign: 1.0 });
                    columns_of[var].push(columns.len());
                    columns.push(Column { var, sign: -1.0 });
                }
            }
        }

        let n_cols = columns.len();
        let mut rows = Vec::with_capacity(model.num_constraints() + caps.len());

        for c in model.constraints() {
            let mut coefficients = vec![0.0; n_cols];
            let mut rhs = c.rhs - c.expr.constant();
            for (var, coef) in c.expr.terms() {
                let j = var.index();
                rhs -= coef * offsets[j];
                for &col in &columns_of[j] {
                    coefficients[col] += coef * columns[col].sign;
                }
            }
            rows.push(Row { coefficients, op: c.sense, rhs });
        }

        for (col, cap) in caps {
            let mut coefficients = vec![0.0; n_cols];
            coefficients[col] = 1.0;
            rows.push(Row {
                coefficients,
                op: Sense::Le,
                rhs: cap,
            });
        }

        let mut objective = vec![0.0; n_cols];
        for (var, coef) in model.objective().expr.terms() {
            for &col in &columns_of[var.index()] {
                objective[col] += coef * columns[col].sign;
            }
        }

        Some(Self {
            columns,
            offsets,
            rows,
            objective,
            maximize: model.objective().sense == ObjectiveSense::Maximize,
        })
    }

    /// Map column values back to model variable values
    fn values(&self, column_values: &[f64]) -> Vec<f64> {
        let mut values = self.offsets.clone();
        for (col, column) in self.columns.iter().enumerate() {
            values[column.var] += column.sign * column_values[col];
        }
        values
    }
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
    saved_objective: Vec<f64>,
}

impl Tableau {
    fn build(form: &StandardForm) -> Self {
        let n_vars = form.columns.len();
        let n_constraints = form.rows.len();

        // Non-negative right-hand sides: negate the row and flip its sense
        let rows: Vec<(Vec<f64>, Sense, f64)> = form
            .rows
            .iter()
            .map(|r| {
                if r.rhs < 0.0 {
                    let op = match r.op {
                        Sense::Le => Sense::Ge,
                        Sense::Ge => Sense::Le,
                        Sense::Eq => Sense::Eq,
                    };
                    (r.coefficients.iter().map(|c| -c).collect(), op, -r.rhs)
                } else {
                    (r.coefficients.clone(), r.op, r.rhs)
                }
            })
            .collect();

        // Count slack and artificial variables needed
        let mut n_slack = 0;
        let mut n_artificial = 0;
        for (_, op, _) in &rows {
            match op {
                Sense::Le => n_slack += 1,
                Sense::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                Sense::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let mut data = vec![vec![0.0; total_cols]; n_constraints + 1];
        let mut basic_vars = vec![0; n_constraints];

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (coefficients, op, rhs)) in rows.into_iter().enumerate() {
            data[i][..n_vars].copy_from_slice(&coefficients);
            data[i][total_cols - 1] = rhs;

            match op {
                Sense::Le => {
                    data[i][slack_idx] = 1.0;
                    basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                Sense::Ge => {
                    data[i][slack_idx] = -1.0;
                    slack_idx += 1;
                    data[i][artificial_idx] = 1.0;
                    basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                Sense::Eq => {
                    data[i][artificial_idx] = 1.0;
                    basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        // Objective row (last row), stored in maximization form: a positive
        // entry marks a column that improves the objective
        for (j, &coef) in form.objective.iter().enumerate() {
            data[n_constraints][j] = if form.maximize { coef } else { -coef };
        }

        Self {
            data,
            basic_vars,
            n_vars,
            n_slack,
            n_artificial,
            saved_objective: Vec::new(),
        }
    }

    fn obj_row(&self) -> usize {
        self.data.len() - 1
    }

    fn n_cols(&self) -> usize {
        self.data[0].len()
    }

    /// Put the phase 2 objective back, expressed in the current basis
    fn restore_objective(&mut self, tolerance: f64) {
        let obj_row = self.obj_row();
        let n_cols = self.n_cols();
        self.data[obj_row] = std::mem::take(&mut self.saved_objective);
        for i in 0..obj_row {
            let basic = self.basic_vars[i];
            let ratio = self.data[obj_row][basic];
            if ratio.abs() > tolerance {
                for j in 0..n_cols {
                    self.data[obj_row][j] -= ratio * self.data[i][j];
                }
            }
        }
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let n_cols = self.n_cols();

        self.basic_vars[row] = col;

        let pivot_val = self.data[row][col];
        for j in 0..n_cols {
            self.data[row][j] /= pivot_val;
        }

        let pivot_row = self.data[row].clone();
        for (i, current) in self.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = current[col];
            if factor != 0.0 {
                for j in 0..n_cols {
                    current[j] -= factor * pivot_row[j];
                }
            }
        }
    }

    fn column_values(&self) -> Vec<f64> {
        let rhs_col = self.n_cols() - 1;
        let mut values = vec![0.0; self.n_vars];
        for (i, &basic) in self.basic_vars.iter().enumerate() {
            if basic < self.n_vars {
                values[basic] = self.data[i][rhs_col].max(0.0);
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bounds, LinearExpr, Model, ObjectiveSense, Sense};
    use crate::solution::SolveStatus;

    fn two_var_model() -> (Model, crate::VarId, crate::VarId) {
        let mut model = Model::new("lp");
        let x = model.add_continuous("x", Bounds::non_negative()).unwrap();
        let y = model.add_continuous("y", Bounds::non_negative()).unwrap();
        (model, x, y)
    }

    #[test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to:
        //   x + y <= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=11
        let (mut model, x, y) = two_var_model();
        model
            .set_objective(LinearExpr::new().with(3.0, x).with(2.0, y), ObjectiveSense::Maximize)
            .unwrap();
        model.add_constraint("sum", LinearExpr::new().with(1.0, x).with(1.0, y), Sense::Le, 4.0).unwrap();
        model.add_constraint("x_max", LinearExpr::new().with(1.0, x), Sense::Le, 3.0).unwrap();
        model.add_constraint("y_max", LinearExpr::new().with(1.0, y), Sense::Le, 3.0).unwrap();

        let solution = Simplex::new().solve(&model, None);

        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert!((solution.value(x).unwrap() - 3.0).abs() < 1e-6);
        assert!((solution.value(y).unwrap() - 1.0).abs() < 1e-6);
        assert!((solution.objective_value().unwrap() - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_minimization_with_ge() {
        // Minimize: 2x + 3y
        // Subject to:
        //   x + y >= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=9
        let (mut model, x, y) = two_var_model();
        model
            .set_objective(LinearExpr::new().with(2.0, x).with(3.0, y), ObjectiveSense::Minimize)
            .unwrap();
        model.add_constraint("sum", LinearExpr::new().with(1.0, x).with(1.0, y), Sense::Ge, 4.0).unwrap();
        model.add_constraint("x_max", LinearExpr::new().with(1.0, x), Sense::Le, 3.0).unwrap();
        model.add_constraint("y_max", LinearExpr::new().with(1.0, y), Sense::Le, 3.0).unwrap();

        let solution = Simplex::new().solve(&model, None);

        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert!((solution.value(x).unwrap() - 3.0).abs() < 1e-6);
        assert!((solution.value(y).unwrap() - 1.0).abs() < 1e-6);
        assert!((solution.objective_value().unwrap() - 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible() {
        let mut model = Model::new("lp");
        let x = model.add_continuous("x", Bounds::non_negative()).unwrap();
        model.set_objective(LinearExpr::new().with(1.0, x), ObjectiveSense::Minimize).unwrap();
        model.add_constraint("lower", LinearExpr::new().with(1.0, x), Sense::Ge, 5.0).unwrap();
        model.add_constraint("upper", LinearExpr::new().with(1.0, x), Sense::Le, 3.0).unwrap();

        assert_eq!(Simplex::new().solve(&model, None).status(), SolveStatus::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        let (mut model, x, y) = two_var_model();
        model.set_objective(LinearExpr::new().with(1.0, x), ObjectiveSense::Maximize).unwrap();
        model.add_constraint("c", LinearExpr::new().with(1.0, x).with(-1.0, y), Sense::Ge, 1.0).unwrap();

        assert_eq!(Simplex::new().solve(&model, None).status(), SolveStatus::Unbounded);
    }

    #[test]
    fn test_free_variable_goes_negative() {
        // Minimize x subject to x >= -5 with x free
        let mut model = Model::new("lp");
        let x = model.add_continuous("x", Bounds::FREE).unwrap();
        model.set_objective(LinearExpr::new().with(1.0, x), ObjectiveSense::Minimize).unwrap();
        model.add_constraint("floor", LinearExpr::new().with(1.0, x), Sense::Ge, -5.0).unwrap();

        let solution = Simplex::new().solve(&model, None);
        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert!((solution.value(x).unwrap() + 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_rhs_equality_and_bounds() {
        // Minimize x + y subject to x - y == -2, 1 <= x <= 4, y >= 0
        // Optimal: x=1, y=3, obj=4
        let mut model = Model::new("lp");
        let x = model.add_continuous("x", Bounds::new(1.0, 4.0)).unwrap();
        let y = model.add_continuous("y", Bounds::non_negative()).unwrap();
        model
            .set_objective(LinearExpr::new().with(1.0, x).with(1.0, y), ObjectiveSense::Minimize)
            .unwrap();
        model.add_constraint("diff", LinearExpr::new().with(1.0, x).with(-1.0, y), Sense::Eq, -2.0).unwrap();

        let solution = Simplex::new().solve(&model, None);
        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert!((solution.value(x).unwrap() - 1.0).abs() < 1e-6);
        assert!((solution.value(y).unwrap() - 3.0).abs() < 1e-6);
        assert!((solution.objective_value().unwrap() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_expression_constant_moves_to_rhs() {
        // Maximize x subject to x + 2 <= 5
        let mut model = Model::new("lp");
        let x = model.add_continuous("x", Bounds::non_negative()).unwrap();
        model.set_objective(LinearExpr::new().with(1.0, x), ObjectiveSense::Maximize).unwrap();
        let mut expr = LinearExpr::new().with(1.0, x);
        expr.add_constant(2.0);
        model.add_constraint("shifted", expr, Sense::Le, 5.0).unwrap();

        let solution = Simplex::new().solve(&model, None);
        assert!((solution.value(x).unwrap() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_refuses_integral_models() {
        let mut model = Model::new("mip");
        model.add_binary("b").unwrap();
        let solution = Simplex::new().solve(&model, None);
        assert_eq!(solution.status(), SolveStatus::Unknown);
        assert!(solution.values().is_none());
    }

    #[test]
    fn test_iteration_limit_is_unknown() {
        let (mut model, x, y) = two_var_model();
        model
            .set_objective(LinearExpr::new().with(3.0, x).with(2.0, y), ObjectiveSense::Maximize)
            .unwrap();
        model.add_constraint("sum", LinearExpr::new().with(1.0, x).with(1.0, y), Sense::Le, 4.0).unwrap();

        let solution = Simplex::new().with_max_iterations(0).solve(&model, None);
        assert_eq!(solution.status(), SolveStatus::Unknown);
    }
}

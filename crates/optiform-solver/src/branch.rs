use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::MilpSolver;
use crate::model::{Bounds, Model, ObjectiveSense};
use crate::simplex::{Relaxation, Simplex};
use crate::solution::SolveResult;

/// Depth-first branch-and-bound over the [`Simplex`] relaxation.
///
/// Integer and binary variables are branched on by tightening their bounds;
/// the reported optimum has every integral variable snapped to an exact
/// integer.
#[derive(Debug, Clone)]
pub struct BranchAndBound {
    simplex: Simplex,
    /// Maximum relaxations solved before giving up
    max_nodes: usize,
    /// Distance from the nearest integer still treated as integral
    integrality_tolerance: f64,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self {
            simplex: Simplex::default(),
            max_nodes: 100_000,
            integrality_tolerance: 1e-6,
        }
    }
}

impl BranchAndBound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_simplex(mut self, simplex: Simplex) -> Self {
        self.simplex = simplex;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    pub fn with_integrality_tolerance(mut self, tol: f64) -> Self {
        self.integrality_tolerance = tol;
        self
    }

    /// The integral variable farthest from an integer, with its value
    fn branching_candidate(&self, model: &Model, values: &[f64]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64, f64)> = None;
        for (j, variable) in model.variables().iter().enumerate() {
            if !variable.domain.is_integral() {
                continue;
            }
            let value = values[j];
            let distance = (value - value.round()).abs();
            if distance > self.integrality_tolerance && best.is_none_or(|(_, _, d)| distance > d) {
                best = Some((j, value, distance));
            }
        }
        best.map(|(j, value, _)| (j, value))
    }

    fn snap(model: &Model, mut values: Vec<f64>) -> Vec<f64> {
        for (value, variable) in values.iter_mut().zip(model.variables()) {
            if variable.domain.is_integral() {
                *value = value.round();
                if *value == 0.0 {
                    *value = 0.0; // no negative zero
                }
            }
        }
        values
    }
}

impl MilpSolver for BranchAndBound {
    fn solve(&self, model: &Model, time_limit: Option<Duration>) -> SolveResult {
        let deadline = time_limit.map(|limit| Instant::now() + limit);
        let minimize = model.objective().sense == ObjectiveSense::Minimize;
        // Strictly better than the incumbent, beyond numerical noise
        let improves = |candidate: f64, best: f64| {
            let margin = 1e-9 * (1.0 + best.abs());
            if minimize {
                candidate < best - margin
            } else {
                candidate > best + margin
            }
        };

        let root: Vec<Bounds> = model.variables().iter().map(|v| v.bounds).collect();
        let mut stack = vec![root];
        let mut incumbent: Option<(f64, Vec<f64>)> = None;
        let mut nodes = 0usize;

        while let Some(bounds) = stack.pop() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(nodes, "branch-and-bound stopped by time limit");
                return SolveResult::unknown("time limit exceeded");
            }
            if nodes >= self.max_nodes {
                debug!(nodes, "branch-and-bound stopped by node limit");
                return SolveResult::unknown(format!("node limit of {} reached", self.max_nodes));
            }
            nodes += 1;

            let (values, objective) = match self.simplex.relax(model, &bounds, deadline) {
                Relaxation::Optimal { values, objective } => (values, objective),
                Relaxation::Infeasible => {
                    trace!(node = nodes, "relaxation infeasible");
                    continue;
                }
                Relaxation::Unbounded => return SolveResult::unbounded(),
                Relaxation::Limit(reason) => return SolveResult::unknown(reason),
            };

            if let Some((best, _)) = &incumbent {
                if !improves(objective, *best) {
                    trace!(node = nodes, objective, "pruned by bound");
                    continue;
                }
            }

            match self.branching_candidate(model, &values) {
                None => {
                    trace!(node = nodes, objective, "new incumbent");
                    incumbent = Some((objective, values));
                }
                Some((j, value)) => {
                    trace!(node = nodes, var = j, value, "branching");
                    let mut down = bounds.clone();
                    down[j].upper = Some(down[j].upper.map_or(value.floor(), |u| u.min(value.floor())));
                    let mut up = bounds;
                    up[j].lower = Some(up[j].lower.map_or(value.ceil(), |l| l.max(value.ceil())));
                    // Explore the branch nearest the relaxed value first
                    if value - value.floor() >= 0.5 {
                        stack.push(down);
                        stack.push(up);
                    } else {
                        stack.push(up);
                        stack.push(down);
                    }
                }
            }
        }

        debug!(nodes, found = incumbent.is_some(), "branch-and-bound finished");

        match incumbent {
            Some((_, values)) => {
                let values = Self::snap(model, values);
                let objective = model.objective().expr.evaluate(&values);
                SolveResult::optimal(objective, values)
            }
            None => SolveResult::infeasible(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bounds, LinearExpr, Model, ObjectiveSense, Sense};
    use crate::solution::SolveStatus;
    use proptest::prelude::*;

    #[test]
    fn test_binary_knapsack() {
        // Maximize 3a + 4b + 5c + 8d + 9e
        // Subject to 2a + 3b + 4c + 5d + 9e <= 20
        // Optimal value 25 (a, c, d, e)
        let values = [3.0, 4.0, 5.0, 8.0, 9.0];
        let weights = [2.0, 3.0, 4.0, 5.0, 9.0];

        let mut model = Model::new("knapsack");
        let x: Vec<_> = (0..5).map(|i| model.add_binary(format!("x[{}]", i)).unwrap()).collect();
        model
            .set_objective(
                LinearExpr::sum(values.iter().zip(&x).map(|(&v, &x)| (v, x))),
                ObjectiveSense::Maximize,
            )
            .unwrap();
        model
            .add_constraint(
                "capacity",
                LinearExpr::sum(weights.iter().zip(&x).map(|(&w, &x)| (w, x))),
                Sense::Le,
                20.0,
            )
            .unwrap();

        let solution = BranchAndBound::new().solve(&model, None);

        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert_eq!(solution.objective_value(), Some(25.0));
        for &var in &x {
            let value = solution.value(var).unwrap();
            assert!(value == 0.0 || value == 1.0, "{} is not snapped", value);
        }
    }

    #[test]
    fn test_general_integer() {
        // Maximize x + y subject to 2x + 2y <= 7, x, y integer >= 0
        let mut model = Model::new("int");
        let x = model.add_integer("x", Bounds::non_negative()).unwrap();
        let y = model.add_integer("y", Bounds::non_negative()).unwrap();
        model
            .set_objective(LinearExpr::new().with(1.0, x).with(1.0, y), ObjectiveSense::Maximize)
            .unwrap();
        model
            .add_constraint("c", LinearExpr::new().with(2.0, x).with(2.0, y), Sense::Le, 7.0)
            .unwrap();

        let solution = BranchAndBound::new().solve(&model, None);
        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert_eq!(solution.objective_value(), Some(3.0));
    }

    #[test]
    fn test_integer_infeasible() {
        // 2x == 1 has no integer solution
        let mut model = Model::new("int");
        let x = model.add_integer("x", Bounds::new(0.0, 5.0)).unwrap();
        model
            .add_constraint("half", LinearExpr::new().with(2.0, x), Sense::Eq, 1.0)
            .unwrap();

        assert_eq!(BranchAndBound::new().solve(&model, None).status(), SolveStatus::Infeasible);
    }

    #[test]
    fn test_unbounded_relaxation() {
        let mut model = Model::new("int");
        let x = model.add_integer("x", Bounds::non_negative()).unwrap();
        model.set_objective(LinearExpr::new().with(1.0, x), ObjectiveSense::Maximize).unwrap();

        assert_eq!(BranchAndBound::new().solve(&model, None).status(), SolveStatus::Unbounded);
    }

    #[test]
    fn test_limits_report_unknown() {
        let mut model = Model::new("int");
        let x = model.add_integer("x", Bounds::new(0.0, 5.0)).unwrap();
        model.set_objective(LinearExpr::new().with(1.0, x), ObjectiveSense::Maximize).unwrap();

        let by_nodes = BranchAndBound::new().with_max_nodes(0).solve(&model, None);
        assert_eq!(by_nodes.status(), SolveStatus::Unknown);
        assert!(by_nodes.objective_value().is_none());

        let by_time = BranchAndBound::new().solve(&model, Some(Duration::ZERO));
        assert_eq!(by_time.status(), SolveStatus::Unknown);
        assert_eq!(by_time.message(), Some("time limit exceeded"));
    }

    fn brute_force_knapsack(values: &[f64], weights: &[f64], capacity: f64) -> f64 {
        (0u32..1 << values.len())
            .filter_map(|mask| {
                let picked = (0..values.len()).filter(|i| mask & (1 << i) != 0);
                let weight: f64 = picked.clone().map(|i| weights[i]).sum();
                (weight <= capacity).then(|| picked.map(|i| values[i]).sum::<f64>())
            })
            .fold(0.0, f64::max)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_matches_brute_force_knapsack(
            items in prop::collection::vec((1u8..20, 1u8..10), 1..7),
            capacity in 0u8..30,
        ) {
            let values: Vec<f64> = items.iter().map(|&(v, _)| f64::from(v)).collect();
            let weights: Vec<f64> = items.iter().map(|&(_, w)| f64::from(w)).collect();
            let capacity = f64::from(capacity);

            let mut model = Model::new("knapsack");
            let x: Vec<_> = (0..values.len()).map(|i| model.add_binary(format!("x[{}]", i)).unwrap()).collect();
            model
                .set_objective(
                    LinearExpr::sum(values.iter().zip(&x).map(|(&v, &x)| (v, x))),
                    ObjectiveSense::Maximize,
                )
                .unwrap();
            model
                .add_constraint(
                    "capacity",
                    LinearExpr::sum(weights.iter().zip(&x).map(|(&w, &x)| (w, x))),
                    Sense::Le,
                    capacity,
                )
                .unwrap();

            let solution = BranchAndBound::new().solve(&model, None);
            prop_assert_eq!(solution.status(), SolveStatus::Optimal);
            prop_assert_eq!(solution.objective_value(), Some(brute_force_knapsack(&values, &weights, capacity)));
        }
    }
}

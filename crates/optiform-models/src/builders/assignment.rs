use std::fmt;

use optiform_solver::{LinearExpr, Model, ObjectiveSense, Rule, VarId};
use tracing::debug;

use super::{BuildError, Built, ShapeError, check_matrix, is_selected, objective_of};

/// Square assignment: every worker takes exactly one task and every task
/// goes to exactly one worker.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentInput {
    pub num_workers: usize,
    pub num_tasks: usize,
    /// `costs[worker][task]`
    pub costs: Vec<Vec<f64>>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentPlan {
    pub total_cost: f64,
    /// `(worker, task)` pairs in worker order
    pub pairs: Vec<(usize, usize)>,
}

impl fmt::Display for AssignmentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total cost: {}", self.total_cost)?;
        for (worker, task) in &self.pairs {
            writeln!(f, "  worker {} -> task {}", worker, task)?;
        }
        Ok(())
    }
}

impl AssignmentInput {
    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.num_workers != self.num_tasks {
            return Err(ShapeError::new(
                "tasks (assignment needs one task per worker)",
                self.num_workers,
                self.num_tasks,
            ));
        }
        check_matrix("costs", &self.costs, self.num_workers, self.num_tasks)
    }

    pub fn build(&self) -> Result<Built<AssignmentPlan>, BuildError> {
        self.validate()?;
        let n = self.num_workers;
        let mut model = Model::new("assignment");

        let mut x: Vec<Vec<VarId>> = Vec::with_capacity(n);
        for w in 0..n {
            let row = (0..n)
                .map(|t| model.add_binary(format!("x[{},{}]", w, t)))
                .collect::<Result<Vec<_>, _>>()?;
            x.push(row);
        }

        let cost = LinearExpr::sum(x.iter().enumerate().flat_map(|(w, row)| {
            row.iter()
                .enumerate()
                .map(move |(t, &var)| (self.costs[w][t], var))
        }));
        model.set_objective(cost, ObjectiveSense::Minimize)?;

        model.add_family("worker", 0..n, |&w| {
            Rule::eq(LinearExpr::sum((0..n).map(|t| (1.0, x[w][t]))), 1.0)
        })?;
        model.add_family("task", 0..n, |&t| {
            Rule::eq(LinearExpr::sum((0..n).map(|w| (1.0, x[w][t]))), 1.0)
        })?;

        debug!(
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            "assignment model built"
        );

        Ok(Built::new(model, move |result| {
            let mut pairs = Vec::new();
            for (w, row) in x.iter().enumerate() {
                for (t, &var) in row.iter().enumerate() {
                    if is_selected(result, var) {
                        pairs.push((w, t));
                    }
                }
            }
            Ok(AssignmentPlan {
                total_cost: objective_of(result)?,
                pairs,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::Outcome;
    use optiform_solver::{BranchAndBound, SolveResult, SolveStatus};

    fn example() -> AssignmentInput {
        AssignmentInput {
            num_workers: 4,
            num_tasks: 4,
            costs: vec![
                vec![9.0, 2.0, 7.0, 8.0],
                vec![6.0, 4.0, 3.0, 7.0],
                vec![5.0, 8.0, 1.0, 8.0],
                vec![7.0, 6.0, 9.0, 4.0],
            ],
        }
    }

    #[test]
    fn test_constraint_count() {
        let built = example().build().unwrap();
        assert_eq!(built.model().num_variables(), 16);
        assert_eq!(built.model().num_constraints(), 4 + 4);
    }

    #[test]
    fn test_known_optimum_is_a_bijection() {
        let plan = example()
            .build()
            .unwrap()
            .solve(&BranchAndBound::new(), None)
            .unwrap()
            .optimal()
            .expect("assignment should be optimal");

        // 2 (w0->t1) + 6 (w1->t0) + 1 (w2->t2) + 4 (w3->t3)
        assert!((plan.total_cost - 13.0).abs() < 1e-9);
        assert_eq!(plan.pairs.len(), 4);
        let mut workers: Vec<_> = plan.pairs.iter().map(|p| p.0).collect();
        let mut tasks: Vec<_> = plan.pairs.iter().map(|p| p.1).collect();
        workers.sort();
        tasks.sort();
        assert_eq!(workers, vec![0, 1, 2, 3]);
        assert_eq!(tasks, vec![0, 1, 2, 3]);
        assert_eq!(plan.pairs, vec![(0, 1), (1, 0), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_non_square_rejected_before_model() {
        let input = AssignmentInput {
            num_workers: 3,
            num_tasks: 4,
            costs: vec![vec![1.0; 4]; 3],
        };
        // validate() alone rejects the shape, and build() runs it before
        // declaring any variable
        assert!(input.validate().is_err());
        match input.build() {
            Err(BuildError::Shape(err)) => {
                assert_eq!(err.expected, "3");
                assert_eq!(err.found, "4");
            }
            other => panic!("expected shape error, got {:?}", other),
        }
    }

    #[test]
    fn test_ragged_costs_rejected() {
        let mut input = example();
        input.costs[2].pop();
        assert!(matches!(input.build(), Err(BuildError::Shape(_))));
    }

    #[test]
    fn test_decoder_refuses_infeasible() {
        let built = example().build().unwrap();
        assert!(built.decode(&SolveResult::infeasible()).is_err());
        let outcome: Outcome<AssignmentPlan> = Outcome::Infeasible;
        assert_eq!(outcome.status(), SolveStatus::Infeasible);
    }
}

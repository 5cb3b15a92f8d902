use std::fmt;

use optiform_solver::{Bounds, LinearExpr, Model, ObjectiveSense, Rule, VarId};
use tracing::{debug, warn};

use super::{BuildError, Built, DecodeError, ShapeError, check_len, is_selected, value_of};

/// Constant relaxing the no-overlap rows when a task is off the machine
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BigM {
    /// Sum of all durations
    #[default]
    Auto,
    Fixed(f64),
}

/// Parallel-machine scheduling minimizing the makespan
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingInput {
    pub num_tasks: usize,
    pub num_machines: usize,
    pub durations: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub big_m: BigM,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub task: usize,
    pub machine: usize,
    pub start: f64,
    pub end: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub makespan: f64,
    /// In task order
    pub tasks: Vec<ScheduledTask>,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Makespan: {}", self.makespan)?;
        for t in &self.tasks {
            writeln!(f, "  task {} on machine {}: {} - {}", t.task, t.machine, t.start, t.end)?;
        }
        Ok(())
    }
}

impl SchedulingInput {
    pub fn validate(&self) -> Result<(), BuildError> {
        check_len("durations (one per task)", self.num_tasks, self.durations.len())?;
        if self.num_machines == 0 {
            return Err(ShapeError::new("machines", "at least 1", 0).into());
        }
        if let Some((task, d)) = self
            .durations
            .iter()
            .enumerate()
            .find(|&(_, d)| !d.is_finite() || *d < 0.0)
        {
            return Err(BuildError::InvalidInput(format!(
                "duration of task {} must be a non-negative number, got {}",
                task, d
            )));
        }
        if let BigM::Fixed(m) = self.big_m {
            if !m.is_finite() || m < 0.0 {
                return Err(BuildError::InvalidInput(format!("big-M must be a non-negative number, got {}", m)));
            }
        }
        Ok(())
    }

    /// The big-M constant the no-overlap rows will use
    pub fn big_m_value(&self) -> f64 {
        match self.big_m {
            BigM::Auto => self.durations.iter().sum(),
            BigM::Fixed(m) => m,
        }
    }

    pub fn build(&self) -> Result<Built<Schedule>, BuildError> {
        self.validate()?;
        let (nt, nm) = (self.num_tasks, self.num_machines);
        let d = &self.durations;
        let big_m = self.big_m_value();
        let horizon: f64 = d.iter().sum();
        if big_m < horizon {
            warn!(big_m, horizon, "big-M is below the total duration and may cut off feasible schedules");
        }

        let mut model = Model::new("scheduling");
        let start = (0..nt)
            .map(|t| model.add_continuous(format!("start[{}]", t), Bounds::non_negative()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut assign: Vec<Vec<VarId>> = Vec::with_capacity(nt);
        for t in 0..nt {
            let row = (0..nm)
                .map(|m| model.add_binary(format!("assign[{},{}]", t, m)))
                .collect::<Result<Vec<_>, _>>()?;
            assign.push(row);
        }
        let makespan = model.add_continuous("makespan", Bounds::non_negative())?;

        model.set_objective(LinearExpr::new().with(1.0, makespan), ObjectiveSense::Minimize)?;

        model.add_family("one_machine", 0..nt, |&t| {
            Rule::eq(LinearExpr::sum(assign[t].iter().map(|&a| (1.0, a))), 1.0)
        })?;

        // start[t1] + d[t1]*assign[t1,m] <= start[t2] + (1 - assign[t2,m]) * M
        let triples = (0..nt).flat_map(|t1| (0..nt).flat_map(move |t2| (0..nm).map(move |m| (t1, t2, m))));
        model.add_family("no_overlap", triples, |&(t1, t2, m)| {
            if t1 == t2 {
                return Rule::Skip;
            }
            let expr = LinearExpr::new()
                .with(1.0, start[t1])
                .with(d[t1], assign[t1][m])
                .with(-1.0, start[t2])
                .with(big_m, assign[t2][m]);
            Rule::le(expr, big_m)
        })?;

        // makespan >= start[t] + sum_m d[t]*assign[t,m]
        model.add_family("makespan", 0..nt, |&t| {
            let mut expr = LinearExpr::new().with(1.0, makespan).with(-1.0, start[t]);
            for &a in &assign[t] {
                expr.add(-d[t], a);
            }
            Rule::ge(expr, 0.0)
        })?;

        debug!(
            tasks = nt,
            machines = nm,
            big_m,
            constraints = model.num_constraints(),
            "scheduling model built"
        );

        let durations = d.clone();
        Ok(Built::new(model, move |result| {
            let mut tasks = Vec::with_capacity(assign.len());
            for (t, row) in assign.iter().enumerate() {
                let machine = row
                    .iter()
                    .position(|&a| is_selected(result, a))
                    .ok_or(DecodeError::Unassigned(t))?;
                let begin = value_of(result, start[t], || format!("start[{}]", t))?;
                tasks.push(ScheduledTask {
                    task: t,
                    machine,
                    start: begin,
                    end: begin + durations[t],
                });
            }
            Ok(Schedule {
                makespan: value_of(result, makespan, || "makespan".to_string())?,
                tasks,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::Outcome;
    use optiform_solver::{BranchAndBound, SolveResult, SolveStatus};
    use proptest::prelude::*;

    fn input(durations: Vec<f64>, machines: usize) -> SchedulingInput {
        SchedulingInput {
            num_tasks: durations.len(),
            num_machines: machines,
            durations,
            big_m: BigM::Auto,
        }
    }

    fn assert_no_overlap(schedule: &Schedule) {
        for a in &schedule.tasks {
            for b in &schedule.tasks {
                if a.task != b.task && a.machine == b.machine {
                    assert!(
                        a.end <= b.start + 1e-6 || b.end <= a.start + 1e-6,
                        "tasks {} and {} overlap on machine {}",
                        a.task,
                        b.task,
                        a.machine
                    );
                }
            }
        }
    }

    #[test]
    fn test_constraint_count() {
        let built = input(vec![3.0, 2.0, 4.0], 2).build().unwrap();
        // one_machine + no_overlap (ordered distinct pairs x machines) + makespan
        assert_eq!(built.model().num_constraints(), 3 + 3 * 2 * 2 + 3);
        assert_eq!(built.model().num_variables(), 3 + 6 + 1);
    }

    #[test]
    fn test_one_task_per_machine() {
        let schedule = input(vec![3.0, 2.0, 4.0], 3)
            .build()
            .unwrap()
            .solve(&BranchAndBound::new(), None)
            .unwrap()
            .optimal()
            .expect("three tasks fit on three machines");

        assert!((schedule.makespan - 4.0).abs() < 1e-6);
        let mut machines: Vec<_> = schedule.tasks.iter().map(|t| t.machine).collect();
        machines.sort();
        assert_eq!(machines, vec![0, 1, 2]);
        assert_no_overlap(&schedule);
    }

    #[test]
    fn test_more_tasks_than_machines_is_infeasible() {
        // Both ordered pairs constrain a shared machine, so two tasks with
        // positive durations can never share one
        let outcome = input(vec![3.0, 2.0, 4.0], 2)
            .build()
            .unwrap()
            .solve(&BranchAndBound::new(), None)
            .unwrap();
        assert_eq!(outcome, Outcome::Infeasible);
    }

    #[test]
    fn test_big_m_defaults_to_total_duration() {
        assert_eq!(input(vec![3.0, 2.0, 4.0], 2).big_m_value(), 9.0);
        let fixed = SchedulingInput {
            big_m: BigM::Fixed(1e6),
            ..input(vec![1.0], 1)
        };
        assert_eq!(fixed.big_m_value(), 1e6);
    }

    #[test]
    fn test_validation() {
        let mut bad = input(vec![3.0, 2.0], 2);
        bad.num_tasks = 3;
        assert!(matches!(bad.build(), Err(BuildError::Shape(_))));
        assert!(matches!(input(vec![1.0], 0).build(), Err(BuildError::Shape(_))));
        assert!(matches!(input(vec![-1.0], 1).build(), Err(BuildError::InvalidInput(_))));
    }

    #[test]
    fn test_unassigned_task_is_a_decode_error() {
        let built = input(vec![1.0], 1).build().unwrap();
        // start, assign[0,0], makespan
        let result = SolveResult::optimal(1.0, vec![0.0, 0.0, 1.0]);
        assert_eq!(built.decode(&result), Err(DecodeError::Unassigned(0)));
        assert_eq!(
            built.decode(&SolveResult::unknown("crash")),
            Err(DecodeError::NotOptimal(SolveStatus::Unknown))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_schedules_never_overlap(durations in prop::collection::vec(0.5f64..10.0, 1..=3)) {
            let longest = durations.iter().cloned().fold(0.0, f64::max);
            let schedule = input(durations, 3)
                .build()
                .unwrap()
                .solve(&BranchAndBound::new(), None)
                .unwrap()
                .optimal()
                .unwrap();

            assert_no_overlap(&schedule);
            prop_assert!((schedule.makespan - longest).abs() < 1e-6);
        }
    }
}

use std::fmt;

use optiform_solver::{Bounds, LinearExpr, Model, ObjectiveSense};
use tracing::debug;

use super::{BuildError, Built, objective_of, value_of};
use crate::parser::MipSpec;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MipSolution {
    pub objective_value: f64,
    /// Every variable `x0, x1, ...` in index order
    pub values: Vec<NamedValue>,
}

impl fmt::Display for MipSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Objective value: {}", self.objective_value)?;
        for v in &self.values {
            writeln!(f, "  {} = {}", v.name, v.value)?;
        }
        Ok(())
    }
}

impl MipSpec {
    /// Build the model: variables `x0..`, one row per parsed constraint.
    ///
    /// Continuous and integer variables are free; zero coefficients are not
    /// added, so a row of zeros is rejected as an empty constraint.
    pub fn build(&self, sense: ObjectiveSense) -> Result<Built<MipSolution>, BuildError> {
        let mut model = Model::new("mip");
        let vars = self
            .domains
            .iter()
            .enumerate()
            .map(|(i, &domain)| model.add_variable(format!("x{}", i), domain, Bounds::FREE))
            .collect::<Result<Vec<_>, _>>()?;

        model.set_objective(nonzero_terms(&self.objective, &vars), sense)?;
        for (i, constraint) in self.constraints.iter().enumerate() {
            model.add_constraint(
                format!("c{}", i + 1),
                nonzero_terms(&constraint.coefficients, &vars),
                constraint.sense,
                constraint.rhs,
            )?;
        }

        debug!(
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            ?sense,
            "mip model built"
        );

        Ok(Built::new(model, move |result| {
            let values = vars
                .iter()
                .enumerate()
                .map(|(i, &var)| {
                    let name = format!("x{}", i);
                    let value = value_of(result, var, || name.clone())?;
                    Ok(NamedValue { name, value })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(MipSolution {
                objective_value: objective_of(result)?,
                values,
            })
        }))
    }
}

fn nonzero_terms(coefficients: &[f64], vars: &[optiform_solver::VarId]) -> LinearExpr {
    LinearExpr::sum(
        coefficients
            .iter()
            .zip(vars)
            .filter(|&(&c, _)| c != 0.0)
            .map(|(&c, &var)| (c, var)),
    )
}

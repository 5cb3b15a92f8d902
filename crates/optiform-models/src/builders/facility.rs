use std::fmt;

use optiform_solver::{LinearExpr, Model, ObjectiveSense, Rule, VarId};
use tracing::debug;

use super::{BuildError, Built, ShapeError, check_len, check_matrix, is_selected, objective_of};

/// Uncapacitated facility location: open facilities and serve every client
/// from exactly one open facility.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityInput {
    pub num_facilities: usize,
    pub num_clients: usize,
    /// Cost of opening each facility
    pub fixed_costs: Vec<f64>,
    /// `transport_costs[facility][client]`
    pub transport_costs: Vec<Vec<f64>>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAssignment {
    pub client: usize,
    pub facility: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityPlan {
    pub total_cost: f64,
    pub opened: Vec<usize>,
    /// In client order
    pub assignments: Vec<ClientAssignment>,
}

impl fmt::Display for FacilityPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total cost: {}", self.total_cost)?;
        let opened: Vec<String> = self.opened.iter().map(usize::to_string).collect();
        writeln!(f, "Open facilities: {}", opened.join(", "))?;
        for a in &self.assignments {
            writeln!(f, "  client {} <- facility {}", a.client, a.facility)?;
        }
        Ok(())
    }
}

impl FacilityInput {
    pub fn validate(&self) -> Result<(), ShapeError> {
        check_len("fixed costs (one per facility)", self.num_facilities, self.fixed_costs.len())?;
        check_matrix(
            "transport costs",
            &self.transport_costs,
            self.num_facilities,
            self.num_clients,
        )
    }

    pub fn build(&self) -> Result<Built<FacilityPlan>, BuildError> {
        self.validate()?;
        let (nf, nc) = (self.num_facilities, self.num_clients);
        let mut model = Model::new("facility_location");

        let open = (0..nf)
            .map(|f| model.add_binary(format!("open[{}]", f)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut serve: Vec<Vec<VarId>> = Vec::with_capacity(nf);
        for f in 0..nf {
            let row = (0..nc)
                .map(|c| model.add_binary(format!("serve[{},{}]", f, c)))
                .collect::<Result<Vec<_>, _>>()?;
            serve.push(row);
        }

        let mut cost = LinearExpr::sum(self.fixed_costs.iter().zip(&open).map(|(&k, &var)| (k, var)));
        for (f, row) in serve.iter().enumerate() {
            for (c, &var) in row.iter().enumerate() {
                cost.add(self.transport_costs[f][c], var);
            }
        }
        model.set_objective(cost, ObjectiveSense::Minimize)?;

        model.add_family("client", 0..nc, |&c| {
            Rule::eq(LinearExpr::sum((0..nf).map(|f| (1.0, serve[f][c]))), 1.0)
        })?;
        let pairs = (0..nf).flat_map(|f| (0..nc).map(move |c| (f, c)));
        model.add_family("open_link", pairs, |&(f, c)| {
            Rule::le(LinearExpr::new().with(1.0, serve[f][c]).with(-1.0, open[f]), 0.0)
        })?;

        debug!(
            facilities = nf,
            clients = nc,
            constraints = model.num_constraints(),
            "facility location model built"
        );

        Ok(Built::new(model, move |result| {
            let opened = open
                .iter()
                .enumerate()
                .filter(|&(_, &var)| is_selected(result, var))
                .map(|(f, _)| f)
                .collect();
            let mut assignments = Vec::new();
            for c in 0..nc {
                for (f, row) in serve.iter().enumerate() {
                    if is_selected(result, row[c]) {
                        assignments.push(ClientAssignment { client: c, facility: f });
                    }
                }
            }
            Ok(FacilityPlan {
                total_cost: objective_of(result)?,
                opened,
                assignments,
            })
        }))
    }
}

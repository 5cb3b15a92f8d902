use std::fmt;

use optiform_solver::{Bounds, LinearExpr, Model, ObjectiveSense, Rule, VarId};
use tracing::debug;

use super::{BuildError, Built, ShapeError, check_len, check_matrix, is_selected, objective_of};

/// Vehicle routing from a single depot (node 0) to customers `1..=num_customers`.
///
/// Vehicle capacity is carried through to the result but the model does not
/// bound loads by it, and there is no subtour elimination.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingInput {
    pub num_customers: usize,
    pub num_vehicles: usize,
    pub capacity: f64,
    /// `demands[c - 1]` is the demand of customer `c`
    pub demands: Vec<f64>,
    /// `costs[i][j]` over all nodes, depot included
    pub costs: Vec<Vec<f64>>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRoute {
    pub vehicle: usize,
    /// Arcs `(from, to)` the vehicle drives, ordered by `from` then `to`
    pub arcs: Vec<(usize, usize)>,
    /// Nodes visited following the arcs out of the depot
    pub tour: Vec<usize>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingPlan {
    pub total_cost: f64,
    pub capacity: f64,
    /// Only vehicles that drive at least one arc
    pub routes: Vec<VehicleRoute>,
}

impl fmt::Display for RoutingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total cost: {}", self.total_cost)?;
        for route in &self.routes {
            let stops: Vec<String> = route.tour.iter().map(usize::to_string).collect();
            writeln!(f, "  vehicle {}: {}", route.vehicle, stops.join(" -> "))?;
        }
        Ok(())
    }
}

/// Arc variables indexed `[from][to][vehicle]`; self-arcs are never declared
type ArcVars = Vec<Vec<Vec<Option<VarId>>>>;

impl RoutingInput {
    pub fn num_nodes(&self) -> usize {
        self.num_customers + 1
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.num_customers == 0 {
            return Err(ShapeError::new("customers", "at least 1", 0));
        }
        if self.num_vehicles == 0 {
            return Err(ShapeError::new("vehicles", "at least 1", 0));
        }
        check_len("demands (one per customer)", self.num_customers, self.demands.len())?;
        check_matrix("costs", &self.costs, self.num_nodes(), self.num_nodes())
    }

    pub fn build(&self) -> Result<Built<RoutingPlan>, BuildError> {
        self.validate()?;
        let n = self.num_nodes();
        let nv = self.num_vehicles;
        let mut model = Model::new("vehicle_routing");

        let mut x: ArcVars = vec![vec![vec![None; nv]; n]; n];
        for i in 0..n {
            for j in (0..n).filter(|&j| j != i) {
                for k in 0..nv {
                    x[i][j][k] = Some(model.add_binary(format!("x[{},{},{}]", i, j, k))?);
                }
            }
        }
        let load = (0..n)
            .map(|i| model.add_continuous(format!("load[{}]", i), Bounds::non_negative()))
            .collect::<Result<Vec<_>, _>>()?;

        let arc = |i: usize, j: usize, k: usize| x[i][j][k];
        let mut cost = LinearExpr::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..nv {
                    if let Some(var) = arc(i, j, k) {
                        cost.add(self.costs[i][j], var);
                    }
                }
            }
        }
        model.set_objective(cost, ObjectiveSense::Minimize)?;

        model.add_family("visit", 1..n, |&j| {
            let incoming = (0..n).flat_map(|i| (0..nv).filter_map(move |k| arc(i, j, k)));
            Rule::eq(LinearExpr::sum(incoming.map(|var| (1.0, var))), 1.0)
        })?;

        let node_vehicle = (0..n).flat_map(|i| (0..nv).map(move |k| (i, k)));
        model.add_family("flow", node_vehicle, |&(i, k)| {
            if i == 0 {
                let leaving = (1..n).filter_map(|j| arc(0, j, k));
                return Rule::eq(LinearExpr::sum(leaving.map(|var| (1.0, var))), 1.0);
            }
            let mut expr = LinearExpr::new();
            for j in 0..n {
                if let Some(out) = arc(i, j, k) {
                    expr.add(1.0, out);
                }
                if let Some(inc) = arc(j, i, k) {
                    expr.add(-1.0, inc);
                }
            }
            Rule::eq(expr, 0.0)
        })?;

        let node_vehicle = (0..n).flat_map(|j| (0..nv).map(move |k| (j, k)));
        model.add_family("demand", node_vehicle, |&(j, _)| {
            if j == 0 {
                return Rule::Skip;
            }
            Rule::ge(LinearExpr::new().with(1.0, load[j]), self.demands[j - 1])
        })?;

        debug!(
            customers = self.num_customers,
            vehicles = nv,
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            "routing model built"
        );

        let capacity = self.capacity;
        Ok(Built::new(model, move |result| {
            let mut routes = Vec::new();
            for k in 0..nv {
                let mut arcs = Vec::new();
                for (i, row) in x.iter().enumerate() {
                    for (j, vars) in row.iter().enumerate() {
                        if vars[k].is_some_and(|var| is_selected(result, var)) {
                            arcs.push((i, j));
                        }
                    }
                }
                if arcs.is_empty() {
                    continue;
                }
                let tour = follow_tour(&arcs);
                routes.push(VehicleRoute { vehicle: k, arcs, tour });
            }
            Ok(RoutingPlan {
                total_cost: objective_of(result)?,
                capacity,
                routes,
            })
        }))
    }
}

/// Walk from the depot along `arcs` until the depot is reached again or no
/// unused arc leaves the current node.
fn follow_tour(arcs: &[(usize, usize)]) -> Vec<usize> {
    let mut used = vec![false; arcs.len()];
    let mut tour = vec![0];
    let mut at = 0;
    while let Some(next) = (0..arcs.len()).find(|&idx| arcs[idx].0 == at && !used[idx]) {
        used[next] = true;
        at = arcs[next].1;
        tour.push(at);
        if at == 0 {
            break;
        }
    }
    tour
}

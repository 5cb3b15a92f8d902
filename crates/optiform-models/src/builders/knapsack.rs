use std::fmt;

use optiform_solver::{LinearExpr, Model, ObjectiveSense, Sense};
use tracing::debug;

use super::{BuildError, Built, ShapeError, check_len, is_selected, objective_of};

/// 0/1 knapsack: pick items maximizing value without exceeding capacity
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackInput {
    pub capacity: f64,
    pub values: Vec<f64>,
    pub weights: Vec<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedItem {
    pub item: usize,
    pub value: f64,
    pub weight: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackSelection {
    pub total_value: f64,
    pub total_weight: f64,
    pub items: Vec<SelectedItem>,
}

impl fmt::Display for KnapsackSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total value: {}", self.total_value)?;
        writeln!(f, "Total weight: {}", self.total_weight)?;
        for item in &self.items {
            writeln!(f, "  item {} (value {}, weight {})", item.item, item.value, item.weight)?;
        }
        Ok(())
    }
}

impl KnapsackInput {
    pub fn validate(&self) -> Result<(), ShapeError> {
        check_len("weights (one per value)", self.values.len(), self.weights.len())
    }

    pub fn build(&self) -> Result<Built<KnapsackSelection>, BuildError> {
        self.validate()?;
        let mut model = Model::new("knapsack");

        let x = (0..self.values.len())
            .map(|i| model.add_binary(format!("x[{}]", i)))
            .collect::<Result<Vec<_>, _>>()?;

        model.set_objective(
            LinearExpr::sum(self.values.iter().zip(&x).map(|(&v, &var)| (v, var))),
            ObjectiveSense::Maximize,
        )?;
        if !x.is_empty() {
            model.add_constraint(
                "capacity",
                LinearExpr::sum(self.weights.iter().zip(&x).map(|(&w, &var)| (w, var))),
                Sense::Le,
                self.capacity,
            )?;
        }

        debug!(items = x.len(), capacity = self.capacity, "knapsack model built");

        let values = self.values.clone();
        let weights = self.weights.clone();
        Ok(Built::new(model, move |result| {
            let items: Vec<SelectedItem> = x
                .iter()
                .enumerate()
                .filter(|&(_, &var)| is_selected(result, var))
                .map(|(item, _)| SelectedItem {
                    item,
                    value: values[item],
                    weight: weights[item],
                })
                .collect();
            Ok(KnapsackSelection {
                total_value: objective_of(result)?,
                total_weight: items.iter().map(|i| i.weight).sum(),
                items,
            })
        }))
    }
}

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid domain for variable {name}: {reason}")]
    Domain { name: String, reason: String },
    #[error("{owner} references variable #{index}, which is not declared in this model")]
    UnknownVariable { owner: String, index: usize },
    #[error("Constraint {0} has no variables")]
    EmptyConstraint(String),
}

/// Handle to a variable declared in a [`Model`]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    /// Declaration index of the variable
    pub fn index(self) -> usize {
        self.0
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Domain {
    #[default]
    Continuous,
    Integer,
    Binary,
}

impl Domain {
    /// Parse one of the textual tags `continuous`, `integer`, `binary`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "continuous" => Some(Domain::Continuous),
            "integer" => Some(Domain::Integer),
            "binary" => Some(Domain::Binary),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Domain::Continuous => "continuous",
            Domain::Integer => "integer",
            Domain::Binary => "binary",
        }
    }

    /// Whether values of this domain must be integral
    pub fn is_integral(self) -> bool {
        matches!(self, Domain::Integer | Domain::Binary)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Optional lower/upper bounds of a variable. `None` means unbounded on that side.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    pub const FREE: Bounds = Bounds {
        lower: None,
        upper: None,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    pub fn non_negative() -> Self {
        Self {
            lower: Some(0.0),
            upper: None,
        }
    }

    pub fn at_least(lower: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
        }
    }

    pub fn at_most(upper: f64) -> Self {
        Self {
            lower: None,
            upper: Some(upper),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
    pub bounds: Bounds,
}

/// A linear combination of variables plus a constant.
///
/// Each variable appears at most once; adding a term for a variable that is
/// already present sums the coefficients.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearExpr {
    terms: BTreeMap<VarId, f64>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant_only(constant: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant,
        }
    }

    /// Build an expression from `(coefficient, variable)` pairs
    pub fn sum(terms: impl IntoIterator<Item = (f64, VarId)>) -> Self {
        let mut expr = Self::new();
        for (coefficient, var) in terms {
            expr.add(coefficient, var);
        }
        expr
    }

    pub fn add(&mut self, coefficient: f64, var: VarId) -> &mut Self {
        *self.terms.entry(var).or_insert(0.0) += coefficient;
        self
    }

    /// Chaining form of [`LinearExpr::add`]
    pub fn with(mut self, coefficient: f64, var: VarId) -> Self {
        self.add(coefficient, var);
        self
    }

    pub fn add_constant(&mut self, value: f64) -> &mut Self {
        self.constant += value;
        self
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    /// Terms in declaration order of their variables
    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(&var, &coefficient)| (var, coefficient))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression when variable `i` takes `values[i]`
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coefficient)| coefficient * values.get(var.0).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (==)
    Eq,
}

impl Sense {
    /// Parse one of `<=`, `>=`, `==` (exact match)
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<=" => Some(Sense::Le),
            ">=" => Some(Sense::Ge),
            "==" => Some(Sense::Eq),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "==",
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    /// Check the constraint against a full value vector
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Result of a constraint-generating rule: either a constraint or nothing
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Constrain(LinearExpr, Sense, f64),
    Skip,
}

impl Rule {
    pub fn le(expr: LinearExpr, rhs: f64) -> Self {
        Rule::Constrain(expr, Sense::Le, rhs)
    }

    pub fn ge(expr: LinearExpr, rhs: f64) -> Self {
        Rule::Constrain(expr, Sense::Ge, rhs)
    }

    pub fn eq(expr: LinearExpr, rhs: f64) -> Self {
        Rule::Constrain(expr, Sense::Eq, rhs)
    }
}

/// Index of a constraint family member, rendered into the constraint name
pub trait IndexLabel {
    fn label(&self) -> String;
}

impl IndexLabel for usize {
    fn label(&self) -> String {
        self.to_string()
    }
}

impl IndexLabel for (usize, usize) {
    fn label(&self) -> String {
        format!("{},{}", self.0, self.1)
    }
}

impl IndexLabel for (usize, usize, usize) {
    fn label(&self) -> String {
        format!("{},{},{}", self.0, self.1, self.2)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Objective {
    pub expr: LinearExpr,
    pub sense: ObjectiveSense,
}

/// A mixed-integer linear model: variables, constraints and one objective
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Objective,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a variable. Binary variables default to bounds `[0, 1]` and
    /// may only be narrowed within that range.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        domain: Domain,
        bounds: Bounds,
    ) -> Result<VarId, ModelError> {
        let name = name.into();
        let bounds = check_bounds(&name, domain, bounds)?;
        self.variables.push(Variable { name, domain, bounds });
        Ok(VarId(self.variables.len() - 1))
    }

    pub fn add_binary(&mut self, name: impl Into<String>) -> Result<VarId, ModelError> {
        self.add_variable(name, Domain::Binary, Bounds::FREE)
    }

    pub fn add_continuous(&mut self, name: impl Into<String>, bounds: Bounds) -> Result<VarId, ModelError> {
        self.add_variable(name, Domain::Continuous, bounds)
    }

    pub fn add_integer(&mut self, name: impl Into<String>, bounds: Bounds) -> Result<VarId, ModelError> {
        self.add_variable(name, Domain::Integer, bounds)
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        expr: LinearExpr,
        sense: Sense,
        rhs: f64,
    ) -> Result<(), ModelError> {
        let name = name.into();
        if expr.is_empty() {
            return Err(ModelError::EmptyConstraint(name));
        }
        self.check_references(&name, &expr)?;
        self.constraints.push(Constraint { name, expr, sense, rhs });
        Ok(())
    }

    /// Add the constraint produced by `rule`, unless it is [`Rule::Skip`].
    /// Returns whether a constraint was added.
    pub fn add_rule(&mut self, name: impl Into<String>, rule: Rule) -> Result<bool, ModelError> {
        match rule {
            Rule::Constrain(expr, sense, rhs) => {
                self.add_constraint(name, expr, sense, rhs)?;
                Ok(true)
            }
            Rule::Skip => Ok(false),
        }
    }

    /// Generate one constraint per index, named `prefix[index]`.
    /// Returns the number of constraints actually added.
    pub fn add_family<I, F>(&mut self, prefix: &str, indices: I, mut rule: F) -> Result<usize, ModelError>
    where
        I: IntoIterator,
        I::Item: IndexLabel,
        F: FnMut(&I::Item) -> Rule,
    {
        let mut added = 0;
        for index in indices {
            let generated = rule(&index);
            if self.add_rule(format!("{}[{}]", prefix, index.label()), generated)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn set_objective(&mut self, expr: LinearExpr, sense: ObjectiveSense) -> Result<(), ModelError> {
        self.check_references("objective", &expr)?;
        self.objective = Objective { expr, sense };
        Ok(())
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn variable(&self, var: VarId) -> Option<&Variable> {
        self.variables.get(var.0)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        (0..self.variables.len()).map(VarId)
    }

    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.variables.iter().position(|v| v.name == name).map(VarId)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_integral_variables(&self) -> bool {
        self.variables.iter().any(|v| v.domain.is_integral())
    }

    fn check_references(&self, owner: &str, expr: &LinearExpr) -> Result<(), ModelError> {
        match expr.terms().find(|(var, _)| var.0 >= self.variables.len()) {
            Some((var, _)) => Err(ModelError::UnknownVariable {
                owner: owner.to_string(),
                index: var.0,
            }),
            None => Ok(()),
        }
    }
}

fn check_bounds(name: &str, domain: Domain, bounds: Bounds) -> Result<Bounds, ModelError> {
    let invalid = |reason: String| ModelError::Domain {
        name: name.to_string(),
        reason,
    };

    if bounds.lower.is_some_and(f64::is_nan) || bounds.upper.is_some_and(f64::is_nan) {
        return Err(invalid("bound is NaN".to_string()));
    }

    let bounds = if domain == Domain::Binary {
        let lower = bounds.lower.unwrap_or(0.0);
        let upper = bounds.upper.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) {
            return Err(invalid(format!(
                "binary variable bounds [{}, {}] fall outside {{0, 1}}",
                lower, upper
            )));
        }
        if lower.ceil() > upper.floor() {
            return Err(invalid(format!(
                "binary variable bounds [{}, {}] admit neither 0 nor 1",
                lower, upper
            )));
        }
        Bounds::new(lower, upper)
    } else {
        bounds
    };

    if let (Some(lower), Some(upper)) = (bounds.lower, bounds.upper) {
        if lower > upper {
            return Err(invalid(format!("lower bound {} exceeds upper bound {}", lower, upper)));
        }
    }

    Ok(bounds)
}

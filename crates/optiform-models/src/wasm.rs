//! WASM bindings
//!
//! JavaScript-friendly entry points for parsing and solving from a browser.
//! Inputs and results cross the boundary as plain JS objects.

use wasm_bindgen::prelude::*;

use optiform_solver::{BranchAndBound, ObjectiveSense};

use crate::builders::{Built, Outcome};
use crate::parser::{MipSpec, ParseError};
use crate::{AssignmentInput, FacilityInput, KnapsackInput, RoutingInput, SchedulingInput};

fn to_js(err: impl ToString) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn solve_built<T: serde::Serialize>(built: Built<T>) -> Result<JsValue, JsValue> {
    let outcome: Outcome<T> = built.solve(&BranchAndBound::new(), None).map_err(to_js)?;
    serde_wasm_bindgen::to_value(&outcome).map_err(to_js)
}

/// Parse the three MIP texts and return the parsed program as JSON
#[wasm_bindgen]
pub fn parse_mip(objective: &str, constraints: &str, types: &str) -> Result<JsValue, JsValue> {
    let spec = MipSpec::parse(objective, constraints, types).map_err(to_js)?;
    serde_wasm_bindgen::to_value(&spec).map_err(to_js)
}

/// Validate the MIP texts and return diagnostics (empty when valid)
#[wasm_bindgen]
pub fn validate_mip(objective: &str, constraints: &str, types: &str) -> JsValue {
    let diagnostics: Vec<Diagnostic> = match MipSpec::parse(objective, constraints, types) {
        Ok(_) => Vec::new(),
        Err(err) => vec![Diagnostic::from(&err)],
    };
    serde_wasm_bindgen::to_value(&diagnostics).unwrap_or(JsValue::NULL)
}

#[derive(serde::Serialize)]
struct Diagnostic {
    message: String,
    /// 1-based constraint line, when the error is tied to one
    line: Option<usize>,
}

impl From<&ParseError> for Diagnostic {
    fn from(err: &ParseError) -> Self {
        let line = match err {
            ParseError::FieldCount { line, .. }
            | ParseError::UnknownSense { line, .. }
            | ParseError::TooManyCoefficients { line, .. } => Some(*line),
            ParseError::InvalidNumber {
                location: crate::parser::Location::Constraint(line),
                ..
            } => Some(*line),
            _ => None,
        };
        Diagnostic {
            message: err.to_string(),
            line,
        }
    }
}

/// Parse, build and solve a generic MIP
#[wasm_bindgen]
pub fn solve_mip(objective: &str, constraints: &str, types: &str, maximize: bool) -> Result<JsValue, JsValue> {
    let spec = MipSpec::parse(objective, constraints, types).map_err(to_js)?;
    let sense = if maximize {
        ObjectiveSense::Maximize
    } else {
        ObjectiveSense::Minimize
    };
    solve_built(spec.build(sense).map_err(to_js)?)
}

/// Solve one of the problem families from its JSON input.
///
/// `kind` is one of `assignment`, `knapsack`, `facility`, `scheduling`,
/// `routing`.
#[wasm_bindgen]
pub fn solve_problem(kind: &str, input: JsValue) -> Result<JsValue, JsValue> {
    match kind {
        "assignment" => {
            let input: AssignmentInput = serde_wasm_bindgen::from_value(input).map_err(to_js)?;
            solve_built(input.build().map_err(to_js)?)
        }
        "knapsack" => {
            let input: KnapsackInput = serde_wasm_bindgen::from_value(input).map_err(to_js)?;
            solve_built(input.build().map_err(to_js)?)
        }
        "facility" => {
            let input: FacilityInput = serde_wasm_bindgen::from_value(input).map_err(to_js)?;
            solve_built(input.build().map_err(to_js)?)
        }
        "scheduling" => {
            let input: SchedulingInput = serde_wasm_bindgen::from_value(input).map_err(to_js)?;
            solve_built(input.build().map_err(to_js)?)
        }
        "routing" => {
            let input: RoutingInput = serde_wasm_bindgen::from_value(input).map_err(to_js)?;
            solve_built(input.build().map_err(to_js)?)
        }
        other => Err(JsValue::from_str(&format!("Unknown problem kind: {}", other))),
    }
}

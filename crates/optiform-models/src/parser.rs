//! Parser for the three-part textual description of a generic MIP.
//!
//! - objective: whitespace separated coefficients, one per variable
//! - constraints: one `coefficients,sense,rhs` line each, sense one of
//!   `<=`, `>=`, `==`; blank lines are ignored
//! - domains: whitespace separated `continuous`/`integer`/`binary` tags,
//!   missing tags default to `continuous`

use std::fmt;

use optiform_solver::{Domain, Sense};
use thiserror::Error;
use tracing::warn;

/// Which part of the input a number came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Objective,
    /// 1-based line of the constraints text
    Constraint(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Objective => f.write_str("objective"),
            Location::Constraint(line) => write!(f, "constraint line {}", line),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Objective has no coefficients")]
    EmptyObjective,
    #[error("Invalid number '{token}' in {location}: {text}")]
    InvalidNumber {
        location: Location,
        token: String,
        text: String,
    },
    #[error("Line {line}: expected 3 comma separated fields, found {found}: {text}")]
    FieldCount { line: usize, found: usize, text: String },
    #[error("Line {line}: unknown sense '{token}' (expected <=, >= or ==): {text}")]
    UnknownSense { line: usize, token: String, text: String },
    #[error("Line {line}: {found} coefficients but only {expected} variables: {text}")]
    TooManyCoefficients {
        line: usize,
        expected: usize,
        found: usize,
        text: String,
    },
    #[error("Unknown variable type '{tag}' at position {position}")]
    UnknownDomain { position: usize, tag: String },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConstraint {
    /// One coefficient per variable, zero padded
    pub coefficients: Vec<f64>,
    pub sense: Sense,
    pub rhs: f64,
}

/// A fully parsed generic MIP
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MipSpec {
    pub objective: Vec<f64>,
    pub constraints: Vec<ParsedConstraint>,
    /// One domain per variable
    pub domains: Vec<Domain>,
}

impl MipSpec {
    pub fn parse(objective: &str, constraints: &str, domains: &str) -> Result<Self, ParseError> {
        let objective = parse_numbers(objective, Location::Objective, objective)?;
        if objective.is_empty() {
            return Err(ParseError::EmptyObjective);
        }
        let n = objective.len();

        let constraints = constraints
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| parse_constraint(i + 1, line, n))
            .collect::<Result<Vec<_>, _>>()?;

        let tags: Vec<&str> = domains.split_whitespace().collect();
        if tags.len() > n {
            warn!(
                variables = n,
                tags = tags.len(),
                "ignoring variable types beyond the objective length"
            );
        }
        let mut parsed = Vec::with_capacity(n);
        for (position, tag) in tags.iter().enumerate() {
            let domain = Domain::from_tag(tag).ok_or_else(|| ParseError::UnknownDomain {
                position,
                tag: tag.to_string(),
            })?;
            if position < n {
                parsed.push(domain);
            }
        }
        parsed.resize(n, Domain::Continuous);

        Ok(MipSpec {
            objective,
            constraints,
            domains: parsed,
        })
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    /// Serialize back to the `(objective, constraints, domains)` texts
    pub fn to_text(&self) -> (String, String, String) {
        let objective = join(&self.objective);
        let constraints = self
            .constraints
            .iter()
            .map(|c| format!("{},{},{}", join(&c.coefficients), c.sense, c.rhs))
            .collect::<Vec<_>>()
            .join("\n");
        let domains = self
            .domains
            .iter()
            .map(|d| d.tag())
            .collect::<Vec<_>>()
            .join(" ");
        (objective, constraints, domains)
    }
}

fn join(values: &[f64]) -> String {
    values.iter().map(f64::to_string).collect::<Vec<_>>().join(" ")
}

fn parse_number(token: &str, location: Location, text: &str) -> Result<f64, ParseError> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidNumber {
            location,
            token: token.to_string(),
            text: text.to_string(),
        }),
    }
}

fn parse_numbers(field: &str, location: Location, text: &str) -> Result<Vec<f64>, ParseError> {
    field
        .split_whitespace()
        .map(|token| parse_number(token, location, text))
        .collect()
}

fn parse_constraint(line: usize, text: &str, num_variables: usize) -> Result<ParsedConstraint, ParseError> {
    let fields: Vec<&str> = text.split(',').collect();
    let [lhs, sense, rhs] = fields[..] else {
        return Err(ParseError::FieldCount {
            line,
            found: fields.len(),
            text: text.to_string(),
        });
    };

    let location = Location::Constraint(line);
    let mut coefficients = parse_numbers(lhs, location, text)?;
    if coefficients.len() > num_variables {
        return Err(ParseError::TooManyCoefficients {
            line,
            expected: num_variables,
            found: coefficients.len(),
            text: text.to_string(),
        });
    }
    coefficients.resize(num_variables, 0.0);

    let token = sense.trim();
    let sense = Sense::from_token(token).ok_or_else(|| ParseError::UnknownSense {
        line,
        token: token.to_string(),
        text: text.to_string(),
    })?;
    let rhs = parse_number(rhs.trim(), location, text)?;

    Ok(ParsedConstraint { coefficients, sense, rhs })
}

//! Builders for classic optimization models, the textual MIP format and the
//! decoders that turn solver output back into plans.

pub mod builders;
pub mod parser;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use builders::assignment::{AssignmentInput, AssignmentPlan};
pub use builders::facility::{ClientAssignment, FacilityInput, FacilityPlan};
pub use builders::generic::{MipSolution, NamedValue};
pub use builders::knapsack::{KnapsackInput, KnapsackSelection, SelectedItem};
pub use builders::routing::{RoutingInput, RoutingPlan, VehicleRoute};
pub use builders::scheduling::{BigM, Schedule, ScheduledTask, SchedulingInput};
pub use builders::{BuildError, Built, DecodeError, Outcome, ShapeError};
pub use parser::{Location, MipSpec, ParseError, ParsedConstraint};

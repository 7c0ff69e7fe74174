//! Error types for GatiPlan

use thiserror::Error;

/// GatiPlan error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// A planner parameter lies outside its valid range.
    #[error("planner parameter `{name}` = {value} is outside the range {range}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
        /// Human-readable description of the accepted range.
        range: &'static str,
    },

    /// Seeding left the grid empty: no start state produced a cell.
    #[error("there are no valid initial states")]
    NoValidInitialStates,

    /// The termination condition fired before any motion approached the
    /// goal, so neither an exact nor an approximate solution exists.
    #[error("no solution found before termination")]
    NoSolutionFound,
}

/// GatiPlan result type
pub type Result<T> = std::result::Result<T, PlannerError>;

//! # GatiPlan
//!
//! Kinodynamic motion planning by interior-exterior cell exploration.
//!
//! ## Overview
//!
//! GatiPlan grows a tree of state-control motions for a dynamical system
//! whose state evolves under sampled control inputs. The tree is organized
//! inside a discretization grid over a low-dimensional projection of the
//! state space; grid cells carry importance scores that bias expansion
//! toward under-explored and recently productive regions.
//!
//! ## Features
//!
//! - **Projection grid**: cells partitioned into interior and exterior
//!   (border) sets, each with its own priority structure over mutable
//!   importance scores
//! - **Motion splitting**: propagated trajectories are cut along cell
//!   boundaries so no single motion crosses cells
//! - **Goal-biased close samples**: a bounded best-first set of motions
//!   near the goal, consulted probabilistically during selection
//! - **Approximate solutions**: when the termination condition fires
//!   first, the best-known motion chain is returned with a flag
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gati_plan::{Kpiece, KpieceConfig};
//!
//! // `space`, `projection` and `goal` implement the collaborator traits
//! // in `gati_plan::space` for your system.
//! let mut planner = Kpiece::new(space, projection, KpieceConfig::default())?;
//!
//! let mut remaining = 10_000u32;
//! let path = planner.solve(&[start], &goal, || {
//!     remaining -= 1;
//!     remaining == 0
//! })?;
//!
//! println!(
//!     "{} states, approximate: {}",
//!     path.states.len(),
//!     path.approximate
//! );
//! ```
//!
//! ## Scope
//!
//! The planner is single-threaded cooperative: one `solve` call owns its
//! tree exclusively and polls the termination condition once per
//! iteration. State validity, propagation, projection, goal testing and
//! control sampling are consumed through the narrow traits in [`space`];
//! the crate does not prescribe a state representation.

#![warn(missing_docs)]

// Configuration and errors
pub mod config;
pub mod error;

// Collaborator traits and the random source seam
pub mod rng;
pub mod space;

// Motion arena (leaf data structure)
pub mod motion;

// Projection grid with scored cell partitions
pub mod grid;

// The planner itself
pub mod planner;

pub use config::KpieceConfig;
pub use error::{PlannerError, Result};
pub use grid::{Cell, CellData, CellId, Coord, ProjectionGrid};
pub use motion::{Motion, MotionId};
pub use planner::{Kpiece, PlannedPath, PlannerDataEdge};
pub use rng::{PlannerRng, StdPlannerRng};
pub use space::{ControlSampler, ControlSpace, Goal, ProjectionEvaluator, StateSpace};

//! Collaborator traits consumed by the planner.
//!
//! The planner never inspects states or controls directly: everything it
//! needs from the system under planning comes through these seams.
//! Implementations provide the state/control representations, validity
//! checking (folded into [`ControlSpace::propagate_while_valid`]),
//! projection to grid coordinates, and the goal test.

use crate::grid::Coord;

/// A space of states with value-semantic handles.
///
/// `Clone` on the associated state type covers the copy and clone
/// duties; dropping a state releases it. `alloc_state` exists so the
/// planner can preallocate propagation scratch buffers before any
/// meaningful state is available.
pub trait StateSpace {
    /// The state representation.
    type State: Clone;

    /// Produce a fresh (arbitrary-valued) state.
    fn alloc_state(&self) -> Self::State;
}

/// A state space extended with controls and propagation.
pub trait ControlSpace: StateSpace {
    /// The control representation.
    type Control: Clone;

    /// The sampler type produced by [`ControlSpace::alloc_control_sampler`].
    type Sampler: ControlSampler<State = Self::State, Control = Self::Control>;

    /// Produce a fresh (arbitrary-valued) control.
    fn alloc_control(&self) -> Self::Control;

    /// Overwrite `control` with the null control (no actuation).
    fn null_control(&self, control: &mut Self::Control);

    /// Allocate a control sampler for this space.
    fn alloc_control_sampler(&self) -> Self::Sampler;

    /// Minimum number of propagation steps a sampled control may be
    /// applied for.
    fn min_control_duration(&self) -> u32;

    /// Maximum number of propagation steps a sampled control may be
    /// applied for.
    fn max_control_duration(&self) -> u32;

    /// Duration of one propagation step, in seconds.
    fn propagation_step_size(&self) -> f64;

    /// Apply `control` from `start` for up to `steps` steps, stopping
    /// before the first invalid intermediate state.
    ///
    /// On return `r`, `out[i]` holds the state reached after `i + 1`
    /// steps for every `i < r`. `r` is at most `min(steps, out.len())`;
    /// a short count signals that validity was lost, and is normal
    /// rather than an error.
    fn propagate_while_valid(
        &self,
        start: &Self::State,
        control: &Self::Control,
        steps: u32,
        out: &mut [Self::State],
    ) -> u32;
}

/// Samples controls and application durations.
pub trait ControlSampler {
    /// The state representation of the associated space.
    type State;
    /// The control representation of the associated space.
    type Control;

    /// Sample a control into `out`, given the control and state the
    /// expansion starts from.
    fn sample_next(&mut self, out: &mut Self::Control, previous: &Self::Control, state: &Self::State);

    /// Sample a step count in `[min_steps, max_steps]`.
    fn sample_step_count(&mut self, min_steps: u32, max_steps: u32) -> u32;
}

/// Maps states to integer grid coordinates in a low-dimensional
/// projection of the state space.
pub trait ProjectionEvaluator {
    /// The state representation being projected.
    type State;

    /// Dimension of the projection (length of produced coordinates).
    fn dimension(&self) -> usize;

    /// Write the projection of `state` into `out`.
    ///
    /// Implementations must leave `out` holding exactly
    /// [`ProjectionEvaluator::dimension`] values.
    fn compute_coordinates(&self, state: &Self::State, out: &mut Coord);
}

/// A goal region with a distance measure.
pub trait Goal {
    /// The state representation being tested.
    type State;

    /// Test `state` for goal satisfaction.
    ///
    /// Returns `(satisfied, distance)`; the distance to the goal is
    /// produced on every call, satisfied or not.
    fn is_satisfied(&self, state: &Self::State) -> (bool, f64);
}

//! Solution paths and tree export records.

/// A sequence of states connected by timed controls, as produced by
/// [`Kpiece::solve`](super::Kpiece::solve).
///
/// `states` always has one more entry than `controls` and `durations`:
/// the root state carries no control. Applying `controls[i]` from
/// `states[i]` for `durations[i]` seconds reaches `states[i + 1]`
/// within the propagator's tolerance.
#[derive(Debug, Clone)]
pub struct PlannedPath<S, C> {
    /// States along the path, root first.
    pub states: Vec<S>,
    /// Control applied out of each non-final state.
    pub controls: Vec<C>,
    /// Application time of each control, in seconds.
    pub durations: Vec<f64>,
    /// Whether the final state only approaches the goal rather than
    /// satisfying it.
    pub approximate: bool,
    /// Goal distance of the final state.
    pub goal_distance: f64,
}

impl<S, C> PlannedPath<S, C> {
    /// Number of states along the path.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the path holds no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Total duration of the path, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.durations.iter().sum()
    }
}

/// One edge of the exported search tree
/// (see [`Kpiece::planner_data`](super::Kpiece::planner_data)).
#[derive(Debug, Clone)]
pub struct PlannerDataEdge<'a, S, C> {
    /// State of the parent motion; `None` for tree roots.
    pub source: Option<&'a S>,
    /// State of the motion itself.
    pub target: &'a S,
    /// Control that produced `target`; `None` for tree roots.
    pub control: Option<&'a C>,
    /// Application time of the control, in seconds. Zero for roots.
    pub duration: f64,
    /// `2` when the motion's cell is a border cell, `1` otherwise.
    pub tag: u8,
}

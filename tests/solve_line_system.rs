//! End-to-end planner tests on a deterministic 1-D line system.
//!
//! The state is a position on a line, a control is a velocity, and one
//! propagation step advances the position by `velocity * step_size`.
//! Every random source is seeded, so runs are reproducible.

use approx::assert_relative_eq;

use gati_plan::{
    ControlSampler, ControlSpace, Coord, Goal, Kpiece, KpieceConfig, PlannerError,
    ProjectionEvaluator, StateSpace, StdPlannerRng,
};

const STEP_SIZE: f64 = 0.1;
const CELL_WIDTH: f64 = 0.25;

struct LineSpace {
    bound: f64,
    min_duration: u32,
    max_duration: u32,
    sampler_seed: u64,
}

impl LineSpace {
    fn new(bound: f64, sampler_seed: u64) -> Self {
        Self {
            bound,
            min_duration: 1,
            max_duration: 10,
            sampler_seed,
        }
    }
}

impl StateSpace for LineSpace {
    type State = f64;

    fn alloc_state(&self) -> f64 {
        0.0
    }
}

impl ControlSpace for LineSpace {
    type Control = f64;
    type Sampler = LcgSampler;

    fn alloc_control(&self) -> f64 {
        0.0
    }

    fn null_control(&self, control: &mut f64) {
        *control = 0.0;
    }

    fn alloc_control_sampler(&self) -> LcgSampler {
        LcgSampler {
            state: self.sampler_seed,
        }
    }

    fn min_control_duration(&self) -> u32 {
        self.min_duration
    }

    fn max_control_duration(&self) -> u32 {
        self.max_duration
    }

    fn propagation_step_size(&self) -> f64 {
        STEP_SIZE
    }

    fn propagate_while_valid(
        &self,
        start: &f64,
        control: &f64,
        steps: u32,
        out: &mut [f64],
    ) -> u32 {
        let mut x = *start;
        let limit = steps.min(out.len() as u32);
        for i in 0..limit {
            x += control * STEP_SIZE;
            if x.abs() > self.bound {
                return i;
            }
            out[i as usize] = x;
        }
        limit
    }
}

/// LCG-based control sampler for deterministic testing.
struct LcgSampler {
    state: u64,
}

impl LcgSampler {
    fn next_u64(&mut self) -> u64 {
        // LCG parameters from Numerical Recipes
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl ControlSampler for LcgSampler {
    type State = f64;
    type Control = f64;

    fn sample_next(&mut self, out: &mut f64, _previous: &f64, _state: &f64) {
        // Velocity in [-1, 1]
        *out = self.next_f64() * 2.0 - 1.0;
    }

    fn sample_step_count(&mut self, min: u32, max: u32) -> u32 {
        min + (self.next_u64() % u64::from(max - min + 1)) as u32
    }
}

struct LineProjection;

impl ProjectionEvaluator for LineProjection {
    type State = f64;

    fn dimension(&self) -> usize {
        1
    }

    fn compute_coordinates(&self, state: &f64, out: &mut Coord) {
        out.0.clear();
        out.0.push((state / CELL_WIDTH).floor() as i32);
    }
}

struct IntervalGoal {
    target: f64,
    tolerance: f64,
}

impl Goal for IntervalGoal {
    type State = f64;

    fn is_satisfied(&self, state: &f64) -> (bool, f64) {
        let distance = (state - self.target).abs();
        (distance <= self.tolerance, distance)
    }
}

/// A goal covering the whole line.
struct EverywhereGoal;

impl Goal for EverywhereGoal {
    type State = f64;

    fn is_satisfied(&self, _state: &f64) -> (bool, f64) {
        (true, 0.0)
    }
}

fn seeded_planner(
    config: KpieceConfig,
    seed: u64,
) -> Kpiece<LineSpace, LineProjection, StdPlannerRng> {
    let space = LineSpace::new(1e6, seed);
    Kpiece::with_rng(space, LineProjection, config, StdPlannerRng::seeded(seed))
        .expect("config is valid")
}

fn iteration_limit(mut n: u64) -> impl FnMut() -> bool {
    move || {
        if n == 0 {
            return true;
        }
        n -= 1;
        false
    }
}

#[test]
fn test_empty_start_set() {
    let mut planner = seeded_planner(KpieceConfig::default(), 42);
    let goal = IntervalGoal {
        target: 1.0,
        tolerance: 0.1,
    };
    let result = planner.solve(&[], &goal, iteration_limit(10));
    assert_eq!(result.unwrap_err(), PlannerError::NoValidInitialStates);
}

#[test]
fn test_trivial_success() {
    let mut planner = seeded_planner(KpieceConfig::default(), 42);
    let goal = IntervalGoal {
        target: 0.0,
        tolerance: 0.5,
    };

    let path = planner
        .solve(&[0.1], &goal, iteration_limit(10))
        .expect("start satisfies the goal");

    assert!(!path.approximate);
    assert_eq!(planner.tree_size(), 1);
    assert_eq!(path.states, vec![0.1]);
    assert!(path.controls.is_empty());
    assert!(path.durations.is_empty());
    assert_relative_eq!(path.goal_distance, 0.1, epsilon = 1e-12);
}

#[test]
fn test_goal_everywhere_accepts_first_motion() {
    let mut planner = seeded_planner(KpieceConfig::default(), 7);
    let path = planner
        .solve(&[3.0], &EverywhereGoal, iteration_limit(10))
        .expect("goal covers the whole space");

    assert!(!path.approximate);
    assert_eq!(planner.tree_size(), 1);
    assert_eq!(path.len(), 1);
}

#[test]
fn test_exploration_grows_tree() {
    let config = KpieceConfig {
        goal_bias: 0.0,
        ..Default::default()
    };
    let mut planner = seeded_planner(config, 42);
    // One iteration extends a chain by at most max_duration * step_size
    // = 1 unit, so 200 units cannot be reached in 100 iterations.
    let goal = IntervalGoal {
        target: 200.0,
        tolerance: 0.1,
    };

    let result = planner.solve(&[0.0], &goal, iteration_limit(100));
    let path = result.expect("an approximate path exists");

    assert!(path.approximate);
    assert!(path.goal_distance > 0.0);
    assert!(
        planner.tree_size() >= 50,
        "only {} motions after 100 iterations",
        planner.tree_size()
    );
    assert!(planner.grid().len() >= 2);
}

#[test]
fn test_tree_invariants_hold_after_exploration() {
    let mut planner = seeded_planner(KpieceConfig::default(), 1234);
    let goal = IntervalGoal {
        target: 30.0,
        tolerance: 0.1,
    };
    planner
        .solve(&[0.0], &goal, iteration_limit(200))
        .expect("an approximate path exists");

    let grid = planner.grid();

    // Motion counts per cell sum to the tree size.
    let total: usize = grid.content().map(|data| data.motions.len()).sum();
    assert_eq!(total, planner.tree_size());

    let mut border_cells = 0;
    for (_, cell) in grid.cells() {
        if cell.border() {
            border_cells += 1;
        }

        // Coverage equals the sum of the contained motions' steps.
        let steps: u64 = cell
            .data
            .motions
            .iter()
            .map(|&id| u64::from(planner.motion(id).steps))
            .sum();
        assert_eq!(cell.data.coverage, steps);

        // Scores stay strictly positive.
        assert!(cell.data.score > 0.0);
        assert!(cell.data.selections >= 1);
    }

    // Partition sizes match the border flags.
    assert_eq!(border_cells, grid.count_external());
    assert_eq!(grid.len() - border_cells, grid.count_internal());
    let frac = grid.count_external() as f64 / grid.len() as f64;
    assert_relative_eq!(grid.frac_external(), frac, epsilon = 1e-12);

    // Parent chains terminate: no cycles.
    for (_, cell) in grid.cells() {
        for &id in &cell.data.motions {
            let mut cursor = Some(id);
            let mut hops = 0;
            while let Some(current) = cursor {
                cursor = planner.motion(current).parent;
                hops += 1;
                assert!(hops <= planner.tree_size(), "parent chain does not terminate");
            }
        }
    }
}

#[test]
fn test_deterministic_with_fixed_seeds() {
    let goal = IntervalGoal {
        target: 20.0,
        tolerance: 0.1,
    };

    let mut first = seeded_planner(KpieceConfig::default(), 42);
    let path_a = first
        .solve(&[0.0], &goal, iteration_limit(150))
        .expect("an approximate path exists");

    let mut second = seeded_planner(KpieceConfig::default(), 42);
    let path_b = second
        .solve(&[0.0], &goal, iteration_limit(150))
        .expect("an approximate path exists");

    assert_eq!(first.tree_size(), second.tree_size());
    assert_eq!(first.grid().len(), second.grid().len());
    assert_eq!(first.grid().count_internal(), second.grid().count_internal());
    assert_eq!(path_a.states, path_b.states);
    assert_eq!(path_a.controls, path_b.controls);
    assert_eq!(path_a.durations, path_b.durations);
}

#[test]
fn test_exact_solution_and_replay() {
    let mut planner = seeded_planner(KpieceConfig::default(), 42);
    let goal = IntervalGoal {
        target: 1.0,
        tolerance: 0.25,
    };

    let path = planner
        .solve(&[0.0], &goal, iteration_limit(100_000))
        .expect("the goal is reachable");

    assert!(!path.approximate);
    assert!(path.goal_distance <= 0.25);
    assert_eq!(path.states.len(), path.controls.len() + 1);
    assert_eq!(path.states.len(), path.durations.len() + 1);
    assert!((path.states[0] - 0.0).abs() < 1e-12);

    // Replaying the stored controls reproduces the recorded states.
    let space = LineSpace::new(1e6, 0);
    let mut buffer = vec![0.0f64; space.max_control_duration() as usize + 1];
    for i in 0..path.controls.len() {
        let steps = (path.durations[i] / STEP_SIZE).round() as u32;
        assert!(steps >= 1);
        let reached =
            space.propagate_while_valid(&path.states[i], &path.controls[i], steps, &mut buffer);
        assert_eq!(reached, steps);
        assert_relative_eq!(
            buffer[steps as usize - 1],
            path.states[i + 1],
            epsilon = 1e-9
        );
    }
}

#[test]
fn test_multiple_starts_seed_the_tree() {
    let mut planner = seeded_planner(KpieceConfig::default(), 9);
    let goal = IntervalGoal {
        target: 500.0,
        tolerance: 0.1,
    };

    // Termination fires immediately: seeds go in, nothing expands, and
    // no approximate solution exists yet.
    let result = planner.solve(&[0.0, 5.0, -5.0], &goal, || true);
    assert_eq!(result.unwrap_err(), PlannerError::NoSolutionFound);
    assert_eq!(planner.tree_size(), 3);
    assert_eq!(planner.grid().len(), 3);
}

#[test]
fn test_border_fraction_one_prefers_exterior() {
    let config = KpieceConfig {
        border_fraction: 1.0,
        goal_bias: 0.0,
        ..Default::default()
    };
    let mut planner = seeded_planner(config, 42);
    let goal = IntervalGoal {
        target: 40.0,
        tolerance: 0.1,
    };
    planner
        .solve(&[0.0], &goal, iteration_limit(100))
        .expect("an approximate path exists");

    // With the fraction pinned at 1, every selection draws from the
    // exterior partition, so expansion keeps pushing the frontier and
    // selections concentrate on cells that are (or were) border cells.
    assert!(planner.tree_size() > 1);
    let frontier_selections: u64 = planner
        .grid()
        .cells()
        .filter(|(_, cell)| cell.border())
        .map(|(_, cell)| cell.data.selections)
        .sum();
    assert!(frontier_selections >= 2, "frontier cells were never selected");
}

#[test]
fn test_zero_goal_bias_explores() {
    let config = KpieceConfig {
        goal_bias: 0.0,
        ..Default::default()
    };
    let mut planner = seeded_planner(config, 3);
    let goal = IntervalGoal {
        target: 15.0,
        tolerance: 0.1,
    };
    let path = planner
        .solve(&[0.0], &goal, iteration_limit(100))
        .expect("an approximate path exists");
    assert!(path.goal_distance < 15.0);
}

#[test]
fn test_clear_then_resolve() {
    let mut planner = seeded_planner(KpieceConfig::default(), 42);
    let goal = IntervalGoal {
        target: 25.0,
        tolerance: 0.1,
    };
    planner
        .solve(&[0.0], &goal, iteration_limit(50))
        .expect("an approximate path exists");
    assert!(planner.tree_size() > 1);

    planner.clear();
    assert_eq!(planner.tree_size(), 0);
    assert_eq!(planner.iteration(), 1);
    assert!(planner.grid().is_empty());

    planner
        .solve(&[0.0], &goal, iteration_limit(50))
        .expect("an approximate path exists after clearing");
    assert!(planner.tree_size() > 1);
}

#[test]
fn test_resume_without_reseeding() {
    let mut planner = seeded_planner(KpieceConfig::default(), 42);
    let goal = IntervalGoal {
        target: 35.0,
        tolerance: 0.1,
    };
    planner
        .solve(&[0.0], &goal, iteration_limit(40))
        .expect("an approximate path exists");
    let size_after_first = planner.tree_size();

    // An empty start slice continues the existing tree.
    planner
        .solve(&[], &goal, iteration_limit(40))
        .expect("an approximate path exists");
    assert!(planner.tree_size() > size_after_first);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let config = KpieceConfig {
        bad_score_factor: 0.0,
        ..Default::default()
    };
    let space = LineSpace::new(1e6, 42);
    let result = Kpiece::with_rng(space, LineProjection, config, StdPlannerRng::seeded(42));
    assert!(matches!(
        result,
        Err(PlannerError::InvalidParameter {
            name: "bad_score_factor",
            ..
        })
    ));
}

#[test]
fn test_planner_data_matches_tree() {
    let mut planner = seeded_planner(KpieceConfig::default(), 42);
    let goal = IntervalGoal {
        target: 30.0,
        tolerance: 0.1,
    };
    planner
        .solve(&[0.0], &goal, iteration_limit(120))
        .expect("an approximate path exists");

    let edges = planner.planner_data();
    assert_eq!(edges.len(), planner.tree_size());
    assert_eq!(edges.iter().filter(|e| e.source.is_none()).count(), 1);

    for edge in &edges {
        assert!(edge.tag == 1 || edge.tag == 2);
        match edge.source {
            Some(_) => {
                assert!(edge.control.is_some());
                // Durations are whole multiples of the step size.
                let steps = edge.duration / STEP_SIZE;
                assert_relative_eq!(steps, steps.round(), epsilon = 1e-9);
                assert!(steps >= 1.0);
            }
            None => {
                assert!(edge.control.is_none());
                assert_eq!(edge.duration, 0.0);
            }
        }
    }
}

//! KPIECE planner for systems with controls.
//!
//! The planner grows a tree of [`Motion`]s inside a [`ProjectionGrid`].
//! Each iteration selects a cell (preferring the border of the explored
//! region), picks a motion inside it, samples a control and a duration,
//! propagates while the system stays valid, and splits the resulting
//! trajectory along cell boundaries before inserting it. Cell scores
//! rise on productive expansions and decay on unproductive ones, which
//! steers selection toward regions that keep paying off.

mod close_samples;
mod path;

pub use path::{PlannedPath, PlannerDataEdge};

use crate::config::KpieceConfig;
use crate::error::{PlannerError, Result};
use crate::grid::{CellId, Coord, ProjectionGrid};
use crate::motion::{Motion, MotionId, MotionStore};
use crate::rng::{PlannerRng, StdPlannerRng};
use crate::space::{ControlSampler, ControlSpace, Goal, ProjectionEvaluator};

use close_samples::CloseSamples;

/// Probability of splitting and keeping a trajectory that did not look
/// interesting on its own.
const SPLIT_FALLBACK_PROBABILITY: f64 = 0.05;

/// The exploration tree: the grid plus its aggregates.
#[derive(Debug)]
struct Tree<S, C> {
    grid: ProjectionGrid,
    motions: MotionStore<S, C>,
    /// Total motions across all cells.
    size: usize,
    /// Monotonic iteration counter, starting at 1.
    iteration: u32,
}

impl<S, C> Tree<S, C> {
    fn new(dimension: usize) -> Self {
        Self {
            grid: ProjectionGrid::new(dimension),
            motions: MotionStore::new(),
            size: 0,
            iteration: 1,
        }
    }

    fn clear(&mut self) {
        self.grid.clear();
        self.motions.clear();
        self.size = 0;
        self.iteration = 1;
    }
}

/// Kinodynamic planner by interior-exterior cell exploration.
///
/// Generic over the control space `SP`, the projection evaluator `PJ`
/// and the random source `RN` (defaulting to the seedable
/// [`StdPlannerRng`]). See the crate root for an overview and
/// [`Kpiece::solve`] for the algorithm.
pub struct Kpiece<SP, PJ, RN = StdPlannerRng>
where
    SP: ControlSpace,
    PJ: ProjectionEvaluator<State = SP::State>,
    RN: PlannerRng,
{
    space: SP,
    projection: PJ,
    config: KpieceConfig,
    rng: RN,
    tree: Tree<SP::State, SP::Control>,
    sampler: Option<SP::Sampler>,
}

impl<SP, PJ> Kpiece<SP, PJ, StdPlannerRng>
where
    SP: ControlSpace,
    PJ: ProjectionEvaluator<State = SP::State>,
{
    /// Create a planner with an entropy-seeded random source.
    ///
    /// Fails when the configuration violates a parameter range.
    pub fn new(space: SP, projection: PJ, config: KpieceConfig) -> Result<Self> {
        Self::with_rng(space, projection, config, StdPlannerRng::new())
    }
}

impl<SP, PJ, RN> Kpiece<SP, PJ, RN>
where
    SP: ControlSpace,
    PJ: ProjectionEvaluator<State = SP::State>,
    RN: PlannerRng,
{
    /// Create a planner with a caller-provided random source.
    ///
    /// With a seeded source and deterministic space, sampler and
    /// projection, two runs produce identical trees.
    pub fn with_rng(space: SP, projection: PJ, config: KpieceConfig, rng: RN) -> Result<Self> {
        config.validate()?;
        let dimension = projection.dimension();
        Ok(Self {
            tree: Tree::new(dimension),
            space,
            projection,
            config,
            rng,
            sampler: None,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &KpieceConfig {
        &self.config
    }

    /// Replace the configuration, validating it first.
    pub fn set_config(&mut self, config: KpieceConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Probability of consulting the close-sample set during selection.
    pub fn goal_bias(&self) -> f64 {
        self.config.goal_bias
    }

    /// Set the goal bias. Range `[0, 1]`.
    pub fn set_goal_bias(&mut self, goal_bias: f64) -> Result<()> {
        let mut config = self.config.clone();
        config.goal_bias = goal_bias;
        self.set_config(config)
    }

    /// Minimum fraction of selections taken from border cells.
    pub fn border_fraction(&self) -> f64 {
        self.config.border_fraction
    }

    /// Set the border fraction. Range `(0, 1]`.
    pub fn set_border_fraction(&mut self, border_fraction: f64) -> Result<()> {
        let mut config = self.config.clone();
        config.border_fraction = border_fraction;
        self.set_config(config)
    }

    /// The control space the planner expands through.
    pub fn space(&self) -> &SP {
        &self.space
    }

    /// Read-only view of the projection grid.
    pub fn grid(&self) -> &ProjectionGrid {
        &self.tree.grid
    }

    /// Mutable access to the projection grid, for installing an
    /// importance hook or inspecting cells in tests.
    pub fn grid_mut(&mut self) -> &mut ProjectionGrid {
        &mut self.tree.grid
    }

    /// Total number of motions in the tree.
    pub fn tree_size(&self) -> usize {
        self.tree.size
    }

    /// Current planner iteration.
    pub fn iteration(&self) -> u32 {
        self.tree.iteration
    }

    /// Look up a motion by id.
    pub fn motion(&self, id: MotionId) -> &Motion<SP::State, SP::Control> {
        self.tree.motions.get(id)
    }

    /// Release every motion and cell and reset the iteration counter.
    ///
    /// The configuration, space, projection and random source are kept;
    /// the control sampler is reallocated on the next solve.
    pub fn clear(&mut self) {
        self.sampler = None;
        self.tree.clear();
    }

    /// Search for a control sequence driving the system from one of
    /// `starts` into the goal region.
    ///
    /// `ptc` is polled once per iteration; the search stops when it
    /// returns true or an exact solution is found. If the condition
    /// fires first, the motion that came closest to the goal is
    /// returned with [`PlannedPath::approximate`] set.
    ///
    /// Calling `solve` again continues growing the same tree; pass an
    /// empty `starts` slice to resume without re-seeding.
    pub fn solve<G, F>(
        &mut self,
        starts: &[SP::State],
        goal: &G,
        mut ptc: F,
    ) -> Result<PlannedPath<SP::State, SP::Control>>
    where
        G: Goal<State = SP::State>,
        F: FnMut() -> bool,
    {
        let mut solution: Option<MotionId> = None;
        let mut approx_sol: Option<MotionId> = None;
        let mut approx_dif = f64::INFINITY;

        for start in starts {
            let mut control = self.space.alloc_control();
            self.space.null_control(&mut control);
            let motion = Motion {
                state: start.clone(),
                control,
                steps: 0,
                parent: None,
            };
            let (satisfied, dist) = goal.is_satisfied(&motion.state);
            let (id, _) = self.add_motion(motion, 1.0);
            if satisfied && solution.is_none() {
                solution = Some(id);
                approx_dif = dist;
            }
        }

        if self.tree.grid.is_empty() {
            log::error!("There are no valid initial states!");
            return Err(PlannerError::NoValidInitialStates);
        }

        let mut sampler = match self.sampler.take() {
            Some(sampler) => sampler,
            None => self.space.alloc_control_sampler(),
        };

        log::info!("Starting with {} states", self.tree.size);

        let min_duration = self.space.min_control_duration();
        let max_duration = self.space.max_control_duration();
        let buffer_len = max_duration as usize + 1;

        // Scratch for one solve call; dropped on every exit path.
        let mut rctrl = self.space.alloc_control();
        let mut states: Vec<SP::State> =
            (0..buffer_len).map(|_| self.space.alloc_state()).collect();
        let mut coords: Vec<Coord> = vec![Coord::default(); buffer_len];
        let mut cells: Vec<Option<CellId>> = vec![None; buffer_len];
        let mut close_samples = CloseSamples::new(self.config.n_close_samples);

        while solution.is_none() && !ptc() {
            self.tree.iteration += 1;

            // Decide on a motion to expand from.
            let selected = if close_samples.can_sample()
                && self.rng.uniform01() < self.config.goal_bias
            {
                close_samples
                    .select_motion()
                    .or_else(|| self.select_motion())
            } else {
                self.select_motion()
            };
            let (existing_id, ecell) = match selected {
                Some(pair) => pair,
                None => continue,
            };

            // Sample a control and propagate while the system stays valid.
            {
                let existing = self.tree.motions.get(existing_id);
                sampler.sample_next(&mut rctrl, &existing.control, &existing.state);
            }
            let requested = sampler.sample_step_count(min_duration, max_duration);
            let cd = {
                let existing = self.tree.motions.get(existing_id);
                self.space
                    .propagate_while_valid(&existing.state, &rctrl, requested, &mut states)
            };

            if cd >= min_duration {
                let cd = cd as usize;
                // Integer division on purpose: matches the historical
                // under-representation threshold, including its zero
                // quotient while the tree is small.
                let avg_cov_two_thirds = (2 * self.tree.size) / (3 * self.tree.grid.len());
                let mut interesting = false;

                for i in 0..cd {
                    self.projection
                        .compute_coordinates(&states[i], &mut coords[i]);
                    cells[i] = self.tree.grid.get(&coords[i]);
                    match cells[i] {
                        None => interesting = true,
                        Some(cell) => {
                            if !interesting
                                && self.tree.grid.cell(cell).data.motions.len()
                                    <= avg_cov_two_thirds
                            {
                                interesting = true;
                            }
                        }
                    }
                }

                if interesting || self.rng.uniform01() < SPLIT_FALLBACK_PROBABILITY {
                    // Split the trajectory so no motion crosses a cell
                    // boundary; each piece parents the previous one.
                    let mut index = 0;
                    let mut parent = existing_id;
                    while index < cd {
                        let next = find_next_motion(&coords, index, cd);
                        let motion = Motion {
                            state: states[next].clone(),
                            control: rctrl.clone(),
                            steps: (next - index + 1) as u32,
                            parent: Some(parent),
                        };
                        let (satisfied, dist) = goal.is_satisfied(&motion.state);
                        let (id, to_cell) = self.add_motion(motion, dist);
                        if satisfied {
                            approx_dif = dist;
                            solution = Some(id);
                            break;
                        }
                        if dist < approx_dif {
                            approx_dif = dist;
                            approx_sol = Some(id);
                        }
                        close_samples.consider(to_cell, id, dist);
                        parent = id;
                        index = next + 1;
                    }
                    if solution.is_some() {
                        break;
                    }
                }

                self.tree.grid.cell_data_mut(ecell).score *= self.config.good_score_factor;
            } else {
                self.tree.grid.cell_data_mut(ecell).score *= self.config.bad_score_factor;
            }
            self.tree.grid.update(ecell, self.tree.iteration);
        }

        self.sampler = Some(sampler);

        let mut approximate = false;
        let solution = solution.or_else(|| {
            approximate = true;
            approx_sol
        });

        let result = match solution {
            Some(goal_motion) => {
                if approximate {
                    log::warn!("Found approximate solution");
                }
                Ok(self.reconstruct_path(goal_motion, approximate, approx_dif))
            }
            None => Err(PlannerError::NoSolutionFound),
        };

        log::info!(
            "Created {} states in {} cells ({} internal + {} external)",
            self.tree.size,
            self.tree.grid.len(),
            self.tree.grid.count_internal(),
            self.tree.grid.count_external()
        );

        result
    }

    /// Export the search tree as a flat edge list.
    ///
    /// Every motion contributes one edge from its parent's state; roots
    /// contribute a sourceless edge with zero duration. States are
    /// tagged 2 when their cell lies on the border of the explored
    /// region, 1 otherwise.
    pub fn planner_data(&self) -> Vec<PlannerDataEdge<'_, SP::State, SP::Control>> {
        let delta = self.space.propagation_step_size();
        let mut edges = Vec::with_capacity(self.tree.size);
        for (_, cell) in self.tree.grid.cells() {
            let tag = if cell.border() { 2 } else { 1 };
            for &motion_id in &cell.data.motions {
                let motion = self.tree.motions.get(motion_id);
                match motion.parent {
                    Some(parent_id) => {
                        let parent = self.tree.motions.get(parent_id);
                        edges.push(PlannerDataEdge {
                            source: Some(&parent.state),
                            target: &motion.state,
                            control: Some(&motion.control),
                            duration: motion.steps as f64 * delta,
                            tag,
                        });
                    }
                    None => edges.push(PlannerDataEdge {
                        source: None,
                        target: &motion.state,
                        control: None,
                        duration: 0.0,
                        tag,
                    }),
                }
            }
        }
        edges
    }

    /// Pick a cell from the preferred partition and a motion inside it.
    ///
    /// Returns `None` when the chosen partition is empty or the top
    /// cell holds no motions; the caller skips the iteration.
    fn select_motion(&mut self) -> Option<(MotionId, CellId)> {
        let threshold = self
            .config
            .border_fraction
            .max(self.tree.grid.frac_external());
        let scell = if self.rng.uniform01() < threshold {
            self.tree.grid.top_external()
        } else {
            self.tree.grid.top_internal()
        }?;

        // Finite precision: repeated decay drives scores to zero, at
        // which point they stop ordering cells. Restore additively.
        if self.tree.grid.cell(scell).data.score < f64::EPSILON {
            log::debug!("Numerical precision limit reached. Resetting costs.");
            for data in self.tree.grid.content_mut() {
                data.score += 1.0 + (data.iteration as f64).ln();
            }
            self.tree.grid.update_all(self.tree.iteration);
        }

        let data = self.tree.grid.cell_data_mut(scell);
        if data.motions.is_empty() {
            return None;
        }
        data.selections += 1;
        let count = data.motions.len();
        let k = self.rng.half_normal_int(0, count - 1);
        Some((data.motions[k], scell))
    }

    /// Insert a motion into the cell its state projects to, creating
    /// the cell if needed. `dist` is the motion's goal distance, used
    /// to score new cells.
    fn add_motion(
        &mut self,
        motion: Motion<SP::State, SP::Control>,
        dist: f64,
    ) -> (MotionId, CellId) {
        let mut coord = Coord::default();
        self.projection.compute_coordinates(&motion.state, &mut coord);
        let steps = motion.steps as u64;
        let id = self.tree.motions.insert(motion);

        let cell = match self.tree.grid.get(&coord) {
            Some(cell) => {
                let data = self.tree.grid.cell_data_mut(cell);
                data.motions.push(id);
                data.coverage += steps;
                self.tree.grid.update(cell, self.tree.iteration);
                cell
            }
            None => {
                let iteration = self.tree.iteration;
                let cell = self.tree.grid.create(coord);
                let data = self.tree.grid.cell_data_mut(cell);
                data.motions.push(id);
                data.coverage = steps;
                data.iteration = iteration;
                data.selections = 1;
                data.score = (1.0 + f64::from(iteration).ln()) / (1e-3 + dist);
                self.tree.grid.add(cell, iteration);
                cell
            }
        };
        self.tree.size += 1;
        (id, cell)
    }

    /// Walk parent links from `goal_motion` back to a root and emit the
    /// chain forward as states, controls and durations.
    fn reconstruct_path(
        &self,
        goal_motion: MotionId,
        approximate: bool,
        goal_distance: f64,
    ) -> PlannedPath<SP::State, SP::Control> {
        let mut chain = Vec::new();
        let mut cursor = Some(goal_motion);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.tree.motions.get(id).parent;
        }
        chain.reverse();

        let delta = self.space.propagation_step_size();
        let mut path = PlannedPath {
            states: Vec::with_capacity(chain.len()),
            controls: Vec::with_capacity(chain.len().saturating_sub(1)),
            durations: Vec::with_capacity(chain.len().saturating_sub(1)),
            approximate,
            goal_distance,
        };
        for id in chain {
            let motion = self.tree.motions.get(id);
            path.states.push(motion.state.clone());
            if motion.parent.is_some() {
                path.controls.push(motion.control.clone());
                path.durations.push(motion.steps as f64 * delta);
            }
        }
        path
    }
}

/// Last index in `[index, count)` whose coordinate still equals
/// `coords[index]`.
fn find_next_motion(coords: &[Coord], index: usize, count: usize) -> usize {
    for i in index + 1..count {
        if coords[i] != coords[index] {
            return i - 1;
        }
    }
    count - 1
}

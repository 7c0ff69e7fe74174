//! Discretization grid over the projected state space.
//!
//! The grid maps integer [`Coord`]s to cells and keeps every cell in
//! exactly one of two partitions:
//!
//! - **exterior** (border): the cell has at least one empty orthogonal
//!   neighbor
//! - **interior**: the cell is fully surrounded
//!
//! Each partition has its own priority heap over the cells' importance,
//! so selection can take the top-scoring border or inner cell in
//! O(log n) even as scores mutate. Importance is computed by a
//! replaceable hook (see [`ProjectionGrid::on_cell_update`]); the
//! default combines score, coverage, selections and cell age.

mod cell;
mod heap;

use std::collections::HashMap;

pub use cell::{Cell, CellData, CellId, Coord};

use cell::NO_SLOT;
use heap::CellHeap;

/// Importance hook: computes a cell's priority key from its data and
/// the current tree iteration.
///
/// Implementations must be strictly increasing in `score` and
/// `coverage`, and strictly decreasing in `selections` and in the
/// cell's age (current iteration minus creation iteration).
pub type ImportanceFn = Box<dyn Fn(&CellData, u32) -> f64>;

/// Default importance: `score * coverage / (selections * (1 + age))`.
pub fn default_importance(data: &CellData, iteration: u32) -> f64 {
    let age = iteration.saturating_sub(data.iteration) as f64;
    data.score * data.coverage as f64 / (data.selections as f64 * (1.0 + age))
}

/// Grid of scored cells over the projection, partitioned into interior
/// and exterior sets.
pub struct ProjectionGrid {
    dimension: usize,
    cells: Vec<Cell>,
    lookup: HashMap<Coord, CellId>,
    interior: CellHeap,
    exterior: CellHeap,
    importance: ImportanceFn,
}

impl std::fmt::Debug for ProjectionGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionGrid")
            .field("dimension", &self.dimension)
            .field("cells", &self.cells.len())
            .field("interior", &self.interior.len())
            .field("exterior", &self.exterior.len())
            .finish()
    }
}

impl ProjectionGrid {
    /// Create an empty grid for a projection of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            cells: Vec::new(),
            lookup: HashMap::new(),
            interior: CellHeap::default(),
            exterior: CellHeap::default(),
            importance: Box::new(default_importance),
        }
    }

    /// Dimension of the projection this grid discretizes.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Install the importance hook invoked whenever the grid must
    /// compute a cell's priority key.
    pub fn on_cell_update(&mut self, hook: ImportanceFn) {
        self.importance = hook;
    }

    /// Exact lookup of the cell at `coord`.
    pub fn get(&self, coord: &Coord) -> Option<CellId> {
        self.lookup.get(coord).copied()
    }

    /// Shared access to a cell.
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    /// Mutable access to a cell's planner payload.
    pub fn cell_data_mut(&mut self, id: CellId) -> &mut CellData {
        &mut self.cells[id.index()].data
    }

    /// Insert a new empty cell at `coord`.
    ///
    /// Orthogonal neighbors have their border flags refreshed; a
    /// neighbor whose last empty side is filled here migrates from the
    /// exterior to the interior partition. The new cell itself is not
    /// in any partition until [`ProjectionGrid::add`] is called.
    pub fn create(&mut self, coord: Coord) -> CellId {
        debug_assert_eq!(coord.len(), self.dimension);

        let id = CellId(self.cells.len() as u32);
        let surround = 2 * self.dimension;
        let mut neighbor_count = 0;

        let mut probe = coord.clone();
        for axis in 0..self.dimension {
            for delta in [-1i32, 1] {
                probe.0[axis] = coord.0[axis] + delta;
                if let Some(&nid) = self.lookup.get(&probe) {
                    neighbor_count += 1;
                    let ncell = &mut self.cells[nid.index()];
                    ncell.neighbor_count += 1;
                    if ncell.border && ncell.neighbor_count >= surround {
                        ncell.border = false;
                        let slot = ncell.heap_slot;
                        if slot != NO_SLOT {
                            self.exterior.remove(slot, &mut self.cells);
                            self.interior.push(nid, &mut self.cells);
                        }
                    }
                }
            }
            probe.0[axis] = coord.0[axis];
        }

        let border = neighbor_count < surround;
        self.cells.push(Cell::new(coord.clone(), border, neighbor_count));
        self.lookup.insert(coord, id);
        id
    }

    /// Insert a freshly created cell into its partition's priority
    /// structure, computing its initial importance.
    pub fn add(&mut self, id: CellId, iteration: u32) {
        let imp = (self.importance)(&self.cells[id.index()].data, iteration);
        self.cells[id.index()].data.importance = imp;
        if self.cells[id.index()].border {
            self.exterior.push(id, &mut self.cells);
        } else {
            self.interior.push(id, &mut self.cells);
        }
    }

    /// Signal that a cell's score changed; recomputes its importance
    /// and re-sifts it within its partition heap.
    pub fn update(&mut self, id: CellId, iteration: u32) {
        let imp = (self.importance)(&self.cells[id.index()].data, iteration);
        let cell = &mut self.cells[id.index()];
        cell.data.importance = imp;
        let slot = cell.heap_slot;
        let border = cell.border;
        if slot == NO_SLOT {
            return;
        }
        if border {
            self.exterior.update(slot, &mut self.cells);
        } else {
            self.interior.update(slot, &mut self.cells);
        }
    }

    /// Recompute every cell's importance and rebuild both partitions.
    ///
    /// O(n log n); used after bulk score changes such as the numerical
    /// rescue.
    pub fn update_all(&mut self, iteration: u32) {
        for cell in self.cells.iter_mut() {
            cell.data.importance = (self.importance)(&cell.data, iteration);
        }
        self.exterior.rebuild(&mut self.cells);
        self.interior.rebuild(&mut self.cells);
    }

    /// Highest-importance exterior (border) cell.
    pub fn top_external(&self) -> Option<CellId> {
        self.exterior.top()
    }

    /// Highest-importance interior cell.
    pub fn top_internal(&self) -> Option<CellId> {
        self.interior.top()
    }

    /// Number of cells in the interior partition.
    pub fn count_internal(&self) -> usize {
        self.interior.len()
    }

    /// Number of cells in the exterior partition.
    pub fn count_external(&self) -> usize {
        self.exterior.len()
    }

    /// Fraction of cells that are exterior, in `[0, 1]`.
    pub fn frac_external(&self) -> f64 {
        if self.cells.is_empty() {
            0.0
        } else {
            self.exterior.len() as f64 / self.cells.len() as f64
        }
    }

    /// Iterate over all cells.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, cell)| (CellId(i as u32), cell))
    }

    /// Iterate over every cell's planner payload.
    pub fn content(&self) -> impl Iterator<Item = &CellData> {
        self.cells.iter().map(|cell| &cell.data)
    }

    /// Mutable iteration over every cell's planner payload.
    ///
    /// Callers that change scores through this must follow up with
    /// [`ProjectionGrid::update_all`].
    pub fn content_mut(&mut self) -> impl Iterator<Item = &mut CellData> {
        self.cells.iter_mut().map(|cell| &mut cell.data)
    }

    /// Drop every cell, keeping the dimension and importance hook.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.lookup.clear();
        self.interior.clear();
        self.exterior.clear();
    }
}

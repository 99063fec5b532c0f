// Cell matrix of a Minesweeper board
// Owns cell storage, neighbor iteration, mine placement and adjacency counts

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A valid position on the grid (column `x`, row `y`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub x: usize,
    pub y: usize,
}

impl Location {
    pub const fn new(x: usize, y: usize) -> Self {
        Location { x, y }
    }

    /// True when `other` is one of the up-to-8 cells around this one (not the cell itself)
    pub fn is_adjacent(&self, other: Location) -> bool {
        *self != other && self.x.abs_diff(other.x) <= 1 && self.y.abs_diff(other.y) <= 1
    }
}

/// Player-visible state of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellState {
    #[default]
    Closed,
    Flagged,
    Open,
}

/// A single cell on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub state: CellState, // Closed, flagged or opened by the player
    pub mine: bool,       // Contains a mine (fixed once mines are placed)
    pub adjacent: u8,     // Mines among the neighbors (0-8)
}

/// Which cells the first reveal keeps free of mines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirstReveal {
    /// Only the revealed cell is guaranteed safe
    #[serde(alias = "safecell")]
    Cell,
    /// The revealed cell and its neighbors are safe when the board has room for it,
    /// so the first reveal opens an empty region
    #[default]
    #[serde(alias = "safearea")]
    Area,
}

impl FirstReveal {
    /// Config / CLI identifier
    pub fn name(&self) -> &'static str {
        match self {
            FirstReveal::Cell => "cell",
            FirstReveal::Area => "area",
        }
    }
}

const DISPLACEMENTS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Iterator over the in-bounds neighbors of a location
#[derive(Debug, Clone)]
pub struct Neighbors {
    center: Location,
    width: usize,
    height: usize,
    index: usize,
}

impl Iterator for Neighbors {
    type Item = Location;

    fn next(&mut self) -> Option<Location> {
        while self.index < DISPLACEMENTS.len() {
            let (dx, dy) = DISPLACEMENTS[self.index];
            self.index += 1;
            let x = self.center.x.checked_add_signed(dx);
            let y = self.center.y.checked_add_signed(dy);
            if let (Some(x), Some(y)) = (x, y) {
                if x < self.width && y < self.height {
                    return Some(Location { x, y });
                }
            }
        }
        None
    }
}

/// Fixed-size 2-D board of cells, stored row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create an all-closed grid without mines
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "grid must have at least one cell");
        Grid {
            width,
            height,
            cells: vec![Cell::default(); width * height],
        }
    }

    /// Create a grid with mines at the given locations and adjacency already counted
    #[cfg(test)]
    pub fn with_mines(width: usize, height: usize, mines: &[Location]) -> Self {
        let mut grid = Grid::new(width, height);
        for &loc in mines {
            grid.cell_mut(loc).mine = true;
        }
        grid.count_adjacent();
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Convert signed coordinates (possibly off the board) to a location
    pub fn locate(&self, x: i64, y: i64) -> Option<Location> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        (x < self.width && y < self.height).then_some(Location { x, y })
    }

    fn index(&self, loc: Location) -> usize {
        debug_assert!(loc.x < self.width && loc.y < self.height, "{loc:?} is off the grid");
        loc.y * self.width + loc.x
    }

    pub fn cell(&self, loc: Location) -> &Cell {
        &self.cells[self.index(loc)]
    }

    pub fn cell_mut(&mut self, loc: Location) -> &mut Cell {
        let idx = self.index(loc);
        &mut self.cells[idx]
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Every location, row by row
    pub fn locations(&self) -> impl Iterator<Item = Location> + use<> {
        let (w, h) = (self.width, self.height);
        (0..h).flat_map(move |y| (0..w).map(move |x| Location { x, y }))
    }

    pub fn neighbors(&self, loc: Location) -> Neighbors {
        Neighbors {
            center: loc,
            width: self.width,
            height: self.height,
            index: 0,
        }
    }

    pub fn mine_count(&self) -> usize {
        self.cells.iter().filter(|c| c.mine).count()
    }

    pub fn flag_count(&self) -> usize {
        self.cells.iter().filter(|c| c.state == CellState::Flagged).count()
    }

    /// Randomly place `mines` mines, never on `excluded`
    ///
    /// With [`FirstReveal::Area`] the neighbors of `excluded` stay free as well, unless
    /// fewer than `mines` cells would remain outside that 3x3 block. Returns the number
    /// of mines actually placed.
    pub fn place_mines<R: Rng>(
        &mut self,
        mines: usize,
        excluded: Location,
        policy: FirstReveal,
        rng: &mut R,
    ) -> usize {
        let n = self.len();
        let mines = if mines >= n {
            log::warn!("Requested {} mines but only {} cells can hold one", mines, n - 1);
            n - 1
        } else {
            mines
        };
        let keep_area = match policy {
            FirstReveal::Cell => false,
            FirstReveal::Area if mines > 0 && mines + 9 > n => {
                log::warn!("Cannot keep the first reveal's neighbors clear, only the cell itself stays safe");
                false
            }
            FirstReveal::Area => true,
        };

        let mut placed = 0;
        while placed < mines {
            let loc = Location {
                x: rng.gen_range(0..self.width),
                y: rng.gen_range(0..self.height),
            };
            if loc == excluded || (keep_area && loc.is_adjacent(excluded)) {
                continue;
            }
            let cell = self.cell_mut(loc);
            if !cell.mine {
                cell.mine = true;
                placed += 1;
            }
        }
        self.count_adjacent();
        log::debug!("Placed {} mines on a {}x{} grid avoiding {:?}", placed, self.width, self.height, excluded);
        placed
    }

    /// Recompute every cell's adjacent mine count in one pass
    pub fn count_adjacent(&mut self) {
        for loc in self.locations() {
            let adjacent = self.neighbors(loc).filter(|&n| self.cell(n).mine).count() as u8;
            self.cell_mut(loc).adjacent = adjacent;
        }
    }

    /// Open `start` and flood outwards through zero-count cells, breadth-first
    ///
    /// Flagged and already-open cells are skipped and stop the flood. Returns the number
    /// of cells opened; stops at the first mine opened, if any, and reports it.
    pub fn flood_open(&mut self, start: Location) -> (usize, Option<Location>) {
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut opened = 0;
        while let Some(loc) = queue.pop_front() {
            let cell = self.cell_mut(loc);
            if cell.state != CellState::Closed {
                continue;
            }
            cell.state = CellState::Open;
            opened += 1;
            if cell.mine {
                return (opened, Some(loc));
            }
            if cell.adjacent > 0 {
                continue;
            }
            queue.extend(self.neighbors(loc).filter(|&n| self.cell(n).state == CellState::Closed));
        }
        (opened, None)
    }

    /// Open every mined cell
    pub fn open_all_mines(&mut self) {
        for cell in self.cells.iter_mut().filter(|c| c.mine) {
            cell.state = CellState::Open;
        }
    }
}

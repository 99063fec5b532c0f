// Game rules and configuration management
// Handles reveal / flag / chord operations, win-loss detection and settings persistence

use directories::ProjectDirs;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::msw_grid::{CellState, FirstReveal, Grid, Location};

/// Largest board the setup accepts
pub const MAX_WIDTH: usize = 60;
pub const MAX_HEIGHT: usize = 40;

/// Rejected board configuration
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Board must be at least 1x1, got {width}x{height}")]
    EmptyBoard { width: usize, height: usize },
    #[error("Board {width}x{height} exceeds the {max_width}x{max_height} limit")]
    BoardTooLarge {
        width: usize,
        height: usize,
        max_width: usize,
        max_height: usize,
    },
    #[error("{mines} mines do not fit on {cells} cells, at most {} allowed", .cells - 1)]
    TooManyMines { mines: usize, cells: usize },
}

/// Failure reading or writing the settings file
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("settings file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("settings could not be encoded: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("settings describe an invalid board: {0}")]
    Invalid(#[from] ConfigError),
}

/// Immutable, validated parameters of one game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    width: usize,
    height: usize,
    mines: usize,
    first_reveal: FirstReveal,
}

impl GameConfig {
    /// Validate board dimensions and mine count (`mines < width * height`)
    pub fn new(
        width: usize,
        height: usize,
        mines: usize,
        first_reveal: FirstReveal,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyBoard { width, height });
        }
        if width > MAX_WIDTH || height > MAX_HEIGHT {
            return Err(ConfigError::BoardTooLarge {
                width,
                height,
                max_width: MAX_WIDTH,
                max_height: MAX_HEIGHT,
            });
        }
        let cells = width * height;
        if mines >= cells {
            return Err(ConfigError::TooManyMines { mines, cells });
        }
        Ok(GameConfig {
            width,
            height,
            mines,
            first_reveal,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mines(&self) -> usize {
        self.mines
    }

    pub fn first_reveal(&self) -> FirstReveal {
        self.first_reveal
    }
}

/// Derived game status, recomputed from the grid on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    InProgress,
    Completed,
    Failed,
}

/// Effect of a reveal or chord request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Unchanged,
    Revealed,
    HitMine,
}

impl RevealOutcome {
    /// Combine outcomes of several reveals; a mine hit dominates
    fn merge(self, other: RevealOutcome) -> RevealOutcome {
        use RevealOutcome::*;
        match (self, other) {
            (HitMine, _) | (_, HitMine) => HitMine,
            (Revealed, _) | (_, Revealed) => Revealed,
            _ => Unchanged,
        }
    }
}

/// What a renderer should draw for a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    Closed,
    ClosedHighlighted,
    Flagged,
    OpenEmpty,
    OpenNumbered(u8),
    OpenMine,
}

/// Main game state
#[derive(Debug, Clone)]
pub struct Game {
    config: GameConfig,
    grid: Grid,
    mines_placed: bool, // Mines are placed on the first reveal
    rng: StdRng,
}

impl Game {
    /// Create a game whose mines will be drawn from system entropy
    pub fn new(config: GameConfig) -> Self {
        Game::with_rng(config, StdRng::from_entropy())
    }

    /// Create a game with reproducible mine placement
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Game::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        Game {
            config,
            grid: Grid::new(config.width, config.height),
            mines_placed: false,
            rng,
        }
    }

    /// Create a game with a fixed mine layout, skipping lazy placement
    #[cfg(test)]
    pub fn with_mines(width: usize, height: usize, mines: &[Location]) -> Self {
        let grid = Grid::with_mines(width, height, mines);
        let config = GameConfig {
            width,
            height,
            mines: grid.mine_count(),
            first_reveal: FirstReveal::Cell,
        };
        Game {
            config,
            grid,
            mines_placed: true,
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[cfg(test)]
    pub fn mines_placed(&self) -> bool {
        self.mines_placed
    }

    /// Open a closed cell, flooding through empty regions
    /// - Flagged or open cells are left alone
    /// - The first reveal places the mines around this cell
    /// - Opening a mine opens every mine on the board
    pub fn reveal(&mut self, loc: Location) -> RevealOutcome {
        if self.grid.cell(loc).state != CellState::Closed {
            return RevealOutcome::Unchanged;
        }
        if !self.mines_placed {
            self.grid.place_mines(self.config.mines, loc, self.config.first_reveal, &mut self.rng);
            self.mines_placed = true;
        }
        match self.grid.flood_open(loc) {
            (_, Some(mine)) => {
                log::debug!("Mine hit at {:?}", mine);
                self.grid.open_all_mines();
                RevealOutcome::HitMine
            }
            (0, None) => RevealOutcome::Unchanged,
            (opened, None) => {
                log::trace!("Opened {} cells from {:?}", opened, loc);
                RevealOutcome::Revealed
            }
        }
    }

    /// Toggle Closed <-> Flagged; open cells are left alone
    /// Returns whether the cell changed
    pub fn toggle_flag(&mut self, loc: Location) -> bool {
        let cell = self.grid.cell_mut(loc);
        cell.state = match cell.state {
            CellState::Closed => CellState::Flagged,
            CellState::Flagged => CellState::Closed,
            CellState::Open => return false,
        };
        true
    }

    /// Reveal every unflagged neighbor of an open numbered cell, but only when the
    /// number of flagged neighbors equals its adjacent mine count
    pub fn chord_reveal(&mut self, loc: Location) -> RevealOutcome {
        let cell = *self.grid.cell(loc);
        if cell.state != CellState::Open || cell.mine || cell.adjacent == 0 {
            return RevealOutcome::Unchanged;
        }
        let (flagged, closed): (Vec<Location>, Vec<Location>) = self
            .grid
            .neighbors(loc)
            .filter(|&n| self.grid.cell(n).state != CellState::Open)
            .partition(|&n| self.grid.cell(n).state == CellState::Flagged);
        if flagged.len() != cell.adjacent as usize {
            return RevealOutcome::Unchanged;
        }
        closed
            .into_iter()
            .fold(RevealOutcome::Unchanged, |acc, n| acc.merge(self.reveal(n)))
    }

    /// Failed if any mine is open, Completed if every safe cell is open
    pub fn progress(&self) -> Progress {
        let mut result = Progress::Completed;
        for cell in self.grid.cells() {
            let open = cell.state == CellState::Open;
            if cell.mine && open {
                return Progress::Failed;
            }
            // keep scanning, a later cell may be an opened mine
            if !cell.mine && !open {
                result = Progress::InProgress;
            }
        }
        result
    }

    /// Mine counter for the status line: pending + placed mines minus flags
    /// Goes negative when the player places more flags than there are mines
    pub fn remaining_mines(&self) -> isize {
        let pending = if self.mines_placed { 0 } else { self.config.mines };
        (pending + self.grid.mine_count()) as isize - self.grid.flag_count() as isize
    }

    /// Rendering state of a cell; closed cells around `preview` are highlighted
    pub fn visual_state(&self, loc: Location, preview: Option<Location>) -> VisualState {
        let cell = self.grid.cell(loc);
        match cell.state {
            CellState::Flagged => VisualState::Flagged,
            CellState::Closed if preview.is_some_and(|p| p.is_adjacent(loc)) => {
                VisualState::ClosedHighlighted
            }
            CellState::Closed => VisualState::Closed,
            CellState::Open if cell.mine => VisualState::OpenMine,
            CellState::Open if cell.adjacent == 0 => VisualState::OpenEmpty,
            CellState::Open => VisualState::OpenNumbered(cell.adjacent),
        }
    }
}

/// User settings, persisted to disk as TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub width: usize,
    pub height: usize,
    pub mines: usize,
    pub first_reveal: FirstReveal, // Mine-free area around the first reveal
    pub ascii_icons: bool,         // Use ASCII fallback glyphs
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            width: 16,
            height: 16,
            mines: 40,
            first_reveal: FirstReveal::Area,
            ascii_icons: false,
        }
    }
}

impl Settings {
    /// Validated game parameters described by these settings
    pub fn game_config(&self) -> Result<GameConfig, ConfigError> {
        GameConfig::new(self.width, self.height, self.mines, self.first_reveal)
    }

    /// Remember a configuration the player chose
    pub fn apply(&mut self, config: &GameConfig) {
        self.width = config.width;
        self.height = config.height;
        self.mines = config.mines;
        self.first_reveal = config.first_reveal;
    }
}

/// Get the settings file path
/// Uses the platform config directory (e.g. ~/.config/mswpr/mswpr.toml on Linux),
/// falling back to the current directory
pub fn settings_path() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let name = exe.file_stem().and_then(|s| s.to_str())?;
    let mut path = match ProjectDirs::from("com", "xhbl", name) {
        Some(proj) => proj.config_dir().to_path_buf(),
        None => env::current_dir().ok()?,
    };
    path.push(format!("{}.toml", name));
    Some(path)
}

/// Parse and validate a settings file
pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let s = fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&s)?;
    settings.game_config()?;
    Ok(settings)
}

/// Write settings, creating the parent directory if needed
pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let s = toml::to_string(settings)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, s)?;
    Ok(())
}

/// Load settings from disk, or create the default file if missing or unusable
pub fn load_or_create_settings() -> Settings {
    let Some(path) = settings_path() else {
        log::warn!("No location for the settings file, using defaults");
        return Settings::default();
    };
    if path.exists() {
        match read_settings(&path) {
            Ok(settings) => return settings,
            Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
        }
    }
    let settings = Settings::default();
    if let Err(e) = write_settings(&path, &settings) {
        log::warn!("Could not create {}: {}", path.display(), e);
    }
    settings
}

/// Save settings to disk
pub fn save_settings(settings: &Settings) -> Result<(), SettingsError> {
    match settings_path() {
        Some(path) => write_settings(&path, settings),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(x: usize, y: usize) -> Location {
        Location::new(x, y)
    }

    fn config(w: usize, h: usize, mines: usize, first_reveal: FirstReveal) -> GameConfig {
        GameConfig::new(w, h, mines, first_reveal).unwrap()
    }

    #[test]
    fn config_rejects_bad_boards() {
        assert_eq!(
            GameConfig::new(0, 5, 0, FirstReveal::Cell),
            Err(ConfigError::EmptyBoard { width: 0, height: 5 })
        );
        assert_eq!(
            GameConfig::new(3, 3, 9, FirstReveal::Area),
            Err(ConfigError::TooManyMines { mines: 9, cells: 9 })
        );
        assert!(matches!(
            GameConfig::new(61, 10, 1, FirstReveal::Cell),
            Err(ConfigError::BoardTooLarge { .. })
        ));
        assert!(GameConfig::new(3, 3, 8, FirstReveal::Area).is_ok());
    }

    #[test]
    fn single_cell_board_completes_on_first_reveal() {
        let mut game = Game::with_seed(config(1, 1, 0, FirstReveal::Area), 7);
        assert_eq!(game.progress(), Progress::InProgress);
        assert_eq!(game.reveal(loc(0, 0)), RevealOutcome::Revealed);
        assert_eq!(game.progress(), Progress::Completed);
    }

    #[test]
    fn mines_are_placed_lazily_away_from_first_reveal() {
        for seed in 0..200u64 {
            let mut game = Game::with_seed(config(3, 3, 1, FirstReveal::Area), seed);
            assert!(!game.mines_placed());
            assert_eq!(game.grid().mine_count(), 0);
            assert_eq!(game.remaining_mines(), 1);

            game.reveal(loc(0, 0));
            assert!(game.mines_placed());
            assert_eq!(game.grid().mine_count(), 1);
            assert!(!game.grid().cell(loc(0, 0)).mine, "seed {seed}");
            assert_ne!(game.progress(), Progress::Failed);
        }
    }

    #[test]
    fn first_reveal_opens_an_empty_area_when_room_allows() {
        for seed in 0..100u64 {
            let mut game = Game::with_seed(config(9, 9, 72, FirstReveal::Area), seed);
            game.reveal(loc(4, 4));
            let grid = game.grid();
            assert!(grid.neighbors(loc(4, 4)).all(|n| !grid.cell(n).mine));
            assert!(grid.neighbors(loc(4, 4)).all(|n| grid.cell(n).state == CellState::Open));
        }
    }

    #[test]
    fn maximal_mine_count_is_winnable_in_one_reveal() {
        let mut game = Game::with_seed(config(4, 4, 15, FirstReveal::Cell), 3);
        game.reveal(loc(1, 2));
        assert_eq!(game.progress(), Progress::Completed);
    }

    #[test]
    fn hitting_a_mine_opens_every_mine() {
        let mut game = Game::with_mines(3, 3, &[loc(1, 1)]);
        assert_eq!(game.reveal(loc(1, 1)), RevealOutcome::HitMine);
        assert_eq!(game.progress(), Progress::Failed);
        assert_eq!(game.grid().cell(loc(1, 1)).state, CellState::Open);

        let mut game = Game::with_mines(4, 1, &[loc(0, 0), loc(3, 0)]);
        game.reveal(loc(3, 0));
        assert_eq!(game.grid().cell(loc(0, 0)).state, CellState::Open);
        assert_eq!(game.grid().cell(loc(1, 0)).state, CellState::Closed);
    }

    #[test]
    fn reveal_is_idempotent() {
        let mut game = Game::with_mines(3, 3, &[loc(2, 2)]);
        assert_eq!(game.reveal(loc(1, 1)), RevealOutcome::Revealed);
        let before = game.grid().clone();
        assert_eq!(game.reveal(loc(1, 1)), RevealOutcome::Unchanged);
        assert_eq!(game.grid(), &before);
    }

    #[test]
    fn reveal_skips_flagged_cells() {
        let mut game = Game::with_mines(3, 3, &[loc(2, 2)]);
        assert!(game.toggle_flag(loc(0, 0)));
        assert_eq!(game.reveal(loc(0, 0)), RevealOutcome::Unchanged);
        assert_eq!(game.grid().cell(loc(0, 0)).state, CellState::Flagged);
    }

    #[test]
    fn flood_fill_opens_region_and_numbered_ring() {
        let mut game = Game::with_mines(3, 3, &[loc(2, 2)]);
        game.reveal(loc(0, 0));
        assert_eq!(game.progress(), Progress::Completed);
        assert_eq!(game.visual_state(loc(0, 0), None), VisualState::OpenEmpty);
        assert_eq!(game.visual_state(loc(1, 1), None), VisualState::OpenNumbered(1));
        assert_eq!(game.visual_state(loc(2, 2), None), VisualState::Closed);
    }

    #[test]
    fn toggle_flag_cycles_closed_and_flagged() {
        let mut game = Game::with_mines(3, 3, &[loc(2, 2)]);
        assert!(game.toggle_flag(loc(0, 2)));
        assert_eq!(game.grid().cell(loc(0, 2)).state, CellState::Flagged);
        assert!(game.toggle_flag(loc(0, 2)));
        assert_eq!(game.grid().cell(loc(0, 2)).state, CellState::Closed);

        game.reveal(loc(1, 1));
        assert!(!game.toggle_flag(loc(1, 1)));
        assert_eq!(game.grid().cell(loc(1, 1)).state, CellState::Open);
    }

    #[test]
    fn chord_requires_exact_flag_count() {
        // * . *
        // . 2 .
        // . . .
        let mines = [loc(0, 0), loc(2, 0)];

        let mut game = Game::with_mines(3, 3, &mines);
        game.reveal(loc(1, 1));
        game.toggle_flag(loc(0, 0));
        assert_eq!(game.chord_reveal(loc(1, 1)), RevealOutcome::Unchanged);

        game.toggle_flag(loc(2, 0));
        game.toggle_flag(loc(0, 2));
        assert_eq!(game.chord_reveal(loc(1, 1)), RevealOutcome::Unchanged);

        game.toggle_flag(loc(0, 2));
        assert_eq!(game.chord_reveal(loc(1, 1)), RevealOutcome::Revealed);
        assert_eq!(game.progress(), Progress::Completed);
        assert_eq!(game.grid().cell(loc(0, 0)).state, CellState::Flagged);
    }

    #[test]
    fn chord_with_wrong_flag_detonates() {
        let mut game = Game::with_mines(3, 3, &[loc(0, 0)]);
        game.reveal(loc(1, 1));
        game.toggle_flag(loc(2, 2));
        assert_eq!(game.chord_reveal(loc(1, 1)), RevealOutcome::HitMine);
        assert_eq!(game.progress(), Progress::Failed);
    }

    #[test]
    fn chord_ignores_closed_and_empty_cells() {
        let mut game = Game::with_mines(3, 3, &[loc(0, 0)]);
        assert_eq!(game.chord_reveal(loc(1, 1)), RevealOutcome::Unchanged);
        game.reveal(loc(2, 2));
        assert_eq!(game.chord_reveal(loc(2, 2)), RevealOutcome::Unchanged);
    }

    #[test]
    fn progress_reports_failure_even_after_all_safe_cells_open() {
        let mut game = Game::with_mines(2, 1, &[loc(0, 0)]);
        game.reveal(loc(1, 0));
        assert_eq!(game.progress(), Progress::Completed);
        game.reveal(loc(0, 0));
        assert_eq!(game.progress(), Progress::Failed);
    }

    #[test]
    fn remaining_mines_counts_pending_mines_and_flags() {
        let mut game = Game::with_seed(config(5, 5, 4, FirstReveal::Cell), 11);
        game.toggle_flag(loc(4, 4));
        assert_eq!(game.remaining_mines(), 3);
        game.reveal(loc(0, 0));
        assert_eq!(game.remaining_mines(), 3);

        let mut game = Game::with_seed(config(5, 5, 4, FirstReveal::Cell), 11);
        for x in 0..5 {
            game.toggle_flag(loc(x, 4));
        }
        game.toggle_flag(loc(0, 3));
        assert_eq!(game.remaining_mines(), -2);
    }

    #[test]
    fn preview_highlights_closed_neighbors_only() {
        let mut game = Game::with_mines(3, 3, &[loc(0, 0)]);
        game.reveal(loc(1, 1));
        game.toggle_flag(loc(0, 1));
        let preview = Some(loc(1, 1));
        assert_eq!(game.visual_state(loc(0, 0), preview), VisualState::ClosedHighlighted);
        assert_eq!(game.visual_state(loc(2, 2), preview), VisualState::ClosedHighlighted);
        assert_eq!(game.visual_state(loc(0, 1), preview), VisualState::Flagged);
        assert_eq!(game.visual_state(loc(1, 1), preview), VisualState::OpenNumbered(1));
        assert_eq!(game.visual_state(loc(0, 0), None), VisualState::Closed);
        // the preview center itself is not highlighted
        assert_eq!(game.visual_state(loc(2, 2), Some(loc(2, 2))), VisualState::Closed);
    }

    #[test]
    fn settings_fill_missing_keys_with_defaults() {
        let settings: Settings = toml::from_str("width = 30\nfirst_reveal = \"cell\"\n").unwrap();
        assert_eq!(settings.width, 30);
        assert_eq!(settings.height, Settings::default().height);
        assert_eq!(settings.first_reveal, FirstReveal::Cell);
        assert!(settings.game_config().is_ok());
    }

    #[test]
    fn invalid_settings_file_is_rejected() {
        let dir = env::temp_dir().join(format!("mswpr-test-{}", std::process::id()));
        let path = dir.join("bad.toml");
        write_settings(&path, &Settings { mines: 500, ..Settings::default() }).unwrap();
        assert!(matches!(read_settings(&path), Err(SettingsError::Invalid(_))));

        fs::write(&path, "width = \"wide\"").unwrap();
        assert!(matches!(read_settings(&path), Err(SettingsError::Parse(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}

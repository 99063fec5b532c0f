// Entry point for the Minesweeper TUI application
// Parses the command line, loads settings and launches the main UI

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use std::error::Error;

// Module declarations
mod msw_color; // Terminal palette for cell states
mod msw_game; // Game rules, configuration and settings file
mod msw_grid; // Cell grid, mine placement and flood fill
mod msw_input; // Pointer gestures, key commands and the play loop
mod msw_ui; // Terminal UI rendering and event decoding

use msw_game::{Settings, load_or_create_settings, save_settings};
use msw_grid::FirstReveal;
use msw_ui::run as run_ui;

/// A terminal Minesweeper. Log output goes to stderr; redirect it to keep the board clean.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Board width in cells
    #[arg(short = 'W', long)]
    width: Option<usize>,

    /// Board height in cells
    #[arg(short = 'H', long)]
    height: Option<usize>,

    /// Number of mines
    #[arg(short, long)]
    mines: Option<usize>,

    /// Cells kept free of mines on the first reveal
    #[arg(long, value_parser = parse_first_reveal)]
    first_reveal: Option<FirstReveal>,

    /// Use ASCII glyphs instead of Unicode symbols
    #[arg(long)]
    ascii: bool,

    /// Force a seed instead of random
    #[arg(short, long)]
    seed: Option<u64>,

    #[command(flatten)]
    verbose: Verbosity,
}

fn parse_first_reveal(s: &str) -> Result<FirstReveal, String> {
    match s {
        "cell" => Ok(FirstReveal::Cell),
        "area" => Ok(FirstReveal::Area),
        _ => Err(format!("expected `cell` or `area`, got `{}`", s)),
    }
}

impl Args {
    /// Command-line values take precedence over the settings file
    fn apply(&self, settings: &mut Settings) {
        if let Some(w) = self.width {
            settings.width = w;
        }
        if let Some(h) = self.height {
            settings.height = h;
        }
        if let Some(n) = self.mines {
            settings.mines = n;
        }
        if let Some(policy) = self.first_reveal {
            settings.first_reveal = policy;
        }
        settings.ascii_icons |= self.ascii;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    // Load or create user settings (board size, first reveal policy, glyphs)
    let mut settings = load_or_create_settings();
    args.apply(&mut settings);
    // Reject impossible boards before touching the terminal
    let config = settings.game_config()?;
    log::debug!(
        "Starting with a {}x{} board, {} mines, first reveal keeps {} safe",
        config.width(),
        config.height(),
        config.mines(),
        config.first_reveal().name()
    );

    // Launch the main UI loop
    run_ui(&mut settings, args.seed)?;

    // Remember the last board for the next run
    if let Err(e) = save_settings(&settings) {
        log::warn!("Could not save settings: {}", e);
    }
    Ok(())
}

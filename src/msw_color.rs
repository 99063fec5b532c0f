use ratatui::style::{Color, Modifier, Style};
use term_color_support::ColorSupport;

use crate::msw_game::VisualState;

/// Colour depth the terminal can display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    TrueColor,
    Indexed,
    Basic,
}

impl Depth {
    /// Ask the terminal behind stdout what it supports
    pub fn detect() -> Self {
        let support = ColorSupport::stdout();
        if support.has_16m {
            Depth::TrueColor
        } else if support.has_256 {
            Depth::Indexed
        } else {
            Depth::Basic
        }
    }
}

/// One palette colour at every depth: exact RGB, closest xterm-256 index, ANSI fallback
#[derive(Debug, Clone, Copy)]
struct Swatch {
    rgb: (u8, u8, u8),
    index: u8,
    basic: Color,
}

const fn swatch(rgb: (u8, u8, u8), index: u8, basic: Color) -> Swatch {
    Swatch { rgb, index, basic }
}

// Classic console colours
const BLACK: Swatch = swatch((0, 0, 0), 16, Color::Black);
const SILVER: Swatch = swatch((192, 192, 192), 250, Color::Gray);
const GRAY: Swatch = swatch((128, 128, 128), 244, Color::DarkGray);
const BLUE: Swatch = swatch((0, 0, 255), 21, Color::LightBlue);
const GREEN: Swatch = swatch((0, 128, 0), 28, Color::Green);
const RED: Swatch = swatch((255, 0, 0), 196, Color::LightRed);
const NAVY: Swatch = swatch((0, 0, 128), 18, Color::Blue);
const MAROON: Swatch = swatch((128, 0, 0), 88, Color::Red);
const TEAL: Swatch = swatch((0, 128, 128), 30, Color::Cyan);
const PURPLE: Swatch = swatch((128, 0, 128), 90, Color::Magenta);
const GOLD: Swatch = swatch((255, 215, 0), 220, Color::Yellow);

/// Styles for every cell state, resolved for one terminal
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    depth: Depth,
}

impl Palette {
    pub fn new() -> Self {
        Palette::with_depth(Depth::detect())
    }

    pub fn with_depth(depth: Depth) -> Self {
        Palette { depth }
    }

    fn color(&self, s: Swatch) -> Color {
        match self.depth {
            Depth::TrueColor => Color::Rgb(s.rgb.0, s.rgb.1, s.rgb.2),
            Depth::Indexed => Color::Indexed(s.index),
            Depth::Basic => s.basic,
        }
    }

    /// Board background and default text
    pub fn board(&self) -> Style {
        Style::default().fg(self.color(BLACK)).bg(self.color(SILVER))
    }

    /// Cursor cell background and key labels
    pub fn accent(&self) -> Color {
        self.color(GOLD)
    }

    pub fn number(&self, n: u8) -> Color {
        self.color(match n {
            1 => BLUE,
            2 => GREEN,
            4 => NAVY,
            5 => MAROON,
            6 => TEAL,
            _ => RED,
        })
    }

    pub fn cell(&self, state: VisualState) -> Style {
        let base = self.board();
        match state {
            VisualState::Closed => base.fg(self.color(GRAY)),
            VisualState::ClosedHighlighted => base.fg(self.color(BLACK)),
            VisualState::Flagged => base.fg(self.color(PURPLE)),
            VisualState::OpenEmpty => base,
            VisualState::OpenNumbered(n) => base.fg(self.number(n)).add_modifier(Modifier::BOLD),
            VisualState::OpenMine => base.fg(self.color(BLACK)).add_modifier(Modifier::BOLD),
        }
    }

    /// Status line message colours
    pub fn success(&self) -> Color {
        self.color(GREEN)
    }

    pub fn failure(&self) -> Color {
        self.color(RED)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new()
    }
}

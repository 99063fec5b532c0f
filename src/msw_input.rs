// Interaction controller
// Turns pointer button transitions and key presses into game operations, and runs the
// draw / wait / dispatch loop of a single game

use std::io;

use crate::msw_game::{Game, Progress, RevealOutcome, VisualState};
use crate::msw_grid::Location;

/// Snapshot of the two pointer buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons {
    pub left: bool,
    pub right: bool,
}

impl Buttons {
    pub const NONE: Buttons = Buttons { left: false, right: false };
    pub const LEFT: Buttons = Buttons { left: true, right: false };
    pub const RIGHT: Buttons = Buttons { left: false, right: true };
    pub const BOTH: Buttons = Buttons { left: true, right: true };

    fn both(self) -> bool {
        self.left && self.right
    }
}

/// Pointer report in grid coordinates, which may lie off the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub x: i64,
    pub y: i64,
    pub buttons: Buttons,
    pub moved: bool, // Movement report rather than a button change
}

/// Keys the game reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
    Tab,
    Backspace,
}

/// One decoded input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Pointer(PointerEvent),
    Key(Key),
    Resize,
}

/// Blocking supplier of input events, in arrival order
pub trait EventSource {
    fn next_event(&mut self) -> io::Result<InputEvent>;
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<VisualState>, // Row-major
    pub remaining_mines: isize,
    pub cursor: Option<Location>,
}

impl BoardView {
    pub fn capture(game: &Game, controller: &Controller) -> Self {
        let grid = game.grid();
        BoardView {
            width: grid.width(),
            height: grid.height(),
            cells: grid
                .locations()
                .map(|loc| game.visual_state(loc, controller.preview()))
                .collect(),
            remaining_mines: game.remaining_mines(),
            cursor: controller.cursor(),
        }
    }

    pub fn at(&self, x: usize, y: usize) -> VisualState {
        self.cells[y * self.width + x]
    }
}

/// Draws the board cells and the status line
pub trait Canvas {
    fn draw(&mut self, view: &BoardView) -> io::Result<()>;
}

/// How a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
    Quit,
}

/// Gesture state carried between events
#[derive(Debug, Default)]
pub struct Controller {
    previous: Option<Buttons>, // Buttons of the last pointer event
    preview: Option<Location>, // Chord preview while both buttons are held
    cursor: Option<Location>,  // Keyboard / hover cursor
}

impl Controller {
    pub fn preview(&self) -> Option<Location> {
        self.preview
    }

    pub fn cursor(&self) -> Option<Location> {
        self.cursor
    }

    /// Apply a pointer event, returning whether the board must be redrawn
    ///
    /// Gestures are read from the change between the previous and current buttons:
    /// - both down -> one released: chord at the pointer
    /// - left only -> none: reveal
    /// - right only -> none: toggle flag
    /// - not both -> both: start chord preview
    /// - moving while previewing drags the preview along
    pub fn pointer(&mut self, game: &mut Game, event: PointerEvent) -> bool {
        let current = event.buttons;
        let previous = self.previous.replace(current);
        let target = game.grid().locate(event.x, event.y);
        let mut redraw = false;

        if target.is_some() && self.cursor != target {
            self.cursor = target;
            redraw = true;
        }
        let Some(previous) = previous else {
            return redraw;
        };

        if previous.both() && !current.both() {
            // released off the board: drop the preview without chording
            redraw |= self.preview.take().is_some();
            if let Some(loc) = target {
                redraw |= game.chord_reveal(loc) != RevealOutcome::Unchanged;
            }
            return redraw;
        }
        let Some(loc) = target else {
            return redraw;
        };
        if previous == Buttons::LEFT && current == Buttons::NONE {
            redraw |= game.reveal(loc) != RevealOutcome::Unchanged;
        } else if previous == Buttons::RIGHT && current == Buttons::NONE {
            redraw |= game.toggle_flag(loc);
        } else if !previous.both() && current.both() {
            self.preview = Some(loc);
            redraw = true;
        }
        if event.moved && self.preview.is_some_and(|p| p != loc) {
            self.preview = Some(loc);
            redraw = true;
        }
        redraw
    }

    /// Apply a key press at the cursor, returning whether the board must be redrawn
    pub fn key(&mut self, game: &mut Game, key: Key) -> bool {
        let (width, height) = (game.grid().width(), game.grid().height());
        let at = self.cursor.unwrap_or(Location::new(0, 0));
        match key {
            Key::Up | Key::Down | Key::Left | Key::Right => {
                let next = match key {
                    Key::Up => Location::new(at.x, at.y.saturating_sub(1)),
                    Key::Down => Location::new(at.x, (at.y + 1).min(height - 1)),
                    Key::Left => Location::new(at.x.saturating_sub(1), at.y),
                    _ => Location::new((at.x + 1).min(width - 1), at.y),
                };
                let changed = self.cursor != Some(next);
                self.cursor = Some(next);
                changed
            }
            Key::Char(' ') => game.reveal(at) != RevealOutcome::Unchanged,
            Key::Char('f') | Key::Char('F') => game.toggle_flag(at),
            Key::Enter => game.chord_reveal(at) != RevealOutcome::Unchanged,
            _ => false,
        }
    }
}

/// Run one game until it is won, lost or the player quits
///
/// Progress is re-checked after every redraw, so the final board is always drawn
/// before the outcome is returned.
pub fn play<S, C>(game: &mut Game, source: &mut S, canvas: &mut C) -> io::Result<Outcome>
where
    S: EventSource,
    C: Canvas,
{
    let mut controller = Controller::default();
    let mut redraw = true;
    loop {
        if redraw {
            canvas.draw(&BoardView::capture(game, &controller))?;
            match game.progress() {
                Progress::Completed => return Ok(Outcome::Completed),
                Progress::Failed => return Ok(Outcome::Failed),
                Progress::InProgress => {}
            }
        }
        redraw = match source.next_event()? {
            InputEvent::Key(Key::Esc | Key::Char('q') | Key::Char('Q')) => {
                return Ok(Outcome::Quit);
            }
            InputEvent::Key(key) => controller.key(game, key),
            InputEvent::Pointer(event) => controller.pointer(game, event),
            InputEvent::Resize => true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn loc(x: usize, y: usize) -> Location {
        Location::new(x, y)
    }

    fn at(x: i64, y: i64, buttons: Buttons) -> InputEvent {
        InputEvent::Pointer(PointerEvent { x, y, buttons, moved: false })
    }

    fn drag(x: i64, y: i64, buttons: Buttons) -> InputEvent {
        InputEvent::Pointer(PointerEvent { x, y, buttons, moved: true })
    }

    struct Script(VecDeque<InputEvent>);

    impl Script {
        fn new(events: &[InputEvent]) -> Self {
            Script(events.iter().copied().collect())
        }
    }

    impl EventSource for Script {
        fn next_event(&mut self) -> io::Result<InputEvent> {
            self.0
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<BoardView>);

    impl Canvas for Recorder {
        fn draw(&mut self, view: &BoardView) -> io::Result<()> {
            self.0.push(view.clone());
            Ok(())
        }
    }

    impl Recorder {
        fn last(&self) -> &BoardView {
            self.0.last().unwrap()
        }
    }

    fn run(game: &mut Game, events: &[InputEvent]) -> (io::Result<Outcome>, Recorder, Script) {
        let mut script = Script::new(events);
        let mut canvas = Recorder::default();
        let outcome = play(game, &mut script, &mut canvas);
        (outcome, canvas, script)
    }

    #[test]
    fn left_click_reveals_and_wins() {
        let mut game = Game::with_mines(3, 3, &[loc(2, 2)]);
        let events = [at(0, 0, Buttons::NONE), at(0, 0, Buttons::LEFT), at(0, 0, Buttons::NONE)];
        let (outcome, canvas, _) = run(&mut game, &events);
        assert_eq!(outcome.unwrap(), Outcome::Completed);
        assert_eq!(canvas.last().at(0, 0), VisualState::OpenEmpty);
        assert_eq!(canvas.last().at(2, 2), VisualState::Closed);
    }

    #[test]
    fn right_click_toggles_flag() {
        let mut game = Game::with_mines(3, 3, &[loc(2, 2)]);
        let events = [
            at(2, 2, Buttons::NONE),
            at(2, 2, Buttons::RIGHT),
            at(2, 2, Buttons::NONE),
            InputEvent::Key(Key::Char('q')),
        ];
        let (outcome, canvas, _) = run(&mut game, &events);
        assert_eq!(outcome.unwrap(), Outcome::Quit);
        assert_eq!(canvas.last().at(2, 2), VisualState::Flagged);
        assert_eq!(canvas.last().remaining_mines, 0);
    }

    #[test]
    fn first_event_only_records_buttons() {
        let mut game = Game::with_mines(3, 3, &[loc(2, 2)]);
        let mut controller = Controller::default();
        // a release with no known press does nothing but move the cursor
        assert!(controller.pointer(&mut game, PointerEvent { x: 0, y: 0, buttons: Buttons::NONE, moved: false }));
        assert_eq!(game.grid().cell(loc(0, 0)).state, crate::msw_grid::CellState::Closed);
        assert!(!controller.pointer(&mut game, PointerEvent { x: 0, y: 0, buttons: Buttons::NONE, moved: false }));
    }

    #[test]
    fn releasing_off_the_board_does_nothing() {
        let mut game = Game::with_mines(3, 3, &[loc(2, 2)]);
        let events = [
            at(0, 0, Buttons::NONE),
            at(0, 0, Buttons::LEFT),
            at(7, -1, Buttons::NONE),
            InputEvent::Key(Key::Esc),
        ];
        let (outcome, canvas, _) = run(&mut game, &events);
        assert_eq!(outcome.unwrap(), Outcome::Quit);
        assert!(canvas.last().cells.iter().all(|c| *c == VisualState::Closed));
    }

    #[test]
    fn chord_preview_follows_pointer_and_chords_on_release() {
        // * . *
        // . 2 .
        // . . .
        let mut game = Game::with_mines(3, 3, &[loc(0, 0), loc(2, 0)]);
        let events = [
            at(1, 1, Buttons::NONE),
            at(1, 1, Buttons::LEFT),
            at(1, 1, Buttons::NONE),
            at(0, 0, Buttons::RIGHT),
            at(0, 0, Buttons::NONE),
            at(2, 0, Buttons::RIGHT),
            at(2, 0, Buttons::NONE),
            // press both on the corner, drag onto the number
            at(1, 2, Buttons::LEFT),
            at(1, 2, Buttons::BOTH),
            drag(1, 1, Buttons::BOTH),
            at(1, 1, Buttons::LEFT),
        ];
        let mut script = Script::new(&events);
        let mut canvas = Recorder::default();
        let outcome = play(&mut game, &mut script, &mut canvas).unwrap();
        assert_eq!(outcome, Outcome::Completed);

        let previews: Vec<&BoardView> = canvas
            .0
            .iter()
            .filter(|v| v.cells.contains(&VisualState::ClosedHighlighted))
            .collect();
        assert_eq!(previews.len(), 2);
        // preview around (1,2) highlights the closed row above it
        assert_eq!(previews[0].at(0, 1), VisualState::ClosedHighlighted);
        assert_eq!(previews[0].at(0, 0), VisualState::Flagged);
        // dragged onto (1,1): the bottom row is its neighborhood, (1,2) included
        assert_eq!(previews[1].at(1, 2), VisualState::ClosedHighlighted);
        assert!(!canvas.last().cells.contains(&VisualState::ClosedHighlighted));
        assert!(script.0.is_empty());
    }

    #[test]
    fn chord_with_too_few_flags_only_clears_preview() {
        let mut game = Game::with_mines(3, 3, &[loc(0, 0), loc(2, 0)]);
        game.reveal(loc(1, 1));
        game.toggle_flag(loc(0, 0));
        let mut controller = Controller::default();
        let send = |c: &mut Controller, g: &mut Game, buttons| {
            c.pointer(g, PointerEvent { x: 1, y: 1, buttons, moved: false })
        };
        send(&mut controller, &mut game, Buttons::NONE);
        assert!(send(&mut controller, &mut game, Buttons::BOTH));
        assert_eq!(controller.preview(), Some(loc(1, 1)));
        // releasing both at once is a chord, not a reveal
        assert!(send(&mut controller, &mut game, Buttons::NONE));
        assert_eq!(controller.preview(), None);
        assert_eq!(game.progress(), Progress::InProgress);
        assert_eq!(game.grid().cell(loc(1, 0)).state, crate::msw_grid::CellState::Closed);
    }

    #[test]
    fn mine_hit_stops_processing_input() {
        let mut game = Game::with_mines(3, 3, &[loc(1, 1)]);
        let events = [
            at(1, 1, Buttons::NONE),
            at(1, 1, Buttons::LEFT),
            at(1, 1, Buttons::NONE),
            at(0, 0, Buttons::RIGHT),
            at(0, 0, Buttons::NONE),
        ];
        let (outcome, canvas, script) = run(&mut game, &events);
        assert_eq!(outcome.unwrap(), Outcome::Failed);
        assert_eq!(canvas.last().at(1, 1), VisualState::OpenMine);
        assert_eq!(script.0.len(), 2);
    }

    #[test]
    fn keyboard_moves_cursor_and_acts() {
        let mut game = Game::with_mines(3, 3, &[loc(0, 0)]);
        let events = [
            InputEvent::Key(Key::Right),
            InputEvent::Key(Key::Down),
            InputEvent::Key(Key::Char(' ')),
            InputEvent::Key(Key::Up),
            InputEvent::Key(Key::Left),
            InputEvent::Key(Key::Left),
            InputEvent::Key(Key::Char('f')),
            InputEvent::Key(Key::Right),
            InputEvent::Key(Key::Down),
            InputEvent::Key(Key::Enter),
        ];
        let (outcome, canvas, _) = run(&mut game, &events);
        assert_eq!(outcome.unwrap(), Outcome::Completed);
        assert_eq!(canvas.last().cursor, Some(loc(1, 1)));
        assert_eq!(canvas.last().at(0, 0), VisualState::Flagged);
    }

    #[test]
    fn resize_forces_redraw() {
        let mut game = Game::with_mines(2, 2, &[loc(0, 0)]);
        let events = [InputEvent::Resize, InputEvent::Resize, InputEvent::Key(Key::Char('Q'))];
        let (outcome, canvas, _) = run(&mut game, &events);
        assert_eq!(outcome.unwrap(), Outcome::Quit);
        assert_eq!(canvas.0.len(), 3);
    }

    #[test]
    fn source_errors_propagate() {
        let mut game = Game::with_mines(2, 2, &[loc(0, 0)]);
        let (outcome, _, _) = run(&mut game, &[]);
        assert_eq!(outcome.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}

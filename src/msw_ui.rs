use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Span, Spans, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use std::cell::Cell;
use std::error::Error;
use std::io;
use std::rc::Rc;
use unicode_width::UnicodeWidthStr;

use crate::msw_color::Palette;
use crate::msw_game::{ConfigError, Game, GameConfig, MAX_HEIGHT, MAX_WIDTH, Settings, VisualState};
use crate::msw_grid::FirstReveal;
use crate::msw_input::{BoardView, Buttons, Canvas, EventSource, InputEvent, Key, Outcome, PointerEvent, play};

/// Inner rectangle of the last drawn board, shared between drawing and mouse mapping
type BoardArea = Rc<Cell<Option<Rect>>>;

/// Cell glyphs, with an ASCII fallback set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Glyphs {
    closed: &'static str,
    flag: &'static str,
    mine: &'static str,
}

impl Glyphs {
    fn new(ascii: bool) -> Self {
        Glyphs {
            closed: if ascii { "#" } else { "■" },
            flag: if ascii { "F" } else { "⚑" },
            mine: if ascii { "*" } else { "●" },
        }
    }
}

/// Map a screen position to grid coordinates; each cell is two columns wide
fn cell_at(inner: Rect, column: u16, row: u16) -> (i64, i64) {
    let dx = column as i64 - inner.x as i64;
    let dy = row as i64 - inner.y as i64;
    (dx.div_euclid(2), dy)
}

/// Decodes crossterm events into game input, tracking which buttons are held
pub struct Input {
    buttons: Buttons,
    area: BoardArea,
}

impl Input {
    fn new(area: BoardArea) -> Self {
        Input {
            buttons: Buttons::NONE,
            area,
        }
    }

    /// Translate one terminal event; `None` for events the game ignores
    fn decode(&mut self, ev: Event) -> Option<InputEvent> {
        match ev {
            Event::Key(key) => decode_key(key).map(InputEvent::Key),
            Event::Mouse(me) => self.decode_mouse(me),
            Event::Resize(_, _) => Some(InputEvent::Resize),
            _ => None,
        }
    }

    fn decode_mouse(&mut self, me: MouseEvent) -> Option<InputEvent> {
        let moved = match me.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.buttons.left = true;
                false
            }
            MouseEventKind::Down(MouseButton::Right) => {
                self.buttons.right = true;
                false
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.buttons.left = false;
                false
            }
            MouseEventKind::Up(MouseButton::Right) => {
                self.buttons.right = false;
                false
            }
            MouseEventKind::Drag(_) | MouseEventKind::Moved => true,
            _ => return None,
        };
        // no board on screen: report a position the controller will discard
        let (x, y) = match self.area.get() {
            Some(inner) => cell_at(inner, me.column, me.row),
            None => (-1, -1),
        };
        Some(InputEvent::Pointer(PointerEvent {
            x,
            y,
            buttons: self.buttons,
            moved,
        }))
    }

    /// Wait for the next key press; `None` when something else arrived
    fn next_key(&mut self) -> io::Result<Option<Key>> {
        match self.next_event()? {
            InputEvent::Key(key) => Ok(Some(key)),
            _ => Ok(None),
        }
    }
}

fn decode_key(key: KeyEvent) -> Option<Key> {
    // Windows reports releases as well; only presses and repeats act
    if key.kind == KeyEventKind::Release {
        return None;
    }
    Some(match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Esc,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backspace => Key::Backspace,
        _ => return None,
    })
}

impl EventSource for Input {
    fn next_event(&mut self) -> io::Result<InputEvent> {
        loop {
            if let Some(ev) = self.decode(event::read()?) {
                return Ok(ev);
            }
        }
    }
}

/// Numeric entry form for a new board size
#[derive(Debug, Clone, PartialEq, Eq)]
struct SettingsForm {
    fields: [String; 3], // width, height, mines
    focus: usize,
    first_reveal: FirstReveal,
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormAction {
    Continue,
    Submit(GameConfig),
    Cancel,
}

impl SettingsForm {
    fn new(config: &GameConfig) -> Self {
        SettingsForm {
            fields: [
                config.width().to_string(),
                config.height().to_string(),
                config.mines().to_string(),
            ],
            focus: 0,
            first_reveal: config.first_reveal(),
            error: None,
        }
    }

    fn handle(&mut self, key: Key) -> FormAction {
        match key {
            Key::Char(c) if c.is_ascii_digit() => {
                let field = &mut self.fields[self.focus];
                if field.len() < 4 {
                    field.push(c);
                }
            }
            Key::Backspace => {
                self.fields[self.focus].pop();
            }
            Key::Tab | Key::Down => self.focus = (self.focus + 1) % 3,
            Key::Up => self.focus = (self.focus + 2) % 3,
            Key::Enter => match self.submit() {
                Ok(config) => return FormAction::Submit(config),
                Err(e) => self.error = Some(e.to_string()),
            },
            Key::Esc => return FormAction::Cancel,
            _ => {}
        }
        FormAction::Continue
    }

    fn submit(&self) -> Result<GameConfig, ConfigError> {
        let value = |i: usize| self.fields[i].parse::<usize>().unwrap_or(0);
        GameConfig::new(value(0), value(1), value(2), self.first_reveal)
    }

    /// Upper mine limit for the dimensions typed so far
    fn max_mines(&self) -> Option<usize> {
        let w = self.fields[0].parse::<usize>().ok()?;
        let h = self.fields[1].parse::<usize>().ok()?;
        (w * h).checked_sub(1)
    }
}

/// Modal content drawn over the board
enum Overlay<'a> {
    Result(Outcome),
    Settings(&'a SettingsForm),
}

/// Draws the board, status line and dialogs
pub struct Screen<B: Backend> {
    terminal: Terminal<B>,
    palette: Palette,
    glyphs: Glyphs,
    title: String,
    area: BoardArea,
    last: Option<BoardView>,
}

impl<B: Backend> Screen<B> {
    fn new(terminal: Terminal<B>, palette: Palette, ascii: bool, area: BoardArea) -> Self {
        Screen {
            terminal,
            palette,
            glyphs: Glyphs::new(ascii),
            title: String::new(),
            area,
            last: None,
        }
    }

    fn render(&mut self, overlay: Option<Overlay<'_>>) -> io::Result<()> {
        let Screen {
            terminal,
            palette,
            glyphs,
            title,
            area,
            last,
        } = self;
        let mut board = None;
        terminal.draw(|f| {
            board = draw_frame(f, palette, glyphs, title, last.as_ref(), overlay.as_ref());
        })?;
        area.set(board);
        Ok(())
    }
}

impl<B: Backend> Canvas for Screen<B> {
    fn draw(&mut self, view: &BoardView) -> io::Result<()> {
        self.last = Some(view.clone());
        self.render(None)
    }
}

const HELP: [(&str, &str); 5] = [
    ("L", "open"),
    ("R", "flag"),
    ("L+R", "chord"),
    ("Arrows Space F Enter", "keyboard"),
    ("q", "quit"),
];

/// Render one full frame, returning the board's inner area when it fits
fn draw_frame<B: Backend>(
    f: &mut Frame<B>,
    palette: &Palette,
    glyphs: &Glyphs,
    title: &str,
    view: Option<&BoardView>,
    overlay: Option<&Overlay<'_>>,
) -> Option<Rect> {
    let size = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(size);

    let key_style = Style::default().fg(palette.accent()).add_modifier(Modifier::BOLD);
    let mut help = Vec::new();
    for (i, (key, action)) in HELP.iter().enumerate() {
        if i > 0 {
            help.push(Span::raw("   "));
        }
        help.push(Span::styled(*key, key_style));
        help.push(Span::raw(format!(": {}", action)));
    }
    let header = Paragraph::new(Spans::from(help))
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .alignment(Alignment::Center);
    f.render_widget(header, chunks[0]);

    let mut inner = None;
    if let Some(view) = view {
        let bw = (view.width * 2) as u16 + 3;
        let bh = view.height as u16 + 2;
        if bw > chunks[1].width || bh > chunks[1].height {
            let warn = Paragraph::new(Text::from(vec![
                Spans::from(Span::raw("Terminal size too small.")),
                Spans::from(Span::raw(format!("Board needs {} x {}", bw, bh + 6))),
            ]))
            .alignment(Alignment::Center);
            f.render_widget(warn, chunks[1]);
        } else {
            let board_area = center_rect(bw, bh, chunks[1]);
            let board = Paragraph::new(Text::from(board_lines(view, palette, glyphs)))
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(board, board_area);
            inner = Some(Rect::new(board_area.x + 1, board_area.y + 1, bw - 2, bh - 2));
        }

        let left = format!(" Mines: {} ", view.remaining_mines);
        let right = "Esc: Exit ";
        let inner_w = chunks[2].width.saturating_sub(2) as usize;
        let pad = inner_w.saturating_sub(left.width() + right.width()).max(1);
        let status = Paragraph::new(Spans::from(vec![
            Span::raw(left),
            Span::raw(" ".repeat(pad)),
            Span::styled("Esc", key_style),
            Span::raw(": Exit "),
        ]))
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(status, chunks[2]);
    }

    match overlay {
        Some(Overlay::Result(outcome)) => draw_result(f, palette, *outcome, size),
        Some(Overlay::Settings(form)) => draw_settings(f, palette, form, size),
        None => {}
    }
    inner
}

/// One line of spans per board row
fn board_lines(view: &BoardView, palette: &Palette, glyphs: &Glyphs) -> Vec<Spans<'static>> {
    let mut lines = Vec::with_capacity(view.height);
    for y in 0..view.height {
        let mut spans = Vec::with_capacity(view.width + 1);
        for x in 0..view.width {
            let state = view.at(x, y);
            let glyph = match state {
                VisualState::Closed | VisualState::ClosedHighlighted => glyphs.closed.to_string(),
                VisualState::Flagged => glyphs.flag.to_string(),
                VisualState::OpenEmpty => " ".to_string(),
                VisualState::OpenNumbered(n) => n.to_string(),
                VisualState::OpenMine => glyphs.mine.to_string(),
            };
            let mut style = palette.cell(state);
            if view.cursor.is_some_and(|c| c.x == x && c.y == y) {
                style = style.bg(palette.accent());
            }
            spans.push(Span::styled(format!(" {}", glyph), style));
        }
        // right padding column in the board background
        spans.push(Span::styled(" ", palette.board()));
        lines.push(Spans::from(spans));
    }
    lines
}

fn draw_result<B: Backend>(f: &mut Frame<B>, palette: &Palette, outcome: Outcome, size: Rect) {
    let (message, color) = match outcome {
        Outcome::Completed => ("All mines cleared!", palette.success()),
        _ => ("You stepped on a mine...", palette.failure()),
    };
    let key = Style::default().fg(palette.accent()).add_modifier(Modifier::BOLD);
    let lines = vec![
        Spans::from(Span::styled(message, Style::default().fg(color).add_modifier(Modifier::BOLD))),
        Spans::from(Span::raw("")),
        Spans::from(vec![
            Span::styled("r", key),
            Span::raw(": again   "),
            Span::styled("R", key),
            Span::raw(": new size   "),
            Span::styled("q", key),
            Span::raw(": quit"),
        ]),
    ];
    let rect = bottom_centered_block(44, 5, size);
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title("Game Over"))
            .alignment(Alignment::Center),
        rect,
    );
}

fn draw_settings<B: Backend>(f: &mut Frame<B>, palette: &Palette, form: &SettingsForm, size: Rect) {
    let max_mines = form.max_mines().map_or("?".to_string(), |m| m.to_string());
    let labels = [
        format!("Width (1-{}):", MAX_WIDTH),
        format!("Height (1-{}):", MAX_HEIGHT),
        format!("Mines (0-{}):", max_mines),
    ];
    let mut lines = vec![Spans::from(Span::raw(""))];
    for (i, label) in labels.iter().enumerate() {
        let field_style = if form.focus == i {
            Style::default().bg(palette.accent()).fg(Color::Black)
        } else {
            Style::default().bg(Color::DarkGray)
        };
        lines.push(Spans::from(vec![
            Span::raw(format!(" {:<20}", label)),
            Span::styled(format!("{:<4}", form.fields[i]), field_style),
        ]));
    }
    lines.push(Spans::from(Span::raw("")));
    lines.push(match &form.error {
        Some(e) => Spans::from(Span::styled(format!(" {}", e), Style::default().fg(palette.failure()))),
        None => Spans::from(Span::raw("")),
    });
    lines.push(Spans::from(Span::raw(" Tab: next   Enter: start   Esc: cancel")));

    let rect = center_rect(50, 9, size);
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL).title("Board Size")),
        rect,
    );
}

fn describe(config: &GameConfig) -> String {
    format!(" {}x{}, {} mines ", config.width(), config.height(), config.mines())
}

/// Ask for a new configuration; `None` when the player cancels
fn settings_dialog<B: Backend>(
    screen: &mut Screen<B>,
    input: &mut Input,
    config: &GameConfig,
) -> io::Result<Option<GameConfig>> {
    let mut form = SettingsForm::new(config);
    loop {
        screen.render(Some(Overlay::Settings(&form)))?;
        if let Some(key) = input.next_key()? {
            match form.handle(key) {
                FormAction::Continue => {}
                FormAction::Submit(config) => return Ok(Some(config)),
                FormAction::Cancel => return Ok(None),
            }
        }
    }
}

/// Play rounds until the player quits; `config` ends as the last configuration used
fn session<B: Backend>(
    screen: &mut Screen<B>,
    input: &mut Input,
    config: &mut GameConfig,
    seed: Option<u64>,
) -> io::Result<()> {
    for round in 0u64.. {
        let mut game = match seed {
            Some(seed) => Game::with_seed(*config, seed.wrapping_add(round)),
            None => Game::new(*config),
        };
        screen.title = describe(config);
        log::debug!("Round {} with {:?}", round, game.config());

        let outcome = play(&mut game, input, screen)?;
        log::debug!("Round {} ended: {:?}", round, outcome);
        if outcome == Outcome::Quit {
            return Ok(());
        }
        loop {
            screen.render(Some(Overlay::Result(outcome)))?;
            match input.next_key()? {
                Some(Key::Char('r')) => break,
                Some(Key::Char('R')) => {
                    if let Some(next) = settings_dialog(screen, input, config)? {
                        *config = next;
                    }
                    break;
                }
                Some(Key::Char('q') | Key::Char('Q') | Key::Esc) => return Ok(()),
                _ => {}
            }
        }
    }
    Ok(())
}

/// Run the terminal UI until the player quits
/// The chosen board is written back into `settings`
pub fn run(settings: &mut Settings, seed: Option<u64>) -> Result<(), Box<dyn Error>> {
    let mut config = settings.game_config()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnableMouseCapture, terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let area = BoardArea::default();
    let mut screen = Screen::new(Terminal::new(backend)?, Palette::new(), settings.ascii_icons, area.clone());
    let mut input = Input::new(area);

    let result = session(&mut screen, &mut input, &mut config, seed);

    // restore the terminal even when the session failed
    disable_raw_mode()?;
    execute!(screen.terminal.backend_mut(), DisableMouseCapture, terminal::LeaveAlternateScreen)?;
    screen.terminal.show_cursor()?;

    settings.apply(&config);
    result?;
    Ok(())
}

fn center_rect(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn bottom_centered_block(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + r.height.saturating_sub(height);
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

//! Terminal User Interface (TUI) for choosing a profile.
//!
//! This file defines the start-up menu that lists every profile from the
//! config file and lets the user pick the one matching their screen. It uses
//! `ratatui` and `crossterm` for handling user input in a terminal
//! environment.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::Color::Rgb;
use ratatui::style::{Color as RColor, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::color_utils::describe;
use crate::config::{Profile, ProfileStore};

/// The main application state for the TUI.
pub struct App {
    /// Profile names in display order.
    pub options: Vec<String>,
    /// Coordinates and colors of each profile.
    pub descriptions: Vec<String>,
    /// Name of the profile that is active in the config file.
    pub active: String,
    /// Stores the currently selected item in the list for navigation.
    pub list_state: ListState,
    /// Indicates whether the UI needs to be redrawn.
    pub dirty: bool,
}

impl App {
    /// Create a new `App` listing the profiles of `store`, with the active
    /// one preselected.
    pub fn new(store: &ProfileStore) -> Self {
        let options = store.profile_names();
        let descriptions = options
            .iter()
            .map(|name| store.profile(name).map(|p| summarize(&p)).unwrap_or_default())
            .collect();
        let active = store.active_name().to_string();
        let mut list_state = ListState::default();
        let selected = options.iter().position(|name| *name == active).unwrap_or(0);
        list_state.select(if options.is_empty() { None } else { Some(selected) });
        App {
            options,
            descriptions,
            active,
            list_state,
            dirty: true,
        }
    }

    /// Move selection down in the options list.
    pub fn next(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            let next = if selected >= self.options.len() - 1 { 0 } else { selected + 1 };
            self.list_state.select(Some(next));
            self.dirty = true;
        }
    }

    /// Move selection up in the options list.
    pub fn previous(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            let prev = if selected == 0 {
                self.options.len() - 1
            } else {
                selected - 1
            };
            self.list_state.select(Some(prev));
            self.dirty = true;
        }
    }

    /// Name of the highlighted profile.
    pub fn selected_name(&self) -> Option<&str> {
        self.list_state
            .selected()
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }
}

fn summarize(profile: &Profile) -> String {
    format!(
        "Check pixel {} expects {}\nButton pixel {} expects {}\nJump every {}s, toggle with {}",
        profile.check_pixel,
        describe(profile.expected_color),
        profile.button_pixel,
        describe(profile.expected_button_color),
        profile.jump_interval.as_secs(),
        profile.toggle_key.to_uppercase(),
    )
}

/// Draws the main TUI layout onto the frame.
pub fn ui(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(6),
            Constraint::Min(6),
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    let ascii_art = r#"    _    _____ _  __  ____             _
   / \  |  ___| |/ / / ___|  ___ _ __ | |_ _ __ _   _
  / _ \ | |_  | ' /  \___ \ / _ \ '_ \| __| '__| | | |
 / ___ \|  _| | . \   ___) |  __/ | | | |_| |  | |_| |
/_/   \_\_|   |_|\_\ |____/ \___|_| |_|\__|_|   \__, |
                                                |___/ "#;

    let header_paragraph = Paragraph::new(ascii_art)
        .block(Block::default().borders(Borders::NONE))
        .alignment(Alignment::Center)
        .style(Style::default().fg(RColor::Yellow));
    f.render_widget(header_paragraph, chunks[0]);

    let items: Vec<ListItem> = app
        .options
        .iter()
        .map(|name| {
            let label = if *name == app.active {
                format!("{name} (active)")
            } else {
                name.clone()
            };
            ListItem::new(label).style(
                Style::default()
                    .fg(RColor::White)
                    .add_modifier(Modifier::BOLD),
            )
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title("Which window mode are you using?")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title_alignment(Alignment::Center),
        )
        .highlight_style(
            Style::default()
                .fg(RColor::Black)
                .bg(RColor::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[1], &mut app.list_state);

    let selected = app.list_state.selected().unwrap_or(0);
    let description = app
        .descriptions
        .get(selected)
        .map(String::as_str)
        .unwrap_or("");
    let desc_paragraph = Paragraph::new(description)
        .block(
            Block::default()
                .title("Profile")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title_alignment(Alignment::Center),
        )
        .style(Style::default().fg(RColor::LightBlue))
        .alignment(Alignment::Left);
    f.render_widget(desc_paragraph, chunks[2]);

    let info = Paragraph::new("Use ↑↓ to navigate. Press Enter to select, 'q' or Esc to cancel.")
        .block(
            Block::default()
                .title("Instructions")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title_alignment(Alignment::Center),
        )
        .style(Style::default().fg(RColor::Gray))
        .alignment(Alignment::Center);
    f.render_widget(info, chunks[3]);

    let version = Paragraph::new(format!("v{}", env!("CARGO_PKG_VERSION")))
        .style(Style::default().fg(Rgb(255, 214, 0)))
        .alignment(Alignment::Right);
    f.render_widget(version, chunks[4]);
}

/// Runs the TUI loop until the user picks a profile or cancels.
///
/// # Arguments
///
/// * `terminal` - A mutable reference to the terminal used for rendering.
/// * `app` - The menu state, listing every profile.
///
/// # Returns
///
/// The selected profile name, or `None` if the user cancelled.
pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<Option<String>> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        let now = Instant::now();
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if app.dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| ui(f, &mut app))?;
            app.dirty = false;
            last_tick = now;
        }

        if event::poll(timeout)? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(None),
                    KeyCode::Down => app.next(),
                    KeyCode::Up => app.previous(),
                    KeyCode::Enter => {
                        if let Some(name) = app.selected_name() {
                            return Ok(Some(name.to_string()));
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Launches the profile menu in raw mode and restores the terminal upon
/// exit. Returns the chosen profile name, or `None` if cancelled.
pub fn show_menu(store: &ProfileStore) -> io::Result<Option<String>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, App::new(store));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

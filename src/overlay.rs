//! Status indicator shown while AFK mode is on.
//!
//! The indicator takes over the terminal's alternate screen with a red banner
//! and gives the normal screen back when hidden. `OverlayHandle` creates it on
//! first use and reuses it afterwards.

use std::io::{self, Stdout};

use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color as RColor, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::debug;

const BANNER_WIDTH: u16 = 64;
const BANNER_HEIGHT: u16 = 5;

/// Something that can show or hide the "AFK active" indicator.
pub trait StatusOverlay {
    fn show(&mut self) -> io::Result<()>;
    fn hide(&mut self) -> io::Result<()>;
}

/// Banner drawn on the terminal's alternate screen.
pub struct TerminalOverlay {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    message: String,
    visible: bool,
}

impl TerminalOverlay {
    pub fn new(message: impl Into<String>) -> io::Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self {
            terminal,
            message: message.into(),
            visible: false,
        })
    }
}

impl StatusOverlay for TerminalOverlay {
    fn show(&mut self) -> io::Result<()> {
        if self.visible {
            return Ok(());
        }
        execute!(self.terminal.backend_mut(), EnterAlternateScreen, Hide)?;
        self.visible = true;
        self.terminal.clear()?;
        let message = self.message.as_str();
        self.terminal.draw(|f| draw_banner(f, message))?;
        Ok(())
    }

    fn hide(&mut self) -> io::Result<()> {
        if !self.visible {
            return Ok(());
        }
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen, Show)?;
        self.visible = false;
        Ok(())
    }
}

impl Drop for TerminalOverlay {
    fn drop(&mut self) {
        let _ = self.hide();
    }
}

fn draw_banner(f: &mut Frame, message: &str) {
    let area = centered(f.area(), BANNER_WIDTH, BANNER_HEIGHT);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().bg(RColor::Black));
    let banner = Paragraph::new(format!("\n{message}"))
        .block(block)
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .fg(RColor::Red)
                .bg(RColor::Black)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(banner, area);
}

/// A `width` x `height` rect in the middle of `area`, clipped to it.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

type OverlayFactory<O> = Box<dyn FnMut() -> io::Result<O> + Send>;

/// Lazily created, reused status indicator.
pub struct OverlayHandle<O> {
    factory: OverlayFactory<O>,
    overlay: Option<O>,
    created: usize,
}

impl<O: StatusOverlay> OverlayHandle<O> {
    pub fn new(factory: impl FnMut() -> io::Result<O> + Send + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            overlay: None,
            created: 0,
        }
    }

    pub fn show(&mut self) -> io::Result<()> {
        if self.overlay.is_none() {
            let overlay = (self.factory)()?;
            self.created += 1;
            debug!(created = self.created, "status overlay created");
            self.overlay = Some(overlay);
        }
        match self.overlay.as_mut() {
            Some(overlay) => overlay.show(),
            None => Ok(()),
        }
    }

    pub fn hide(&mut self) -> io::Result<()> {
        match self.overlay.as_mut() {
            Some(overlay) => overlay.hide(),
            None => Ok(()),
        }
    }

    /// Number of overlays built so far.
    #[cfg(test)]
    pub fn created(&self) -> usize {
        self.created
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Debug, Clone, PartialEq)]
    pub(crate) struct OverlayLog {
        pub(crate) shows: usize,
        pub(crate) hides: usize,
        pub(crate) visible: bool,
    }

    pub(crate) struct FakeOverlay(pub(crate) Arc<Mutex<OverlayLog>>);

    impl StatusOverlay for FakeOverlay {
        fn show(&mut self) -> io::Result<()> {
            let mut log = self.0.lock().unwrap();
            log.shows += 1;
            log.visible = true;
            Ok(())
        }

        fn hide(&mut self) -> io::Result<()> {
            let mut log = self.0.lock().unwrap();
            log.hides += 1;
            log.visible = false;
            Ok(())
        }
    }

    pub(crate) fn fake_handle() -> (OverlayHandle<FakeOverlay>, Arc<Mutex<OverlayLog>>) {
        let log = Arc::new(Mutex::new(OverlayLog::default()));
        let shared = log.clone();
        let handle = OverlayHandle::new(move || Ok(FakeOverlay(shared.clone())));
        (handle, log)
    }

    #[test]
    fn overlay_is_created_lazily_and_reused() {
        let (mut handle, log) = fake_handle();
        assert_eq!(handle.created(), 0);
        handle.hide().unwrap();
        assert_eq!(handle.created(), 0);

        for _ in 0..3 {
            handle.show().unwrap();
            handle.hide().unwrap();
        }
        assert_eq!(handle.created(), 1);
        let log = log.lock().unwrap();
        assert_eq!((log.shows, log.hides), (3, 3));
        assert!(!log.visible);
    }

    #[test]
    fn failed_creation_is_retried_on_next_show() {
        let mut attempts = 0;
        let mut handle = OverlayHandle::new(move || {
            attempts += 1;
            if attempts == 1 {
                Err(io::Error::new(io::ErrorKind::Other, "no terminal"))
            } else {
                Ok(FakeOverlay(Arc::new(Mutex::new(OverlayLog::default()))))
            }
        });
        assert!(handle.show().is_err());
        assert_eq!(handle.created(), 0);
        handle.show().unwrap();
        assert_eq!(handle.created(), 1);
    }

    #[test]
    fn banner_is_centered_and_clipped() {
        let area = Rect::new(0, 0, 100, 20);
        assert_eq!(centered(area, 64, 5), Rect::new(18, 7, 64, 5));
        let small = Rect::new(0, 0, 40, 3);
        assert_eq!(centered(small, 64, 5), Rect::new(0, 0, 40, 3));
    }
}

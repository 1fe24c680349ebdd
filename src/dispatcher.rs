//! Synthetic input: the jump keystroke and the button click.

use std::thread;
use std::time::Duration;

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::debug;

use crate::automation::AutoHotkey;
use crate::config::Point;
use crate::error::DispatchError;

/// How long the jump key is held down.
const JUMP_HOLD: Duration = Duration::from_millis(50);

/// Sends input to the game. Callers are responsible for rate limiting.
pub trait Dispatcher {
    /// Issue one jump.
    fn jump(&mut self) -> Result<(), DispatchError>;
    /// Issue one click at `at`.
    fn click(&mut self, at: Point) -> Result<(), DispatchError>;
}

/// Jumps via `enigo`, clicks via AutoHotkey.
#[derive(Debug, Clone)]
pub struct InputDispatcher {
    backend: AutoHotkey,
}

impl InputDispatcher {
    pub fn new(backend: AutoHotkey) -> Self {
        Self { backend }
    }
}

impl Dispatcher for InputDispatcher {
    fn jump(&mut self) -> Result<(), DispatchError> {
        // `Enigo` is not `Send` on every platform, so connect per jump.
        let mut enigo = Enigo::new(&Settings::default())?;
        enigo.key(Key::Space, Direction::Press)?;
        thread::sleep(JUMP_HOLD);
        enigo.key(Key::Space, Direction::Release)?;
        debug!("jumped");
        Ok(())
    }

    fn click(&mut self, at: Point) -> Result<(), DispatchError> {
        self.backend.click(at)?;
        Ok(())
    }
}

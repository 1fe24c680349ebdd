//! Global hotkeys via keyboard polling.
//!
//! `device_query` reports the set of keys held right now, so hotkeys are
//! detected by watching for the moment a binding goes from released to held.
//! The polling thread forwards events over a channel to the foreground task.

use std::thread;
use std::time::Duration;

use device_query::{DeviceQuery, DeviceState, Keycode};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::error::HotkeyError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Flip AFK mode.
    Toggle,
    /// Escape+F12: leave immediately.
    Exit,
}

/// Map a profile key name such as `f4`, `k` or `space` to a keycode.
pub fn parse_key(name: &str) -> Result<Keycode, HotkeyError> {
    let key = match name.trim().to_ascii_lowercase().as_str() {
        "f1" => Keycode::F1,
        "f2" => Keycode::F2,
        "f3" => Keycode::F3,
        "f4" => Keycode::F4,
        "f5" => Keycode::F5,
        "f6" => Keycode::F6,
        "f7" => Keycode::F7,
        "f8" => Keycode::F8,
        "f9" => Keycode::F9,
        "f10" => Keycode::F10,
        "f11" => Keycode::F11,
        "f12" => Keycode::F12,
        "esc" | "escape" => Keycode::Escape,
        "space" => Keycode::Space,
        "tab" => Keycode::Tab,
        "enter" | "return" => Keycode::Enter,
        "insert" => Keycode::Insert,
        "delete" => Keycode::Delete,
        "home" => Keycode::Home,
        "end" => Keycode::End,
        "pageup" | "page_up" => Keycode::PageUp,
        "pagedown" | "page_down" => Keycode::PageDown,
        "0" => Keycode::Key0,
        "1" => Keycode::Key1,
        "2" => Keycode::Key2,
        "3" => Keycode::Key3,
        "4" => Keycode::Key4,
        "5" => Keycode::Key5,
        "6" => Keycode::Key6,
        "7" => Keycode::Key7,
        "8" => Keycode::Key8,
        "9" => Keycode::Key9,
        "a" => Keycode::A,
        "b" => Keycode::B,
        "c" => Keycode::C,
        "d" => Keycode::D,
        "e" => Keycode::E,
        "f" => Keycode::F,
        "g" => Keycode::G,
        "h" => Keycode::H,
        "i" => Keycode::I,
        "j" => Keycode::J,
        "k" => Keycode::K,
        "l" => Keycode::L,
        "m" => Keycode::M,
        "n" => Keycode::N,
        "o" => Keycode::O,
        "p" => Keycode::P,
        "q" => Keycode::Q,
        "r" => Keycode::R,
        "s" => Keycode::S,
        "t" => Keycode::T,
        "u" => Keycode::U,
        "v" => Keycode::V,
        "w" => Keycode::W,
        "x" => Keycode::X,
        "y" => Keycode::Y,
        "z" => Keycode::Z,
        _ => return Err(HotkeyError(name.to_string())),
    };
    Ok(key)
}

/// The toggle key plus the fixed exit combination.
#[derive(Debug)]
pub struct HotkeyBindings {
    toggle: Keycode,
    exit: Vec<Keycode>,
}

impl HotkeyBindings {
    pub fn new(toggle: Keycode) -> Self {
        Self {
            toggle,
            exit: vec![Keycode::Escape, Keycode::F12],
        }
    }
}

/// Turns successive key snapshots into press events.
#[derive(Debug)]
pub struct HotkeyWatcher {
    bindings: HotkeyBindings,
    toggle_held: bool,
    exit_held: bool,
}

impl HotkeyWatcher {
    pub fn new(bindings: HotkeyBindings) -> Self {
        Self {
            bindings,
            toggle_held: false,
            exit_held: false,
        }
    }

    /// Feed the keys currently held. Fires once per press; holding a key
    /// does not repeat. The exit combination wins over the toggle key.
    pub fn update(&mut self, pressed: &[Keycode]) -> Option<HotkeyEvent> {
        let exit_now = self.bindings.exit.iter().all(|key| pressed.contains(key));
        let toggle_now = pressed.contains(&self.bindings.toggle);

        let exit_fired = exit_now && !self.exit_held;
        let toggle_fired = toggle_now && !self.toggle_held;
        self.exit_held = exit_now;
        self.toggle_held = toggle_now;

        if exit_fired {
            Some(HotkeyEvent::Exit)
        } else if toggle_fired && !exit_now {
            Some(HotkeyEvent::Toggle)
        } else {
            None
        }
    }
}

/// Poll the keyboard on a background thread until the receiver goes away.
///
/// # Arguments
///
/// * `bindings` - The toggle key and the exit combination.
/// * `events` - Channel to the foreground loop.
pub fn spawn_listener(
    bindings: HotkeyBindings,
    events: UnboundedSender<HotkeyEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let device = DeviceState::new();
        let mut watcher = HotkeyWatcher::new(bindings);
        info!("hotkey listener started");
        loop {
            if let Some(event) = watcher.update(&device.get_keys()) {
                debug!(?event, "hotkey pressed");
                if events.send(event).is_err() {
                    break;
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
        debug!("hotkey listener stopped");
    })
}

//! Hotkey-driven switching between idle and AFK mode.

use tracing::{info, warn};

use crate::afk_loop::{AfkController, LoopState};
use crate::dispatcher::Dispatcher;
use crate::overlay::{OverlayHandle, StatusOverlay};
use crate::sampler::PixelSampler;

/// Couples the AFK worker with its status indicator.
pub struct ToggleController<S, D, O> {
    afk: AfkController<S, D>,
    overlay: OverlayHandle<O>,
}

impl<S, D, O> ToggleController<S, D, O>
where
    S: PixelSampler + Send + 'static,
    D: Dispatcher + Send + 'static,
    O: StatusOverlay,
{
    pub fn new(afk: AfkController<S, D>, overlay: OverlayHandle<O>) -> Self {
        Self { afk, overlay }
    }

    pub fn state(&self) -> LoopState {
        self.afk.state()
    }

    /// Flip AFK mode and return the new state.
    ///
    /// Turning on shows the indicator before the worker starts. Turning off
    /// waits for the worker to finish before the indicator is hidden.
    pub async fn toggle(&mut self) -> LoopState {
        match self.afk.state() {
            LoopState::Idle => {
                info!("AFK mode activated");
                if let Err(err) = self.overlay.show() {
                    warn!("could not show status overlay: {err}");
                }
                self.afk.activate();
            }
            LoopState::Active => {
                info!("AFK mode deactivated");
                self.afk.deactivate().await;
                if let Err(err) = self.overlay.hide() {
                    warn!("could not hide status overlay: {err}");
                }
                let status = self.afk.status();
                info!(
                    iterations = status.iterations,
                    jumps = status.jumps,
                    clicks = status.clicks,
                    failed_clicks = status.failed_clicks,
                    failed_iterations = status.failed_iterations,
                    since_last_jump = ?status.last_jump.map(|at| at.elapsed()),
                    "AFK session summary"
                );
            }
        }
        self.afk.state()
    }

    /// Orderly stop used on Ctrl-C.
    pub async fn shutdown(&mut self) {
        if self.afk.state() == LoopState::Active {
            self.toggle().await;
        }
    }

    /// Restore the terminal without waiting for the worker. Used right before
    /// the process exits.
    pub fn emergency_stop(&mut self) {
        if let Err(err) = self.overlay.hide() {
            warn!("could not hide status overlay: {err}");
        }
    }
}

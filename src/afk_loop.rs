//! Core logic for keeping the character active.
//!
//! `run_afk_loop` repeats the following until its stop flag is raised:
//! 1. Jump if the configured interval has passed since the last jump.
//! 2. Sample the check pixel and the button pixel.
//! 3. Click the button when both pixels show their expected colors.
//!
//! A failed iteration is logged and followed by a one second pause. Nothing
//! short of the stop flag ends the loop. `AfkController` owns the single
//! worker task and its lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::{self, JoinError, JoinHandle};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn, Level};

use crate::color_utils::{colors_match, describe, Color, COLOR_TOLERANCE};
use crate::config::{Point, Profile};
use crate::dispatcher::Dispatcher;
use crate::error::{AfkError, SampleError};
use crate::sampler::PixelSampler;

/// Delay between iterations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Pause after a click, whether or not it succeeded.
pub const CLICK_PAUSE: Duration = Duration::from_millis(500);
/// Pause after a failed iteration.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// How often the pixel debug report is logged.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);
/// Upper bound on waiting for the worker during deactivation.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A pixel to watch and the color it should have.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelProbe {
    pub at: Point,
    pub expected: Color,
}

/// Everything the worker needs from a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub check: PixelProbe,
    pub button: PixelProbe,
    pub jump_interval: Duration,
    pub tolerance: u8,
}

impl From<&Profile> for LoopSettings {
    fn from(profile: &Profile) -> Self {
        Self {
            check: PixelProbe {
                at: profile.check_pixel,
                expected: profile.expected_color,
            },
            button: PixelProbe {
                at: profile.button_pixel,
                expected: profile.expected_button_color,
            },
            jump_interval: profile.jump_interval,
            tolerance: COLOR_TOLERANCE,
        }
    }
}

/// Counters shared between the worker and the controller.
#[derive(Debug, Default, Clone)]
pub struct LoopStatus {
    pub iterations: u64,
    pub jumps: u64,
    pub clicks: u64,
    pub failed_clicks: u64,
    pub failed_iterations: u64,
    pub last_jump: Option<Instant>,
}

fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a blocking sampler or dispatcher call on the blocking pool, so the
/// worker can still be aborted while the call is in flight.
///
/// # Arguments
///
/// * `shared` - The sampler or dispatcher, locked for the duration of `call`.
/// * `call` - The blocking operation.
async fn off_thread<T, R, F>(shared: &Arc<Mutex<T>>, call: F) -> Result<R, JoinError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> R + Send + 'static,
{
    let shared = Arc::clone(shared);
    task::spawn_blocking(move || call(&mut *lock(&shared))).await
}

/// Whether the controller currently has a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Active,
}

/// The polling loop. Returns once `stop` is observed between iterations.
///
/// # Arguments
///
/// * `settings` - Pixels, colors and jump interval of the active profile.
/// * `sampler` - Screen access, shared with later workers.
/// * `dispatcher` - Input backend, shared with later workers so input from
///   an aborted worker never overlaps with a new one.
/// * `stop` - Raised by the controller to end the loop.
/// * `status` - Counters read by the controller.
pub async fn run_afk_loop<S, D>(
    settings: LoopSettings,
    sampler: Arc<Mutex<S>>,
    dispatcher: Arc<Mutex<D>>,
    stop: Arc<AtomicBool>,
    status: Arc<Mutex<LoopStatus>>,
) where
    S: PixelSampler + Send + 'static,
    D: Dispatcher + Send + 'static,
{
    info!(
        check = %settings.check.at,
        button = %settings.button.at,
        jump_interval = ?settings.jump_interval,
        "AFK loop started"
    );
    let mut last_jump: Option<Instant> = None;
    let mut last_report = Instant::now();

    while !stop.load(Ordering::Acquire) {
        if let Err(err) =
            run_iteration(&settings, &sampler, &dispatcher, &mut last_jump, &status).await
        {
            warn!("error in AFK loop: {err}");
            lock(&status).failed_iterations += 1;
            sleep(ERROR_BACKOFF).await;
        }

        if last_report.elapsed() >= REPORT_INTERVAL {
            if tracing::enabled!(Level::DEBUG) {
                report_pixels(&settings, &sampler).await;
            }
            last_report = Instant::now();
        }
    }

    info!("AFK loop asked to stop. Exiting normally...");
}

async fn run_iteration<S, D>(
    settings: &LoopSettings,
    sampler: &Arc<Mutex<S>>,
    dispatcher: &Arc<Mutex<D>>,
    last_jump: &mut Option<Instant>,
    status: &Mutex<LoopStatus>,
) -> Result<(), AfkError>
where
    S: PixelSampler + Send + 'static,
    D: Dispatcher + Send + 'static,
{
    lock(status).iterations += 1;

    let now = Instant::now();
    let jump_due = last_jump.map_or(true, |at| now.duration_since(at) >= settings.jump_interval);
    if jump_due {
        off_thread(dispatcher, |d| d.jump())
            .await?
            .map_err(AfkError::Jump)?;
        *last_jump = Some(now);
        let mut status = lock(status);
        status.jumps += 1;
        status.last_jump = Some(now);
    }

    let points = [settings.check.at, settings.button.at];
    let samples = off_thread(sampler, move |s| s.sample_many(&points)).await?;
    let matched = [&settings.check, &settings.button]
        .iter()
        .zip(&samples)
        .all(|(probe, sample)| probe_matches(probe, sample, settings.tolerance));

    if matched && samples.len() == points.len() {
        let at = settings.button.at;
        let clicked = match off_thread(dispatcher, move |d| d.click(at)).await {
            Ok(result) => result.map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match clicked {
            Ok(()) => lock(status).clicks += 1,
            Err(err) => {
                warn!(%at, "click failed: {err}");
                lock(status).failed_clicks += 1;
            }
        }
        sleep(CLICK_PAUSE).await;
    }

    sleep(POLL_INTERVAL).await;
    Ok(())
}

/// A sampling failure counts as "no match".
fn probe_matches(probe: &PixelProbe, sample: &Result<Color, SampleError>, tolerance: u8) -> bool {
    match sample {
        Ok(color) => colors_match(*color, probe.expected, tolerance),
        Err(err) => {
            debug!(at = %probe.at, "error checking pixel color: {err}");
            false
        }
    }
}

async fn report_pixels<S>(settings: &LoopSettings, sampler: &Arc<Mutex<S>>)
where
    S: PixelSampler + Send + 'static,
{
    let points = [settings.check.at, settings.button.at];
    let samples = match off_thread(sampler, move |s| s.sample_many(&points)).await {
        Ok(samples) => samples,
        Err(err) => {
            debug!("pixel report unavailable: {err}");
            return;
        }
    };
    let probes = [("check", &settings.check), ("button", &settings.button)];
    for ((label, probe), sample) in probes.into_iter().zip(samples) {
        match sample {
            Ok(color) => debug!(
                pixel = label,
                at = %probe.at,
                sampled = %describe(color),
                expected = %describe(probe.expected),
                matched = colors_match(color, probe.expected, settings.tolerance),
                "pixel report"
            ),
            Err(err) => debug!(pixel = label, at = %probe.at, "pixel report unavailable: {err}"),
        }
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns the AFK worker. At most one worker exists at any time.
pub struct AfkController<S, D> {
    settings: LoopSettings,
    sampler: Arc<Mutex<S>>,
    dispatcher: Arc<Mutex<D>>,
    status: Arc<Mutex<LoopStatus>>,
    worker: Option<Worker>,
}

impl<S, D> AfkController<S, D>
where
    S: PixelSampler + Send + 'static,
    D: Dispatcher + Send + 'static,
{
    pub fn new(settings: LoopSettings, sampler: S, dispatcher: D) -> Self {
        Self {
            settings,
            sampler: Arc::new(Mutex::new(sampler)),
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            status: Arc::new(Mutex::new(LoopStatus::default())),
            worker: None,
        }
    }

    pub fn state(&self) -> LoopState {
        if self.worker.is_some() {
            LoopState::Active
        } else {
            LoopState::Idle
        }
    }

    pub fn status(&self) -> LoopStatus {
        lock(&self.status).clone()
    }

    /// Spawn the worker. Returns `false` if one is already running.
    pub fn activate(&mut self) -> bool {
        if self.worker.is_some() {
            return false;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_afk_loop(
            self.settings.clone(),
            self.sampler.clone(),
            self.dispatcher.clone(),
            stop.clone(),
            self.status.clone(),
        ));
        self.worker = Some(Worker { stop, handle });
        true
    }

    /// Ask the worker to stop and wait up to `JOIN_TIMEOUT` for it. A worker
    /// that misses the deadline is aborted. Returns `false` if idle.
    ///
    /// Blocking input calls run outside the worker task, so the abort takes
    /// effect at once. A call still in flight keeps the dispatcher locked
    /// until it returns, and the next worker waits for it.
    pub async fn deactivate(&mut self) -> bool {
        let Some(mut worker) = self.worker.take() else {
            return false;
        };
        worker.stop.store(true, Ordering::Release);

        match timeout(JOIN_TIMEOUT, &mut worker.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("AFK worker ended abnormally: {err}"),
            Err(_) => {
                warn!("AFK worker did not stop within {JOIN_TIMEOUT:?}, aborting");
                worker.handle.abort();
            }
        }
        true
    }
}

//! The debounce engine that turns bursts of `inc`/`dec` into one adjustment.
//!
//! Socket handlers call [`CoalescingEngine::record_increment`] /
//! [`CoalescingEngine::record_decrement`], which only bump a counter.  A
//! dedicated thread runs [`CoalescingEngine::run`], which wakes up once per
//! debounce window, drains both counters in a single critical section and,
//! if anything arrived, applies one net adjustment:
//!
//! ```text
//! target = clamp(current + step * (inc - dec), 0, max)
//! ```
//!
//! All device I/O happens outside the lock.  The final `set_level` call runs
//! on a detached worker thread so a slow display never delays the next
//! window.

use crate::traits::{DeviceAdapter, Level, Notifier};
use log::{error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default debounce window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300);

/// Default brightness change per `inc`/`dec`.
pub const DEFAULT_STEP: u32 = 10;

/// Pending step requests of the current debounce window.
///
/// Both counters live behind one mutex so a drain always observes and resets
/// them together.
#[derive(Debug, Default)]
pub struct PendingAdjustment {
    counts: Mutex<Counts>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    inc: u64,
    dec: u64,
}

impl PendingAdjustment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_increment(&self) {
        let mut counts = self.lock();
        counts.inc = counts.inc.saturating_add(1);
    }

    pub fn record_decrement(&self) {
        let mut counts = self.lock();
        counts.dec = counts.dec.saturating_add(1);
    }

    /// Take both counters and reset them to zero.  Returns `(inc, dec)`.
    pub fn drain(&self) -> (u64, u64) {
        let Counts { inc, dec } = std::mem::take(&mut *self.lock());
        (inc, dec)
    }

    // The guarded data is two integers and is never left half-written, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Tuning for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Length of one debounce window.
    pub window: Duration,
    /// Level change per recorded step.
    pub step: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            step: DEFAULT_STEP,
        }
    }
}

/// Outcome of a single [`CoalescingEngine::tick`].
#[derive(Debug)]
pub enum Cycle {
    /// Nothing was recorded during the window.  No device call was made.
    Idle,
    /// Steps were recorded but the level query failed; the delta was
    /// discarded.
    Dropped,
    /// An adjustment to `target` was handed to `worker`.
    Dispatched {
        target: u32,
        worker: JoinHandle<()>,
    },
}

/// Coalesces step requests and applies them to a [`DeviceAdapter`].
///
/// Generic over the adapter and the [`Notifier`] so tests can substitute
/// recording doubles.
pub struct CoalescingEngine<D, N> {
    pending: PendingAdjustment,
    device: Arc<D>,
    notifier: Arc<N>,
    settings: EngineSettings,
}

impl<D, N> CoalescingEngine<D, N>
where
    D: DeviceAdapter + 'static,
    N: Notifier + 'static,
{
    pub fn new(device: Arc<D>, notifier: Arc<N>, settings: EngineSettings) -> Self {
        Self {
            pending: PendingAdjustment::new(),
            device,
            notifier,
            settings,
        }
    }

    /// The adapter this engine adjusts.  Shared with the socket handlers
    /// for synchronous queries.
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn record_increment(&self) {
        self.pending.record_increment();
    }

    pub fn record_decrement(&self) {
        self.pending.record_decrement();
    }

    /// Run one debounce cycle.
    ///
    /// The cycle is skipped only when *both* counters are zero.  Equal
    /// non-zero counts still query the display and re-apply its current
    /// level.
    pub fn tick(&self) -> Cycle {
        let (inc, dec) = self.pending.drain();
        if inc == 0 && dec == 0 {
            return Cycle::Idle;
        }

        info!("coalesced commands: +{}, -{}", inc, dec);

        let level = match self.device.query() {
            Ok(level) => level,
            Err(e) => {
                error!("failed to query brightness, dropping +{} -{}: {}", inc, dec, e);
                return Cycle::Dropped;
            }
        };

        let target = net_target(level, self.settings.step, inc, dec);
        let device = Arc::clone(&self.device);
        let notifier = Arc::clone(&self.notifier);
        let spawned = thread::Builder::new()
            .name("brightd-apply".into())
            .spawn(move || apply(&*device, &*notifier, target));

        match spawned {
            Ok(worker) => Cycle::Dispatched { target, worker },
            Err(e) => {
                error!("failed to spawn adjustment worker: {}", e);
                Cycle::Dropped
            }
        }
    }

    /// Tick once per window, forever.
    ///
    /// This method **blocks**.  Run it on a dedicated thread.
    pub fn run(&self) {
        loop {
            thread::sleep(self.settings.window);
            // Workers are detached; the next window does not wait for them.
            let _ = self.tick();
        }
    }
}

/// `current + step * (inc - dec)`, clamped to `[0, max]`.
pub fn net_target(level: Level, step: u32, inc: u64, dec: u64) -> u32 {
    let delta = (i128::from(inc) - i128::from(dec)) * i128::from(step);
    let net = i128::from(level.current) + delta;
    // Clamped into u32 range, so the cast is lossless.
    net.clamp(0, i128::from(level.max)) as u32
}

fn apply<D: DeviceAdapter, N: Notifier>(device: &D, notifier: &N, target: u32) {
    info!("setting brightness to {}", target);
    if let Err(e) = device.set_level(target) {
        error!("failed to set brightness: {}", e);
    }
    if let Err(e) = notifier.notify() {
        warn!("failed to notify status bar: {}", e);
    }
}

//  Tests

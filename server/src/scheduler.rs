//! Fixed-rate tick scheduler and cooldown math.
//!
//! The scheduler owns a monotonic tick counter and fires registered
//! observers once per period from a dedicated tokio task. Observers run in
//! registration order; a panic inside one observer is caught and logged so
//! the remaining observers and all subsequent ticks still run. Ticks never
//! overlap: a slow tick delays the next fire instead of running concurrently
//! with it.

use log::{error, info};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use shared::{ACTION_COOLDOWN_TICKS, TICK_INTERVAL_MS};

type TickObserver = Box<dyn Fn(u64) + Send + Sync>;

pub struct TickScheduler {
    period: Duration,
    tick: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    observers: Arc<Mutex<Vec<TickObserver>>>,
    handle: Option<JoinHandle<()>>,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            tick: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            observers: Arc::new(Mutex::new(Vec::new())),
            handle: None,
        }
    }

    /// Registers a tick observer. Observers registered after `start` take
    /// effect from the next tick.
    pub fn on_tick<F>(&self, observer: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.observers
            .lock()
            .expect("observer list poisoned")
            .push(Box::new(observer));
    }

    /// Current tick count. Starts at 0 and is incremented before observers
    /// fire, so the first tick observers see is 1.
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begins firing observers at the fixed period. Starting an
    /// already-running scheduler is a no-op.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let tick = Arc::clone(&self.tick);
        let running = Arc::clone(&self.running);
        let observers = Arc::clone(&self.observers);
        let period = self.period;

        self.handle = Some(tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick fires immediately
            timer.tick().await;

            while running.load(Ordering::SeqCst) {
                timer.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let current = tick.fetch_add(1, Ordering::SeqCst) + 1;
                let observers = observers.lock().expect("observer list poisoned");
                for observer in observers.iter() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer(current))) {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        error!("Tick observer panicked at tick {}: {}", current, message);
                    }
                }
            }
        }));

        info!("Tick scheduler started ({} ms period)", period.as_millis());
    }

    /// Halts the tick loop. Stopping an already-stopped scheduler is a no-op.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        info!("Tick scheduler stopped at tick {}", self.current_tick());
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_INTERVAL_MS))
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// True when the global per-player cooldown has elapsed. A player that has
/// never acted is always ready.
pub fn cooldown_ready(current_tick: u64, last_action_tick: Option<u64>) -> bool {
    match last_action_tick {
        None => true,
        Some(last) => current_tick.saturating_sub(last) >= ACTION_COOLDOWN_TICKS,
    }
}

/// Ticks remaining until the next action is permitted; 0 when ready.
pub fn cooldown_remaining_ticks(current_tick: u64, last_action_tick: Option<u64>) -> u64 {
    match last_action_tick {
        None => 0,
        Some(last) => ACTION_COOLDOWN_TICKS.saturating_sub(current_tick.saturating_sub(last)),
    }
}

/// Milliseconds remaining until the next action is permitted, at the nominal
/// tick rate. Intended for client-side cooldown display.
pub fn cooldown_remaining_ms(current_tick: u64, last_action_tick: Option<u64>) -> u64 {
    cooldown_remaining_ticks(current_tick, last_action_tick) * TICK_INTERVAL_MS
}

//! Timer Module
//!
//! Coarse, one-second resolution clocks used for expiration checks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Refresh period of the cached timer
const TICK: Duration = Duration::from_secs(1);

// == Timer Trait ==
/// Source of the current time as Unix seconds.
///
/// Callers tolerate up to one tick of staleness.
pub trait Timer: Send + Sync {
    /// Returns the current Unix time in seconds.
    fn now(&self) -> u32;
}

impl<T: Timer + ?Sized> Timer for Arc<T> {
    fn now(&self) -> u32 {
        (**self).now()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in seconds.
pub fn unix_time() -> u32 {
    chrono::Utc::now().timestamp() as u32
}

// == System Timer ==
/// Samples the system clock on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimer;

impl Timer for SystemTimer {
    fn now(&self) -> u32 {
        unix_time()
    }
}

// == Cached Timer ==
/// A clock refreshed once per second by a background thread.
///
/// `now()` is a single atomic load. The refresher runs until [`CachedTimer::stop`]
/// is called or the timer is dropped; afterwards `now()` keeps returning the last
/// sampled second and must not be relied upon.
#[derive(Debug)]
pub struct CachedTimer {
    now: Arc<AtomicU32>,
    refresher: Mutex<Option<Refresher>>,
}

#[derive(Debug)]
struct Refresher {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl CachedTimer {
    // == Constructor ==
    /// Samples the clock and starts the background refresher.
    pub fn start() -> Self {
        let now = Arc::new(AtomicU32::new(unix_time()));
        let (shutdown, ticks) = mpsc::channel::<()>();

        let shared = Arc::clone(&now);
        let handle = thread::spawn(move || loop {
            match ticks.recv_timeout(TICK) {
                Err(RecvTimeoutError::Timeout) => {
                    shared.store(unix_time(), Ordering::Relaxed);
                }
                // Explicit stop, or the sender was dropped with the timer
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        info!("Cached timer started");

        Self {
            now,
            refresher: Mutex::new(Some(Refresher { shutdown, handle })),
        }
    }

    // == Stop ==
    /// Terminates the background refresher and waits for it to exit.
    ///
    /// Calling it more than once is harmless.
    pub fn stop(&self) {
        let Some(refresher) = self.refresher.lock().take() else {
            return;
        };

        let _ = refresher.shutdown.send(());
        if refresher.handle.join().is_err() {
            warn!("Cached timer thread panicked");
        }
        info!("Cached timer stopped");
    }

    // == Is Running ==
    /// Returns true while the background refresher is alive.
    pub fn is_running(&self) -> bool {
        self.refresher.lock().is_some()
    }
}

impl Timer for CachedTimer {
    fn now(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }
}

impl Drop for CachedTimer {
    fn drop(&mut self) {
        if self.is_running() {
            debug!("Cached timer dropped while running, stopping refresher");
            self.stop();
        }
    }
}

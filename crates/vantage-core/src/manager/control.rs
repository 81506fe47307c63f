use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::watch;

use crate::event::{EventBus, ValidationEvent};

/// Cloneable handle for pausing, resuming and stopping a schema's runs
/// from outside the task driving them.
#[derive(Debug, Clone)]
pub struct RunControl {
    paused: Arc<watch::Sender<bool>>,
    stopped: Arc<watch::Sender<bool>>,
    generation: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    events: EventBus,
}

impl RunControl {
    pub(crate) fn new(events: EventBus) -> Self {
        Self {
            paused: Arc::new(watch::Sender::new(false)),
            stopped: Arc::new(watch::Sender::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Ask the active run to unwind at its next checkpoint
    pub fn stop(&self) {
        log::info!("Stop requested");
        self.stopped.send_replace(true);
    }

    /// Pause the active run; fires `RunPaused(true)` on change
    pub fn pause(&self) {
        if self.paused.send_if_modified(|paused| !std::mem::replace(paused, true)) {
            log::warn!("Validation paused");
            self.events.emit(&ValidationEvent::RunPaused(true));
        }
    }

    /// Resume a paused run; fires `RunPaused(false)` on change
    pub fn resume(&self) {
        if self.paused.send_if_modified(|paused| std::mem::replace(paused, false)) {
            log::info!("Validation resumed");
            self.events.emit(&ValidationEvent::RunPaused(false));
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stopped.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a new run: clears stop and pause, returns the run's generation
    pub(crate) fn begin(&self) -> u64 {
        self.stopped.send_replace(false);
        self.paused.send_replace(false);
        self.running.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark the run of `generation` as over, unless a newer run took over.
    /// A run stopped while paused ends unpaused and fires `RunPaused(false)`.
    pub(crate) fn finish(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        if self.paused.send_if_modified(|paused| std::mem::replace(paused, false)) {
            self.events.emit(&ValidationEvent::RunPaused(false));
        }
    }

    /// Whether the run of `generation` must unwind
    pub(crate) fn should_stop(&self, generation: u64) -> bool {
        self.is_stop_requested() || self.generation.load(Ordering::SeqCst) != generation
    }

    /// Wait until resumed or stopped
    pub(crate) async fn wait_while_paused(&self) {
        let mut paused = self.paused.subscribe();
        let mut stopped = self.stopped.subscribe();
        tokio::select! {
            _ = paused.wait_for(|paused| !*paused) => {}
            _ = stopped.wait_for(|stopped| *stopped) => {}
        }
    }
}

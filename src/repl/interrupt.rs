//! Interrupt delivery for running statements.
//!
//! One channel per session. The synchronous path reads the flag the
//! evaluator polls; the scheduled path additionally arms a listener so
//! the engine can race task completion against interrupt delivery.
//! Exactly one listener registration exists per scheduled execution
//! and it is torn down unconditionally when the guard drops, so no
//! registration leaks across statements. An interrupt that lands after
//! the race is decided but before teardown goes down with the
//! registration; that window is part of the detach design.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::lang::eval::InterruptFlag;

/// Session-wide interrupt channel.
#[derive(Debug, Default)]
pub struct InterruptChannel {
    flag: InterruptFlag,
    listener: Mutex<Option<Arc<Notify>>>,
}

impl InterruptChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver an interrupt: set the flag the evaluator polls and wake
    /// the armed listener, if any.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
        if let Some(listener) = self.listener.lock().as_ref() {
            listener.notify_one();
        }
    }

    /// The flag handed to synchronous evaluation.
    pub fn flag(&self) -> InterruptFlag {
        self.flag.clone()
    }

    /// Clear a stale flag before starting a statement.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    /// Arm the listener for one scheduled execution. The previous
    /// registration, had one leaked, is replaced.
    pub fn arm(self: &Arc<Self>) -> Armed {
        let notify = Arc::new(Notify::new());
        *self.listener.lock() = Some(notify.clone());
        Armed {
            channel: self.clone(),
            notify,
        }
    }
}

/// Exclusive armed registration; disarms on drop.
pub struct Armed {
    channel: Arc<InterruptChannel>,
    notify: Arc<Notify>,
}

impl Armed {
    /// Resolves when an interrupt is delivered while armed.
    pub async fn fired(&self) {
        self.notify.notified().await;
    }
}

impl Drop for Armed {
    fn drop(&mut self) {
        let mut listener = self.channel.listener.lock();
        if listener
            .as_ref()
            .is_some_and(|n| Arc::ptr_eq(n, &self.notify))
        {
            *listener = None;
        }
        // The flag is cleared with the registration; an interrupt
        // meant for this statement must not leak into the next one.
        self.channel.flag.store(false, Ordering::Relaxed);
    }
}

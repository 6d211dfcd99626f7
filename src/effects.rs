//! Deferred post-render actions and change notification.
//!
//! Models never touch the rendering layer directly. When something must happen
//! after the next render (focusing an input that is about to appear, scrolling a
//! freshly rendered row into view) the model pushes a callback onto an
//! [`EffectQueue`]. Scheduling bumps the shared [`Notifier`], which forces the
//! renderer into another pass; the renderer calls [`EffectQueue::drain`] once per
//! pass after committing its output.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

/// A zero-argument callback run once after a render pass.
pub type Effect = Box<dyn FnOnce() + Send + 'static>;

/// Revision counter observers subscribe to. Every observable change bumps it.
#[derive(Clone)]
pub struct Notifier {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Signal that observable state changed.
    pub fn notify(&self) {
        self.tx.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Register an observer. The receiver wakes on every `notify`.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Current revision.
    pub fn revision(&self) -> u64 {
        *self.tx.borrow()
    }
}

/// FIFO queue of deferred effects.
pub struct EffectQueue {
    queue: Mutex<VecDeque<Effect>>,
    notifier: Notifier,
}

impl EffectQueue {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notifier,
        }
    }

    /// Enqueue `effect` and mark the owner as having pending effects.
    pub fn schedule<F>(&self, effect: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.lock().push_back(Box::new(effect));
        self.notifier.notify();
    }

    /// Whether a render pass still has effects to run.
    pub fn has_pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    /// Run every effect queued so far, in order, exactly once.
    ///
    /// The queue is swapped out before running, so effects scheduled by a
    /// running callback land in the next pass instead of this one.
    /// Returns the number of effects that ran.
    pub fn drain(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.lock());
        let count = batch.len();
        for effect in batch {
            effect();
        }
        count
    }

    /// A bound drain function for the rendering layer to hold on to.
    pub fn drainer(self: &Arc<Self>) -> impl Fn() -> usize + Send + Sync + 'static {
        let queue = Arc::clone(self);
        move || queue.drain()
    }
}

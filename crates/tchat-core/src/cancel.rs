//! Single-flight cancellation of the in-progress generation.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What an interrupt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// A running generation was told to stop.
    Cancelled,
    /// The running generation had already been told to stop.
    AlreadyCancelled,
    /// Nothing was running.
    Idle,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct Inner {
    next_generation: u64,
    current: Option<Slot>,
}

/// Holds the cancel handle of the generation in flight, if any.
///
/// Cloning is cheap; all clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct CancelCoordinator {
    inner: Arc<Mutex<Inner>>,
}

impl CancelCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh handle for a new generation.
    ///
    /// The returned guard clears the slot when finished or dropped.
    pub fn arm(&self) -> ArmedGeneration {
        let token = CancellationToken::new();
        let mut inner = self.inner.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        if let Some(stale) = inner.current.replace(Slot {
            generation,
            token: token.clone(),
        }) {
            tracing::warn!(
                generation = stale.generation,
                "Replacing a handle that was never disarmed"
            );
        }
        ArmedGeneration {
            coordinator: self.clone(),
            generation,
            token,
        }
    }

    /// Cancel the generation in flight. A no-op when idle or already cancelled.
    pub fn interrupt(&self) -> Interrupt {
        let inner = self.inner.lock();
        match &inner.current {
            None => Interrupt::Idle,
            Some(slot) if slot.token.is_cancelled() => Interrupt::AlreadyCancelled,
            Some(slot) => {
                slot.token.cancel();
                tracing::info!(generation = slot.generation, "Generation cancel requested");
                Interrupt::Cancelled
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().current.is_some()
    }

    fn disarm(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner
            .current
            .as_ref()
            .is_some_and(|slot| slot.generation == generation)
        {
            inner.current = None;
        }
    }
}

/// Proof that a generation is armed; owns its cancellation token.
#[derive(Debug)]
pub struct ArmedGeneration {
    coordinator: CancelCoordinator,
    generation: u64,
    token: CancellationToken,
}

impl ArmedGeneration {
    /// Token to pass to the generation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Clear the slot now. Equivalent to dropping the guard.
    pub fn finish(self) {}
}

impl Drop for ArmedGeneration {
    fn drop(&mut self) {
        self.coordinator.disarm(self.generation);
    }
}

/// Spawn the background task that turns interrupt events into
/// [`CancelCoordinator::interrupt`] calls.
///
/// The task ends when the event stream ends.
pub fn listen_for_interrupts<S>(coordinator: CancelCoordinator, events: S) -> JoinHandle<()>
where
    S: Stream<Item = ()> + Send + 'static,
{
    tokio::spawn(async move {
        futures::pin_mut!(events);
        while events.next().await.is_some() {
            let outcome = coordinator.interrupt();
            tracing::debug!(?outcome, "Interrupt received");
        }
    })
}

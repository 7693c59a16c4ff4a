//! Single-flight bookkeeping shared by the executor and the discovery engine
//!
//! Each component owns one `ActiveSlot`. Starting an operation cancels the
//! token of whatever was running before and installs a fresh one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct SlotState {
    generation: u64,
    active: Option<(u64, CancellationToken)>,
}

// The state is two plain fields, so a poisoned lock is still consistent.
fn lock(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the token of the one operation allowed to run
#[derive(Default)]
pub struct ActiveSlot {
    state: Arc<Mutex<SlotState>>,
}

impl ActiveSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the previous operation, if any, and register a new one.
    ///
    /// The returned guard is owned, so registration can happen on the
    /// caller's side before the work is handed to another task.
    pub fn begin(&self) -> ActiveGuard {
        let token = CancellationToken::new();
        let mut state = lock(&self.state);
        if let Some((_, previous)) = state.active.take() {
            previous.cancel();
        }
        state.generation += 1;
        let generation = state.generation;
        state.active = Some((generation, token.clone()));

        ActiveGuard {
            state: Arc::clone(&self.state),
            generation,
            token,
        }
    }

    /// Cancel the active operation. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        match lock(&self.state).active.take() {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active.is_some()
    }
}

/// Registration of one running operation.
///
/// Dropping it clears the slot, but only while the slot still belongs to
/// this operation; a newer one may already have taken over.
pub struct ActiveGuard {
    state: Arc<Mutex<SlotState>>,
    generation: u64,
    token: CancellationToken,
}

impl ActiveGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `f` only if this operation is still current.
    ///
    /// The slot stays locked while `f` runs, so neither `begin` nor
    /// `cancel` can slip in between the check and the side effect.
    pub fn commit<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let state = lock(&self.state);
        let current = matches!(state.active, Some((generation, _)) if generation == self.generation);
        if !current || self.token.is_cancelled() {
            return None;
        }
        Some(f())
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if matches!(state.active, Some((generation, _)) if generation == self.generation) {
            state.active = None;
        }
    }
}

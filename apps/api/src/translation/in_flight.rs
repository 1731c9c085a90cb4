//! In-flight coalescing: at most one remote call per identical chunk request.
//!
//! The first caller for a fingerprint starts the call and registers a shared
//! future; later callers await the same future. The entry is removed when the
//! starter finishes or is dropped, whatever the outcome.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::llm_client::LlmError;

pub type ChunkOutcome = Result<String, LlmError>;
type SharedCall = Shared<BoxFuture<'static, ChunkOutcome>>;

struct Pending {
    id: u64,
    call: SharedCall,
}

#[derive(Default)]
pub struct InFlight {
    pending: Mutex<HashMap<String, Pending>>,
    next_id: AtomicU64,
}

/// A handle on a pending call, either started by this caller or joined.
pub struct InFlightCall {
    call: SharedCall,
    joined: bool,
    _guard: Option<Registration>,
}

/// Removes the map entry on drop, unless it was replaced by a newer call.
struct Registration {
    owner: Arc<InFlight>,
    key: String,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut pending = self.owner.lock();
        if pending.get(&self.key).is_some_and(|p| p.id == self.id) {
            pending.remove(&self.key);
        }
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Joins the pending call for `key`, or starts one with `start`.
    pub fn join_or_start<F>(self: &Arc<Self>, key: String, start: F) -> InFlightCall
    where
        F: FnOnce() -> BoxFuture<'static, ChunkOutcome>,
    {
        let mut pending = self.lock();
        if let Some(existing) = pending.get(&key) {
            return InFlightCall {
                call: existing.call.clone(),
                joined: true,
                _guard: None,
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let call = start().shared();
        pending.insert(
            key.clone(),
            Pending {
                id,
                call: call.clone(),
            },
        );

        InFlightCall {
            call,
            joined: false,
            _guard: Some(Registration {
                owner: Arc::clone(self),
                key,
                id,
            }),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InFlightCall {
    /// True when this caller reused somebody else's pending call.
    pub fn joined(&self) -> bool {
        self.joined
    }

    pub async fn outcome(self) -> ChunkOutcome {
        // The registration is held until the call settles or this future is dropped.
        let InFlightCall { call, _guard, .. } = self;
        call.await
    }
}

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

use log::trace;

/// Indicates whether a lock should allow concurrent readers or enforce exclusivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Exclusive => f.write_str("exclusive"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockSnapshot {
    pub shared_holders: usize,
    pub exclusive_held: bool,
}

/// Shared/exclusive lock whose holds are scoped [`LockHandle`]s.
///
/// Exclusive acquisition waits while any holder is active. Shared
/// acquisition waits while an exclusive holder is active or an exclusive
/// acquirer is queued, so a stream of readers cannot starve a writer. The
/// lock is not recursive: a thread asking again while it holds the lock may
/// wait forever, so nested registry access goes through a second,
/// independent lock taken after this one.
pub struct ResourceLock {
    label: String,
    state: Mutex<LockState>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct LockState {
    holders: LockSnapshot,
    waiting_exclusive: usize,
}

impl ResourceLock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    /// The process-wide lock guarding the package resources.
    pub fn global() -> Arc<ResourceLock> {
        static GLOBAL: OnceLock<Arc<ResourceLock>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(ResourceLock::new("resources")))
            .clone()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn shared(&self) -> LockHandle<'_> {
        self.acquire(LockKind::Shared)
    }

    pub fn exclusive(&self) -> LockHandle<'_> {
        self.acquire(LockKind::Exclusive)
    }

    pub fn acquire(&self, kind: LockKind) -> LockHandle<'_> {
        let mut state = self.lock_state();
        if !Self::available(&state, kind) {
            trace!("waiting for {kind} hold of {} lock", self.label);
            if kind == LockKind::Exclusive {
                state.waiting_exclusive += 1;
            }
            while !Self::available(&state, kind) {
                state = self
                    .released
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if kind == LockKind::Exclusive {
                state.waiting_exclusive -= 1;
            }
        }
        Self::take(&mut state, kind);
        trace!("acquired {kind} hold of {} lock", self.label);
        LockHandle {
            lock: self,
            kind,
            active: true,
        }
    }

    pub fn try_acquire(&self, kind: LockKind) -> Option<LockHandle<'_>> {
        let mut state = self.lock_state();
        if !Self::available(&state, kind) {
            return None;
        }
        Self::take(&mut state, kind);
        Some(LockHandle {
            lock: self,
            kind,
            active: true,
        })
    }

    pub fn snapshot(&self) -> LockSnapshot {
        self.lock_state().holders
    }

    /// Exclusive acquirers currently blocked on this lock.
    pub fn waiting_exclusive(&self) -> usize {
        self.lock_state().waiting_exclusive
    }

    fn available(state: &LockState, kind: LockKind) -> bool {
        match kind {
            LockKind::Shared => !state.holders.exclusive_held && state.waiting_exclusive == 0,
            LockKind::Exclusive => Self::free_for_exclusive(state),
        }
    }

    fn free_for_exclusive(state: &LockState) -> bool {
        !state.holders.exclusive_held && state.holders.shared_holders == 0
    }

    fn take(state: &mut LockState, kind: LockKind) {
        match kind {
            LockKind::Shared => state.holders.shared_holders += 1,
            LockKind::Exclusive => state.holders.exclusive_held = true,
        }
    }

    fn release(&self, kind: LockKind) {
        let mut state = self.lock_state();
        match kind {
            LockKind::Shared => {
                state.holders.shared_holders = state.holders.shared_holders.saturating_sub(1)
            }
            LockKind::Exclusive => state.holders.exclusive_held = false,
        }
        drop(state);
        trace!("released {kind} hold of {} lock", self.label);
        self.released.notify_all();
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ResourceLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLock")
            .field("label", &self.label)
            .field("state", &self.snapshot())
            .finish()
    }
}

/// A held lock; released when dropped, including during unwinding.
#[must_use = "the lock is released as soon as the handle is dropped"]
pub struct LockHandle<'a> {
    lock: &'a ResourceLock,
    kind: LockKind,
    active: bool,
}

impl LockHandle<'_> {
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        self.lock.label()
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.active {
            self.active = false;
            self.lock.release(self.kind);
        }
    }
}

impl Drop for LockHandle<'_> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for LockHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("lock", &self.lock.label())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Bounded pool of reusable backing-store handles
///
/// The pool is availability-biased: when every handle is leased and the
/// pool is at capacity, the default policy hands out the first enrolled
/// handle again rather than making the request wait. Callers that need
/// strict exclusivity configure `ExhaustionPolicy::Wait`, which parks the
/// acquirer until a release or until `acquire_timeout` elapses.
///
/// Leases are RAII guards: dropping a `Pooled` releases it, so the handle
/// goes back on every exit path of the caller, including early returns
/// through `?` and panics.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::configuration::{ExhaustionPolicy, PoolSettings};

/// Creates the handles a `ResourcePool` hands out
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    type Handle: Send + Sync + 'static;
    type Error: fmt::Display + Send;

    async fn create(&self) -> Result<Self::Handle, Self::Error>;
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: usize,
    pub idle_timeout: Duration,
    pub on_exhausted: ExhaustionPolicy,
    pub acquire_timeout: Duration,
}

impl From<&PoolSettings> for PoolConfig {
    fn from(settings: &PoolSettings) -> Self {
        Self {
            max_size: settings.size,
            idle_timeout: settings.idle_timeout(),
            on_exhausted: settings.on_exhausted,
            acquire_timeout: settings.acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    Create(String),
    Timeout,
    Closed,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Create(msg) => write!(f, "Failed to create pooled handle: {}", msg),
            PoolError::Timeout => write!(f, "Timed out waiting for a pooled handle"),
            PoolError::Closed => write!(f, "Pool is closed"),
        }
    }
}

impl std::error::Error for PoolError {}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: usize,
    pub busy: usize,
    pub max_size: usize,
}

struct Slot<H> {
    handle: Arc<H>,
    /// More than one only while the handle is shared under exhaustion.
    leases: usize,
    last_used_at: Instant,
}

struct PoolState<H> {
    slots: Vec<Slot<H>>,
    /// Handles being created; they count against `max_size`.
    pending: usize,
    closed: bool,
}

struct Shared<H> {
    state: Mutex<PoolState<H>>,
    released: Notify,
}

impl<H> Shared<H> {
    fn release(&self, slot: usize) {
        {
            let mut state = self.state.lock();
            if let Some(slot) = state.slots.get_mut(slot) {
                slot.leases = slot.leases.saturating_sub(1);
                slot.last_used_at = Instant::now();
            }
        }
        self.released.notify_one();
    }
}

enum Plan<H> {
    Leased(Pooled<H>),
    Create,
    Exhausted,
}

pub struct ResourcePool<M: Manager> {
    manager: M,
    config: PoolConfig,
    shared: Arc<Shared<M::Handle>>,
}

impl<M: Manager> ResourcePool<M> {
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Self {
            manager,
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    slots: Vec::new(),
                    pending: 0,
                    closed: false,
                }),
                released: Notify::new(),
            }),
        }
    }

    /// Lease a handle.
    ///
    /// Preference order: an idle handle used within `idle_timeout`; a new
    /// handle while below `max_size`; an idle handle past its idle timeout;
    /// finally, per the exhaustion policy, the first enrolled handle shared
    /// with its current holder, or a bounded wait for a release.
    pub async fn acquire(&self) -> Result<Pooled<M::Handle>, PoolError> {
        let deadline = tokio::time::Instant::now() + self.config.acquire_timeout;
        loop {
            match self.plan()? {
                Plan::Leased(lease) => return Ok(lease),
                Plan::Create => return self.create_slot().await,
                Plan::Exhausted => {
                    let released = self.shared.released.notified();
                    if tokio::time::timeout_at(deadline, released).await.is_err() {
                        tracing::warn!(
                            max_size = self.config.max_size,
                            "Timed out waiting for a pooled handle"
                        );
                        return Err(PoolError::Timeout);
                    }
                }
            }
        }
    }

    fn plan(&self) -> Result<Plan<M::Handle>, PoolError> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }

        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;
        let fresh = state.slots.iter().position(|slot| {
            slot.leases == 0 && now.duration_since(slot.last_used_at) < idle_timeout
        });
        if let Some(index) = fresh {
            return Ok(Plan::Leased(self.lease(&mut state, index, now, false)));
        }

        if state.slots.len() + state.pending < self.config.max_size {
            state.pending += 1;
            return Ok(Plan::Create);
        }

        if let Some(index) = state.slots.iter().position(|slot| slot.leases == 0) {
            tracing::debug!(slot = index, "Recycling idle handle past its idle timeout");
            return Ok(Plan::Leased(self.lease(&mut state, index, now, false)));
        }

        match self.config.on_exhausted {
            ExhaustionPolicy::Share if !state.slots.is_empty() => {
                tracing::debug!(
                    max_size = self.config.max_size,
                    "Pool exhausted, sharing first handle"
                );
                Ok(Plan::Leased(self.lease(&mut state, 0, now, true)))
            }
            _ => Ok(Plan::Exhausted),
        }
    }

    fn lease(
        &self,
        state: &mut PoolState<M::Handle>,
        index: usize,
        now: Instant,
        shared: bool,
    ) -> Pooled<M::Handle> {
        let slot = &mut state.slots[index];
        slot.leases += 1;
        slot.last_used_at = now;
        Pooled {
            handle: Arc::clone(&slot.handle),
            slot: index,
            shared,
            pool: Arc::clone(&self.shared),
        }
    }

    async fn create_slot(&self) -> Result<Pooled<M::Handle>, PoolError> {
        let reservation = Reservation {
            shared: &self.shared,
            committed: false,
        };
        let created = self.manager.create().await;
        reservation.commit(created.map_err(|e| e.to_string()))
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.shared.state.lock();
        PoolStatus {
            size: state.slots.len(),
            busy: state.slots.iter().filter(|slot| slot.leases > 0).count(),
            max_size: self.config.max_size,
        }
    }

    /// Close the pool. Enrolled handles are dropped once their outstanding
    /// leases go away; later `acquire` calls fail with `PoolError::Closed`.
    pub fn shutdown(&self) {
        let dropped = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            std::mem::take(&mut state.slots).len()
        };
        self.shared.released.notify_waiters();
        tracing::info!(handles = dropped, "Resource pool shut down");
    }
}

/// A slot reserved for a handle that is still being created. Dropping it
/// uncommitted (creation failed, or the acquiring future was dropped)
/// gives the slot back.
struct Reservation<'a, H> {
    shared: &'a Arc<Shared<H>>,
    committed: bool,
}

impl<'a, H> Reservation<'a, H> {
    fn commit(mut self, created: Result<H, String>) -> Result<Pooled<H>, PoolError> {
        let handle = match created {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create pooled handle");
                return Err(PoolError::Create(e));
            }
        };

        let mut state = self.shared.state.lock();
        state.pending -= 1;
        self.committed = true;
        if state.closed {
            return Err(PoolError::Closed);
        }

        let handle = Arc::new(handle);
        state.slots.push(Slot {
            handle: Arc::clone(&handle),
            leases: 1,
            last_used_at: Instant::now(),
        });
        Ok(Pooled {
            handle,
            slot: state.slots.len() - 1,
            shared: false,
            pool: Arc::clone(self.shared),
        })
    }
}

impl<'a, H> Drop for Reservation<'a, H> {
    fn drop(&mut self) {
        if !self.committed {
            self.shared.state.lock().pending -= 1;
            self.shared.released.notify_one();
        }
    }
}

/// A leased handle; released when dropped
pub struct Pooled<H> {
    handle: Arc<H>,
    slot: usize,
    shared: bool,
    pool: Arc<Shared<H>>,
}

impl<H> Pooled<H> {
    /// Give the handle back now instead of at end of scope
    pub fn release(self) {}

    /// `true` if this lease was handed out under exhaustion and another
    /// holder may be using the same handle concurrently.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl<H> Deref for Pooled<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<H> Drop for Pooled<H> {
    fn drop(&mut self) {
        self.pool.release(self.slot);
    }
}

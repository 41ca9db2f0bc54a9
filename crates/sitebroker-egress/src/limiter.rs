//! Per-tenant concurrency limiting
//!
//! Each tenant gets one limiter capping its in-flight calls. Callers beyond
//! the cap wait in a FIFO queue; `tokio::sync::Semaphore` hands a released
//! permit straight to the oldest waiter, so a late `acquire` can never jump
//! ahead of a queued one.
//!
//! Acquisition is scoped: `acquire` returns a [`LimiterPermit`] and the slot
//! is released when that permit is dropped, on every exit path.

use sitebroker_core::{Error, Result, TenantId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Default ceiling on in-flight calls per tenant
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    tenant_id: TenantId,
    max: usize,
    /// Cap on queued callers; `None` queues without bound
    max_queue: Option<usize>,
    semaphore: Arc<Semaphore>,
    waiting: AtomicUsize,
}

impl ConcurrencyLimiter {
    pub fn new(tenant_id: TenantId, max: usize, max_queue: Option<usize>) -> Self {
        let max = max.max(1);
        Self {
            tenant_id,
            max,
            max_queue,
            semaphore: Arc::new(Semaphore::new(max)),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Calls currently holding a slot
    pub fn running(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }

    /// Calls currently queued for a slot
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    /// Take a slot, waiting in FIFO order if none is free.
    ///
    /// There is no timeout on the wait. With a queue cap configured, a caller
    /// that would exceed it fails immediately with `Error::QueueFull`.
    pub async fn acquire(&self) -> Result<LimiterPermit> {
        if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
            return Ok(LimiterPermit { _permit: permit });
        }

        let position = self.waiting.fetch_add(1, Ordering::AcqRel);
        let _queued = WaitingGuard(&self.waiting);

        if let Some(capacity) = self.max_queue {
            if position >= capacity {
                return Err(Error::QueueFull {
                    tenant_id: self.tenant_id.to_string(),
                    capacity,
                });
            }
        }

        debug!(
            tenant_id = %self.tenant_id,
            position = position,
            running = self.running(),
            "Waiting for concurrency slot"
        );

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::InvalidRequest("Concurrency limiter closed".to_string()))?;

        Ok(LimiterPermit { _permit: permit })
    }
}

/// A held concurrency slot; dropping it wakes the oldest waiter
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

/// Decrements the waiting count however the wait ends, including cancellation
struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

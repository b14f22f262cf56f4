//! # Debouncer
//!
//! Every call waits out a quiet window. If another call arrives on the same
//! debouncer before the window ends, the earlier one resolves with
//! [`Superseded`] without running its work. Only the latest call in a burst
//! reaches the upstream.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GeocodeError;
use crate::geocode::{AddressLookup, AddressSuggestion};

/// Default quiet window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300);
/// Shortest accepted window.
pub const MIN_WINDOW: Duration = Duration::from_millis(250);
/// Longest accepted window.
pub const MAX_WINDOW: Duration = Duration::from_millis(500);

/// A newer call replaced this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("superseded by a newer call")]
pub struct Superseded;

/// Collapses bursts of calls. Clones share the same burst state.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    generation: Arc<AtomicU64>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Debouncer {
    /// A debouncer with `window` clamped to [250 ms, 500 ms].
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.clamp(MIN_WINDOW, MAX_WINDOW),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The effective quiet window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait out the window, then run `work` unless a newer call arrived.
    pub async fn call<F, Fut, T>(&self, work: F) -> Result<T, Superseded>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.window).await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            tracing::trace!(ticket, "debounced call superseded");
            return Err(Superseded);
        }
        Ok(work().await)
    }
}

/// An [`AddressLookup`] behind a [`Debouncer`].
pub struct DebouncedLookup<L: ?Sized> {
    inner: Arc<L>,
    debouncer: Debouncer,
}

impl<L: ?Sized> Clone for DebouncedLookup<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            debouncer: self.debouncer.clone(),
        }
    }
}

impl<L: AddressLookup + ?Sized> DebouncedLookup<L> {
    pub fn new(inner: Arc<L>, debouncer: Debouncer) -> Self {
        Self { inner, debouncer }
    }
}

#[async_trait]
impl<L: AddressLookup + ?Sized + 'static> AddressLookup for DebouncedLookup<L> {
    async fn suggest(&self, text: &str) -> Result<Vec<AddressSuggestion>, GeocodeError> {
        self.debouncer
            .call(|| self.inner.suggest(text))
            .await?
    }
}

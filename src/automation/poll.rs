//! Deferred condition polling for SPA-rendered UI state
//!
//! The host page renders asynchronously and exposes no completion signal, so
//! every "wait for X" in this crate is expressed as the same primitive:
//! check a condition now, and if it is not satisfied yet, check again after a
//! fixed interval. Defined once here and reused by every call site.

use std::future::Future;
use std::time::Duration;

/// Default retry interval between condition checks.
///
/// Matches the render cadence of the target UI: menus and option lists
/// typically appear within one or two frames of the triggering interaction,
/// so anything finer just burns CDP round-trips.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Repeatedly evaluate `check` until it yields a value.
///
/// `check` is invoked immediately; while it returns `None`, another attempt is
/// scheduled after `interval` without blocking the runtime. The first `Some`
/// resolves the poll exactly once with that value.
///
/// There is no retry bound: the target UI renders on human-interaction
/// timescales and a poll that never completes is observable by the operator.
/// Callers that need a bound wrap the returned future in
/// `tokio::time::timeout`.
///
/// Concurrent polls are fully independent; nothing is shared between
/// invocations.
pub async fn poll<T, F, Fut>(interval: Duration, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    loop {
        if let Some(found) = check().await {
            return found;
        }

        tokio::time::sleep(interval).await;
    }
}

//! UI surface seam
//!
//! The engine never talks to the page directly. Everything it needs from the
//! live DOM (element lookup, click/focus synthesis, the reactive-framework
//! value-setter workaround) goes through [`UiSurface`], so the same polling
//! and sequencing logic runs against a real browser in production and against
//! scripted mocks in tests. Selectors are supplied by callers; this layer has
//! no knowledge of the vendor markup.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::automation::poll::poll;

/// Locator for an element on the live page.
///
/// Handles are re-resolved on every operation: the target UI re-renders
/// aggressively and node references go stale between a lookup and the
/// interaction that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// Selector that matched the element.
    pub selector: String,
    /// Position within the selector's match list at lookup time.
    pub index: usize,
}

impl ElementHandle {
    pub(crate) fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

/// Which value setters the reactive framework left on an input element.
///
/// The framework installs its interception on the prototype `value` property;
/// an instance-level setter may shadow it. Writing through the wrong one
/// updates the DOM without updating framework state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ValueSetters {
    #[serde(default)]
    pub prototype: bool,
    #[serde(default)]
    pub instance: bool,
}

/// The setter a write should go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetterKind {
    Prototype,
    Instance,
}

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("element vanished before the operation completed: {0}")]
    Vanished(String),

    #[error("browser backend failure: {0}")]
    Backend(String),
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Element location and event synthesis against the live page.
///
/// `query`/`query_all` report only what is currently mounted; absence is not
/// an error (callers poll). The remaining operations fail with
/// [`SurfaceError::Vanished`] when the handle no longer resolves.
#[async_trait]
pub trait UiSurface: Send + Sync {
    /// First element matching the selector, if one is mounted.
    async fn query(&self, selector: &str) -> SurfaceResult<Option<ElementHandle>>;

    /// All elements currently matching the selector.
    async fn query_all(&self, selector: &str) -> SurfaceResult<Vec<ElementHandle>>;

    /// Synthesize a user click on the element.
    async fn click(&self, element: &ElementHandle) -> SurfaceResult<()>;

    /// Move keyboard focus to the element.
    async fn focus(&self, element: &ElementHandle) -> SurfaceResult<()>;

    /// Current `value` property of an input element.
    async fn read_value(&self, element: &ElementHandle) -> SurfaceResult<Option<String>>;

    /// Named attribute of the element.
    async fn read_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> SurfaceResult<Option<String>>;

    /// Inspect which `value` setters exist on the element.
    async fn value_setters(&self, element: &ElementHandle) -> SurfaceResult<ValueSetters>;

    /// Write `value` through the chosen setter without dispatching any event.
    async fn write_value(
        &self,
        element: &ElementHandle,
        setter: SetterKind,
        value: &str,
    ) -> SurfaceResult<()>;

    /// Dispatch a bubbling `input` event so framework listeners observe the
    /// mutation.
    async fn dispatch_input(&self, element: &ElementHandle) -> SurfaceResult<()>;
}

/// Poll until the selector resolves to at least one element.
pub async fn await_element<S>(
    surface: &S,
    selector: &str,
    interval: Duration,
) -> SurfaceResult<ElementHandle>
where
    S: UiSurface + ?Sized,
{
    poll(interval, || async move {
        match surface.query(selector).await {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    })
    .await
}

/// Poll until the selector matches one or more elements, returning all of
/// them.
pub async fn await_matches<S>(
    surface: &S,
    selector: &str,
    interval: Duration,
) -> SurfaceResult<Vec<ElementHandle>>
where
    S: UiSurface + ?Sized,
{
    await_count(surface, selector, interval, |count| count >= 1).await
}

/// Poll until the selector narrows to exactly one element.
pub async fn await_sole_match<S>(
    surface: &S,
    selector: &str,
    interval: Duration,
) -> SurfaceResult<Vec<ElementHandle>>
where
    S: UiSurface + ?Sized,
{
    await_count(surface, selector, interval, |count| count == 1).await
}

async fn await_count<S>(
    surface: &S,
    selector: &str,
    interval: Duration,
    accept: fn(usize) -> bool,
) -> SurfaceResult<Vec<ElementHandle>>
where
    S: UiSurface + ?Sized,
{
    poll(interval, || async move {
        match surface.query_all(selector).await {
            Ok(matches) if accept(matches.len()) => Some(Ok(matches)),
            Ok(_) => None,
            Err(error) => Some(Err(error)),
        }
    })
    .await
}


#[cfg(test)]
mod tests {
    use super::testing::{MockElement, MockSurface};
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn await_element_defers_until_mounted() {
        let surface = MockSurface::new();
        surface.mount("#late", MockElement::present().appearing_after(3));

        let element = await_element(&surface, "#late", Duration::from_millis(100)).await;
        assert_eq!(element.unwrap(), ElementHandle::new("#late", 0));
    }

    #[tokio::test]
    async fn attributes_and_values_read_through_the_surface() {
        let surface = MockSurface::new();
        surface.mount(
            "div[data-side-conversations-anchor-id]",
            MockElement::present().with_attribute("data-side-conversations-anchor-id", "101"),
        );

        let pane = surface
            .query("div[data-side-conversations-anchor-id]")
            .await
            .unwrap()
            .expect("mounted");
        let id = surface
            .read_attribute(&pane, "data-side-conversations-anchor-id")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("101"));
        assert_eq!(surface.read_value(&pane).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn await_sole_match_waits_for_list_to_narrow() {
        let surface = std::sync::Arc::new(MockSurface::new());
        surface.mount(".option", MockElement::present().with_count(3));

        let poller = tokio::spawn({
            let surface = surface.clone();
            async move {
                await_sole_match(&*surface, ".option", Duration::from_millis(10))
                    .await
                    .unwrap()
            }
        });

        // Let the poll miss a few times against the unfiltered list, then
        // narrow it down to a single option.
        tokio::time::sleep(Duration::from_millis(35)).await;
        surface.mount(".option", MockElement::present());

        let matches = poller.await.unwrap();
        assert_eq!(matches, vec![ElementHandle::new(".option", 0)]);
    }
}

//! CDP-backed implementation of the UI surface
//!
//! Translates the engine's surface operations into chromiumoxide calls
//! against the current page. Element handles are re-resolved through
//! `find_elements` on every operation; the reactive UI re-renders often
//! enough that holding CDP node references would be a liability.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;

use crate::automation::surface::{
    ElementHandle, SetterKind, SurfaceError, SurfaceResult, UiSurface, ValueSetters,
};
use crate::browser::wrapper::{get_current_page, open_page};
use crate::manager::BrowserManager;

fn backend(error: impl std::fmt::Display) -> SurfaceError {
    SurfaceError::Backend(error.to_string())
}

/// [`UiSurface`] over a live Chrome page.
#[derive(Clone)]
pub struct CdpSurface {
    manager: Arc<BrowserManager>,
}

impl CdpSurface {
    pub fn new(manager: Arc<BrowserManager>) -> Self {
        Self { manager }
    }

    /// Navigate the shared browser to `url`; subsequent surface operations
    /// target that page.
    pub async fn open(&self, url: &str) -> SurfaceResult<()> {
        let browser_arc = self.manager.get_or_launch().await.map_err(backend)?;
        let guard = browser_arc.lock().await;
        let wrapper = guard
            .as_ref()
            .ok_or_else(|| SurfaceError::Backend("browser not available".to_string()))?;

        open_page(wrapper, url).await.map_err(backend)?;
        Ok(())
    }

    async fn page(&self) -> SurfaceResult<Page> {
        let browser_arc = self.manager.get_or_launch().await.map_err(backend)?;
        let guard = browser_arc.lock().await;
        let wrapper = guard
            .as_ref()
            .ok_or_else(|| SurfaceError::Backend("browser not available".to_string()))?;

        get_current_page(wrapper).await.map_err(backend)
    }

    /// All elements matching the selector right now. Lookup failures during
    /// navigation are transient and report as "nothing mounted" so pollers
    /// simply try again.
    async fn find_all(&self, selector: &str) -> SurfaceResult<Vec<Element>> {
        let page = self.page().await?;
        Ok(page.find_elements(selector).await.unwrap_or_default())
    }

    async fn resolve(&self, handle: &ElementHandle) -> SurfaceResult<Element> {
        self.find_all(&handle.selector)
            .await?
            .into_iter()
            .nth(handle.index)
            .ok_or_else(|| SurfaceError::Vanished(handle.selector.clone()))
    }

    async fn call_on(
        &self,
        handle: &ElementHandle,
        function: &str,
    ) -> SurfaceResult<Option<serde_json::Value>> {
        let element = self.resolve(handle).await?;
        let returns = element.call_js_fn(function, false).await.map_err(backend)?;
        Ok(returns.result.value)
    }
}

#[async_trait]
impl UiSurface for CdpSurface {
    async fn query(&self, selector: &str) -> SurfaceResult<Option<ElementHandle>> {
        let found = self.find_all(selector).await?;
        Ok((!found.is_empty()).then(|| ElementHandle::new(selector, 0)))
    }

    async fn query_all(&self, selector: &str) -> SurfaceResult<Vec<ElementHandle>> {
        let found = self.find_all(selector).await?;
        Ok((0..found.len())
            .map(|index| ElementHandle::new(selector, index))
            .collect())
    }

    async fn click(&self, element: &ElementHandle) -> SurfaceResult<()> {
        let page = self.page().await?;
        let resolved = self.resolve(element).await?;

        // Scroll into view, then click by coordinates through the page.
        // Element::click waits on an IntersectionObserver that hangs on
        // these layouts.
        resolved.scroll_into_view().await.map_err(backend)?;
        let point = resolved.clickable_point().await.map_err(backend)?;
        page.click(point).await.map_err(backend)?;
        Ok(())
    }

    async fn focus(&self, element: &ElementHandle) -> SurfaceResult<()> {
        self.call_on(element, "function() { this.focus(); }").await?;
        Ok(())
    }

    async fn read_value(&self, element: &ElementHandle) -> SurfaceResult<Option<String>> {
        let value = self
            .call_on(element, "function() { return this.value; }")
            .await?;
        Ok(value.and_then(|v| v.as_str().map(str::to_string)))
    }

    async fn read_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> SurfaceResult<Option<String>> {
        let resolved = self.resolve(element).await?;
        resolved.attribute(name).await.map_err(backend)
    }

    async fn value_setters(&self, element: &ElementHandle) -> SurfaceResult<ValueSetters> {
        let value = self
            .call_on(
                element,
                "function() {\
                   var descriptor = Object.getOwnPropertyDescriptor(this, 'value');\
                   var prototype = Object.getPrototypeOf(this);\
                   var prototypeDescriptor = prototype && Object.getOwnPropertyDescriptor(prototype, 'value');\
                   return {\
                     instance: !!(descriptor && descriptor.set),\
                     prototype: !!(prototypeDescriptor && prototypeDescriptor.set)\
                   };\
                 }",
            )
            .await?;

        Ok(value
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default())
    }

    async fn write_value(
        &self,
        element: &ElementHandle,
        setter: SetterKind,
        value: &str,
    ) -> SurfaceResult<()> {
        let literal = serde_json::to_string(value).map_err(backend)?;
        let function = match setter {
            SetterKind::Prototype => format!(
                "function() {{\
                   var descriptor = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(this), 'value');\
                   descriptor.set.call(this, {literal});\
                 }}"
            ),
            SetterKind::Instance => format!(
                "function() {{\
                   var descriptor = Object.getOwnPropertyDescriptor(this, 'value');\
                   descriptor.set.call(this, {literal});\
                 }}"
            ),
        };

        self.call_on(element, &function).await?;
        Ok(())
    }

    async fn dispatch_input(&self, element: &ElementHandle) -> SurfaceResult<()> {
        self.call_on(
            element,
            "function() { this.dispatchEvent(new Event('input', { bubbles: true })); }",
        )
        .await?;
        Ok(())
    }
}

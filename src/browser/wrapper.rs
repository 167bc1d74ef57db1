//! Browser process lifecycle
//!
//! Pairs the chromiumoxide `Browser` with its CDP event-handler task and the
//! profile directory it runs out of. The handler MUST be aborted once the
//! browser is gone, and the profile directory can only be removed after the
//! process has fully exited (Windows keeps the files locked until then).

use anyhow::{Context, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Owns the browser, its event-handler task, and its profile directory.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    pub(crate) fn browser_mut(&mut self) -> &mut Browser {
        &mut self.browser
    }

    /// Remove the profile directory. Call only after `browser.wait()` has
    /// returned; blocking `std::fs` is used so it also works from `Drop`.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up profile directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop kills the Chrome process itself.

        if let Some(path) = self.user_data_dir.as_ref() {
            warn!(
                "BrowserWrapper dropped without explicit shutdown; profile directory orphaned: {}",
                path.display()
            );
        }
    }
}

/// The page the agent is currently working in.
///
/// There is a single-page model: navigation replaces the page set, and every
/// interaction targets the first page.
pub async fn get_current_page(wrapper: &BrowserWrapper) -> Result<Page> {
    let pages = wrapper
        .browser()
        .pages()
        .await
        .context("Failed to get browser pages")?;

    pages
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No page loaded; open the helpdesk first."))
}

/// Navigate to `url`, replacing whatever pages exist, and wait for the load
/// to settle.
pub async fn open_page(wrapper: &BrowserWrapper, url: &str) -> Result<Page> {
    // Close existing pages so get_current_page stays deterministic.
    if let Ok(existing) = wrapper.browser().pages().await {
        for page in existing {
            let _ = page.close().await;
        }
    }

    let page = wrapper
        .browser()
        .new_page("about:blank")
        .await
        .context("Failed to create page")?;

    page.goto(url)
        .await
        .with_context(|| format!("Navigation failed for {url}"))?;
    page.wait_for_navigation()
        .await
        .context("Failed to wait for page load completion")?;

    info!(%url, "page opened");
    Ok(page)
}

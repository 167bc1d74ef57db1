//! Browser instance manager
//!
//! One browser per manager, launched lazily, shared by every component that
//! needs the page. Each access health-checks the instance and relaunches
//! transparently if Chrome crashed out from under us.
//!
//! # Async lock requirements
//!
//! The browser slot uses `tokio::sync::Mutex`, not a parking_lot lock:
//! every browser operation awaits, and sync guards must never be held
//! across an await point.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::BrowserConfig;
use crate::browser::BrowserWrapper;
use crate::browser_setup::launch_browser;

/// Lazy, health-checked owner of the shared browser instance.
///
/// - First `get_or_launch()` launches Chrome (seconds); later calls are a
///   version probe plus a mutex lock.
/// - A failed probe closes the crashed instance and launches a fresh one, so
///   callers never see a dead browser.
/// - `shutdown()` closes the process and removes its profile directory; safe
///   to call more than once.
pub struct BrowserManager {
    config: BrowserConfig,
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
}

impl BrowserManager {
    /// A manager for the given launch configuration. The browser launches on
    /// first use, not here.
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
        }
    }

    /// Get the shared browser, launching or recovering it as needed.
    ///
    /// Returns the browser slot itself; callers lock it for the duration of
    /// their page work.
    pub async fn get_or_launch(&self) -> Result<Arc<Mutex<Option<BrowserWrapper>>>> {
        let mut guard = self.browser.lock().await;

        // Health check: a cached browser may have crashed since last use.
        if let Some(wrapper) = guard.as_ref() {
            match wrapper.browser().version().await {
                Ok(_) => {
                    tracing::debug!("Browser health check passed, reusing existing browser");
                    drop(guard);
                    return Ok(self.browser.clone());
                }
                Err(e) => {
                    tracing::warn!("Browser health check failed: {}. Recovering...", e);

                    if let Some(mut crashed) = guard.take() {
                        // Best-effort cleanup; the process may already be gone.
                        let _ = crashed.browser_mut().close().await;
                        let _ = crashed.browser_mut().wait().await;
                        crashed.cleanup_temp_dir();
                    }

                    tracing::info!("Crashed browser cleaned up, launching new instance");
                }
            }
        }

        info!("Launching browser (first use or after recovery)");
        let user_data_dir = self.profile_dir();
        let (browser, handler, user_data_dir) =
            launch_browser(&self.config, Some(user_data_dir)).await?;
        *guard = Some(BrowserWrapper::new(browser, handler, user_data_dir));
        drop(guard);

        Ok(self.browser.clone())
    }

    /// Shut the browser down cleanly.
    ///
    /// Both `close()` and `wait()` are required: close sends the command,
    /// wait ensures the process exited before the profile directory is
    /// removed. Dropping the wrapper alone would leave a zombie Chrome.
    pub async fn shutdown(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;

        if let Some(mut wrapper) = guard.take() {
            info!("Shutting down browser");

            if let Err(e) = wrapper.browser_mut().close().await {
                tracing::warn!("Failed to close browser cleanly: {}", e);
            }
            if let Err(e) = wrapper.browser_mut().wait().await {
                tracing::warn!("Failed to wait for browser exit: {}", e);
            }
            wrapper.cleanup_temp_dir();

            drop(wrapper);
        }

        Ok(())
    }

    /// Whether a browser instance currently exists (it may still be
    /// unhealthy; `get_or_launch` sorts that out).
    pub async fn is_browser_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    fn profile_dir(&self) -> PathBuf {
        std::env::temp_dir().join(format!("deskpilot_chrome_{}", std::process::id()))
    }
}

impl Drop for BrowserManager {
    fn drop(&mut self) {
        // BrowserWrapper::drop aborts the handler task, but this is not a
        // clean shutdown; call shutdown().await first where possible.
        info!("BrowserManager dropping - browser will be cleaned up");
    }
}
